use std::fs::{File, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::time::Duration;

use bytes::BytesMut;
use parking_lot::Mutex;
use tokio::sync::mpsc;

use crate::storage::{now_unix_secs, ShardedStore};
use crate::wal::error::WalError;
use crate::wal::record::{WalAction, WalRecord};

const QUEUE_CAPACITY: usize = 1024;

#[derive(Debug, Clone)]
pub struct WalConfig {
    pub path: PathBuf,
    /// Records buffered before a forced flush.
    pub buffer_size: usize,
    /// Seconds between periodic flushes.
    pub flush_interval: Duration,
}

/// Durable write-ahead log. Producers hand records to a bounded queue; a
/// single consumer task batches them into a buffer and appends to the file
/// when the buffer fills or the flush ticker fires. The queue gives total
/// order and keeps producers off the file path; a full queue applies
/// backpressure instead of dropping records.
#[derive(Debug)]
pub struct WalManager {
    tx: Mutex<Option<mpsc::Sender<WalRecord>>>,
    consumer: Mutex<Option<tokio::task::JoinHandle<()>>>,
}

impl WalManager {
    /// Open (creating if needed) the append-only log file and start the
    /// consumer task. An unopenable file is fatal to startup.
    pub fn open(config: WalConfig) -> Result<Self, WalError> {
        if let Some(parent) = config.path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }

        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&config.path)?;

        tracing::info!(path = %config.path.display(), "opened wal file");

        let (tx, rx) = mpsc::channel(QUEUE_CAPACITY);
        let handle = tokio::spawn(consume(rx, file, config));

        Ok(Self {
            tx: Mutex::new(Some(tx)),
            consumer: Mutex::new(Some(handle)),
        })
    }

    /// Enqueue a record. Never fails the caller: a closed or broken queue is
    /// reported through the log and the operation proceeds without
    /// durability.
    pub async fn log(&self, record: WalRecord) {
        let tx = self.tx.lock().clone();
        match tx {
            Some(tx) => {
                if let Err(e) = tx.send(record).await {
                    tracing::error!(error = %e, "wal queue rejected record");
                }
            }
            None => {
                tracing::warn!("wal record submitted after close, dropping");
            }
        }
    }

    /// Close the queue, wait for the consumer to drain and perform its final
    /// flush. No `log` call may follow.
    pub async fn close(&self) {
        let tx = self.tx.lock().take();
        drop(tx);

        let handle = self.consumer.lock().take();
        if let Some(handle) = handle {
            if let Err(e) = handle.await {
                tracing::error!(error = %e, "wal consumer task failed");
            }
        }
    }
}

async fn consume(mut rx: mpsc::Receiver<WalRecord>, mut file: File, config: WalConfig) {
    let mut buf = BytesMut::new();
    let mut pending = 0usize;
    let buffer_size = config.buffer_size.max(1);
    let mut ticker = tokio::time::interval(config.flush_interval.max(Duration::from_secs(1)));

    loop {
        tokio::select! {
            record = rx.recv() => match record {
                Some(record) => {
                    record.encode(&mut buf);
                    pending += 1;
                    if pending >= buffer_size {
                        flush(&mut file, &mut buf, &mut pending);
                    }
                }
                None => {
                    flush(&mut file, &mut buf, &mut pending);
                    tracing::info!("wal consumer drained, closing file");
                    break;
                }
            },
            _ = ticker.tick() => {
                flush(&mut file, &mut buf, &mut pending);
            }
        }
    }
}

fn flush(file: &mut File, buf: &mut BytesMut, pending: &mut usize) {
    if buf.is_empty() {
        return;
    }
    if let Err(e) = file.write_all(buf).and_then(|_| file.flush()) {
        tracing::error!(error = %e, dropped = *pending, "wal flush failed, dropping batch");
    } else {
        tracing::trace!(records = *pending, bytes = buf.len(), "wal batch flushed");
    }
    buf.clear();
    *pending = 0;
}

/// Rebuild store state from the log. Records are applied in file order via
/// replay-mode store calls that suppress re-logging. SET records whose ttl
/// already elapsed before the restart are skipped. Any checksum mismatch or
/// truncated trailing record aborts with an error; an absent file is an
/// empty log.
pub async fn recover_from_wal(store: &ShardedStore, path: &Path) -> Result<usize, WalError> {
    let data = match std::fs::read(path) {
        Ok(data) => data,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(0),
        Err(e) => return Err(e.into()),
    };

    let now = now_unix_secs();
    let mut pos = 0usize;
    let mut applied = 0usize;

    while pos < data.len() {
        let (record, consumed) =
            WalRecord::decode(&data[pos..]).map_err(|e| e.at_offset(pos as u64))?;
        pos += consumed;

        match record.action {
            WalAction::Set => {
                if record.ttl > 0 && record.timestamp + record.ttl < now {
                    tracing::debug!(key = %record.key, "skipping expired set during replay");
                    continue;
                }
                store.replay_set(&record.key, &record.value, record.ttl).await;
            }
            WalAction::Delete => {
                store.replay_delete(&record.key).await;
            }
        }
        applied += 1;
    }

    Ok(applied)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::wal::Wal;
    use std::io::{Seek, SeekFrom};
    use tempfile::TempDir;

    fn test_config(dir: &TempDir) -> WalConfig {
        WalConfig {
            path: dir.path().join("wal.bin"),
            buffer_size: 2,
            flush_interval: Duration::from_secs(1),
        }
    }

    #[tokio::test]
    async fn log_close_replay_round_trip() {
        let dir = TempDir::new().unwrap();
        let config = test_config(&dir);

        let wal = WalManager::open(config.clone()).unwrap();
        wal.log(WalRecord::set("a", "1", 0, now_unix_secs())).await;
        wal.log(WalRecord::set("b", "2", 0, now_unix_secs())).await;
        wal.log(WalRecord::delete("a", now_unix_secs())).await;
        wal.close().await;

        let store = ShardedStore::new(4, Wal::Disabled);
        let applied = recover_from_wal(&store, &config.path).await.unwrap();

        assert_eq!(applied, 3);
        assert_eq!(store.get("a").await, None);
        assert_eq!(store.get("b").await, Some("2".to_string()));
    }

    #[tokio::test]
    async fn replay_skips_sets_that_expired_before_restart() {
        let dir = TempDir::new().unwrap();
        let config = test_config(&dir);

        let wal = WalManager::open(config.clone()).unwrap();
        // Written long ago with a short ttl: already dead.
        wal.log(WalRecord::set("stale", "v", 5, now_unix_secs() - 100))
            .await;
        wal.log(WalRecord::set("live", "v", 3600, now_unix_secs()))
            .await;
        wal.close().await;

        let store = ShardedStore::new(4, Wal::Disabled);
        let applied = recover_from_wal(&store, &config.path).await.unwrap();

        assert_eq!(applied, 1);
        assert_eq!(store.get("stale").await, None);
        assert_eq!(store.get("live").await, Some("v".to_string()));
    }

    #[tokio::test]
    async fn replay_fails_on_corrupted_payload() {
        let dir = TempDir::new().unwrap();
        let config = test_config(&dir);

        let wal = WalManager::open(config.clone()).unwrap();
        wal.log(WalRecord::set("key1", "value1", 0, now_unix_secs()))
            .await;
        wal.close().await;

        // Flip one byte inside the record payload.
        let mut file = OpenOptions::new().write(true).open(&config.path).unwrap();
        file.seek(SeekFrom::Start(10)).unwrap();
        file.write_all(&[0xFF]).unwrap();

        let store = ShardedStore::new(4, Wal::Disabled);
        let err = recover_from_wal(&store, &config.path).await.unwrap_err();
        assert!(matches!(
            err,
            WalError::ChecksumMismatch { .. } | WalError::Invalid { .. }
        ));
    }

    #[tokio::test]
    async fn replay_fails_on_truncated_tail() {
        let dir = TempDir::new().unwrap();
        let config = test_config(&dir);

        let wal = WalManager::open(config.clone()).unwrap();
        wal.log(WalRecord::set("key1", "value1", 0, now_unix_secs()))
            .await;
        wal.close().await;

        let data = std::fs::read(&config.path).unwrap();
        std::fs::write(&config.path, &data[..data.len() - 5]).unwrap();

        let store = ShardedStore::new(4, Wal::Disabled);
        let err = recover_from_wal(&store, &config.path).await.unwrap_err();
        assert!(matches!(err, WalError::Truncated { .. }));
    }

    #[tokio::test]
    async fn missing_file_is_an_empty_log() {
        let dir = TempDir::new().unwrap();
        let store = ShardedStore::new(4, Wal::Disabled);
        let applied = recover_from_wal(&store, &dir.path().join("absent.bin"))
            .await
            .unwrap();
        assert_eq!(applied, 0);
    }

    #[tokio::test]
    async fn ticker_flushes_partial_buffer() {
        let dir = TempDir::new().unwrap();
        let mut config = test_config(&dir);
        config.buffer_size = 100;

        let wal = WalManager::open(config.clone()).unwrap();
        wal.log(WalRecord::set("only", "one", 0, now_unix_secs()))
            .await;

        // Well under buffer_size, so only the periodic flush can write it.
        tokio::time::sleep(Duration::from_millis(2500)).await;
        let len = std::fs::metadata(&config.path).unwrap().len();
        assert!(len > 0);

        wal.close().await;
    }
}
