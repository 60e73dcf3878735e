use std::sync::Arc;
use std::time::Duration;

use tokio::sync::oneshot;
use tokio::time::sleep;

use crate::storage::ShardedStore;

/// Background worker that sweeps expired entries out of the store on a fixed
/// interval.
pub struct CleanupWorker {
    store: Arc<ShardedStore>,
    interval: Duration,
    shutdown_tx: Option<oneshot::Sender<()>>,
}

impl CleanupWorker {
    pub fn new(store: Arc<ShardedStore>, interval: Duration) -> Self {
        Self {
            store,
            interval,
            shutdown_tx: None,
        }
    }

    pub fn start(&mut self) -> tokio::task::JoinHandle<()> {
        let (tx, rx) = oneshot::channel();
        self.shutdown_tx = Some(tx);

        let store = self.store.clone();
        let interval = self.interval;

        tokio::spawn(async move {
            tokio::pin!(rx);
            loop {
                tokio::select! {
                    _ = sleep(interval) => {
                        store.cleanup();
                    }
                    _ = &mut rx => {
                        tracing::info!("cleanup worker shutting down");
                        break;
                    }
                }
            }
        })
    }

    pub fn shutdown(&mut self) {
        if let Some(tx) = self.shutdown_tx.take() {
            let _ = tx.send(());
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::time::sleep;

    #[tokio::test]
    async fn worker_sweeps_expired_entries() {
        let store = ShardedStore::in_memory(4);
        store.set("gone", "v", 1).await;

        let mut worker = CleanupWorker::new(store.clone(), Duration::from_millis(200));
        let handle = worker.start();

        sleep(Duration::from_millis(2500)).await;
        assert_eq!(store.key_count(), 0);

        worker.shutdown();
        let _ = handle.await;
    }
}
