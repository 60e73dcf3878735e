use std::sync::Arc;

use crate::storage::shard::Shard;
use crate::storage::types::{now_unix_secs, Entry};
use crate::wal::{Wal, WalRecord};

/// The sharded TTL store. Keys are dispatched to a fixed number of shards by
/// CRC32-IEEE; each shard linearizes its own writes behind its lock. Store
/// operations never fail: WAL trouble is logged and the write proceeds.
#[derive(Debug)]
pub struct ShardedStore {
    shards: Vec<Shard>,
    wal: Wal,
}

impl ShardedStore {
    pub fn new(shard_count: usize, wal: Wal) -> Self {
        let shards = (0..shard_count.max(1)).map(|_| Shard::new()).collect();
        Self { shards, wal }
    }

    pub fn shard_count(&self) -> usize {
        self.shards.len()
    }

    pub(crate) fn shard_index(&self, key: &str) -> usize {
        crc32fast::hash(key.as_bytes()) as usize % self.shards.len()
    }

    fn shard_for(&self, key: &str) -> &Shard {
        &self.shards[self.shard_index(key)]
    }

    /// Insert or replace an entry. `ttl_secs == 0` means the entry never
    /// expires; a negative ttl resolves to an already-past expiration, so the
    /// entry is dead on arrival and reaped by the next cleanup.
    pub async fn set(&self, key: &str, value: &str, ttl_secs: i64) {
        self.set_inner(key, value, ttl_secs, true).await;
    }

    pub(crate) async fn replay_set(&self, key: &str, value: &str, ttl_secs: i64) {
        self.set_inner(key, value, ttl_secs, false).await;
    }

    async fn set_inner(&self, key: &str, value: &str, ttl_secs: i64, log: bool) {
        let entry = Entry::new(value.to_string(), ttl_secs);
        self.shard_for(key).set(key, entry);

        if log {
            self.wal
                .log(WalRecord::set(key, value, ttl_secs, now_unix_secs()))
                .await;
        }
    }

    /// Fetch a live value. An entry found past its expiration is deleted on
    /// the spot (emitting the usual delete record) and reported as absent.
    pub async fn get(&self, key: &str) -> Option<String> {
        let entry = self.shard_for(key).get(key)?;
        if entry.is_expired(now_unix_secs()) {
            self.delete(key).await;
            return None;
        }
        Some(entry.value)
    }

    /// Remove a key. Deleting an absent key is a no-op in the map but still
    /// emits a log record, which replay tolerates.
    pub async fn delete(&self, key: &str) {
        self.delete_inner(key, true).await;
    }

    pub(crate) async fn replay_delete(&self, key: &str) {
        self.delete_inner(key, false).await;
    }

    async fn delete_inner(&self, key: &str, log: bool) {
        self.shard_for(key).del(key);

        if log {
            self.wal
                .log(WalRecord::delete(key, now_unix_secs()))
                .await;
        }
    }

    /// Sweep every shard, evicting entries whose expiration has passed. Each
    /// shard's write lock is held only for that shard's sweep.
    pub fn cleanup(&self) {
        let now = now_unix_secs();
        let mut evicted = 0usize;
        for shard in &self.shards {
            evicted += shard.evict_expired(now).len();
        }
        if evicted > 0 {
            tracing::debug!(evicted, "cleanup sweep evicted expired keys");
        }
    }

    pub fn key_count(&self) -> usize {
        self.shards.iter().map(|shard| shard.len()).sum()
    }

    /// Final flush and close of the WAL. No store operation may follow.
    pub async fn close(&self) {
        self.wal.close().await;
    }
}

impl ShardedStore {
    /// Convenience constructor for a store without durability.
    pub fn in_memory(shard_count: usize) -> Arc<Self> {
        Arc::new(Self::new(shard_count, Wal::Disabled))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::time::{sleep, Duration};

    #[tokio::test]
    async fn set_get_delete_round_trip() {
        let store = ShardedStore::in_memory(4);

        store.set("foo", "bar", 0).await;
        assert_eq!(store.get("foo").await, Some("bar".to_string()));

        store.delete("foo").await;
        assert_eq!(store.get("foo").await, None);
    }

    #[tokio::test]
    async fn ttl_entry_expires() {
        let store = ShardedStore::in_memory(4);

        store.set("k", "v", 1).await;
        assert_eq!(store.get("k").await, Some("v".to_string()));

        sleep(Duration::from_secs(2)).await;
        assert_eq!(store.get("k").await, None);
    }

    #[tokio::test]
    async fn delete_is_idempotent() {
        let store = ShardedStore::in_memory(4);

        store.set("k", "v", 0).await;
        store.delete("k").await;
        store.delete("k").await;
        assert_eq!(store.get("k").await, None);
    }

    #[tokio::test]
    async fn replace_extends_lifetime() {
        let store = ShardedStore::in_memory(4);

        store.set("k", "v1", 1).await;
        store.set("k", "v2", 100).await;

        // Past the first ttl, the replacement must still be alive: the stale
        // heap node from the first set must not evict it.
        sleep(Duration::from_secs(2)).await;
        store.cleanup();
        assert_eq!(store.get("k").await, Some("v2".to_string()));
    }

    #[tokio::test]
    async fn cleanup_reaps_expired_keys() {
        let store = ShardedStore::in_memory(4);

        store.set("short", "v", 1).await;
        store.set("keep", "v", 0).await;

        sleep(Duration::from_secs(2)).await;
        store.cleanup();

        assert_eq!(store.key_count(), 1);
        assert_eq!(store.get("keep").await, Some("v".to_string()));
    }

    #[tokio::test]
    async fn shard_dispatch_is_stable() {
        let store = ShardedStore::in_memory(4);

        // CRC32-IEEE("abc") = 0x352441C2; 0x352441C2 % 4 = 2.
        assert_eq!(store.shard_index("abc"), 2);
        for _ in 0..10 {
            assert_eq!(store.shard_index("abc"), 2);
        }
    }

    #[tokio::test]
    async fn negative_ttl_is_dead_on_arrival() {
        let store = ShardedStore::in_memory(4);

        store.set("k", "v", -5).await;
        assert_eq!(store.get("k").await, None);
    }

    #[tokio::test]
    async fn many_keys_across_shards() {
        let store = ShardedStore::in_memory(8);

        for i in 0..100 {
            let key = format!("key_{}", i);
            store.set(&key, &format!("value_{}", i), 0).await;
        }
        for i in 0..100 {
            let key = format!("key_{}", i);
            assert_eq!(store.get(&key).await, Some(format!("value_{}", i)));
        }
    }
}
