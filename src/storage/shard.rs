use parking_lot::RwLock;
use std::collections::HashMap;

use crate::storage::heap::ExpiryHeap;
use crate::storage::types::Entry;

/// One slice of the keyspace: a map plus the expiry heap for its keys, both
/// behind a single read/write lock.
///
/// Invariant: a key whose entry has `expires_at > 0` has a heap node carrying
/// that same expiration; a key with `expires_at == 0` has none. Stale nodes
/// left behind by a replace are tolerated by the cleanup pop loop.
#[derive(Debug, Default)]
pub struct Shard {
    pub(crate) inner: RwLock<ShardInner>,
}

#[derive(Debug, Default)]
pub(crate) struct ShardInner {
    pub(crate) map: HashMap<String, Entry>,
    pub(crate) expiries: ExpiryHeap,
}

impl Shard {
    pub fn new() -> Self {
        Self {
            inner: RwLock::new(ShardInner {
                map: HashMap::new(),
                expiries: ExpiryHeap::new(),
            }),
        }
    }

    pub fn get(&self, key: &str) -> Option<Entry> {
        let inner = self.inner.read();
        inner.map.get(key).cloned()
    }

    pub fn set(&self, key: &str, entry: Entry) {
        let mut guard = self.inner.write();
        let inner = &mut *guard;

        let had_ttl = inner.map.get(key).map_or(false, |old| old.expires_at > 0);
        if had_ttl {
            inner.expiries.remove_by_key(key);
        }

        let expires_at = entry.expires_at;
        inner.map.insert(key.to_string(), entry);
        if expires_at > 0 {
            inner.expiries.push(expires_at, key.to_string());
        }
    }

    pub fn del(&self, key: &str) -> Option<Entry> {
        let mut guard = self.inner.write();
        let inner = &mut *guard;

        let old = inner.map.remove(key);
        if old.as_ref().map_or(false, |e| e.expires_at > 0) {
            inner.expiries.remove_by_key(key);
        }
        old
    }

    pub fn len(&self) -> usize {
        let inner = self.inner.read();
        inner.map.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Drop every entry whose heap node has come due. A popped node whose key
    /// is gone or whose expiration no longer matches the live entry is a
    /// leftover from a replace and is discarded without touching the map.
    /// Returns the keys that were actually evicted.
    pub fn evict_expired(&self, now: i64) -> Vec<String> {
        let mut guard = self.inner.write();
        let inner = &mut *guard;
        let mut evicted = Vec::new();

        loop {
            let due = match inner.expiries.peek() {
                Some(node) => node.expires_at <= now,
                None => false,
            };
            if !due {
                break;
            }
            if let Some(node) = inner.expiries.pop() {
                match inner.map.get(&node.key) {
                    Some(entry) if entry.expires_at == node.expires_at => {
                        inner.map.remove(&node.key);
                        evicted.push(node.key);
                    }
                    _ => {}
                }
            }
        }

        evicted
    }
}
