use std::path::PathBuf;
use std::time::{Duration, SystemTime};

use parking_lot::Mutex;

use crate::cluster::nodes_file::read_nodes;
use crate::rpc::RpcClient;

const PING_TIMEOUT: Duration = Duration::from_secs(3);

/// A registered peer. Indices are dense positions in the registry,
/// preserved on re-registration and compacted on removal.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Node {
    pub address: String,
    pub active: bool,
    pub index: usize,
}

/// Membership registry plus the two periodic duties over it: health pinging
/// (which only deactivates) and node-file reconciliation (the only path that
/// removes nodes).
#[derive(Debug)]
pub struct ClusterManager {
    nodes: Mutex<Vec<Node>>,
    pub(crate) heartbeat_interval: Duration,
    pub(crate) config_check_interval: Duration,
    nodes_file: PathBuf,
    last_mod_time: Mutex<Option<SystemTime>>,
}

impl ClusterManager {
    pub fn new(
        nodes_file: impl Into<PathBuf>,
        heartbeat_interval: Duration,
        config_check_interval: Duration,
    ) -> Self {
        Self {
            nodes: Mutex::new(Vec::new()),
            heartbeat_interval,
            config_check_interval,
            nodes_file: nodes_file.into(),
            last_mod_time: Mutex::new(None),
        }
    }

    /// Register an address. A known address is revived in place, keeping its
    /// index; a new one is appended.
    pub fn add_node(&self, address: &str) {
        let mut nodes = self.nodes.lock();

        if let Some(node) = nodes.iter_mut().find(|n| n.address == address) {
            node.active = true;
            tracing::info!(%address, index = node.index, "node updated");
            return;
        }

        let index = nodes.len();
        nodes.push(Node {
            address: address.to_string(),
            active: true,
            index,
        });
        tracing::info!(%address, index, "node added");
    }

    /// Drop an address and renumber the tail so indices stay dense.
    pub fn remove_node(&self, address: &str) {
        let mut nodes = self.nodes.lock();

        if let Some(pos) = nodes.iter().position(|n| n.address == address) {
            nodes.remove(pos);
            for (i, node) in nodes.iter_mut().enumerate().skip(pos) {
                node.index = i;
            }
            tracing::info!(%address, "node removed");
        }
    }

    pub fn get_active_nodes(&self) -> Vec<String> {
        self.nodes
            .lock()
            .iter()
            .filter(|n| n.active)
            .map(|n| n.address.clone())
            .collect()
    }

    pub fn node_count(&self) -> usize {
        self.nodes.lock().len()
    }

    /// The replica set for a key: primary position comes from hashing over
    /// the whole registry, then up to `replicas + 1` distinct nodes are taken
    /// from the active subset, wrapping. Empty when nothing is active.
    pub fn get_nodes(&self, key: &str, replicas: usize) -> Vec<Node> {
        let nodes = self.nodes.lock();
        if nodes.is_empty() {
            return Vec::new();
        }

        let primary = crc32fast::hash(key.as_bytes()) as usize % nodes.len();
        let active: Vec<Node> = nodes.iter().filter(|n| n.active).cloned().collect();
        if active.is_empty() {
            return Vec::new();
        }

        let start = primary % active.len();
        let count = (replicas + 1).min(active.len());
        (0..count)
            .map(|i| active[(start + i) % active.len()].clone())
            .collect()
    }

    /// True iff a transient connection succeeds and the peer answers the
    /// ping affirmatively within the deadline.
    pub async fn ping_node(&self, address: &str) -> bool {
        let probe = async {
            let mut client = RpcClient::connect(address).await?;
            client.ping().await
        };
        matches!(tokio::time::timeout(PING_TIMEOUT, probe).await, Ok(Ok(true)))
    }

    /// One health pass: snapshot the addresses, ping with the lock released,
    /// re-acquire to flip flags. Nodes are never removed here.
    pub async fn run_health_check_once(&self) {
        let addresses: Vec<String> = {
            self.nodes.lock().iter().map(|n| n.address.clone()).collect()
        };

        for address in addresses {
            if self.ping_node(&address).await {
                continue;
            }
            let mut nodes = self.nodes.lock();
            if let Some(node) = nodes.iter_mut().find(|n| n.address == address) {
                if node.active {
                    tracing::warn!(%address, "node inactive");
                }
                node.active = false;
            }
        }
    }

    /// One reconciliation pass against the node file. An unreadable or
    /// unchanged file is a no-op.
    pub async fn sync_with_nodes_file(&self) {
        let mod_time = match std::fs::metadata(&self.nodes_file).and_then(|m| m.modified()) {
            Ok(t) => t,
            Err(_) => return,
        };

        {
            let mut last = self.last_mod_time.lock();
            if *last == Some(mod_time) {
                return;
            }
            *last = Some(mod_time);
        }

        let desired = match read_nodes(&self.nodes_file) {
            Ok(nodes) => nodes,
            Err(e) => {
                tracing::warn!(error = %e, "failed to read nodes file");
                return;
            }
        };

        tracing::info!(nodes = desired.len(), "syncing cluster with nodes file");
        self.reconcile(&desired).await;
    }

    /// Apply a desired membership list. The diff is computed under the lock;
    /// mutation happens after it is released, through add_node/remove_node,
    /// which take the lock themselves.
    pub async fn reconcile(&self, desired: &[String]) {
        let (to_add, to_remove) = {
            let nodes = self.nodes.lock();

            let to_add: Vec<String> = desired
                .iter()
                .filter(|addr| !nodes.iter().any(|n| n.address == **addr && n.active))
                .cloned()
                .collect();

            let to_remove: Vec<String> = nodes
                .iter()
                .filter(|n| !desired.iter().any(|addr| *addr == n.address))
                .map(|n| n.address.clone())
                .collect();

            (to_add, to_remove)
        };

        for address in to_add {
            if self.ping_node(&address).await {
                self.add_node(&address);
            } else {
                tracing::warn!(%address, "listed node unreachable, not adding");
            }
        }

        for address in to_remove {
            self.remove_node(&address);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn manager() -> ClusterManager {
        ClusterManager::new(
            "nodes.json",
            Duration::from_secs(10),
            Duration::from_secs(15),
        )
    }

    fn set_active(manager: &ClusterManager, address: &str, active: bool) {
        let mut nodes = manager.nodes.lock();
        if let Some(node) = nodes.iter_mut().find(|n| n.address == address) {
            node.active = active;
        }
    }

    #[test]
    fn add_is_idempotent_and_revives() {
        let m = manager();
        m.add_node("a:1");
        m.add_node("b:1");
        set_active(&m, "a:1", false);

        m.add_node("a:1");

        let nodes = m.nodes.lock();
        assert_eq!(nodes.len(), 2);
        assert!(nodes[0].active);
        assert_eq!(nodes[0].index, 0);
    }

    #[test]
    fn remove_renumbers_trailing_indices() {
        let m = manager();
        m.add_node("a:1");
        m.add_node("b:1");
        m.add_node("c:1");

        m.remove_node("b:1");

        let nodes = m.nodes.lock();
        assert_eq!(nodes.len(), 2);
        assert_eq!(nodes[0].address, "a:1");
        assert_eq!(nodes[0].index, 0);
        assert_eq!(nodes[1].address, "c:1");
        assert_eq!(nodes[1].index, 1);
    }

    #[test]
    fn get_nodes_is_stable_across_calls() {
        let m = manager();
        m.add_node("a:1");
        m.add_node("b:1");
        m.add_node("c:1");

        let first = m.get_nodes("abc", 1);
        let second = m.get_nodes("abc", 1);
        assert_eq!(first, second);
        assert_eq!(first.len(), 2);
    }

    #[test]
    fn get_nodes_hashes_primary_over_registry() {
        let m = manager();
        m.add_node("a:1");
        m.add_node("b:1");
        m.add_node("c:1");

        // CRC32-IEEE("abc") = 0x352441C2 = 892613058; 892613058 % 3 = 0.
        let replica_set = m.get_nodes("abc", 1);
        assert_eq!(replica_set[0].address, "a:1");
        assert_eq!(replica_set[1].address, "b:1");
    }

    #[test]
    fn get_nodes_wraps_over_active_subset() {
        let m = manager();
        m.add_node("a:1");
        m.add_node("b:1");
        m.add_node("c:1");
        set_active(&m, "a:1", false);

        // Primary index 0 over 3 registered; active subset [b, c], start 0.
        let replica_set = m.get_nodes("abc", 1);
        assert_eq!(replica_set[0].address, "b:1");
        assert_eq!(replica_set[1].address, "c:1");
    }

    #[test]
    fn get_nodes_caps_at_active_count() {
        let m = manager();
        m.add_node("a:1");
        m.add_node("b:1");

        let replica_set = m.get_nodes("abc", 5);
        assert_eq!(replica_set.len(), 2);
        assert_ne!(replica_set[0].address, replica_set[1].address);
    }

    #[test]
    fn get_nodes_empty_cases() {
        let m = manager();
        assert!(m.get_nodes("abc", 1).is_empty());

        m.add_node("a:1");
        set_active(&m, "a:1", false);
        assert!(m.get_nodes("abc", 1).is_empty());
    }

    #[tokio::test]
    async fn reconcile_removes_unlisted_nodes() {
        let m = manager();
        m.add_node("a:1");
        m.add_node("b:1");

        // Desired list keeps only a:1; it is already active so no ping
        // is attempted for it.
        m.reconcile(&["a:1".to_string()]).await;

        let nodes = m.nodes.lock();
        assert_eq!(nodes.len(), 1);
        assert_eq!(nodes[0].address, "a:1");
    }
}
