pub mod error;
pub mod manager;
pub mod node_service;
pub mod nodes_file;

pub use error::ClusterError;
pub use manager::{ClusterManager, Node};
pub use node_service::NodeService;
pub use nodes_file::{read_nodes, NodesConfig, NodesFile};

use std::sync::Arc;

use tokio::sync::oneshot;
use tokio::time::sleep;

/// The manager's two periodic duties as background workers: the heartbeat
/// loop and the node-file monitor.
pub struct ClusterWorkers {
    health_tx: Option<oneshot::Sender<()>>,
    monitor_tx: Option<oneshot::Sender<()>>,
}

impl ClusterWorkers {
    pub fn start(manager: Arc<ClusterManager>) -> Self {
        let (health_tx, health_rx) = oneshot::channel();
        let (monitor_tx, monitor_rx) = oneshot::channel();

        {
            let manager = manager.clone();
            let interval = manager.heartbeat_interval;
            tokio::spawn(async move {
                let rx = health_rx;
                tokio::pin!(rx);
                loop {
                    tokio::select! {
                        _ = sleep(interval) => {
                            manager.run_health_check_once().await;
                        }
                        _ = &mut rx => {
                            tracing::info!("health check worker shutting down");
                            break;
                        }
                    }
                }
            });
        }

        {
            let interval = manager.config_check_interval;
            tokio::spawn(async move {
                let rx = monitor_rx;
                tokio::pin!(rx);
                loop {
                    tokio::select! {
                        _ = sleep(interval) => {
                            manager.sync_with_nodes_file().await;
                        }
                        _ = &mut rx => {
                            tracing::info!("config monitor shutting down");
                            break;
                        }
                    }
                }
            });
        }

        Self {
            health_tx: Some(health_tx),
            monitor_tx: Some(monitor_tx),
        }
    }

    pub fn shutdown(&mut self) {
        if let Some(tx) = self.health_tx.take() {
            let _ = tx.send(());
        }
        if let Some(tx) = self.monitor_tx.take() {
            let _ = tx.send(());
        }
    }
}
