use std::sync::Arc;

use tokio::signal;
use tracing::info;

use crate::cluster::ClusterWorkers;
use crate::storage::{CleanupWorker, ShardedStore};

/// Owns every long-lived task so shutdown happens in one place: workers get
/// their shutdown signals, server tasks are aborted, and the store performs
/// its final WAL flush before the process exits.
pub struct ServerHandle {
    pub store: Arc<ShardedStore>,
    pub cleanup: CleanupWorker,
    pub http_handle: tokio::task::JoinHandle<()>,
    pub rpc_handle: tokio::task::JoinHandle<()>,
    pub cluster_handle: Option<tokio::task::JoinHandle<()>>,
    pub cluster_workers: Option<ClusterWorkers>,
}

impl ServerHandle {
    pub async fn wait_for_shutdown(mut self) {
        let mut sigterm = match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(sig) => sig,
            Err(e) => {
                tracing::error!(error = %e, "cannot install SIGTERM handler");
                let _ = signal::ctrl_c().await;
                self.shutdown().await;
                return;
            }
        };

        tokio::select! {
            _ = signal::ctrl_c() => {
                info!("received ctrl-c, shutting down");
            }
            _ = sigterm.recv() => {
                info!("received SIGTERM, shutting down");
            }
        }

        self.shutdown().await;
    }

    async fn shutdown(&mut self) {
        self.cleanup.shutdown();
        if let Some(workers) = self.cluster_workers.as_mut() {
            workers.shutdown();
        }

        self.http_handle.abort();
        self.rpc_handle.abort();
        if let Some(handle) = self.cluster_handle.as_ref() {
            handle.abort();
        }

        self.store.close().await;
        info!("shutdown complete");
    }
}
