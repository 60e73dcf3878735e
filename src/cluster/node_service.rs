use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Arc;

use crate::cluster::error::ClusterError;
use crate::cluster::manager::ClusterManager;
use crate::config::Config;
use crate::rpc::RpcClient;

/// Replica fan-out over the registry. Writes go to every node in the replica
/// set and abort on the first failure (partial writes are possible and not
/// compensated); reads and deletes return the first success.
pub struct NodeService {
    manager: Arc<ClusterManager>,
    config_path: PathBuf,
    default_replicas: usize,
}

impl NodeService {
    pub fn new(
        manager: Arc<ClusterManager>,
        config_path: impl Into<PathBuf>,
        default_replicas: usize,
    ) -> Self {
        Self {
            manager,
            config_path: config_path.into(),
            default_replicas,
        }
    }

    pub fn manager(&self) -> &Arc<ClusterManager> {
        &self.manager
    }

    /// Re-read on every call so the replica count can be tuned without a
    /// restart; an unreadable config falls back to the value captured at
    /// startup.
    fn replica_count(&self) -> usize {
        match Config::load(&self.config_path) {
            Ok(config) => config.replica_count,
            Err(e) => {
                tracing::debug!(error = %e, "config reload failed, using startup replica count");
                self.default_replicas
            }
        }
    }

    pub async fn set_data(
        &self,
        data: &HashMap<String, String>,
        ttl: i64,
    ) -> Result<(), ClusterError> {
        let replicas = self.replica_count();

        for (key, value) in data {
            let nodes = self.manager.get_nodes(key, replicas);
            if nodes.is_empty() {
                return Err(ClusterError::NoActiveNodes);
            }

            for node in &nodes {
                let mut client = RpcClient::connect(&node.address).await.map_err(|e| {
                    ClusterError::ReplicaFailed {
                        address: node.address.clone(),
                        reason: e.to_string(),
                    }
                })?;

                let reply = client.set(key, value, ttl).await.map_err(|e| {
                    ClusterError::ReplicaFailed {
                        address: node.address.clone(),
                        reason: e.to_string(),
                    }
                })?;

                if !reply.success {
                    return Err(ClusterError::ReplicaFailed {
                        address: node.address.clone(),
                        reason: reply.error,
                    });
                }
            }
        }

        Ok(())
    }

    pub async fn get_data(&self, key: &str) -> Result<String, ClusterError> {
        let nodes = self.manager.get_nodes(key, self.replica_count());
        if nodes.is_empty() {
            return Err(ClusterError::NoActiveNodes);
        }

        for node in &nodes {
            let mut client = match RpcClient::connect(&node.address).await {
                Ok(client) => client,
                Err(e) => {
                    tracing::warn!(address = %node.address, error = %e, "rpc connection failed");
                    continue;
                }
            };

            let reply = match client.get(key).await {
                Ok(reply) => reply,
                Err(e) => {
                    tracing::warn!(address = %node.address, error = %e, "rpc get failed");
                    continue;
                }
            };

            if reply.success {
                return Ok(reply.data);
            }
        }

        Err(ClusterError::KeyNotFound)
    }

    pub async fn delete_data(&self, key: &str) -> Result<(), ClusterError> {
        let nodes = self.manager.get_nodes(key, self.replica_count());
        if nodes.is_empty() {
            return Err(ClusterError::NoActiveNodes);
        }

        for node in &nodes {
            let mut client = match RpcClient::connect(&node.address).await {
                Ok(client) => client,
                Err(e) => {
                    tracing::warn!(address = %node.address, error = %e, "rpc connection failed");
                    continue;
                }
            };

            let reply = match client.delete(key).await {
                Ok(reply) => reply,
                Err(e) => {
                    tracing::warn!(address = %node.address, error = %e, "rpc delete failed");
                    continue;
                }
            };

            if reply.success {
                return Ok(());
            }
        }

        Err(ClusterError::DeleteFailed)
    }
}
