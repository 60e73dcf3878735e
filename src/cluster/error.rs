use thiserror::Error;

#[derive(Error, Debug)]
pub enum ClusterError {
    #[error("no active nodes available")]
    NoActiveNodes,

    #[error("no key was found")]
    KeyNotFound,

    #[error("all nodes failed to delete key")]
    DeleteFailed,

    #[error("replica {address} failed: {reason}")]
    ReplicaFailed { address: String, reason: String },

    #[error("nodes file I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("nodes file parse error: {0}")]
    Parse(#[from] serde_json::Error),
}
