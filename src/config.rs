use std::net::SocketAddr;
use std::path::Path;

use serde::Deserialize;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("cannot read config file: {0}")]
    Io(#[from] std::io::Error),

    #[error("cannot parse config file: {0}")]
    Parse(#[from] serde_json::Error),

    #[error("invalid config: {0}")]
    Invalid(String),
}

/// Process configuration, loaded from a JSON document. Every key is
/// required; a missing or unparseable key is fatal at startup.
#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    /// Listen addresses in ":NNNN" form.
    pub http_port: String,
    pub rpc_port: String,
    pub cluster_port: String,

    #[serde(rename = "WAL_path")]
    pub wal_path: String,
    #[serde(rename = "WAL_bufferSize")]
    pub wal_buffer_size: usize,
    /// Seconds between periodic WAL flushes.
    #[serde(rename = "WAL_flushInterval")]
    pub wal_flush_interval: u64,
    pub wal_enabled: bool,

    /// Seconds between expiry sweeps.
    pub cleanup_interval: u64,
    /// Seconds between cluster health pings.
    pub heartbeat_interval: u64,
    /// Seconds between node-file reconciliation passes.
    #[serde(rename = "configCheck_interval")]
    pub config_check_interval: u64,

    pub auth_enabled: bool,
    pub auth_token: String,

    pub cluster_enabled: bool,
    pub shard_count: usize,
    /// Extra replicas beyond the primary; 0 means no replication.
    pub replica_count: usize,

    /// Declarative cluster membership file.
    #[serde(default = "default_nodes_file")]
    pub nodes_file: String,
}

fn default_nodes_file() -> String {
    "cluster/nodes.json".to_string()
}

impl Config {
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let raw = std::fs::read_to_string(path)?;
        let config: Config = serde_json::from_str(&raw)?;
        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> Result<(), ConfigError> {
        if self.shard_count == 0 {
            return Err(ConfigError::Invalid(
                "shard_count must be at least 1".to_string(),
            ));
        }
        Ok(())
    }
}

/// Resolve a ":NNNN" listen spec (or a full host:port) to a socket address.
pub fn listen_addr(spec: &str) -> Result<SocketAddr, ConfigError> {
    let normalized = if spec.starts_with(':') {
        format!("0.0.0.0{}", spec)
    } else {
        spec.to_string()
    };
    normalized
        .parse()
        .map_err(|_| ConfigError::Invalid(format!("bad listen address {:?}", spec)))
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = r#"{
        "http_port": ":8080",
        "rpc_port": ":8081",
        "cluster_port": ":8082",
        "WAL_path": "data/wal.bin",
        "WAL_bufferSize": 100,
        "WAL_flushInterval": 5,
        "wal_enabled": true,
        "cleanup_interval": 60,
        "heartbeat_interval": 10,
        "configCheck_interval": 15,
        "auth_enabled": true,
        "auth_token": "secret",
        "cluster_enabled": false,
        "shard_count": 8,
        "replica_count": 1
    }"#;

    #[test]
    fn parses_all_keys() {
        let config: Config = serde_json::from_str(SAMPLE).unwrap();
        assert_eq!(config.http_port, ":8080");
        assert_eq!(config.wal_path, "data/wal.bin");
        assert_eq!(config.wal_buffer_size, 100);
        assert_eq!(config.wal_flush_interval, 5);
        assert!(config.wal_enabled);
        assert_eq!(config.shard_count, 8);
        assert_eq!(config.replica_count, 1);
        assert_eq!(config.nodes_file, "cluster/nodes.json");
    }

    #[test]
    fn missing_key_is_an_error() {
        let raw = r#"{"http_port": ":8080"}"#;
        assert!(serde_json::from_str::<Config>(raw).is_err());
    }

    #[test]
    fn zero_shards_rejected() {
        let mut config: Config = serde_json::from_str(SAMPLE).unwrap();
        config.shard_count = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn listen_addr_accepts_port_only_spec() {
        let addr = listen_addr(":8080").unwrap();
        assert_eq!(addr.port(), 8080);

        let addr = listen_addr("127.0.0.1:9000").unwrap();
        assert_eq!(addr.port(), 9000);

        assert!(listen_addr("not an address").is_err());
    }
}
