use std::path::{Path, PathBuf};

use parking_lot::Mutex;
use serde::{Deserialize, Serialize};

use crate::cluster::error::ClusterError;

/// On-disk membership document: `{"nodes": ["host:port", ...]}`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct NodesConfig {
    pub nodes: Vec<String>,
}

/// Read the membership list without taking the write mutex; the config
/// monitor polls through this.
pub fn read_nodes(path: &Path) -> Result<Vec<String>, ClusterError> {
    let raw = std::fs::read_to_string(path)?;
    let config: NodesConfig = serde_json::from_str(&raw)?;
    Ok(config.nodes)
}

/// Handle for mutating the node file. Writes go through a mutex so admin
/// additions do not interleave.
#[derive(Debug)]
pub struct NodesFile {
    path: PathBuf,
    lock: Mutex<()>,
}

impl NodesFile {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            lock: Mutex::new(()),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn load(&self) -> Result<NodesConfig, ClusterError> {
        let raw = std::fs::read_to_string(&self.path)?;
        Ok(serde_json::from_str(&raw)?)
    }

    /// Append an address, keeping the file free of duplicates. A missing
    /// file is created.
    pub fn append(&self, address: &str) -> Result<(), ClusterError> {
        let _guard = self.lock.lock();

        let mut config = match std::fs::read_to_string(&self.path) {
            Ok(raw) => serde_json::from_str::<NodesConfig>(&raw)?,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => NodesConfig::default(),
            Err(e) => return Err(e.into()),
        };

        if config.nodes.iter().any(|a| a == address) {
            return Ok(());
        }
        config.nodes.push(address.to_string());

        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }
        let pretty = serde_json::to_string_pretty(&config)?;
        std::fs::write(&self.path, pretty)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn append_creates_and_deduplicates() {
        let dir = TempDir::new().unwrap();
        let file = NodesFile::new(dir.path().join("nodes.json"));

        file.append("127.0.0.1:8081").unwrap();
        file.append("127.0.0.1:8082").unwrap();
        file.append("127.0.0.1:8081").unwrap();

        let config = file.load().unwrap();
        assert_eq!(config.nodes, vec!["127.0.0.1:8081", "127.0.0.1:8082"]);

        let via_read = read_nodes(file.path()).unwrap();
        assert_eq!(via_read, config.nodes);
    }

    #[test]
    fn read_missing_file_is_an_error() {
        let dir = TempDir::new().unwrap();
        assert!(read_nodes(&dir.path().join("absent.json")).is_err());
    }
}
