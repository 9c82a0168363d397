//! Node configuration.
//!
//! [`NodeConfig`] holds the data directory, chain policy and log level.
//! Chain policy can be loaded from a JSON file; the CLI maps its flags on top.

use std::path::{Path, PathBuf};

use ember_core::params::ChainParams;
use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("read {}: {source}", path.display())] Read { path: PathBuf, source: std::io::Error },
    #[error("parse {}: {source}", path.display())] Parse { path: PathBuf, source: serde_json::Error },
}

/// Configuration for a node instance.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NodeConfig {
    /// Root directory for all persistent data.
    pub data_dir: PathBuf,
    /// Chain policy.
    pub params: ChainParams,
    /// Log level filter string (e.g. "info", "debug", "ember_node_lib=trace").
    pub log_level: String,
}

impl Default for NodeConfig {
    fn default() -> Self {
        let data_dir = dirs::data_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("ember");

        Self {
            data_dir,
            params: ChainParams::default(),
            log_level: "info".to_string(),
        }
    }
}

impl NodeConfig {
    /// Path to the RocksDB metadata index.
    pub fn metadata_path(&self) -> PathBuf {
        self.data_dir.join("index")
    }

    /// Directory holding block files.
    pub fn blocks_path(&self) -> PathBuf {
        self.data_dir.join("blocks")
    }

    /// Load [`ChainParams`] from a JSON file. Missing fields take their defaults.
    pub fn load_params(path: impl AsRef<Path>) -> Result<ChainParams, ConfigError> {
        let path = path.as_ref();
        let raw = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        serde_json::from_str(&raw).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })
    }
}
