//! Process-local sections: RPC, storage and logging.
//!
//! None of these affect consensus; two nodes may differ here freely.

use crate::error::{ConfigError, ConfigResult};
use serde::{Deserialize, Serialize};
use std::net::SocketAddr;

/// `[rpc]`
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RpcConfig {
    /// HTTP listen address
    pub http_address: String,
    /// Concurrent connection cap
    pub max_connections: u32,
}

impl RpcConfig {
    /// The listen address must parse as `host:port`.
    pub fn validate(&self) -> ConfigResult<()> {
        self.http_address
            .parse::<SocketAddr>()
            .map(|_| ())
            .map_err(|_| ConfigError::InvalidListenAddress(self.http_address.clone()))
    }
}

impl Default for RpcConfig {
    fn default() -> Self {
        Self {
            http_address: "127.0.0.1:8545".into(),
            max_connections: 100,
        }
    }
}

/// `[storage]`
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageConfig {
    /// RocksDB directory
    pub data_dir: String,
    /// Block cache in MiB
    pub cache_size_mb: u64,
}

impl StorageConfig {
    /// The data directory must be set.
    pub fn validate(&self) -> ConfigResult<()> {
        if self.data_dir.trim().is_empty() {
            return Err(ConfigError::Missing("storage.data_dir"));
        }
        if self.cache_size_mb == 0 {
            return Err(ConfigError::Zero("storage.cache_size_mb"));
        }
        Ok(())
    }
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            data_dir: "./data".into(),
            cache_size_mb: 256,
        }
    }
}

const LEVELS: &str = "trace, debug, info, warn, error";
const FORMATS: &str = "text, json, compact";

/// `[logging]`
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Default level, overridden by `RUST_LOG`
    pub level: String,
    /// Line format
    pub format: String,
    /// Append to this file instead of stderr
    pub file: Option<String>,
}

impl LoggingConfig {
    /// Level and format must be known names, in any case.
    pub fn validate(&self) -> ConfigResult<()> {
        one_of("logging.level", &self.level, LEVELS)?;
        one_of("logging.format", &self.format, FORMATS)
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".into(),
            format: "text".into(),
            file: None,
        }
    }
}

fn one_of(field: &'static str, value: &str, choices: &'static str) -> ConfigResult<()> {
    if choices.split(", ").any(|c| c.eq_ignore_ascii_case(value)) {
        return Ok(());
    }
    Err(ConfigError::Unsupported {
        field,
        choices,
        value: value.to_string(),
    })
}
