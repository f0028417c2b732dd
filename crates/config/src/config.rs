//! The whole configuration file.

use crate::alien::AlienConfig;
use crate::error::{ConfigError, ConfigResult};
use crate::genesis::GenesisConfig;
use crate::node::{LoggingConfig, RpcConfig, StorageConfig};
use serde::{Deserialize, Serialize};
use std::path::Path;
use tracing::{debug, info};

/// Everything a node reads from its TOML file.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    /// `[alien]`
    pub alien: AlienConfig,
    /// `[[genesis.accounts]]`
    #[serde(default)]
    pub genesis: GenesisConfig,
    /// `[rpc]`
    #[serde(default)]
    pub rpc: RpcConfig,
    /// `[storage]`
    #[serde(default)]
    pub storage: StorageConfig,
    /// `[logging]`
    #[serde(default)]
    pub logging: LoggingConfig,
}

impl Config {
    /// Reads, parses and validates `path`.
    pub fn load(path: &Path) -> ConfigResult<Self> {
        let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        let config = Self::from_str(&text)?;
        info!(
            path = %path.display(),
            period = config.alien.period,
            max_signer_count = config.alien.max_signer_count,
            side_chain = config.alien.side_chain,
            "Loaded configuration"
        );
        Ok(config)
    }

    /// Parses and validates TOML text.
    #[allow(clippy::should_implement_trait)]
    pub fn from_str(text: &str) -> ConfigResult<Self> {
        let config: Self = toml::from_str(text)?;
        config.validate()?;
        Ok(config)
    }

    /// Checks every section, stopping at the first problem.
    pub fn validate(&self) -> ConfigResult<()> {
        self.alien.validate()?;
        self.genesis.validate()?;
        self.rpc.validate()?;
        self.storage.validate()?;
        self.logging.validate()?;
        debug!(accounts = self.genesis.accounts.len(), "Configuration valid");
        Ok(())
    }

    /// Writes the configuration as TOML.
    pub fn save(&self, path: &Path) -> ConfigResult<()> {
        let text = toml::to_string_pretty(self)?;
        std::fs::write(path, text).map_err(|source| ConfigError::Write {
            path: path.to_path_buf(),
            source,
        })
    }
}
