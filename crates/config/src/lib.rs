//! # Alien Configuration
//!
//! One TOML file configures a node. The `[alien]` section holds the
//! consensus parameters every node on a network must share; the rest only
//! affects the local process.
//!
//! ```rust,ignore
//! use alien_config::Config;
//! use std::path::Path;
//!
//! let config = Config::load(Path::new("alien.toml"))?;
//! println!("period: {}s", config.alien.period);
//! ```
//!
//! Sections:
//!
//! - `[alien]` period, epoch, rotation length, forks, side-chain settings
//! - `[[genesis.accounts]]` balances that seed the self-votes
//! - `[rpc]`, `[storage]`, `[logging]` process settings

mod alien;
mod config;
mod error;
mod genesis;
mod node;

pub use alien::{AlienConfig, CandidateMode};
pub use config::Config;
pub use error::{ConfigError, ConfigResult};
pub use genesis::{GenesisAccount, GenesisConfig};
pub use node::{LoggingConfig, RpcConfig, StorageConfig};
