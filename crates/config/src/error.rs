//! Configuration errors.

use std::path::PathBuf;
use thiserror::Error;

/// Why a configuration could not be loaded, saved or accepted.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// The file could not be read
    #[error("cannot read {path}: {source}")]
    Read {
        /// File that was read
        path: PathBuf,
        /// Underlying error
        #[source]
        source: std::io::Error,
    },

    /// The file could not be written
    #[error("cannot write {path}: {source}")]
    Write {
        /// File that was written
        path: PathBuf,
        /// Underlying error
        #[source]
        source: std::io::Error,
    },

    /// Not valid TOML, or a key has the wrong type
    #[error("malformed config: {0}")]
    Parse(#[from] toml::de::Error),

    /// The configuration cannot be rendered as TOML
    #[error("cannot encode config: {0}")]
    Encode(#[from] toml::ser::Error),

    /// A count or interval that must be positive is zero
    #[error("{0} must be non-zero")]
    Zero(&'static str),

    /// The genesis rotation would be empty
    #[error("alien.self_vote_signers is empty")]
    NoSelfVoteSigners,

    /// Side-chain mode without a main-chain endpoint
    #[error("alien.side_chain requires alien.main_chain_rpc_url")]
    MainChainUrlMissing,

    /// A wei amount is not a decimal or `0x` hex integer
    #[error("{field} is not a wei amount: {value}")]
    InvalidAmount {
        /// Key holding the amount
        field: &'static str,
        /// Rejected text
        value: String,
    },

    /// Two genesis accounts share an address
    #[error("genesis account {0} listed twice")]
    DuplicateAccount(alien_types::Address),

    /// A required string is empty
    #[error("{0} is required")]
    Missing(&'static str),

    /// Not a `host:port` socket address
    #[error("rpc.http_address is not a socket address: {0}")]
    InvalidListenAddress(String),

    /// A value outside a closed set of choices
    #[error("{field} must be one of {choices}, got {value}")]
    Unsupported {
        /// Key holding the value
        field: &'static str,
        /// Accepted values, comma separated
        choices: &'static str,
        /// Rejected text
        value: String,
    },
}

/// Result type for configuration operations
pub type ConfigResult<T> = Result<T, ConfigError>;
