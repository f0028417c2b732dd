//! # Alien CLI
//!
//! Command-line tools for operators of an Alien chain.
//!
//! ## Available Commands
//!
//! - `config validate` - Parse and validate a node configuration file
//! - `extra decode` - Decode the governance payload of a header extra
//! - `checkpoint show` - Print a snapshot checkpoint stored in a node database
//! - `serve` - Serve the `alien` RPC namespace over a node database
//!
//! ## Example Usage
//!
//! ```bash
//! alien config validate alien.toml
//! alien extra decode 0x0000...  --number 1200
//! alien checkpoint show --db ./data --hash 0x5c1f...
//! alien serve --config alien.toml
//! ```

#![warn(missing_docs)]
#![warn(rust_2018_idioms)]
#![deny(unsafe_code)]

pub mod commands;
pub mod logging;

pub use commands::{run_cli, Cli, Commands};
pub use logging::LogFormat;

/// CLI application name
pub const APP_NAME: &str = "alien";

/// Default configuration file name
pub const DEFAULT_CONFIG_FILE: &str = "alien.toml";
