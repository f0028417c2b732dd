//! `config` subcommands.

use alien_config::Config;
use anyhow::{Context, Result};
use clap::Subcommand;
use std::path::{Path, PathBuf};

/// Configuration file tools
#[derive(Subcommand, Debug)]
pub enum ConfigCommands {
    /// Parse and validate a configuration file
    Validate {
        /// Configuration file path
        #[arg(default_value = crate::DEFAULT_CONFIG_FILE)]
        path: PathBuf,
    },
}

/// Execute a config command
pub fn execute(cmd: ConfigCommands) -> Result<()> {
    match cmd {
        ConfigCommands::Validate { path } => {
            let config = validate(&path)?;
            println!("{}", summary(&path, &config));
            Ok(())
        }
    }
}

/// Loads and validates the file at `path`.
pub fn validate(path: &Path) -> Result<Config> {
    Config::load(path).with_context(|| format!("invalid configuration {}", path.display()))
}

/// One line per consensus-relevant setting.
pub fn summary(path: &Path, config: &Config) -> String {
    let alien = &config.alien;
    let fork = |block: Option<u64>| block.map_or("disabled".to_string(), |n| n.to_string());
    let mut lines = vec![
        format!("{} is valid", path.display()),
        format!("  period:            {}s", alien.period),
        format!("  epoch:             {}", alien.epoch),
        format!("  max signer count:  {}", alien.max_signer_count),
        format!("  self-vote signers: {}", alien.self_vote_signers.len()),
        format!("  candidate mode:    {:?}", alien.candidate_mode),
        format!("  trantor block:     {}", fork(alien.trantor_block)),
        format!("  terminus block:    {}", fork(alien.terminus_block)),
        format!("  genesis accounts:  {}", config.genesis.accounts.len()),
    ];
    if alien.side_chain {
        lines.push(format!(
            "  side chain of:     {}",
            alien.main_chain_rpc_url.as_deref().unwrap_or_default()
        ));
    }
    lines.join("\n")
}
