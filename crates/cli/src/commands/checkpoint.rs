//! `checkpoint` subcommands.

use alien_config::AlienConfig;
use alien_consensus::Snapshot;
use alien_storage::Database;
use alien_types::H256;
use anyhow::{anyhow, Context, Result};
use clap::Subcommand;
use std::path::{Path, PathBuf};
use std::sync::Arc;

/// Snapshot checkpoint tools
#[derive(Subcommand, Debug)]
pub enum CheckpointCommands {
    /// Print the checkpoint stored for a block as JSON
    Show {
        /// Node database directory
        #[arg(long)]
        db: PathBuf,

        /// Hash of the checkpoint block
        #[arg(long)]
        hash: String,
    },
}

/// Execute a checkpoint command
pub fn execute(cmd: CheckpointCommands) -> Result<()> {
    match cmd {
        CheckpointCommands::Show { db, hash } => {
            let hash = H256::from_hex(&hash).context("invalid block hash")?;
            let snap = show(&db, &hash)?;
            println!("{}", serde_json::to_string_pretty(&snap)?);
            Ok(())
        }
    }
}

/// Loads the checkpoint of `hash` from the database at `db`.
pub fn show(db: &Path, hash: &H256) -> Result<Snapshot> {
    let database =
        Database::open_default(db).with_context(|| format!("opening database {}", db.display()))?;
    Snapshot::load(Arc::new(AlienConfig::default()), &database, hash)?
        .ok_or_else(|| anyhow!("no checkpoint stored for {hash}"))
}
