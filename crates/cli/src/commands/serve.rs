//! `serve` command: the `alien` namespace over a node database.

use alien_config::Config;
use alien_consensus::{Alien, ChainReader, MainChainClient, SnapshotApi};
use alien_rpc::{HttpMainChainClient, RpcServer, RpcServerConfig};
use alien_storage::{Database, KeyValueStore};
use anyhow::{Context, Result};
use clap::Args;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{info, warn};

/// Arguments for the serve command
#[derive(Args, Debug)]
pub struct ServeArgs {
    /// Configuration file path
    #[arg(short, long, default_value = crate::DEFAULT_CONFIG_FILE)]
    pub config: PathBuf,

    /// Database directory (overrides storage.data_dir)
    #[arg(long)]
    pub db: Option<PathBuf>,

    /// RPC HTTP listen address (overrides rpc.http_address)
    #[arg(long)]
    pub rpc_addr: Option<String>,
}

/// Loads the configuration and applies the command-line overrides.
pub fn load_config(args: &ServeArgs) -> Result<Config> {
    let mut config = Config::load(&args.config)
        .with_context(|| format!("invalid configuration {}", args.config.display()))?;
    if let Some(db) = &args.db {
        config.storage.data_dir = db.to_string_lossy().to_string();
    }
    if let Some(addr) = &args.rpc_addr {
        config.rpc.http_address = addr.clone();
    }
    config.validate()?;
    Ok(config)
}

/// Builds the engine over the database and serves until ctrl-c.
pub async fn execute(config: Config) -> Result<()> {
    let mut server = start(&config).await?;
    info!(addr = ?server.local_addr(), "Serving the alien namespace, ctrl-c to stop");

    tokio::signal::ctrl_c()
        .await
        .context("waiting for ctrl-c")?;
    server.stop()?;
    Ok(())
}

/// Opens the database, builds the engine and starts the RPC server.
pub async fn start(config: &Config) -> Result<RpcServer> {
    let db = Arc::new(
        Database::open(&config.storage.data_dir, config.storage.cache_size_mb)
            .with_context(|| format!("opening database {}", config.storage.data_dir))?,
    );

    let alloc = if config.genesis.is_empty() {
        warn!("No genesis accounts configured, snapshots need a stored checkpoint");
        None
    } else {
        Some(config.genesis.alloc()?)
    };

    let alien_config = Arc::new(config.alien.clone());
    let mut engine = Alien::new(alien_config, alloc, db.clone() as Arc<dyn KeyValueStore>)?;
    if config.alien.side_chain {
        let client = HttpMainChainClient::new(&config.alien)?;
        info!(url = client.url(), "Following main chain");
        engine = engine.with_main_chain(Arc::new(client) as Arc<dyn MainChainClient>);
    }

    let api = SnapshotApi::new(Arc::new(engine), db as Arc<dyn ChainReader>);
    let mut server = RpcServer::new(RpcServerConfig::try_from(&config.rpc)?, api);
    server.start().await?;
    Ok(server)
}
