//! CLI command definitions and handlers.
//!
//! Each subcommand has its own module with its implementation. Handlers
//! return their result so they can be driven from tests; [`run_cli`] prints.

pub mod checkpoint;
pub mod config;
pub mod extra;
pub mod serve;

use crate::logging::{init_tracing, LogFormat};
use alien_config::LoggingConfig;
use anyhow::Result;
use clap::{Parser, Subcommand};

/// Alien - delegated proof-of-stake consensus tools
#[derive(Parser, Debug)]
#[command(name = "alien")]
#[command(version)]
#[command(about = "Alien consensus engine tools", long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Enable verbose logging (can be repeated for more verbosity)
    #[arg(global = true, short, long, action = clap::ArgAction::Count)]
    pub verbose: u8,

    /// Log format (overrides the configuration file)
    #[arg(global = true, long, value_enum)]
    pub log_format: Option<LogFormat>,

    #[command(subcommand)]
    pub command: Commands,
}

/// Available CLI commands
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Configuration file tools
    #[command(subcommand)]
    Config(config::ConfigCommands),

    /// Header extra tools
    #[command(subcommand)]
    Extra(extra::ExtraCommands),

    /// Snapshot checkpoint tools
    #[command(subcommand)]
    Checkpoint(checkpoint::CheckpointCommands),

    /// Serve the `alien` RPC namespace
    Serve(serve::ServeArgs),
}

/// Execute the CLI with parsed arguments
pub async fn run_cli(cli: Cli) -> Result<()> {
    match cli.command {
        Commands::Serve(args) => {
            let config = serve::load_config(&args)?;
            let format = match cli.log_format {
                Some(format) => format,
                None => LogFormat::parse(&config.logging.format)?,
            };
            init_tracing(cli.verbose, format, &config.logging)?;
            serve::execute(config).await
        }
        Commands::Config(cmd) => {
            init_tool_tracing(cli.verbose, cli.log_format)?;
            config::execute(cmd)
        }
        Commands::Extra(cmd) => {
            init_tool_tracing(cli.verbose, cli.log_format)?;
            extra::execute(cmd)
        }
        Commands::Checkpoint(cmd) => {
            init_tool_tracing(cli.verbose, cli.log_format)?;
            checkpoint::execute(cmd)
        }
    }
}

/// One-shot tools stay quiet unless asked, so their stdout is the result.
fn init_tool_tracing(verbose: u8, format: Option<LogFormat>) -> Result<()> {
    let logging = LoggingConfig {
        level: "warn".to_string(),
        ..Default::default()
    };
    init_tracing(verbose, format.unwrap_or_default(), &logging)
}
