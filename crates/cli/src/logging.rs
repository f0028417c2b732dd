//! Tracing setup shared by every command.

use alien_config::LoggingConfig;
use anyhow::{bail, Context, Result};
use std::fs::OpenOptions;
use std::sync::Mutex;
use tracing_subscriber::fmt::writer::BoxMakeWriter;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

/// Log line format.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, clap::ValueEnum)]
pub enum LogFormat {
    /// Human-readable lines with targets
    #[default]
    Text,
    /// One JSON object per event
    Json,
    /// Abbreviated human-readable lines
    Compact,
}

impl LogFormat {
    /// Parses the `format` value of a `[logging]` section.
    pub fn parse(value: &str) -> Result<Self> {
        match value.to_lowercase().as_str() {
            "text" => Ok(Self::Text),
            "json" => Ok(Self::Json),
            "compact" => Ok(Self::Compact),
            other => bail!("unknown log format {other}"),
        }
    }
}

/// Filter directive for a `-v` count, on top of `base` (the configured level).
pub fn filter_directive(verbose: u8, base: &str) -> String {
    match verbose {
        0 => format!("{base},alien={base}"),
        1 => format!("{base},alien=debug"),
        2 => "debug,alien=debug".to_string(),
        _ => "trace,alien=trace".to_string(),
    }
}

/// Installs the global subscriber. `RUST_LOG` takes precedence over `verbose`
/// and the configured level.
pub fn init_tracing(verbose: u8, format: LogFormat, logging: &LoggingConfig) -> Result<()> {
    let directive = filter_directive(verbose, &logging.level.to_lowercase());
    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(directive));

    let writer = match &logging.file {
        Some(path) => {
            let file = OpenOptions::new()
                .create(true)
                .append(true)
                .open(path)
                .with_context(|| format!("opening log file {path}"))?;
            BoxMakeWriter::new(Mutex::new(file))
        }
        None => BoxMakeWriter::new(std::io::stderr),
    };

    let registry = tracing_subscriber::registry().with(env_filter);
    let installed = match format {
        LogFormat::Text => registry
            .with(fmt::layer().with_target(true).with_writer(writer))
            .try_init(),
        LogFormat::Json => registry.with(fmt::layer().json().with_writer(writer)).try_init(),
        LogFormat::Compact => registry
            .with(fmt::layer().compact().with_writer(writer))
            .try_init(),
    };
    installed.context("installing tracing subscriber")
}
