//! `extra` subcommands.

use alien_config::AlienConfig;
use alien_consensus::HeaderExtra;
use alien_types::Header;
use anyhow::{Context, Result};
use clap::Subcommand;

/// Header extra tools
#[derive(Subcommand, Debug)]
pub enum ExtraCommands {
    /// Decode a full header extra (vanity, payload and seal) and print it as JSON
    Decode {
        /// Hex-encoded header extra, with or without 0x
        extra: String,

        /// Number of the block the extra belongs to
        #[arg(long, default_value_t = 0)]
        number: u64,

        /// First block of the Trantor rules, if the chain has the fork
        #[arg(long)]
        trantor: Option<u64>,
    },
}

/// Execute an extra command
pub fn execute(cmd: ExtraCommands) -> Result<()> {
    match cmd {
        ExtraCommands::Decode {
            extra,
            number,
            trantor,
        } => {
            let decoded = decode(&extra, number, trantor)?;
            println!("{}", serde_json::to_string_pretty(&decoded)?);
            Ok(())
        }
    }
}

/// Decodes `extra` as it would appear in block `number`.
pub fn decode(extra: &str, number: u64, trantor: Option<u64>) -> Result<HeaderExtra> {
    let bytes = hex::decode(extra.trim().trim_start_matches("0x")).context("extra is not hex")?;
    let header = Header {
        number,
        extra: bytes,
        ..Default::default()
    };
    let config = AlienConfig {
        trantor_block: trantor,
        ..Default::default()
    };
    HeaderExtra::from_header(&header, &config).context("decoding header extra")
}
