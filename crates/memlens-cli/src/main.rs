mod commands;
mod config;
mod shutdown;

use std::path::PathBuf;

use anyhow::Result;
use clap::{Parser, Subcommand};
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use crate::config::CliConfig;

#[derive(Parser)]
#[command(name = "memlens")]
#[command(version, about = "Live introspection of a foreign process's memory")]
struct Cli {
    /// Configuration file
    #[arg(short, long, global = true, default_value = "memlens.toml")]
    config: PathBuf,

    /// Target process: a pid, `pid:N`, or an executable name
    #[arg(short, long, global = true, env = "MEMLENS_PROCESS")]
    process: Option<String>,

    /// Module to scan instead of the main executable
    #[arg(short, long, global = true)]
    module: Option<String>,

    /// Enable debug logging
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Scan the target module for a byte pattern
    Scan {
        /// Pattern text, e.g. "48 8B 05 ^ ?? ?? ?? ??"
        pattern: String,

        /// Report every match instead of the first
        #[arg(long)]
        all: bool,
    },

    /// Attach and resolve every root pattern
    Anchors {
        /// Pattern table (JSON); overrides the configured one
        #[arg(long)]
        patterns: Option<PathBuf>,

        /// Print the attach result as JSON
        #[arg(long)]
        json: bool,
    },

    /// Track one structure and print it every tick
    Watch {
        /// Schema name
        #[arg(short, long)]
        schema: String,

        /// Object address (hex, `base+offset` allowed)
        #[arg(short, long, conflicts_with = "anchor", required_unless_present = "anchor")]
        address: Option<String>,

        /// Root pattern whose resolved address is the object
        #[arg(long)]
        anchor: Option<String>,

        /// Window scale parameter
        #[arg(long)]
        scale: Option<f64>,

        /// Poll interval in milliseconds
        #[arg(short, long)]
        interval: Option<u64>,

        /// Print snapshots as JSON lines
        #[arg(long)]
        json: bool,
    },

    /// Dump raw memory
    Hexdump {
        /// Start address (hex)
        address: String,

        /// Number of bytes
        #[arg(short, long, default_value = "256")]
        size: usize,

        /// Show the ASCII column
        #[arg(long)]
        ascii: bool,
    },

    /// List the structure schemas
    Schemas {
        /// Schema table (JSON); overrides the configured one
        #[arg(long)]
        schemas: Option<PathBuf>,

        #[arg(long)]
        json: bool,
    },
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    let directive = if cli.verbose {
        "memlens=debug"
    } else {
        "memlens=info"
    };
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env().add_directive(directive.parse()?))
        .init();

    let mut config = match CliConfig::load(&cli.config) {
        Ok(config) => {
            info!("Loaded config from {:?}", cli.config);
            config
        }
        Err(e) => {
            warn!("Failed to load config: {}, using defaults", e);
            CliConfig::default()
        }
    };
    if let Some(process) = cli.process {
        config.process = Some(process);
    }
    if let Some(module) = cli.module {
        config.module = Some(module);
    }

    match cli.command {
        Command::Scan { pattern, all } => commands::scan::run(&config, &pattern, all),
        Command::Anchors { patterns, json } => {
            if let Some(path) = patterns {
                config.patterns_file = Some(path);
            }
            commands::anchors::run(&config, json)
        }
        Command::Watch {
            schema,
            address,
            anchor,
            scale,
            interval,
            json,
        } => {
            if let Some(scale) = scale {
                config.window_scale = scale;
            }
            if let Some(interval) = interval {
                config.poll_interval_ms = interval;
            }
            let target = match (address, anchor) {
                (Some(address), _) => {
                    commands::watch::Target::Address(commands::hex_utils::parse_address(&address)?)
                }
                (None, Some(anchor)) => commands::watch::Target::Anchor(anchor),
                (None, None) => anyhow::bail!("Either --address or --anchor is required"),
            };
            commands::watch::run(&config, &schema, target, json)
        }
        Command::Hexdump {
            address,
            size,
            ascii,
        } => {
            let address = commands::hex_utils::parse_address(&address)?;
            commands::hexdump::run(&config, address, size, ascii)
        }
        Command::Schemas { schemas, json } => {
            if let Some(path) = schemas {
                config.schemas_file = Some(path);
            }
            commands::schemas::run(&config, json)
        }
    }
}
