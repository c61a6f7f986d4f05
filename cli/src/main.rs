// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

//! # slurp
//!
//! Build relay: clients stage a build directory, push files into it over SSH
//! with a one-time credential, then commit it to the blob store.
//!
//! ## Commands
//!
//! - `slurp serve` - Run the relay (staging API + transfer gateway)
//! - `slurp stage add|commit|delete` - Drive a running relay
//! - `slurp config show|validate|generate` - Configuration management

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use std::path::PathBuf;

use slurp_cli::commands::{self, ConfigCommand, ServeArgs, StageCommand};
use slurp_core::domain::relay_config::RelayConfig;

/// slurp - build artifact relay
#[derive(Parser)]
#[command(name = "slurp")]
#[command(version, about, long_about = None)]
#[command(propagate_version = true)]
struct Cli {
    /// Path to configuration file (overrides discovery)
    #[arg(
        short,
        long,
        global = true,
        env = "SLURP_CONFIG_PATH",
        value_name = "FILE"
    )]
    config: Option<PathBuf>,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, global = true, env = "SLURP_LOG_LEVEL")]
    log_level: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the relay
    #[command(name = "serve")]
    Serve(ServeArgs),

    /// Stage operations against a running relay
    #[command(name = "stage")]
    Stage {
        #[command(subcommand)]
        command: StageCommand,
    },

    /// Configuration management
    #[command(name = "config")]
    Config {
        #[command(subcommand)]
        command: ConfigCommand,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    match cli.command {
        Commands::Serve(args) => {
            let mut config = RelayConfig::load_or_default(cli.config)
                .context("Failed to load configuration")?;
            args.apply(&mut config);
            if let Some(level) = cli.log_level {
                config.log_level = level;
            }

            init_logging(&config.log_level)?;
            commands::serve::run(config).await
        }
        Commands::Stage { command } => {
            init_logging(cli.log_level.as_deref().unwrap_or("warn"))?;
            commands::stage::handle_command(command).await
        }
        Commands::Config { command } => {
            init_logging(cli.log_level.as_deref().unwrap_or("warn"))?;
            commands::config::handle_command(command, cli.config).await
        }
    }
}

/// Initialize tracing subscriber for logging
fn init_logging(level: &str) -> Result<()> {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .or_else(|_| tracing_subscriber::EnvFilter::try_new(level))
        .context("Failed to create log filter")?;

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_thread_ids(false)
        .with_file(false)
        .with_line_number(false)
        .compact()
        .init();

    Ok(())
}
