// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

//! Configuration management commands
//!
//! Commands: show, validate, generate

use anyhow::{Context, Result};
use clap::Subcommand;
use colored::Colorize;
use std::path::PathBuf;

use slurp_core::domain::relay_config::{RelayConfig, CONFIG_PATH_ENV};

#[derive(Subcommand)]
pub enum ConfigCommand {
    /// Show current configuration
    Show {
        /// Show config file paths checked
        #[arg(long)]
        paths: bool,
    },

    /// Validate configuration file
    Validate {
        /// Path to config file (default: discover)
        #[arg(value_name = "FILE")]
        file: Option<PathBuf>,
    },

    /// Generate a configuration file with every default spelled out
    Generate {
        /// Output path (default: ./slurp-config.yaml)
        #[arg(short, long, default_value = "./slurp-config.yaml")]
        output: PathBuf,
    },
}

pub async fn handle_command(
    command: ConfigCommand,
    config_override: Option<PathBuf>,
) -> Result<()> {
    match command {
        ConfigCommand::Show { paths } => show(config_override, paths),
        ConfigCommand::Validate { file } => validate(file.or(config_override)),
        ConfigCommand::Generate { output } => generate(output),
    }
}

fn show(config_override: Option<PathBuf>, show_paths: bool) -> Result<()> {
    let config = RelayConfig::load_or_default(config_override.clone())
        .context("Failed to load configuration")?;

    if show_paths {
        println!("{}", "Configuration discovery paths:".bold());
        if let Some(path) = &config_override {
            println!("  1. --config flag: {}", path.display());
        } else {
            println!("  1. --config flag: {}", "(not set)".dimmed());
        }
        println!(
            "  2. {}: {}",
            CONFIG_PATH_ENV,
            std::env::var(CONFIG_PATH_ENV)
                .unwrap_or_else(|_| "(not set)".to_string())
                .dimmed()
        );
        println!("  3. ./slurp-config.yaml");
        println!("  4. ~/.slurp/config.yaml");
        println!("  5. /etc/slurp/config.yaml");
        println!();
    }

    println!("{}", "Current configuration:".bold());
    println!();

    println!("{}", "Staging API:".bold());
    println!("  Address: {}", config.api.address);
    println!("  Token: {}", redact(&config.api.token));
    println!("  Build dir: {}", config.build_dir.display());
    println!();

    println!("{}", "Transfer Gateway:".bold());
    println!("  Address: {}", config.transfer.address);
    println!("  Host key: {}", config.transfer.host_key_path.display());
    println!("  Shell: {}", config.transfer.shell.display());
    println!("  Server id: {}", config.transfer.server_id);
    println!();

    println!("{}", "Blob Store:".bold());
    println!("  Address: {}", config.store.address);
    println!("  Token: {}", redact(&config.store.token));
    println!("  TLS: {}", config.store.tls);
    println!("  Verify certificates: {}", config.store.verify_certificates);
    println!();

    println!("  tar: {}", config.archive.tar_path.display());
    println!("  Log level: {}", config.log_level);

    Ok(())
}

fn redact(token: &str) -> String {
    if token.is_empty() {
        "(none)".dimmed().to_string()
    } else {
        "********".to_string()
    }
}

fn validate(config_path: Option<PathBuf>) -> Result<()> {
    println!("Validating configuration...");

    let config = RelayConfig::load_or_default(config_path)
        .context("Failed to load configuration")?;

    config
        .validate()
        .context("Configuration validation failed")?;

    println!("{}", "✓ Configuration is valid".green());

    Ok(())
}

fn generate(output: PathBuf) -> Result<()> {
    RelayConfig::default()
        .to_yaml_file(&output)
        .with_context(|| format!("Failed to write config to {:?}", output))?;

    println!(
        "{}",
        format!("✓ Configuration generated: {}", output.display()).green()
    );

    Ok(())
}
