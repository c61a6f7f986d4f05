// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

//! `slurp serve` - run the relay

use anyhow::{Context, Result};
use clap::Args;
use std::path::PathBuf;
use std::sync::Arc;
use tokio::net::TcpListener;
use tokio::signal;
use tracing::{error, info};

use slurp_core::application::archive_pipeline::ArchivePipeline;
use slurp_core::application::stage_registry::StageRegistry;
use slurp_core::domain::credential::OsSecretSource;
use slurp_core::domain::relay_config::RelayConfig;
use slurp_core::infrastructure::blob_store::{create_blob_store, StoreBackend};
use slurp_core::infrastructure::host_key::{ensure_host_key, load_host_key};
use slurp_core::infrastructure::transfer::TransferServer;
use slurp_core::presentation::api;

#[derive(Args, Debug, Default)]
pub struct ServeArgs {
    /// Staging API listen address (ip:port)
    #[arg(long, env = "SLURP_API_ADDRESS")]
    pub api_address: Option<String>,

    /// Transfer (SSH) listen address (ip:port)
    #[arg(long, env = "SLURP_TRANSFER_ADDRESS")]
    pub transfer_address: Option<String>,

    /// Build staging directory
    #[arg(long, value_name = "DIR")]
    pub build_dir: Option<PathBuf>,

    /// Blob store address
    #[arg(long, env = "SLURP_STORE_ADDRESS")]
    pub store_address: Option<String>,
}

impl ServeArgs {
    /// Flags win over file and environment values
    pub fn apply(self, config: &mut RelayConfig) {
        if let Some(address) = self.api_address {
            config.api.address = address;
        }
        if let Some(address) = self.transfer_address {
            config.transfer.address = address;
        }
        if let Some(dir) = self.build_dir {
            config.build_dir = dir;
        }
        if let Some(address) = self.store_address {
            config.store.address = address;
        }
    }
}

pub async fn run(config: RelayConfig) -> Result<()> {
    config.validate().context("Configuration validation failed")?;

    std::fs::create_dir_all(&config.build_dir)
        .with_context(|| format!("Failed to create build dir {:?}", config.build_dir))?;

    ensure_host_key(&config.transfer.host_key_path).context("Failed to prepare host key")?;
    let host_key = load_host_key(&config.transfer.host_key_path)?;

    let backend = StoreBackend::from_config(&config.store)?;
    let store = create_blob_store(backend)?;
    store
        .initialize()
        .await
        .with_context(|| format!("Failed to reach blob store at '{}'", config.store.address))?;
    info!("Blob store at '{}' ready", config.store.address);

    let registry = Arc::new(StageRegistry::new(
        &config.build_dir,
        ArchivePipeline::new(store, &config.archive.tar_path),
        Arc::new(OsSecretSource),
    ));

    let transfer = TransferServer::new(
        &config.transfer,
        &config.build_dir,
        host_key,
        Arc::new(registry.credentials()),
    );
    transfer.start().await?;

    let listener = TcpListener::bind(&config.api.address)
        .await
        .with_context(|| format!("Failed to bind to {}", config.api.address))?;
    info!("Api listening at http://{}...", config.api.address);

    let served = axum::serve(listener, api::app(registry, config.api.token.clone()))
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("HTTP server failed");

    transfer.stop();
    info!("Relay shutting down");
    served
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            error!("Failed to install Ctrl+C handler: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                error!("Failed to install SIGTERM handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            info!("Received Ctrl+C signal");
        },
        _ = terminate => {
            info!("Received SIGTERM signal");
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_flags_override_config() {
        let mut config = RelayConfig::default();
        ServeArgs {
            api_address: Some("0.0.0.0:9000".to_string()),
            build_dir: Some(PathBuf::from("/tmp/builds")),
            ..Default::default()
        }
        .apply(&mut config);

        assert_eq!(config.api.address, "0.0.0.0:9000");
        assert_eq!(config.build_dir, PathBuf::from("/tmp/builds"));
        assert_eq!(config.transfer.address, "127.0.0.1:1567");
    }
}
