// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

//! Stage commands
//!
//! Commands: add, commit, delete

use anyhow::Result;
use clap::{Args, Subcommand};
use colored::Colorize;

use crate::client::RelayClient;

#[derive(Args, Debug, Clone)]
pub struct RelayTarget {
    /// Staging API base URL
    #[arg(long, env = "SLURP_RELAY_URL", default_value = "http://127.0.0.1:1566")]
    pub relay: String,

    /// Staging API token (X-AUTH-TOKEN)
    #[arg(long, env = "SLURP_API_TOKEN", hide_env_values = true)]
    pub token: Option<String>,
}

#[derive(Subcommand)]
pub enum StageCommand {
    /// Stage a new build and print its transfer secret
    Add {
        /// Build id of the new stage
        new_id: String,

        /// Committed build to seed the stage from
        #[arg(long, default_value = "")]
        old_id: String,

        #[command(flatten)]
        target: RelayTarget,
    },

    /// Commit a staged build to the blob store
    Commit {
        build_id: String,

        #[command(flatten)]
        target: RelayTarget,
    },

    /// Discard a staged build
    Delete {
        build_id: String,

        #[command(flatten)]
        target: RelayTarget,
    },
}

pub async fn handle_command(command: StageCommand) -> Result<()> {
    match command {
        StageCommand::Add {
            new_id,
            old_id,
            target,
        } => {
            let secret = client(&target)?.add_stage(&old_id, &new_id).await?;
            // bare secret on stdout so scripts can capture it
            println!("{}", secret);
        }
        StageCommand::Commit { build_id, target } => {
            client(&target)?.commit_stage(&build_id).await?;
            println!("{}", format!("✓ Build '{}' committed", build_id).green());
        }
        StageCommand::Delete { build_id, target } => {
            client(&target)?.delete_stage(&build_id).await?;
            println!("{}", format!("✓ Build '{}' deleted", build_id).green());
        }
    }
    Ok(())
}

fn client(target: &RelayTarget) -> Result<RelayClient> {
    RelayClient::new(&target.relay, target.token.clone())
}
