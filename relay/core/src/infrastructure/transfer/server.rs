// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

//! Transfer gateway lifecycle and accept loop
//!
//! `start` binds the listener (bind failure is fatal to the caller) and
//! spawns the accept loop. Each accepted socket runs its SSH session in a
//! task owned by the loop, so `stop` tears down the listener and every live
//! session together. Accept and handshake failures are logged and never end
//! the loop.

use parking_lot::Mutex;
use russh::server::Config;
use russh::{MethodSet, SshId};
use russh_keys::key::KeyPair;
use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tokio::net::{TcpListener, TcpStream};
use tokio::task::{AbortHandle, JoinSet};
use tracing::{debug, error, info, trace, warn};

use super::exec::ExecContext;
use super::session::TransferSession;
use crate::domain::authorization::AuthorizationPolicy;
use crate::domain::relay_config::TransferConfig;

#[derive(Debug, Error)]
pub enum GatewayError {
    #[error("Failed to listen for transfers on '{address}' - {source}")]
    Bind {
        address: String,
        #[source]
        source: std::io::Error,
    },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("SSH error: {0}")]
    Protocol(#[from] russh::Error),
}

pub struct TransferServer {
    address: String,
    config: Arc<Config>,
    policy: Arc<dyn AuthorizationPolicy>,
    exec: Arc<ExecContext>,
    server_handle: Mutex<Option<AbortHandle>>,
}

impl TransferServer {
    /// Create a gateway that runs exec commands from `working_dir`
    pub fn new(
        settings: &TransferConfig,
        working_dir: impl Into<PathBuf>,
        host_key: KeyPair,
        policy: Arc<dyn AuthorizationPolicy>,
    ) -> Self {
        let config = Config {
            server_id: SshId::Standard(settings.server_id.clone()),
            methods: MethodSet::PUBLICKEY,
            keys: vec![host_key],
            auth_rejection_time: Duration::from_secs(1),
            auth_rejection_time_initial: Some(Duration::ZERO),
            ..Default::default()
        };

        Self {
            address: settings.address.clone(),
            config: Arc::new(config),
            policy,
            exec: Arc::new(ExecContext {
                shell: settings.shell.clone(),
                working_dir: working_dir.into(),
            }),
            server_handle: Mutex::new(None),
        }
    }

    /// Bind the listener and start accepting connections
    ///
    /// Returns the bound address (useful with port 0).
    pub async fn start(&self) -> Result<SocketAddr, GatewayError> {
        let listener = TcpListener::bind(&self.address)
            .await
            .map_err(|source| GatewayError::Bind {
                address: self.address.clone(),
                source,
            })?;
        let local_addr = listener.local_addr()?;

        let handle = tokio::spawn(accept_loop(
            listener,
            self.config.clone(),
            self.policy.clone(),
            self.exec.clone(),
        ));
        if let Some(previous) = self.server_handle.lock().replace(handle.abort_handle()) {
            previous.abort();
        }

        info!("Listening for transfers on '{}'...", local_addr);
        Ok(local_addr)
    }

    /// Stop accepting and drop every live session
    pub fn stop(&self) {
        if let Some(handle) = self.server_handle.lock().take() {
            handle.abort();
            info!("Transfer gateway stopped");
        } else {
            warn!("Transfer gateway was not running");
        }
    }

    pub fn is_running(&self) -> bool {
        self.server_handle
            .lock()
            .as_ref()
            .is_some_and(|h| !h.is_finished())
    }
}

async fn accept_loop(
    listener: TcpListener,
    config: Arc<Config>,
    policy: Arc<dyn AuthorizationPolicy>,
    exec: Arc<ExecContext>,
) {
    let mut sessions = JoinSet::new();
    loop {
        tokio::select! {
            accepted = listener.accept() => match accepted {
                Ok((socket, peer)) => {
                    trace!(%peer, "Got connection");
                    let handler = TransferSession::new(Some(peer), policy.clone(), exec.clone());
                    sessions.spawn(serve_connection(config.clone(), socket, peer, handler));
                }
                Err(e) => {
                    error!("Failed to accept connection - {}", e);
                    // avoid spinning on e.g. EMFILE
                    tokio::time::sleep(Duration::from_millis(100)).await;
                }
            },
            Some(_) = sessions.join_next(), if !sessions.is_empty() => {}
        }
    }
}

async fn serve_connection(
    config: Arc<Config>,
    socket: TcpStream,
    peer: SocketAddr,
    handler: TransferSession,
) {
    let session = match russh::server::run_stream(config, socket, handler).await {
        Ok(session) => session,
        Err(e) => {
            error!(%peer, "Failed to handshake - {}", e);
            return;
        }
    };
    match session.await {
        Ok(()) => debug!(%peer, "Connection closed"),
        Err(e) => debug!(%peer, "Connection ended - {}", e),
    }
}
