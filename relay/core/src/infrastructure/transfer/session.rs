// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

//! Per-connection SSH handler
//!
//! Authorization looks only at the claimed user name: it must be a live
//! transfer credential. The offered public key is never inspected.
//! Only `session` channels are accepted; on them a single `exec` runs,
//! `env` is acknowledged and ignored, everything else is refused.

use async_trait::async_trait;
use russh::server::{Auth, Handler, Msg, Session};
use russh::{Channel, ChannelId, ChannelMsg, Pty, Sig};
use russh_keys::key::PublicKey;
use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::sync::mpsc;
use tracing::{debug, trace, warn};

use super::exec::{run_exec, ExecContext};
use crate::domain::authorization::AuthorizationPolicy;

/// Client data chunks queued ahead of the command's stdin
const STDIN_QUEUE: usize = 64;

#[derive(Default)]
struct ChannelState {
    /// Taken by the first exec; `None` afterwards
    stdin: Option<mpsc::Receiver<Vec<u8>>>,
}

pub(crate) struct TransferSession {
    peer: Option<SocketAddr>,
    policy: Arc<dyn AuthorizationPolicy>,
    exec: Arc<ExecContext>,
    channels: HashMap<ChannelId, ChannelState>,
}

impl TransferSession {
    pub(crate) fn new(
        peer: Option<SocketAddr>,
        policy: Arc<dyn AuthorizationPolicy>,
        exec: Arc<ExecContext>,
    ) -> Self {
        Self {
            peer,
            policy,
            exec,
            channels: HashMap::new(),
        }
    }

    fn authorize(&self, user: &str) -> Auth {
        if self.policy.authorize(user) {
            debug!(peer = ?self.peer, "Transfer credential authorized");
            Auth::Accept
        } else {
            warn!(peer = ?self.peer, "Transfer credential not found");
            Auth::Reject {
                proceed_with_methods: None,
            }
        }
    }
}

/// Feed channel data into the command's stdin queue until eof or close
async fn pump_channel_input(mut channel: Channel<Msg>, stdin: mpsc::Sender<Vec<u8>>) {
    let id = channel.id();
    let mut stdin = Some(stdin);
    while let Some(msg) = channel.wait().await {
        match msg {
            ChannelMsg::Data { data } => {
                if let Some(queue) = &stdin {
                    if queue.send(data.to_vec()).await.is_err() {
                        // command finished; drain the rest
                        stdin = None;
                    }
                }
            }
            ChannelMsg::Eof => {
                trace!(channel = ?id, "Client eof");
                stdin = None;
            }
            ChannelMsg::Close => break,
            _ => {}
        }
    }
}

#[async_trait]
impl Handler for TransferSession {
    type Error = russh::Error;

    async fn auth_publickey_offered(
        &mut self,
        user: &str,
        _public_key: &PublicKey,
    ) -> Result<Auth, Self::Error> {
        trace!(peer = ?self.peer, "Public key offered");
        Ok(self.authorize(user))
    }

    async fn auth_publickey(
        &mut self,
        user: &str,
        _public_key: &PublicKey,
    ) -> Result<Auth, Self::Error> {
        Ok(self.authorize(user))
    }

    async fn channel_open_session(
        &mut self,
        channel: Channel<Msg>,
        _session: &mut Session,
    ) -> Result<bool, Self::Error> {
        let id = channel.id();
        let (tx, rx) = mpsc::channel(STDIN_QUEUE);
        self.channels.insert(id, ChannelState { stdin: Some(rx) });
        tokio::spawn(pump_channel_input(channel, tx));
        trace!(peer = ?self.peer, channel = ?id, "Session channel opened");
        Ok(true)
    }

    async fn exec_request(
        &mut self,
        channel: ChannelId,
        data: &[u8],
        session: &mut Session,
    ) -> Result<(), Self::Error> {
        let stdin = self
            .channels
            .get_mut(&channel)
            .and_then(|state| state.stdin.take());
        let Some(stdin) = stdin else {
            debug!(channel = ?channel, "Rejecting repeated exec");
            session.channel_failure(channel);
            return Ok(());
        };

        let command = String::from_utf8_lossy(data).into_owned();
        session.channel_success(channel);
        tokio::spawn(run_exec(
            self.exec.clone(),
            command,
            channel,
            session.handle(),
            stdin,
        ));
        Ok(())
    }

    async fn env_request(
        &mut self,
        channel: ChannelId,
        variable_name: &str,
        _variable_value: &str,
        session: &mut Session,
    ) -> Result<(), Self::Error> {
        trace!(channel = ?channel, "Ignoring env {}", variable_name);
        session.channel_success(channel);
        Ok(())
    }

    async fn shell_request(
        &mut self,
        channel: ChannelId,
        session: &mut Session,
    ) -> Result<(), Self::Error> {
        debug!(channel = ?channel, "Rejecting shell request");
        session.channel_failure(channel);
        Ok(())
    }

    async fn subsystem_request(
        &mut self,
        channel: ChannelId,
        name: &str,
        session: &mut Session,
    ) -> Result<(), Self::Error> {
        debug!(channel = ?channel, "Rejecting subsystem '{}'", name);
        session.channel_failure(channel);
        Ok(())
    }

    #[allow(clippy::too_many_arguments)]
    async fn pty_request(
        &mut self,
        channel: ChannelId,
        _term: &str,
        _col_width: u32,
        _row_height: u32,
        _pix_width: u32,
        _pix_height: u32,
        _modes: &[(Pty, u32)],
        session: &mut Session,
    ) -> Result<(), Self::Error> {
        session.channel_failure(channel);
        Ok(())
    }

    async fn x11_request(
        &mut self,
        channel: ChannelId,
        _single_connection: bool,
        _x11_auth_protocol: &str,
        _x11_auth_cookie: &str,
        _x11_screen_number: u32,
        session: &mut Session,
    ) -> Result<(), Self::Error> {
        debug!(channel = ?channel, "Rejecting x11 request");
        session.channel_failure(channel);
        Ok(())
    }

    async fn window_change_request(
        &mut self,
        channel: ChannelId,
        _col_width: u32,
        _row_height: u32,
        _pix_width: u32,
        _pix_height: u32,
        session: &mut Session,
    ) -> Result<(), Self::Error> {
        session.channel_failure(channel);
        Ok(())
    }

    async fn signal(
        &mut self,
        channel: ChannelId,
        signal: Sig,
        session: &mut Session,
    ) -> Result<(), Self::Error> {
        debug!(channel = ?channel, "Ignoring signal {:?}", signal);
        session.channel_failure(channel);
        Ok(())
    }

    async fn channel_close(
        &mut self,
        channel: ChannelId,
        _session: &mut Session,
    ) -> Result<(), Self::Error> {
        self.channels.remove(&channel);
        Ok(())
    }
}
