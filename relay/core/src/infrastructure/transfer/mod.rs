// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

//! Transfer Gateway
//!
//! SSH server that lets a client holding a live transfer credential run one
//! command (normally an rsync server) inside the build root.

mod exec;
mod server;
mod session;

pub use exec::{exit_status_code, ExecContext, EXIT_ABNORMAL, EXIT_FAILURE, EXIT_SUCCESS};
pub use server::{GatewayError, TransferServer};
