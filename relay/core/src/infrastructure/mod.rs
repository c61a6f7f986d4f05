// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! Infrastructure
//!
//! Adapters for the outside world: the blob store over HTTP, the SSH
//! transfer gateway and the host key file.
//!
//! # Architecture
//!
//! - **Layer:** Infrastructure Layer
//! - **Purpose:** Implements domain ports against concrete transports

pub mod blob_store;
pub mod host_key;
pub mod transfer;
