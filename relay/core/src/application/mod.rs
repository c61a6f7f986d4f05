// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! Application
//!
//! Services coordinating the ledger, the archive subprocesses and the blob
//! store.
//!
//! # Architecture
//!
//! - **Layer:** Application Layer
//! - **Purpose:** Implements the staging lifecycle use cases

pub mod archive_pipeline;
pub mod credential_directory;
pub mod stage_registry;
