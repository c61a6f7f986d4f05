// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! Domain
//!
//! Value objects, the stage ledger and the ports the relay depends on.
//!
//! # Architecture
//!
//! - **Layer:** Domain Layer
//! - **Purpose:** Owns staging state and the contracts around it

pub mod authorization;
pub mod blob_store;
pub mod build;
pub mod credential;
pub mod relay_config;
pub mod stage;
