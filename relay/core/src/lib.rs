// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! slurp core
//!
//! Build relay primitives: the stage registry and its credential directory,
//! the SSH transfer gateway, the archive pipeline and the blob store adapters.
//!
//! # Architecture
//!
//! - **Layer:** Core System
//! - **Purpose:** Implements the staging lifecycle behind the `slurp` binary

pub mod domain;
pub mod application;
pub mod infrastructure;
pub mod presentation;

pub use domain::*;
