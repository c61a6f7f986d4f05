// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! Presentation
//!
//! HTTP surface of the relay.
//!
//! # Architecture
//!
//! - **Layer:** Presentation Layer
//! - **Purpose:** Maps staging requests onto the stage registry

pub mod api;
