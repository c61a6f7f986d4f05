// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

//! CLI command handlers

pub mod config;
pub mod serve;
pub mod stage;

pub use config::ConfigCommand;
pub use serve::ServeArgs;
pub use stage::StageCommand;
