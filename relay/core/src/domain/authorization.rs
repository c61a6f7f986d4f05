// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

//! Transfer Authorization Policy
//!
//! The gateway asks a single question of a connecting principal: is the user
//! name it claims a live, server-issued credential? Key material offered in
//! the SSH public-key exchange is not consulted. Keeping the decision behind
//! this trait lets a stricter scheme replace it without touching the
//! channel/session handling.

/// Decides whether a claimed SSH identity may open a transfer session
pub trait AuthorizationPolicy: Send + Sync {
    fn authorize(&self, principal: &str) -> bool;
}
