// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

use parking_lot::Mutex;
use std::sync::Arc;

use crate::domain::authorization::AuthorizationPolicy;
use crate::domain::stage::StageLedger;

/// Read-only view of the live credential set
///
/// Shares the ledger lock with [`crate::application::stage_registry::StageRegistry`],
/// so a membership check never observes a half-applied stage transition.
/// Only the registry adds or revokes credentials.
#[derive(Clone)]
pub struct CredentialDirectory {
    ledger: Arc<Mutex<StageLedger>>,
}

impl CredentialDirectory {
    pub(crate) fn new(ledger: Arc<Mutex<StageLedger>>) -> Self {
        Self { ledger }
    }

    pub fn contains(&self, candidate: &str) -> bool {
        self.ledger.lock().credentials().contains(candidate)
    }

    pub fn len(&self) -> usize {
        self.ledger.lock().credentials().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl AuthorizationPolicy for CredentialDirectory {
    fn authorize(&self, principal: &str) -> bool {
        self.contains(principal)
    }
}
