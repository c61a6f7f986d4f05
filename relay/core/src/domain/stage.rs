// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

//! Stage Ledger
//!
//! In-memory table of in-flight builds plus the set of live credentials.
//! Both live behind one lock (held by the registry) so that every visible
//! transition touches the table and the credential set atomically.
//!
//! ## Lifecycle
//! ```text
//! Absent ──reserve──▶ Seeding ──activate──▶ Staged ──claim_for_commit──▶ Committing ──release──▶ Absent
//!                        │                     │
//!                        └──release──▶ Absent  └──begin_delete──▶ Deleting ──finish_delete──▶ Absent
//! ```
//! A credential is a member of the set only while its record is `Staged`.
//! An id that is `Deleting` has no record, only a tombstone, and cannot be
//! reserved until its directory is gone. Deleting an id with no record
//! tombstones it as well.

use chrono::{DateTime, Utc};
use thiserror::Error;

use crate::domain::build::BuildId;
use crate::domain::credential::{Credential, CredentialSet};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StageState {
    /// Directory is being created and optionally seeded from an old build
    Seeding,
    /// Credential is live; the client may push files
    Staged,
    /// Credential revoked; archive and upload in progress
    Committing,
}

#[derive(Debug, Clone)]
pub struct StageRecord {
    pub id: BuildId,
    pub credential: Credential,
    pub state: StageState,
    pub staged_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum LedgerError {
    #[error("Build '{0}' is already staged")]
    AlreadyStaged(BuildId),

    #[error("No Build Found: '{0}'")]
    NotFound(BuildId),

    #[error("Build '{0}' is being deleted")]
    Deleting(BuildId),
}

#[derive(Debug, Default)]
pub struct StageLedger {
    builds: Vec<StageRecord>,
    credentials: CredentialSet,
    /// Ids whose staging directory is being removed
    deleting: Vec<BuildId>,
}

impl StageLedger {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn credentials(&self) -> &CredentialSet {
        &self.credentials
    }

    pub fn find(&self, id: &BuildId) -> Option<&StageRecord> {
        self.builds.iter().find(|r| &r.id == id)
    }

    fn position(&self, id: &BuildId) -> Option<usize> {
        self.builds.iter().position(|r| &r.id == id)
    }

    /// Credential of a live record, whatever its state
    pub fn lookup_credential(&self, id: &BuildId) -> Result<&Credential, LedgerError> {
        self.find(id)
            .map(|r| &r.credential)
            .ok_or_else(|| LedgerError::NotFound(id.clone()))
    }

    /// Claim `id` for a new stage; the credential stays inactive until [`Self::activate`]
    pub fn reserve(&mut self, id: BuildId, credential: Credential) -> Result<(), LedgerError> {
        if self.is_deleting(&id) {
            return Err(LedgerError::Deleting(id));
        }
        if self.find(&id).is_some() {
            return Err(LedgerError::AlreadyStaged(id));
        }
        self.builds.push(StageRecord {
            id,
            credential,
            state: StageState::Seeding,
            staged_at: Utc::now(),
        });
        Ok(())
    }

    /// Move a seeding record to `Staged` and publish its credential
    pub fn activate(&mut self, id: &BuildId) -> Result<Credential, LedgerError> {
        let record = self
            .builds
            .iter_mut()
            .find(|r| &r.id == id && r.state == StageState::Seeding)
            .ok_or_else(|| LedgerError::NotFound(id.clone()))?;
        record.state = StageState::Staged;
        let credential = record.credential.clone();
        self.credentials.add(credential.clone());
        Ok(credential)
    }

    /// Revoke the credential of a staged build and mark it `Committing`
    ///
    /// Only one caller can win this for a given record; anyone else sees `NotFound`.
    pub fn claim_for_commit(&mut self, id: &BuildId) -> Result<Credential, LedgerError> {
        let record = self
            .builds
            .iter_mut()
            .find(|r| &r.id == id && r.state == StageState::Staged)
            .ok_or_else(|| LedgerError::NotFound(id.clone()))?;
        record.state = StageState::Committing;
        let credential = record.credential.clone();
        self.credentials.remove(&credential);
        Ok(credential)
    }

    /// Drop a record at the end of seeding or committing
    pub fn release(&mut self, id: &BuildId) -> Option<StageRecord> {
        let index = self.position(id)?;
        let record = self.builds.remove(index);
        self.credentials.remove(&record.credential);
        Some(record)
    }

    /// Drop a staged record and tombstone `id` until [`Self::finish_delete`]
    ///
    /// `Ok(None)` when nothing is recorded for `id`; the id is tombstoned
    /// all the same. A record that is still seeding or already committing,
    /// or an id already being deleted, is owned by another operation.
    pub fn begin_delete(&mut self, id: &BuildId) -> Result<Option<StageRecord>, LedgerError> {
        if self.is_deleting(id) {
            return Err(LedgerError::NotFound(id.clone()));
        }
        let record = match self.position(id) {
            None => None,
            Some(index) if self.builds[index].state == StageState::Staged => {
                let record = self.builds.remove(index);
                self.credentials.remove(&record.credential);
                Some(record)
            }
            Some(_) => return Err(LedgerError::NotFound(id.clone())),
        };
        self.deleting.push(id.clone());
        Ok(record)
    }

    /// Lift the tombstone left by [`Self::begin_delete`]
    pub fn finish_delete(&mut self, id: &BuildId) {
        self.deleting.retain(|d| d != id);
    }

    pub fn is_deleting(&self, id: &BuildId) -> bool {
        self.deleting.contains(id)
    }

    pub fn len(&self) -> usize {
        self.builds.len()
    }

    pub fn is_empty(&self) -> bool {
        self.builds.is_empty()
    }

    pub fn records(&self) -> impl Iterator<Item = &StageRecord> {
        self.builds.iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn id(s: &str) -> BuildId {
        BuildId::parse(s).unwrap()
    }

    fn staged(ledger: &mut StageLedger, name: &str, secret: &str) -> Credential {
        ledger.reserve(id(name), Credential::from_string(secret)).unwrap();
        ledger.activate(&id(name)).unwrap()
    }

    #[test]
    fn test_credential_inactive_while_seeding() {
        let mut ledger = StageLedger::new();
        ledger.reserve(id("b1"), Credential::from_string("s1")).unwrap();
        assert!(!ledger.credentials().contains("s1"));
        ledger.activate(&id("b1")).unwrap();
        assert!(ledger.credentials().contains("s1"));
    }

    #[test]
    fn test_reserve_rejects_duplicate_live_id() {
        let mut ledger = StageLedger::new();
        staged(&mut ledger, "b1", "s1");
        assert_eq!(
            ledger.reserve(id("b1"), Credential::from_string("s2")),
            Err(LedgerError::AlreadyStaged(id("b1")))
        );
    }

    #[test]
    fn test_claim_for_commit_is_exclusive() {
        let mut ledger = StageLedger::new();
        staged(&mut ledger, "b1", "s1");

        let revoked = ledger.claim_for_commit(&id("b1")).unwrap();
        assert_eq!(revoked.as_str(), "s1");
        assert!(!ledger.credentials().contains("s1"));
        assert_eq!(ledger.find(&id("b1")).unwrap().state, StageState::Committing);

        assert_eq!(ledger.claim_for_commit(&id("b1")), Err(LedgerError::NotFound(id("b1"))));
        assert_eq!(ledger.begin_delete(&id("b1")).unwrap_err(), LedgerError::NotFound(id("b1")));

        assert!(ledger.release(&id("b1")).is_some());
        assert!(ledger.is_empty());
    }

    #[test]
    fn test_delete_absent_still_tombstones() {
        let mut ledger = StageLedger::new();
        assert!(ledger.begin_delete(&id("ghost")).unwrap().is_none());
        assert_eq!(
            ledger.reserve(id("ghost"), Credential::from_string("s1")),
            Err(LedgerError::Deleting(id("ghost")))
        );

        ledger.finish_delete(&id("ghost"));
        ledger.reserve(id("ghost"), Credential::from_string("s1")).unwrap();
    }

    #[test]
    fn test_tombstone_blocks_reserve_until_finished() {
        let mut ledger = StageLedger::new();
        staged(&mut ledger, "b1", "s1");

        ledger.begin_delete(&id("b1")).unwrap().unwrap();
        assert!(ledger.is_deleting(&id("b1")));
        assert_eq!(
            ledger.reserve(id("b1"), Credential::from_string("s2")),
            Err(LedgerError::Deleting(id("b1")))
        );
        assert_eq!(ledger.begin_delete(&id("b1")).unwrap_err(), LedgerError::NotFound(id("b1")));
        assert!(!ledger.credentials().contains("s2"));

        ledger.finish_delete(&id("b1"));
        assert!(!ledger.is_deleting(&id("b1")));
        staged(&mut ledger, "b1", "s2");
        assert!(ledger.credentials().contains("s2"));
    }

    #[test]
    fn test_begin_delete_revokes() {
        let mut ledger = StageLedger::new();
        staged(&mut ledger, "b1", "s1");
        staged(&mut ledger, "b2", "s2");

        let record = ledger.begin_delete(&id("b1")).unwrap().unwrap();
        assert_eq!(record.credential.as_str(), "s1");
        assert!(!ledger.credentials().contains("s1"));
        assert!(ledger.credentials().contains("s2"));
        assert_eq!(ledger.lookup_credential(&id("b1")), Err(LedgerError::NotFound(id("b1"))));
        assert_eq!(ledger.lookup_credential(&id("b2")).unwrap().as_str(), "s2");
    }
}
