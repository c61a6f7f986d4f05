// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

//! Stage Registry
//!
//! Owns the stage ledger and drives every lifecycle transition:
//!
//! - `add_stage`: reserve the id, create (and optionally seed) the staging
//!   directory, then publish the credential
//! - `commit_stage`: revoke the credential, archive the directory into the
//!   blob store, drop the record
//! - `delete_stage`: revoke the credential and remove the directory; the id
//!   stays tombstoned until the directory is gone
//!
//! The ledger lock is only ever taken for in-memory transitions and is never
//! held across an await point; directory and archive work runs unlocked while
//! the record's state keeps other callers away from it.

use parking_lot::Mutex;
use scopeguard::ScopeGuard;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use thiserror::Error;
use tracing::{debug, info, warn};

use crate::application::archive_pipeline::{ArchiveError, ArchivePipeline};
use crate::application::credential_directory::CredentialDirectory;
use crate::domain::build::{BuildId, BuildIdError};
use crate::domain::credential::{Credential, EntropyError, SecretSource};
use crate::domain::stage::{LedgerError, StageLedger};

#[derive(Debug, Error)]
pub enum StageError {
    #[error(transparent)]
    Validation(#[from] BuildIdError),

    #[error("Build '{0}' is already staged")]
    AlreadyStaged(BuildId),

    #[error("No Build Found: '{0}'")]
    NotFound(BuildId),

    #[error("Build '{0}' is being deleted")]
    Deleting(BuildId),

    #[error("Failed to find build dir '{}'", .0.display())]
    MissingDirectory(PathBuf),

    #[error("Failed to {action} build dir '{}' - {source}", .path.display())]
    Io {
        action: &'static str,
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error(transparent)]
    Archive(#[from] ArchiveError),

    #[error(transparent)]
    Entropy(#[from] EntropyError),
}

impl From<LedgerError> for StageError {
    fn from(err: LedgerError) -> Self {
        match err {
            LedgerError::AlreadyStaged(id) => StageError::AlreadyStaged(id),
            LedgerError::NotFound(id) => StageError::NotFound(id),
            LedgerError::Deleting(id) => StageError::Deleting(id),
        }
    }
}

pub struct StageRegistry {
    ledger: Arc<Mutex<StageLedger>>,
    build_root: PathBuf,
    pipeline: ArchivePipeline,
    secrets: Arc<dyn SecretSource>,
}

impl StageRegistry {
    pub fn new(
        build_root: impl Into<PathBuf>,
        pipeline: ArchivePipeline,
        secrets: Arc<dyn SecretSource>,
    ) -> Self {
        Self {
            ledger: Arc::new(Mutex::new(StageLedger::new())),
            build_root: build_root.into(),
            pipeline,
            secrets,
        }
    }

    pub fn build_root(&self) -> &Path {
        &self.build_root
    }

    /// Membership view handed to the transfer gateway
    pub fn credentials(&self) -> CredentialDirectory {
        CredentialDirectory::new(self.ledger.clone())
    }

    /// Number of builds currently tracked, whatever their state
    pub fn staged_count(&self) -> usize {
        self.ledger.lock().len()
    }

    pub fn lookup_credential(&self, id: &BuildId) -> Result<Credential, StageError> {
        let credential = self.ledger.lock().lookup_credential(id)?.clone();
        Ok(credential)
    }

    /// Create a staging directory for `new_id`, optionally seeded from the
    /// committed build `old_id` (empty for none), and issue its credential.
    ///
    /// The credential is only returned here and only becomes valid once the
    /// directory is fully prepared.
    pub async fn add_stage(&self, old_id: &str, new_id: &str) -> Result<Credential, StageError> {
        let new_id = BuildId::parse(new_id)?;
        let old_id = match old_id {
            "" => None,
            raw => Some(BuildId::parse(raw)?),
        };

        let credential = Credential::generate(self.secrets.as_ref())?;
        self.ledger.lock().reserve(new_id.clone(), credential)?;
        let reservation = scopeguard::guard(
            (self.ledger.clone(), new_id.clone()),
            |(ledger, id)| {
                ledger.lock().release(&id);
            },
        );

        let dir = new_id.staging_dir(&self.build_root);
        if let Err(e) = self.prepare(&dir, old_id.as_ref()).await {
            if let Err(cleanup) = tokio::fs::remove_dir_all(&dir).await {
                if cleanup.kind() != io::ErrorKind::NotFound {
                    warn!(build_id = %new_id, "Failed to clean up build dir: {}", cleanup);
                }
            }
            return Err(e);
        }

        let (ledger, id) = ScopeGuard::into_inner(reservation);
        let credential = ledger.lock().activate(&id)?;
        info!(
            build_id = %id,
            seeded_from = old_id.as_ref().map(BuildId::as_str).unwrap_or(""),
            "Build staged"
        );
        Ok(credential)
    }

    /// Start the stage from an empty directory, clearing anything left
    /// behind by an earlier failed commit
    async fn prepare(&self, dir: &Path, old_id: Option<&BuildId>) -> Result<(), StageError> {
        match tokio::fs::remove_dir_all(dir).await {
            Ok(()) => warn!(dir = %dir.display(), "Cleared leftover build dir"),
            Err(e) if e.kind() == io::ErrorKind::NotFound => {}
            Err(source) => {
                return Err(StageError::Io {
                    action: "clear",
                    path: dir.to_path_buf(),
                    source,
                })
            }
        }

        tokio::fs::create_dir_all(dir)
            .await
            .map_err(|source| StageError::Io {
                action: "create",
                path: dir.to_path_buf(),
                source,
            })?;

        if let Some(old_id) = old_id {
            debug!(old_id = %old_id, dir = %dir.display(), "Seeding build dir");
            self.pipeline.seed(old_id, dir).await?;
        }
        Ok(())
    }

    /// Revoke the build's credential and archive its directory into the store
    ///
    /// The credential stays revoked and the record is dropped even when the
    /// archive or upload fails.
    pub async fn commit_stage(&self, build_id: &str) -> Result<(), StageError> {
        let id = BuildId::parse(build_id)?;
        self.ledger.lock().claim_for_commit(&id)?;
        let _claim = scopeguard::guard((self.ledger.clone(), id.clone()), |(ledger, id)| {
            ledger.lock().release(&id);
        });
        debug!(build_id = %id, "Credential revoked for commit");

        let dir = id.staging_dir(&self.build_root);
        match tokio::fs::metadata(&dir).await {
            Ok(meta) if meta.is_dir() => {}
            _ => return Err(StageError::MissingDirectory(dir)),
        }

        let bytes = self.pipeline.publish(&dir, &id).await?;

        if let Err(e) = tokio::fs::remove_dir_all(&dir).await {
            warn!(build_id = %id, "Failed to remove committed build dir: {}", e);
        }
        info!(build_id = %id, bytes, "Build committed");
        Ok(())
    }

    /// Revoke the build's credential (if any) and remove its directory
    ///
    /// Deleting an unknown build still removes a leftover directory and is
    /// not an error. A build that is being seeded, committed or deleted is
    /// reported as not found. Adds for the same id are refused until the
    /// directory is gone.
    pub async fn delete_stage(&self, build_id: &str) -> Result<(), StageError> {
        let id = BuildId::parse(build_id)?;
        let evicted = self.ledger.lock().begin_delete(&id)?;
        let _tombstone = scopeguard::guard((self.ledger.clone(), id.clone()), |(ledger, id)| {
            ledger.lock().finish_delete(&id);
        });
        if evicted.is_none() {
            debug!(build_id = %id, "No live record, removing directory only");
        }

        let dir = id.staging_dir(&self.build_root);
        match tokio::fs::remove_dir_all(&dir).await {
            Ok(()) => {}
            Err(e) if e.kind() == io::ErrorKind::NotFound => {}
            Err(source) => {
                return Err(StageError::Io {
                    action: "remove",
                    path: dir,
                    source,
                })
            }
        }
        info!(build_id = %id, "Build deleted");
        Ok(())
    }
}
