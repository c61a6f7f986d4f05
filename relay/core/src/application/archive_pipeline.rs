// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

//! Archive Pipeline
//!
//! Moves builds between staging directories and the blob store through `tar`
//! subprocesses without holding a whole archive in memory.
//!
//! ## Extract (seeding a new stage)
//! ```text
//! BlobStore::read_blob(old) ──copy──▶ tar -C <dir> -zxf -
//! ```
//!
//! ## Compress (committing a stage)
//! ```text
//! tar -C <dir> -czf - . ──copy──▶ duplex pipe ──▶ upload task: BlobStore::write_blob(id)
//! ```
//! The duplex pipe has a fixed capacity, so `tar` is throttled to the upload
//! rate. The upload only sees end-of-stream once `tar` has exited cleanly; a
//! failed compress aborts the upload instead of finishing a truncated blob.

use std::io;
use std::path::{Path, PathBuf};
use std::process::{ExitStatus, Stdio};
use std::sync::Arc;
use thiserror::Error;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWriteExt};
use tokio::process::Command;
use tracing::{debug, trace};

use crate::domain::blob_store::{BlobStore, StoreError};
use crate::domain::build::BuildId;

/// Bytes buffered between `tar` and the uploader
const PIPE_CAPACITY: usize = 64 * 1024;

#[derive(Debug, Error)]
pub enum ArchiveError {
    #[error("Failed to run '{command}' - {source}")]
    Spawn {
        command: String,
        #[source]
        source: io::Error,
    },

    #[error("Failed to get old build - {0}")]
    Fetch(#[source] StoreError),

    #[error("Failed to extract build - {status}: {output}")]
    ExtractFailed { status: ExitStatus, output: String },

    #[error("Failed to compress build - {status}: {stderr}")]
    CompressFailed { status: ExitStatus, stderr: String },

    #[error("Failed to write build - {0}")]
    Upload(#[source] StoreError),

    #[error("Upload task failed - {0}")]
    UploadTask(String),

    #[error("Archive stream failed - {0}")]
    Pipe(#[from] io::Error),
}

pub struct ArchivePipeline {
    store: Arc<dyn BlobStore>,
    tar_path: PathBuf,
}

impl ArchivePipeline {
    pub fn new(store: Arc<dyn BlobStore>, tar_path: impl Into<PathBuf>) -> Self {
        Self {
            store,
            tar_path: tar_path.into(),
        }
    }

    pub fn store(&self) -> &Arc<dyn BlobStore> {
        &self.store
    }

    fn tar(&self) -> Command {
        let mut command = Command::new(&self.tar_path);
        command.kill_on_drop(true);
        command
    }

    fn spawn_error(&self, source: io::Error) -> ArchiveError {
        ArchiveError::Spawn {
            command: self.tar_path.display().to_string(),
            source,
        }
    }

    /// Fetch build `old_id` from the store and unpack it into `dest`
    pub async fn seed(&self, old_id: &BuildId, dest: &Path) -> Result<(), ArchiveError> {
        let blob = self
            .store
            .read_blob(old_id)
            .await
            .map_err(ArchiveError::Fetch)?;
        trace!(build_id = %old_id, "Fetched build");

        self.extract(blob, dest).await
    }

    /// Unpack a gzipped tar stream into `dest`
    ///
    /// On failure the error carries tar's combined output.
    pub async fn extract<R>(&self, mut blob: R, dest: &Path) -> Result<(), ArchiveError>
    where
        R: AsyncRead + Unpin + Send,
    {
        let mut command = self.tar();
        command
            .arg("-C")
            .arg(dest)
            .args(["-zxf", "-"])
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped());

        trace!("Running extract command {:?}", command.as_std());
        let mut child = command.spawn().map_err(|e| self.spawn_error(e))?;
        let mut stdin = child
            .stdin
            .take()
            .ok_or_else(|| io::Error::other("extract stdin unavailable"))?;

        let feed = async move {
            let copied = tokio::io::copy(&mut blob, &mut stdin).await;
            // closing stdin marks the end of the archive
            drop(stdin);
            copied
        };
        let (fed, output) = tokio::join!(feed, child.wait_with_output());

        let output = output?;
        if !output.status.success() {
            let mut combined = output.stdout;
            combined.extend_from_slice(&output.stderr);
            return Err(ArchiveError::ExtractFailed {
                status: output.status,
                output: String::from_utf8_lossy(&combined).trim().to_string(),
            });
        }

        let bytes = fed?;
        debug!(bytes, dest = %dest.display(), "Extracted build");
        Ok(())
    }

    /// Compress `source` and stream the archive to the store under `id`
    ///
    /// Returns the number of compressed bytes handed to the store.
    pub async fn publish(&self, source: &Path, id: &BuildId) -> Result<u64, ArchiveError> {
        let mut command = self.tar();
        command
            .arg("-C")
            .arg(source)
            .args(["-czf", "-", "."])
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped());

        trace!("Running compress command {:?}", command.as_std());
        let mut child = command.spawn().map_err(|e| self.spawn_error(e))?;
        let mut stdout = child
            .stdout
            .take()
            .ok_or_else(|| io::Error::other("compress stdout unavailable"))?;
        let stderr = child.stderr.take();

        let (mut pipe_writer, pipe_reader) = tokio::io::duplex(PIPE_CAPACITY);
        let store = self.store.clone();
        let upload_id = id.clone();
        let upload = tokio::spawn(async move {
            store.write_blob(&upload_id, Box::new(pipe_reader)).await
        });

        let pump = tokio::io::copy(&mut stdout, &mut pipe_writer);
        let drain_stderr = async move {
            let mut buf = Vec::new();
            if let Some(mut stderr) = stderr {
                let _ = stderr.read_to_end(&mut buf).await;
            }
            buf
        };
        let (pumped, stderr_bytes) = tokio::join!(pump, drain_stderr);
        // unblock tar if the uploader hung up early
        drop(stdout);
        let status = child.wait().await;

        let compressed = match pumped {
            Ok(bytes) => bytes,
            Err(pipe_error) => {
                // The uploader dropping its end is the usual cause; prefer its error.
                if upload.is_finished() {
                    if let Ok(Err(store_error)) = upload.await {
                        return Err(ArchiveError::Upload(store_error));
                    }
                } else {
                    upload.abort();
                }
                return Err(ArchiveError::Pipe(pipe_error));
            }
        };

        match status {
            Ok(status) if status.success() => {}
            Ok(status) => {
                upload.abort();
                return Err(ArchiveError::CompressFailed {
                    status,
                    stderr: String::from_utf8_lossy(&stderr_bytes).trim().to_string(),
                });
            }
            Err(e) => {
                upload.abort();
                return Err(ArchiveError::Pipe(e));
            }
        }
        trace!(bytes = compressed, "Compressed build");

        // end-of-stream for the uploader
        pipe_writer.shutdown().await?;
        drop(pipe_writer);

        match upload.await {
            Ok(Ok(())) => {
                debug!(build_id = %id, bytes = compressed, "Uploaded build");
                Ok(compressed)
            }
            Ok(Err(store_error)) => Err(ArchiveError::Upload(store_error)),
            Err(join_error) => Err(ArchiveError::UploadTask(join_error.to_string())),
        }
    }
}
