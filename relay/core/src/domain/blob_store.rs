// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

//! Blob Store Port - Anti-Corruption Layer for the remote build store
//!
//! Committed builds live in a remote store as opaque compressed archives keyed
//! by build id. The relay only needs streaming reads and writes plus a
//! readiness check, so transport details (HTTP, auth headers, TLS) stay in the
//! infrastructure adapters.

use async_trait::async_trait;
use thiserror::Error;
use tokio::io::AsyncRead;

use crate::domain::build::BuildId;

/// Stream of archive bytes fetched from the store
pub type BlobReader = Box<dyn AsyncRead + Send + Unpin>;

/// Stream of archive bytes handed to the store for upload
pub type BlobBody = Box<dyn AsyncRead + Send + Sync + Unpin>;

#[async_trait]
pub trait BlobStore: Send + Sync {
    /// Ensure the store is reachable; called once at startup
    async fn initialize(&self) -> Result<(), StoreError>;

    /// Open a stream over the blob stored under `id`
    ///
    /// The returned reader owns the underlying connection; dropping it closes
    /// the stream.
    async fn read_blob(&self, id: &BuildId) -> Result<BlobReader, StoreError>;

    /// Store everything read from `blob` under `id`
    async fn write_blob(&self, id: &BuildId, blob: BlobBody) -> Result<(), StoreError>;
}

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("Blob not found: {0}")]
    NotFound(String),

    #[error("401 Unauthorized. Please specify store token")]
    Unauthorized,

    #[error("Store returned status {status}: {message}")]
    Status { status: u16, message: String },

    #[error("Network error: {0}")]
    Network(String),

    #[error("Timeout while communicating with store")]
    Timeout,

    #[error("Invalid store address: {0}")]
    InvalidAddress(String),

    #[error("IO error: {0}")]
    Io(String),

    #[error("Unknown store error: {0}")]
    Unknown(String),
}

impl From<reqwest::Error> for StoreError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            StoreError::Timeout
        } else if err.is_connect() {
            StoreError::Network(err.to_string())
        } else {
            StoreError::Unknown(err.to_string())
        }
    }
}

impl From<std::io::Error> for StoreError {
    fn from(err: std::io::Error) -> Self {
        StoreError::Io(err.to_string())
    }
}
