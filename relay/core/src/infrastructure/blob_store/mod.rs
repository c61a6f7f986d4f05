// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

//! Blob Store Infrastructure Module
//!
//! Provides concrete implementations of the BlobStore trait.

pub mod hoarder;

pub use hoarder::HoarderStore;
pub use memory::InMemoryBlobStore;

use std::sync::Arc;

use crate::domain::blob_store::{BlobStore, StoreError};
use crate::domain::relay_config::StoreConfig;

/// Blob store backend configuration
#[derive(Debug, Clone)]
pub enum StoreBackend {
    /// Remote hoarder store over HTTP(S)
    Hoarder {
        base_url: String,
        token: Option<String>,
        verify_certificates: bool,
    },

    /// Process-local store (development/testing)
    Memory,
}

impl StoreBackend {
    /// Translate `store.address` into a backend
    ///
    /// `hoarder://host:port` becomes http or https depending on `tls`;
    /// explicit `http://` and `https://` addresses are used as given.
    pub fn from_config(config: &StoreConfig) -> Result<Self, StoreError> {
        let (scheme, rest) = config
            .address
            .split_once("://")
            .ok_or_else(|| StoreError::InvalidAddress(config.address.clone()))?;

        let base_url = match scheme {
            "memory" => return Ok(StoreBackend::Memory),
            "hoarder" if config.tls => format!("https://{}", rest),
            "hoarder" => format!("http://{}", rest),
            "http" | "https" => config.address.clone(),
            _ => return Err(StoreError::InvalidAddress(config.address.clone())),
        };
        if rest.trim_end_matches('/').is_empty() {
            return Err(StoreError::InvalidAddress(config.address.clone()));
        }

        Ok(StoreBackend::Hoarder {
            base_url: base_url.trim_end_matches('/').to_string(),
            token: Some(config.token.clone()).filter(|t| !t.is_empty()),
            verify_certificates: config.verify_certificates,
        })
    }
}

/// Factory function to create a blob store from configuration
pub fn create_blob_store(backend: StoreBackend) -> Result<Arc<dyn BlobStore>, StoreError> {
    match backend {
        StoreBackend::Hoarder {
            base_url,
            token,
            verify_certificates,
        } => Ok(Arc::new(HoarderStore::new(base_url, token, verify_certificates)?)),
        StoreBackend::Memory => Ok(Arc::new(InMemoryBlobStore::new())),
    }
}

mod memory {
    use async_trait::async_trait;
    use parking_lot::Mutex;
    use std::collections::HashMap;
    use tokio::io::AsyncReadExt;

    use crate::domain::blob_store::{BlobBody, BlobReader, BlobStore, StoreError};
    use crate::domain::build::BuildId;

    /// Keeps every blob in a map; reads hand out a copy
    #[derive(Default)]
    pub struct InMemoryBlobStore {
        blobs: Mutex<HashMap<BuildId, Vec<u8>>>,
    }

    impl InMemoryBlobStore {
        pub fn new() -> Self {
            Self::default()
        }

        pub fn insert(&self, id: BuildId, bytes: Vec<u8>) {
            self.blobs.lock().insert(id, bytes);
        }

        pub fn blob(&self, id: &BuildId) -> Option<Vec<u8>> {
            self.blobs.lock().get(id).cloned()
        }

        pub fn len(&self) -> usize {
            self.blobs.lock().len()
        }

        pub fn is_empty(&self) -> bool {
            self.len() == 0
        }
    }

    #[async_trait]
    impl BlobStore for InMemoryBlobStore {
        async fn initialize(&self) -> Result<(), StoreError> {
            Ok(())
        }

        async fn read_blob(&self, id: &BuildId) -> Result<BlobReader, StoreError> {
            let bytes = self
                .blob(id)
                .ok_or_else(|| StoreError::NotFound(id.to_string()))?;
            Ok(Box::new(std::io::Cursor::new(bytes)))
        }

        async fn write_blob(&self, id: &BuildId, mut blob: BlobBody) -> Result<(), StoreError> {
            let mut bytes = Vec::new();
            blob.read_to_end(&mut bytes).await?;
            // only a fully read stream becomes visible
            self.insert(id.clone(), bytes);
            Ok(())
        }
    }
}
