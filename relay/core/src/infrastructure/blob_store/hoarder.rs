// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

//! Hoarder Blob Store Implementation
//!
//! Implements the BlobStore trait against a hoarder HTTP API as an
//! Anti-Corruption Layer.
//!
//! # API Endpoints
//!
//! - `GET /ping` - Health check
//! - `GET /blobs/{id}` - Stream a stored build
//! - `POST /blobs/{id}` - Upload a build (streamed request body)
//!
//! Every request carries `X-AUTH-TOKEN` when a token is configured.

use async_trait::async_trait;
use futures::TryStreamExt;
use reqwest::{Body, Client, Response, StatusCode};
use std::io;
use std::time::Duration;
use tokio_util::io::{ReaderStream, StreamReader};
use tracing::trace;

use crate::domain::blob_store::{BlobBody, BlobReader, BlobStore, StoreError};
use crate::domain::build::BuildId;

const AUTH_HEADER: &str = "X-AUTH-TOKEN";

pub struct HoarderStore {
    client: Client,

    /// Base URL, e.g. "http://localhost:7410"
    base_url: String,

    token: Option<String>,
}

impl HoarderStore {
    /// Create a new hoarder client
    ///
    /// Only the connect phase is bounded; transfers of large builds may take
    /// arbitrarily long.
    pub fn new(
        base_url: impl Into<String>,
        token: Option<String>,
        verify_certificates: bool,
    ) -> Result<Self, StoreError> {
        let client = Client::builder()
            .connect_timeout(Duration::from_secs(10))
            .danger_accept_invalid_certs(!verify_certificates)
            .build()
            .map_err(|e| StoreError::Unknown(format!("Failed to create HTTP client: {}", e)))?;

        Ok(Self {
            client,
            base_url: base_url.into(),
            token,
        })
    }

    fn build_url(&self, path: &str) -> String {
        format!("{}/{}", self.base_url, path)
    }

    async fn send(&self, request: reqwest::RequestBuilder) -> Result<Response, StoreError> {
        let request = match &self.token {
            Some(token) => request.header(AUTH_HEADER, token),
            None => request,
        };
        let response = request.send().await?;
        if response.status() == StatusCode::UNAUTHORIZED {
            return Err(StoreError::Unauthorized);
        }
        Ok(response)
    }

    async fn status_error(response: Response) -> StoreError {
        let status = response.status();
        let message = response
            .text()
            .await
            .unwrap_or_else(|_| format!("HTTP {}", status));
        StoreError::Status {
            status: status.as_u16(),
            message: message.trim().to_string(),
        }
    }
}

#[async_trait]
impl BlobStore for HoarderStore {
    async fn initialize(&self) -> Result<(), StoreError> {
        trace!("[client] - GET hoarder/ping");
        let response = self.send(self.client.get(self.build_url("ping"))).await?;
        if !response.status().is_success() {
            return Err(Self::status_error(response).await);
        }
        Ok(())
    }

    async fn read_blob(&self, id: &BuildId) -> Result<BlobReader, StoreError> {
        trace!("[client] - GET hoarder/blobs/{}", id);
        let response = self
            .send(self.client.get(self.build_url(&format!("blobs/{}", id))))
            .await?;

        match response.status() {
            status if status.is_success() => {
                let stream = Box::pin(response.bytes_stream().map_err(io::Error::other));
                Ok(Box::new(StreamReader::new(stream)))
            }
            StatusCode::NOT_FOUND => Err(StoreError::NotFound(id.to_string())),
            _ => Err(Self::status_error(response).await),
        }
    }

    async fn write_blob(&self, id: &BuildId, blob: BlobBody) -> Result<(), StoreError> {
        trace!("[client] - POST hoarder/blobs/{}", id);
        let body = Body::wrap_stream(ReaderStream::new(blob));
        let response = self
            .send(
                self.client
                    .post(self.build_url(&format!("blobs/{}", id)))
                    .body(body),
            )
            .await?;

        if !response.status().is_success() {
            return Err(Self::status_error(response).await);
        }
        Ok(())
    }
}
