// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

//! HTTP client for the relay's staging API

use anyhow::{Context, Result};
use reqwest::{Client, RequestBuilder, Response};
use serde::Deserialize;

use slurp_core::presentation::api::{AddStageRequest, AddStageResponse, AUTH_HEADER};

#[derive(Debug, Clone)]
pub struct RelayClient {
    client: Client,
    base_url: String,
    token: Option<String>,
}

#[derive(Deserialize)]
struct ErrorBody {
    error: String,
}

impl RelayClient {
    pub fn new(base_url: impl Into<String>, token: Option<String>) -> Result<Self> {
        let client = Client::builder()
            // commits stream whole builds, so no global timeout
            .build()
            .context("Failed to create HTTP client")?;

        Ok(Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            token: token.filter(|t| !t.is_empty()),
        })
    }

    fn authorized(&self, request: RequestBuilder) -> RequestBuilder {
        match &self.token {
            Some(token) => request.header(AUTH_HEADER, token),
            None => request,
        }
    }

    /// Surface the relay's `{"error": ...}` payload on failure
    async fn check(response: Response, action: &str) -> Result<Response> {
        if response.status().is_success() {
            return Ok(response);
        }
        let status = response.status();
        let text = response.text().await.unwrap_or_default();
        let message = serde_json::from_str::<ErrorBody>(&text)
            .map(|body| body.error)
            .unwrap_or(text);
        anyhow::bail!("Failed to {} ({}): {}", action, status, message.trim())
    }

    pub async fn ping(&self) -> Result<bool> {
        let response = self
            .client
            .get(format!("{}/ping", self.base_url))
            .send()
            .await
            .context("Failed to reach relay")?;
        Ok(response.status().is_success())
    }

    /// Create a stage; returns the transfer secret
    pub async fn add_stage(&self, old_id: &str, new_id: &str) -> Result<String> {
        let request = AddStageRequest {
            old_id: old_id.to_string(),
            new_id: new_id.to_string(),
        };
        let response = self
            .authorized(self.client.post(format!("{}/stages", self.base_url)))
            .json(&request)
            .send()
            .await
            .context("Failed to add stage")?;

        let body: AddStageResponse = Self::check(response, "add stage")
            .await?
            .json()
            .await
            .context("Failed to parse add stage response")?;
        Ok(body.secret)
    }

    pub async fn commit_stage(&self, build_id: &str) -> Result<()> {
        let response = self
            .authorized(
                self.client
                    .put(format!("{}/stages/{}", self.base_url, build_id)),
            )
            .send()
            .await
            .context("Failed to commit stage")?;
        Self::check(response, "commit stage").await?;
        Ok(())
    }

    pub async fn delete_stage(&self, build_id: &str) -> Result<()> {
        let response = self
            .authorized(
                self.client
                    .delete(format!("{}/stages/{}", self.base_url, build_id)),
            )
            .send()
            .await
            .context("Failed to delete stage")?;
        Self::check(response, "delete stage").await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use mockito::{Matcher, Server};

    #[tokio::test]
    async fn test_add_stage_returns_secret() {
        let mut server = Server::new_async().await;
        let mock = server
            .mock("POST", "/stages")
            .match_header("x-auth-token", "secret")
            .match_body(Matcher::Json(serde_json::json!({"old-id": "b0", "new-id": "b1"})))
            .with_status(200)
            .with_body(r#"{"secret":"abc123"}"#)
            .create_async()
            .await;

        let client = RelayClient::new(server.url(), Some("secret".to_string())).unwrap();
        assert_eq!(client.add_stage("b0", "b1").await.unwrap(), "abc123");
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn test_error_payload_is_reported() {
        let mut server = Server::new_async().await;
        server
            .mock("PUT", "/stages/b1")
            .with_status(404)
            .with_body(r#"{"error":"No Build Found: 'b1'"}"#)
            .create_async()
            .await;

        let client = RelayClient::new(server.url(), None).unwrap();
        let err = client.commit_stage("b1").await.unwrap_err();
        assert!(err.to_string().contains("No Build Found: 'b1'"));
    }

    #[tokio::test]
    async fn test_delete_and_ping() {
        let mut server = Server::new_async().await;
        server
            .mock("GET", "/ping")
            .with_body("pong\n")
            .create_async()
            .await;
        server
            .mock("DELETE", "/stages/b1")
            .with_body(r#"{"msg":"Success"}"#)
            .create_async()
            .await;

        let client = RelayClient::new(server.url(), None).unwrap();
        assert!(client.ping().await.unwrap());
        client.delete_stage("b1").await.unwrap();
    }
}
