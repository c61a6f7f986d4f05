// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

//! Staging HTTP API
//!
//! - `GET /ping` - life check, no token required
//! - `POST /stages` - create a stage, returns its transfer secret
//! - `PUT /stages/{build_id}` - commit a stage
//! - `DELETE /stages/{build_id}` - delete a stage
//!
//! Stage routes require `X-AUTH-TOKEN` when a token is configured.

use axum::{
    extract::{rejection::JsonRejection, Path, Request, State},
    http::StatusCode,
    middleware::{self, Next},
    response::{IntoResponse, Response},
    routing::{get, post, put},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::sync::Arc;
use tracing::{debug, error};

use crate::application::stage_registry::{StageError, StageRegistry};

pub const AUTH_HEADER: &str = "X-AUTH-TOKEN";

pub struct ApiState {
    pub registry: Arc<StageRegistry>,
    pub token: String,
}

pub fn app(registry: Arc<StageRegistry>, token: impl Into<String>) -> Router {
    let state = Arc::new(ApiState {
        registry,
        token: token.into(),
    });

    // keep "/stages" so a build named "ping" won't break anything
    let stages = Router::new()
        .route("/stages", post(add_stage))
        .route("/stages/{build_id}", put(commit_stage).delete(delete_stage))
        .route_layer(middleware::from_fn_with_state(state.clone(), require_token));

    Router::new()
        .route("/ping", get(pong))
        .merge(stages)
        .with_state(state)
}

#[derive(Debug, Serialize, Deserialize)]
pub struct AddStageRequest {
    #[serde(rename = "old-id", default)]
    pub old_id: String,
    #[serde(rename = "new-id", default)]
    pub new_id: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct AddStageResponse {
    pub secret: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct MessageResponse {
    pub msg: String,
}

#[derive(Debug)]
pub enum ApiError {
    BadJson,
    MissingPayload,
    Unauthorized,
    Stage(StageError),
}

impl From<StageError> for ApiError {
    fn from(err: StageError) -> Self {
        ApiError::Stage(err)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, message) = match self {
            ApiError::BadJson => (
                StatusCode::BAD_REQUEST,
                "Bad JSON Syntax Received in Body".to_string(),
            ),
            ApiError::MissingPayload => {
                (StatusCode::BAD_REQUEST, "Missing Payload Data".to_string())
            }
            ApiError::Unauthorized => (StatusCode::UNAUTHORIZED, "Unauthorized".to_string()),
            ApiError::Stage(err) => {
                let status = match &err {
                    StageError::Validation(_) => StatusCode::BAD_REQUEST,
                    StageError::NotFound(_) => StatusCode::NOT_FOUND,
                    StageError::AlreadyStaged(_) | StageError::Deleting(_) => {
                        StatusCode::CONFLICT
                    }
                    _ => StatusCode::INTERNAL_SERVER_ERROR,
                };
                if status == StatusCode::INTERNAL_SERVER_ERROR {
                    error!("Stage operation failed: {}", err);
                }
                (status, err.to_string())
            }
        };
        debug!(status = status.as_u16(), "{}", message);
        (status, Json(json!({ "error": message }))).into_response()
    }
}

async fn require_token(
    State(state): State<Arc<ApiState>>,
    request: Request,
    next: Next,
) -> Result<Response, ApiError> {
    if !state.token.is_empty() {
        let presented = request
            .headers()
            .get(AUTH_HEADER)
            .and_then(|v| v.to_str().ok());
        if presented != Some(state.token.as_str()) {
            return Err(ApiError::Unauthorized);
        }
    }
    Ok(next.run(request).await)
}

// life check
async fn pong() -> &'static str {
    "pong\n"
}

async fn add_stage(
    State(state): State<Arc<ApiState>>,
    payload: Result<Json<AddStageRequest>, JsonRejection>,
) -> Result<Json<AddStageResponse>, ApiError> {
    let Json(request) = payload.map_err(|_| ApiError::BadJson)?;
    if request.new_id.is_empty() {
        return Err(ApiError::MissingPayload);
    }

    let credential = state
        .registry
        .add_stage(&request.old_id, &request.new_id)
        .await?;
    Ok(Json(AddStageResponse {
        secret: credential.into_inner(),
    }))
}

async fn commit_stage(
    State(state): State<Arc<ApiState>>,
    Path(build_id): Path<String>,
) -> Result<Json<MessageResponse>, ApiError> {
    state.registry.commit_stage(&build_id).await?;
    Ok(success())
}

async fn delete_stage(
    State(state): State<Arc<ApiState>>,
    Path(build_id): Path<String>,
) -> Result<Json<MessageResponse>, ApiError> {
    state.registry.delete_stage(&build_id).await?;
    Ok(success())
}

fn success() -> Json<MessageResponse> {
    Json(MessageResponse {
        msg: "Success".to_string(),
    })
}
