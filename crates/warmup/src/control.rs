//! HTTP control API for the warm-up daemon.
//!
//! Exposes the orchestrator's control operations (connect, start, pause,
//! resume, stop, karma) plus read-only stats. The CLI subcommands talk to
//! this surface.

use std::sync::Arc;

use axum::{
    Json, Router,
    extract::{Path, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
};
use serde::Deserialize;
use serde_json::json;
use thiserror::Error;
use tracing::{debug, warn};
use warmup_engine::{Orchestrator, StoreError, WarmupError};

/// Error returned by a control handler.
#[derive(Debug, Error)]
#[error(transparent)]
pub struct ControlError(#[from] WarmupError);

impl ControlError {
    fn status(&self) -> StatusCode {
        match &self.0 {
            e if e.is_missing_account() => StatusCode::NOT_FOUND,
            WarmupError::NotEligible { .. } => StatusCode::CONFLICT,
            WarmupError::Store(StoreError::AlreadyExists(_)) => StatusCode::CONFLICT,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for ControlError {
    fn into_response(self) -> Response {
        let status = self.status();
        if status.is_server_error() {
            warn!(error = %self, "control request failed");
        }
        (status, Json(json!({ "error": self.to_string() }))).into_response()
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ConnectRequest {
    id: String,
    #[serde(default)]
    target_subreddits: Vec<String>,
}

#[derive(Debug, Deserialize)]
struct KarmaRequest {
    karma: i64,
}

/// Create the control router.
pub fn create_router(orchestrator: Arc<Orchestrator>) -> Router {
    Router::new()
        .route("/health", get(handle_health))
        .route("/stats", get(handle_stats))
        .route("/accounts", post(handle_connect))
        .route("/accounts/{id}", get(handle_report))
        .route("/accounts/{id}/start", post(handle_start))
        .route("/accounts/{id}/pause", post(handle_pause))
        .route("/accounts/{id}/resume", post(handle_resume))
        .route("/accounts/{id}/stop", post(handle_stop))
        .route("/accounts/{id}/karma", post(handle_karma))
        .with_state(orchestrator)
}

async fn handle_health() -> impl IntoResponse {
    Json(json!({ "status": "ok" }))
}

async fn handle_stats(
    State(orchestrator): State<Arc<Orchestrator>>,
) -> Result<impl IntoResponse, ControlError> {
    Ok(Json(orchestrator.stats().await?))
}

async fn handle_connect(
    State(orchestrator): State<Arc<Orchestrator>>,
    Json(request): Json<ConnectRequest>,
) -> Result<impl IntoResponse, ControlError> {
    debug!(account_id = %request.id, "connect requested");
    let account = orchestrator
        .connect(&request.id, request.target_subreddits)
        .await?;
    Ok((StatusCode::CREATED, Json(account)))
}

async fn handle_report(
    State(orchestrator): State<Arc<Orchestrator>>,
    Path(id): Path<String>,
) -> Result<impl IntoResponse, ControlError> {
    Ok(Json(orchestrator.report(&id).await?))
}

async fn handle_start(
    State(orchestrator): State<Arc<Orchestrator>>,
    Path(id): Path<String>,
) -> Result<impl IntoResponse, ControlError> {
    Ok(Json(orchestrator.start(&id).await?))
}

async fn handle_pause(
    State(orchestrator): State<Arc<Orchestrator>>,
    Path(id): Path<String>,
) -> Result<impl IntoResponse, ControlError> {
    Ok(Json(orchestrator.pause(&id).await?))
}

async fn handle_resume(
    State(orchestrator): State<Arc<Orchestrator>>,
    Path(id): Path<String>,
) -> Result<impl IntoResponse, ControlError> {
    Ok(Json(orchestrator.resume(&id).await?))
}

async fn handle_stop(
    State(orchestrator): State<Arc<Orchestrator>>,
    Path(id): Path<String>,
) -> Result<impl IntoResponse, ControlError> {
    Ok(Json(orchestrator.stop(&id).await?))
}

async fn handle_karma(
    State(orchestrator): State<Arc<Orchestrator>>,
    Path(id): Path<String>,
    Json(request): Json<KarmaRequest>,
) -> Result<impl IntoResponse, ControlError> {
    Ok(Json(orchestrator.record_karma(&id, request.karma).await?))
}
