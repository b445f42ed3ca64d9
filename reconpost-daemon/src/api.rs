//! HTTP API for the scan orchestrator.
//!
//! | Method | Path | Response |
//! |--------|------|----------|
//! | `GET` | `/api/osint/modules` | `{modules: ModuleDescriptor[]}` |
//! | `POST` | `/api/osint/scan` | `Job` |
//! | `GET` | `/api/osint/scan/{id}` | `Job` snapshot |
//! | `DELETE` | `/api/osint/scan/{id}` | `204 No Content` |
//! | `GET` | `/api/osint/scan/{id}/graph` | `{nodes, edges}` |
//! | `GET` | `/api/health` | `DaemonHealth` |
//!
//! Errors render as `{"error": {"message", "status"}}`.

use std::fmt;
use std::time::Instant;

use axum::extract::rejection::JsonRejection;
use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use serde::Serialize;
use serde_json::json;
use tower_http::trace::{DefaultMakeSpan, DefaultOnResponse, TraceLayer};
use tracing::Level;

use reconpost_core::error::{JobError, ValidationError};
use reconpost_core::{Job, ModuleDescriptor};
use reconpost_engine::{JobGraph, ScanOrchestrator, ScanRequest};

use crate::health::{self, DaemonHealth};

/// Shared handler state.
#[derive(Clone)]
pub struct AppState {
    pub orchestrator: ScanOrchestrator,
    pub started: Instant,
}

impl AppState {
    pub fn new(orchestrator: ScanOrchestrator) -> Self {
        Self {
            orchestrator,
            started: Instant::now(),
        }
    }
}

/// Build the API router.
pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/api/osint/modules", get(list_modules))
        .route("/api/osint/scan", post(create_scan))
        .route("/api/osint/scan/{id}", get(get_scan).delete(cancel_scan))
        .route("/api/osint/scan/{id}/graph", get(get_graph))
        .route("/api/health", get(health))
        .fallback(fallback)
        .layer(
            TraceLayer::new_for_http()
                .make_span_with(DefaultMakeSpan::new().level(Level::INFO))
                .on_response(DefaultOnResponse::new().level(Level::INFO)),
        )
        .with_state(state)
}

// ─── Errors ──────────────────────────────────────────────────────────

/// API error rendered as a JSON envelope.
#[derive(Debug)]
pub struct ApiError {
    pub status: StatusCode,
    pub message: String,
}

impl ApiError {
    pub fn new(status: StatusCode, message: impl Into<String>) -> Self {
        Self {
            status,
            message: message.into(),
        }
    }

    pub fn bad_request(message: impl Into<String>) -> Self {
        Self::new(StatusCode::BAD_REQUEST, message)
    }

    pub fn not_found(message: impl Into<String>) -> Self {
        Self::new(StatusCode::NOT_FOUND, message)
    }

    pub fn internal(message: impl Into<String>) -> Self {
        Self::new(StatusCode::INTERNAL_SERVER_ERROR, message)
    }
}

impl fmt::Display for ApiError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.message)
    }
}

impl std::error::Error for ApiError {}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        if self.status.is_server_error() {
            tracing::error!(status = self.status.as_u16(), error = %self.message, "request failed");
        }
        let body = Json(json!({
            "error": {
                "message": self.message,
                "status": self.status.as_u16(),
            }
        }));
        (self.status, body).into_response()
    }
}

impl From<ValidationError> for ApiError {
    fn from(err: ValidationError) -> Self {
        Self::bad_request(err.to_string())
    }
}

impl From<JobError> for ApiError {
    fn from(err: JobError) -> Self {
        match err {
            JobError::NotFound { .. } => Self::not_found(err.to_string()),
        }
    }
}

impl From<JsonRejection> for ApiError {
    fn from(err: JsonRejection) -> Self {
        Self::bad_request(err.body_text())
    }
}

// ─── Handlers ────────────────────────────────────────────────────────

#[derive(Debug, Serialize)]
struct ModulesResponse {
    modules: Vec<ModuleDescriptor>,
}

async fn list_modules(State(state): State<AppState>) -> Json<ModulesResponse> {
    Json(ModulesResponse {
        modules: state.orchestrator.list_modules(),
    })
}

async fn create_scan(
    State(state): State<AppState>,
    payload: Result<Json<ScanRequest>, JsonRejection>,
) -> Result<Json<Job>, ApiError> {
    let Json(request) = payload?;
    let job = state.orchestrator.create_scan(request)?;
    Ok(Json(job))
}

async fn get_scan(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<Job>, ApiError> {
    Ok(Json(state.orchestrator.get_scan(&id)?))
}

async fn cancel_scan(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<StatusCode, ApiError> {
    state.orchestrator.cancel_scan(&id)?;
    Ok(StatusCode::NO_CONTENT)
}

async fn get_graph(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<JobGraph>, ApiError> {
    Ok(Json(state.orchestrator.get_graph(&id)?))
}

async fn health(State(state): State<AppState>) -> Json<DaemonHealth> {
    Json(health::report(&state.orchestrator, state.started))
}

async fn fallback() -> ApiError {
    ApiError::not_found("no such endpoint")
}
