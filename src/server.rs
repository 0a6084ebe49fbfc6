//! HTTP request layer.
//!
//! Exposes the engine over a JSON API:
//!
//! | Method | Path | Description |
//! |--------|------|-------------|
//! | `POST` | `/ingest` | Load, chunk, and synchronize documents |
//! | `POST` | `/query` | Answer a question from the indexed corpus |
//! | `GET`  | `/status` | Document count and readiness |
//! | `POST` | `/reset` | Delete and recreate the persisted store |
//! | `GET`  | `/health` | Liveness check (returns version) |
//!
//! # Error Contract
//!
//! All error responses use the shape:
//!
//! ```json
//! { "error": { "code": "bad_request", "message": "query must not be empty" } }
//! ```
//!
//! Error codes: `bad_request` (400), `store_unavailable` (503),
//! `generation_failed` (502), `internal` (500). An empty store or an
//! empty search result is a 200 with a sentinel answer, not an error.
//!
//! # CORS
//!
//! All origins, methods, and headers are permitted to support
//! browser-based clients.

use std::path::PathBuf;
use std::sync::Arc;

use axum::{
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use tower_http::cors::{Any, CorsLayer};
use tracing::error;

use crate::context::EngineContext;
use crate::error::EngineError;
use crate::ingest::run_ingest;
use crate::retrieval;

/// Shared application state passed to all route handlers.
#[derive(Clone)]
struct AppState {
    ctx: Arc<EngineContext>,
}

/// Start the HTTP server on the configured bind address. Runs until the
/// process is terminated.
pub async fn run_server(ctx: Arc<EngineContext>) -> anyhow::Result<()> {
    let bind_addr = ctx.config.server.bind.clone();
    let state = AppState { ctx };

    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    let app = Router::new()
        .route("/ingest", post(handle_ingest))
        .route("/query", post(handle_query))
        .route("/status", get(handle_status))
        .route("/reset", post(handle_reset))
        .route("/health", get(handle_health))
        .layer(cors)
        .with_state(state);

    println!("ragmill server listening on http://{}", bind_addr);

    let listener = tokio::net::TcpListener::bind(&bind_addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}

// ============ Error response ============

#[derive(Serialize)]
struct ErrorBody {
    error: ErrorDetail,
}

#[derive(Serialize)]
struct ErrorDetail {
    code: String,
    message: String,
}

/// Internal error type that converts into an HTTP response.
struct AppError {
    status: StatusCode,
    code: &'static str,
    message: String,
}

impl AppError {
    fn bad_request(message: impl Into<String>) -> Self {
        Self {
            status: StatusCode::BAD_REQUEST,
            code: "bad_request",
            message: message.into(),
        }
    }
}

impl From<EngineError> for AppError {
    fn from(err: EngineError) -> Self {
        let (status, code) = match &err {
            EngineError::InvalidChunkConfig { .. } | EngineError::Load { .. } => {
                (StatusCode::BAD_REQUEST, "bad_request")
            }
            EngineError::StoreUnavailable => (StatusCode::SERVICE_UNAVAILABLE, "store_unavailable"),
            EngineError::Generation(_) => (StatusCode::BAD_GATEWAY, "generation_failed"),
            EngineError::ConsistencyViolation { .. }
            | EngineError::StoreResetFailed { .. }
            | EngineError::Store(_) => (StatusCode::INTERNAL_SERVER_ERROR, "internal"),
        };
        if status.is_server_error() {
            error!(error = %err, "request failed");
        }
        Self {
            status,
            code,
            message: err.to_string(),
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let body = ErrorBody {
            error: ErrorDetail {
                code: self.code.to_string(),
                message: self.message,
            },
        };
        (self.status, Json(body)).into_response()
    }
}

// ============ Handlers ============

#[derive(Deserialize)]
struct IngestRequest {
    /// Optional file or directory; defaults to the configured data root.
    #[serde(default)]
    path: Option<PathBuf>,
}

#[derive(Serialize)]
struct IngestResponse {
    documents: usize,
    fragments: usize,
    added: usize,
    skipped: usize,
    total: u64,
}

async fn handle_ingest(
    State(state): State<AppState>,
    Json(req): Json<IngestRequest>,
) -> Result<Json<IngestResponse>, AppError> {
    let report = run_ingest(&state.ctx, req.path.as_deref(), false).await?;
    let outcome = report.outcome.ok_or_else(|| AppError {
        status: StatusCode::INTERNAL_SERVER_ERROR,
        code: "internal",
        message: "ingest produced no sync outcome".to_string(),
    })?;

    Ok(Json(IngestResponse {
        documents: report.documents,
        fragments: report.fragments,
        added: outcome.added,
        skipped: outcome.skipped,
        total: outcome.total,
    }))
}

#[derive(Deserialize)]
struct QueryRequest {
    query: String,
    #[serde(default)]
    top_k: Option<usize>,
}

#[derive(Serialize)]
struct QueryResponse {
    answer: String,
    sources: Vec<String>,
    query: String,
}

async fn handle_query(
    State(state): State<AppState>,
    Json(req): Json<QueryRequest>,
) -> Result<Json<QueryResponse>, AppError> {
    let query = req.query.trim();
    if query.is_empty() {
        return Err(AppError::bad_request("query must not be empty"));
    }

    let top_k = req.top_k.unwrap_or(state.ctx.config.retrieval.top_k);
    if top_k < 1 {
        return Err(AppError::bad_request("top_k must be >= 1"));
    }

    let store = state.ctx.lifecycle.current().await?;
    let result = retrieval::answer(
        query,
        top_k,
        state.ctx.config.retrieval.max_context_chars,
        store.as_ref(),
        state.ctx.generator.as_ref(),
    )
    .await?;

    Ok(Json(QueryResponse {
        answer: result.text,
        sources: result.sources,
        query: query.to_string(),
    }))
}

#[derive(Serialize)]
struct StatusResponse {
    documents: u64,
    ready: bool,
    model: String,
}

async fn handle_status(State(state): State<AppState>) -> Json<StatusResponse> {
    let (documents, ready) = match state.ctx.lifecycle.count().await {
        Ok(n) => (n, true),
        Err(_) => (0, false),
    };

    Json(StatusResponse {
        documents,
        ready,
        model: state.ctx.generator.model_name().to_string(),
    })
}

#[derive(Serialize)]
struct ResetResponse {
    success: bool,
}

async fn handle_reset(State(state): State<AppState>) -> Result<Json<ResetResponse>, AppError> {
    state.ctx.lifecycle.reset().await?;
    Ok(Json(ResetResponse { success: true }))
}

async fn handle_health() -> Json<serde_json::Value> {
    Json(serde_json::json!({
        "status": "ok",
        "version": env!("CARGO_PKG_VERSION"),
    }))
}
