//! HTTP control plane
//!
//! JSON over TCP under `/api/v1`. Handlers only read shared state or
//! enqueue work; nothing here blocks the runtime, which is what keeps
//! `/health` under its latency budget while correlation runs on the
//! blocking pool.

use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{middleware, Json, Router};
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::sync::Arc;
use uuid::Uuid;

use strata_core::error::Error;
use strata_core::job::{JobPayload, JobPriority};
use strata_core::pattern::DiscoveryStatus;

use crate::state::AppState;

/// Build the full router
pub fn build_router(state: Arc<AppState>) -> Router {
    let api = Router::new()
        .route("/health", get(health))
        .route("/readiness", get(readiness))
        .route("/status", get(status))
        .route("/telemetry", get(telemetry))
        .route("/query", get(query))
        .route("/file/{id}", get(file_detail))
        .route("/entities", get(entities))
        .route("/patterns", get(patterns))
        .route("/discoveries", get(discoveries))
        .route("/discoveries/{id}/feedback", post(discovery_feedback))
        .route("/excavate", post(excavate))
        .route("/correlate", post(correlate_async))
        .route("/correlate/run", post(correlate_sync))
        .route("/jobs", get(jobs))
        .route("/jobs/current", get(jobs_current))
        .route("/jobs/recent", get(jobs_recent))
        .route("/shutdown", post(shutdown))
        .layer(middleware::from_fn_with_state(
            Arc::clone(&state),
            refuse_during_shutdown,
        ))
        .with_state(state);

    Router::new().nest("/api/v1", api)
}

/// Everything except health answers 503 while the daemon drains
async fn refuse_during_shutdown(
    State(state): State<Arc<AppState>>,
    request: axum::extract::Request,
    next: middleware::Next,
) -> Response {
    if state.is_shutting_down() && !request.uri().path().ends_with("/health") {
        return (
            StatusCode::SERVICE_UNAVAILABLE,
            Json(json!({"error": "shutting down"})),
        )
            .into_response();
    }
    next.run(request).await
}

/// Error envelope for the JSON API
struct ApiError(Error);

impl From<Error> for ApiError {
    fn from(e: Error) -> Self {
        Self(e)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = match &self.0 {
            Error::NotFound(_) => StatusCode::NOT_FOUND,
            Error::InvalidInput(_) => StatusCode::BAD_REQUEST,
            Error::InvalidState(_) => StatusCode::CONFLICT,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        };
        (status, Json(json!({"error": self.0.to_string()}))).into_response()
    }
}

type ApiResult<T> = std::result::Result<T, ApiError>;

async fn health() -> Json<serde_json::Value> {
    Json(json!({
        "status": "healthy",
        "version": env!("CARGO_PKG_VERSION"),
    }))
}

async fn readiness(State(state): State<Arc<AppState>>) -> Json<serde_json::Value> {
    if state.is_ready() {
        Json(json!({"ready": true}))
    } else {
        Json(json!({"ready": false, "reason": "startup_in_progress"}))
    }
}

async fn status(State(state): State<Arc<AppState>>) -> ApiResult<Json<serde_json::Value>> {
    let catalog = state.catalog.get_stats().await?;
    let queue = state.queue.stats().await?;
    let uptime = (chrono::Utc::now() - state.started_at).num_seconds();
    Ok(Json(json!({
        "catalog": catalog,
        "queue": queue,
        "operation": state.tracker.snapshot(),
        "uptime_secs": uptime,
    })))
}

async fn telemetry(State(state): State<Arc<AppState>>) -> ApiResult<Json<serde_json::Value>> {
    let snapshot = state.telemetry().await?;
    Ok(Json(serde_json::to_value(snapshot).map_err(Error::from)?))
}

#[derive(Deserialize)]
struct QueryParams {
    q: String,
    #[serde(default = "default_k")]
    k: usize,
}

fn default_k() -> usize {
    10
}

#[derive(Serialize)]
struct QueryHit {
    chunk_id: Uuid,
    file_id: String,
    score: f32,
    preview: String,
}

async fn query(
    State(state): State<Arc<AppState>>,
    Query(params): Query<QueryParams>,
) -> ApiResult<Json<Vec<QueryHit>>> {
    if params.q.trim().is_empty() {
        return Err(Error::InvalidInput("empty query".to_string()).into());
    }
    let vector = state
        .embedder
        .embed_text(&params.q)
        .await
        .map_err(|e| Error::ExternalUnavailable(format!("embedding provider: {e}")))?;
    let hits = state
        .vectors
        .query_by_vector(&vector, params.k.clamp(1, 100))
        .await?;

    let mut out = Vec::with_capacity(hits.len());
    for hit in hits {
        let Some(chunk) = state.catalog.get_chunk(hit.chunk_id).await? else {
            continue;
        };
        let preview: String = chunk.text.chars().take(240).collect();
        out.push(QueryHit {
            chunk_id: hit.chunk_id,
            file_id: chunk.file_id,
            score: hit.score,
            preview,
        });
    }
    Ok(Json(out))
}

async fn file_detail(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> ApiResult<Json<serde_json::Value>> {
    let file = state
        .catalog
        .get_file(&id)
        .await?
        .ok_or_else(|| Error::NotFound(format!("file {id}")))?;
    let chunks = state.catalog.iter_chunks(&id).await?;
    Ok(Json(json!({
        "file": file,
        "chunk_count": chunks.len(),
    })))
}

async fn entities(State(state): State<Arc<AppState>>) -> ApiResult<Json<serde_json::Value>> {
    let entities = state.catalog.iter_consolidated().await?;
    Ok(Json(json!({"entities": entities})))
}

async fn patterns(State(state): State<Arc<AppState>>) -> ApiResult<Json<serde_json::Value>> {
    let patterns = state.catalog.iter_patterns().await?;
    Ok(Json(json!({"patterns": patterns})))
}

async fn discoveries(State(state): State<Arc<AppState>>) -> ApiResult<Json<serde_json::Value>> {
    let discoveries = state.catalog.iter_discoveries().await?;
    Ok(Json(json!({"discoveries": discoveries})))
}

#[derive(Deserialize)]
struct FeedbackBody {
    action: String,
    notes: Option<String>,
}

async fn discovery_feedback(
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
    Json(body): Json<FeedbackBody>,
) -> ApiResult<Json<serde_json::Value>> {
    let status = match body.action.as_str() {
        "confirm" => DiscoveryStatus::Confirmed,
        "dismiss" => DiscoveryStatus::Dismissed,
        other => {
            return Err(
                Error::InvalidInput(format!("unknown feedback action '{other}'")).into(),
            )
        }
    };

    let mut discovery = state
        .catalog
        .get_discovery(id)
        .await?
        .ok_or_else(|| Error::NotFound(format!("discovery {id}")))?;
    discovery.status = status;
    if body.notes.is_some() {
        discovery.notes = body.notes;
    }
    discovery.updated_at = chrono::Utc::now();
    state.catalog.upsert_discovery(&discovery).await?;

    Ok(Json(json!({"discovery": discovery})))
}

#[derive(Deserialize, Default)]
struct ExcavateBody {
    root: Option<String>,
}

async fn excavate(
    State(state): State<Arc<AppState>>,
    body: Option<Json<ExcavateBody>>,
) -> ApiResult<Json<serde_json::Value>> {
    let root = body.and_then(|Json(b)| b.root);
    let job_id = state
        .queue
        .enqueue(JobPayload::BatchExtraction { root }, JobPriority::Normal)
        .await?;
    Ok(Json(json!({"job_id": job_id})))
}

async fn correlate_async(
    State(state): State<Arc<AppState>>,
) -> ApiResult<Json<serde_json::Value>> {
    let job_id = state
        .queue
        .enqueue(JobPayload::Correlation {}, JobPriority::Normal)
        .await?;
    Ok(Json(json!({"job_id": job_id})))
}

async fn correlate_sync(
    State(state): State<Arc<AppState>>,
) -> ApiResult<Json<serde_json::Value>> {
    let report = state.engine.run().await?;
    Ok(Json(json!({"report": report})))
}

async fn jobs(State(state): State<Arc<AppState>>) -> ApiResult<Json<serde_json::Value>> {
    let pending = state.queue.pending(100).await?;
    let current = state.queue.current().await?;
    let recent = state.queue.recent(20).await?;
    Ok(Json(json!({
        "pending": pending,
        "current": current,
        "recent": recent,
    })))
}

async fn jobs_current(State(state): State<Arc<AppState>>) -> ApiResult<Json<serde_json::Value>> {
    let current = state.queue.current().await?;
    Ok(Json(json!({
        "current": current,
        "operation": state.tracker.snapshot(),
    })))
}

#[derive(Deserialize)]
struct RecentParams {
    #[serde(default = "default_recent_limit")]
    limit: usize,
}

fn default_recent_limit() -> usize {
    20
}

async fn jobs_recent(
    State(state): State<Arc<AppState>>,
    Query(params): Query<RecentParams>,
) -> ApiResult<Json<serde_json::Value>> {
    let recent = state.queue.recent(params.limit.clamp(1, 256)).await?;
    Ok(Json(json!({"recent": recent})))
}

async fn shutdown(State(state): State<Arc<AppState>>) -> Json<serde_json::Value> {
    state.request_shutdown();
    Json(json!({"shutting_down": true}))
}
