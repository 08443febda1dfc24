//! Control plane tests — in-process request dispatch via
//! `tower::ServiceExt::oneshot`

use axum::body::Body;
use axum::http::{Request, StatusCode};
use axum::Router;
use chrono::Utc;
use http_body_util::BodyExt;
use std::sync::Arc;
use tempfile::TempDir;
use tower::ServiceExt;

use strata_core::config::StrataConfig;
use strata_core::embeddings::{EmbeddingProvider, HashEmbedder};
use strata_core::extract::{ExtractorRegistry, RegexRecognizer};
use strata_core::ops::OperationTracker;
use strata_core::pattern::{Discovery, DiscoveryStatus, Evidence, Pattern};
use strata_core::pipeline::ExtractionPipeline;
use strata_core::queue::JobQueue;
use strata_core::storage::{CatalogBackend, JobStore, VectorBackend};
use strata_core::types::{FileRecord, FileStatus};
use strata_core::CorrelationEngine;
use strata_daemon::http::build_router;
use strata_daemon::state::AppState;
use strata_storage::{CatalogStore, RedbJobStore, VectorStore};

const DIM: usize = 64;

struct Harness {
    app: Router,
    state: Arc<AppState>,
    _dir: TempDir,
}

async fn harness() -> Harness {
    let dir = TempDir::new().expect("tempdir");
    let config = StrataConfig {
        state_dir: dir.path().to_path_buf(),
        ..StrataConfig::default()
    };

    let catalog = CatalogStore::open_in_memory().await.expect("catalog");
    catalog.initialize_schema().await.expect("schema");
    let catalog: Arc<dyn CatalogBackend> = Arc::new(catalog);
    let vectors: Arc<dyn VectorBackend> =
        Arc::new(VectorStore::open_in_memory(DIM).await.expect("vectors"));
    let jobs: Arc<dyn JobStore> =
        Arc::new(RedbJobStore::open(&dir.path().join("jobs.redb")).expect("jobs"));
    let embedder: Arc<dyn EmbeddingProvider> = Arc::new(HashEmbedder::new(DIM));
    let queue = Arc::new(JobQueue::new(jobs, 3));
    let tracker = Arc::new(OperationTracker::new());

    let pipeline = Arc::new(ExtractionPipeline::new(
        ExtractorRegistry::with_builtins(),
        Arc::new(RegexRecognizer::new()),
        Arc::clone(&embedder),
        Arc::clone(&catalog),
        Arc::clone(&vectors),
        strata_core::config::ExtractionConfig {
            embedding_dimension: DIM,
            ..Default::default()
        },
    ));
    let engine = Arc::new(CorrelationEngine::new(
        Arc::clone(&catalog),
        config.correlation.clone(),
        Arc::clone(&tracker),
    ));

    let state = Arc::new(AppState::new(
        config, catalog, vectors, embedder, queue, tracker, pipeline, engine,
    ));
    state.mark_ready();

    Harness {
        app: build_router(Arc::clone(&state)),
        state,
        _dir: dir,
    }
}

async fn get(app: &Router, path: &str) -> (StatusCode, serde_json::Value) {
    let response = app
        .clone()
        .oneshot(
            Request::builder()
                .method("GET")
                .uri(path)
                .body(Body::empty())
                .expect("request"),
        )
        .await
        .expect("dispatch");
    let status = response.status();
    let bytes = response.into_body().collect().await.expect("body").to_bytes();
    let value = if bytes.is_empty() {
        serde_json::Value::Null
    } else {
        serde_json::from_slice(&bytes).unwrap_or(serde_json::Value::Null)
    };
    (status, value)
}

async fn post(app: &Router, path: &str, body: &str) -> (StatusCode, serde_json::Value) {
    let response = app
        .clone()
        .oneshot(
            Request::builder()
                .method("POST")
                .uri(path)
                .header("Content-Type", "application/json")
                .body(Body::from(body.to_string()))
                .expect("request"),
        )
        .await
        .expect("dispatch");
    let status = response.status();
    let bytes = response.into_body().collect().await.expect("body").to_bytes();
    let value = if bytes.is_empty() {
        serde_json::Value::Null
    } else {
        serde_json::from_slice(&bytes).unwrap_or(serde_json::Value::Null)
    };
    (status, value)
}

#[tokio::test]
async fn health_reports_version() {
    let h = harness().await;
    let (status, body) = get(&h.app, "/api/v1/health").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "healthy");
    assert!(body["version"].is_string());
}

#[tokio::test]
async fn readiness_tracks_startup() {
    let h = harness().await;
    let (status, body) = get(&h.app, "/api/v1/readiness").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["ready"], true);
}

#[tokio::test]
async fn status_rolls_up_catalog_and_queue() {
    let h = harness().await;
    let (status, body) = get(&h.app, "/api/v1/status").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["catalog"]["files_total"], 0);
    assert_eq!(body["queue"]["pending"], 0);
    assert!(body["operation"].is_null());
}

#[tokio::test]
async fn telemetry_reports_gpu_as_unavailable_without_probe() {
    let h = harness().await;
    let (status, body) = get(&h.app, "/api/v1/telemetry").await;
    assert_eq!(status, StatusCode::OK);
    // Either the probe tool exists or the field reports unavailable; the
    // shape is stable in both cases
    assert!(body["gpu"]["available"].is_boolean());
    assert!(body["storage"]["jobs_bytes"].is_u64());
}

#[tokio::test]
async fn excavate_enqueues_a_batch_job() {
    let h = harness().await;
    let (status, body) = post(&h.app, "/api/v1/excavate", r#"{"root": "/tmp/notes"}"#).await;
    assert_eq!(status, StatusCode::OK);
    assert!(body["job_id"].is_string());

    let (_, jobs) = get(&h.app, "/api/v1/jobs").await;
    assert_eq!(jobs["pending"].as_array().map(Vec::len), Some(1));
    assert!(jobs["current"].is_null());
}

#[tokio::test]
async fn correlate_async_enqueues_and_recent_limit_is_respected() {
    let h = harness().await;
    let (status, _) = post(&h.app, "/api/v1/correlate", "").await;
    assert_eq!(status, StatusCode::OK);

    let (status, body) = get(&h.app, "/api/v1/jobs/recent?limit=5").await;
    assert_eq!(status, StatusCode::OK);
    assert!(body["recent"].as_array().is_some());
}

#[tokio::test]
async fn empty_query_is_rejected() {
    let h = harness().await;
    let (status, _) = get(&h.app, "/api/v1/query?q=").await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn unknown_file_is_a_404() {
    let h = harness().await;
    let (status, _) = get(&h.app, "/api/v1/file/nope").await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn feedback_confirms_and_rejects_unknown_actions() {
    let h = harness().await;
    let now = Utc::now();
    let pattern = Pattern::Workflow {
        id: uuid::Uuid::new_v4(),
        label: "dated report.md series".to_string(),
        evidence: Evidence {
            count: 4,
            source_files: vec!["f1".to_string(), "f2".to_string()],
            first_seen: now,
            last_seen: now,
            confidence: 0.9,
        },
    };
    let discovery = Discovery::from_pattern(&pattern, now);
    h.state
        .catalog
        .upsert_discovery(&discovery)
        .await
        .expect("seed");

    let path = format!("/api/v1/discoveries/{}/feedback", discovery.discovery_id);
    let (status, body) = post(&h.app, &path, r#"{"action": "confirm", "notes": "real"}"#).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["discovery"]["status"], "confirmed");
    assert_eq!(body["discovery"]["notes"], "real");

    let (status, _) = post(&h.app, &path, r#"{"action": "promote"}"#).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let missing = format!("/api/v1/discoveries/{}/feedback", uuid::Uuid::new_v4());
    let (status, _) = post(&h.app, &missing, r#"{"action": "dismiss"}"#).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn correlation_surfaces_a_workflow_discovery_from_dated_series() {
    let h = harness().await;

    // Four monthly reports, all indexed
    for month in 1..=4 {
        let path = format!("/notes/2024-0{month}-05-report.md");
        let mut record = FileRecord::new(std::path::Path::new(&path), 512, Utc::now());
        record.status = FileStatus::Indexed;
        h.state.catalog.upsert_file(&record).await.expect("seed");
    }

    let (status, body) = post(&h.app, "/api/v1/correlate/run", "").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["report"]["discoveries_created"], 1);

    let (_, discoveries) = get(&h.app, "/api/v1/discoveries").await;
    let list = discoveries["discoveries"].as_array().expect("array");
    assert_eq!(list.len(), 1);
    let discovery = &list[0];
    assert_eq!(discovery["kind"], "workflow");
    assert!(discovery["confidence"].as_f64().expect("confidence") >= 0.7);
    assert_eq!(
        discovery["source_files"].as_array().map(Vec::len),
        Some(4),
        "workflow discoveries always carry their source files"
    );
}

#[tokio::test]
async fn confirmed_discoveries_survive_demoting_reruns() {
    let h = harness().await;

    for month in 1..=4 {
        let path = format!("/notes/2024-0{month}-05-report.md");
        let mut record = FileRecord::new(std::path::Path::new(&path), 512, Utc::now());
        record.status = FileStatus::Indexed;
        h.state.catalog.upsert_file(&record).await.expect("seed");
    }
    let (_, body) = post(&h.app, "/api/v1/correlate/run", "").await;
    assert_eq!(body["report"]["discoveries_created"], 1);

    let (_, discoveries) = get(&h.app, "/api/v1/discoveries").await;
    let id = discoveries["discoveries"][0]["discovery_id"]
        .as_str()
        .expect("id")
        .to_string();
    let path = format!("/api/v1/discoveries/{id}/feedback");
    post(&h.app, &path, r#"{"action": "confirm"}"#).await;

    // Remove the series so the pattern no longer qualifies, then re-run
    for month in 1..=4 {
        let file_path = format!("/notes/2024-0{month}-05-report.md");
        let record = h
            .state
            .catalog
            .get_file_by_path(&file_path)
            .await
            .expect("get")
            .expect("exists");
        h.state
            .catalog
            .set_file_status(&record.file_id, FileStatus::Skipped, None)
            .await
            .expect("skip");
    }
    post(&h.app, "/api/v1/correlate/run", "").await;

    let (_, discoveries) = get(&h.app, "/api/v1/discoveries").await;
    let confirmed = discoveries["discoveries"]
        .as_array()
        .expect("array")
        .iter()
        .find(|d| d["discovery_id"] == id.as_str())
        .expect("still present")
        .clone();
    assert_eq!(confirmed["status"], "confirmed");
}

#[tokio::test]
async fn shutdown_drains_with_503_while_health_stays_up() {
    let h = harness().await;
    let (status, body) = post(&h.app, "/api/v1/shutdown", "").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["shutting_down"], true);

    let (status, _) = get(&h.app, "/api/v1/status").await;
    assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);

    let (status, _) = get(&h.app, "/api/v1/health").await;
    assert_eq!(status, StatusCode::OK);
}
