//! Shared daemon state

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::sync::watch;

use strata_core::config::StrataConfig;
use strata_core::embeddings::EmbeddingProvider;
use strata_core::ops::OperationTracker;
use strata_core::pipeline::ExtractionPipeline;
use strata_core::queue::JobQueue;
use strata_core::storage::{CatalogBackend, VectorBackend};
use strata_core::telemetry::{
    probe_gpu, GpuTelemetry, StorageSizes, SystemProbe, TelemetrySnapshot,
};
use strata_core::CorrelationEngine;

/// Everything the control plane, runner and watcher share
pub struct AppState {
    pub config: StrataConfig,
    pub catalog: Arc<dyn CatalogBackend>,
    pub vectors: Arc<dyn VectorBackend>,
    pub embedder: Arc<dyn EmbeddingProvider>,
    pub queue: Arc<JobQueue>,
    pub tracker: Arc<OperationTracker>,
    pub pipeline: Arc<ExtractionPipeline>,
    pub engine: Arc<CorrelationEngine>,
    pub started_at: chrono::DateTime<chrono::Utc>,
    ready: AtomicBool,
    shutting_down: AtomicBool,
    shutdown_tx: watch::Sender<bool>,
    probe: parking_lot::Mutex<SystemProbe>,
}

impl AppState {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        config: StrataConfig,
        catalog: Arc<dyn CatalogBackend>,
        vectors: Arc<dyn VectorBackend>,
        embedder: Arc<dyn EmbeddingProvider>,
        queue: Arc<JobQueue>,
        tracker: Arc<OperationTracker>,
        pipeline: Arc<ExtractionPipeline>,
        engine: Arc<CorrelationEngine>,
    ) -> Self {
        let (shutdown_tx, _) = watch::channel(false);
        Self {
            config,
            catalog,
            vectors,
            embedder,
            queue,
            tracker,
            pipeline,
            engine,
            started_at: chrono::Utc::now(),
            ready: AtomicBool::new(false),
            shutting_down: AtomicBool::new(false),
            shutdown_tx,
            probe: parking_lot::Mutex::new(SystemProbe::new()),
        }
    }

    /// Mark startup complete; `/readiness` flips to ready
    pub fn mark_ready(&self) {
        self.ready.store(true, Ordering::SeqCst);
    }

    pub fn is_ready(&self) -> bool {
        self.ready.load(Ordering::SeqCst)
    }

    /// Begin graceful shutdown; idempotent
    pub fn request_shutdown(&self) {
        self.shutting_down.store(true, Ordering::SeqCst);
        let _ = self.shutdown_tx.send(true);
    }

    pub fn is_shutting_down(&self) -> bool {
        self.shutting_down.load(Ordering::SeqCst)
    }

    /// Subscribe to the shutdown signal
    pub fn shutdown_signal(&self) -> watch::Receiver<bool> {
        self.shutdown_tx.subscribe()
    }

    /// Assemble the full telemetry rollup
    pub async fn telemetry(&self) -> strata_core::Result<TelemetrySnapshot> {
        let catalog = self.catalog.get_stats().await?;
        let queue = self.queue.stats().await?;
        let gpu: GpuTelemetry = probe_gpu().await;
        let (cpu_percent, memory_bytes) = self.probe.lock().sample();
        let storage = StorageSizes::measure(
            &self.config.catalog_path(),
            &self.config.vector_db_path(),
            &self.config.jobs_path(),
        );

        Ok(TelemetrySnapshot {
            cpu_percent,
            memory_bytes,
            gpu,
            catalog,
            queue,
            operation: self.tracker.snapshot(),
            storage,
        })
    }
}
