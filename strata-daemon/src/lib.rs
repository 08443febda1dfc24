//! # strata-daemon
//!
//! The long-running strata process: opens the stores under the instance
//! lock, recovers the queue, reconciles the vector store, then serves the
//! HTTP control plane while the watcher and the job runner do the work.

pub mod http;
pub mod runner;
pub mod scan;
pub mod state;
pub mod watcher;

use fs2::FileExt;
use std::fs::File;
use std::sync::Arc;
use tokio::net::TcpListener;
use tracing::{info, warn};

use strata_core::config::StrataConfig;
use strata_core::embeddings::{EmbeddingProvider, HashEmbedder};
use strata_core::error::{Error, Result};
use strata_core::extract::{ExtractorRegistry, RegexRecognizer};
use strata_core::ops::OperationTracker;
use strata_core::pipeline::ExtractionPipeline;
use strata_core::queue::JobQueue;
use strata_core::storage::{CatalogBackend, JobStore, VectorBackend};
use strata_core::CorrelationEngine;
use strata_storage::{reconcile, CatalogStore, RedbJobStore, VectorStore};

use crate::state::AppState;

/// A fully constructed daemon, ready to run
pub struct Daemon {
    state: Arc<AppState>,
    /// Advisory lock held for the process lifetime; a second instance
    /// opening the same state directory is refused before any store opens
    _lock: File,
}

impl Daemon {
    /// Open the stores and wire the engine together
    ///
    /// # Errors
    ///
    /// Returns [`Error::Fatal`] when the lock is held by another instance
    /// or any store refuses to open; the daemon must not start.
    pub async fn build(config: StrataConfig) -> Result<Self> {
        std::fs::create_dir_all(&config.state_dir)
            .map_err(|e| Error::Fatal(format!("create state dir: {e}")))?;

        let lock = File::create(config.lock_path())
            .map_err(|e| Error::Fatal(format!("open lock file: {e}")))?;
        lock.try_lock_exclusive().map_err(|_| {
            Error::Fatal(format!(
                "another daemon instance holds {}",
                config.lock_path().display()
            ))
        })?;

        let catalog = CatalogStore::open(&config.catalog_path()).await?;
        catalog.initialize_schema().await?;
        let catalog: Arc<dyn CatalogBackend> = Arc::new(catalog);

        let vectors: Arc<dyn VectorBackend> = Arc::new(
            VectorStore::open(
                &config.vector_db_path(),
                config.extraction.embedding_dimension,
            )
            .await?,
        );

        let jobs: Arc<dyn JobStore> = Arc::new(RedbJobStore::open(&config.jobs_path())?);
        let queue = Arc::new(JobQueue::new(jobs, config.queue.max_attempts));
        let recovered = queue.recover_on_startup().await?;
        if recovered > 0 {
            info!(recovered, "Interrupted jobs re-queued");
        }

        let embedder: Arc<dyn EmbeddingProvider> =
            Arc::new(HashEmbedder::new(config.extraction.embedding_dimension));
        let report = reconcile(&catalog, &vectors, &embedder).await?;
        if report.reembedded > 0 || report.orphans_removed > 0 {
            info!(
                reembedded = report.reembedded,
                orphans_removed = report.orphans_removed,
                "Startup reconciliation applied"
            );
        }

        let tracker = Arc::new(OperationTracker::new());
        let pipeline = Arc::new(ExtractionPipeline::new(
            ExtractorRegistry::with_builtins(),
            Arc::new(RegexRecognizer::new()),
            Arc::clone(&embedder),
            Arc::clone(&catalog),
            Arc::clone(&vectors),
            config.extraction.clone(),
        ));
        let engine = Arc::new(CorrelationEngine::new(
            Arc::clone(&catalog),
            config.correlation.clone(),
            Arc::clone(&tracker),
        ));

        let state = Arc::new(AppState::new(
            config, catalog, vectors, embedder, queue, tracker, pipeline, engine,
        ));

        Ok(Self { state, _lock: lock })
    }

    /// Shared state, exposed for tests
    pub fn state(&self) -> Arc<AppState> {
        Arc::clone(&self.state)
    }

    /// Run until shutdown: watcher, job runner and control plane
    ///
    /// # Errors
    ///
    /// Returns [`Error::Fatal`] if the control plane cannot bind.
    pub async fn run(self) -> Result<()> {
        let state = self.state;

        // The watcher is optional capacity: a backend that cannot start
        // leaves batch discovery as the ingestion path
        let file_watcher =
            match watcher::FileWatcher::spawn(Arc::clone(&state), state.shutdown_signal()) {
                Ok(file_watcher) => Some(file_watcher),
                Err(e) => {
                    warn!(error = %e, "File watcher unavailable, continuing without it");
                    None
                }
            };

        let consumer = tokio::spawn(runner::run_consumer(
            Arc::clone(&state),
            state.shutdown_signal(),
        ));

        // Ctrl-C folds into the same graceful path as POST /shutdown
        {
            let state = Arc::clone(&state);
            tokio::spawn(async move {
                if tokio::signal::ctrl_c().await.is_ok() {
                    info!("Interrupt received, shutting down");
                    state.request_shutdown();
                }
            });
        }

        let address = format!("{}:{}", state.config.http.bind, state.config.http.port);
        let listener = TcpListener::bind(&address)
            .await
            .map_err(|e| Error::Fatal(format!("bind control plane {address}: {e}")))?;
        info!(address = %address, "Control plane listening");

        state.mark_ready();

        let mut shutdown = state.shutdown_signal();
        axum::serve(listener, http::build_router(Arc::clone(&state)))
            .with_graceful_shutdown(async move {
                let _ = shutdown.changed().await;
            })
            .await
            .map_err(|e| Error::Fatal(format!("control plane failed: {e}")))?;

        // The serve future only ends on shutdown; drain the workers
        let _ = consumer.await;
        if let Some(file_watcher) = file_watcher {
            file_watcher.join().await;
        }

        info!("Daemon stopped");
        Ok(())
    }
}

/// Load configuration for a daemon invocation
///
/// # Errors
///
/// Returns [`Error::Fatal`] for an unreadable or unparsable config file.
pub fn load_config(state_dir: Option<std::path::PathBuf>) -> Result<StrataConfig> {
    let state_dir = state_dir.unwrap_or_else(|| {
        dirs::home_dir()
            .unwrap_or_else(|| std::path::PathBuf::from("."))
            .join(".strata")
    });
    StrataConfig::load_or_default(&state_dir)
}
