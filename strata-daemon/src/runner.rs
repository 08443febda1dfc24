//! Job runner
//!
//! The single consumer loop: claim, dispatch, complete. One job is in
//! flight at any time, which is what serializes extraction against
//! correlation. On shutdown the current job gets the configured grace
//! period, then is marked cancelled.

use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tracing::{debug, info, warn};

use strata_core::error::{Error, Result};
use strata_core::job::{Job, JobOutcome, JobPayload};
use strata_core::ops::Operation;

use crate::scan;
use crate::state::AppState;

/// Idle poll interval when the queue is empty
const IDLE_WAIT: Duration = Duration::from_millis(500);

/// Run the consumer loop until shutdown
pub async fn run_consumer(state: Arc<AppState>, mut shutdown: watch::Receiver<bool>) {
    info!("Job runner started");

    loop {
        if *shutdown.borrow() {
            break;
        }

        let claimed = match state.queue.claim_next().await {
            Ok(claimed) => claimed,
            Err(e) => {
                warn!(error = %e, "Claim failed");
                state.queue.wait_for_work(IDLE_WAIT).await;
                continue;
            }
        };

        let Some(job) = claimed else {
            tokio::select! {
                _ = shutdown.changed() => break,
                () = state.queue.wait_for_work(IDLE_WAIT) => {}
            }
            continue;
        };

        execute_with_grace(&state, job, &mut shutdown).await;
    }

    info!("Job runner stopped");
}

/// Run one job, bounding it by the shutdown grace period once a shutdown
/// is requested
async fn execute_with_grace(
    state: &Arc<AppState>,
    job: Job,
    shutdown: &mut watch::Receiver<bool>,
) {
    let job_id = job.job_id;
    let grace = Duration::from_secs(state.config.shutdown_grace_secs);

    let work = dispatch(state, &job);
    tokio::pin!(work);

    let outcome = tokio::select! {
        result = &mut work => outcome_of(result),
        _ = shutdown.changed() => {
            // Shutdown requested mid-job: let it finish within the grace
            // window, then cancel
            match tokio::time::timeout(grace, &mut work).await {
                Ok(result) => outcome_of(result),
                Err(_) => {
                    warn!(job_id = %job_id, "Job exceeded shutdown grace, cancelling");
                    state.tracker.abort();
                    JobOutcome::Cancelled
                }
            }
        }
    };

    if let Err(e) = state.queue.complete(job_id, outcome).await {
        warn!(job_id = %job_id, error = %e, "Failed to complete job");
    }
}

fn outcome_of(result: Result<()>) -> JobOutcome {
    match result {
        Ok(()) => JobOutcome::Succeeded,
        Err(e) => JobOutcome::Failed(e.to_string()),
    }
}

/// Route a job to its subsystem
async fn dispatch(state: &Arc<AppState>, job: &Job) -> Result<()> {
    debug!(job_id = %job.job_id, job_type = job.job_type().as_str(), "Dispatching job");

    match &job.payload {
        JobPayload::FileExtraction { path } => {
            extract_one(state, path).await
        }
        JobPayload::FaeImport { path } => {
            // Export archives ride the ordinary pipeline; the registry
            // routes them to the conversation extractor
            extract_one(state, path).await
        }
        JobPayload::BatchExtraction { root } => {
            scan::excavate(state, root.as_deref()).await.map(|_| ())
        }
        JobPayload::Correlation {} => state.engine.run().await.map(|_| ()),
        JobPayload::Transcribe { path } => Err(Error::ExternalUnavailable(format!(
            "no transcription provider configured for {path}"
        ))),
        JobPayload::VisionAnalyze { path } => Err(Error::ExternalUnavailable(format!(
            "no vision provider configured for {path}"
        ))),
    }
}

async fn extract_one(state: &Arc<AppState>, path: &str) -> Result<()> {
    state.tracker.begin(Operation::Extraction {
        path: path.to_string(),
        started_at: chrono::Utc::now(),
        eta_seconds: state
            .tracker
            .eta_seconds(strata_core::OperationKind::Extraction),
    });

    let result = state
        .pipeline
        .extract_file(std::path::Path::new(path))
        .await;
    match &result {
        Ok(_) => state.tracker.finish(),
        Err(_) => state.tracker.abort(),
    }
    result.map(|_| ())
}
