//! # Job Queue
//!
//! Durable, ordered, typed work handoff between producers (watcher, control
//! plane, batch discovery) and the single consumer loop. Persistence lives
//! behind [`JobStore`]; this layer enforces the single-claim discipline,
//! the attempt ceiling, and startup recovery.

use std::sync::Arc;
use tokio::sync::{Mutex, Notify};
use tracing::{debug, info, instrument, warn};
use uuid::Uuid;

use crate::error::{Error, Result};
use crate::job::{Job, JobOutcome, JobPayload, JobPriority, JobStatus, QueueStats};
use crate::storage::JobStore;

/// The queue facade over a durable store
pub struct JobQueue {
    store: Arc<dyn JobStore>,
    /// Identifier of the single in-flight job
    running: Mutex<Option<Uuid>>,
    /// Wakes the consumer when work arrives
    work_available: Notify,
    max_attempts: u32,
}

impl JobQueue {
    pub fn new(store: Arc<dyn JobStore>, max_attempts: u32) -> Self {
        Self {
            store,
            running: Mutex::new(None),
            work_available: Notify::new(),
            max_attempts,
        }
    }

    /// Persist a job and wake the consumer; the job is durable before this
    /// returns
    ///
    /// # Errors
    ///
    /// Returns a storage error if the append fails; nothing is enqueued.
    #[instrument(skip(self, payload), fields(job_type = payload.job_type().as_str()))]
    pub async fn enqueue(&self, payload: JobPayload, priority: JobPriority) -> Result<Uuid> {
        let job = Job::new(payload, priority);
        let job_id = job.job_id;
        self.store.append(&job).await?;
        self.work_available.notify_one();
        debug!(job_id = %job_id, "Job enqueued");
        Ok(job_id)
    }

    /// Atomically claim the oldest pending job
    ///
    /// Returns `None` while another job is in flight, regardless of how
    /// many producers are enqueueing.
    pub async fn claim_next(&self) -> Result<Option<Job>> {
        let mut running = self.running.lock().await;
        if running.is_some() {
            return Ok(None);
        }
        let Some(mut job) = self.store.claim_oldest().await? else {
            return Ok(None);
        };
        // A recovered job was already charged its retry attempt while
        // pending; only a first claim starts the count
        if job.attempts == 0 {
            job.attempts = 1;
            self.store.update(&job).await?;
        }
        *running = Some(job.job_id);
        debug!(job_id = %job.job_id, attempts = job.attempts, "Job claimed");
        Ok(Some(job))
    }

    /// Mark the in-flight job terminal and append it to the recent ring
    ///
    /// # Errors
    ///
    /// Returns `InvalidState` when `job_id` is not the in-flight job.
    pub async fn complete(&self, job_id: Uuid, outcome: JobOutcome) -> Result<()> {
        let mut running = self.running.lock().await;
        if *running != Some(job_id) {
            return Err(Error::InvalidState(format!(
                "Job {job_id} is not the in-flight job"
            )));
        }

        let mut job = self
            .store
            .get(job_id)
            .await?
            .ok_or_else(|| Error::NotFound(format!("job {job_id}")))?;
        job.status = outcome.status();
        job.finished_at = Some(chrono::Utc::now());
        if let JobOutcome::Failed(error) = &outcome {
            job.last_error = Some(error.clone());
        }
        self.store.finalize(&job).await?;
        *running = None;

        match &outcome {
            JobOutcome::Succeeded => debug!(job_id = %job_id, "Job succeeded"),
            JobOutcome::Failed(error) => warn!(job_id = %job_id, error = %error, "Job failed"),
            JobOutcome::Cancelled => info!(job_id = %job_id, "Job cancelled"),
        }
        Ok(())
    }

    /// The in-flight job, if any
    pub async fn current(&self) -> Result<Option<Job>> {
        let running = self.running.lock().await;
        match *running {
            Some(job_id) => self.store.get(job_id).await,
            None => Ok(None),
        }
    }

    /// Terminal jobs from the bounded ring, most recent first
    pub async fn recent(&self, limit: usize) -> Result<Vec<Job>> {
        self.store.recent(limit).await
    }

    /// Pending jobs in claim order
    pub async fn pending(&self, limit: usize) -> Result<Vec<Job>> {
        self.store.pending(limit).await
    }

    /// Queue counters
    pub async fn stats(&self) -> Result<QueueStats> {
        self.store.stats().await
    }

    /// Wait until a producer enqueues, or the timeout elapses
    pub async fn wait_for_work(&self, timeout: std::time::Duration) {
        let _ = tokio::time::timeout(timeout, self.work_available.notified()).await;
    }

    /// Startup recovery: jobs left `Running` by a crash return to `Pending`
    /// with the attempt counter incremented; a job whose count would exceed
    /// the ceiling is failed terminally instead
    ///
    /// # Errors
    ///
    /// Returns the first storage error; recovery is idempotent and can be
    /// re-run.
    pub async fn recover_on_startup(&self) -> Result<usize> {
        let interrupted = self.store.running().await?;
        let mut recovered = 0usize;

        for mut job in interrupted {
            job.attempts += 1;
            if job.attempts > self.max_attempts {
                job.status = JobStatus::Failed;
                job.finished_at = Some(chrono::Utc::now());
                job.last_error = Some(format!(
                    "attempt ceiling reached ({} attempts allowed)",
                    self.max_attempts
                ));
                self.store.finalize(&job).await?;
                warn!(job_id = %job.job_id, "Interrupted job failed terminally");
            } else {
                job.status = JobStatus::Pending;
                job.started_at = None;
                self.store.append(&job).await?;
                recovered += 1;
                info!(job_id = %job.job_id, attempts = job.attempts, "Interrupted job re-queued");
            }
        }

        if recovered > 0 {
            self.work_available.notify_one();
        }
        Ok(recovered)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::job::JobType;
    use async_trait::async_trait;
    use std::collections::{HashMap, VecDeque};

    /// In-memory store mirroring the durable implementation's contract
    #[derive(Default)]
    struct MemoryJobStore {
        inner: std::sync::Mutex<MemoryInner>,
    }

    #[derive(Default)]
    struct MemoryInner {
        jobs: HashMap<Uuid, Job>,
        pending: VecDeque<Uuid>,
        ring: VecDeque<Uuid>,
        succeeded: u64,
        failed: u64,
        cancelled: u64,
    }

    #[async_trait]
    impl JobStore for MemoryJobStore {
        async fn append(&self, job: &Job) -> Result<()> {
            let mut inner = self.inner.lock().expect("lock");
            let mut stored = job.clone();
            stored.status = JobStatus::Pending;
            inner.jobs.insert(job.job_id, stored);
            inner.pending.push_back(job.job_id);
            Ok(())
        }

        async fn claim_oldest(&self) -> Result<Option<Job>> {
            let mut inner = self.inner.lock().expect("lock");
            let Some(job_id) = inner.pending.pop_front() else {
                return Ok(None);
            };
            let job = inner.jobs.get_mut(&job_id).expect("job exists");
            job.status = JobStatus::Running;
            job.started_at = Some(chrono::Utc::now());
            Ok(Some(job.clone()))
        }

        async fn update(&self, job: &Job) -> Result<()> {
            self.inner
                .lock()
                .expect("lock")
                .jobs
                .insert(job.job_id, job.clone());
            Ok(())
        }

        async fn finalize(&self, job: &Job) -> Result<()> {
            let mut inner = self.inner.lock().expect("lock");
            inner.jobs.insert(job.job_id, job.clone());
            inner.ring.push_back(job.job_id);
            while inner.ring.len() > 256 {
                inner.ring.pop_front();
            }
            match job.status {
                JobStatus::Succeeded => inner.succeeded += 1,
                JobStatus::Failed => inner.failed += 1,
                JobStatus::Cancelled => inner.cancelled += 1,
                _ => {}
            }
            Ok(())
        }

        async fn get(&self, job_id: Uuid) -> Result<Option<Job>> {
            Ok(self.inner.lock().expect("lock").jobs.get(&job_id).cloned())
        }

        async fn recent(&self, limit: usize) -> Result<Vec<Job>> {
            let inner = self.inner.lock().expect("lock");
            Ok(inner
                .ring
                .iter()
                .rev()
                .take(limit)
                .filter_map(|id| inner.jobs.get(id).cloned())
                .collect())
        }

        async fn pending(&self, limit: usize) -> Result<Vec<Job>> {
            let inner = self.inner.lock().expect("lock");
            Ok(inner
                .pending
                .iter()
                .take(limit)
                .filter_map(|id| inner.jobs.get(id).cloned())
                .collect())
        }

        async fn running(&self) -> Result<Vec<Job>> {
            let inner = self.inner.lock().expect("lock");
            Ok(inner
                .jobs
                .values()
                .filter(|j| j.status == JobStatus::Running)
                .cloned()
                .collect())
        }

        async fn stats(&self) -> Result<QueueStats> {
            let inner = self.inner.lock().expect("lock");
            Ok(QueueStats {
                pending: inner.pending.len() as u64,
                running: inner
                    .jobs
                    .values()
                    .filter(|j| j.status == JobStatus::Running)
                    .count() as u64,
                succeeded_total: inner.succeeded,
                failed_total: inner.failed,
                cancelled_total: inner.cancelled,
                by_type: Default::default(),
            })
        }
    }

    fn queue() -> JobQueue {
        JobQueue::new(Arc::new(MemoryJobStore::default()), 3)
    }

    fn extraction(path: &str) -> JobPayload {
        JobPayload::FileExtraction {
            path: path.to_string(),
        }
    }

    #[tokio::test]
    async fn claims_are_fifo_and_exclusive() {
        let queue = queue();
        let first = queue
            .enqueue(extraction("/tmp/a.md"), JobPriority::Normal)
            .await
            .expect("enqueue");
        queue
            .enqueue(extraction("/tmp/b.md"), JobPriority::Normal)
            .await
            .expect("enqueue");

        let claimed = queue.claim_next().await.expect("claim").expect("job");
        assert_eq!(claimed.job_id, first);
        assert_eq!(claimed.attempts, 1);

        // Second claim while one job is in flight yields nothing
        assert!(queue.claim_next().await.expect("claim").is_none());

        queue
            .complete(claimed.job_id, JobOutcome::Succeeded)
            .await
            .expect("complete");
        let next = queue.claim_next().await.expect("claim").expect("job");
        assert_eq!(next.job_type(), JobType::FileExtraction);
    }

    #[tokio::test]
    async fn completing_a_non_running_job_is_an_error() {
        let queue = queue();
        let result = queue.complete(Uuid::new_v4(), JobOutcome::Succeeded).await;
        assert!(matches!(result, Err(Error::InvalidState(_))));
    }

    #[tokio::test]
    async fn failed_outcome_records_the_error() {
        let queue = queue();
        queue
            .enqueue(extraction("/tmp/bad.bin"), JobPriority::Normal)
            .await
            .expect("enqueue");
        let job = queue.claim_next().await.expect("claim").expect("job");
        queue
            .complete(job.job_id, JobOutcome::Failed("binary file".to_string()))
            .await
            .expect("complete");

        let recent = queue.recent(10).await.expect("recent");
        assert_eq!(recent.len(), 1);
        assert_eq!(recent[0].status, JobStatus::Failed);
        assert_eq!(recent[0].last_error.as_deref(), Some("binary file"));
    }

    #[tokio::test]
    async fn recovery_requeues_interrupted_jobs() {
        let store = Arc::new(MemoryJobStore::default());
        let queue = JobQueue::new(Arc::clone(&store) as Arc<dyn JobStore>, 3);
        queue
            .enqueue(extraction("/tmp/a.md"), JobPriority::Normal)
            .await
            .expect("enqueue");
        let job = queue.claim_next().await.expect("claim").expect("job");
        assert_eq!(job.attempts, 1);

        // Simulate a crash: a fresh queue over the same store
        let revived = JobQueue::new(store as Arc<dyn JobStore>, 3);
        let recovered = revived.recover_on_startup().await.expect("recover");
        assert_eq!(recovered, 1);

        let reclaimed = revived.claim_next().await.expect("claim").expect("job");
        assert_eq!(reclaimed.job_id, job.job_id);
        assert_eq!(reclaimed.attempts, 2);
    }

    #[tokio::test]
    async fn recovery_fails_jobs_past_the_attempt_ceiling() {
        let store = Arc::new(MemoryJobStore::default());

        let first = JobQueue::new(Arc::clone(&store) as Arc<dyn JobStore>, 2);
        first
            .enqueue(extraction("/tmp/cursed.md"), JobPriority::Normal)
            .await
            .expect("enqueue");
        first.claim_next().await.expect("claim").expect("job");

        // First crash: one attempt spent, still under the ceiling
        let second = JobQueue::new(Arc::clone(&store) as Arc<dyn JobStore>, 2);
        assert_eq!(second.recover_on_startup().await.expect("recover"), 1);
        let job = second.claim_next().await.expect("claim").expect("job");
        assert_eq!(job.attempts, 2);

        // Second crash: the ceiling is reached, the job fails terminally
        let third = JobQueue::new(Arc::clone(&store) as Arc<dyn JobStore>, 2);
        assert_eq!(third.recover_on_startup().await.expect("recover"), 0);
        assert!(third.claim_next().await.expect("claim").is_none());

        let recent = third.recent(10).await.expect("recent");
        assert_eq!(recent.len(), 1);
        assert_eq!(recent[0].status, JobStatus::Failed);
        assert!(recent[0]
            .last_error
            .as_deref()
            .is_some_and(|e| e.contains("ceiling")));
    }
}
