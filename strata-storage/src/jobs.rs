//! Durable jobs database on redb
//!
//! Tables:
//! - `jobs`: job id -> postcard-encoded record, for every live job (pending,
//!   running, or still inside the recent ring)
//! - `pending`: `[lane byte | sequence]` -> job id; lexicographic key order
//!   is claim order, so priority lanes drain before later sequences
//! - `ring`: bounded ring of terminal jobs (capacity 256); eviction also
//!   deletes the job record, keeping the database size bounded
//! - `meta`: sequence counters and terminal-outcome totals

use async_trait::async_trait;
use redb::{Database, ReadableDatabase, ReadableTable, ReadableTableMetadata, TableDefinition};
use std::path::Path;
use std::sync::Arc;
use tracing::{debug, info};
use uuid::Uuid;

use strata_core::error::{Error, Result};
use strata_core::job::{Job, JobStatus, QueueStats};
use strata_core::storage::JobStore;

const JOBS_TABLE: TableDefinition<&str, &[u8]> = TableDefinition::new("jobs");
const PENDING_TABLE: TableDefinition<&[u8], &str> = TableDefinition::new("pending");
const RING_TABLE: TableDefinition<u64, &str> = TableDefinition::new("ring");
const META_TABLE: TableDefinition<&str, u64> = TableDefinition::new("meta");

/// Terminal jobs retained in the recent ring
const RING_CAPACITY: u64 = 256;

const META_SEQ: &str = "seq";
const META_RING_SEQ: &str = "ring_seq";
const META_SUCCEEDED: &str = "succeeded_total";
const META_FAILED: &str = "failed_total";
const META_CANCELLED: &str = "cancelled_total";

/// The durable job store
pub struct RedbJobStore {
    db: Arc<Database>,
}

impl RedbJobStore {
    /// Open (creating if needed) the jobs database at the given path
    ///
    /// # Errors
    ///
    /// Returns [`Error::Fatal`]: an unopenable jobs database refuses
    /// daemon startup.
    pub fn open(path: &Path) -> Result<Self> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)
                .map_err(|e| Error::Fatal(format!("create {}: {}", parent.display(), e)))?;
        }
        let db = Database::create(path)
            .map_err(|e| Error::Fatal(format!("open jobs db {}: {}", path.display(), e)))?;

        let store = Self { db: Arc::new(db) };
        store.ensure_tables()?;
        info!(path = %path.display(), "Jobs database opened");
        Ok(store)
    }

    fn ensure_tables(&self) -> Result<()> {
        let txn = self
            .db
            .begin_write()
            .map_err(|e| Error::Fatal(format!("begin write: {e}")))?;
        {
            txn.open_table(JOBS_TABLE)
                .map_err(|e| Error::Fatal(format!("open jobs table: {e}")))?;
            txn.open_table(PENDING_TABLE)
                .map_err(|e| Error::Fatal(format!("open pending table: {e}")))?;
            txn.open_table(RING_TABLE)
                .map_err(|e| Error::Fatal(format!("open ring table: {e}")))?;
            txn.open_table(META_TABLE)
                .map_err(|e| Error::Fatal(format!("open meta table: {e}")))?;
        }
        txn.commit()
            .map_err(|e| Error::Fatal(format!("commit table creation: {e}")))?;
        Ok(())
    }
}

fn encode_job(job: &Job) -> Result<Vec<u8>> {
    postcard::to_allocvec(job).map_err(|e| Error::Storage(format!("encode job: {e}")))
}

fn decode_job(bytes: &[u8]) -> Result<Job> {
    postcard::from_bytes(bytes).map_err(|e| Error::Storage(format!("decode job: {e}")))
}

/// Pending-table key: lane byte then big-endian sequence
fn pending_key(lane: u8, seq: u64) -> [u8; 9] {
    let mut key = [0u8; 9];
    key[0] = lane;
    key[1..].copy_from_slice(&seq.to_be_bytes());
    key
}

fn bump(table: &mut redb::Table<'_, &'static str, u64>, key: &str, by: u64) -> Result<u64> {
    let current = table
        .get(key)
        .map_err(|e| Error::Storage(format!("read counter: {e}")))?
        .map(|v| v.value())
        .unwrap_or(0);
    let next = current + by;
    table
        .insert(key, next)
        .map_err(|e| Error::Storage(format!("write counter: {e}")))?;
    Ok(next)
}

fn read_counter(table: &impl ReadableTable<&'static str, u64>, key: &str) -> Result<u64> {
    Ok(table
        .get(key)
        .map_err(|e| Error::Storage(format!("read counter: {e}")))?
        .map(|v| v.value())
        .unwrap_or(0))
}

#[async_trait]
impl JobStore for RedbJobStore {
    async fn append(&self, job: &Job) -> Result<()> {
        let db = Arc::clone(&self.db);
        let job = job.clone();
        tokio::task::spawn_blocking(move || {
            let bytes = encode_job(&job)?;
            let txn = db
                .begin_write()
                .map_err(|e| Error::Storage(format!("begin write: {e}")))?;
            {
                let mut jobs = txn
                    .open_table(JOBS_TABLE)
                    .map_err(|e| Error::Storage(e.to_string()))?;
                jobs.insert(job.job_id.to_string().as_str(), bytes.as_slice())
                    .map_err(|e| Error::Storage(format!("insert job: {e}")))?;

                let mut meta = txn
                    .open_table(META_TABLE)
                    .map_err(|e| Error::Storage(e.to_string()))?;
                let seq = bump(&mut meta, META_SEQ, 1)?;

                let mut pending = txn
                    .open_table(PENDING_TABLE)
                    .map_err(|e| Error::Storage(e.to_string()))?;
                pending
                    .insert(
                        pending_key(job.priority.lane(), seq).as_slice(),
                        job.job_id.to_string().as_str(),
                    )
                    .map_err(|e| Error::Storage(format!("insert pending: {e}")))?;
            }
            txn.commit()
                .map_err(|e| Error::Storage(format!("commit append: {e}")))?;
            Ok::<(), Error>(())
        })
        .await
        .map_err(|e| Error::Storage(format!("task join error: {e}")))??;
        Ok(())
    }

    async fn claim_oldest(&self) -> Result<Option<Job>> {
        let db = Arc::clone(&self.db);
        let claimed = tokio::task::spawn_blocking(move || {
            let txn = db
                .begin_write()
                .map_err(|e| Error::Storage(format!("begin write: {e}")))?;
            let claimed = {
                let mut pending = txn
                    .open_table(PENDING_TABLE)
                    .map_err(|e| Error::Storage(e.to_string()))?;
                let first = pending
                    .pop_first()
                    .map_err(|e| Error::Storage(format!("pop pending: {e}")))?;
                match first {
                    None => None,
                    Some((_key, job_id)) => {
                        let job_id = job_id.value().to_string();
                        let mut jobs = txn
                            .open_table(JOBS_TABLE)
                            .map_err(|e| Error::Storage(e.to_string()))?;
                        let bytes = jobs
                            .get(job_id.as_str())
                            .map_err(|e| Error::Storage(format!("read job: {e}")))?
                            .map(|v| v.value().to_vec())
                            .ok_or_else(|| {
                                Error::Consistency(format!(
                                    "pending entry for absent job {job_id}"
                                ))
                            })?;
                        let mut job = decode_job(&bytes)?;
                        job.status = JobStatus::Running;
                        job.started_at = Some(chrono::Utc::now());
                        jobs.insert(job_id.as_str(), encode_job(&job)?.as_slice())
                            .map_err(|e| Error::Storage(format!("update job: {e}")))?;
                        Some(job)
                    }
                }
            };
            txn.commit()
                .map_err(|e| Error::Storage(format!("commit claim: {e}")))?;
            Ok::<Option<Job>, Error>(claimed)
        })
        .await
        .map_err(|e| Error::Storage(format!("task join error: {e}")))??;

        if let Some(job) = &claimed {
            debug!(job_id = %job.job_id, "Claimed from jobs database");
        }
        Ok(claimed)
    }

    async fn update(&self, job: &Job) -> Result<()> {
        let db = Arc::clone(&self.db);
        let job = job.clone();
        tokio::task::spawn_blocking(move || {
            let bytes = encode_job(&job)?;
            let txn = db
                .begin_write()
                .map_err(|e| Error::Storage(format!("begin write: {e}")))?;
            {
                let mut jobs = txn
                    .open_table(JOBS_TABLE)
                    .map_err(|e| Error::Storage(e.to_string()))?;
                jobs.insert(job.job_id.to_string().as_str(), bytes.as_slice())
                    .map_err(|e| Error::Storage(format!("update job: {e}")))?;
            }
            txn.commit()
                .map_err(|e| Error::Storage(format!("commit update: {e}")))?;
            Ok::<(), Error>(())
        })
        .await
        .map_err(|e| Error::Storage(format!("task join error: {e}")))??;
        Ok(())
    }

    async fn finalize(&self, job: &Job) -> Result<()> {
        let db = Arc::clone(&self.db);
        let job = job.clone();
        tokio::task::spawn_blocking(move || {
            let bytes = encode_job(&job)?;
            let txn = db
                .begin_write()
                .map_err(|e| Error::Storage(format!("begin write: {e}")))?;
            {
                let mut jobs = txn
                    .open_table(JOBS_TABLE)
                    .map_err(|e| Error::Storage(e.to_string()))?;
                jobs.insert(job.job_id.to_string().as_str(), bytes.as_slice())
                    .map_err(|e| Error::Storage(format!("finalize job: {e}")))?;

                let mut meta = txn
                    .open_table(META_TABLE)
                    .map_err(|e| Error::Storage(e.to_string()))?;
                let ring_seq = bump(&mut meta, META_RING_SEQ, 1)?;
                match job.status {
                    JobStatus::Succeeded => bump(&mut meta, META_SUCCEEDED, 1)?,
                    JobStatus::Failed => bump(&mut meta, META_FAILED, 1)?,
                    JobStatus::Cancelled => bump(&mut meta, META_CANCELLED, 1)?,
                    JobStatus::Pending | JobStatus::Running => {
                        return Err(Error::Programmer(format!(
                            "finalize called with non-terminal status {:?}",
                            job.status
                        )))
                    }
                };
                bump(
                    &mut meta,
                    &format!("type:{}", job.job_type().as_str()),
                    1,
                )?;

                let mut ring = txn
                    .open_table(RING_TABLE)
                    .map_err(|e| Error::Storage(e.to_string()))?;
                ring.insert(ring_seq, job.job_id.to_string().as_str())
                    .map_err(|e| Error::Storage(format!("insert ring: {e}")))?;

                // Evict past capacity; evicted jobs leave the database
                while ring
                    .len()
                    .map_err(|e| Error::Storage(e.to_string()))?
                    > RING_CAPACITY
                {
                    let Some((_, evicted)) = ring
                        .pop_first()
                        .map_err(|e| Error::Storage(format!("pop ring: {e}")))?
                    else {
                        break;
                    };
                    jobs.remove(evicted.value())
                        .map_err(|e| Error::Storage(format!("remove evicted job: {e}")))?;
                }
            }
            txn.commit()
                .map_err(|e| Error::Storage(format!("commit finalize: {e}")))?;
            Ok::<(), Error>(())
        })
        .await
        .map_err(|e| Error::Storage(format!("task join error: {e}")))??;
        Ok(())
    }

    async fn get(&self, job_id: Uuid) -> Result<Option<Job>> {
        let db = Arc::clone(&self.db);
        tokio::task::spawn_blocking(move || {
            let txn = db
                .begin_read()
                .map_err(|e| Error::Storage(format!("begin read: {e}")))?;
            let jobs = txn
                .open_table(JOBS_TABLE)
                .map_err(|e| Error::Storage(e.to_string()))?;
            match jobs
                .get(job_id.to_string().as_str())
                .map_err(|e| Error::Storage(format!("read job: {e}")))?
            {
                Some(bytes) => Ok(Some(decode_job(bytes.value())?)),
                None => Ok(None),
            }
        })
        .await
        .map_err(|e| Error::Storage(format!("task join error: {e}")))?
    }

    async fn recent(&self, limit: usize) -> Result<Vec<Job>> {
        let db = Arc::clone(&self.db);
        tokio::task::spawn_blocking(move || {
            let txn = db
                .begin_read()
                .map_err(|e| Error::Storage(format!("begin read: {e}")))?;
            let ring = txn
                .open_table(RING_TABLE)
                .map_err(|e| Error::Storage(e.to_string()))?;
            let jobs = txn
                .open_table(JOBS_TABLE)
                .map_err(|e| Error::Storage(e.to_string()))?;

            let mut out = Vec::new();
            for entry in ring
                .iter()
                .map_err(|e| Error::Storage(format!("iterate ring: {e}")))?
                .rev()
                .take(limit)
            {
                let (_, job_id) = entry.map_err(|e| Error::Storage(e.to_string()))?;
                if let Some(bytes) = jobs
                    .get(job_id.value())
                    .map_err(|e| Error::Storage(format!("read job: {e}")))?
                {
                    out.push(decode_job(bytes.value())?);
                }
            }
            Ok(out)
        })
        .await
        .map_err(|e| Error::Storage(format!("task join error: {e}")))?
    }

    async fn pending(&self, limit: usize) -> Result<Vec<Job>> {
        let db = Arc::clone(&self.db);
        tokio::task::spawn_blocking(move || {
            let txn = db
                .begin_read()
                .map_err(|e| Error::Storage(format!("begin read: {e}")))?;
            let pending = txn
                .open_table(PENDING_TABLE)
                .map_err(|e| Error::Storage(e.to_string()))?;
            let jobs = txn
                .open_table(JOBS_TABLE)
                .map_err(|e| Error::Storage(e.to_string()))?;

            let mut out = Vec::new();
            for entry in pending
                .iter()
                .map_err(|e| Error::Storage(format!("iterate pending: {e}")))?
                .take(limit)
            {
                let (_, job_id) = entry.map_err(|e| Error::Storage(e.to_string()))?;
                if let Some(bytes) = jobs
                    .get(job_id.value())
                    .map_err(|e| Error::Storage(format!("read job: {e}")))?
                {
                    out.push(decode_job(bytes.value())?);
                }
            }
            Ok(out)
        })
        .await
        .map_err(|e| Error::Storage(format!("task join error: {e}")))?
    }

    async fn running(&self) -> Result<Vec<Job>> {
        let db = Arc::clone(&self.db);
        tokio::task::spawn_blocking(move || {
            let txn = db
                .begin_read()
                .map_err(|e| Error::Storage(format!("begin read: {e}")))?;
            let jobs = txn
                .open_table(JOBS_TABLE)
                .map_err(|e| Error::Storage(e.to_string()))?;

            let mut out = Vec::new();
            for entry in jobs
                .iter()
                .map_err(|e| Error::Storage(format!("iterate jobs: {e}")))?
            {
                let (_, bytes) = entry.map_err(|e| Error::Storage(e.to_string()))?;
                let job = decode_job(bytes.value())?;
                if job.status == JobStatus::Running {
                    out.push(job);
                }
            }
            Ok(out)
        })
        .await
        .map_err(|e| Error::Storage(format!("task join error: {e}")))?
    }

    async fn stats(&self) -> Result<QueueStats> {
        let db = Arc::clone(&self.db);
        tokio::task::spawn_blocking(move || {
            let txn = db
                .begin_read()
                .map_err(|e| Error::Storage(format!("begin read: {e}")))?;
            let pending = txn
                .open_table(PENDING_TABLE)
                .map_err(|e| Error::Storage(e.to_string()))?;
            let jobs = txn
                .open_table(JOBS_TABLE)
                .map_err(|e| Error::Storage(e.to_string()))?;
            let meta = txn
                .open_table(META_TABLE)
                .map_err(|e| Error::Storage(e.to_string()))?;

            let mut running = 0u64;
            for entry in jobs
                .iter()
                .map_err(|e| Error::Storage(format!("iterate jobs: {e}")))?
            {
                let (_, bytes) = entry.map_err(|e| Error::Storage(e.to_string()))?;
                if decode_job(bytes.value())?.status == JobStatus::Running {
                    running += 1;
                }
            }

            let mut by_type = std::collections::BTreeMap::new();
            for entry in meta
                .iter()
                .map_err(|e| Error::Storage(format!("iterate meta: {e}")))?
            {
                let (key, value) = entry.map_err(|e| Error::Storage(e.to_string()))?;
                if let Some(job_type) = key.value().strip_prefix("type:") {
                    by_type.insert(job_type.to_string(), value.value());
                }
            }

            Ok(QueueStats {
                pending: pending.len().map_err(|e| Error::Storage(e.to_string()))?,
                running,
                succeeded_total: read_counter(&meta, META_SUCCEEDED)?,
                failed_total: read_counter(&meta, META_FAILED)?,
                cancelled_total: read_counter(&meta, META_CANCELLED)?,
                by_type,
            })
        })
        .await
        .map_err(|e| Error::Storage(format!("task join error: {e}")))?
    }
}
