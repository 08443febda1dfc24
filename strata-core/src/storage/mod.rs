//! # Storage Abstraction
//!
//! Backend traits for the three durable stores: the relational catalog
//! (source of truth), the vector index (rebuildable), and the jobs
//! database. `strata-storage` provides the production implementations;
//! in-memory implementations back the unit tests.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use uuid::Uuid;

use crate::error::Result;
use crate::job::Job;
use crate::pattern::{Discovery, Pattern};
use crate::types::{
    AudioSidecar, Chunk, ConsolidatedEntity, EntityOccurrence, FileRecord, FileStatus,
    ImageSidecar,
};

/// Rollup counters over the catalog, served by `/status` and `/telemetry`
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CatalogStats {
    pub files_total: u64,
    pub files_indexed: u64,
    pub files_failed: u64,
    pub chunks: u64,
    pub occurrences: u64,
    /// Occurrence counts keyed by `EntityType::as_str`
    pub occurrences_by_type: BTreeMap<String, u64>,
    pub consolidated_entities: u64,
    pub patterns: u64,
    /// Pattern counts keyed by `PatternKind::as_str`
    pub patterns_by_kind: BTreeMap<String, u64>,
    pub discoveries: u64,
    /// Discovery counts keyed by `DiscoveryStatus::as_str`
    pub discoveries_by_status: BTreeMap<String, u64>,
}

/// Relational catalog backend
///
/// Referential integrity is enforced at write time: inserting a chunk whose
/// file row is absent, or an occurrence whose chunk row is absent, is an
/// error. Scan operations return materialized vectors; the correlation
/// engine consumes them whole.
#[async_trait]
pub trait CatalogBackend: Send + Sync {
    /// Insert or replace a file record keyed by `file_id`
    async fn upsert_file(&self, file: &FileRecord) -> Result<()>;

    /// Fetch a file by identifier
    async fn get_file(&self, file_id: &str) -> Result<Option<FileRecord>>;

    /// Fetch a file by absolute path
    async fn get_file_by_path(&self, path: &str) -> Result<Option<FileRecord>>;

    /// Update lifecycle status and error string
    async fn set_file_status(
        &self,
        file_id: &str,
        status: FileStatus,
        error: Option<&str>,
    ) -> Result<()>;

    /// Scan files, optionally filtered by status
    async fn iter_files(&self, status: Option<FileStatus>) -> Result<Vec<FileRecord>>;

    /// Insert chunks; every chunk must reference an existing file
    async fn insert_chunks(&self, chunks: &[Chunk]) -> Result<()>;

    /// Fetch one chunk
    async fn get_chunk(&self, chunk_id: Uuid) -> Result<Option<Chunk>>;

    /// Scan the chunks of one file in ordinal order
    async fn iter_chunks(&self, file_id: &str) -> Result<Vec<Chunk>>;

    /// All chunk identifiers, for reconciliation
    async fn chunk_ids(&self) -> Result<Vec<Uuid>>;

    /// Remove chunks and occurrences of a file prior to re-extraction;
    /// returns the removed chunk ids so vectors can be dropped too
    async fn delete_file_content(&self, file_id: &str) -> Result<Vec<Uuid>>;

    /// Insert entity occurrences; each must reference an existing chunk
    async fn insert_occurrences(&self, occurrences: &[EntityOccurrence]) -> Result<()>;

    /// Scan every occurrence, the correlation engine's input
    async fn iter_occurrences(&self) -> Result<Vec<EntityOccurrence>>;

    /// Replace the consolidated-entity set from the latest run
    async fn replace_consolidated(&self, entities: &[ConsolidatedEntity]) -> Result<()>;

    /// Scan consolidated entities, most frequent first
    async fn iter_consolidated(&self) -> Result<Vec<ConsolidatedEntity>>;

    /// Replace the pattern set from the latest run
    async fn replace_patterns(&self, patterns: &[Pattern]) -> Result<()>;

    /// Scan patterns of the latest run
    async fn iter_patterns(&self) -> Result<Vec<Pattern>>;

    /// Insert or replace a discovery keyed by `discovery_id`
    async fn upsert_discovery(&self, discovery: &Discovery) -> Result<()>;

    /// Fetch one discovery
    async fn get_discovery(&self, discovery_id: Uuid) -> Result<Option<Discovery>>;

    /// Scan discoveries ordered by confidence, highest first
    async fn iter_discoveries(&self) -> Result<Vec<Discovery>>;

    /// Write image side-metadata
    async fn insert_image_sidecar(&self, sidecar: &ImageSidecar) -> Result<()>;

    /// Write audio side-metadata
    async fn insert_audio_sidecar(&self, sidecar: &AudioSidecar) -> Result<()>;

    /// Rollup counters
    async fn get_stats(&self) -> Result<CatalogStats>;
}

/// A scored nearest-neighbor hit
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VectorHit {
    pub chunk_id: Uuid,
    /// Cosine similarity in [-1, 1], higher is closer
    pub score: f32,
}

/// Vector index backend, keyed by chunk id
///
/// The index is derived state: losing it is recoverable by re-embedding
/// from the catalog, which is exactly what reconciliation does.
#[async_trait]
pub trait VectorBackend: Send + Sync {
    /// Insert or replace the vector for a chunk
    async fn upsert(&self, chunk_id: Uuid, vector: &[f32], file_id: &str) -> Result<()>;

    /// Remove vectors for the given chunks
    async fn remove(&self, chunk_ids: &[Uuid]) -> Result<()>;

    /// Every chunk id present in the index, for reconciliation
    async fn ids(&self) -> Result<Vec<Uuid>>;

    /// Number of stored vectors
    async fn count(&self) -> Result<u64>;

    /// K nearest chunks by cosine similarity
    async fn query_by_vector(&self, vector: &[f32], k: usize) -> Result<Vec<VectorHit>>;
}

/// Durable backing for the job queue
///
/// The store persists records and lane ordering; single-claim discipline
/// and attempt accounting live in [`crate::queue::JobQueue`].
#[async_trait]
pub trait JobStore: Send + Sync {
    /// Persist a fresh pending job; durable before return
    async fn append(&self, job: &Job) -> Result<()>;

    /// Pop the oldest pending job in the highest non-empty lane and persist
    /// it as running with `started_at` stamped
    async fn claim_oldest(&self) -> Result<Option<Job>>;

    /// Overwrite a job record
    async fn update(&self, job: &Job) -> Result<()>;

    /// Overwrite a terminal job and push it into the bounded recent ring
    async fn finalize(&self, job: &Job) -> Result<()>;

    /// Fetch a job by id
    async fn get(&self, job_id: Uuid) -> Result<Option<Job>>;

    /// Terminal jobs from the ring, most recent first
    async fn recent(&self, limit: usize) -> Result<Vec<Job>>;

    /// Pending jobs in claim order
    async fn pending(&self, limit: usize) -> Result<Vec<Job>>;

    /// Jobs persisted as running (non-empty only after a crash)
    async fn running(&self) -> Result<Vec<Job>>;

    /// Queue counters
    async fn stats(&self) -> Result<crate::job::QueueStats>;
}
