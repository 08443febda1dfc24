//! # strata-core
//!
//! The indexing-and-correlation engine behind the strata daemon: data
//! model, extraction pipeline, correlation engine, job queue semantics,
//! operation tracking and the storage backend traits. Durable stores and
//! the daemon process itself live in the `strata-storage` and
//! `strata-daemon` crates.

pub mod config;
pub mod correlate;
pub mod embeddings;
pub mod error;
pub mod extract;
pub mod job;
pub mod ops;
pub mod pattern;
pub mod pipeline;
pub mod queue;
pub mod storage;
pub mod telemetry;
pub mod types;

pub use config::StrataConfig;
pub use correlate::{CorrelationEngine, CorrelationReport};
pub use error::{Error, Result};
pub use job::{Job, JobOutcome, JobPayload, JobPriority, JobStatus, JobType, QueueStats};
pub use ops::{CorrelationStage, Operation, OperationKind, OperationSnapshot, OperationTracker};
pub use pattern::{Discovery, DiscoveryStatus, Evidence, Pattern, PatternKind};
pub use pipeline::{ExtractionPipeline, ExtractionReport};
pub use queue::JobQueue;
pub use storage::{CatalogBackend, CatalogStats, JobStore, VectorBackend, VectorHit};
pub use telemetry::TelemetrySnapshot;
pub use types::{
    AudioSidecar, Chunk, ChunkKind, ConsolidatedEntity, EntityOccurrence, EntityType, FileRecord,
    FileStatus, ImageSidecar,
};
