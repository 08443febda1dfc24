//! Job types for the durable work queue

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use uuid::Uuid;

/// Work categories handled by the daemon's consumer loop
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JobType {
    FileExtraction,
    BatchExtraction,
    FaeImport,
    Correlation,
    Transcribe,
    VisionAnalyze,
}

impl JobType {
    /// Stable string form used in stats maps and job listings
    pub fn as_str(self) -> &'static str {
        match self {
            JobType::FileExtraction => "file_extraction",
            JobType::BatchExtraction => "batch_extraction",
            JobType::FaeImport => "fae_import",
            JobType::Correlation => "correlation",
            JobType::Transcribe => "transcribe",
            JobType::VisionAnalyze => "vision_analyze",
        }
    }
}

/// Typed payload, one variant per job type
///
/// Producers construct the variant directly; an untyped bag of fields would
/// reintroduce the payload-shape drift the taxonomy forbids. Externally
/// tagged on purpose: job records travel through postcard, which cannot
/// revisit an internally-tagged map.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JobPayload {
    /// Extract a single file
    FileExtraction { path: String },
    /// Walk a scope and enqueue extraction for new or changed files;
    /// `root: None` means every configured watch root
    BatchExtraction { root: Option<String> },
    /// Parse a conversational-AI export archive
    FaeImport { path: String },
    /// Run the full correlation pass
    Correlation {},
    /// Transcribe an audio file via the transcription capability
    Transcribe { path: String },
    /// Describe an image via the vision capability
    VisionAnalyze { path: String },
}

impl JobPayload {
    /// The job type this payload belongs to
    pub fn job_type(&self) -> JobType {
        match self {
            JobPayload::FileExtraction { .. } => JobType::FileExtraction,
            JobPayload::BatchExtraction { .. } => JobType::BatchExtraction,
            JobPayload::FaeImport { .. } => JobType::FaeImport,
            JobPayload::Correlation {} => JobType::Correlation,
            JobPayload::Transcribe { .. } => JobType::Transcribe,
            JobPayload::VisionAnalyze { .. } => JobType::VisionAnalyze,
        }
    }
}

/// Queue lifecycle status
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JobStatus {
    Pending,
    Running,
    Succeeded,
    Failed,
    Cancelled,
}

impl JobStatus {
    /// A terminal job never changes status again
    pub fn is_terminal(self) -> bool {
        matches!(
            self,
            JobStatus::Succeeded | JobStatus::Failed | JobStatus::Cancelled
        )
    }
}

/// Priority lanes; FIFO holds within a lane
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JobPriority {
    High,
    Normal,
    Low,
}

impl JobPriority {
    /// Lane byte used as the leading key component in the pending table,
    /// so lexicographic key order is priority order
    pub fn lane(self) -> u8 {
        match self {
            JobPriority::High => 0,
            JobPriority::Normal => 1,
            JobPriority::Low => 2,
        }
    }
}

/// A queue entry
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Job {
    pub job_id: Uuid,
    pub payload: JobPayload,
    pub status: JobStatus,
    pub priority: JobPriority,
    pub enqueued_at: DateTime<Utc>,
    pub started_at: Option<DateTime<Utc>>,
    pub finished_at: Option<DateTime<Utc>>,
    /// Times this job has entered `Running`, including startup recoveries
    pub attempts: u32,
    pub last_error: Option<String>,
}

impl Job {
    /// Build a fresh pending job
    pub fn new(payload: JobPayload, priority: JobPriority) -> Self {
        Self {
            job_id: Uuid::new_v4(),
            payload,
            status: JobStatus::Pending,
            priority,
            enqueued_at: Utc::now(),
            started_at: None,
            finished_at: None,
            attempts: 0,
            last_error: None,
        }
    }

    /// The job type of this entry's payload
    pub fn job_type(&self) -> JobType {
        self.payload.job_type()
    }
}

/// Terminal outcome reported by the consumer
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum JobOutcome {
    Succeeded,
    Failed(String),
    Cancelled,
}

impl JobOutcome {
    /// The terminal status this outcome maps to
    pub fn status(&self) -> JobStatus {
        match self {
            JobOutcome::Succeeded => JobStatus::Succeeded,
            JobOutcome::Failed(_) => JobStatus::Failed,
            JobOutcome::Cancelled => JobStatus::Cancelled,
        }
    }
}

/// Rollup counters for the queue
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct QueueStats {
    pub pending: u64,
    pub running: u64,
    pub succeeded_total: u64,
    pub failed_total: u64,
    pub cancelled_total: u64,
    /// Terminal-job counts keyed by `JobType::as_str`
    pub by_type: BTreeMap<String, u64>,
}
