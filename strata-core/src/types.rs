//! # Core Data Model
//!
//! Persisted record types shared across the pipeline, the stores and the
//! correlation engine. The catalog owns every record defined here; the
//! vector store only ever sees chunk identifiers.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::hash_map::DefaultHasher;
use std::hash::{Hash, Hasher};
use std::path::Path;
use uuid::Uuid;

/// Lifecycle status of a file known to the catalog
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FileStatus {
    /// Seen by the watcher or a discovery scan, not yet queued
    Discovered,
    /// An extraction job exists for this file
    Queued,
    /// Extraction in progress
    Extracting,
    /// Chunks, entities and vectors persisted
    Indexed,
    /// Extraction failed; `last_error` carries the reason
    Failed,
    /// Deleted on disk or filtered; chunks are retained (soft delete)
    Skipped,
}

impl FileStatus {
    /// Stable string form used in catalog rows
    pub fn as_str(self) -> &'static str {
        match self {
            FileStatus::Discovered => "discovered",
            FileStatus::Queued => "queued",
            FileStatus::Extracting => "extracting",
            FileStatus::Indexed => "indexed",
            FileStatus::Failed => "failed",
            FileStatus::Skipped => "skipped",
        }
    }

    /// Parse the stable string form
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "discovered" => Some(FileStatus::Discovered),
            "queued" => Some(FileStatus::Queued),
            "extracting" => Some(FileStatus::Extracting),
            "indexed" => Some(FileStatus::Indexed),
            "failed" => Some(FileStatus::Failed),
            "skipped" => Some(FileStatus::Skipped),
            _ => None,
        }
    }
}

/// A file known to the catalog
///
/// Identity is content-derived: the identifier changes when the file's
/// canonical path, size or modification time changes, which is what forces
/// re-extraction of modified files.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FileRecord {
    /// Stable content-derived identifier
    pub file_id: String,
    /// Absolute path
    pub path: String,
    /// Lowercased extension without the dot, empty when absent
    pub extension: String,
    /// Size in bytes at discovery time
    pub size_bytes: u64,
    /// Filesystem modification timestamp
    pub modified_at: DateTime<Utc>,
    /// Lifecycle status
    pub status: FileStatus,
    /// Last error string for `Failed` files
    pub last_error: Option<String>,
    /// First sighting
    pub discovered_at: DateTime<Utc>,
    /// Completion of the most recent successful extraction
    pub indexed_at: Option<DateTime<Utc>>,
}

impl FileRecord {
    /// Build a fresh record for a newly sighted file
    pub fn new(path: &Path, size_bytes: u64, modified_at: DateTime<Utc>) -> Self {
        let extension = path
            .extension()
            .and_then(|e| e.to_str())
            .map(str::to_lowercase)
            .unwrap_or_default();
        Self {
            file_id: file_identity(path, size_bytes, modified_at),
            path: path.to_string_lossy().into_owned(),
            extension,
            size_bytes,
            modified_at,
            status: FileStatus::Discovered,
            last_error: None,
            discovered_at: Utc::now(),
            indexed_at: None,
        }
    }
}

/// Derive the stable file identifier from canonical path, size and mtime
///
/// `DefaultHasher::new()` uses fixed keys, so the value is stable across
/// daemon restarts.
pub fn file_identity(path: &Path, size_bytes: u64, modified_at: DateTime<Utc>) -> String {
    let mut hasher = DefaultHasher::new();
    path.to_string_lossy().hash(&mut hasher);
    size_bytes.hash(&mut hasher);
    modified_at.timestamp().hash(&mut hasher);
    format!("{:016x}", hasher.finish())
}

/// Classification of a chunk's content
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ChunkKind {
    Prose,
    Code,
    Table,
    Ocr,
}

impl ChunkKind {
    /// Stable string form used in catalog rows
    pub fn as_str(self) -> &'static str {
        match self {
            ChunkKind::Prose => "prose",
            ChunkKind::Code => "code",
            ChunkKind::Table => "table",
            ChunkKind::Ocr => "ocr",
        }
    }

    /// Parse the stable string form
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "prose" => Some(ChunkKind::Prose),
            "code" => Some(ChunkKind::Code),
            "table" => Some(ChunkKind::Table),
            "ocr" => Some(ChunkKind::Ocr),
            _ => None,
        }
    }
}

/// A contiguous, bounded-size region of a file's extractable content
///
/// The unit of embedding and retrieval. Chunks of one file cover disjoint
/// byte spans and, concatenated in ordinal order, reconstruct the
/// extractable portion of the file up to whitespace normalization.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Chunk {
    pub chunk_id: Uuid,
    pub file_id: String,
    /// Position within the file, starting at 0
    pub ordinal: u32,
    pub text: String,
    pub token_count: usize,
    pub start_byte: usize,
    pub end_byte: usize,
    pub kind: ChunkKind,
}

/// Named-entity categories recognized by the pipeline
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EntityType {
    Person,
    Org,
    Project,
    Tech,
    Date,
    Location,
    Other,
}

impl EntityType {
    /// Stable string form used in catalog rows and telemetry maps
    pub fn as_str(self) -> &'static str {
        match self {
            EntityType::Person => "person",
            EntityType::Org => "org",
            EntityType::Project => "project",
            EntityType::Tech => "tech",
            EntityType::Date => "date",
            EntityType::Location => "location",
            EntityType::Other => "other",
        }
    }

    /// Parse the stable string form
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "person" => Some(EntityType::Person),
            "org" => Some(EntityType::Org),
            "project" => Some(EntityType::Project),
            "tech" => Some(EntityType::Tech),
            "date" => Some(EntityType::Date),
            "location" => Some(EntityType::Location),
            "other" => Some(EntityType::Other),
            _ => None,
        }
    }

    /// All categories, for telemetry rollups
    pub fn all() -> [EntityType; 7] {
        [
            EntityType::Person,
            EntityType::Org,
            EntityType::Project,
            EntityType::Tech,
            EntityType::Date,
            EntityType::Location,
            EntityType::Other,
        ]
    }
}

/// A single mention of a named entity inside a chunk; immutable once written
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EntityOccurrence {
    /// Surface form exactly as it appeared
    pub surface: String,
    /// Case-folded, diacritic-stripped, punctuation-trimmed form
    pub normalized: String,
    pub entity_type: EntityType,
    pub chunk_id: Uuid,
    pub file_id: String,
    /// Recognizer confidence in [0, 1]
    pub confidence: f32,
}

/// Post-consolidation merged record for a canonical surface form
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConsolidatedEntity {
    /// Stable identifier derived from (type, canonical group key)
    pub consolidated_id: String,
    /// Most frequent original surface form of the group
    pub canonical: String,
    pub entity_type: EntityType,
    /// Distinct surface forms merged into this entity, canonical excluded
    pub aliases: Vec<String>,
    pub occurrence_count: u64,
    /// Distinct files mentioning this entity
    pub file_count: u64,
    pub first_seen: DateTime<Utc>,
    pub last_seen: DateTime<Utc>,
}

/// Image side-metadata, written through this typed record only
///
/// Positional-argument drift between the pipeline and the store was a
/// recurring failure mode; the struct keeps field mismatches a compile
/// error, and any residual shape error at the store boundary is fatal.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ImageSidecar {
    pub file_id: String,
    pub width: u32,
    pub height: u32,
    pub camera: Option<String>,
    pub latitude: Option<f64>,
    pub longitude: Option<f64>,
    pub taken_at: Option<DateTime<Utc>>,
}

/// Audio side-metadata, written through this typed record only
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AudioSidecar {
    pub file_id: String,
    pub duration_secs: f64,
    pub codec: Option<String>,
    pub sample_rate: Option<u32>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    #[test]
    fn file_identity_is_stable_and_content_sensitive() {
        let path = PathBuf::from("/home/user/notes/plan.md");
        let mtime = Utc::now();
        let a = file_identity(&path, 1200, mtime);
        let b = file_identity(&path, 1200, mtime);
        assert_eq!(a, b);

        let grown = file_identity(&path, 1300, mtime);
        assert_ne!(a, grown);
    }

    #[test]
    fn status_round_trips() {
        for status in [
            FileStatus::Discovered,
            FileStatus::Queued,
            FileStatus::Extracting,
            FileStatus::Indexed,
            FileStatus::Failed,
            FileStatus::Skipped,
        ] {
            assert_eq!(FileStatus::parse(status.as_str()), Some(status));
        }
        assert_eq!(FileStatus::parse("bogus"), None);
    }

    #[test]
    fn new_record_lowercases_extension() {
        let record = FileRecord::new(Path::new("/tmp/Report.MD"), 10, Utc::now());
        assert_eq!(record.extension, "md");
        assert_eq!(record.status, FileStatus::Discovered);
    }
}
