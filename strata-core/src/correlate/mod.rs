//! # Correlation Engine
//!
//! The offline batch pass over the catalog: consolidation, bounded
//! co-occurrence, pattern detection and discovery surfacing. Every stage is
//! CPU-bound and runs on the blocking pool; the orchestrator awaits each
//! stage cooperatively so the control plane stays responsive throughout,
//! and the operation tracker reflects the active stage at all times.

pub mod consolidate;
pub mod cooccurrence;
pub mod detectors;
pub mod scoring;
pub mod surfacing;

pub use consolidate::consolidate;
pub use cooccurrence::CooccurrenceMatrix;
pub use detectors::{builtin_detectors, CorrelationContext, PatternDetector};
pub use surfacing::{surface, SurfacingOutcome};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, info, instrument};

use crate::config::CorrelationConfig;
use crate::error::{Error, Result};
use crate::ops::{CorrelationStage, Operation, OperationKind, OperationTracker};
use crate::pattern::Pattern;
use crate::storage::CatalogBackend;
use crate::types::{ConsolidatedEntity, EntityOccurrence, FileRecord};

/// Summary of one correlation run
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CorrelationReport {
    pub occurrences: u64,
    pub consolidated_entities: u64,
    pub files_processed: u64,
    pub pairs_total: u64,
    pub pairs_dropped: u64,
    pub patterns: u64,
    pub discoveries_created: u64,
    pub discoveries_updated: u64,
    pub discoveries_superseded: u64,
    pub duration_secs: f64,
}

/// The batch correlation orchestrator
pub struct CorrelationEngine {
    catalog: Arc<dyn CatalogBackend>,
    config: CorrelationConfig,
    tracker: Arc<OperationTracker>,
}

impl CorrelationEngine {
    pub fn new(
        catalog: Arc<dyn CatalogBackend>,
        config: CorrelationConfig,
        tracker: Arc<OperationTracker>,
    ) -> Self {
        Self {
            catalog,
            config,
            tracker,
        }
    }

    /// Run the full pass: consolidate, co-occur, detect, surface
    ///
    /// # Errors
    ///
    /// Returns the first stage error; the operation slot is cleared either
    /// way, and only successful runs feed the ETA history.
    #[instrument(skip(self))]
    pub async fn run(&self) -> Result<CorrelationReport> {
        self.tracker.begin(Operation::Correlation {
            stage: CorrelationStage::Consolidate,
            started_at: Utc::now(),
            progress: Some(0.0),
            eta_seconds: self.tracker.eta_seconds(OperationKind::Correlation),
        });

        let result = self.run_stages().await;
        match &result {
            Ok(report) => {
                self.tracker.finish();
                info!(
                    entities = report.consolidated_entities,
                    patterns = report.patterns,
                    discoveries = report.discoveries_created,
                    superseded = report.discoveries_superseded,
                    duration_secs = report.duration_secs,
                    "Correlation run complete"
                );
            }
            Err(e) => {
                self.tracker.abort();
                tracing::error!(error = %e, "Correlation run failed");
            }
        }
        result
    }

    async fn run_stages(&self) -> Result<CorrelationReport> {
        let started = Instant::now();
        let now = Utc::now();

        let occurrences = self.catalog.iter_occurrences().await?;
        let all_files = self.catalog.iter_files(None).await?;
        let file_times: HashMap<String, DateTime<Utc>> = all_files
            .iter()
            .map(|f| (f.file_id.clone(), f.modified_at))
            .collect();
        // Soft-deleted files keep their chunks but stop evidencing new
        // patterns
        let files: Vec<FileRecord> = all_files
            .into_iter()
            .filter(|f| f.status != crate::types::FileStatus::Skipped)
            .collect();

        // Stage 1: consolidation
        self.tracker
            .set_correlation_stage(CorrelationStage::Consolidate, Some(0.0));
        let consolidated: Vec<ConsolidatedEntity> = {
            let occurrences = occurrences.clone();
            let file_times = file_times.clone();
            run_blocking(move || consolidate::consolidate(&occurrences, &file_times)).await?
        };
        self.catalog.replace_consolidated(&consolidated).await?;
        debug!(entities = consolidated.len(), "Consolidation complete");

        // Stage 2: bounded co-occurrence
        self.tracker
            .set_correlation_stage(CorrelationStage::Cooccurrence, Some(0.25));
        let entity_files = entity_file_map(&occurrences);
        let matrix = {
            let file_entities = invert_to_files(&entity_files);
            let allowed =
                cooccurrence::participating_entities(&consolidated, self.config.max_entities);
            let config = self.config.clone();
            run_blocking(move || cooccurrence::build(&file_entities, &allowed, &config)).await?
        };

        // Stage 3: detection and scoring
        self.tracker
            .set_correlation_stage(CorrelationStage::Detect, Some(0.5));
        let (patterns, matrix) = {
            let consolidated = consolidated.clone();
            run_blocking(move || {
                let ctx = CorrelationContext {
                    entities: &consolidated,
                    matrix: &matrix,
                    entity_files: &entity_files,
                    files: &files,
                    file_times: &file_times,
                    now,
                };
                let mut all: Vec<Pattern> = Vec::new();
                for detector in builtin_detectors() {
                    let found = detector.detect(&ctx);
                    debug!(detector = detector.name(), patterns = found.len(), "Detector pass");
                    all.extend(found);
                }
                scoring::score_patterns(&mut all, now);
                // Stable persistence order regardless of detector internals
                all.sort_by(|a, b| a.key().cmp(&b.key()));
                (all, matrix)
            })
            .await?
        };
        self.catalog.replace_patterns(&patterns).await?;

        // Stage 4: discovery surfacing
        self.tracker
            .set_correlation_stage(CorrelationStage::Surface, Some(0.85));
        let existing = self.catalog.iter_discoveries().await?;
        let outcome = surfacing::surface(
            &patterns,
            &existing,
            self.config.min_confidence,
            self.config.min_sources,
            now,
        );
        for discovery in outcome.to_persist() {
            self.catalog.upsert_discovery(discovery).await?;
        }

        Ok(CorrelationReport {
            occurrences: occurrences.len() as u64,
            consolidated_entities: consolidated.len() as u64,
            files_processed: matrix.files_processed,
            pairs_total: matrix.pairs_total,
            pairs_dropped: matrix.pairs_dropped,
            patterns: patterns.len() as u64,
            discoveries_created: outcome.created.len() as u64,
            discoveries_updated: outcome.updated.len() as u64,
            discoveries_superseded: outcome.superseded.len() as u64,
            duration_secs: started.elapsed().as_secs_f64(),
        })
    }
}

/// Offload a CPU-bound stage to the blocking pool and await it
async fn run_blocking<T, F>(stage: F) -> Result<T>
where
    T: Send + 'static,
    F: FnOnce() -> T + Send + 'static,
{
    tokio::task::spawn_blocking(stage)
        .await
        .map_err(|e| Error::Programmer(format!("correlation stage panicked: {e}")))
}

/// Consolidated entity id -> files mentioning it
fn entity_file_map(occurrences: &[EntityOccurrence]) -> HashMap<String, BTreeSet<String>> {
    let mut map: HashMap<String, BTreeSet<String>> = HashMap::new();
    for occurrence in occurrences {
        let key = consolidate::group_key(occurrence.entity_type, &occurrence.normalized);
        let id = consolidate::consolidated_id(occurrence.entity_type, &key);
        map.entry(id).or_default().insert(occurrence.file_id.clone());
    }
    map
}

/// Invert the entity-file map into per-file deduplicated entity lists
fn invert_to_files(entity_files: &HashMap<String, BTreeSet<String>>) -> BTreeMap<String, Vec<String>> {
    let mut files: BTreeMap<String, BTreeSet<String>> = BTreeMap::new();
    for (entity, file_ids) in entity_files {
        for file_id in file_ids {
            files.entry(file_id.clone()).or_default().insert(entity.clone());
        }
    }
    files
        .into_iter()
        .map(|(file_id, entities)| (file_id, entities.into_iter().collect()))
        .collect()
}

#[cfg(test)]
pub(crate) mod test_support {
    //! Fixtures shared by the detector tests

    use super::*;
    use crate::config::CorrelationConfig;
    use crate::types::{EntityType, FileRecord, FileStatus};
    use chrono::Duration;

    pub struct ContextFixture {
        pub entities: Vec<ConsolidatedEntity>,
        pub matrix: CooccurrenceMatrix,
        pub entity_files: HashMap<String, BTreeSet<String>>,
        pub files: Vec<FileRecord>,
        pub file_times: HashMap<String, DateTime<Utc>>,
        pub now: DateTime<Utc>,
    }

    /// A consolidated entity with a readable id and an explicit file set
    pub fn entity_with_files(
        canonical: &str,
        entity_type: EntityType,
        files: &[&str],
        count: u64,
    ) -> (ConsolidatedEntity, BTreeSet<String>) {
        let now = Utc::now();
        let entity = ConsolidatedEntity {
            consolidated_id: canonical.to_lowercase(),
            canonical: canonical.to_string(),
            entity_type,
            aliases: vec![],
            occurrence_count: count,
            file_count: files.len() as u64,
            first_seen: now - Duration::days(30),
            last_seen: now,
        };
        (entity, files.iter().map(|f| (*f).to_string()).collect())
    }

    /// Context over explicit entities and a file universe
    pub fn context_fixture(
        items: Vec<(ConsolidatedEntity, BTreeSet<String>)>,
        all_files: &[&str],
    ) -> ContextFixture {
        let now = Utc::now();
        let mut entities = Vec::new();
        let mut entity_files: HashMap<String, BTreeSet<String>> = HashMap::new();
        for (entity, files) in items {
            entity_files.insert(entity.consolidated_id.clone(), files);
            entities.push(entity);
        }

        let files: Vec<FileRecord> = all_files
            .iter()
            .enumerate()
            .map(|(i, id)| file_record(id, &format!("/tmp/{id}.md"), i))
            .collect();
        let file_times = files
            .iter()
            .map(|f| (f.file_id.clone(), f.modified_at))
            .collect();

        let matrix = cooccurrence::build(
            &invert_to_files(&entity_files),
            &entities.iter().map(|e| e.consolidated_id.clone()).collect(),
            &CorrelationConfig::default(),
        );

        ContextFixture {
            entities,
            matrix,
            entity_files,
            files,
            file_times,
            now,
        }
    }

    /// Context with no entities, for the path-shape detectors
    pub fn context_fixture_with_paths(paths: &[&str]) -> ContextFixture {
        let now = Utc::now();
        let files: Vec<FileRecord> = paths
            .iter()
            .enumerate()
            .map(|(i, path)| file_record(&format!("f{i}"), path, i))
            .collect();
        let file_times = files
            .iter()
            .map(|f| (f.file_id.clone(), f.modified_at))
            .collect();

        ContextFixture {
            entities: Vec::new(),
            matrix: CooccurrenceMatrix::default(),
            entity_files: HashMap::new(),
            files,
            file_times,
            now,
        }
    }

    fn file_record(file_id: &str, path: &str, age_days: usize) -> FileRecord {
        let now = Utc::now();
        FileRecord {
            file_id: file_id.to_string(),
            path: path.to_string(),
            extension: std::path::Path::new(path)
                .extension()
                .and_then(|e| e.to_str())
                .unwrap_or_default()
                .to_string(),
            size_bytes: 1024,
            modified_at: now - Duration::days(age_days as i64),
            status: FileStatus::Indexed,
            last_error: None,
            discovered_at: now - Duration::days(age_days as i64),
            indexed_at: Some(now),
        }
    }
}
