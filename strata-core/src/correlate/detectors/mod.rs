//! # Pattern Detectors
//!
//! Four independent detectors consume the consolidated entities, the
//! co-occurrence matrix and raw file metadata. Each emits unscored
//! patterns; the scorer fills confidence afterwards.

mod expertise;
mod relationship;
mod tech_stack;
mod workflow;

pub use expertise::ExpertiseDetector;
pub use relationship::RelationshipDetector;
pub use tech_stack::TechStackDetector;
pub use workflow::WorkflowDetector;

use chrono::{DateTime, Utc};
use std::collections::{BTreeSet, HashMap};

use crate::correlate::cooccurrence::CooccurrenceMatrix;
use crate::pattern::Pattern;
use crate::types::{ConsolidatedEntity, FileRecord};

/// Shared read-only inputs for one detection pass
pub struct CorrelationContext<'a> {
    pub entities: &'a [ConsolidatedEntity],
    pub matrix: &'a CooccurrenceMatrix,
    /// Consolidated entity id -> files mentioning it
    pub entity_files: &'a HashMap<String, BTreeSet<String>>,
    /// Every file known to the catalog
    pub files: &'a [FileRecord],
    /// File id -> observation time (modification timestamp)
    pub file_times: &'a HashMap<String, DateTime<Utc>>,
    pub now: DateTime<Utc>,
}

impl CorrelationContext<'_> {
    /// Seen-range of a set of files, falling back to `now` when unknown
    pub fn seen_range(&self, file_ids: &BTreeSet<String>) -> (DateTime<Utc>, DateTime<Utc>) {
        let mut first: Option<DateTime<Utc>> = None;
        let mut last: Option<DateTime<Utc>> = None;
        for file_id in file_ids {
            if let Some(t) = self.file_times.get(file_id) {
                first = Some(first.map_or(*t, |f| f.min(*t)));
                last = Some(last.map_or(*t, |l| l.max(*t)));
            }
        }
        (first.unwrap_or(self.now), last.unwrap_or(self.now))
    }
}

/// Base trait for all pattern detectors
pub trait PatternDetector: Send + Sync {
    /// Get the name of this detector
    fn name(&self) -> &'static str;

    /// Detect patterns from the correlation context
    fn detect(&self, ctx: &CorrelationContext<'_>) -> Vec<Pattern>;
}

/// The built-in detector set, in a fixed, deterministic order
#[must_use]
pub fn builtin_detectors() -> Vec<Box<dyn PatternDetector>> {
    vec![
        Box::new(ExpertiseDetector::new()),
        Box::new(RelationshipDetector::new()),
        Box::new(WorkflowDetector::new()),
        Box::new(TechStackDetector::new()),
    ]
}
