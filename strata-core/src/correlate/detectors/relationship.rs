//! Relationship detector
//!
//! Every PERSON-ORG or PERSON-PROJECT pair whose file-level co-occurrence
//! count reaches 2 becomes a `relationship` pattern carrying the
//! contributing files as its sources.

use std::collections::BTreeSet;
use uuid::Uuid;

use super::{CorrelationContext, PatternDetector};
use crate::pattern::{Evidence, Pattern};
use crate::types::EntityType;

/// Minimum file-level co-occurrence count
const MIN_COOCCURRENCE: u32 = 2;

/// Detects recurring person-organization and person-project ties
pub struct RelationshipDetector;

impl RelationshipDetector {
    #[must_use]
    pub fn new() -> Self {
        Self
    }
}

impl Default for RelationshipDetector {
    fn default() -> Self {
        Self::new()
    }
}

impl PatternDetector for RelationshipDetector {
    fn name(&self) -> &'static str {
        "relationship"
    }

    fn detect(&self, ctx: &CorrelationContext<'_>) -> Vec<Pattern> {
        // The matrix is the bounded structure; walking its pairs keeps this
        // detector linear in counted pairs rather than persons x orgs
        let by_id: std::collections::HashMap<&str, &crate::types::ConsolidatedEntity> = ctx
            .entities
            .iter()
            .map(|e| (e.consolidated_id.as_str(), e))
            .collect();

        let mut patterns = Vec::new();
        for ((a, b), count) in ctx.matrix.iter() {
            if *count < MIN_COOCCURRENCE {
                continue;
            }
            let (Some(first), Some(second)) = (by_id.get(a.as_str()), by_id.get(b.as_str()))
            else {
                continue;
            };
            let (person, counterpart) = match (first.entity_type, second.entity_type) {
                (EntityType::Person, EntityType::Org | EntityType::Project) => (first, second),
                (EntityType::Org | EntityType::Project, EntityType::Person) => (second, first),
                _ => continue,
            };

            let shared: BTreeSet<String> = match (
                ctx.entity_files.get(&person.consolidated_id),
                ctx.entity_files.get(&counterpart.consolidated_id),
            ) {
                (Some(a), Some(b)) => a.intersection(b).cloned().collect(),
                _ => BTreeSet::new(),
            };
            if shared.is_empty() {
                continue;
            }

            let (first_seen, last_seen) = ctx.seen_range(&shared);
            patterns.push(Pattern::Relationship {
                id: Uuid::new_v4(),
                person: person.canonical.clone(),
                counterpart: counterpart.canonical.clone(),
                counterpart_type: counterpart.entity_type,
                evidence: Evidence {
                    count: u64::from(*count),
                    source_files: shared.into_iter().collect(),
                    first_seen,
                    last_seen,
                    confidence: 0.0,
                },
            });
        }

        patterns
    }
}
