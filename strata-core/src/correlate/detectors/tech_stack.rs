//! Tech-stack detector
//!
//! Greedy clustering of TECH entities over the co-occurrence matrix: pick
//! the strongest unclaimed technology, pull in every technology tied to it
//! by at least two shared files, and emit one pattern per cluster of three
//! or more members.

use std::collections::BTreeSet;
use uuid::Uuid;

use super::{CorrelationContext, PatternDetector};
use crate::pattern::{Evidence, Pattern};
use crate::types::{ConsolidatedEntity, EntityType};

/// Minimum shared files for a cluster edge
const MIN_EDGE: u32 = 2;
/// Minimum technologies forming a stack
const MIN_CLUSTER: usize = 3;

/// Detects dense clusters of co-occurring technologies
pub struct TechStackDetector;

impl TechStackDetector {
    #[must_use]
    pub fn new() -> Self {
        Self
    }
}

impl Default for TechStackDetector {
    fn default() -> Self {
        Self::new()
    }
}

impl PatternDetector for TechStackDetector {
    fn name(&self) -> &'static str {
        "tech_stack"
    }

    fn detect(&self, ctx: &CorrelationContext<'_>) -> Vec<Pattern> {
        let mut techs: Vec<&ConsolidatedEntity> = ctx
            .entities
            .iter()
            .filter(|e| e.entity_type == EntityType::Tech)
            .collect();
        // Seed order: strongest first, deterministic
        techs.sort_by(|a, b| {
            b.occurrence_count
                .cmp(&a.occurrence_count)
                .then_with(|| a.consolidated_id.cmp(&b.consolidated_id))
        });

        let mut claimed: BTreeSet<&str> = BTreeSet::new();
        let mut patterns = Vec::new();

        for seed in &techs {
            if claimed.contains(seed.consolidated_id.as_str()) {
                continue;
            }

            let mut cluster: Vec<&ConsolidatedEntity> = vec![seed];
            let mut edge_total = 0u64;
            for candidate in &techs {
                if candidate.consolidated_id == seed.consolidated_id
                    || claimed.contains(candidate.consolidated_id.as_str())
                {
                    continue;
                }
                let count = ctx
                    .matrix
                    .get(&seed.consolidated_id, &candidate.consolidated_id);
                if count >= MIN_EDGE {
                    cluster.push(candidate);
                    edge_total += u64::from(count);
                }
            }

            if cluster.len() < MIN_CLUSTER {
                continue;
            }
            for member in &cluster {
                claimed.insert(member.consolidated_id.as_str());
            }

            // Sources: files where the seed meets any other cluster member
            let mut source_files: BTreeSet<String> = BTreeSet::new();
            if let Some(seed_files) = ctx.entity_files.get(&seed.consolidated_id) {
                for member in cluster.iter().skip(1) {
                    if let Some(member_files) = ctx.entity_files.get(&member.consolidated_id) {
                        source_files.extend(seed_files.intersection(member_files).cloned());
                    }
                }
            }
            if source_files.is_empty() {
                continue;
            }

            let (first_seen, last_seen) = ctx.seen_range(&source_files);
            let mut members: Vec<String> =
                cluster.iter().map(|e| e.canonical.clone()).collect();
            members.sort();

            patterns.push(Pattern::TechStack {
                id: Uuid::new_v4(),
                members,
                evidence: Evidence {
                    count: edge_total,
                    source_files: source_files.into_iter().collect(),
                    first_seen,
                    last_seen,
                    confidence: 0.0,
                },
            });
        }

        patterns
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::correlate::test_support::{context_fixture, entity_with_files, ContextFixture};

    #[test]
    fn clusters_require_three_members_and_dense_edges() {
        let entities = vec![
            entity_with_files("Rust", EntityType::Tech, &["f1", "f2", "f3"], 9),
            entity_with_files("Tokio", EntityType::Tech, &["f1", "f2"], 6),
            entity_with_files("Postgres", EntityType::Tech, &["f1", "f2", "f3"], 5),
            entity_with_files("Cobol", EntityType::Tech, &["f9"], 1),
        ];
        let ContextFixture {
            entities,
            matrix,
            entity_files,
            files,
            file_times,
            now,
        } = context_fixture(entities, &["f1", "f2", "f3", "f9"]);
        let ctx = CorrelationContext {
            entities: &entities,
            matrix: &matrix,
            entity_files: &entity_files,
            files: &files,
            file_times: &file_times,
            now,
        };

        let patterns = TechStackDetector::new().detect(&ctx);
        assert_eq!(patterns.len(), 1);
        match &patterns[0] {
            Pattern::TechStack { members, evidence, .. } => {
                assert_eq!(
                    members,
                    &vec![
                        "Postgres".to_string(),
                        "Rust".to_string(),
                        "Tokio".to_string()
                    ]
                );
                assert!(!evidence.source_files.is_empty());
            }
            other => panic!("unexpected pattern {other:?}"),
        }
    }

    #[test]
    fn sparse_tech_mentions_form_no_stack() {
        let entities = vec![
            entity_with_files("Rust", EntityType::Tech, &["f1"], 1),
            entity_with_files("Python", EntityType::Tech, &["f2"], 1),
            entity_with_files("Java", EntityType::Tech, &["f3"], 1),
        ];
        let ContextFixture {
            entities,
            matrix,
            entity_files,
            files,
            file_times,
            now,
        } = context_fixture(entities, &["f1", "f2", "f3"]);
        let ctx = CorrelationContext {
            entities: &entities,
            matrix: &matrix,
            entity_files: &entity_files,
            files: &files,
            file_times: &file_times,
            now,
        };

        assert!(TechStackDetector::new().detect(&ctx).is_empty());
    }
}
