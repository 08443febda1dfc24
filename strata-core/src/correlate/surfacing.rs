//! Discovery surfacing
//!
//! Promotes qualifying patterns to discoveries and reconciles them with the
//! discoveries of earlier runs. Demoted discoveries are superseded, never
//! deleted; user feedback (confirm or dismiss) locks a discovery against
//! supersession, and a discovery's stored confidence never decreases.

use chrono::{DateTime, Utc};
use std::collections::{HashMap, HashSet};
use tracing::debug;

use crate::pattern::{Discovery, DiscoveryStatus, Pattern};

/// Result of reconciling one run's patterns against existing discoveries
#[derive(Debug, Default)]
pub struct SurfacingOutcome {
    /// Freshly surfaced discoveries
    pub created: Vec<Discovery>,
    /// Existing discoveries re-backed by this run (confidence, pattern ref
    /// and sources refreshed)
    pub updated: Vec<Discovery>,
    /// Existing discoveries demoted to superseded
    pub superseded: Vec<Discovery>,
}

impl SurfacingOutcome {
    /// Every discovery that must be written back to the catalog
    pub fn to_persist(&self) -> impl Iterator<Item = &Discovery> {
        self.created
            .iter()
            .chain(self.updated.iter())
            .chain(self.superseded.iter())
    }
}

/// Reconcile scored patterns with the existing discovery set
pub fn surface(
    patterns: &[Pattern],
    existing: &[Discovery],
    min_confidence: f64,
    min_sources: usize,
    now: DateTime<Utc>,
) -> SurfacingOutcome {
    let qualifying: Vec<&Pattern> = patterns
        .iter()
        .filter(|p| p.confidence() >= min_confidence && p.source_files().len() >= min_sources)
        .collect();

    // The live discovery per pattern key; superseded ones stay historical
    let mut live: HashMap<&str, &Discovery> = HashMap::new();
    for discovery in existing {
        if discovery.status != DiscoveryStatus::Superseded {
            live.insert(discovery.pattern_key.as_str(), discovery);
        }
    }

    let mut outcome = SurfacingOutcome::default();
    let mut requalified: HashSet<String> = HashSet::new();

    for pattern in &qualifying {
        let key = pattern.key();
        requalified.insert(key.clone());

        match live.get(key.as_str()) {
            Some(previous) => {
                if previous.status == DiscoveryStatus::Dismissed {
                    // The user rejected this observation; leave it alone
                    continue;
                }
                let mut refreshed = (*previous).clone();
                refreshed.pattern_id = pattern.id();
                // Never weaken a surfaced confidence without supersession
                refreshed.confidence = refreshed.confidence.max(pattern.confidence());
                refreshed.source_files = pattern.source_files().to_vec();
                refreshed.updated_at = now;
                outcome.updated.push(refreshed);
            }
            None => {
                outcome.created.push(Discovery::from_pattern(pattern, now));
            }
        }
    }

    for discovery in existing {
        if discovery.status == DiscoveryStatus::New
            && !requalified.contains(&discovery.pattern_key)
        {
            let mut demoted = discovery.clone();
            demoted.status = DiscoveryStatus::Superseded;
            demoted.updated_at = now;
            outcome.superseded.push(demoted);
        }
    }

    debug!(
        created = outcome.created.len(),
        updated = outcome.updated.len(),
        superseded = outcome.superseded.len(),
        "Discovery surfacing reconciled"
    );
    outcome
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pattern::Evidence;
    use uuid::Uuid;

    fn pattern(label: &str, confidence: f64, sources: &[&str]) -> Pattern {
        let now = Utc::now();
        Pattern::Workflow {
            id: Uuid::new_v4(),
            label: label.to_string(),
            evidence: Evidence {
                count: sources.len() as u64,
                source_files: sources.iter().map(|s| (*s).to_string()).collect(),
                first_seen: now,
                last_seen: now,
                confidence,
            },
        }
    }

    #[test]
    fn thresholds_gate_promotion() {
        let patterns = vec![
            pattern("qualifies", 0.8, &["f1", "f2"]),
            pattern("too weak", 0.5, &["f1", "f2"]),
            pattern("too narrow", 0.9, &["f1"]),
        ];
        let outcome = surface(&patterns, &[], 0.7, 2, Utc::now());
        assert_eq!(outcome.created.len(), 1);
        assert!(outcome.created[0].title.contains("qualifies"));
        assert!(outcome.created[0].confidence >= 0.7);
        assert!(outcome.created[0].source_files.len() >= 2);
    }

    #[test]
    fn demoted_new_discoveries_are_superseded_not_deleted() {
        let now = Utc::now();
        let first = surface(&[pattern("fading", 0.8, &["f1", "f2"])], &[], 0.7, 2, now);
        let existing = first.created;

        let second = surface(&[], &existing, 0.7, 2, now);
        assert_eq!(second.superseded.len(), 1);
        assert_eq!(second.superseded[0].status, DiscoveryStatus::Superseded);
        assert!(second.created.is_empty());
    }

    #[test]
    fn confirmed_discoveries_survive_demotion() {
        let now = Utc::now();
        let first = surface(&[pattern("sticky", 0.8, &["f1", "f2"])], &[], 0.7, 2, now);
        let mut confirmed = first.created;
        confirmed[0].status = DiscoveryStatus::Confirmed;

        let second = surface(&[], &confirmed, 0.7, 2, now);
        assert!(second.superseded.is_empty());
        assert!(second.created.is_empty());
        assert!(second.updated.is_empty());
    }

    #[test]
    fn requalifying_pattern_refreshes_without_weakening() {
        let now = Utc::now();
        let first = surface(&[pattern("steady", 0.9, &["f1", "f2"])], &[], 0.7, 2, now);
        let existing = first.created;

        let second = surface(
            &[pattern("steady", 0.75, &["f1", "f2", "f3"])],
            &existing,
            0.7,
            2,
            now,
        );
        assert_eq!(second.updated.len(), 1);
        let refreshed = &second.updated[0];
        assert!((refreshed.confidence - 0.9).abs() < 1e-9);
        assert_eq!(refreshed.source_files.len(), 3);
        assert_eq!(refreshed.discovery_id, existing[0].discovery_id);
    }

    #[test]
    fn dismissed_discoveries_block_resurfacing() {
        let now = Utc::now();
        let first = surface(&[pattern("noise", 0.8, &["f1", "f2"])], &[], 0.7, 2, now);
        let mut dismissed = first.created;
        dismissed[0].status = DiscoveryStatus::Dismissed;

        let second = surface(
            &[pattern("noise", 0.95, &["f1", "f2"])],
            &dismissed,
            0.7,
            2,
            now,
        );
        assert!(second.created.is_empty());
        assert!(second.updated.is_empty());
        assert!(second.superseded.is_empty());
    }
}
