//! Pattern and discovery types
//!
//! Patterns are disposable artifacts of a correlation run; a new run
//! replaces the previous set. Discoveries are durable: once surfaced they
//! are only ever superseded, never deleted, and user feedback locks them
//! against supersession.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::types::EntityType;

/// Pattern categories emitted by the detectors
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PatternKind {
    Expertise,
    Relationship,
    Workflow,
    TechStack,
}

impl PatternKind {
    /// Stable string form used in catalog rows and telemetry maps
    pub fn as_str(self) -> &'static str {
        match self {
            PatternKind::Expertise => "expertise",
            PatternKind::Relationship => "relationship",
            PatternKind::Workflow => "workflow",
            PatternKind::TechStack => "tech_stack",
        }
    }

    /// Parse the stable string form
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "expertise" => Some(PatternKind::Expertise),
            "relationship" => Some(PatternKind::Relationship),
            "workflow" => Some(PatternKind::Workflow),
            "tech_stack" => Some(PatternKind::TechStack),
            _ => None,
        }
    }
}

/// Evidence metrics shared by every pattern variant
///
/// `confidence` is filled by the scorer from the other four fields; the
/// detectors leave it at zero.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Evidence {
    /// Raw supporting-observation count (occurrences, pair count, series size)
    pub count: u64,
    /// Contributing file identifiers; never empty for a valid pattern
    pub source_files: Vec<String>,
    pub first_seen: DateTime<Utc>,
    pub last_seen: DateTime<Utc>,
    /// Scored confidence in [0, 1]
    pub confidence: f64,
}

/// Structural observation produced by a detector
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Pattern {
    /// Sustained activity inside one expertise domain
    Expertise {
        id: Uuid,
        domain: String,
        matched_terms: Vec<String>,
        /// Fraction of indexed files touching the domain vocabulary
        density: f64,
        evidence: Evidence,
    },
    /// A person repeatedly co-occurring with an org or project
    Relationship {
        id: Uuid,
        person: String,
        counterpart: String,
        counterpart_type: EntityType,
        evidence: Evidence,
    },
    /// A recurring file-naming or directory chronology
    Workflow {
        id: Uuid,
        label: String,
        evidence: Evidence,
    },
    /// A dense cluster of co-occurring technologies
    TechStack {
        id: Uuid,
        members: Vec<String>,
        evidence: Evidence,
    },
}

impl Pattern {
    /// Get the unique ID of this pattern
    pub fn id(&self) -> Uuid {
        match self {
            Pattern::Expertise { id, .. }
            | Pattern::Relationship { id, .. }
            | Pattern::Workflow { id, .. }
            | Pattern::TechStack { id, .. } => *id,
        }
    }

    /// Get the pattern category
    pub fn kind(&self) -> PatternKind {
        match self {
            Pattern::Expertise { .. } => PatternKind::Expertise,
            Pattern::Relationship { .. } => PatternKind::Relationship,
            Pattern::Workflow { .. } => PatternKind::Workflow,
            Pattern::TechStack { .. } => PatternKind::TechStack,
        }
    }

    /// Shared evidence metrics
    pub fn evidence(&self) -> &Evidence {
        match self {
            Pattern::Expertise { evidence, .. }
            | Pattern::Relationship { evidence, .. }
            | Pattern::Workflow { evidence, .. }
            | Pattern::TechStack { evidence, .. } => evidence,
        }
    }

    /// Mutable access for the scorer
    pub fn evidence_mut(&mut self) -> &mut Evidence {
        match self {
            Pattern::Expertise { evidence, .. }
            | Pattern::Relationship { evidence, .. }
            | Pattern::Workflow { evidence, .. }
            | Pattern::TechStack { evidence, .. } => evidence,
        }
    }

    /// Scored confidence
    pub fn confidence(&self) -> f64 {
        self.evidence().confidence
    }

    /// Contributing file identifiers
    pub fn source_files(&self) -> &[String] {
        &self.evidence().source_files
    }

    /// Stable identity of the observation across runs
    ///
    /// Two runs that detect "the same thing" produce the same key, which is
    /// what links a pattern to the discovery it previously surfaced.
    pub fn key(&self) -> String {
        match self {
            Pattern::Expertise { domain, .. } => format!("expertise:{domain}"),
            Pattern::Relationship {
                person,
                counterpart,
                counterpart_type,
                ..
            } => format!(
                "relationship:{}|{}|{}",
                person.to_lowercase(),
                counterpart.to_lowercase(),
                counterpart_type.as_str()
            ),
            Pattern::Workflow { label, .. } => format!("workflow:{}", label.to_lowercase()),
            Pattern::TechStack { members, .. } => {
                let mut sorted: Vec<String> =
                    members.iter().map(|m| m.to_lowercase()).collect();
                sorted.sort();
                format!("tech_stack:{}", sorted.join("+"))
            }
        }
    }

    /// Human-readable title used when the pattern surfaces as a discovery
    pub fn title(&self) -> String {
        match self {
            Pattern::Expertise { domain, .. } => {
                format!("Sustained expertise in {domain}")
            }
            Pattern::Relationship {
                person,
                counterpart,
                counterpart_type,
                ..
            } => match counterpart_type {
                EntityType::Org => format!("{person} works with {counterpart}"),
                _ => format!("{person} is involved in {counterpart}"),
            },
            Pattern::Workflow { label, .. } => {
                format!("Recurring workflow: {label}")
            }
            Pattern::TechStack { members, .. } => {
                format!("Technology stack: {}", members.join(", "))
            }
        }
    }
}

/// User-visible lifecycle of a discovery
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DiscoveryStatus {
    New,
    Confirmed,
    Dismissed,
    Superseded,
}

impl DiscoveryStatus {
    /// Stable string form used in catalog rows
    pub fn as_str(self) -> &'static str {
        match self {
            DiscoveryStatus::New => "new",
            DiscoveryStatus::Confirmed => "confirmed",
            DiscoveryStatus::Dismissed => "dismissed",
            DiscoveryStatus::Superseded => "superseded",
        }
    }

    /// Parse the stable string form
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "new" => Some(DiscoveryStatus::New),
            "confirmed" => Some(DiscoveryStatus::Confirmed),
            "dismissed" => Some(DiscoveryStatus::Dismissed),
            "superseded" => Some(DiscoveryStatus::Superseded),
            _ => None,
        }
    }

    /// Confirmed and dismissed discoveries are locked against supersession
    pub fn is_locked(self) -> bool {
        matches!(self, DiscoveryStatus::Confirmed | DiscoveryStatus::Dismissed)
    }
}

/// A pattern promoted past the confidence and source-diversity thresholds
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Discovery {
    pub discovery_id: Uuid,
    /// Backing pattern id from the surfacing run
    pub pattern_id: Uuid,
    /// Stable pattern key linking runs together
    pub pattern_key: String,
    pub kind: PatternKind,
    pub title: String,
    pub confidence: f64,
    pub status: DiscoveryStatus,
    pub notes: Option<String>,
    pub source_files: Vec<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Discovery {
    /// Surface a qualifying pattern as a fresh discovery
    pub fn from_pattern(pattern: &Pattern, now: DateTime<Utc>) -> Self {
        Self {
            discovery_id: Uuid::new_v4(),
            pattern_id: pattern.id(),
            pattern_key: pattern.key(),
            kind: pattern.kind(),
            title: pattern.title(),
            confidence: pattern.confidence(),
            status: DiscoveryStatus::New,
            notes: None,
            source_files: pattern.source_files().to_vec(),
            created_at: now,
            updated_at: now,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn evidence() -> Evidence {
        let now = Utc::now();
        Evidence {
            count: 4,
            source_files: vec!["f1".to_string(), "f2".to_string()],
            first_seen: now,
            last_seen: now,
            confidence: 0.8,
        }
    }

    #[test]
    fn tech_stack_key_is_order_insensitive() {
        let a = Pattern::TechStack {
            id: Uuid::new_v4(),
            members: vec!["Rust".to_string(), "Postgres".to_string()],
            evidence: evidence(),
        };
        let b = Pattern::TechStack {
            id: Uuid::new_v4(),
            members: vec!["postgres".to_string(), "rust".to_string()],
            evidence: evidence(),
        };
        assert_eq!(a.key(), b.key());
    }

    #[test]
    fn feedback_states_lock_supersession() {
        assert!(DiscoveryStatus::Confirmed.is_locked());
        assert!(DiscoveryStatus::Dismissed.is_locked());
        assert!(!DiscoveryStatus::New.is_locked());
        assert!(!DiscoveryStatus::Superseded.is_locked());
    }

    #[test]
    fn discovery_snapshots_pattern_fields() {
        let pattern = Pattern::Relationship {
            id: Uuid::new_v4(),
            person: "Alice".to_string(),
            counterpart: "Acme Corp".to_string(),
            counterpart_type: EntityType::Org,
            evidence: evidence(),
        };
        let discovery = Discovery::from_pattern(&pattern, Utc::now());
        assert_eq!(discovery.pattern_id, pattern.id());
        assert_eq!(discovery.pattern_key, pattern.key());
        assert_eq!(discovery.source_files, pattern.source_files());
        assert_eq!(discovery.status, DiscoveryStatus::New);
    }
}
