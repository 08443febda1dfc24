//! Confidence scoring
//!
//! The published blend of evidence volume, source diversity, time span and
//! recency. A detector may pre-seed a structural confidence floor (the
//! workflow detector does, for cleanly periodic series); scoring never
//! lowers a floor, it only raises the final value to the formula when the
//! formula scores higher.

use chrono::{DateTime, Utc};

use crate::pattern::Pattern;

/// Weight of the evidence-volume component
const W_EVIDENCE: f64 = 0.35;
/// Weight of the source-diversity component
const W_DIVERSITY: f64 = 0.25;
/// Weight of the observed-time-span component
const W_TIME_SPAN: f64 = 0.20;
/// Weight of the recency component
const W_RECENCY: f64 = 0.20;

/// Compute the blended confidence for one evidence profile
pub fn confidence(
    count: u64,
    distinct_sources: usize,
    first_seen: DateTime<Utc>,
    last_seen: DateTime<Utc>,
    now: DateTime<Utc>,
) -> f64 {
    let evidence = (((count + 1) as f64).log10() / 2.0).min(1.0);
    let diversity = (distinct_sources as f64 / 5.0).min(1.0);

    let span_days = (last_seen - first_seen).num_seconds().max(0) as f64 / 86_400.0;
    let time_span = (span_days / 365.0).min(1.0);

    let stale_days = (now - last_seen).num_seconds().max(0) as f64 / 86_400.0;
    let recency = (1.0 - stale_days / 180.0).max(0.0);

    W_EVIDENCE * evidence + W_DIVERSITY * diversity + W_TIME_SPAN * time_span + W_RECENCY * recency
}

/// Score a batch of detected patterns in place
pub fn score_patterns(patterns: &mut [Pattern], now: DateTime<Utc>) {
    for pattern in patterns {
        let evidence = pattern.evidence_mut();
        let formula = confidence(
            evidence.count,
            evidence.source_files.len(),
            evidence.first_seen,
            evidence.last_seen,
            now,
        );
        evidence.confidence = formula.max(evidence.confidence).clamp(0.0, 1.0);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    #[test]
    fn fresh_diverse_long_running_evidence_scores_high() {
        let now = Utc::now();
        let score = confidence(100, 5, now - Duration::days(400), now, now);
        // evidence=1, diversity=1, time_span=1, recency=1
        assert!((score - 1.0).abs() < 1e-9);
    }

    #[test]
    fn stale_evidence_loses_the_recency_component() {
        let now = Utc::now();
        let last = now - Duration::days(181);
        let fresh = confidence(10, 3, now - Duration::days(200), now, now);
        let stale = confidence(10, 3, now - Duration::days(381), last, now);
        assert!(stale < fresh);
        // recency is exactly zero past 180 days
        let recency_part = stale - confidence(10, 3, now - Duration::days(381), last, last);
        assert!(recency_part <= 0.0);
    }

    #[test]
    fn component_weights_match_the_published_blend() {
        let now = Utc::now();
        // count=99 -> evidence exactly 1; single source -> diversity 0.2;
        // zero span -> 0; seen now -> recency 1
        let score = confidence(99, 1, now, now, now);
        let expected = 0.35 + 0.25 * 0.2 + 0.0 + 0.20;
        assert!((score - expected).abs() < 1e-9);
    }

    #[test]
    fn scoring_respects_detector_floors() {
        use crate::pattern::{Evidence, Pattern};
        let now = Utc::now();
        let mut patterns = vec![Pattern::Workflow {
            id: uuid::Uuid::new_v4(),
            label: "weekly report".to_string(),
            evidence: Evidence {
                count: 4,
                source_files: vec!["a".into(), "b".into(), "c".into(), "d".into()],
                first_seen: now - Duration::days(90),
                last_seen: now,
                confidence: 0.9,
            },
        }];
        score_patterns(&mut patterns, now);
        // The structural floor (0.9) exceeds the formula here and survives
        assert!(patterns[0].confidence() >= 0.9);
    }
}
