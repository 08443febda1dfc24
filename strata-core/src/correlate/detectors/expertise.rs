//! Expertise detector
//!
//! A fixed multi-domain vocabulary; for each domain, the detector measures
//! what fraction of indexed files mention TECH entities from the domain's
//! term set and emits one `expertise` pattern per domain that crosses the
//! floor, scored by density times diversity.

use std::collections::BTreeSet;
use uuid::Uuid;

use super::{CorrelationContext, PatternDetector};
use crate::pattern::{Evidence, Pattern};
use crate::types::EntityType;

/// Minimum distinct files touching a domain before it registers
const MIN_DOMAIN_FILES: usize = 2;
/// Minimum fraction of indexed files touching the domain
const MIN_DENSITY: f64 = 0.02;

/// The fixed domain vocabularies
pub const DOMAIN_VOCAB: &[(&str, &[&str])] = &[
    (
        "ml",
        &[
            "pytorch", "tensorflow", "sklearn", "keras", "numpy", "pandas", "jupyter", "mlflow",
            "huggingface", "transformer", "embedding", "cuda", "onnx",
        ],
    ),
    (
        "devops",
        &[
            "docker", "kubernetes", "terraform", "ansible", "jenkins", "prometheus", "grafana",
            "helm", "nginx", "aws", "azure", "gcp",
        ],
    ),
    (
        "medical",
        &[
            "diagnosis", "clinical", "dosage", "radiology", "oncology", "cardiology", "pathology",
            "prescription", "symptom", "triage", "hipaa", "biopsy",
        ],
    ),
    (
        "legal",
        &[
            "litigation", "plaintiff", "defendant", "statute", "clause", "liability",
            "jurisdiction", "counsel", "tort", "deposition", "indemnity", "arbitration",
        ],
    ),
    (
        "finance",
        &[
            "portfolio", "ledger", "equity", "derivative", "liquidity", "arbitrage", "hedge",
            "valuation", "accrual", "amortization", "solvency", "actuarial",
        ],
    ),
    (
        "embedded",
        &[
            "firmware", "microcontroller", "rtos", "gpio", "uart", "spi", "i2c", "bootloader",
            "interrupt", "stm32", "fpga", "verilog",
        ],
    ),
];

/// Detects sustained activity inside expertise domains
pub struct ExpertiseDetector;

impl ExpertiseDetector {
    #[must_use]
    pub fn new() -> Self {
        Self
    }
}

impl Default for ExpertiseDetector {
    fn default() -> Self {
        Self::new()
    }
}

impl PatternDetector for ExpertiseDetector {
    fn name(&self) -> &'static str {
        "expertise"
    }

    fn detect(&self, ctx: &CorrelationContext<'_>) -> Vec<Pattern> {
        let indexed_files = ctx.files.len().max(1);
        let mut patterns = Vec::new();

        for (domain, terms) in DOMAIN_VOCAB {
            let mut matched_terms: Vec<String> = Vec::new();
            let mut matched_files: BTreeSet<String> = BTreeSet::new();
            let mut occurrence_total = 0u64;

            for entity in ctx.entities {
                if entity.entity_type != EntityType::Tech {
                    continue;
                }
                let canonical = entity.canonical.to_lowercase();
                if !terms.contains(&canonical.as_str()) {
                    continue;
                }
                matched_terms.push(entity.canonical.clone());
                occurrence_total += entity.occurrence_count;
                if let Some(files) = ctx.entity_files.get(&entity.consolidated_id) {
                    matched_files.extend(files.iter().cloned());
                }
            }

            let density = matched_files.len() as f64 / indexed_files as f64;
            if matched_files.len() < MIN_DOMAIN_FILES || density < MIN_DENSITY {
                continue;
            }

            let diversity = (matched_terms.len() as f64 / terms.len() as f64).min(1.0);
            let (first_seen, last_seen) = ctx.seen_range(&matched_files);
            matched_terms.sort();

            patterns.push(Pattern::Expertise {
                id: Uuid::new_v4(),
                domain: (*domain).to_string(),
                matched_terms,
                density,
                evidence: Evidence {
                    count: occurrence_total,
                    source_files: matched_files.into_iter().collect(),
                    first_seen,
                    last_seen,
                    // Structural floor: how much of the domain the corpus
                    // covers, damped by how much of the corpus it is
                    confidence: (density.sqrt() * diversity).clamp(0.0, 0.95),
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
    fn emits_one_pattern_per_crossing_domain() {
        let entities = vec![
            entity_with_files("docker", EntityType::Tech, &["f1", "f2", "f3"], 12),
            entity_with_files("kubernetes", EntityType::Tech, &["f1", "f2"], 8),
            entity_with_files("terraform", EntityType::Tech, &["f3"], 2),
            entity_with_files("ledger", EntityType::Tech, &["f4"], 1),
        ];
        let ContextFixture {
            entities,
            matrix,
            entity_files,
            files,
            file_times,
            now,
        } = context_fixture(entities, &["f1", "f2", "f3", "f4"]);
        let ctx = CorrelationContext {
            entities: &entities,
            matrix: &matrix,
            entity_files: &entity_files,
            files: &files,
            file_times: &file_times,
            now,
        };

        let patterns = ExpertiseDetector::new().detect(&ctx);
        let domains: Vec<&str> = patterns
            .iter()
            .filter_map(|p| match p {
                Pattern::Expertise { domain, .. } => Some(domain.as_str()),
                _ => None,
            })
            .collect();
        assert!(domains.contains(&"devops"));
        // finance only touches one file, below the floor
        assert!(!domains.contains(&"finance"));
    }

    #[test]
    fn source_files_cover_the_matched_set() {
        let entities = vec![
            entity_with_files("pytorch", EntityType::Tech, &["f1", "f2"], 6),
            entity_with_files("numpy", EntityType::Tech, &["f2", "f3"], 4),
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

        let patterns = ExpertiseDetector::new().detect(&ctx);
        let ml = patterns
            .iter()
            .find(|p| matches!(p, Pattern::Expertise { domain, .. } if domain == "ml"))
            .expect("ml pattern");
        assert_eq!(ml.source_files().len(), 3);
    }
}
