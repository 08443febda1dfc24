//! Entity recognition
//!
//! The recognizer is a capability: a neural NER model plugs in behind
//! [`EntityRecognizer`]. The built-in [`RegexRecognizer`] combines
//! heuristic patterns for people, organizations, dates and locations with
//! a vocabulary-based technology-term detector, which is enough to drive
//! correlation end to end without model weights.

use regex::Regex;
use std::collections::HashSet;

use crate::types::EntityType;

/// An entity mention found in a piece of text, before chunk/file attribution
#[derive(Debug, Clone, PartialEq)]
pub struct RawEntity {
    pub surface: String,
    pub entity_type: EntityType,
    pub confidence: f32,
}

/// Capability trait for named-entity recognition
pub trait EntityRecognizer: Send + Sync {
    /// Recognize entity mentions in the text
    fn recognize(&self, text: &str) -> Vec<RawEntity>;

    /// Short identifier used in logs
    fn name(&self) -> &str;
}

/// Case-fold, strip diacritics and trim punctuation from a surface form
pub fn normalize_form(surface: &str) -> String {
    surface
        .trim_matches(|c: char| !c.is_alphanumeric())
        .chars()
        .map(fold_diacritic)
        .collect::<String>()
        .to_lowercase()
}

/// Fold the common Latin diacritics to their base letter
fn fold_diacritic(c: char) -> char {
    match c {
        'á' | 'à' | 'â' | 'ä' | 'ã' | 'å' | 'Á' | 'À' | 'Â' | 'Ä' | 'Ã' | 'Å' => 'a',
        'é' | 'è' | 'ê' | 'ë' | 'É' | 'È' | 'Ê' | 'Ë' => 'e',
        'í' | 'ì' | 'î' | 'ï' | 'Í' | 'Ì' | 'Î' | 'Ï' => 'i',
        'ó' | 'ò' | 'ô' | 'ö' | 'õ' | 'Ó' | 'Ò' | 'Ô' | 'Ö' | 'Õ' => 'o',
        'ú' | 'ù' | 'û' | 'ü' | 'Ú' | 'Ù' | 'Û' | 'Ü' => 'u',
        'ñ' | 'Ñ' => 'n',
        'ç' | 'Ç' => 'c',
        other => other,
    }
}

/// Terms the technology-term detector types as TECH entities
///
/// Includes the specialist domain jargon (medical, legal, finance,
/// embedded) that the expertise detector later partitions into domains;
/// those mentions ride the same TECH channel through the catalog.
pub const TECH_TERMS: &[&str] = &[
    "rust", "python", "javascript", "typescript", "golang", "java", "kotlin", "swift", "ruby",
    "docker", "kubernetes", "terraform", "ansible", "jenkins", "github", "gitlab", "linux",
    "postgres", "postgresql", "mysql", "sqlite", "redis", "mongodb", "kafka", "rabbitmq",
    "elasticsearch", "graphql", "grpc", "react", "vue", "angular", "django", "flask", "rails",
    "tokio", "axum", "numpy", "pandas", "pytorch", "tensorflow", "sklearn", "keras", "spark",
    "hadoop", "airflow", "aws", "azure", "gcp", "lambda", "s3", "ec2", "nginx", "apache",
    "prometheus", "grafana", "webpack", "vite", "nodejs", "deno", "wasm", "webassembly",
    "jupyter", "mlflow", "huggingface", "transformer", "embedding", "cuda", "onnx", "helm",
    "diagnosis", "clinical", "dosage", "radiology", "oncology", "cardiology", "pathology",
    "prescription", "symptom", "triage", "hipaa", "biopsy",
    "litigation", "plaintiff", "defendant", "statute", "clause", "liability", "jurisdiction",
    "counsel", "tort", "deposition", "indemnity", "arbitration",
    "portfolio", "ledger", "equity", "derivative", "liquidity", "arbitrage", "hedge",
    "valuation", "accrual", "amortization", "solvency", "actuarial",
    "firmware", "microcontroller", "rtos", "gpio", "uart", "spi", "i2c", "bootloader",
    "interrupt", "stm32", "fpga", "verilog",
];

/// Words that begin sentences or phrases but never name an entity
const STOPWORDS: &[&str] = &[
    "The", "This", "That", "These", "Those", "There", "Then", "They", "When", "Where", "While",
    "What", "Which", "With", "From", "Here", "However", "After", "Before", "Because", "About",
    "Also", "And", "But", "For", "Not", "Our", "You", "Your", "His", "Her", "Its", "May", "Can",
    "Will", "Should", "Would", "Could", "Monday", "Tuesday", "Wednesday", "Thursday", "Friday",
    "Saturday", "Sunday", "January", "February", "March", "April", "June", "July", "August",
    "September", "October", "November", "December", "If", "In", "On", "At", "To", "Of", "As",
    "It", "An", "Is", "Are", "Was", "Were", "Be", "Been", "Do", "Does", "Did", "Has", "Have",
    "New", "Note", "See", "Todo", "Yes", "No",
];

/// Well-known place names recognized as LOCATION entities
const LOCATIONS: &[&str] = &[
    "london", "paris", "berlin", "madrid", "amsterdam", "zurich", "vienna", "stockholm",
    "new york", "san francisco", "seattle", "boston", "chicago", "austin", "denver", "toronto",
    "tokyo", "singapore", "sydney", "dublin", "tel aviv", "bangalore", "shanghai", "beijing",
    "germany", "france", "spain", "italy", "japan", "canada", "australia", "netherlands",
    "switzerland", "sweden", "norway", "ireland", "israel", "india", "brazil", "mexico",
];

/// Heuristic pattern-based recognizer, the built-in default
pub struct RegexRecognizer {
    capitalized: Regex,
    org_suffix: Regex,
    iso_date: Regex,
    month_date: Regex,
    project_tag: Regex,
    tech_terms: HashSet<&'static str>,
    stopwords: HashSet<&'static str>,
    locations: HashSet<&'static str>,
}

impl RegexRecognizer {
    /// Build the recognizer, compiling its patterns once
    #[must_use]
    #[allow(clippy::unwrap_used)] // patterns are literals, validated by tests
    pub fn new() -> Self {
        Self {
            capitalized: Regex::new(r"\b[A-Z][a-z]+(?:\s+[A-Z][a-z]+){0,2}\b").unwrap(),
            org_suffix: Regex::new(
                r"\b([A-Z][A-Za-z&]*(?:\s+[A-Z][A-Za-z&]*)*\s+(?:Inc|Corp|Corporation|LLC|Ltd|GmbH|AG|Labs|Systems|Technologies|Software|Foundation|University|Institute|Group|Partners))\b",
            )
            .unwrap(),
            iso_date: Regex::new(r"\b(\d{4}-\d{2}-\d{2})\b").unwrap(),
            month_date: Regex::new(
                r"\b((?:January|February|March|April|May|June|July|August|September|October|November|December)\s+\d{1,2},?\s+\d{4})\b",
            )
            .unwrap(),
            project_tag: Regex::new(r"(?i)\bproject\s+([A-Z][A-Za-z0-9_-]+)").unwrap(),
            tech_terms: TECH_TERMS.iter().copied().collect(),
            stopwords: STOPWORDS.iter().copied().collect(),
            locations: LOCATIONS.iter().copied().collect(),
        }
    }

    fn recognize_dates(&self, text: &str, out: &mut Vec<RawEntity>) {
        for m in self.iso_date.find_iter(text) {
            out.push(RawEntity {
                surface: m.as_str().to_string(),
                entity_type: EntityType::Date,
                confidence: 0.95,
            });
        }
        for caps in self.month_date.captures_iter(text) {
            if let Some(m) = caps.get(1) {
                out.push(RawEntity {
                    surface: m.as_str().to_string(),
                    entity_type: EntityType::Date,
                    confidence: 0.9,
                });
            }
        }
    }

    fn recognize_orgs(&self, text: &str, out: &mut Vec<RawEntity>) -> Vec<(usize, usize)> {
        let mut org_spans = Vec::new();
        for caps in self.org_suffix.captures_iter(text) {
            if let Some(m) = caps.get(1) {
                org_spans.push((m.start(), m.end()));
                out.push(RawEntity {
                    surface: m.as_str().to_string(),
                    entity_type: EntityType::Org,
                    confidence: 0.85,
                });
            }
        }
        org_spans
    }

    fn recognize_projects(&self, text: &str, out: &mut Vec<RawEntity>) {
        for caps in self.project_tag.captures_iter(text) {
            if let Some(m) = caps.get(1) {
                out.push(RawEntity {
                    surface: m.as_str().to_string(),
                    entity_type: EntityType::Project,
                    confidence: 0.7,
                });
            }
        }
    }

    fn recognize_tech(&self, text: &str, out: &mut Vec<RawEntity>) {
        for token in text.split(|c: char| !c.is_alphanumeric()) {
            if token.len() < 2 {
                continue;
            }
            let lowered = token.to_lowercase();
            if self.tech_terms.contains(lowered.as_str()) {
                out.push(RawEntity {
                    surface: token.to_string(),
                    entity_type: EntityType::Tech,
                    confidence: 0.9,
                });
            }
        }
    }

    /// Capitalized-phrase pass: people and locations, skipping spans
    /// already claimed as organizations
    fn recognize_names(&self, text: &str, org_spans: &[(usize, usize)], out: &mut Vec<RawEntity>) {
        for m in self.capitalized.find_iter(text) {
            if org_spans
                .iter()
                .any(|&(s, e)| m.start() >= s && m.end() <= e)
            {
                continue;
            }
            let surface = m.as_str();
            let first_word = surface.split_whitespace().next().unwrap_or("");
            if self.stopwords.contains(first_word) {
                continue;
            }
            let lowered = surface.to_lowercase();
            if self.locations.contains(lowered.as_str()) {
                out.push(RawEntity {
                    surface: surface.to_string(),
                    entity_type: EntityType::Location,
                    confidence: 0.75,
                });
                continue;
            }
            if self.tech_terms.contains(lowered.as_str()) {
                // Claimed by the tech pass already
                continue;
            }
            let words = surface.split_whitespace().count();
            out.push(RawEntity {
                surface: surface.to_string(),
                entity_type: EntityType::Person,
                confidence: if words >= 2 { 0.8 } else { 0.6 },
            });
        }
    }
}

impl Default for RegexRecognizer {
    fn default() -> Self {
        Self::new()
    }
}

impl EntityRecognizer for RegexRecognizer {
    fn recognize(&self, text: &str) -> Vec<RawEntity> {
        let mut out = Vec::new();
        self.recognize_dates(text, &mut out);
        let org_spans = self.recognize_orgs(text, &mut out);
        self.recognize_projects(text, &mut out);
        self.recognize_tech(text, &mut out);
        self.recognize_names(text, &org_spans, &mut out);
        out
    }

    fn name(&self) -> &str {
        "regex-heuristic"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn types_of(entities: &[RawEntity], surface: &str) -> Vec<EntityType> {
        entities
            .iter()
            .filter(|e| e.surface == surface)
            .map(|e| e.entity_type)
            .collect()
    }

    #[test]
    fn recognizes_person_org_and_date() {
        let recognizer = RegexRecognizer::new();
        let text = "Alice Nguyen met with Acme Corp on 2024-03-15 to review the plan.";
        let entities = recognizer.recognize(text);

        assert!(types_of(&entities, "Alice Nguyen").contains(&EntityType::Person));
        assert!(types_of(&entities, "Acme Corp").contains(&EntityType::Org));
        assert!(types_of(&entities, "2024-03-15").contains(&EntityType::Date));
    }

    #[test]
    fn org_span_is_not_also_a_person() {
        let recognizer = RegexRecognizer::new();
        let entities = recognizer.recognize("Acme Corp shipped the release.");
        assert!(types_of(&entities, "Acme Corp").contains(&EntityType::Org));
        assert!(!types_of(&entities, "Acme Corp").contains(&EntityType::Person));
    }

    #[test]
    fn recognizes_tech_terms_case_insensitively() {
        let recognizer = RegexRecognizer::new();
        let entities = recognizer.recognize("We deploy Rust services on Kubernetes with postgres.");
        let techs: Vec<&str> = entities
            .iter()
            .filter(|e| e.entity_type == EntityType::Tech)
            .map(|e| e.surface.as_str())
            .collect();
        assert!(techs.contains(&"Rust"));
        assert!(techs.contains(&"Kubernetes"));
        assert!(techs.contains(&"postgres"));
    }

    #[test]
    fn recognizes_project_references() {
        let recognizer = RegexRecognizer::new();
        let entities = recognizer.recognize("Kickoff for project Borealis is next week.");
        assert!(types_of(&entities, "Borealis").contains(&EntityType::Project));
    }

    #[test]
    fn stopword_phrases_are_not_people() {
        let recognizer = RegexRecognizer::new();
        let entities = recognizer.recognize("The Meeting went well. However Nothing was decided.");
        assert!(entities
            .iter()
            .filter(|e| e.entity_type == EntityType::Person)
            .all(|e| !e.surface.starts_with("The") && !e.surface.starts_with("However")));
    }

    #[test]
    fn normalize_folds_case_diacritics_and_punctuation() {
        assert_eq!(normalize_form("  José, "), "jose");
        assert_eq!(normalize_form("ACME-"), "acme");
        assert_eq!(normalize_form("Zoë"), "zoe");
    }
}
