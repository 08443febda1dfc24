//! Workflow detector
//!
//! Infers recurring work habits from file path and name regularities:
//! date-prefixed series, version-suffixed families, and date-named
//! directory chronologies. Every emitted pattern carries the detected
//! group as its source files; an empty source set here once silently
//! suppressed all workflow discoveries downstream, so the invariant is
//! checked in tests.

use chrono::{DateTime, NaiveDate, Utc};
use regex::Regex;
use std::collections::{BTreeMap, BTreeSet};
use std::path::Path;
use uuid::Uuid;

use super::{CorrelationContext, PatternDetector};
use crate::pattern::{Evidence, Pattern};

/// Minimum files forming a series
const MIN_SERIES: usize = 3;

/// Detects file-naming and directory chronologies
pub struct WorkflowDetector {
    date_prefix: Regex,
    version_suffix: Regex,
    date_dir: Regex,
}

impl WorkflowDetector {
    #[must_use]
    #[allow(clippy::unwrap_used)] // patterns are literals, validated by tests
    pub fn new() -> Self {
        Self {
            date_prefix: Regex::new(r"^(\d{4})[-_](\d{2})[-_](\d{2})[-_](.+)$").unwrap(),
            version_suffix: Regex::new(r"^(.+?)[-_]v?(\d+(?:\.\d+)*)$").unwrap(),
            date_dir: Regex::new(r"^\d{4}([-_]\d{2}){0,2}$").unwrap(),
        }
    }

    /// Date-prefixed series: `2024-01-05-report.md`, grouped by directory
    /// and residual name
    fn detect_dated_series(&self, ctx: &CorrelationContext<'_>) -> Vec<Pattern> {
        // (dir, residual stem, extension) -> [(date, file_id)]
        let mut groups: BTreeMap<(String, String, String), Vec<(NaiveDate, String)>> =
            BTreeMap::new();

        for file in ctx.files {
            let path = Path::new(&file.path);
            let Some(stem) = path.file_stem().and_then(|s| s.to_str()) else {
                continue;
            };
            let Some(caps) = self.date_prefix.captures(stem) else {
                continue;
            };
            let (Ok(year), Ok(month), Ok(day)) = (
                caps[1].parse::<i32>(),
                caps[2].parse::<u32>(),
                caps[3].parse::<u32>(),
            ) else {
                continue;
            };
            let Some(date) = NaiveDate::from_ymd_opt(year, month, day) else {
                continue;
            };
            let dir = path
                .parent()
                .map(|p| p.to_string_lossy().into_owned())
                .unwrap_or_default();
            groups
                .entry((dir, caps[4].to_string(), file.extension.clone()))
                .or_default()
                .push((date, file.file_id.clone()));
        }

        let mut patterns = Vec::new();
        for ((_dir, residual, extension), mut members) in groups {
            if members.len() < MIN_SERIES {
                continue;
            }
            members.sort();

            let first = members[0].0;
            let last = members[members.len() - 1].0;
            let label = if extension.is_empty() {
                format!("dated {residual} series")
            } else {
                format!("dated {residual}.{extension} series")
            };

            // A cleanly periodic series is strong structural evidence on its
            // own; the confidence formula alone cannot reward a short series
            let floor = if is_periodic(&members) {
                (0.5 + 0.1 * members.len() as f64).min(0.9)
            } else {
                0.0
            };

            let source_files: Vec<String> =
                members.iter().map(|(_, file_id)| file_id.clone()).collect();
            patterns.push(Pattern::Workflow {
                id: Uuid::new_v4(),
                label,
                evidence: Evidence {
                    count: members.len() as u64,
                    source_files,
                    first_seen: day_start(first),
                    last_seen: day_start(last),
                    confidence: floor,
                },
            });
        }
        patterns
    }

    /// Version-suffixed families: `design-v1.md`, `design-v2.md`
    fn detect_version_families(&self, ctx: &CorrelationContext<'_>) -> Vec<Pattern> {
        let mut groups: BTreeMap<(String, String, String), BTreeSet<String>> = BTreeMap::new();

        for file in ctx.files {
            let path = Path::new(&file.path);
            let Some(stem) = path.file_stem().and_then(|s| s.to_str()) else {
                continue;
            };
            if self.date_prefix.is_match(stem) {
                continue; // already claimed by the dated-series pass
            }
            let Some(caps) = self.version_suffix.captures(stem) else {
                continue;
            };
            let base = caps[1].to_string();
            if base.chars().all(|c| c.is_ascii_digit()) {
                continue;
            }
            let dir = path
                .parent()
                .map(|p| p.to_string_lossy().into_owned())
                .unwrap_or_default();
            groups
                .entry((dir, base, file.extension.clone()))
                .or_default()
                .insert(file.file_id.clone());
        }

        self.emit_groups(ctx, groups, |base, extension| {
            if extension.is_empty() {
                format!("versioned {base} series")
            } else {
                format!("versioned {base}.{extension} series")
            }
        })
    }

    /// Date-named directory chronology: `2024-01/summary.md`,
    /// `2024-02/summary.md`
    fn detect_directory_chronology(&self, ctx: &CorrelationContext<'_>) -> Vec<Pattern> {
        let mut groups: BTreeMap<(String, String, String), BTreeSet<String>> = BTreeMap::new();

        for file in ctx.files {
            let path = Path::new(&file.path);
            let Some(parent) = path.parent() else {
                continue;
            };
            let Some(dir_name) = parent.file_name().and_then(|s| s.to_str()) else {
                continue;
            };
            if !self.date_dir.is_match(dir_name) {
                continue;
            }
            let Some(name) = path.file_name().and_then(|s| s.to_str()) else {
                continue;
            };
            let root = parent
                .parent()
                .map(|p| p.to_string_lossy().into_owned())
                .unwrap_or_default();
            groups
                .entry((root, name.to_string(), String::new()))
                .or_default()
                .insert(file.file_id.clone());
        }

        self.emit_groups(ctx, groups, |name, _| format!("{name} directory chronology"))
    }

    fn emit_groups(
        &self,
        ctx: &CorrelationContext<'_>,
        groups: BTreeMap<(String, String, String), BTreeSet<String>>,
        label_for: impl Fn(&str, &str) -> String,
    ) -> Vec<Pattern> {
        let mut patterns = Vec::new();
        for ((_dir, base, extension), members) in groups {
            if members.len() < MIN_SERIES {
                continue;
            }
            let (first_seen, last_seen) = ctx.seen_range(&members);
            patterns.push(Pattern::Workflow {
                id: Uuid::new_v4(),
                label: label_for(&base, &extension),
                evidence: Evidence {
                    count: members.len() as u64,
                    source_files: members.into_iter().collect(),
                    first_seen,
                    last_seen,
                    confidence: 0.0,
                },
            });
        }
        patterns
    }
}

impl Default for WorkflowDetector {
    fn default() -> Self {
        Self::new()
    }
}

impl PatternDetector for WorkflowDetector {
    fn name(&self) -> &'static str {
        "workflow"
    }

    fn detect(&self, ctx: &CorrelationContext<'_>) -> Vec<Pattern> {
        let mut patterns = self.detect_dated_series(ctx);
        patterns.extend(self.detect_version_families(ctx));
        patterns.extend(self.detect_directory_chronology(ctx));
        patterns
    }
}

/// Roughly even spacing: the longest gap is at most twice the shortest
fn is_periodic(members: &[(NaiveDate, String)]) -> bool {
    if members.len() < MIN_SERIES {
        return false;
    }
    let gaps: Vec<i64> = members
        .windows(2)
        .map(|w| (w[1].0 - w[0].0).num_days())
        .collect();
    let min = gaps.iter().copied().min().unwrap_or(0);
    let max = gaps.iter().copied().max().unwrap_or(0);
    min > 0 && max <= min * 2
}

fn day_start(date: NaiveDate) -> DateTime<Utc> {
    DateTime::from_naive_utc_and_offset(date.and_hms_opt(0, 0, 0).unwrap_or_default(), Utc)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::correlate::test_support::{context_fixture_with_paths, ContextFixture};

    #[test]
    fn dated_series_emits_with_all_source_files() {
        let paths = vec![
            "/notes/2024-01-05-report.md",
            "/notes/2024-02-05-report.md",
            "/notes/2024-03-05-report.md",
            "/notes/2024-04-05-report.md",
        ];
        let ContextFixture {
            entities,
            matrix,
            entity_files,
            files,
            file_times,
            now,
        } = context_fixture_with_paths(&paths);
        let ctx = CorrelationContext {
            entities: &entities,
            matrix: &matrix,
            entity_files: &entity_files,
            files: &files,
            file_times: &file_times,
            now,
        };

        let patterns = WorkflowDetector::new().detect(&ctx);
        assert_eq!(patterns.len(), 1);
        let pattern = &patterns[0];
        assert_eq!(pattern.source_files().len(), 4);
        assert!(!pattern.source_files().is_empty());
        // Monthly cadence earns the structural floor past the threshold
        assert!(pattern.confidence() >= 0.7);
    }

    #[test]
    fn version_families_group_without_claiming_dated_files() {
        let paths = vec![
            "/designs/layout-v1.md",
            "/designs/layout-v2.md",
            "/designs/layout-v3.md",
            "/designs/2024-01-05-layout.md",
        ];
        let ContextFixture {
            entities,
            matrix,
            entity_files,
            files,
            file_times,
            now,
        } = context_fixture_with_paths(&paths);
        let ctx = CorrelationContext {
            entities: &entities,
            matrix: &matrix,
            entity_files: &entity_files,
            files: &files,
            file_times: &file_times,
            now,
        };

        let patterns = WorkflowDetector::new().detect(&ctx);
        assert_eq!(patterns.len(), 1);
        assert_eq!(patterns[0].source_files().len(), 3);
        match &patterns[0] {
            Pattern::Workflow { label, .. } => assert!(label.contains("layout")),
            other => panic!("unexpected pattern {other:?}"),
        }
    }

    #[test]
    fn directory_chronology_groups_same_name_across_dated_dirs() {
        let paths = vec![
            "/journal/2024-01/summary.md",
            "/journal/2024-02/summary.md",
            "/journal/2024-03/summary.md",
        ];
        let ContextFixture {
            entities,
            matrix,
            entity_files,
            files,
            file_times,
            now,
        } = context_fixture_with_paths(&paths);
        let ctx = CorrelationContext {
            entities: &entities,
            matrix: &matrix,
            entity_files: &entity_files,
            files: &files,
            file_times: &file_times,
            now,
        };

        let patterns = WorkflowDetector::new().detect(&ctx);
        assert_eq!(patterns.len(), 1);
        assert_eq!(patterns[0].source_files().len(), 3);
    }

    #[test]
    fn short_groups_are_ignored() {
        let paths = vec!["/notes/2024-01-05-report.md", "/notes/2024-02-05-report.md"];
        let ContextFixture {
            entities,
            matrix,
            entity_files,
            files,
            file_times,
            now,
        } = context_fixture_with_paths(&paths);
        let ctx = CorrelationContext {
            entities: &entities,
            matrix: &matrix,
            entity_files: &entity_files,
            files: &files,
            file_times: &file_times,
            now,
        };

        assert!(WorkflowDetector::new().detect(&ctx).is_empty());
    }
}
