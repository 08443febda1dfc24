//! Bounded co-occurrence matrix construction
//!
//! Counts, per entity pair, the number of files in which both appear.
//! Every dimension of the construction is capped: participating entities
//! (top-K by frequency), pairs contributed per file (deterministic
//! sampling), and total pairs (hard cap with an observability counter).
//! Without these caps the construction is quadratic over the full entity
//! set and does not terminate in practical time on real corpora.

use rand::prelude::IndexedRandom;
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;
use std::collections::hash_map::DefaultHasher;
use std::collections::{BTreeMap, HashMap, HashSet};
use std::hash::{Hash, Hasher};
use tracing::{debug, info};

use crate::config::CorrelationConfig;
use crate::types::ConsolidatedEntity;

/// Files processed between progress log lines
const PROGRESS_EVERY: usize = 10_000;

/// Symmetric sparse matrix of file-level entity pair counts
#[derive(Debug, Default)]
pub struct CooccurrenceMatrix {
    counts: HashMap<(String, String), u32>,
    /// Pairs counted across all files
    pub pairs_total: u64,
    /// Pairs discarded after the hard cap was hit
    pub pairs_dropped: u64,
    /// Files that contributed at least one entity
    pub files_processed: u64,
}

impl CooccurrenceMatrix {
    /// Pair count for two entities, in either order
    pub fn get(&self, a: &str, b: &str) -> u32 {
        self.counts.get(&ordered(a, b)).copied().unwrap_or(0)
    }

    /// Iterate all non-zero pairs
    pub fn iter(&self) -> impl Iterator<Item = (&(String, String), &u32)> {
        self.counts.iter()
    }

    /// Number of distinct pairs stored
    pub fn len(&self) -> usize {
        self.counts.len()
    }

    /// True when no pair was recorded
    pub fn is_empty(&self) -> bool {
        self.counts.is_empty()
    }

    fn bump(&mut self, a: &str, b: &str) {
        *self.counts.entry(ordered(a, b)).or_insert(0) += 1;
    }
}

fn ordered(a: &str, b: &str) -> (String, String) {
    if a <= b {
        (a.to_string(), b.to_string())
    } else {
        (b.to_string(), a.to_string())
    }
}

/// Select the entities allowed to participate: top `max_entities` by
/// occurrence count, ties broken by last-seen recency then id
pub fn participating_entities(
    entities: &[ConsolidatedEntity],
    max_entities: usize,
) -> HashSet<String> {
    let mut ranked: Vec<&ConsolidatedEntity> = entities.iter().collect();
    ranked.sort_by(|a, b| {
        b.occurrence_count
            .cmp(&a.occurrence_count)
            .then_with(|| b.last_seen.cmp(&a.last_seen))
            .then_with(|| a.consolidated_id.cmp(&b.consolidated_id))
    });
    ranked
        .into_iter()
        .take(max_entities)
        .map(|e| e.consolidated_id.clone())
        .collect()
}

/// Build the matrix from per-file entity sets
///
/// `file_entities` maps file id to the deduplicated consolidated entities
/// mentioned in that file; `BTreeMap` keeps the visit order deterministic.
pub fn build(
    file_entities: &BTreeMap<String, Vec<String>>,
    allowed: &HashSet<String>,
    config: &CorrelationConfig,
) -> CooccurrenceMatrix {
    let mut matrix = CooccurrenceMatrix::default();

    for (file_id, entities) in file_entities {
        let members: Vec<&String> = entities.iter().filter(|e| allowed.contains(*e)).collect();
        if members.len() < 2 {
            continue;
        }
        matrix.files_processed += 1;

        let all_pairs = (members.len() * (members.len() - 1) / 2) as u64;
        if all_pairs <= config.max_pairs_per_file as u64 {
            let mut contributed = 0u64;
            'pairs: for i in 0..members.len() {
                for j in (i + 1)..members.len() {
                    if !count_pair(&mut matrix, members[i], members[j], config) {
                        // Hard cap hit: charge the rest of this file's pairs
                        // to the drop counter in one step
                        matrix.pairs_dropped += all_pairs - contributed - 1;
                        break 'pairs;
                    }
                    contributed += 1;
                }
            }
        } else {
            sample_pairs(&mut matrix, file_id, &members, config);
        }

        if matrix.files_processed % PROGRESS_EVERY as u64 == 0 {
            info!(
                files = matrix.files_processed,
                pairs = matrix.pairs_total,
                dropped = matrix.pairs_dropped,
                "Co-occurrence progress"
            );
        }
    }

    debug!(
        files = matrix.files_processed,
        distinct_pairs = matrix.len(),
        pairs = matrix.pairs_total,
        dropped = matrix.pairs_dropped,
        "Co-occurrence matrix built"
    );
    matrix
}

/// Record one pair unless the hard cap is hit; returns false once capped
fn count_pair(
    matrix: &mut CooccurrenceMatrix,
    a: &str,
    b: &str,
    config: &CorrelationConfig,
) -> bool {
    if matrix.pairs_total >= config.max_total_pairs {
        matrix.pairs_dropped += 1;
        return false;
    }
    matrix.bump(a, b);
    matrix.pairs_total += 1;
    true
}

/// Deterministically sample `max_pairs_per_file` distinct pairs from a file
/// whose full pair set exceeds the per-file cap
///
/// The RNG is seeded from the file id, so repeated runs over the same
/// catalog sample identical pairs.
fn sample_pairs(
    matrix: &mut CooccurrenceMatrix,
    file_id: &str,
    members: &[&String],
    config: &CorrelationConfig,
) {
    let mut rng = ChaCha8Rng::seed_from_u64(seed_for(file_id));
    let mut chosen: HashSet<(usize, usize)> = HashSet::new();
    let target = config.max_pairs_per_file;
    // Rejection sampling over the index space; the bound keeps pathological
    // duplicate streaks from spinning
    let max_attempts = target.saturating_mul(10).max(64);

    let indices: Vec<usize> = (0..members.len()).collect();
    let mut attempts = 0usize;
    while chosen.len() < target && attempts < max_attempts {
        attempts += 1;
        let mut pick = indices.choose_multiple(&mut rng, 2);
        let (Some(&i), Some(&j)) = (pick.next(), pick.next()) else {
            break;
        };
        let pair = if i < j { (i, j) } else { (j, i) };
        if !chosen.insert(pair) {
            continue;
        }
        if !count_pair(matrix, members[pair.0], members[pair.1], config) {
            return;
        }
    }
}

fn seed_for(file_id: &str) -> u64 {
    let mut hasher = DefaultHasher::new();
    file_id.hash(&mut hasher);
    hasher.finish()
}
