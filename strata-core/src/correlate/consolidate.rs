//! Entity consolidation
//!
//! Groups entity occurrences by normalized form, folds PERSON nicknames
//! through a fixed alias table, and elects a canonical surface per group.
//! The whole pass is a pure function of its input: running it twice over
//! the same occurrence set yields identical canonical assignments.

use chrono::{DateTime, Utc};
use std::collections::hash_map::DefaultHasher;
use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::hash::{Hash, Hasher};

use crate::types::{ConsolidatedEntity, EntityOccurrence, EntityType};

/// Nickname table applied to PERSON entities only, alias -> canonical
const PERSON_ALIASES: &[(&str, &str)] = &[
    ("mike", "michael"),
    ("mick", "michael"),
    ("bob", "robert"),
    ("rob", "robert"),
    ("bobby", "robert"),
    ("bill", "william"),
    ("will", "william"),
    ("liz", "elizabeth"),
    ("beth", "elizabeth"),
    ("betsy", "elizabeth"),
    ("dick", "richard"),
    ("rick", "richard"),
    ("rich", "richard"),
    ("jim", "james"),
    ("jimmy", "james"),
    ("tom", "thomas"),
    ("tommy", "thomas"),
    ("tony", "anthony"),
    ("steve", "steven"),
    ("dave", "david"),
    ("dan", "daniel"),
    ("danny", "daniel"),
    ("chris", "christopher"),
    ("kate", "katherine"),
    ("katie", "katherine"),
    ("kathy", "katherine"),
    ("jen", "jennifer"),
    ("jenny", "jennifer"),
    ("sam", "samuel"),
    ("alex", "alexander"),
    ("ed", "edward"),
    ("eddie", "edward"),
    ("ted", "edward"),
    ("andy", "andrew"),
    ("drew", "andrew"),
    ("matt", "matthew"),
    ("nick", "nicholas"),
    ("joe", "joseph"),
    ("joey", "joseph"),
    ("meg", "margaret"),
    ("maggie", "margaret"),
    ("peggy", "margaret"),
    ("sue", "susan"),
    ("greg", "gregory"),
    ("jack", "john"),
    ("johnny", "john"),
    ("pat", "patrick"),
    ("pete", "peter"),
];

/// Group key for a normalized form: PERSON first names fold through the
/// alias table, every other type groups on the normalized form as-is
pub fn group_key(entity_type: EntityType, normalized: &str) -> String {
    if entity_type != EntityType::Person {
        return normalized.to_string();
    }
    let mut parts = normalized.splitn(2, ' ');
    let first = parts.next().unwrap_or("");
    let rest = parts.next();
    let folded = PERSON_ALIASES
        .iter()
        .find(|(alias, _)| *alias == first)
        .map_or(first, |(_, canonical)| *canonical);
    match rest {
        Some(rest) => format!("{folded} {rest}"),
        None => folded.to_string(),
    }
}

/// Stable consolidated-entity id for a group
pub fn consolidated_id(entity_type: EntityType, key: &str) -> String {
    let mut hasher = DefaultHasher::new();
    entity_type.as_str().hash(&mut hasher);
    key.hash(&mut hasher);
    format!("{:016x}", hasher.finish())
}

/// Consolidate occurrences into canonical entities
///
/// `file_times` supplies the observation timestamp per file (its
/// modification time); an occurrence in an unknown file counts but does
/// not move the seen-range.
pub fn consolidate(
    occurrences: &[EntityOccurrence],
    file_times: &HashMap<String, DateTime<Utc>>,
) -> Vec<ConsolidatedEntity> {
    struct Group {
        entity_type: EntityType,
        // surface -> (count, earliest observation)
        surfaces: BTreeMap<String, (u64, Option<DateTime<Utc>>)>,
        occurrence_count: u64,
        files: BTreeSet<String>,
        first_seen: Option<DateTime<Utc>>,
        last_seen: Option<DateTime<Utc>>,
    }

    let mut groups: BTreeMap<(EntityType, String), Group> = BTreeMap::new();

    for occurrence in occurrences {
        let key = group_key(occurrence.entity_type, &occurrence.normalized);
        let observed = file_times.get(&occurrence.file_id).copied();

        let group = groups
            .entry((occurrence.entity_type, key))
            .or_insert_with(|| Group {
                entity_type: occurrence.entity_type,
                surfaces: BTreeMap::new(),
                occurrence_count: 0,
                files: BTreeSet::new(),
                first_seen: None,
                last_seen: None,
            });

        group.occurrence_count += 1;
        group.files.insert(occurrence.file_id.clone());

        let surface = group
            .surfaces
            .entry(occurrence.surface.clone())
            .or_insert((0, None));
        surface.0 += 1;
        if let Some(observed) = observed {
            surface.1 = Some(surface.1.map_or(observed, |t| t.min(observed)));
            group.first_seen = Some(group.first_seen.map_or(observed, |t| t.min(observed)));
            group.last_seen = Some(group.last_seen.map_or(observed, |t| t.max(observed)));
        }
    }

    let now = Utc::now();
    let mut entities: Vec<ConsolidatedEntity> = groups
        .into_iter()
        .map(|((entity_type, key), group)| {
            // Canonical surface: most frequent original form, ties broken by
            // earliest first sighting, then lexicographically
            let canonical = group
                .surfaces
                .iter()
                .max_by(|(a_surface, (a_count, a_seen)), (b_surface, (b_count, b_seen))| {
                    a_count
                        .cmp(b_count)
                        .then_with(|| earlier_wins(*a_seen, *b_seen))
                        .then_with(|| b_surface.cmp(a_surface))
                })
                .map(|(surface, _)| surface.clone())
                .unwrap_or_else(|| key.clone());

            let aliases: Vec<String> = group
                .surfaces
                .keys()
                .filter(|surface| **surface != canonical)
                .cloned()
                .collect();

            ConsolidatedEntity {
                consolidated_id: consolidated_id(entity_type, &key),
                canonical,
                entity_type,
                aliases,
                occurrence_count: group.occurrence_count,
                file_count: group.files.len() as u64,
                first_seen: group.first_seen.unwrap_or(now),
                last_seen: group.last_seen.unwrap_or(now),
            }
        })
        .collect();

    entities.sort_by(|a, b| {
        b.occurrence_count
            .cmp(&a.occurrence_count)
            .then_with(|| a.canonical.cmp(&b.canonical))
            .then_with(|| a.consolidated_id.cmp(&b.consolidated_id))
    });
    entities
}

/// Ordering for the canonical election: an earlier sighting ranks greater,
/// and a surface with no sighting at all loses
fn earlier_wins(a: Option<DateTime<Utc>>, b: Option<DateTime<Utc>>) -> std::cmp::Ordering {
    match (a, b) {
        (Some(a), Some(b)) => b.cmp(&a),
        (Some(_), None) => std::cmp::Ordering::Greater,
        (None, Some(_)) => std::cmp::Ordering::Less,
        (None, None) => std::cmp::Ordering::Equal,
    }
}
