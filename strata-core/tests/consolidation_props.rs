//! Property tests for entity consolidation

use chrono::{Duration, TimeZone, Utc};
use proptest::prelude::*;
use std::collections::HashMap;
use uuid::Uuid;

use strata_core::correlate::consolidate::consolidate;
use strata_core::extract::normalize_form;
use strata_core::types::{EntityOccurrence, EntityType};

fn entity_type_strategy() -> impl Strategy<Value = EntityType> {
    prop_oneof![
        Just(EntityType::Person),
        Just(EntityType::Org),
        Just(EntityType::Project),
        Just(EntityType::Tech),
        Just(EntityType::Other),
    ]
}

fn occurrence_strategy() -> impl Strategy<Value = EntityOccurrence> {
    // A small surface alphabet forces collisions, which is where
    // consolidation earns its keep
    let surfaces = prop_oneof![
        Just("Mike"),
        Just("Michael"),
        Just("mike"),
        Just("Bob"),
        Just("Robert"),
        Just("Acme Corp"),
        Just("ACME Corp"),
        Just("Rust"),
        Just("rust"),
        Just("Borealis"),
    ];
    (surfaces, entity_type_strategy(), 0usize..6).prop_map(|(surface, entity_type, file)| {
        EntityOccurrence {
            surface: surface.to_string(),
            normalized: normalize_form(surface),
            entity_type,
            chunk_id: Uuid::nil(),
            file_id: format!("f{file}"),
            confidence: 0.8,
        }
    })
}

fn file_times() -> HashMap<String, chrono::DateTime<Utc>> {
    let base = Utc.with_ymd_and_hms(2024, 1, 1, 12, 0, 0).single().expect("valid time");
    (0..6)
        .map(|i| (format!("f{i}"), base + Duration::days(i)))
        .collect()
}

proptest! {
    /// Running consolidation twice over the same occurrence set yields
    /// identical canonical assignments
    #[test]
    fn consolidation_is_idempotent(occurrences in prop::collection::vec(occurrence_strategy(), 0..64)) {
        let times = file_times();
        let first = consolidate(&occurrences, &times);
        let second = consolidate(&occurrences, &times);

        let project = |entities: &[strata_core::types::ConsolidatedEntity]| {
            entities
                .iter()
                .map(|e| {
                    (
                        e.consolidated_id.clone(),
                        e.canonical.clone(),
                        e.occurrence_count,
                        e.file_count,
                        e.aliases.clone(),
                    )
                })
                .collect::<Vec<_>>()
        };
        prop_assert_eq!(project(&first), project(&second));
    }

    /// Every occurrence lands in exactly one consolidated entity
    #[test]
    fn every_occurrence_is_assigned(occurrences in prop::collection::vec(occurrence_strategy(), 1..64)) {
        let entities = consolidate(&occurrences, &file_times());
        let total: u64 = entities.iter().map(|e| e.occurrence_count).sum();
        prop_assert_eq!(total, occurrences.len() as u64);
    }
}
