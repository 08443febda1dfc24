//! Integration tests for the libSQL catalog

use chrono::Utc;
use uuid::Uuid;

use strata_core::pattern::{Discovery, DiscoveryStatus, Evidence, Pattern};
use strata_core::storage::CatalogBackend;
use strata_core::types::{
    AudioSidecar, Chunk, ChunkKind, EntityOccurrence, EntityType, FileRecord, FileStatus,
    ImageSidecar,
};
use strata_storage::CatalogStore;

async fn open_catalog() -> CatalogStore {
    let store = CatalogStore::open_in_memory().await.expect("open");
    store.initialize_schema().await.expect("schema");
    store
}

fn file(path: &str) -> FileRecord {
    FileRecord::new(std::path::Path::new(path), 1200, Utc::now())
}

fn chunk(file_id: &str, ordinal: u32, text: &str) -> Chunk {
    Chunk {
        chunk_id: Uuid::new_v4(),
        file_id: file_id.to_string(),
        ordinal,
        text: text.to_string(),
        token_count: 10,
        start_byte: 0,
        end_byte: text.len(),
        kind: ChunkKind::Prose,
    }
}

#[tokio::test]
async fn file_round_trip_and_status_updates() {
    let catalog = open_catalog().await;
    let record = file("/notes/plan.md");

    catalog.upsert_file(&record).await.expect("upsert");
    let loaded = catalog
        .get_file(&record.file_id)
        .await
        .expect("get")
        .expect("exists");
    assert_eq!(loaded.path, "/notes/plan.md");
    assert_eq!(loaded.status, FileStatus::Discovered);

    catalog
        .set_file_status(&record.file_id, FileStatus::Failed, Some("boom"))
        .await
        .expect("set status");
    let failed = catalog
        .get_file_by_path("/notes/plan.md")
        .await
        .expect("get")
        .expect("exists");
    assert_eq!(failed.status, FileStatus::Failed);
    assert_eq!(failed.last_error.as_deref(), Some("boom"));
}

#[tokio::test]
async fn upsert_by_path_replaces_identity() {
    let catalog = open_catalog().await;
    let original = file("/notes/plan.md");
    catalog.upsert_file(&original).await.expect("upsert");

    let mut changed = file("/notes/plan.md");
    changed.size_bytes = 2400;
    changed.file_id = "replacement-id".to_string();
    catalog.upsert_file(&changed).await.expect("upsert");

    let all = catalog.iter_files(None).await.expect("scan");
    assert_eq!(all.len(), 1);
    assert_eq!(all[0].file_id, "replacement-id");
}

#[tokio::test]
async fn chunk_without_file_is_rejected() {
    let catalog = open_catalog().await;
    let orphan = chunk("missing-file", 0, "text");
    let result = catalog.insert_chunks(std::slice::from_ref(&orphan)).await;
    assert!(result.is_err(), "orphan chunk must be rejected");
}

#[tokio::test]
async fn occurrence_without_chunk_is_rejected() {
    let catalog = open_catalog().await;
    let record = file("/notes/plan.md");
    catalog.upsert_file(&record).await.expect("upsert");

    let occurrence = EntityOccurrence {
        surface: "Alice".to_string(),
        normalized: "alice".to_string(),
        entity_type: EntityType::Person,
        chunk_id: Uuid::new_v4(),
        file_id: record.file_id.clone(),
        confidence: 0.8,
    };
    let result = catalog.insert_occurrences(&[occurrence]).await;
    assert!(result.is_err(), "orphan occurrence must be rejected");
}

#[tokio::test]
async fn chunks_scan_in_ordinal_order_and_delete_returns_ids() {
    let catalog = open_catalog().await;
    let record = file("/notes/plan.md");
    catalog.upsert_file(&record).await.expect("upsert");

    let chunks = vec![
        chunk(&record.file_id, 1, "second"),
        chunk(&record.file_id, 0, "first"),
    ];
    catalog.insert_chunks(&chunks).await.expect("insert");

    let scanned = catalog.iter_chunks(&record.file_id).await.expect("scan");
    assert_eq!(scanned.len(), 2);
    assert_eq!(scanned[0].text, "first");
    assert_eq!(scanned[1].text, "second");

    let removed = catalog
        .delete_file_content(&record.file_id)
        .await
        .expect("delete");
    assert_eq!(removed.len(), 2);
    assert!(catalog
        .iter_chunks(&record.file_id)
        .await
        .expect("scan")
        .is_empty());
}

#[tokio::test]
async fn sidecars_round_trip_through_typed_records() {
    let catalog = open_catalog().await;
    let record = file("/photos/hike.jpg");
    catalog.upsert_file(&record).await.expect("upsert");

    let image = ImageSidecar {
        file_id: record.file_id.clone(),
        width: 4032,
        height: 3024,
        camera: Some("Pixel 9".to_string()),
        latitude: Some(46.56),
        longitude: Some(8.56),
        taken_at: Some(Utc::now()),
    };
    catalog.insert_image_sidecar(&image).await.expect("image");

    let audio = AudioSidecar {
        file_id: record.file_id.clone(),
        duration_secs: 93.5,
        codec: Some("opus".to_string()),
        sample_rate: Some(48_000),
    };
    catalog.insert_audio_sidecar(&audio).await.expect("audio");
}

#[tokio::test]
async fn sidecar_for_unknown_file_is_a_consistency_error() {
    let catalog = open_catalog().await;
    let image = ImageSidecar {
        file_id: "ghost".to_string(),
        width: 1,
        height: 1,
        camera: None,
        latitude: None,
        longitude: None,
        taken_at: None,
    };
    let result = catalog.insert_image_sidecar(&image).await;
    assert!(result.is_err());
}

#[tokio::test]
async fn patterns_replace_and_discoveries_upsert() {
    let catalog = open_catalog().await;
    let now = Utc::now();
    let pattern = Pattern::Workflow {
        id: Uuid::new_v4(),
        label: "dated report.md series".to_string(),
        evidence: Evidence {
            count: 4,
            source_files: vec!["f1".to_string(), "f2".to_string()],
            first_seen: now,
            last_seen: now,
            confidence: 0.8,
        },
    };

    catalog
        .replace_patterns(std::slice::from_ref(&pattern))
        .await
        .expect("patterns");
    let patterns = catalog.iter_patterns().await.expect("scan");
    assert_eq!(patterns.len(), 1);
    assert_eq!(patterns[0].key(), pattern.key());

    let mut discovery = Discovery::from_pattern(&pattern, now);
    catalog.upsert_discovery(&discovery).await.expect("insert");

    discovery.status = DiscoveryStatus::Confirmed;
    discovery.notes = Some("checked".to_string());
    catalog.upsert_discovery(&discovery).await.expect("update");

    let loaded = catalog
        .get_discovery(discovery.discovery_id)
        .await
        .expect("get")
        .expect("exists");
    assert_eq!(loaded.status, DiscoveryStatus::Confirmed);
    assert_eq!(loaded.notes.as_deref(), Some("checked"));

    // A second run's replace drops the old pattern set entirely
    catalog.replace_patterns(&[]).await.expect("clear");
    assert!(catalog.iter_patterns().await.expect("scan").is_empty());
    // but discoveries survive
    assert_eq!(catalog.iter_discoveries().await.expect("scan").len(), 1);
}

#[tokio::test]
async fn stats_roll_up_by_type_and_status() {
    let catalog = open_catalog().await;
    let record = file("/notes/plan.md");
    catalog.upsert_file(&record).await.expect("upsert");

    let chunks = vec![chunk(&record.file_id, 0, "Alice met Acme Corp")];
    catalog.insert_chunks(&chunks).await.expect("chunks");

    let occurrences = vec![
        EntityOccurrence {
            surface: "Alice".to_string(),
            normalized: "alice".to_string(),
            entity_type: EntityType::Person,
            chunk_id: chunks[0].chunk_id,
            file_id: record.file_id.clone(),
            confidence: 0.8,
        },
        EntityOccurrence {
            surface: "Acme Corp".to_string(),
            normalized: "acme corp".to_string(),
            entity_type: EntityType::Org,
            chunk_id: chunks[0].chunk_id,
            file_id: record.file_id.clone(),
            confidence: 0.85,
        },
    ];
    catalog
        .insert_occurrences(&occurrences)
        .await
        .expect("occurrences");

    let stats = catalog.get_stats().await.expect("stats");
    assert_eq!(stats.files_total, 1);
    assert_eq!(stats.chunks, 1);
    assert_eq!(stats.occurrences, 2);
    assert_eq!(stats.occurrences_by_type.get("person"), Some(&1));
    assert_eq!(stats.occurrences_by_type.get("org"), Some(&1));
}
