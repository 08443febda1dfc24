//! Integration tests for dual-store reconciliation

use chrono::Utc;
use std::sync::Arc;
use uuid::Uuid;

use strata_core::embeddings::{EmbeddingProvider, HashEmbedder};
use strata_core::storage::{CatalogBackend, VectorBackend};
use strata_core::types::{Chunk, ChunkKind, FileRecord};
use strata_storage::{reconcile, CatalogStore, VectorStore};

const DIM: usize = 16;

struct Fixture {
    catalog: Arc<dyn CatalogBackend>,
    vectors: Arc<dyn VectorBackend>,
    embedder: Arc<dyn EmbeddingProvider>,
}

async fn fixture() -> Fixture {
    let catalog = CatalogStore::open_in_memory().await.expect("catalog");
    catalog.initialize_schema().await.expect("schema");
    Fixture {
        catalog: Arc::new(catalog),
        vectors: Arc::new(VectorStore::open_in_memory(DIM).await.expect("vectors")),
        embedder: Arc::new(HashEmbedder::new(DIM)),
    }
}

async fn seed_chunk(catalog: &Arc<dyn CatalogBackend>, text: &str) -> Chunk {
    let record = FileRecord::new(std::path::Path::new("/notes/plan.md"), 100, Utc::now());
    catalog.upsert_file(&record).await.expect("file");
    let chunk = Chunk {
        chunk_id: Uuid::new_v4(),
        file_id: record.file_id.clone(),
        ordinal: 0,
        text: text.to_string(),
        token_count: 4,
        start_byte: 0,
        end_byte: text.len(),
        kind: ChunkKind::Prose,
    };
    catalog
        .insert_chunks(std::slice::from_ref(&chunk))
        .await
        .expect("chunk");
    chunk
}

#[tokio::test]
async fn missing_vectors_are_reembedded() {
    let f = fixture().await;
    let chunk = seed_chunk(&f.catalog, "the quarterly plan").await;

    let report = reconcile(&f.catalog, &f.vectors, &f.embedder)
        .await
        .expect("reconcile");
    assert_eq!(report.reembedded, 1);
    assert_eq!(report.orphans_removed, 0);

    // The re-embedded vector matches a fresh embedding of the chunk text
    let query = HashEmbedder::new(DIM).embed(&chunk.text);
    let hits = f.vectors.query_by_vector(&query, 1).await.expect("query");
    assert_eq!(hits[0].chunk_id, chunk.chunk_id);
    assert!((hits[0].score - 1.0).abs() < 1e-5);
}

#[tokio::test]
async fn orphan_vectors_are_removed() {
    let f = fixture().await;
    let ghost = Uuid::new_v4();
    f.vectors
        .upsert(ghost, &HashEmbedder::new(DIM).embed("ghost"), "gone")
        .await
        .expect("upsert");

    let report = reconcile(&f.catalog, &f.vectors, &f.embedder)
        .await
        .expect("reconcile");
    assert_eq!(report.orphans_removed, 1);
    assert_eq!(f.vectors.count().await.expect("count"), 0);
}

#[tokio::test]
async fn aligned_stores_reconcile_to_a_noop() {
    let f = fixture().await;
    let chunk = seed_chunk(&f.catalog, "already aligned").await;
    f.vectors
        .upsert(
            chunk.chunk_id,
            &HashEmbedder::new(DIM).embed(&chunk.text),
            &chunk.file_id,
        )
        .await
        .expect("upsert");

    let report = reconcile(&f.catalog, &f.vectors, &f.embedder)
        .await
        .expect("reconcile");
    assert_eq!(report, strata_storage::ReconcileReport::default());

    // Idempotent: a second pass changes nothing either
    let again = reconcile(&f.catalog, &f.vectors, &f.embedder)
        .await
        .expect("reconcile");
    assert_eq!(again, strata_storage::ReconcileReport::default());
}
