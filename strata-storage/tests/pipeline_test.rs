//! End-to-end extraction against the real stores
//!
//! Drives the core pipeline over the libSQL catalog and vector store:
//! ingest, retrieval, and the no-duplicate-chunks guarantee across
//! re-extraction.

use std::sync::Arc;
use tempfile::TempDir;

use strata_core::config::ExtractionConfig;
use strata_core::embeddings::{EmbeddingProvider, HashEmbedder};
use strata_core::extract::{ExtractorRegistry, RegexRecognizer};
use strata_core::pipeline::ExtractionPipeline;
use strata_core::storage::{CatalogBackend, VectorBackend};
use strata_core::types::FileStatus;
use strata_storage::{CatalogStore, VectorStore};

const DIM: usize = 64;

struct Fixture {
    pipeline: ExtractionPipeline,
    catalog: Arc<dyn CatalogBackend>,
    vectors: Arc<dyn VectorBackend>,
    _dir: TempDir,
}

async fn fixture() -> Fixture {
    let dir = TempDir::new().expect("tempdir");
    let catalog = CatalogStore::open(&dir.path().join("catalog.db"))
        .await
        .expect("catalog");
    catalog.initialize_schema().await.expect("schema");
    let catalog: Arc<dyn CatalogBackend> = Arc::new(catalog);
    let vectors: Arc<dyn VectorBackend> = Arc::new(
        VectorStore::open(&dir.path().join("vectors").join("vectors.db"), DIM)
            .await
            .expect("vectors"),
    );

    let pipeline = ExtractionPipeline::new(
        ExtractorRegistry::with_builtins(),
        Arc::new(RegexRecognizer::new()),
        Arc::new(HashEmbedder::new(DIM)),
        Arc::clone(&catalog),
        Arc::clone(&vectors),
        ExtractionConfig {
            embedding_dimension: DIM,
            ..ExtractionConfig::default()
        },
    );

    Fixture {
        pipeline,
        catalog,
        vectors,
        _dir: dir,
    }
}

fn plan_markdown() -> String {
    let mut body = String::from("# Plan\n\n");
    for i in 0..120 {
        body.push_str(&format!(
            "Paragraph {i}: Alice reviewed the plan with Acme Corp and the team \
             agreed the rollout continues on schedule with Rust services.\n\n"
        ));
    }
    body
}

#[tokio::test]
async fn single_file_ingestion_end_to_end() {
    let f = fixture().await;
    let dir = TempDir::new().expect("tempdir");
    let path = dir.path().join("plan.md");
    std::fs::write(&path, plan_markdown()).expect("write");

    let report = f.pipeline.extract_file(&path).await.expect("extract");
    assert!(report.chunks >= 2, "got {} chunks", report.chunks);
    assert!(report.entities >= 5, "got {} entities", report.entities);

    let record = f
        .catalog
        .get_file_by_path(&path.to_string_lossy())
        .await
        .expect("get")
        .expect("exists");
    assert_eq!(record.status, FileStatus::Indexed);
    assert!(record.indexed_at.is_some());

    // Every chunk has its vector
    let chunk_ids = f.catalog.chunk_ids().await.expect("chunk ids");
    let vector_ids = f.vectors.ids().await.expect("vector ids");
    assert_eq!(chunk_ids.len(), vector_ids.len());

    // A query for "plan" hits an indexed chunk with positive score
    let query = HashEmbedder::new(DIM).embed("plan");
    let hits = f.vectors.query_by_vector(&query, 3).await.expect("query");
    assert!(!hits.is_empty());
    assert!(hits[0].score > 0.0);
    assert!(chunk_ids.contains(&hits[0].chunk_id));
}

#[tokio::test]
async fn reextraction_leaves_no_duplicate_chunks() {
    let f = fixture().await;
    let dir = TempDir::new().expect("tempdir");
    let path = dir.path().join("plan.md");
    std::fs::write(&path, plan_markdown()).expect("write");

    let first = f.pipeline.extract_file(&path).await.expect("extract");

    // Touch the file with new content; its identity changes
    let mut grown = plan_markdown();
    grown.push_str("Appendix: Bob joined the review.\n");
    std::fs::write(&path, grown).expect("write");

    let second = f.pipeline.extract_file(&path).await.expect("re-extract");
    assert!(!second.unchanged);

    let files = f.catalog.iter_files(None).await.expect("files");
    assert_eq!(files.len(), 1, "one record per path");

    let chunks = f
        .catalog
        .iter_chunks(&files[0].file_id)
        .await
        .expect("chunks");
    assert_eq!(chunks.len(), second.chunks, "no stale chunks survive");
    assert!(first.chunks > 0);

    // Vector store tracks the catalog exactly
    let vector_ids = f.vectors.ids().await.expect("vector ids");
    assert_eq!(vector_ids.len(), chunks.len());
}

#[tokio::test]
async fn unchanged_file_is_skipped() {
    let f = fixture().await;
    let dir = TempDir::new().expect("tempdir");
    let path = dir.path().join("plan.md");
    std::fs::write(&path, plan_markdown()).expect("write");

    f.pipeline.extract_file(&path).await.expect("extract");
    let again = f.pipeline.extract_file(&path).await.expect("extract");
    assert!(again.unchanged);
}

#[tokio::test]
async fn binary_file_fails_and_is_recorded() {
    let f = fixture().await;
    let dir = TempDir::new().expect("tempdir");
    let path = dir.path().join("blob.weird");
    let bytes: Vec<u8> = (0u16..2048).map(|i| (i % 251) as u8).collect();
    std::fs::write(&path, bytes).expect("write");

    let result = f.pipeline.extract_file(&path).await;
    assert!(result.is_err());

    let record = f
        .catalog
        .get_file_by_path(&path.to_string_lossy())
        .await
        .expect("get")
        .expect("exists");
    assert_eq!(record.status, FileStatus::Failed);
    assert!(record.last_error.is_some());
}
