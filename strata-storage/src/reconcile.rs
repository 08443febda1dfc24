//! Dual-store reconciliation
//!
//! The catalog is the source of truth; the vector store is derived. On
//! startup (and on demand) this pass re-embeds chunks whose vectors are
//! missing and deletes vectors whose chunk rows are gone. Between runs,
//! encountering either condition is a consistency error, not something to
//! paper over.

use std::collections::HashSet;
use std::sync::Arc;
use tracing::{info, instrument, warn};

use strata_core::embeddings::EmbeddingProvider;
use strata_core::error::{Error, Result};
use strata_core::storage::{CatalogBackend, VectorBackend};

/// Counters from one reconciliation pass
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ReconcileReport {
    /// Chunks that lacked a vector and were re-embedded
    pub reembedded: usize,
    /// Vectors whose chunk row no longer exists
    pub orphans_removed: usize,
}

/// Re-align the vector store with the catalog
///
/// # Errors
///
/// Returns the first store or embedding error; the pass is idempotent and
/// safe to re-run after a failure.
#[instrument(skip_all)]
pub async fn reconcile(
    catalog: &Arc<dyn CatalogBackend>,
    vectors: &Arc<dyn VectorBackend>,
    embedder: &Arc<dyn EmbeddingProvider>,
) -> Result<ReconcileReport> {
    let chunk_ids: HashSet<_> = catalog.chunk_ids().await?.into_iter().collect();
    let vector_ids: HashSet<_> = vectors.ids().await?.into_iter().collect();

    let mut report = ReconcileReport::default();

    // Chunks without vectors: re-embed from the catalog text
    for chunk_id in chunk_ids.difference(&vector_ids) {
        let Some(chunk) = catalog.get_chunk(*chunk_id).await? else {
            // The id scan and the row fetch raced a writer; skip, the next
            // pass settles it
            warn!(chunk_id = %chunk_id, "Chunk disappeared during reconciliation");
            continue;
        };
        let vector = embedder
            .embed_text(&chunk.text)
            .await
            .map_err(|e| Error::ExternalUnavailable(format!("embedding provider: {e}")))?;
        vectors.upsert(chunk.chunk_id, &vector, &chunk.file_id).await?;
        report.reembedded += 1;
    }

    // Vectors without chunks: delete
    let orphans: Vec<_> = vector_ids.difference(&chunk_ids).copied().collect();
    if !orphans.is_empty() {
        vectors.remove(&orphans).await?;
        report.orphans_removed = orphans.len();
    }

    if report.reembedded > 0 || report.orphans_removed > 0 {
        info!(
            reembedded = report.reembedded,
            orphans_removed = report.orphans_removed,
            "Vector store reconciled with catalog"
        );
    }
    Ok(report)
}
