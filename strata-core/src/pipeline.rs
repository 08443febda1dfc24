//! # Extraction Pipeline
//!
//! Converts one file into persisted chunks, entities, embeddings and
//! side-metadata as a single logically atomic operation. The catalog is the
//! source of truth; vectors written here are re-alignable by the
//! reconciliation pass if the daemon dies between the two stores.

use lru::LruCache;
use std::collections::hash_map::DefaultHasher;
use std::hash::{Hash, Hasher};
use std::num::NonZeroUsize;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::{debug, error, info, instrument, warn};
use uuid::Uuid;

use crate::config::ExtractionConfig;
use crate::embeddings::{utils, EmbeddingProvider};
use crate::error::{Error, Result};
use crate::extract::{
    chunk_code, chunk_prose, EntityRecognizer, Extraction, ExtractorRegistry, RawEntity,
};
use crate::extract::normalize_form;
use crate::storage::{CatalogBackend, VectorBackend};
use crate::types::{Chunk, ChunkKind, EntityOccurrence, FileRecord, FileStatus};

/// Outcome of one pipeline run over a file
#[derive(Debug, Clone)]
pub struct ExtractionReport {
    pub file_id: String,
    pub chunks: usize,
    pub entities: usize,
    /// True when the file was already indexed under the same identity and
    /// nothing was rewritten
    pub unchanged: bool,
}

/// The per-file extraction orchestrator
pub struct ExtractionPipeline {
    registry: ExtractorRegistry,
    recognizer: Arc<dyn EntityRecognizer>,
    embedder: Arc<dyn EmbeddingProvider>,
    catalog: Arc<dyn CatalogBackend>,
    vectors: Arc<dyn VectorBackend>,
    config: ExtractionConfig,
    embed_cache: Mutex<LruCache<u64, Vec<f32>>>,
}

impl ExtractionPipeline {
    /// Wire the pipeline to its capabilities and stores
    pub fn new(
        registry: ExtractorRegistry,
        recognizer: Arc<dyn EntityRecognizer>,
        embedder: Arc<dyn EmbeddingProvider>,
        catalog: Arc<dyn CatalogBackend>,
        vectors: Arc<dyn VectorBackend>,
        config: ExtractionConfig,
    ) -> Self {
        let cache_size = NonZeroUsize::new(config.embed_cache_size.max(1))
            .unwrap_or(NonZeroUsize::MIN);
        Self {
            registry,
            recognizer,
            embedder,
            catalog,
            vectors,
            config,
            embed_cache: Mutex::new(LruCache::new(cache_size)),
        }
    }

    /// Extract, chunk, recognize, embed and persist one file
    ///
    /// # Errors
    ///
    /// Returns the error that stopped the pipeline; the file record is
    /// marked `Failed` with the same message before returning.
    #[instrument(skip(self), fields(path = %path.display()))]
    pub async fn extract_file(&self, path: &Path) -> Result<ExtractionReport> {
        let record = self.sight_file(path).await?;
        let file_id = record.file_id.clone();

        match self.run_stages(path, record).await {
            Ok(report) => Ok(report),
            Err(e) => {
                if e.is_programmer() {
                    // Shape drift between pipeline and stores must surface,
                    // not be skipped past
                    error!(error = %e, "Programmer error during extraction");
                } else {
                    warn!(error = %e, "Extraction failed");
                }
                self.catalog
                    .set_file_status(&file_id, FileStatus::Failed, Some(&e.to_string()))
                    .await?;
                Err(e)
            }
        }
    }

    /// Stat the file and upsert its record in `Extracting` state
    async fn sight_file(&self, path: &Path) -> Result<FileRecord> {
        let metadata = tokio::fs::metadata(path)
            .await
            .map_err(|e| Error::TransientIo(format!("stat {}: {}", path.display(), e)))?;
        if !metadata.is_file() {
            return Err(Error::InvalidInput(format!(
                "{} is not a regular file",
                path.display()
            )));
        }
        if metadata.len() > self.config.max_file_size_bytes {
            return Err(Error::Extraction(format!(
                "{} exceeds the {} byte extraction cap",
                path.display(),
                self.config.max_file_size_bytes
            )));
        }

        let modified_at = metadata
            .modified()
            .map(chrono::DateTime::<chrono::Utc>::from)
            .unwrap_or_else(|_| chrono::Utc::now());

        let mut record = FileRecord::new(path, metadata.len(), modified_at);
        if let Some(existing) = self.catalog.get_file_by_path(&record.path).await? {
            record.discovered_at = existing.discovered_at;
            if existing.file_id == record.file_id && existing.status == FileStatus::Indexed {
                return Ok(existing);
            }
            if existing.file_id != record.file_id {
                // The file changed, so its identity changed; content under
                // the old identity must go before the record is rewritten
                let stale = self.catalog.delete_file_content(&existing.file_id).await?;
                if !stale.is_empty() {
                    self.vectors.remove(&stale).await?;
                }
            }
        }
        record.status = FileStatus::Extracting;
        self.catalog.upsert_file(&record).await?;
        Ok(record)
    }

    async fn run_stages(&self, path: &Path, record: FileRecord) -> Result<ExtractionReport> {
        if record.status == FileStatus::Indexed {
            debug!(file_id = %record.file_id, "File unchanged, skipping");
            return Ok(ExtractionReport {
                file_id: record.file_id,
                chunks: 0,
                entities: 0,
                unchanged: true,
            });
        }

        let bytes = tokio::fs::read(path)
            .await
            .map_err(|e| Error::TransientIo(format!("read {}: {}", path.display(), e)))?;
        let extractor = self.registry.resolve(&record.extension, &bytes)?;

        // Extraction, chunking and recognition are CPU-bound; keep them off
        // the event loop
        let recognizer = Arc::clone(&self.recognizer);
        let config = self.config.clone();
        let file_id = record.file_id.clone();
        let path_buf: PathBuf = path.to_path_buf();
        let (extraction, chunks, occurrences) = tokio::task::spawn_blocking(move || {
            let extraction = extractor.extract(&bytes, &path_buf)?;
            let (chunks, occurrences) =
                build_chunks(&extraction, &file_id, recognizer.as_ref(), &config);
            Ok::<_, Error>((extraction, chunks, occurrences))
        })
        .await
        .map_err(|e| Error::Programmer(format!("extraction task panicked: {e}")))??;

        let embeddings = self.embed_chunks(&chunks).await?;

        self.persist(&record, &extraction, chunks, occurrences, embeddings)
            .await
    }

    /// Embed chunk texts, batched, with LRU memoization
    async fn embed_chunks(&self, chunks: &[Chunk]) -> Result<Vec<Vec<f32>>> {
        let mut vectors: Vec<Option<Vec<f32>>> = vec![None; chunks.len()];
        let mut misses: Vec<(usize, String)> = Vec::new();

        {
            let mut cache = self.embed_cache.lock().await;
            for (i, chunk) in chunks.iter().enumerate() {
                match cache.get(&text_key(&chunk.text)) {
                    Some(vector) => vectors[i] = Some(vector.clone()),
                    None => misses.push((i, chunk.text.clone())),
                }
            }
        }

        if !misses.is_empty() {
            let texts: Vec<String> = misses.iter().map(|(_, t)| t.clone()).collect();
            let embedded = self
                .embedder
                .embed_batch(&texts)
                .await
                .map_err(|e| Error::ExternalUnavailable(format!("embedding provider: {e}")))?;
            if embedded.len() != misses.len() {
                return Err(Error::Programmer(format!(
                    "embed_batch returned {} vectors for {} texts",
                    embedded.len(),
                    misses.len()
                )));
            }

            let mut cache = self.embed_cache.lock().await;
            for ((i, text), vector) in misses.into_iter().zip(embedded) {
                utils::validate_dimension(&vector, self.config.embedding_dimension)
                    .map_err(|e| Error::Programmer(e.to_string()))?;
                cache.put(text_key(&text), vector.clone());
                vectors[i] = Some(vector);
            }
        }

        Ok(vectors.into_iter().flatten().collect())
    }

    /// The dual-store write sequence
    async fn persist(
        &self,
        record: &FileRecord,
        extraction: &Extraction,
        chunks: Vec<Chunk>,
        occurrences: Vec<EntityOccurrence>,
        embeddings: Vec<Vec<f32>>,
    ) -> Result<ExtractionReport> {
        if embeddings.len() != chunks.len() {
            return Err(Error::Programmer(format!(
                "{} embeddings for {} chunks",
                embeddings.len(),
                chunks.len()
            )));
        }

        // Re-extraction path: clear prior content for this file first
        let stale_chunks = self.catalog.delete_file_content(&record.file_id).await?;
        if !stale_chunks.is_empty() {
            self.vectors.remove(&stale_chunks).await?;
        }

        self.catalog.insert_chunks(&chunks).await?;
        self.catalog.insert_occurrences(&occurrences).await?;

        if let Some(image) = extraction.image.clone() {
            self.catalog
                .insert_image_sidecar(&image.into_sidecar(&record.file_id))
                .await?;
        }
        if let Some(audio) = extraction.audio.clone() {
            self.catalog
                .insert_audio_sidecar(&audio.into_sidecar(&record.file_id))
                .await?;
        }

        futures::future::try_join_all(
            chunks
                .iter()
                .zip(&embeddings)
                .map(|(chunk, vector)| self.vectors.upsert(chunk.chunk_id, vector, &record.file_id)),
        )
        .await?;

        let mut indexed = record.clone();
        indexed.status = FileStatus::Indexed;
        indexed.last_error = None;
        indexed.indexed_at = Some(chrono::Utc::now());
        self.catalog.upsert_file(&indexed).await?;

        info!(
            file_id = %record.file_id,
            chunks = chunks.len(),
            entities = occurrences.len(),
            "File indexed"
        );

        Ok(ExtractionReport {
            file_id: record.file_id.clone(),
            chunks: chunks.len(),
            entities: occurrences.len(),
            unchanged: false,
        })
    }
}

/// Chunk the extracted text and recognize entities per chunk
fn build_chunks(
    extraction: &Extraction,
    file_id: &str,
    recognizer: &dyn EntityRecognizer,
    config: &ExtractionConfig,
) -> (Vec<Chunk>, Vec<EntityOccurrence>) {
    let spans = match extraction.kind {
        ChunkKind::Code => chunk_code(&extraction.text, config.code_max_tokens),
        _ => chunk_prose(
            &extraction.text,
            config.prose_min_tokens,
            config.prose_max_tokens,
        ),
    };

    let mut chunks = Vec::with_capacity(spans.len());
    let mut occurrences = Vec::new();

    for (ordinal, span) in spans.into_iter().enumerate() {
        let chunk_id = Uuid::new_v4();
        for RawEntity {
            surface,
            entity_type,
            confidence,
        } in recognizer.recognize(&span.text)
        {
            let normalized = normalize_form(&surface);
            if normalized.is_empty() {
                continue;
            }
            occurrences.push(EntityOccurrence {
                surface,
                normalized,
                entity_type,
                chunk_id,
                file_id: file_id.to_string(),
                confidence,
            });
        }
        chunks.push(Chunk {
            chunk_id,
            file_id: file_id.to_string(),
            ordinal: ordinal as u32,
            text: span.text,
            token_count: span.token_count,
            start_byte: span.start_byte,
            end_byte: span.end_byte,
            kind: span.kind,
        });
    }

    (chunks, occurrences)
}

fn text_key(text: &str) -> u64 {
    let mut hasher = DefaultHasher::new();
    text.hash(&mut hasher);
    hasher.finish()
}
