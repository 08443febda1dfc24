//! Catalog operations, split per entity family
//!
//! Each submodule extends [`CatalogStore`] with inherent methods; the
//! [`CatalogBackend`] impl below is the thin seam the engine consumes.

mod chunks;
mod entities;
mod files;
mod media;
mod patterns;
mod stats;

use async_trait::async_trait;
use uuid::Uuid;

use strata_core::error::Result;
use strata_core::pattern::{Discovery, Pattern};
use strata_core::storage::{CatalogBackend, CatalogStats};
use strata_core::types::{
    AudioSidecar, Chunk, ConsolidatedEntity, EntityOccurrence, FileRecord, FileStatus,
    ImageSidecar,
};

use crate::CatalogStore;

#[async_trait]
impl CatalogBackend for CatalogStore {
    async fn upsert_file(&self, file: &FileRecord) -> Result<()> {
        self.upsert_file_record(file).await
    }

    async fn get_file(&self, file_id: &str) -> Result<Option<FileRecord>> {
        self.get_file_record(file_id).await
    }

    async fn get_file_by_path(&self, path: &str) -> Result<Option<FileRecord>> {
        self.get_file_record_by_path(path).await
    }

    async fn set_file_status(
        &self,
        file_id: &str,
        status: FileStatus,
        error: Option<&str>,
    ) -> Result<()> {
        self.set_file_record_status(file_id, status, error).await
    }

    async fn iter_files(&self, status: Option<FileStatus>) -> Result<Vec<FileRecord>> {
        self.iter_file_records(status).await
    }

    async fn insert_chunks(&self, chunks: &[Chunk]) -> Result<()> {
        self.insert_chunk_rows(chunks).await
    }

    async fn get_chunk(&self, chunk_id: Uuid) -> Result<Option<Chunk>> {
        self.get_chunk_row(chunk_id).await
    }

    async fn iter_chunks(&self, file_id: &str) -> Result<Vec<Chunk>> {
        self.iter_chunk_rows(file_id).await
    }

    async fn chunk_ids(&self) -> Result<Vec<Uuid>> {
        self.all_chunk_ids().await
    }

    async fn delete_file_content(&self, file_id: &str) -> Result<Vec<Uuid>> {
        self.delete_file_content_rows(file_id).await
    }

    async fn insert_occurrences(&self, occurrences: &[EntityOccurrence]) -> Result<()> {
        self.insert_occurrence_rows(occurrences).await
    }

    async fn iter_occurrences(&self) -> Result<Vec<EntityOccurrence>> {
        self.iter_occurrence_rows().await
    }

    async fn replace_consolidated(&self, entities: &[ConsolidatedEntity]) -> Result<()> {
        self.replace_consolidated_rows(entities).await
    }

    async fn iter_consolidated(&self) -> Result<Vec<ConsolidatedEntity>> {
        self.iter_consolidated_rows().await
    }

    async fn replace_patterns(&self, patterns: &[Pattern]) -> Result<()> {
        self.replace_pattern_rows(patterns).await
    }

    async fn iter_patterns(&self) -> Result<Vec<Pattern>> {
        self.iter_pattern_rows().await
    }

    async fn upsert_discovery(&self, discovery: &Discovery) -> Result<()> {
        self.upsert_discovery_row(discovery).await
    }

    async fn get_discovery(&self, discovery_id: Uuid) -> Result<Option<Discovery>> {
        self.get_discovery_row(discovery_id).await
    }

    async fn iter_discoveries(&self) -> Result<Vec<Discovery>> {
        self.iter_discovery_rows().await
    }

    async fn insert_image_sidecar(&self, sidecar: &ImageSidecar) -> Result<()> {
        self.insert_image_sidecar_row(sidecar).await
    }

    async fn insert_audio_sidecar(&self, sidecar: &AudioSidecar) -> Result<()> {
        self.insert_audio_sidecar_row(sidecar).await
    }

    async fn get_stats(&self) -> Result<CatalogStats> {
        self.compute_stats().await
    }
}
