//! Chunk operations

use libsql::Row;
use uuid::Uuid;

use strata_core::error::{Error, Result};
use strata_core::types::{Chunk, ChunkKind};

use crate::CatalogStore;

impl CatalogStore {
    /// Insert chunks; every chunk must reference an existing file
    pub async fn insert_chunk_rows(&self, chunks: &[Chunk]) -> Result<()> {
        let conn = self.connect()?;
        for chunk in chunks {
            conn.execute(
                r#"
                INSERT INTO chunks (
                    chunk_id, file_id, ordinal, text, token_count,
                    start_byte, end_byte, kind
                ) VALUES (?, ?, ?, ?, ?, ?, ?, ?)
                "#,
                libsql::params![
                    chunk.chunk_id.to_string(),
                    chunk.file_id.clone(),
                    i64::from(chunk.ordinal),
                    chunk.text.clone(),
                    chunk.token_count as i64,
                    chunk.start_byte as i64,
                    chunk.end_byte as i64,
                    chunk.kind.as_str(),
                ],
            )
            .await
            .map_err(|e| integrity_error("chunk", &chunk.file_id, e))?;
        }
        Ok(())
    }

    /// Fetch one chunk
    pub async fn get_chunk_row(&self, chunk_id: Uuid) -> Result<Option<Chunk>> {
        let conn = self.connect()?;
        let mut rows = conn
            .query(
                "SELECT chunk_id, file_id, ordinal, text, token_count, start_byte, end_byte, kind
                 FROM chunks WHERE chunk_id = ?",
                libsql::params![chunk_id.to_string()],
            )
            .await
            .map_err(|e| Error::Storage(format!("Failed to query chunk: {e}")))?;

        match rows
            .next()
            .await
            .map_err(|e| Error::Storage(e.to_string()))?
        {
            Some(row) => Ok(Some(row_to_chunk(&row)?)),
            None => Ok(None),
        }
    }

    /// Scan the chunks of one file in ordinal order
    pub async fn iter_chunk_rows(&self, file_id: &str) -> Result<Vec<Chunk>> {
        let conn = self.connect()?;
        let mut rows = conn
            .query(
                "SELECT chunk_id, file_id, ordinal, text, token_count, start_byte, end_byte, kind
                 FROM chunks WHERE file_id = ? ORDER BY ordinal",
                libsql::params![file_id],
            )
            .await
            .map_err(|e| Error::Storage(format!("Failed to scan chunks: {e}")))?;

        let mut chunks = Vec::new();
        while let Some(row) = rows
            .next()
            .await
            .map_err(|e| Error::Storage(e.to_string()))?
        {
            chunks.push(row_to_chunk(&row)?);
        }
        Ok(chunks)
    }

    /// All chunk identifiers, for reconciliation
    pub async fn all_chunk_ids(&self) -> Result<Vec<Uuid>> {
        let conn = self.connect()?;
        let mut rows = conn
            .query("SELECT chunk_id FROM chunks", ())
            .await
            .map_err(|e| Error::Storage(format!("Failed to scan chunk ids: {e}")))?;

        let mut ids = Vec::new();
        while let Some(row) = rows
            .next()
            .await
            .map_err(|e| Error::Storage(e.to_string()))?
        {
            let text: String = row.get(0).map_err(|e| Error::Storage(e.to_string()))?;
            ids.push(parse_uuid(&text)?);
        }
        Ok(ids)
    }

    /// Remove the chunks, occurrences and sidecars of a file, returning the
    /// removed chunk ids so the caller can drop their vectors
    pub async fn delete_file_content_rows(&self, file_id: &str) -> Result<Vec<Uuid>> {
        let removed = self
            .iter_chunk_rows(file_id)
            .await?
            .into_iter()
            .map(|c| c.chunk_id)
            .collect::<Vec<_>>();

        let conn = self.connect()?;
        // Children first: occurrences reference chunks, chunks and sidecars
        // reference the file
        conn.execute(
            "DELETE FROM entity_occurrences WHERE file_id = ?",
            libsql::params![file_id],
        )
        .await
        .map_err(|e| Error::Storage(format!("Failed to delete occurrences: {e}")))?;
        conn.execute(
            "DELETE FROM chunks WHERE file_id = ?",
            libsql::params![file_id],
        )
        .await
        .map_err(|e| Error::Storage(format!("Failed to delete chunks: {e}")))?;
        conn.execute(
            "DELETE FROM image_sidecars WHERE file_id = ?",
            libsql::params![file_id],
        )
        .await
        .map_err(|e| Error::Storage(format!("Failed to delete image sidecars: {e}")))?;
        conn.execute(
            "DELETE FROM audio_sidecars WHERE file_id = ?",
            libsql::params![file_id],
        )
        .await
        .map_err(|e| Error::Storage(format!("Failed to delete audio sidecars: {e}")))?;

        Ok(removed)
    }
}

/// Map a write failure to the integrity contract when the foreign keys
/// rejected it
pub(crate) fn integrity_error(entity: &str, parent: &str, e: libsql::Error) -> Error {
    let message = e.to_string();
    if message.contains("FOREIGN KEY") {
        Error::Consistency(format!("{entity} references missing parent {parent}"))
    } else {
        Error::Storage(format!("Failed to insert {entity}: {message}"))
    }
}

pub(crate) fn parse_uuid(text: &str) -> Result<Uuid> {
    Uuid::parse_str(text).map_err(|e| Error::Storage(format!("invalid uuid '{text}': {e}")))
}

fn row_to_chunk(row: &Row) -> Result<Chunk> {
    let id_text: String = row.get(0).map_err(|e| Error::Storage(e.to_string()))?;
    let kind_text: String = row.get(7).map_err(|e| Error::Storage(e.to_string()))?;
    let kind = ChunkKind::parse(&kind_text)
        .ok_or_else(|| Error::Storage(format!("unknown chunk kind '{kind_text}'")))?;

    Ok(Chunk {
        chunk_id: parse_uuid(&id_text)?,
        file_id: row.get(1).map_err(|e| Error::Storage(e.to_string()))?,
        ordinal: row.get::<i64>(2).map_err(|e| Error::Storage(e.to_string()))? as u32,
        text: row.get(3).map_err(|e| Error::Storage(e.to_string()))?,
        token_count: row.get::<i64>(4).map_err(|e| Error::Storage(e.to_string()))? as usize,
        start_byte: row.get::<i64>(5).map_err(|e| Error::Storage(e.to_string()))? as usize,
        end_byte: row.get::<i64>(6).map_err(|e| Error::Storage(e.to_string()))? as usize,
        kind,
    })
}
