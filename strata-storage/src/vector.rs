//! Vector store
//!
//! A separate libSQL database under the vector-index directory, holding
//! one embedding per chunk as a raw f32 blob. Queries are a cosine scan
//! ranked in the storage layer. The whole database is derived state:
//! reconciliation can rebuild it from the catalog at any time, which is
//! why it lives apart from the catalog file.

use async_trait::async_trait;
use libsql::{Builder, Connection, Database};
use std::path::Path;
use std::sync::Arc;
use tracing::{debug, info};
use uuid::Uuid;

use strata_core::embeddings::cosine_similarity;
use strata_core::error::{Error, Result};
use strata_core::storage::{VectorBackend, VectorHit};

/// The chunk-embedding index
pub struct VectorStore {
    db: Arc<Database>,
    dimension: usize,
    // A libsql `:memory:` database is only shared across connections opened
    // from this cached handle; a fresh `db.connect()` call opens an
    // unrelated, empty in-memory database. File-backed stores don't need
    // this since the OS file is what's actually shared.
    memory_conn: Option<Connection>,
}

impl VectorStore {
    /// Open (creating if needed) the vector database at the given path
    ///
    /// # Errors
    ///
    /// Returns [`Error::Fatal`]; an unopenable vector store refuses daemon
    /// startup, though its contents are expendable.
    pub async fn open(path: &Path, dimension: usize) -> Result<Self> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)
                .map_err(|e| Error::Fatal(format!("create {}: {}", parent.display(), e)))?;
        }
        let db = Builder::new_local(path)
            .build()
            .await
            .map_err(|e| Error::Fatal(format!("open vector store {}: {}", path.display(), e)))?;

        let store = Self {
            db: Arc::new(db),
            dimension,
            memory_conn: None,
        };
        store.initialize_schema().await?;
        info!(path = %path.display(), dimension, "Vector store opened");
        Ok(store)
    }

    /// Open an in-memory vector store, for tests
    ///
    /// # Errors
    ///
    /// Returns [`Error::Fatal`] if the in-memory database cannot be built.
    pub async fn open_in_memory(dimension: usize) -> Result<Self> {
        let db = Builder::new_local(":memory:")
            .build()
            .await
            .map_err(|e| Error::Fatal(format!("open in-memory vector store: {e}")))?;
        let memory_conn = db
            .connect()
            .map_err(|e| Error::Fatal(format!("connect to in-memory vector store: {e}")))?;
        let store = Self {
            db: Arc::new(db),
            dimension,
            memory_conn: Some(memory_conn),
        };
        store.initialize_schema().await?;
        Ok(store)
    }

    async fn initialize_schema(&self) -> Result<()> {
        let conn = self.connect()?;
        conn.query("PRAGMA journal_mode = WAL", ())
            .await
            .map_err(|e| Error::Fatal(format!("set WAL journal mode: {e}")))?;
        conn.execute(
            r#"
            CREATE TABLE IF NOT EXISTS vectors (
                chunk_id TEXT PRIMARY KEY NOT NULL,
                file_id TEXT NOT NULL,
                dimension INTEGER NOT NULL,
                embedding BLOB NOT NULL
            )
            "#,
            (),
        )
        .await
        .map_err(|e| Error::Fatal(format!("create vectors table: {e}")))?;
        Ok(())
    }

    fn connect(&self) -> Result<Connection> {
        if let Some(conn) = &self.memory_conn {
            return Ok(conn.clone());
        }
        self.db
            .connect()
            .map_err(|e| Error::Storage(format!("connect to vector store: {e}")))
    }
}

/// Encode an embedding as little-endian f32 bytes
fn encode(vector: &[f32]) -> Vec<u8> {
    let mut bytes = Vec::with_capacity(vector.len() * 4);
    for value in vector {
        bytes.extend_from_slice(&value.to_le_bytes());
    }
    bytes
}

/// Decode little-endian f32 bytes back into an embedding
fn decode(bytes: &[u8]) -> Result<Vec<f32>> {
    if bytes.len() % 4 != 0 {
        return Err(Error::Consistency(format!(
            "embedding blob of {} bytes is not a whole f32 array",
            bytes.len()
        )));
    }
    Ok(bytes
        .chunks_exact(4)
        .map(|c| f32::from_le_bytes([c[0], c[1], c[2], c[3]]))
        .collect())
}

#[async_trait]
impl VectorBackend for VectorStore {
    async fn upsert(&self, chunk_id: Uuid, vector: &[f32], file_id: &str) -> Result<()> {
        if vector.len() != self.dimension {
            return Err(Error::Programmer(format!(
                "vector of dimension {} offered to a {}-dimension store",
                vector.len(),
                self.dimension
            )));
        }
        let conn = self.connect()?;
        conn.execute(
            r#"
            INSERT INTO vectors (chunk_id, file_id, dimension, embedding)
            VALUES (?, ?, ?, ?)
            ON CONFLICT(chunk_id) DO UPDATE SET
                file_id = excluded.file_id,
                dimension = excluded.dimension,
                embedding = excluded.embedding
            "#,
            libsql::params![
                chunk_id.to_string(),
                file_id,
                self.dimension as i64,
                encode(vector),
            ],
        )
        .await
        .map_err(|e| Error::Storage(format!("Failed to upsert vector: {e}")))?;
        Ok(())
    }

    async fn remove(&self, chunk_ids: &[Uuid]) -> Result<()> {
        let conn = self.connect()?;
        for chunk_id in chunk_ids {
            conn.execute(
                "DELETE FROM vectors WHERE chunk_id = ?",
                libsql::params![chunk_id.to_string()],
            )
            .await
            .map_err(|e| Error::Storage(format!("Failed to delete vector: {e}")))?;
        }
        debug!(removed = chunk_ids.len(), "Vectors removed");
        Ok(())
    }

    async fn ids(&self) -> Result<Vec<Uuid>> {
        let conn = self.connect()?;
        let mut rows = conn
            .query("SELECT chunk_id FROM vectors", ())
            .await
            .map_err(|e| Error::Storage(format!("Failed to scan vector ids: {e}")))?;

        let mut ids = Vec::new();
        while let Some(row) = rows
            .next()
            .await
            .map_err(|e| Error::Storage(e.to_string()))?
        {
            let text: String = row.get(0).map_err(|e| Error::Storage(e.to_string()))?;
            ids.push(
                Uuid::parse_str(&text)
                    .map_err(|e| Error::Storage(format!("invalid uuid '{text}': {e}")))?,
            );
        }
        Ok(ids)
    }

    async fn count(&self) -> Result<u64> {
        let conn = self.connect()?;
        let mut rows = conn
            .query("SELECT COUNT(*) FROM vectors", ())
            .await
            .map_err(|e| Error::Storage(format!("Failed to count vectors: {e}")))?;
        match rows
            .next()
            .await
            .map_err(|e| Error::Storage(e.to_string()))?
        {
            Some(row) => Ok(row.get::<i64>(0).map_err(|e| Error::Storage(e.to_string()))? as u64),
            None => Ok(0),
        }
    }

    async fn query_by_vector(&self, vector: &[f32], k: usize) -> Result<Vec<VectorHit>> {
        let conn = self.connect()?;
        let mut rows = conn
            .query("SELECT chunk_id, embedding FROM vectors", ())
            .await
            .map_err(|e| Error::Storage(format!("Failed to scan vectors: {e}")))?;

        let mut hits: Vec<VectorHit> = Vec::new();
        while let Some(row) = rows
            .next()
            .await
            .map_err(|e| Error::Storage(e.to_string()))?
        {
            let id_text: String = row.get(0).map_err(|e| Error::Storage(e.to_string()))?;
            let blob: Vec<u8> = row.get(1).map_err(|e| Error::Storage(e.to_string()))?;
            let embedding = decode(&blob)?;
            hits.push(VectorHit {
                chunk_id: Uuid::parse_str(&id_text)
                    .map_err(|e| Error::Storage(format!("invalid uuid '{id_text}': {e}")))?,
                score: cosine_similarity(vector, &embedding),
            });
        }

        hits.sort_by(|a, b| {
            b.score
                .partial_cmp(&a.score)
                .unwrap_or(std::cmp::Ordering::Equal)
        });
        hits.truncate(k);
        Ok(hits)
    }
}
