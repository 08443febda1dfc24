//! # strata-storage
//!
//! The durable stores behind the strata daemon:
//!
//! - [`CatalogStore`]: the libSQL relational catalog, the source of truth
//!   for files, chunks, entities, patterns and discoveries
//! - [`VectorStore`]: a separate libSQL database holding chunk embeddings,
//!   fully rebuildable from the catalog
//! - [`RedbJobStore`]: the redb jobs database backing the durable queue
//! - [`reconcile`]: the startup pass re-aligning the vector store with the
//!   catalog
//!
//! ## Example
//!
//! ```no_run
//! use strata_storage::CatalogStore;
//!
//! # async fn example() -> anyhow::Result<()> {
//! let catalog = CatalogStore::open(std::path::Path::new("/tmp/catalog.db")).await?;
//! catalog.initialize_schema().await?;
//! # Ok(())
//! # }
//! ```

use libsql::{Builder, Connection, Database};
use std::path::Path;
use std::sync::Arc;
use tracing::info;

use strata_core::error::{Error, Result};

mod catalog;
mod jobs;
pub mod reconcile;
mod schema;
mod vector;

pub use jobs::RedbJobStore;
pub use reconcile::{reconcile, ReconcileReport};
pub use vector::VectorStore;

/// The relational catalog on libSQL
///
/// Single-writer discipline: the daemon is the only process writing this
/// database, enforced by the instance lock above this layer. Readers are
/// concurrent; WAL journaling keeps them from blocking the writer.
pub struct CatalogStore {
    db: Arc<Database>,
    // A libsql `:memory:` database is only shared across connections opened
    // from this cached handle; a fresh `db.connect()` call opens an
    // unrelated, empty in-memory database. File-backed stores don't need
    // this since the OS file is what's actually shared.
    memory_conn: Option<Connection>,
}

impl CatalogStore {
    /// Open (creating if needed) the catalog database at the given path
    ///
    /// # Errors
    ///
    /// Returns [`Error::Fatal`]: an unopenable catalog refuses daemon
    /// startup.
    pub async fn open(path: &Path) -> Result<Self> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)
                .map_err(|e| Error::Fatal(format!("create {}: {}", parent.display(), e)))?;
        }
        let db = Builder::new_local(path)
            .build()
            .await
            .map_err(|e| Error::Fatal(format!("open catalog {}: {}", path.display(), e)))?;

        let store = Self {
            db: Arc::new(db),
            memory_conn: None,
        };
        store.apply_pragmas().await?;
        info!(path = %path.display(), "Catalog opened");
        Ok(store)
    }

    /// Open an in-memory catalog, for tests
    ///
    /// # Errors
    ///
    /// Returns [`Error::Fatal`] if the in-memory database cannot be built.
    pub async fn open_in_memory() -> Result<Self> {
        let db = Builder::new_local(":memory:")
            .build()
            .await
            .map_err(|e| Error::Fatal(format!("open in-memory catalog: {e}")))?;
        let memory_conn = db
            .connect()
            .map_err(|e| Error::Fatal(format!("connect to in-memory catalog: {e}")))?;
        let store = Self {
            db: Arc::new(db),
            memory_conn: Some(memory_conn),
        };
        store.apply_pragmas().await?;
        Ok(store)
    }

    async fn apply_pragmas(&self) -> Result<()> {
        let conn = self.connect()?;
        // WAL keeps readers from blocking the single writer; foreign keys
        // are the write-time integrity contract. PRAGMAs report their value
        // back, so they go through query.
        for pragma in [
            "PRAGMA journal_mode = WAL",
            "PRAGMA busy_timeout = 5000",
            "PRAGMA foreign_keys = ON",
        ] {
            conn.query(pragma, ())
                .await
                .map_err(|e| Error::Fatal(format!("{pragma}: {e}")))?;
        }
        Ok(())
    }

    /// Create all tables and indexes; idempotent
    ///
    /// # Errors
    ///
    /// Returns [`Error::Fatal`] if any DDL statement fails.
    pub async fn initialize_schema(&self) -> Result<()> {
        let conn = self.connect()?;
        for statement in schema::ALL_STATEMENTS {
            conn.execute(statement, ())
                .await
                .map_err(|e| Error::Fatal(format!("create schema: {e}")))?;
        }
        info!("Catalog schema initialized");
        Ok(())
    }

    pub(crate) fn connect(&self) -> Result<Connection> {
        if let Some(conn) = &self.memory_conn {
            return Ok(conn.clone());
        }
        self.db
            .connect()
            .map_err(|e| Error::Storage(format!("connect to catalog: {e}")))
    }
}
