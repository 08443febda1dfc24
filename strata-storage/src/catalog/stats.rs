//! Catalog rollup counters

use std::collections::BTreeMap;

use strata_core::error::{Error, Result};
use strata_core::storage::CatalogStats;
use strata_core::types::FileStatus;

use crate::CatalogStore;

impl CatalogStore {
    /// Compute the rollup served by `/status` and `/telemetry`
    pub async fn compute_stats(&self) -> Result<CatalogStats> {
        let conn = self.connect()?;
        let mut stats = CatalogStats::default();

        stats.files_total = count(&conn, "SELECT COUNT(*) FROM files").await?;
        stats.files_indexed = count_where(
            &conn,
            "SELECT COUNT(*) FROM files WHERE status = ?",
            FileStatus::Indexed.as_str(),
        )
        .await?;
        stats.files_failed = count_where(
            &conn,
            "SELECT COUNT(*) FROM files WHERE status = ?",
            FileStatus::Failed.as_str(),
        )
        .await?;
        stats.chunks = count(&conn, "SELECT COUNT(*) FROM chunks").await?;
        stats.occurrences = count(&conn, "SELECT COUNT(*) FROM entity_occurrences").await?;
        stats.occurrences_by_type = grouped(
            &conn,
            "SELECT entity_type, COUNT(*) FROM entity_occurrences GROUP BY entity_type",
        )
        .await?;
        stats.consolidated_entities =
            count(&conn, "SELECT COUNT(*) FROM consolidated_entities").await?;
        stats.patterns = count(&conn, "SELECT COUNT(*) FROM patterns").await?;
        stats.patterns_by_kind =
            grouped(&conn, "SELECT kind, COUNT(*) FROM patterns GROUP BY kind").await?;
        stats.discoveries = count(&conn, "SELECT COUNT(*) FROM discoveries").await?;
        stats.discoveries_by_status = grouped(
            &conn,
            "SELECT status, COUNT(*) FROM discoveries GROUP BY status",
        )
        .await?;

        Ok(stats)
    }
}

async fn count(conn: &libsql::Connection, sql: &str) -> Result<u64> {
    let mut rows = conn
        .query(sql, ())
        .await
        .map_err(|e| Error::Storage(format!("Failed to count: {e}")))?;
    match rows
        .next()
        .await
        .map_err(|e| Error::Storage(e.to_string()))?
    {
        Some(row) => Ok(row.get::<i64>(0).map_err(|e| Error::Storage(e.to_string()))? as u64),
        None => Ok(0),
    }
}

async fn count_where(conn: &libsql::Connection, sql: &str, param: &str) -> Result<u64> {
    let mut rows = conn
        .query(sql, libsql::params![param])
        .await
        .map_err(|e| Error::Storage(format!("Failed to count: {e}")))?;
    match rows
        .next()
        .await
        .map_err(|e| Error::Storage(e.to_string()))?
    {
        Some(row) => Ok(row.get::<i64>(0).map_err(|e| Error::Storage(e.to_string()))? as u64),
        None => Ok(0),
    }
}

async fn grouped(conn: &libsql::Connection, sql: &str) -> Result<BTreeMap<String, u64>> {
    let mut rows = conn
        .query(sql, ())
        .await
        .map_err(|e| Error::Storage(format!("Failed to group: {e}")))?;

    let mut map = BTreeMap::new();
    while let Some(row) = rows
        .next()
        .await
        .map_err(|e| Error::Storage(e.to_string()))?
    {
        let key: String = row.get(0).map_err(|e| Error::Storage(e.to_string()))?;
        let value: i64 = row.get(1).map_err(|e| Error::Storage(e.to_string()))?;
        map.insert(key, value as u64);
    }
    Ok(map)
}
