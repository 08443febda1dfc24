//! File record operations

use chrono::{DateTime, Utc};
use libsql::Row;
use tracing::debug;

use strata_core::error::{Error, Result};
use strata_core::types::{FileRecord, FileStatus};

use crate::CatalogStore;

impl CatalogStore {
    /// Insert or replace a file record, keyed by path
    ///
    /// A changed file carries a fresh content-derived identifier; the
    /// caller must have purged the old identity's chunks before the update
    /// rewrites `file_id`, or the foreign keys will reject it.
    pub async fn upsert_file_record(&self, file: &FileRecord) -> Result<()> {
        let conn = self.connect()?;
        let changed = conn
            .execute(
                r#"
                UPDATE files SET
                    file_id = ?, extension = ?, size_bytes = ?, modified_at = ?,
                    status = ?, last_error = ?, indexed_at = ?
                WHERE path = ?
                "#,
                libsql::params![
                    file.file_id.clone(),
                    file.extension.clone(),
                    file.size_bytes as i64,
                    file.modified_at.timestamp(),
                    file.status.as_str(),
                    file.last_error.clone(),
                    file.indexed_at.map(|t| t.timestamp()),
                    file.path.clone(),
                ],
            )
            .await
            .map_err(|e| Error::Storage(format!("Failed to update file: {e}")))?;

        if changed == 0 {
            conn.execute(
                r#"
                INSERT INTO files (
                    file_id, path, extension, size_bytes, modified_at,
                    status, last_error, discovered_at, indexed_at
                ) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?)
                "#,
                libsql::params![
                    file.file_id.clone(),
                    file.path.clone(),
                    file.extension.clone(),
                    file.size_bytes as i64,
                    file.modified_at.timestamp(),
                    file.status.as_str(),
                    file.last_error.clone(),
                    file.discovered_at.timestamp(),
                    file.indexed_at.map(|t| t.timestamp()),
                ],
            )
            .await
            .map_err(|e| Error::Storage(format!("Failed to insert file: {e}")))?;
        }

        debug!(file_id = %file.file_id, status = file.status.as_str(), "File upserted");
        Ok(())
    }

    /// Fetch a file by identifier
    pub async fn get_file_record(&self, file_id: &str) -> Result<Option<FileRecord>> {
        let conn = self.connect()?;
        let mut rows = conn
            .query(
                "SELECT file_id, path, extension, size_bytes, modified_at, status,
                        last_error, discovered_at, indexed_at
                 FROM files WHERE file_id = ?",
                libsql::params![file_id],
            )
            .await
            .map_err(|e| Error::Storage(format!("Failed to query file: {e}")))?;

        match rows
            .next()
            .await
            .map_err(|e| Error::Storage(e.to_string()))?
        {
            Some(row) => Ok(Some(row_to_file(&row)?)),
            None => Ok(None),
        }
    }

    /// Fetch a file by absolute path
    pub async fn get_file_record_by_path(&self, path: &str) -> Result<Option<FileRecord>> {
        let conn = self.connect()?;
        let mut rows = conn
            .query(
                "SELECT file_id, path, extension, size_bytes, modified_at, status,
                        last_error, discovered_at, indexed_at
                 FROM files WHERE path = ?",
                libsql::params![path],
            )
            .await
            .map_err(|e| Error::Storage(format!("Failed to query file by path: {e}")))?;

        match rows
            .next()
            .await
            .map_err(|e| Error::Storage(e.to_string()))?
        {
            Some(row) => Ok(Some(row_to_file(&row)?)),
            None => Ok(None),
        }
    }

    /// Update lifecycle status and error string of a file
    pub async fn set_file_record_status(
        &self,
        file_id: &str,
        status: FileStatus,
        error: Option<&str>,
    ) -> Result<()> {
        let conn = self.connect()?;
        let changed = conn
            .execute(
                "UPDATE files SET status = ?, last_error = ? WHERE file_id = ?",
                libsql::params![status.as_str(), error, file_id],
            )
            .await
            .map_err(|e| Error::Storage(format!("Failed to update file status: {e}")))?;
        if changed == 0 {
            return Err(Error::NotFound(format!("file {file_id}")));
        }
        Ok(())
    }

    /// Scan files, optionally filtered by status
    pub async fn iter_file_records(&self, status: Option<FileStatus>) -> Result<Vec<FileRecord>> {
        let conn = self.connect()?;
        let mut rows = match status {
            Some(status) => conn
                .query(
                    "SELECT file_id, path, extension, size_bytes, modified_at, status,
                            last_error, discovered_at, indexed_at
                     FROM files WHERE status = ? ORDER BY path",
                    libsql::params![status.as_str()],
                )
                .await,
            None => {
                conn.query(
                    "SELECT file_id, path, extension, size_bytes, modified_at, status,
                            last_error, discovered_at, indexed_at
                     FROM files ORDER BY path",
                    (),
                )
                .await
            }
        }
        .map_err(|e| Error::Storage(format!("Failed to scan files: {e}")))?;

        let mut files = Vec::new();
        while let Some(row) = rows
            .next()
            .await
            .map_err(|e| Error::Storage(e.to_string()))?
        {
            files.push(row_to_file(&row)?);
        }
        Ok(files)
    }
}

/// Decode one files row
pub(crate) fn row_to_file(row: &Row) -> Result<FileRecord> {
    let status_text: String = row.get(5).map_err(|e| Error::Storage(e.to_string()))?;
    let status = FileStatus::parse(&status_text)
        .ok_or_else(|| Error::Storage(format!("unknown file status '{status_text}'")))?;

    Ok(FileRecord {
        file_id: row.get(0).map_err(|e| Error::Storage(e.to_string()))?,
        path: row.get(1).map_err(|e| Error::Storage(e.to_string()))?,
        extension: row.get(2).map_err(|e| Error::Storage(e.to_string()))?,
        size_bytes: row.get::<i64>(3).map_err(|e| Error::Storage(e.to_string()))? as u64,
        modified_at: timestamp(row.get(4).map_err(|e| Error::Storage(e.to_string()))?),
        status,
        last_error: row.get(6).map_err(|e| Error::Storage(e.to_string()))?,
        discovered_at: timestamp(row.get(7).map_err(|e| Error::Storage(e.to_string()))?),
        indexed_at: row
            .get::<Option<i64>>(8)
            .map_err(|e| Error::Storage(e.to_string()))?
            .map(timestamp),
    })
}

/// Seconds-precision timestamp decode shared by the catalog readers
pub(crate) fn timestamp(secs: i64) -> DateTime<Utc> {
    DateTime::<Utc>::from_timestamp(secs, 0).unwrap_or_default()
}
