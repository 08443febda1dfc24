//! Pattern and discovery operations
//!
//! Patterns persist as their serialized tagged form plus the columns the
//! indexes need; each correlation run replaces the previous set.
//! Discoveries are durable rows updated in place.

use libsql::Row;
use uuid::Uuid;

use strata_core::error::{Error, Result};
use strata_core::pattern::{Discovery, DiscoveryStatus, Pattern, PatternKind};

use super::chunks::parse_uuid;
use super::files::timestamp;
use crate::CatalogStore;

impl CatalogStore {
    /// Replace the pattern set from the latest correlation run
    pub async fn replace_pattern_rows(&self, patterns: &[Pattern]) -> Result<()> {
        let conn = self.connect()?;
        conn.execute("DELETE FROM patterns", ())
            .await
            .map_err(|e| Error::Storage(format!("Failed to clear patterns: {e}")))?;

        for pattern in patterns {
            let data = serde_json::to_string(pattern).map_err(Error::Serialization)?;
            conn.execute(
                "INSERT INTO patterns (pattern_id, kind, pattern_data, confidence)
                 VALUES (?, ?, ?, ?)",
                libsql::params![
                    pattern.id().to_string(),
                    pattern.kind().as_str(),
                    data,
                    pattern.confidence(),
                ],
            )
            .await
            .map_err(|e| Error::Storage(format!("Failed to insert pattern: {e}")))?;
        }
        Ok(())
    }

    /// Scan patterns of the latest run, highest confidence first
    pub async fn iter_pattern_rows(&self) -> Result<Vec<Pattern>> {
        let conn = self.connect()?;
        let mut rows = conn
            .query(
                "SELECT pattern_data FROM patterns ORDER BY confidence DESC, pattern_id",
                (),
            )
            .await
            .map_err(|e| Error::Storage(format!("Failed to scan patterns: {e}")))?;

        let mut patterns = Vec::new();
        while let Some(row) = rows
            .next()
            .await
            .map_err(|e| Error::Storage(e.to_string()))?
        {
            let data: String = row.get(0).map_err(|e| Error::Storage(e.to_string()))?;
            patterns.push(serde_json::from_str(&data).map_err(Error::Serialization)?);
        }
        Ok(patterns)
    }

    /// Insert or replace a discovery
    pub async fn upsert_discovery_row(&self, discovery: &Discovery) -> Result<()> {
        let conn = self.connect()?;
        let source_files =
            serde_json::to_string(&discovery.source_files).map_err(Error::Serialization)?;
        conn.execute(
            r#"
            INSERT INTO discoveries (
                discovery_id, pattern_id, pattern_key, kind, title, confidence,
                status, notes, source_files, created_at, updated_at
            ) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
            ON CONFLICT(discovery_id) DO UPDATE SET
                pattern_id = excluded.pattern_id,
                title = excluded.title,
                confidence = excluded.confidence,
                status = excluded.status,
                notes = excluded.notes,
                source_files = excluded.source_files,
                updated_at = excluded.updated_at
            "#,
            libsql::params![
                discovery.discovery_id.to_string(),
                discovery.pattern_id.to_string(),
                discovery.pattern_key.clone(),
                discovery.kind.as_str(),
                discovery.title.clone(),
                discovery.confidence,
                discovery.status.as_str(),
                discovery.notes.clone(),
                source_files,
                discovery.created_at.timestamp(),
                discovery.updated_at.timestamp(),
            ],
        )
        .await
        .map_err(|e| Error::Storage(format!("Failed to upsert discovery: {e}")))?;
        Ok(())
    }

    /// Fetch one discovery
    pub async fn get_discovery_row(&self, discovery_id: Uuid) -> Result<Option<Discovery>> {
        let conn = self.connect()?;
        let mut rows = conn
            .query(
                "SELECT discovery_id, pattern_id, pattern_key, kind, title, confidence,
                        status, notes, source_files, created_at, updated_at
                 FROM discoveries WHERE discovery_id = ?",
                libsql::params![discovery_id.to_string()],
            )
            .await
            .map_err(|e| Error::Storage(format!("Failed to query discovery: {e}")))?;

        match rows
            .next()
            .await
            .map_err(|e| Error::Storage(e.to_string()))?
        {
            Some(row) => Ok(Some(row_to_discovery(&row)?)),
            None => Ok(None),
        }
    }

    /// Scan discoveries ordered by confidence, highest first
    pub async fn iter_discovery_rows(&self) -> Result<Vec<Discovery>> {
        let conn = self.connect()?;
        let mut rows = conn
            .query(
                "SELECT discovery_id, pattern_id, pattern_key, kind, title, confidence,
                        status, notes, source_files, created_at, updated_at
                 FROM discoveries ORDER BY confidence DESC, discovery_id",
                (),
            )
            .await
            .map_err(|e| Error::Storage(format!("Failed to scan discoveries: {e}")))?;

        let mut discoveries = Vec::new();
        while let Some(row) = rows
            .next()
            .await
            .map_err(|e| Error::Storage(e.to_string()))?
        {
            discoveries.push(row_to_discovery(&row)?);
        }
        Ok(discoveries)
    }
}

fn row_to_discovery(row: &Row) -> Result<Discovery> {
    let id_text: String = row.get(0).map_err(|e| Error::Storage(e.to_string()))?;
    let pattern_text: String = row.get(1).map_err(|e| Error::Storage(e.to_string()))?;
    let kind_text: String = row.get(3).map_err(|e| Error::Storage(e.to_string()))?;
    let status_text: String = row.get(6).map_err(|e| Error::Storage(e.to_string()))?;
    let sources_json: String = row.get(8).map_err(|e| Error::Storage(e.to_string()))?;

    Ok(Discovery {
        discovery_id: parse_uuid(&id_text)?,
        pattern_id: parse_uuid(&pattern_text)?,
        pattern_key: row.get(2).map_err(|e| Error::Storage(e.to_string()))?,
        kind: PatternKind::parse(&kind_text)
            .ok_or_else(|| Error::Storage(format!("unknown pattern kind '{kind_text}'")))?,
        title: row.get(4).map_err(|e| Error::Storage(e.to_string()))?,
        confidence: row.get(5).map_err(|e| Error::Storage(e.to_string()))?,
        status: DiscoveryStatus::parse(&status_text)
            .ok_or_else(|| Error::Storage(format!("unknown discovery status '{status_text}'")))?,
        notes: row.get(7).map_err(|e| Error::Storage(e.to_string()))?,
        source_files: serde_json::from_str(&sources_json).map_err(Error::Serialization)?,
        created_at: timestamp(row.get(9).map_err(|e| Error::Storage(e.to_string()))?),
        updated_at: timestamp(row.get(10).map_err(|e| Error::Storage(e.to_string()))?),
    })
}
