//! Entity occurrence and consolidated-entity operations

use libsql::Row;

use strata_core::error::{Error, Result};
use strata_core::types::{ConsolidatedEntity, EntityOccurrence, EntityType};

use super::chunks::{integrity_error, parse_uuid};
use super::files::timestamp;
use crate::CatalogStore;

impl CatalogStore {
    /// Insert entity occurrences; each must reference an existing chunk
    pub async fn insert_occurrence_rows(&self, occurrences: &[EntityOccurrence]) -> Result<()> {
        let conn = self.connect()?;
        for occurrence in occurrences {
            conn.execute(
                r#"
                INSERT INTO entity_occurrences (
                    surface, normalized, entity_type, chunk_id, file_id, confidence
                ) VALUES (?, ?, ?, ?, ?, ?)
                "#,
                libsql::params![
                    occurrence.surface.clone(),
                    occurrence.normalized.clone(),
                    occurrence.entity_type.as_str(),
                    occurrence.chunk_id.to_string(),
                    occurrence.file_id.clone(),
                    f64::from(occurrence.confidence),
                ],
            )
            .await
            .map_err(|e| integrity_error("occurrence", &occurrence.chunk_id.to_string(), e))?;
        }
        Ok(())
    }

    /// Scan every occurrence, the correlation engine's input
    pub async fn iter_occurrence_rows(&self) -> Result<Vec<EntityOccurrence>> {
        let conn = self.connect()?;
        let mut rows = conn
            .query(
                "SELECT surface, normalized, entity_type, chunk_id, file_id, confidence
                 FROM entity_occurrences ORDER BY id",
                (),
            )
            .await
            .map_err(|e| Error::Storage(format!("Failed to scan occurrences: {e}")))?;

        let mut occurrences = Vec::new();
        while let Some(row) = rows
            .next()
            .await
            .map_err(|e| Error::Storage(e.to_string()))?
        {
            occurrences.push(row_to_occurrence(&row)?);
        }
        Ok(occurrences)
    }

    /// Replace the consolidated-entity set from the latest correlation run
    pub async fn replace_consolidated_rows(&self, entities: &[ConsolidatedEntity]) -> Result<()> {
        let conn = self.connect()?;
        conn.execute("DELETE FROM consolidated_entities", ())
            .await
            .map_err(|e| Error::Storage(format!("Failed to clear consolidated entities: {e}")))?;

        for entity in entities {
            let aliases = serde_json::to_string(&entity.aliases).map_err(Error::Serialization)?;
            conn.execute(
                r#"
                INSERT INTO consolidated_entities (
                    consolidated_id, canonical, entity_type, aliases,
                    occurrence_count, file_count, first_seen, last_seen
                ) VALUES (?, ?, ?, ?, ?, ?, ?, ?)
                "#,
                libsql::params![
                    entity.consolidated_id.clone(),
                    entity.canonical.clone(),
                    entity.entity_type.as_str(),
                    aliases,
                    entity.occurrence_count as i64,
                    entity.file_count as i64,
                    entity.first_seen.timestamp(),
                    entity.last_seen.timestamp(),
                ],
            )
            .await
            .map_err(|e| Error::Storage(format!("Failed to insert consolidated entity: {e}")))?;
        }
        Ok(())
    }

    /// Scan consolidated entities, most frequent first
    pub async fn iter_consolidated_rows(&self) -> Result<Vec<ConsolidatedEntity>> {
        let conn = self.connect()?;
        let mut rows = conn
            .query(
                "SELECT consolidated_id, canonical, entity_type, aliases,
                        occurrence_count, file_count, first_seen, last_seen
                 FROM consolidated_entities
                 ORDER BY occurrence_count DESC, canonical",
                (),
            )
            .await
            .map_err(|e| Error::Storage(format!("Failed to scan consolidated entities: {e}")))?;

        let mut entities = Vec::new();
        while let Some(row) = rows
            .next()
            .await
            .map_err(|e| Error::Storage(e.to_string()))?
        {
            entities.push(row_to_consolidated(&row)?);
        }
        Ok(entities)
    }
}

fn parse_entity_type(text: &str) -> Result<EntityType> {
    EntityType::parse(text)
        .ok_or_else(|| Error::Storage(format!("unknown entity type '{text}'")))
}

fn row_to_occurrence(row: &Row) -> Result<EntityOccurrence> {
    let type_text: String = row.get(2).map_err(|e| Error::Storage(e.to_string()))?;
    let chunk_text: String = row.get(3).map_err(|e| Error::Storage(e.to_string()))?;

    Ok(EntityOccurrence {
        surface: row.get(0).map_err(|e| Error::Storage(e.to_string()))?,
        normalized: row.get(1).map_err(|e| Error::Storage(e.to_string()))?,
        entity_type: parse_entity_type(&type_text)?,
        chunk_id: parse_uuid(&chunk_text)?,
        file_id: row.get(4).map_err(|e| Error::Storage(e.to_string()))?,
        confidence: row.get::<f64>(5).map_err(|e| Error::Storage(e.to_string()))? as f32,
    })
}

fn row_to_consolidated(row: &Row) -> Result<ConsolidatedEntity> {
    let type_text: String = row.get(2).map_err(|e| Error::Storage(e.to_string()))?;
    let aliases_json: String = row.get(3).map_err(|e| Error::Storage(e.to_string()))?;
    let aliases: Vec<String> =
        serde_json::from_str(&aliases_json).map_err(Error::Serialization)?;

    Ok(ConsolidatedEntity {
        consolidated_id: row.get(0).map_err(|e| Error::Storage(e.to_string()))?,
        canonical: row.get(1).map_err(|e| Error::Storage(e.to_string()))?,
        entity_type: parse_entity_type(&type_text)?,
        aliases,
        occurrence_count: row.get::<i64>(4).map_err(|e| Error::Storage(e.to_string()))? as u64,
        file_count: row.get::<i64>(5).map_err(|e| Error::Storage(e.to_string()))? as u64,
        first_seen: timestamp(row.get(6).map_err(|e| Error::Storage(e.to_string()))?),
        last_seen: timestamp(row.get(7).map_err(|e| Error::Storage(e.to_string()))?),
    })
}
