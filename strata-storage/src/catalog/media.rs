//! Multimedia side-metadata operations
//!
//! Sidecars arrive as typed records; any shape mismatch at this boundary
//! is a consistency error that propagates, never a skipped row.

use strata_core::error::Result;
use strata_core::types::{AudioSidecar, ImageSidecar};

use super::chunks::integrity_error;
use crate::CatalogStore;

impl CatalogStore {
    /// Write image side-metadata for a file
    pub async fn insert_image_sidecar_row(&self, sidecar: &ImageSidecar) -> Result<()> {
        let conn = self.connect()?;
        conn.execute(
            r#"
            INSERT INTO image_sidecars (
                file_id, width, height, camera, latitude, longitude, taken_at
            ) VALUES (?, ?, ?, ?, ?, ?, ?)
            ON CONFLICT(file_id) DO UPDATE SET
                width = excluded.width,
                height = excluded.height,
                camera = excluded.camera,
                latitude = excluded.latitude,
                longitude = excluded.longitude,
                taken_at = excluded.taken_at
            "#,
            libsql::params![
                sidecar.file_id.clone(),
                i64::from(sidecar.width),
                i64::from(sidecar.height),
                sidecar.camera.clone(),
                sidecar.latitude,
                sidecar.longitude,
                sidecar.taken_at.map(|t| t.timestamp()),
            ],
        )
        .await
        .map_err(|e| integrity_error("image sidecar", &sidecar.file_id, e))?;
        Ok(())
    }

    /// Write audio side-metadata for a file
    pub async fn insert_audio_sidecar_row(&self, sidecar: &AudioSidecar) -> Result<()> {
        let conn = self.connect()?;
        conn.execute(
            r#"
            INSERT INTO audio_sidecars (
                file_id, duration_secs, codec, sample_rate
            ) VALUES (?, ?, ?, ?)
            ON CONFLICT(file_id) DO UPDATE SET
                duration_secs = excluded.duration_secs,
                codec = excluded.codec,
                sample_rate = excluded.sample_rate
            "#,
            libsql::params![
                sidecar.file_id.clone(),
                sidecar.duration_secs,
                sidecar.codec.clone(),
                sidecar.sample_rate.map(i64::from),
            ],
        )
        .await
        .map_err(|e| integrity_error("audio sidecar", &sidecar.file_id, e))?;
        Ok(())
    }
}
