//! Batch discovery scans
//!
//! `BatchExtraction` jobs walk a scope with walkdir, apply the same
//! filters as the watcher, and enqueue one extraction job per file that is
//! new or whose content identity changed. Symlinks are followed with a
//! visited (device, inode) set so loops and hardlink duplicates are
//! crossed once.

use std::collections::HashSet;
use std::os::unix::fs::MetadataExt;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, info, warn};
use walkdir::WalkDir;

use strata_core::error::Result;
use strata_core::job::{JobPayload, JobPriority};
use strata_core::types::{file_identity, FileStatus};

use crate::state::AppState;

/// Outcome of one discovery scan
#[derive(Debug, Default)]
pub struct ScanReport {
    pub seen: usize,
    pub enqueued: usize,
    pub unchanged: usize,
}

/// Walk the scope and enqueue extraction for new or changed files
///
/// # Errors
///
/// Returns queue or catalog errors; unreadable directory entries are
/// logged and skipped, per the watcher's failure contract.
pub async fn excavate(state: &Arc<AppState>, root: Option<&str>) -> Result<ScanReport> {
    let roots: Vec<PathBuf> = match root {
        Some(root) => vec![PathBuf::from(root)],
        None => state.config.watch_roots.clone(),
    };

    let mut report = ScanReport::default();
    let mut visited: HashSet<(u64, u64)> = HashSet::new();

    for root in &roots {
        scan_root(state, root, &mut visited, &mut report).await?;
    }

    info!(
        seen = report.seen,
        enqueued = report.enqueued,
        unchanged = report.unchanged,
        "Discovery scan complete"
    );
    Ok(report)
}

async fn scan_root(
    state: &Arc<AppState>,
    root: &Path,
    visited: &mut HashSet<(u64, u64)>,
    report: &mut ScanReport,
) -> Result<()> {
    let walker = WalkDir::new(root)
        .follow_links(true)
        .into_iter()
        .filter_entry(|entry| !filtered_dir(entry.path()));

    for entry in walker {
        let entry = match entry {
            Ok(entry) => entry,
            Err(e) => {
                warn!(root = %root.display(), error = %e, "Skipping unreadable entry");
                continue;
            }
        };
        if !entry.file_type().is_file() {
            continue;
        }
        let path = entry.path();
        if !allowed_extension(state, path) {
            continue;
        }

        let Ok(metadata) = entry.metadata() else {
            continue;
        };
        // One visit per inode breaks symlink loops and hardlink doubles
        if !visited.insert((metadata.dev(), metadata.ino())) {
            continue;
        }

        report.seen += 1;
        let modified_at = metadata
            .modified()
            .map(chrono::DateTime::<chrono::Utc>::from)
            .unwrap_or_else(|_| chrono::Utc::now());
        let identity = file_identity(path, metadata.len(), modified_at);

        let path_text = path.to_string_lossy();
        let known = state.catalog.get_file_by_path(&path_text).await?;
        let needs_extraction = match &known {
            Some(record) => {
                record.file_id != identity || record.status == FileStatus::Failed
            }
            None => true,
        };

        if needs_extraction {
            state
                .queue
                .enqueue(
                    JobPayload::FileExtraction {
                        path: path_text.into_owned(),
                    },
                    JobPriority::Low,
                )
                .await?;
            report.enqueued += 1;
        } else {
            report.unchanged += 1;
        }
    }

    debug!(root = %root.display(), "Root scanned");
    Ok(())
}

/// Hidden and VCS directories are never descended into
fn filtered_dir(path: &Path) -> bool {
    let Some(name) = path.file_name().and_then(|n| n.to_str()) else {
        return false;
    };
    (name.starts_with('.') && name.len() > 1) || matches!(name, ".git" | ".hg" | ".svn")
}

fn allowed_extension(state: &Arc<AppState>, path: &Path) -> bool {
    match path.extension().and_then(|e| e.to_str()) {
        Some(extension) => {
            let lowered = extension.to_lowercase();
            !state
                .config
                .watcher
                .extension_blacklist
                .iter()
                .any(|blocked| blocked == &lowered)
        }
        None => true,
    }
}
