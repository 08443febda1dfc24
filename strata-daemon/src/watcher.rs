//! File watcher
//!
//! notify delivers events on its own thread; they cross into the runtime
//! through an unbounded channel (the only thread-safe hand-off allowed —
//! tasks are never created from the foreign thread). A debouncer task
//! settles each path for the configured window before one extraction job
//! is emitted per content change. Deletions soft-skip the file record and
//! leave its chunks in place.

use notify::{Config, Event, EventKind, RecommendedWatcher, RecursiveMode, Watcher};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::{mpsc, watch};
use tracing::{debug, info, warn};

use strata_core::error::{Error, Result};
use strata_core::job::{JobPayload, JobPriority};
use strata_core::types::FileStatus;

use crate::state::AppState;

/// How often the debouncer sweeps its pending map
const SWEEP_INTERVAL: Duration = Duration::from_millis(100);

/// A running watcher; dropping it stops event delivery
pub struct FileWatcher {
    // Kept alive for the subscription; notify unregisters on drop
    _watcher: RecommendedWatcher,
    task: tokio::task::JoinHandle<()>,
}

impl FileWatcher {
    /// Watch the configured roots and emit extraction jobs into the queue
    ///
    /// A root that fails to register logs and is skipped; the watcher runs
    /// with whatever roots remain.
    ///
    /// # Errors
    ///
    /// Returns an error only when the watcher backend itself cannot start.
    pub fn spawn(state: Arc<AppState>, mut shutdown: watch::Receiver<bool>) -> Result<Self> {
        let (tx, rx) = mpsc::unbounded_channel::<Event>();

        let mut watcher = RecommendedWatcher::new(
            move |result: notify::Result<Event>| match result {
                // The channel is the thread-safe bridge off notify's thread
                Ok(event) => {
                    let _ = tx.send(event);
                }
                Err(e) => {
                    tracing::warn!(error = %e, "File watch error");
                }
            },
            Config::default(),
        )
        .map_err(|e| Error::Fatal(format!("create file watcher: {e}")))?;

        let mut watched = 0usize;
        for root in &state.config.watch_roots {
            match watcher.watch(root, RecursiveMode::Recursive) {
                Ok(()) => {
                    watched += 1;
                    info!(root = %root.display(), "Watching root");
                }
                Err(e) => {
                    warn!(root = %root.display(), error = %e, "Failed to watch root, skipping");
                }
            }
        }
        info!(watched, "File watcher started");

        let task = tokio::spawn(async move {
            debounce_loop(state, rx, &mut shutdown).await;
        });

        Ok(Self {
            _watcher: watcher,
            task,
        })
    }

    /// Wait for the debouncer to drain after shutdown
    pub async fn join(self) {
        let _ = self.task.await;
    }
}

/// What a settled path should turn into
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum PendingAction {
    Extract,
    SoftDelete,
}

async fn debounce_loop(
    state: Arc<AppState>,
    mut rx: mpsc::UnboundedReceiver<Event>,
    shutdown: &mut watch::Receiver<bool>,
) {
    let debounce = Duration::from_millis(state.config.watcher.debounce_ms);
    let mut pending: HashMap<PathBuf, (PendingAction, Instant)> = HashMap::new();
    let mut sweep = tokio::time::interval(SWEEP_INTERVAL);

    loop {
        tokio::select! {
            _ = shutdown.changed() => {
                debug!("Watcher debouncer stopping");
                break;
            }
            event = rx.recv() => {
                let Some(event) = event else { break };
                register(&state, &mut pending, event);
            }
            _ = sweep.tick() => {
                flush_settled(&state, &mut pending, debounce).await;
            }
        }
    }
}

/// Fold an event into the pending map
fn register(
    state: &AppState,
    pending: &mut HashMap<PathBuf, (PendingAction, Instant)>,
    event: Event,
) {
    let action = match event.kind {
        EventKind::Create(_) | EventKind::Modify(_) => PendingAction::Extract,
        EventKind::Remove(_) => PendingAction::SoftDelete,
        _ => return,
    };

    for path in event.paths {
        if !relevant(state, &path) {
            continue;
        }
        // A delete after edits wins; further edits reset the clock
        pending.insert(path, (action, Instant::now()));
    }
}

/// Filters: hidden directories, VCS metadata, the state directory itself,
/// and the extension blacklist
fn relevant(state: &AppState, path: &Path) -> bool {
    if path.starts_with(&state.config.state_dir) {
        return false;
    }
    for component in path.components() {
        let text = component.as_os_str().to_string_lossy();
        if text.starts_with('.') && text.len() > 1 && text != "." && text != ".." {
            return false;
        }
        if matches!(text.as_ref(), ".git" | ".hg" | ".svn") {
            return false;
        }
    }
    if let Some(extension) = path.extension().and_then(|e| e.to_str()) {
        let lowered = extension.to_lowercase();
        if state
            .config
            .watcher
            .extension_blacklist
            .iter()
            .any(|blocked| blocked == &lowered)
        {
            return false;
        }
    }
    true
}

/// Emit jobs for every path that has settled past the debounce window
async fn flush_settled(
    state: &AppState,
    pending: &mut HashMap<PathBuf, (PendingAction, Instant)>,
    debounce: Duration,
) {
    let now = Instant::now();
    let settled: Vec<PathBuf> = pending
        .iter()
        .filter(|(_, (_, seen))| now.duration_since(*seen) >= debounce)
        .map(|(path, _)| path.clone())
        .collect();

    for path in settled {
        let Some((action, _)) = pending.remove(&path) else {
            continue;
        };
        match action {
            PendingAction::Extract => {
                if !path.is_file() {
                    continue;
                }
                let payload = JobPayload::FileExtraction {
                    path: path.to_string_lossy().into_owned(),
                };
                if let Err(e) = state.queue.enqueue(payload, JobPriority::Normal).await {
                    warn!(path = %path.display(), error = %e, "Failed to enqueue extraction");
                }
            }
            PendingAction::SoftDelete => {
                soft_delete(state, &path).await;
            }
        }
    }
}

/// Mark a deleted file skipped; its chunks stay behind
async fn soft_delete(state: &AppState, path: &Path) {
    let path_text = path.to_string_lossy();
    match state.catalog.get_file_by_path(&path_text).await {
        Ok(Some(record)) => {
            if let Err(e) = state
                .catalog
                .set_file_status(&record.file_id, FileStatus::Skipped, None)
                .await
            {
                warn!(path = %path.display(), error = %e, "Failed to soft-delete file");
            } else {
                debug!(path = %path.display(), "File soft-deleted");
            }
        }
        Ok(None) => {}
        Err(e) => warn!(path = %path.display(), error = %e, "Lookup failed during delete"),
    }
}
