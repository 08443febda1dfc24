//! # Operation Tracking
//!
//! Process-wide slot describing the currently executing heavy operation,
//! plus a bounded per-kind history of completion durations used to estimate
//! ETA. The slot is replaced atomically under a light mutex; readers on the
//! control plane never block on a running operation.

use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, VecDeque};

/// Completed-run durations retained per kind for the ETA estimate
const ETA_HISTORY: usize = 16;

/// Kinds of long-running operations
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OperationKind {
    Extraction,
    Correlation,
    Transcription,
    Vision,
}

/// Stages of a correlation run, reported as the operation detail tag
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CorrelationStage {
    Consolidate,
    Cooccurrence,
    Detect,
    Surface,
}

impl CorrelationStage {
    /// Stable string form for logs and telemetry
    pub fn as_str(self) -> &'static str {
        match self {
            CorrelationStage::Consolidate => "consolidate",
            CorrelationStage::Cooccurrence => "cooccurrence",
            CorrelationStage::Detect => "detect",
            CorrelationStage::Surface => "surface",
        }
    }
}

/// Descriptor of the in-flight operation, one variant per kind
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Operation {
    Extraction {
        path: String,
        started_at: DateTime<Utc>,
        eta_seconds: Option<f64>,
    },
    Correlation {
        stage: CorrelationStage,
        started_at: DateTime<Utc>,
        /// Completed fraction when determinate
        progress: Option<f64>,
        eta_seconds: Option<f64>,
    },
    Transcription {
        path: String,
        started_at: DateTime<Utc>,
        eta_seconds: Option<f64>,
    },
    Vision {
        path: String,
        started_at: DateTime<Utc>,
        eta_seconds: Option<f64>,
    },
}

impl Operation {
    /// The kind of this operation
    pub fn kind(&self) -> OperationKind {
        match self {
            Operation::Extraction { .. } => OperationKind::Extraction,
            Operation::Correlation { .. } => OperationKind::Correlation,
            Operation::Transcription { .. } => OperationKind::Transcription,
            Operation::Vision { .. } => OperationKind::Vision,
        }
    }

    /// When the operation started
    pub fn started_at(&self) -> DateTime<Utc> {
        match self {
            Operation::Extraction { started_at, .. }
            | Operation::Correlation { started_at, .. }
            | Operation::Transcription { started_at, .. }
            | Operation::Vision { started_at, .. } => *started_at,
        }
    }
}

/// Point-in-time view served to the control plane
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OperationSnapshot {
    #[serde(flatten)]
    pub operation: Operation,
    pub elapsed_seconds: f64,
}

/// The process-wide operation slot
#[derive(Default)]
pub struct OperationTracker {
    slot: Mutex<Option<Operation>>,
    history: Mutex<HashMap<OperationKind, VecDeque<f64>>>,
}

impl OperationTracker {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Replace the slot with a fresh operation
    pub fn begin(&self, operation: Operation) {
        *self.slot.lock() = Some(operation);
    }

    /// Update the stage tag of a running correlation; no-op for other kinds
    pub fn set_correlation_stage(&self, new_stage: CorrelationStage, progress: Option<f64>) {
        let mut slot = self.slot.lock();
        if let Some(Operation::Correlation {
            stage,
            progress: slot_progress,
            ..
        }) = slot.as_mut()
        {
            *stage = new_stage;
            *slot_progress = progress;
        }
    }

    /// Clear the slot and record the run duration for future ETAs
    pub fn finish(&self) {
        let finished = self.slot.lock().take();
        if let Some(operation) = finished {
            let elapsed = (Utc::now() - operation.started_at())
                .to_std()
                .map(|d| d.as_secs_f64())
                .unwrap_or(0.0);
            let mut history = self.history.lock();
            let runs = history.entry(operation.kind()).or_default();
            runs.push_back(elapsed);
            while runs.len() > ETA_HISTORY {
                runs.pop_front();
            }
        }
    }

    /// Clear the slot without recording a duration (failed or cancelled runs)
    pub fn abort(&self) {
        *self.slot.lock() = None;
    }

    /// Mean duration of prior runs of this kind, if any completed
    pub fn eta_seconds(&self, kind: OperationKind) -> Option<f64> {
        let history = self.history.lock();
        let runs = history.get(&kind)?;
        if runs.is_empty() {
            return None;
        }
        Some(runs.iter().sum::<f64>() / runs.len() as f64)
    }

    /// Snapshot of the current operation with elapsed time
    pub fn snapshot(&self) -> Option<OperationSnapshot> {
        let slot = self.slot.lock();
        slot.as_ref().map(|operation| OperationSnapshot {
            operation: operation.clone(),
            elapsed_seconds: (Utc::now() - operation.started_at())
                .to_std()
                .map(|d| d.as_secs_f64())
                .unwrap_or(0.0),
        })
    }
}
