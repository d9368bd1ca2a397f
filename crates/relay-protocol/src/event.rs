//! Lifecycle events emitted by agent runs.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::ids::RunId;

/// An immutable lifecycle notification describing a point in one run.
///
/// Constructed once by the runner and cloned for fan-out; nothing mutates an
/// event after construction. The `run_id` lets a broadcast subscriber
/// demultiplex events from concurrent runs.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Event {
    pub run_id: RunId,
    pub timestamp: DateTime<Utc>,
    pub kind: EventKind,
}

impl Event {
    /// Create a new event stamped with the current time.
    pub fn new(run_id: RunId, kind: EventKind) -> Self {
        Self {
            run_id,
            timestamp: Utc::now(),
            kind,
        }
    }
}

/// Closed set of run lifecycle transitions.
///
/// Matched exhaustively everywhere; adding a variant is a deliberate protocol
/// change, not a catch-all extension point.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum EventKind {
    RunStarted { prompt: String, model: String },
    RunCompleted { response: String },
    RunFailed { error: String },
}

impl EventKind {
    /// The wire tag for this kind, as it appears in `{type, data}` messages.
    pub fn tag(&self) -> &'static str {
        match self {
            Self::RunStarted { .. } => "run_started",
            Self::RunCompleted { .. } => "run_completed",
            Self::RunFailed { .. } => "run_failed",
        }
    }
}
