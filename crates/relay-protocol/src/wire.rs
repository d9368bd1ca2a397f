//! Wire message shapes exchanged with connected observers.
//!
//! Inbound control messages arrive as `{"type": ..., ...}` JSON text frames;
//! outbound messages are `{"type": ..., "data": {...}}`. Unknown inbound
//! types deserialize into [`ClientCommand::Unknown`] instead of failing, so
//! the handler loop can ignore them without treating them as protocol errors.

use serde::{Deserialize, Serialize};

use crate::event::{Event, EventKind};
use crate::ids::RunId;

/// Inbound control message from one connection.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ClientCommand {
    /// Start a new agent run.
    RunAgent {
        prompt: String,
        #[serde(default)]
        model: Option<String>,
    },
    /// Cancel an in-flight run.
    StopAgent { run_id: RunId },
    /// Any unrecognized `type` tag. Ignored by the handler loop.
    #[serde(other)]
    Unknown,
}

/// Outbound message, fanned out to observers as `{"type", "data"}`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "data", rename_all = "snake_case")]
pub enum ServerMessage {
    RunStarted {
        run_id: RunId,
        prompt: String,
        model: String,
    },
    RunCompleted {
        run_id: RunId,
        response: String,
    },
    RunFailed {
        run_id: RunId,
        error: String,
    },
    /// Final response of a successful run, mirroring the lifecycle
    /// `RunCompleted` for clients that only render terminal output.
    AgentResponse {
        run_id: RunId,
        response: String,
    },
    Error {
        message: String,
    },
}

impl ServerMessage {
    /// Wrap a lifecycle event into its transport shape, stamping the run ID
    /// into the data object.
    pub fn from_event(event: &Event) -> Self {
        let run_id = event.run_id.clone();
        match &event.kind {
            EventKind::RunStarted { prompt, model } => Self::RunStarted {
                run_id,
                prompt: prompt.clone(),
                model: model.clone(),
            },
            EventKind::RunCompleted { response } => Self::RunCompleted {
                run_id,
                response: response.clone(),
            },
            EventKind::RunFailed { error } => Self::RunFailed {
                run_id,
                error: error.clone(),
            },
        }
    }

    pub fn error(message: impl Into<String>) -> Self {
        Self::Error {
            message: message.into(),
        }
    }
}
