//! Boundary ports between the relay core and its collaborators.
//!
//! These traits define the only runtime boundary between the run orchestrator
//! and external implementations (event consumers, model providers, and the
//! transport's per-connection send half).
//!
//! Object-safety note: traits use `async-trait` for async dyn-dispatch.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::RelayResult;
use crate::event::Event;

/// A capability attached to a run that receives every event the run emits.
///
/// `on_event` returns nothing: a listener has no way to propagate a failure
/// to the emitting run. Implementations log internal failures and swallow
/// them, so one broken listener never blocks delivery to the others or
/// aborts the run.
#[async_trait]
pub trait EventListener: Send + Sync {
    async fn on_event(&self, event: &Event);
}

/// One completion request for the underlying agent capability.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CompletionRequest {
    pub prompt: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub model: Option<String>,
}

/// The opaque agent capability.
///
/// May suspend for an unbounded, externally-determined duration; has no side
/// effects visible to the relay core beyond its return value.
#[async_trait]
pub trait ModelProviderPort: Send + Sync {
    async fn complete(&self, request: CompletionRequest) -> RelayResult<String>;
}

/// The send half of one duplex connection to an observer.
///
/// Fails with [`crate::RelayError::SendFailure`] once the peer is gone;
/// the registry reacts by unregistering the connection.
#[async_trait]
pub trait ConnectionSink: Send + Sync {
    async fn send_text(&self, text: &str) -> RelayResult<()>;
}
