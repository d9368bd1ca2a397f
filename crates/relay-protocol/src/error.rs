//! Error types for the relay service.

use thiserror::Error;

/// Errors that can occur across the relay boundary.
///
/// Listener failures have no variant here: the listener port cannot return
/// an error to its caller, so those failures never cross an interface.
#[derive(Debug, Error)]
pub enum RelayError {
    /// Delivery to one connection failed; the connection gets unregistered.
    #[error("send failed: {0}")]
    SendFailure(String),
    /// The underlying model capability failed during a run.
    #[error("model completion failed: {0}")]
    Completion(String),
    /// The run was cooperatively cancelled before the capability returned.
    #[error("run cancelled")]
    RunCancelled,
    /// A runner was driven outside its `Created -> Running -> terminal` order.
    #[error("invalid run state: {0}")]
    InvalidState(String),
    /// A recognized inbound message carried a malformed body.
    #[error("protocol error: {0}")]
    Protocol(String),
    #[error("serialization error: {0}")]
    Serialization(String),
}

/// Convenience result type for relay operations.
pub type RelayResult<T> = Result<T, RelayError>;
