//! # relay-protocol — contract types for the relay service
//!
//! This crate defines the shared types, wire message shapes, and trait
//! interfaces that the relay runtime, hub, and server binary depend on.
//!
//! It is intentionally dependency-light (no runtime deps like tokio or axum)
//! so it can be used as a pure contract crate.
//!
//! ## Module Overview
//!
//! - [`ids`] — Typed ID wrappers (RunId, ConnectionId)
//! - [`event`] — Event envelope + closed EventKind lifecycle taxonomy
//! - [`wire`] — ClientCommand (inbound) and ServerMessage (outbound) shapes
//! - [`ports`] — Boundary ports (event listener, model provider, connection sink)
//! - [`error`] — RelayError, RelayResult

pub mod error;
pub mod event;
pub mod ids;
pub mod ports;
pub mod wire;

// Re-export the most commonly used types at the crate root.
pub use error::{RelayError, RelayResult};
pub use event::{Event, EventKind};
pub use ids::{ConnectionId, RunId};
pub use ports::{CompletionRequest, ConnectionSink, EventListener, ModelProviderPort};
pub use wire::{ClientCommand, ServerMessage};
