//! # relay-hub — connection registry and broadcast fan-out
//!
//! The [`ConnectionRegistry`] owns the set of live observer connections and
//! fans messages out to them; the [`BroadcastListener`] bridges run lifecycle
//! events onto that registry.

pub mod broadcast;
pub mod registry;

pub use broadcast::BroadcastListener;
pub use registry::ConnectionRegistry;
