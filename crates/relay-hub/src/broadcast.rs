//! Bridging run lifecycle events onto the connection registry.

use std::sync::Arc;

use async_trait::async_trait;
use relay_protocol::{Event, EventListener, ServerMessage};

use crate::registry::ConnectionRegistry;

/// Forwards every received event to all connected observers.
///
/// One fresh instance is attached per run; all instances share the same
/// registry, so every observer sees every run. Send failures are handled
/// inside [`ConnectionRegistry::broadcast`] and never reach the run.
pub struct BroadcastListener {
    registry: Arc<ConnectionRegistry>,
}

impl BroadcastListener {
    pub fn new(registry: Arc<ConnectionRegistry>) -> Self {
        Self { registry }
    }
}

#[async_trait]
impl EventListener for BroadcastListener {
    async fn on_event(&self, event: &Event) {
        self.registry
            .broadcast(&ServerMessage::from_event(event))
            .await;
    }
}
