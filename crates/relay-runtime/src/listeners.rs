//! Built-in event listeners.

use async_trait::async_trait;
use relay_protocol::{Event, EventKind, EventListener};
use tracing::{info, warn};

/// Logs every run lifecycle event through `tracing`.
///
/// Useful as a second listener next to the broadcast one: a headless
/// deployment still gets a structured record of every run.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingListener;

#[async_trait]
impl EventListener for TracingListener {
    async fn on_event(&self, event: &Event) {
        match &event.kind {
            EventKind::RunStarted { model, .. } => {
                info!(run_id = %event.run_id, %model, "run started");
            }
            EventKind::RunCompleted { response } => {
                info!(run_id = %event.run_id, response_len = response.len(), "run completed");
            }
            EventKind::RunFailed { error } => {
                warn!(run_id = %event.run_id, %error, "run failed");
            }
        }
    }
}
