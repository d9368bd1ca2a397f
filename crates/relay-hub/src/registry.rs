//! The live connection set.

use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::Mutex;
use relay_protocol::{ConnectionId, ConnectionSink, RelayError, RelayResult, ServerMessage};
use tracing::{debug, warn};

/// Tracks the set of live observer connections.
///
/// Membership means "currently believed reachable": a connection stays in the
/// set until its peer disconnects or a send to it fails. The live set is the
/// one piece of state mutated from multiple tasks, so add/remove/snapshot are
/// serialized under the mutex; the mutex is never held across an await —
/// sends always run on a snapshot.
#[derive(Default)]
pub struct ConnectionRegistry {
    connections: Mutex<HashMap<ConnectionId, Arc<dyn ConnectionSink>>>,
}

impl ConnectionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a connection to the live set and hand back its identity.
    pub fn register(&self, sink: Arc<dyn ConnectionSink>) -> ConnectionId {
        let id = ConnectionId::new();
        self.connections.lock().insert(id.clone(), sink);
        debug!(connection_id = %id, "connection registered");
        id
    }

    /// Remove a connection if present; a no-op otherwise. Safe to call from
    /// the failure path of any other operation.
    pub fn unregister(&self, id: &ConnectionId) {
        if self.connections.lock().remove(id).is_some() {
            debug!(connection_id = %id, "connection unregistered");
        }
    }

    pub fn len(&self) -> usize {
        self.connections.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.connections.lock().is_empty()
    }

    /// Send a message to exactly one connection. On failure the caller is
    /// expected to unregister the connection.
    pub async fn unicast(&self, id: &ConnectionId, message: &ServerMessage) -> RelayResult<()> {
        let sink = self
            .connections
            .lock()
            .get(id)
            .cloned()
            .ok_or_else(|| RelayError::SendFailure(format!("unknown connection {id}")))?;
        let text = encode(message)?;
        sink.send_text(&text).await
    }

    /// Best-effort fan-out to every connection registered at the moment of
    /// the call.
    ///
    /// Deliveries are independent: a failing connection is unregistered and
    /// the remaining deliveries still run. At-most-once, no retry.
    pub async fn broadcast(&self, message: &ServerMessage) {
        let text = match encode(message) {
            Ok(text) => text,
            Err(error) => {
                warn!(%error, "dropping unencodable broadcast");
                return;
            }
        };

        let snapshot: Vec<(ConnectionId, Arc<dyn ConnectionSink>)> = self
            .connections
            .lock()
            .iter()
            .map(|(id, sink)| (id.clone(), Arc::clone(sink)))
            .collect();

        for (id, sink) in snapshot {
            if let Err(error) = sink.send_text(&text).await {
                warn!(connection_id = %id, %error, "send failed, dropping connection");
                self.unregister(&id);
            }
        }
    }
}

fn encode(message: &ServerMessage) -> RelayResult<String> {
    serde_json::to_string(message).map_err(|error| RelayError::Serialization(error.to_string()))
}
