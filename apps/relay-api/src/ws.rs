//! WebSocket endpoint: one handler loop per observer connection.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use axum::extract::State;
use axum::extract::ws::{Message, WebSocket, WebSocketUpgrade};
use axum::response::Response;
use futures_util::stream::SplitSink;
use futures_util::{SinkExt, StreamExt};
use parking_lot::Mutex;
use relay_hub::BroadcastListener;
use relay_protocol::{
    ClientCommand, ConnectionId, ConnectionSink, RelayError, RelayResult, RunId, ServerMessage,
};
use relay_runtime::{Runner, TracingListener};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

use crate::AppState;

/// Cancellation handles for in-flight runs, keyed by run ID.
///
/// Entries live from just before `run` starts until the run reaches a
/// terminal state; `stop_agent` for an absent key means the run already
/// finished (or never existed).
#[derive(Default, Clone)]
pub(crate) struct RunTable {
    runs: Arc<Mutex<HashMap<RunId, CancellationToken>>>,
}

impl RunTable {
    fn insert(&self, run_id: RunId, token: CancellationToken) {
        self.runs.lock().insert(run_id, token);
    }

    fn remove(&self, run_id: &RunId) {
        self.runs.lock().remove(run_id);
    }

    /// Cancel the run if it is still in flight.
    fn cancel(&self, run_id: &RunId) -> bool {
        match self.runs.lock().get(run_id) {
            Some(token) => {
                token.cancel();
                true
            }
            None => false,
        }
    }
}

/// Send half of one WebSocket, shared between the registry and unicast
/// replies from the handler loop.
struct WsSender {
    sink: tokio::sync::Mutex<SplitSink<WebSocket, Message>>,
}

#[async_trait]
impl ConnectionSink for WsSender {
    async fn send_text(&self, text: &str) -> RelayResult<()> {
        self.sink
            .lock()
            .await
            .send(Message::Text(text.to_owned().into()))
            .await
            .map_err(|error| RelayError::SendFailure(error.to_string()))
    }
}

pub(crate) async fn ws_upgrade(ws: WebSocketUpgrade, State(state): State<AppState>) -> Response {
    ws.on_upgrade(move |socket| handle_socket(state, socket))
}

/// Read inbound control messages until the peer goes away. Reads are strictly
/// sequential per connection; runs spawned from here proceed independently.
async fn handle_socket(state: AppState, socket: WebSocket) {
    let (sink, mut stream) = socket.split();
    let sender = Arc::new(WsSender {
        sink: tokio::sync::Mutex::new(sink),
    });
    let connection_id = state.registry.register(sender);
    info!(connection_id = %connection_id, "observer connected");

    while let Some(next) = stream.next().await {
        match next {
            Ok(Message::Text(text)) => handle_command(&state, &connection_id, text.as_str()).await,
            Ok(Message::Close(_)) => break,
            // Ping/pong is answered by the transport; binary frames carry
            // nothing in this protocol.
            Ok(Message::Ping(_) | Message::Pong(_) | Message::Binary(_)) => {}
            Err(error) => {
                debug!(connection_id = %connection_id, %error, "websocket read failed");
                break;
            }
        }
    }

    state.registry.unregister(&connection_id);
    info!(connection_id = %connection_id, "observer disconnected");
}

async fn handle_command(state: &AppState, connection_id: &ConnectionId, text: &str) {
    match serde_json::from_str::<ClientCommand>(text) {
        Ok(ClientCommand::RunAgent { prompt, model }) => {
            let model = model.or_else(|| state.default_model.clone());
            spawn_run(state.clone(), prompt, model);
        }
        Ok(ClientCommand::StopAgent { run_id }) => {
            if state.runs.cancel(&run_id) {
                info!(run_id = %run_id, "run cancellation requested");
            } else {
                reply_error(
                    state,
                    connection_id,
                    format!("no run in flight with id {run_id}"),
                )
                .await;
            }
        }
        Ok(ClientCommand::Unknown) => {
            debug!(connection_id = %connection_id, "ignoring unknown command type");
        }
        Err(error) => {
            reply_error(state, connection_id, format!("malformed command: {error}")).await;
        }
    }
}

/// Unicast an error to the issuing connection; a dead peer just gets dropped.
async fn reply_error(state: &AppState, connection_id: &ConnectionId, message: String) {
    if state
        .registry
        .unicast(connection_id, &ServerMessage::error(message))
        .await
        .is_err()
    {
        state.registry.unregister(connection_id);
    }
}

/// Spawn one independent run task. The handler loop never awaits it, so
/// multiple runs per connection proceed concurrently.
fn spawn_run(state: AppState, prompt: String, model: Option<String>) {
    tokio::spawn(async move {
        let mut runner = Runner::new(state.provider.clone(), model);
        runner.add_event_listener(Arc::new(BroadcastListener::new(state.registry.clone())));
        runner.add_event_listener(Arc::new(TracingListener));

        let run_id = runner.run_id().clone();
        state.runs.insert(run_id.clone(), runner.cancellation_token());
        let outcome = runner.run(prompt).await;
        state.runs.remove(&run_id);

        match outcome {
            Ok(response) => {
                state
                    .registry
                    .broadcast(&ServerMessage::AgentResponse { run_id, response })
                    .await;
            }
            Err(error) => {
                state
                    .registry
                    .broadcast(&ServerMessage::error(error.to_string()))
                    .await;
            }
        }
    });
}
