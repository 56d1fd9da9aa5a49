//! WebSocket endpoint for observer clients.
//!
//! Every observer receives the full server state on connect and again after
//! each change. Observers send commands as JSON envelopes of the form
//! `{"cmd": "...", "data": {...}}`; malformed and unknown commands are
//! ignored, a misbehaving observer must not take the server down.

use std::sync::Arc;

use axum::extract::ws::{Message, WebSocket, WebSocketUpgrade};
use axum::extract::State;
use axum::response::Response;
use futures::stream::SplitSink;
use futures::{SinkExt, StreamExt};
use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;
use tracing::{debug, warn};

use crate::lifecycle::{ServerState, TrackerHandle};
use crate::query::QueryDescriptor;
use crate::service::ExecutionId;

use super::AppState;

/// `GET /ws` - upgrades to the observer protocol.
pub async fn ws_handler(ws: WebSocketUpgrade, State(state): State<AppState>) -> Response {
    ws.on_upgrade(move |socket| handle_socket(socket, state.tracker))
}

/// Envelope of every observer command.
#[derive(Debug, Deserialize)]
struct CommandEnvelope {
    cmd: String,
    #[serde(default)]
    data: serde_json::Value,
}

/// Body of the `status` command.
#[derive(Debug, Deserialize)]
struct StatusRequest {
    id: String,
}

/// State push sent to observers.
#[derive(Debug, Serialize)]
struct StateEvent<'a> {
    event: &'a str,
    data: &'a ServerState,
}

async fn handle_socket(socket: WebSocket, tracker: TrackerHandle) {
    let (initial, updates) = match tracker.subscribe().await {
        Ok(subscription) => subscription,
        Err(e) => {
            warn!("Observer subscription failed: {e}");
            return;
        }
    };

    let (mut sink, mut stream) = socket.split();
    if send_state(&mut sink, &initial).await.is_err() {
        return;
    }

    let mut push_task = tokio::spawn(push_updates(sink, updates));

    loop {
        tokio::select! {
            message = stream.next() => match message {
                Some(Ok(Message::Text(text))) => handle_envelope(&tracker, text.as_str()).await,
                Some(Ok(Message::Close(_))) | None => break,
                Some(Ok(_)) => {}
                Some(Err(e)) => {
                    debug!("Observer socket error: {e}");
                    break;
                }
            },
            _ = &mut push_task => break,
        }
    }
    push_task.abort();
}

/// Forwards every state broadcast to the observer.
async fn push_updates(
    mut sink: SplitSink<WebSocket, Message>,
    mut updates: broadcast::Receiver<Arc<ServerState>>,
) {
    loop {
        match updates.recv().await {
            Ok(snapshot) => {
                if send_state(&mut sink, &snapshot).await.is_err() {
                    return;
                }
            }
            Err(broadcast::error::RecvError::Lagged(skipped)) => {
                debug!("Observer lagged, skipped {skipped} snapshots");
            }
            Err(broadcast::error::RecvError::Closed) => return,
        }
    }
}

/// Serializes and sends one full state snapshot.
async fn send_state(
    sink: &mut SplitSink<WebSocket, Message>,
    state: &ServerState,
) -> Result<(), axum::Error> {
    let event = StateEvent {
        event: "state",
        data: state,
    };
    let text = match serde_json::to_string(&event) {
        Ok(text) => text,
        Err(e) => {
            warn!("Failed to serialize state event: {e}");
            return Ok(());
        }
    };
    sink.send(Message::Text(text.into())).await
}

/// Dispatches one observer command.
async fn handle_envelope(tracker: &TrackerHandle, text: &str) {
    let envelope: CommandEnvelope = match serde_json::from_str(text) {
        Ok(envelope) => envelope,
        Err(e) => {
            debug!("Ignoring malformed observer message: {e}");
            return;
        }
    };
    match envelope.cmd.as_str() {
        "query" => {
            let descriptor: QueryDescriptor = match serde_json::from_value(envelope.data) {
                Ok(descriptor) => descriptor,
                Err(e) => {
                    debug!("Ignoring malformed query descriptor: {e}");
                    return;
                }
            };
            // Submission waits on the gateway; run it off the socket loop.
            // Failures are already recorded in the server state.
            let tracker = tracker.clone();
            tokio::spawn(async move {
                if let Err(e) = tracker.submit_query(descriptor).await {
                    debug!("Query submission failed: {e}");
                }
            });
        }
        "status" => {
            let request: StatusRequest = match serde_json::from_value(envelope.data) {
                Ok(request) => request,
                Err(e) => {
                    debug!("Ignoring malformed status request: {e}");
                    return;
                }
            };
            if let Err(e) = tracker.refresh_status(ExecutionId::new(request.id)).await {
                debug!("Status refresh rejected: {e}");
            }
        }
        other => debug!("Ignoring unknown observer command '{other}'"),
    }
}
