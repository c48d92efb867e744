//! WebSocket transport for the host bridge

use axum::{
    extract::{
        ws::{Message, WebSocket, WebSocketUpgrade},
        State,
    },
    response::IntoResponse,
};
use futures_util::{SinkExt, StreamExt};
use holodraft_bridge::HostEvent;
use serde::Serialize;
use std::sync::Arc;
use tokio::sync::broadcast::error::RecvError;
use tracing::{debug, info, warn};

use crate::state::AppState;

/// Transport-level replies that do not pass through the bridge
#[derive(Serialize)]
#[serde(tag = "type")]
enum ControlMessage {
    #[serde(rename = "pong")]
    Pong,
}

/// WebSocket upgrade handler
pub async fn websocket_handler(
    ws: WebSocketUpgrade,
    State(state): State<Arc<AppState>>,
) -> impl IntoResponse {
    ws.on_upgrade(move |socket| handle_socket(socket, state))
}

fn to_frame<T: Serialize>(msg: &T) -> Option<Message> {
    match serde_json::to_string(msg) {
        Ok(json) => Some(Message::Text(json.into())),
        Err(e) => {
            warn!(error = %e, "Failed to serialize outbound message");
            None
        }
    }
}

async fn handle_socket(socket: WebSocket, state: Arc<AppState>) {
    let (mut sender, mut receiver) = socket.split();
    let mut events = state.bridge.subscribe();

    info!("WebSocket client connected");

    // Every host expects a ready notification before sending commands
    if let Some(frame) = to_frame(&HostEvent::ready()) {
        if sender.send(frame).await.is_err() {
            return;
        }
    }

    loop {
        tokio::select! {
            // Forward bridge events to client
            event = events.recv() => {
                match event {
                    Ok(event) => {
                        if let Some(frame) = to_frame(&event) {
                            if sender.send(frame).await.is_err() {
                                break;
                            }
                        }
                    }
                    Err(RecvError::Lagged(n)) => {
                        // Events are fire-and-forget; the host resyncs from later ones
                        debug!(skipped = n, "Bridge event channel lagged");
                    }
                    Err(RecvError::Closed) => {
                        debug!("Bridge event channel closed");
                        break;
                    }
                }
            }

            // Handle incoming messages from client
            msg = receiver.next() => {
                match msg {
                    Some(Ok(Message::Ping(data))) => {
                        if sender.send(Message::Pong(data)).await.is_err() {
                            break;
                        }
                    }
                    Some(Ok(Message::Text(text))) => {
                        // Keepalive
                        if text.as_str() == "ping" {
                            if let Some(frame) = to_frame(&ControlMessage::Pong) {
                                if sender.send(frame).await.is_err() {
                                    break;
                                }
                            }
                            continue;
                        }
                        if let Err(e) = state.bridge.send_message(text.as_str()).await {
                            warn!(error = %e, "Host bridge stopped");
                            break;
                        }
                    }
                    Some(Ok(Message::Close(_))) | None => {
                        break;
                    }
                    Some(Err(e)) => {
                        warn!(error = %e, "WebSocket error");
                        break;
                    }
                    _ => {}
                }
            }
        }
    }

    info!("WebSocket client disconnected");
}
