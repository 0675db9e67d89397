//! WebSocket connection loops.
//!
//! [`run_trial_connection`] handles a streaming client on the trial route;
//! [`run_monitor_connection`] forwards recorded events to an observer.

use std::sync::Arc;

use axum::extract::ws::{CloseFrame, Message, WebSocket, close_code};
use futures_util::{SinkExt, StreamExt};
use tokio::sync::broadcast;

use super::messages::{MonitorCommand, WsMessage, WsMessageType};
use super::subscription::SubscriptionManager;
use crate::domain::RecordedEvent;
use crate::service::{ConnectionState, SessionService};

/// Runs the read/reply loop for a single trial streaming connection.
///
/// - Text frames are JSON control events or `array_header`s.
/// - Binary frames carry the bytes announced by the last header.
/// - A persistence failure closes the socket with code 1011.
pub async fn run_trial_connection(mut socket: WebSocket, service: Arc<SessionService>) {
    let mut conn = ConnectionState::new();
    tracing::info!(connection = %conn.id(), "client connected");

    while let Some(msg) = socket.recv().await {
        let result = match msg {
            Ok(Message::Text(text)) => service.handle_text(text.as_str(), &mut conn).await,
            Ok(Message::Binary(bytes)) => service.handle_binary(&bytes, &mut conn).await.map(Some),
            Ok(Message::Close(_)) => break,
            Ok(Message::Ping(_) | Message::Pong(_)) => continue,
            Err(e) => {
                tracing::debug!(connection = %conn.id(), error = %e, "receive failed");
                break;
            }
        };

        match result {
            Ok(Some(reply)) => {
                if socket.send(Message::text(reply.to_json())).await.is_err() {
                    break;
                }
            }
            Ok(None) => {}
            Err(e) => {
                tracing::error!(connection = %conn.id(), error = %e, "unexpected server error");
                let frame = CloseFrame {
                    code: close_code::ERROR,
                    reason: close_reason(e.to_string()).into(),
                };
                let _ = socket.send(Message::Close(Some(frame))).await;
                return;
            }
        }
    }

    tracing::info!(connection = %conn.id(), "client disconnected");
}

/// Longest close reason a control frame can carry, in bytes.
const MAX_CLOSE_REASON: usize = 123;

/// Cuts `reason` to [`MAX_CLOSE_REASON`] bytes on a char boundary.
fn close_reason(mut reason: String) -> String {
    if reason.len() > MAX_CLOSE_REASON {
        let mut end = MAX_CLOSE_REASON;
        while !reason.is_char_boundary(end) {
            end -= 1;
        }
        reason.truncate(end);
    }
    reason
}

/// Runs the read/write loop for a single monitor connection.
///
/// - Reads subscribe/unsubscribe commands from the client.
/// - Forwards matching events from the [`broadcast::Receiver`] to the client.
pub async fn run_monitor_connection(
    socket: WebSocket,
    mut event_rx: broadcast::Receiver<RecordedEvent>,
) {
    let (mut ws_tx, mut ws_rx) = socket.split();
    let mut subs = SubscriptionManager::new();

    loop {
        tokio::select! {
            // Incoming message from client
            msg = ws_rx.next() => {
                match msg {
                    Some(Ok(Message::Text(text))) => {
                        let response = handle_monitor_text(text.as_str(), &mut subs);
                        if let Ok(json) = serde_json::to_string(&response)
                            && ws_tx.send(Message::text(json)).await.is_err() {
                                break;
                            }
                    }
                    Some(Ok(Message::Close(_)) | Err(_)) | None => break,
                    _ => {}
                }
            }
            // Event from EventBus
            event = event_rx.recv() => {
                match event {
                    Ok(recorded) => {
                        if subs.matches(recorded.event_name()) {
                            let msg = WsMessage::new(
                                uuid::Uuid::new_v4().to_string(),
                                WsMessageType::Event,
                                serde_json::to_value(&recorded).unwrap_or_default(),
                            );
                            let json = serde_json::to_string(&msg).unwrap_or_default();
                            if ws_tx.send(Message::text(json)).await.is_err() {
                                break;
                            }
                        }
                    }
                    Err(broadcast::error::RecvError::Lagged(n)) => {
                        tracing::warn!(lagged = n, "monitor lagged behind event bus");
                    }
                    Err(broadcast::error::RecvError::Closed) => break,
                }
            }
        }
    }

    tracing::debug!("monitor connection closed");
}

/// Handles a command envelope from a monitor, returning the response.
fn handle_monitor_text(text: &str, subs: &mut SubscriptionManager) -> WsMessage {
    let Ok(msg) = serde_json::from_str::<WsMessage>(text) else {
        return WsMessage::error(String::new(), 400, "malformed JSON");
    };

    match serde_json::from_value::<MonitorCommand>(msg.payload) {
        Ok(MonitorCommand::Subscribe { events }) => {
            subs.subscribe(events.as_slice());
            WsMessage::new(
                msg.id,
                WsMessageType::Response,
                serde_json::json!({
                    "subscribed": subs.names(),
                    "count": subs.count(),
                    "wildcard": subs.is_subscribed_all(),
                }),
            )
        }
        Ok(MonitorCommand::Unsubscribe { events }) => {
            subs.unsubscribe(events.as_slice());
            WsMessage::new(
                msg.id,
                WsMessageType::Response,
                serde_json::json!({
                    "unsubscribed": events,
                    "remaining_count": subs.count(),
                    "wildcard": subs.is_subscribed_all(),
                }),
            )
        }
        Err(_) => WsMessage::error(msg.id, 404, "unknown command"),
    }
}
