//! WebSocket handler for real-time session updates.

use axum::{
    extract::{
        ws::{Message, WebSocket, WebSocketUpgrade},
        State,
    },
    response::Response,
};
use futures::{SinkExt, StreamExt};
use std::collections::HashMap;
use std::sync::Arc;

use crate::server::state::AppState;

/// WebSocket upgrade handler.
pub async fn ws_handler(ws: WebSocketUpgrade, State(state): State<Arc<AppState>>) -> Response {
    ws.on_upgrade(move |socket| handle_socket(socket, state))
}

/// Handles an individual WebSocket connection.
async fn handle_socket(socket: WebSocket, state: Arc<AppState>) {
    let (mut sender, mut receiver) = socket.split();

    // Subscribe before sending the initial state so nothing is missed in between
    let mut rx = state.subscribe();

    if let Some(initial_state) = initial_state_message(&state) {
        let _ = sender.send(Message::Text(initial_state)).await;
    }

    let send_task = tokio::spawn(async move {
        while let Ok(msg) = rx.recv().await {
            if sender.send(Message::Text(msg)).await.is_err() {
                break;
            }
        }
    });

    let recv_task = tokio::spawn(async move {
        while let Some(Ok(msg)) = receiver.next().await {
            if let Message::Close(_) = msg {
                break;
            }
        }
    });

    tokio::select! {
        _ = send_task => {},
        _ = recv_task => {},
    }

    tracing::debug!("WebSocket connection closed");
}

/// Builds the `initial_state` message sent on connect.
fn initial_state_message(state: &AppState) -> Option<String> {
    let tracker = state.controller.tracker();

    let activity_counts: HashMap<&str, u64> = state
        .hub
        .counts()
        .into_iter()
        .map(|(kind, count)| (kind.as_str(), count))
        .collect();

    let message = serde_json::json!({
        "type": "initial_state",
        "data": {
            "session": tracker.snapshot(),
            "warning_lead_minutes": tracker.config().warning_lead_minutes(),
            "activity_counts": activity_counts,
        },
        "timestamp": chrono::Utc::now().to_rfc3339(),
    });

    serde_json::to_string(&message).ok()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::server::state::test_support::test_state;

    #[tokio::test]
    async fn test_initial_state_message() {
        let state = test_state();
        let message = initial_state_message(&state).unwrap();
        let value: serde_json::Value = serde_json::from_str(&message).unwrap();

        assert_eq!(value["type"], "initial_state");
        assert_eq!(value["data"]["session"]["phase"], "stopped");
        assert_eq!(value["data"]["warning_lead_minutes"], 5);
        assert_eq!(value["data"]["activity_counts"]["click"], 0);
    }
}
