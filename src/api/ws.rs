//! Live notification push over WebSocket.
//!
//! The session is checked before the upgrade, from the bearer header or the `auth-token`
//! cookie. Each socket gets the caller's notifications as they are created.

use axum::{
    extract::{
        State, WebSocketUpgrade,
        ws::{Message, WebSocket, rejection::WebSocketUpgradeRejection},
    },
    http::StatusCode,
    response::{IntoResponse, Response},
};
use futures::{SinkExt, StreamExt};
use serde::Serialize;
use tokio::sync::{broadcast, mpsc};
use tracing::{debug, info};

use super::notifications::NotificationsState;
use crate::auth::Auth;
use crate::db::Notification;
use crate::notifications::NotificationView;

/// Messages sent from server to client.
#[derive(Debug, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ServerMessage {
    /// Connection established
    Connected { user_id: i64 },
    /// A new notification for the connected user
    Notification { notification: NotificationView },
    /// Ping to keep connection alive
    Ping,
}

pub(super) async fn ws_handler(
    State(state): State<NotificationsState>,
    Auth(user, _): Auth,
    ws: Result<WebSocketUpgrade, WebSocketUpgradeRejection>,
) -> Response {
    let ws = match ws {
        Ok(ws) => ws,
        Err(_) => {
            return (StatusCode::BAD_REQUEST, "Expected WebSocket upgrade").into_response();
        }
    };

    let user_id = user.user_id();
    // Subscribe before upgrading so nothing created during the handshake is missed
    let notifications = state.notifier.subscribe(user_id);
    let hub = state.notifier.hub().clone();
    ws.on_upgrade(move |socket| async move {
        handle_socket(socket, user_id, notifications).await;
        hub.release(user_id);
    })
}

async fn handle_socket(
    socket: WebSocket,
    user_id: i64,
    mut notifications: broadcast::Receiver<Notification>,
) {
    let (mut sender, mut receiver) = socket.split();

    let connected_msg = ServerMessage::Connected { user_id };
    if let Ok(json) = serde_json::to_string(&connected_msg) {
        if sender.send(Message::Text(json.into())).await.is_err() {
            return;
        }
    }

    let (tx, mut rx) = mpsc::channel::<ServerMessage>(32);

    // Forward queued messages to the socket
    let mut send_task = tokio::spawn(async move {
        while let Some(msg) = rx.recv().await {
            if let Ok(json) = serde_json::to_string(&msg) {
                if sender.send(Message::Text(json.into())).await.is_err() {
                    break;
                }
            }
        }
    });

    // Relay notifications from the hub
    let tx_push = tx.clone();
    let mut push_task = tokio::spawn(async move {
        loop {
            match notifications.recv().await {
                Ok(notification) => {
                    let msg = ServerMessage::Notification {
                        notification: notification.into(),
                    };
                    if tx_push.send(msg).await.is_err() {
                        break;
                    }
                }
                Err(broadcast::error::RecvError::Lagged(missed)) => {
                    debug!(user_id, missed, "WebSocket subscriber lagged");
                }
                Err(broadcast::error::RecvError::Closed) => break,
            }
        }
    });

    let mut ping_task = tokio::spawn(async move {
        let mut interval = tokio::time::interval(tokio::time::Duration::from_secs(30));
        loop {
            interval.tick().await;
            if tx.send(ServerMessage::Ping).await.is_err() {
                break;
            }
        }
    });

    // Clients only ever close; anything else they send is ignored
    let mut recv_task = tokio::spawn(async move {
        while let Some(Ok(msg)) = receiver.next().await {
            if let Message::Close(_) = msg {
                break;
            }
        }
    });

    tokio::select! {
        _ = &mut send_task => {},
        _ = &mut recv_task => {},
        _ = &mut push_task => {},
        _ = &mut ping_task => {},
    }

    send_task.abort();
    recv_task.abort();
    push_task.abort();
    ping_task.abort();

    // The hub receiver lives in the push task; wait for it to be dropped
    let _ = push_task.await;

    info!(user_id, "WebSocket disconnected");
}
