// SPDX-License-Identifier: MIT
//! Reference websocket listener for notification fan-out. One task per
//! connection, as with every other per-connection task in the gateway.
//! Operators supplying their own front-end transport can leave
//! `bind_addr` unset and implement [`Channel`] over whatever they use
//! instead.

use std::sync::Arc;

use async_trait::async_trait;
use axum::extract::ws::{Message, WebSocket, WebSocketUpgrade};
use axum::extract::{Path, State};
use axum::response::Response;
use futures::{SinkExt, StreamExt};
use tokio::sync::Mutex;
use uuid::Uuid;

use portal_notify::{Channel, NotificationFrame};

use crate::state::AppState;

struct WebSocketChannel {
    sink: Mutex<futures::stream::SplitSink<WebSocket, Message>>,
}

#[async_trait]
impl Channel for WebSocketChannel {
    async fn send(&self, frame: &NotificationFrame) -> anyhow::Result<()> {
        let text = serde_json::to_string(frame)?;
        self.sink.lock().await.send(Message::Text(text)).await?;
        Ok(())
    }
}

pub async fn ws_handler(
    ws: WebSocketUpgrade,
    Path(user_id): Path<Uuid>,
    State(state): State<Arc<AppState>>,
) -> Response {
    ws.on_upgrade(move |socket| handle_socket(socket, user_id, state))
}

async fn handle_socket(socket: WebSocket, user_id: Uuid, state: Arc<AppState>) {
    let (sink, mut stream) = socket.split();
    let channel: Arc<dyn Channel> = Arc::new(WebSocketChannel { sink: Mutex::new(sink) });
    let handle = state.notifications.register_session(user_id, channel).await;

    // This channel only pushes; it does not accept commands. The loop
    // exists only to detect the browser closing the connection.
    while let Some(msg) = stream.next().await {
        if matches!(msg, Ok(Message::Close(_)) | Err(_)) {
            break;
        }
    }

    state.notifications.unregister_session(user_id, handle).await;
}
