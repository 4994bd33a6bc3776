use std::sync::Arc;

use axum::extract::ws::{Message, WebSocket, WebSocketUpgrade};
use axum::extract::State;
use axum::response::IntoResponse;
use civic_core::error::CoreError;
use futures::{SinkExt, StreamExt};

use crate::state::AppState;
use crate::ws::manager::Gateway;
use crate::ws::protocol::{ClientMessage, ServerMessage};

/// HTTP handler that upgrades the connection to WebSocket.
///
/// The upgrade itself is anonymous; sessions bind an identity afterwards
/// with an `authenticate` message.
pub async fn ws_handler(ws: WebSocketUpgrade, State(state): State<AppState>) -> impl IntoResponse {
    ws.on_upgrade(move |socket| handle_socket(socket, state.gateway))
}

/// Manage a single WebSocket connection after upgrade.
///
/// Splits the socket into a sink (outbound) and stream (inbound), then:
///   1. Registers the session with the [`Gateway`].
///   2. Spawns a sender task that forwards messages from the session channel.
///   3. Dispatches inbound messages on the current task.
///   4. Deregisters on disconnect.
async fn handle_socket(socket: WebSocket, gateway: Arc<Gateway>) {
    let (session_id, mut rx) = gateway.accept().await;
    tracing::info!(session_id = %session_id, "WebSocket connected");

    let (mut sink, mut stream) = socket.split();

    let sender_session_id = session_id.clone();
    let send_task = tokio::spawn(async move {
        while let Some(msg) = rx.recv().await {
            let closing = matches!(msg, Message::Close(_));
            if sink.send(msg).await.is_err() {
                tracing::debug!(session_id = %sender_session_id, "WebSocket sink closed");
                break;
            }
            if closing {
                break;
            }
        }
    });

    while let Some(result) = stream.next().await {
        match result {
            Ok(Message::Text(text)) => dispatch(&gateway, &session_id, text.as_str()).await,
            Ok(Message::Pong(_)) | Ok(Message::Ping(_)) => gateway.touch(&session_id).await,
            Ok(Message::Binary(_)) => {
                gateway
                    .push(
                        &session_id,
                        &ServerMessage::error("Binary frames are not supported"),
                    )
                    .await;
            }
            Ok(Message::Close(_)) => break,
            Err(e) => {
                tracing::debug!(session_id = %session_id, error = %e, "WebSocket receive error");
                break;
            }
        }
    }

    gateway.disconnect(&session_id).await;
    send_task.abort();
    tracing::info!(session_id = %session_id, "WebSocket disconnected");
}

/// Handle one inbound text frame for `session_id`.
///
/// Malformed frames are answered with `error`; the session stays open.
pub async fn dispatch(gateway: &Gateway, session_id: &str, text: &str) {
    let message = match ClientMessage::parse(text) {
        Ok(message) => message,
        Err(e) => {
            tracing::debug!(session_id, error = %e, "Malformed WebSocket message");
            let reply = match e {
                CoreError::Validation(msg) => msg,
                other => other.to_string(),
            };
            gateway.push(session_id, &ServerMessage::error(reply)).await;
            return;
        }
    };

    // Replies (including errors) are sent by the gateway itself.
    let _ = match message {
        ClientMessage::Authenticate { address, signature } => gateway
            .authenticate(session_id, &address, signature.as_deref())
            .await
            .map(|_| ()),
        ClientMessage::Subscribe { events } => {
            gateway.subscribe(session_id, &events).await.map(|_| ())
        }
        ClientMessage::Unsubscribe { events } => {
            gateway.unsubscribe(session_id, &events).await.map(|_| ())
        }
        ClientMessage::Ping => {
            gateway.handle_ping(session_id).await;
            Ok(())
        }
    };
}
