//! JSON wire protocol for the realtime WebSocket.
//!
//! Every frame is a JSON object with a `type` tag. Outbound frames also
//! carry an ISO-8601 `timestamp`.

use axum::extract::ws::Message;
use chrono::{DateTime, Utc};
use civic_core::error::CoreError;
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Inbound `type` tags the gateway understands.
const CLIENT_TYPES: [&str; 4] = ["authenticate", "subscribe", "unsubscribe", "ping"];

// ---------------------------------------------------------------------------
// Inbound
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ClientMessage {
    Authenticate {
        address: String,
        #[serde(default)]
        signature: Option<String>,
    },
    /// `events` is kept raw so a non-array value can be reported as a
    /// validation error instead of a parse failure.
    Subscribe {
        #[serde(default)]
        events: Value,
    },
    Unsubscribe {
        #[serde(default)]
        events: Value,
    },
    Ping,
}

impl ClientMessage {
    /// Parse a text frame. Every failure is a [`CoreError::Validation`]
    /// whose message is safe to echo back to the client.
    pub fn parse(text: &str) -> Result<Self, CoreError> {
        let value: Value = serde_json::from_str(text)
            .map_err(|_| CoreError::Validation("Invalid message format".to_string()))?;

        let kind = value
            .get("type")
            .and_then(Value::as_str)
            .ok_or_else(|| CoreError::Validation("Message type is required".to_string()))?;
        if !CLIENT_TYPES.contains(&kind) {
            return Err(CoreError::Validation(format!("Unknown message type: {kind}")));
        }
        let kind = kind.to_string();

        serde_json::from_value(value)
            .map_err(|e| CoreError::Validation(format!("Invalid {kind} message: {e}")))
    }
}

// ---------------------------------------------------------------------------
// Outbound
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ServerMessage {
    Connected {
        #[serde(rename = "sessionId")]
        session_id: String,
        message: String,
    },
    Authenticated {
        identity: String,
        message: String,
    },
    AuthError {
        message: String,
    },
    Subscribed {
        events: Vec<String>,
        message: String,
    },
    Unsubscribed {
        events: Vec<String>,
        message: String,
    },
    Pong,
    Error {
        message: String,
    },
    ServerShutdown {
        message: String,
    },
    BlockchainEvent {
        #[serde(rename = "eventType")]
        event_type: String,
        data: Value,
    },
    Notification {
        data: Value,
    },
}

#[derive(Serialize)]
struct Envelope<'a> {
    #[serde(flatten)]
    message: &'a ServerMessage,
    timestamp: DateTime<Utc>,
}

impl ServerMessage {
    pub fn error(message: impl Into<String>) -> Self {
        ServerMessage::Error {
            message: message.into(),
        }
    }

    /// Stamp with the current time and encode as a text frame.
    pub fn encode(&self) -> Result<Message, serde_json::Error> {
        let text = serde_json::to_string(&Envelope {
            message: self,
            timestamp: Utc::now(),
        })?;
        Ok(Message::Text(text.into()))
    }
}
