use std::collections::{BTreeMap, BTreeSet, HashMap, HashSet};
use std::sync::Arc;

use axum::body::Bytes;
use axum::extract::ws::Message;
use chrono::Utc;
use civic_core::error::CoreError;
use civic_core::identity::{AddressFormatVerifier, Identity, IdentityVerifier};
use civic_core::kinds::{EventKind, Topic};
use civic_core::types::Timestamp;
use serde::Serialize;
use serde_json::Value;
use tokio::sync::{mpsc, RwLock};

use crate::ws::protocol::ServerMessage;

/// Channel sender half for pushing messages to a WebSocket connection.
pub type WsSender = mpsc::UnboundedSender<Message>;

/// Probes a session may leave unanswered before the next sweep evicts it.
pub const MAX_MISSED_PROBES: u32 = 2;

/// State of a single live WebSocket session.
pub struct ClientSession {
    /// Identity bound by a successful `authenticate`. Immutable once set.
    pub identity: Option<Identity>,
    pub subscriptions: HashSet<Topic>,
    /// Channel sender for outbound messages to this connection.
    pub sender: WsSender,
    pub connected_at: Timestamp,
    /// Last pong or client ping.
    pub last_seen: Timestamp,
    /// Liveness probes sent since the last sign of life.
    pub missed_probes: u32,
}

impl ClientSession {
    fn new(sender: WsSender) -> Self {
        let now = Utc::now();
        Self {
            identity: None,
            subscriptions: HashSet::new(),
            sender,
            connected_at: now,
            last_seen: now,
            missed_probes: 0,
        }
    }

    fn is_subscribed(&self, kind: EventKind) -> bool {
        self.subscriptions.contains(&Topic::All)
            || self.subscriptions.contains(&Topic::Event(kind))
    }

    /// Whether an event of `kind` addressed to `recipient` may reach this
    /// session. Addressed events never reach unauthenticated sessions.
    fn is_eligible(&self, kind: EventKind, recipient: Option<&str>) -> bool {
        self.is_subscribed(kind)
            && match recipient {
                None => true,
                Some(recipient) => self
                    .identity
                    .as_ref()
                    .is_some_and(|identity| identity.matches(recipient)),
            }
    }
}

/// Point-in-time counters for the realtime stats endpoint.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct RealtimeStats {
    pub total_clients: usize,
    pub authenticated_clients: usize,
    pub total_subscriptions: usize,
    pub subscriptions_by_event: BTreeMap<String, usize>,
}

/// Result of one liveness sweep.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct LivenessOutcome {
    pub probed: usize,
    pub evicted: usize,
}

/// Registry of live WebSocket sessions.
///
/// Owns every [`ClientSession`]; all mutations happen under a single write
/// guard. Thread-safe via interior `RwLock`; designed to be wrapped in `Arc`
/// and shared across the application.
pub struct Gateway {
    sessions: RwLock<HashMap<String, ClientSession>>,
    verifier: Arc<dyn IdentityVerifier>,
}

impl Gateway {
    /// Create an empty gateway that verifies identities with `verifier`.
    pub fn new(verifier: Arc<dyn IdentityVerifier>) -> Self {
        Self {
            sessions: RwLock::new(HashMap::new()),
            verifier,
        }
    }

    // -----------------------------------------------------------------------
    // Lifecycle
    // -----------------------------------------------------------------------

    /// Register a new session and greet it with `connected`.
    ///
    /// Returns the session id and the receiver half of its message channel
    /// so the caller can forward messages to the WebSocket sink.
    pub async fn accept(&self) -> (String, mpsc::UnboundedReceiver<Message>) {
        let session_id = uuid::Uuid::new_v4().to_string();
        let (tx, rx) = mpsc::unbounded_channel();

        let hello = ServerMessage::Connected {
            session_id: session_id.clone(),
            message: "Connected to realtime events".to_string(),
        };
        send(&session_id, &tx, &hello);

        self.sessions
            .write()
            .await
            .insert(session_id.clone(), ClientSession::new(tx));
        (session_id, rx)
    }

    /// Remove a session. Returns whether it was registered.
    pub async fn disconnect(&self, session_id: &str) -> bool {
        self.sessions.write().await.remove(session_id).is_some()
    }

    /// Notify every session of shutdown, send a Close frame, then clear the
    /// registry.
    pub async fn shutdown_all(&self) {
        let mut sessions = self.sessions.write().await;
        let count = sessions.len();
        let notice = ServerMessage::ServerShutdown {
            message: "Server is shutting down".to_string(),
        };
        for (id, session) in sessions.iter() {
            send(id, &session.sender, &notice);
            let _ = session.sender.send(Message::Close(None));
        }
        sessions.clear();
        tracing::info!(count, "Closed all WebSocket sessions");
    }

    // -----------------------------------------------------------------------
    // Client requests
    // -----------------------------------------------------------------------

    /// Bind a verified identity to the session.
    ///
    /// Replies `authenticated` on success and `auth_error` on failure; the
    /// session stays open either way. Re-authenticating as the same identity
    /// is acknowledged again, a different identity is refused.
    pub async fn authenticate(
        &self,
        session_id: &str,
        claimed: &str,
        proof: Option<&str>,
    ) -> Result<Identity, CoreError> {
        let mut sessions = self.sessions.write().await;
        let Some(session) = sessions.get_mut(session_id) else {
            return Err(unknown_session(session_id));
        };

        let verified = self.verifier.verify(claimed, proof).and_then(|identity| {
            match &session.identity {
                Some(bound) if *bound != identity => Err(CoreError::Forbidden(
                    "Session is already authenticated as a different identity".to_string(),
                )),
                _ => Ok(identity),
            }
        });

        match verified {
            Ok(identity) => {
                session.identity = Some(identity.clone());
                send(
                    session_id,
                    &session.sender,
                    &ServerMessage::Authenticated {
                        identity: identity.to_string(),
                        message: "Successfully authenticated".to_string(),
                    },
                );
                tracing::info!(session_id, identity = %identity, "WebSocket session authenticated");
                Ok(identity)
            }
            Err(e) => {
                let message = match &e {
                    CoreError::Validation(m) | CoreError::Forbidden(m) => m.clone(),
                    _ => "Authentication failed".to_string(),
                };
                send(session_id, &session.sender, &ServerMessage::AuthError { message });
                tracing::debug!(session_id, error = %e, "WebSocket authentication rejected");
                Err(e)
            }
        }
    }

    /// Add whitelisted topics from `events` to the session's subscriptions.
    ///
    /// Unknown names are dropped silently; the acknowledgment lists only the
    /// accepted topics. A non-array `events` is a validation error and is
    /// reported to the client with `error`.
    pub async fn subscribe(&self, session_id: &str, events: &Value) -> Result<Vec<Topic>, CoreError> {
        self.update_subscriptions(session_id, events, true).await
    }

    /// Remove whitelisted topics in `events` from the session's
    /// subscriptions.
    pub async fn unsubscribe(
        &self,
        session_id: &str,
        events: &Value,
    ) -> Result<Vec<Topic>, CoreError> {
        self.update_subscriptions(session_id, events, false).await
    }

    async fn update_subscriptions(
        &self,
        session_id: &str,
        events: &Value,
        add: bool,
    ) -> Result<Vec<Topic>, CoreError> {
        let mut sessions = self.sessions.write().await;
        let Some(session) = sessions.get_mut(session_id) else {
            return Err(unknown_session(session_id));
        };

        let Some(requested) = events.as_array() else {
            let message = "Events must be an array".to_string();
            send(session_id, &session.sender, &ServerMessage::error(message.clone()));
            return Err(CoreError::Validation(message));
        };
        let names: Vec<&str> = requested.iter().filter_map(Value::as_str).collect();
        let accepted = Topic::filter_whitelisted(&names);

        for topic in &accepted {
            if add {
                session.subscriptions.insert(*topic);
            } else {
                session.subscriptions.remove(topic);
            }
        }

        let events: Vec<String> = accepted.iter().map(|t| t.as_str().to_string()).collect();
        let reply = if add {
            ServerMessage::Subscribed {
                message: format!("Subscribed to {} event(s)", events.len()),
                events,
            }
        } else {
            ServerMessage::Unsubscribed {
                message: format!("Unsubscribed from {} event(s)", events.len()),
                events,
            }
        };
        send(session_id, &session.sender, &reply);
        tracing::debug!(session_id, add, count = accepted.len(), "Subscriptions updated");

        Ok(accepted)
    }

    /// Record a sign of life (pong frame or client ping).
    pub async fn touch(&self, session_id: &str) {
        if let Some(session) = self.sessions.write().await.get_mut(session_id) {
            session.missed_probes = 0;
            session.last_seen = Utc::now();
        }
    }

    /// Answer a client `ping` with `pong`.
    pub async fn handle_ping(&self, session_id: &str) {
        self.touch(session_id).await;
        self.push(session_id, &ServerMessage::Pong).await;
    }

    // -----------------------------------------------------------------------
    // Delivery
    // -----------------------------------------------------------------------

    /// Best-effort push to one session. Unknown ids and closed channels are
    /// silent no-ops. Returns whether the message was queued.
    pub async fn push(&self, session_id: &str, message: &ServerMessage) -> bool {
        let sessions = self.sessions.read().await;
        match sessions.get(session_id) {
            Some(session) => send(session_id, &session.sender, message),
            None => {
                tracing::debug!(session_id, "Push to unknown session dropped");
                false
            }
        }
    }

    /// Push one message to each of `session_ids`, encoding it once.
    ///
    /// Returns the number of sessions it was queued for.
    pub async fn push_many(&self, session_ids: &[String], message: &ServerMessage) -> usize {
        let Some(frame) = encode(message) else {
            return 0;
        };
        let sessions = self.sessions.read().await;
        session_ids
            .iter()
            .filter_map(|id| sessions.get(id).map(|s| (id, s)))
            .filter(|(id, session)| send_frame(id, &session.sender, frame.clone()))
            .count()
    }

    /// Push to every session bound to `identity`.
    pub async fn send_to_identity(&self, identity: &Identity, message: &ServerMessage) -> usize {
        let Some(frame) = encode(message) else {
            return 0;
        };
        let sessions = self.sessions.read().await;
        sessions
            .iter()
            .filter(|(_, s)| s.identity.as_ref() == Some(identity))
            .filter(|(id, session)| send_frame(id, &session.sender, frame.clone()))
            .count()
    }

    // -----------------------------------------------------------------------
    // Liveness
    // -----------------------------------------------------------------------

    /// Evict sessions that ignored [`MAX_MISSED_PROBES`] consecutive probes
    /// and probe everyone else with a Ping frame.
    pub async fn liveness_sweep(&self) -> LivenessOutcome {
        let mut sessions = self.sessions.write().await;
        let mut outcome = LivenessOutcome::default();

        sessions.retain(|id, session| {
            if session.missed_probes >= MAX_MISSED_PROBES {
                let _ = session.sender.send(Message::Close(None));
                tracing::info!(session_id = %id, "Evicting unresponsive WebSocket session");
                outcome.evicted += 1;
                return false;
            }
            session.missed_probes += 1;
            send_frame(id, &session.sender, Message::Ping(Bytes::new()));
            outcome.probed += 1;
            true
        });

        outcome
    }

    // -----------------------------------------------------------------------
    // Read-only accessors
    // -----------------------------------------------------------------------

    /// Ids of sessions that should receive an event of `kind` addressed to
    /// `recipient` (if any).
    pub async fn eligible_sessions(&self, kind: EventKind, recipient: Option<&str>) -> Vec<String> {
        self.sessions
            .read()
            .await
            .iter()
            .filter(|(_, s)| s.is_eligible(kind, recipient))
            .map(|(id, _)| id.clone())
            .collect()
    }

    /// Distinct identities bound to at least one live session, sorted.
    pub async fn live_identities(&self) -> Vec<Identity> {
        self.sessions
            .read()
            .await
            .values()
            .filter_map(|s| s.identity.clone())
            .collect::<BTreeSet<_>>()
            .into_iter()
            .collect()
    }

    pub async fn statistics(&self) -> RealtimeStats {
        let sessions = self.sessions.read().await;
        let mut stats = RealtimeStats {
            total_clients: sessions.len(),
            ..Default::default()
        };
        for session in sessions.values() {
            if session.identity.is_some() {
                stats.authenticated_clients += 1;
            }
            stats.total_subscriptions += session.subscriptions.len();
            for topic in &session.subscriptions {
                *stats
                    .subscriptions_by_event
                    .entry(topic.as_str().to_string())
                    .or_default() += 1;
            }
        }
        stats
    }

    pub async fn subscriptions(&self, session_id: &str) -> Option<HashSet<Topic>> {
        self.sessions
            .read()
            .await
            .get(session_id)
            .map(|s| s.subscriptions.clone())
    }

    pub async fn identity_of(&self, session_id: &str) -> Option<Identity> {
        self.sessions
            .read()
            .await
            .get(session_id)
            .and_then(|s| s.identity.clone())
    }

    /// Return the current number of live sessions.
    pub async fn connection_count(&self) -> usize {
        self.sessions.read().await.len()
    }
}

impl Default for Gateway {
    fn default() -> Self {
        Self::new(Arc::new(AddressFormatVerifier))
    }
}

fn unknown_session(session_id: &str) -> CoreError {
    CoreError::Validation(format!("Unknown session {session_id}"))
}

fn encode(message: &ServerMessage) -> Option<Message> {
    match message.encode() {
        Ok(frame) => Some(frame),
        Err(e) => {
            tracing::error!(error = %e, "Failed to encode WebSocket message");
            None
        }
    }
}

fn send(session_id: &str, sender: &WsSender, message: &ServerMessage) -> bool {
    encode(message).is_some_and(|frame| send_frame(session_id, sender, frame))
}

fn send_frame(session_id: &str, sender: &WsSender, frame: Message) -> bool {
    if sender.send(frame).is_err() {
        tracing::debug!(session_id, "WebSocket channel closed, message dropped");
        return false;
    }
    true
}
