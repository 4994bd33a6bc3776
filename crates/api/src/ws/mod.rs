//! WebSocket infrastructure for real-time delivery.
//!
//! Provides the session registry ([`Gateway`]), the JSON wire protocol,
//! liveness monitoring, and the HTTP upgrade handler used by Axum routes.

mod handler;
mod heartbeat;
pub mod manager;
pub mod protocol;

pub use handler::{dispatch, ws_handler};
pub use heartbeat::{start_heartbeat, LivenessMonitor};
pub use manager::{Gateway, RealtimeStats};
pub use protocol::{ClientMessage, ServerMessage};
