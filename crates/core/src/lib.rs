//! Domain types and pure logic for the civic notification service.
//!
//! Nothing in this crate performs I/O. The database adapters live in
//! `civic-db`, the event bus in `civic-events` and the HTTP/WebSocket
//! surface in `civic-api`.

pub mod error;
pub mod identity;
pub mod kinds;
pub mod notification;
pub mod roles;
pub mod template;
pub mod types;
