//! Notification routing and delivery.
//!
//! - [`EventRouter`] pushes bus events to subscribed live sessions.
//! - [`NotificationService`] renders, persists and pushes notifications, and
//!   turns chain events into templated notifications.

pub mod router;
pub mod service;

pub use router::EventRouter;
pub use service::{BroadcastReport, NotificationService, NotifyOptions};
