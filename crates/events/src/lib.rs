//! Civic event bus and typed chain events.
//!
//! - [`EventBus`] is the in-process publish/subscribe hub backed by
//!   `tokio::sync::broadcast`.
//! - [`DomainEvent`] is the canonical event envelope routed to live sessions.
//! - [`EventPublisher`] is the submit handle given to producers at
//!   construction.
//! - [`ChainEvent`] is the typed form of contract events, converted into
//!   [`DomainEvent`]s before publication.

pub mod bus;
pub mod chain;

pub use bus::{DomainEvent, EventBus, EventPublisher};
pub use chain::{ChainEvent, ChainMeta};
