use std::sync::Arc;

use civic_core::identity::{AddressFormatVerifier, IdentityVerifier};
use civic_db::NotificationStore;
use civic_events::EventBus;

use crate::config::ServerConfig;
use crate::notifications::NotificationService;
use crate::ws::Gateway;

/// Shared application state available to all Axum handlers via `State<AppState>`.
///
/// This is cheaply cloneable (inner data is behind `Arc`).
#[derive(Clone)]
pub struct AppState {
    /// Server configuration (JWT settings are read by the auth extractor).
    pub config: Arc<ServerConfig>,
    /// Live WebSocket session registry.
    pub gateway: Arc<Gateway>,
    /// Notification orchestrator.
    pub notifications: Arc<NotificationService>,
    /// In-process event bus. Producers get a publisher from it.
    pub event_bus: Arc<EventBus>,
}

impl AppState {
    /// Wire the gateway, bus and service around `store`, verifying session
    /// identities by address format.
    pub fn new(config: ServerConfig, store: Arc<dyn NotificationStore>) -> Self {
        Self::with_verifier(config, store, Arc::new(AddressFormatVerifier))
    }

    pub fn with_verifier(
        config: ServerConfig,
        store: Arc<dyn NotificationStore>,
        verifier: Arc<dyn IdentityVerifier>,
    ) -> Self {
        let gateway = Arc::new(Gateway::new(verifier));
        let notifications = Arc::new(NotificationService::new(store, Arc::clone(&gateway)));
        Self {
            config: Arc::new(config),
            gateway,
            notifications,
            event_bus: Arc::new(EventBus::default()),
        }
    }
}
