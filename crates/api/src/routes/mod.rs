use axum::routing::get;
use axum::Router;

use crate::state::AppState;
use crate::ws;

pub mod health;
pub mod notification;

/// All routes mounted under `/api/v1`.
///
/// ```text
/// GET  /ws               -> WebSocket upgrade
///      /notifications/*  -> notification::router
/// ```
pub fn api_routes() -> Router<AppState> {
    Router::new()
        .route("/ws", get(ws::ws_handler))
        .nest("/notifications", notification::router())
}
