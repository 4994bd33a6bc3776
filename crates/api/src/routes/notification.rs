//! Route definitions for the `/notifications` resource.
//!
//! All endpoints require authentication.

use axum::routing::{delete, get, post};
use axum::Router;

use crate::handlers::notification;
use crate::state::AppState;

/// Routes mounted at `/notifications`.
///
/// ```text
/// GET    /                 -> list_notifications
/// GET    /unread-count     -> unread_count
/// POST   /read-all         -> mark_all_read
/// POST   /{id}/read        -> mark_read
/// DELETE /{id}             -> delete_notification
///
/// GET    /templates        -> list_templates
/// POST   /test             -> send_test
///
/// POST   /broadcast        -> broadcast (admin)
/// GET    /stats            -> stats (admin)
/// ```
pub fn router() -> Router<AppState> {
    Router::new()
        // Core notification endpoints
        .route("/", get(notification::list_notifications))
        .route("/unread-count", get(notification::unread_count))
        .route("/read-all", post(notification::mark_all_read))
        .route("/{id}/read", post(notification::mark_read))
        .route("/{id}", delete(notification::delete_notification))
        // Templates
        .route("/templates", get(notification::list_templates))
        .route("/test", post(notification::send_test))
        // Admin
        .route("/broadcast", post(notification::broadcast))
        .route("/stats", get(notification::stats))
}
