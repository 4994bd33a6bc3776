//! Handlers for the `/notifications` resource.
//!
//! All endpoints require authentication via [`AuthIdentity`]; broadcast and
//! stats additionally require the admin role.

use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::Json;
use civic_core::identity::Identity;
use civic_core::notification::{NotificationContent, NotificationKind, Priority};
use civic_core::template::{Template, TemplateSource, TEMPLATES};
use civic_core::types::{DbId, Timestamp};
use civic_db::models::notification::{NotificationFilter, Page};
use serde::Deserialize;
use serde_json::{json, Map, Value};

use crate::error::AppResult;
use crate::middleware::auth::AuthIdentity;
use crate::middleware::rbac::RequireAdmin;
use crate::notifications::NotifyOptions;
use crate::response::DataResponse;
use crate::state::AppState;

// ---------------------------------------------------------------------------
// Request types
// ---------------------------------------------------------------------------

/// Query parameters for `GET /notifications`.
#[derive(Debug, Deserialize)]
pub struct NotificationQuery {
    /// If `true`, return only unread notifications. Defaults to `false`.
    pub unread_only: Option<bool>,
    pub kind: Option<NotificationKind>,
    pub priority: Option<Priority>,
    /// Maximum number of results. Defaults to 50, capped at 100.
    pub limit: Option<i64>,
    /// Number of results to skip. Defaults to 0.
    pub offset: Option<i64>,
}

/// Body for `POST /notifications/test`. Every field is optional.
#[derive(Debug, Default, Deserialize)]
pub struct TestNotificationRequest {
    /// Template key or custom content. Defaults to a fixed test message.
    pub template: Option<TemplateSource>,
    #[serde(default)]
    pub data: Map<String, Value>,
}

/// Body for `POST /notifications/broadcast`.
#[derive(Debug, Deserialize)]
pub struct BroadcastRequest {
    pub announcement: TemplateSource,
    #[serde(default)]
    pub data: Map<String, Value>,
    /// Explicit recipients. When absent, every identity online right now.
    pub targets: Option<Vec<String>>,
    pub priority: Option<Priority>,
    pub expires_at: Option<Timestamp>,
}

// ---------------------------------------------------------------------------
// Recipient endpoints
// ---------------------------------------------------------------------------

/// GET /api/v1/notifications
///
/// One page of the caller's live notifications, highest priority first,
/// plus the caller's total unread count.
pub async fn list_notifications(
    auth: AuthIdentity,
    State(state): State<AppState>,
    Query(params): Query<NotificationQuery>,
) -> AppResult<impl IntoResponse> {
    let filter = NotificationFilter {
        unread_only: params.unread_only.unwrap_or(false),
        kind: params.kind,
        priority: params.priority,
    };
    let page = Page::new(params.limit, params.offset);

    let result = state
        .notifications
        .list(&auth.identity, &filter, page)
        .await?;

    Ok(Json(DataResponse { data: result }))
}

/// GET /api/v1/notifications/unread-count
pub async fn unread_count(
    auth: AuthIdentity,
    State(state): State<AppState>,
) -> AppResult<impl IntoResponse> {
    let count = state.notifications.unread_count(&auth.identity).await?;

    Ok(Json(DataResponse {
        data: json!({ "count": count }),
    }))
}

/// POST /api/v1/notifications/{id}/read
///
/// Returns 204 No Content on success, or 404 if the notification does not
/// belong to the caller. Marking an already-read notification succeeds.
pub async fn mark_read(
    auth: AuthIdentity,
    State(state): State<AppState>,
    Path(notification_id): Path<DbId>,
) -> AppResult<impl IntoResponse> {
    state
        .notifications
        .mark_read(notification_id, &auth.identity)
        .await?;

    Ok(StatusCode::NO_CONTENT)
}

/// POST /api/v1/notifications/read-all
///
/// Returns the number of notifications that were marked.
pub async fn mark_all_read(
    auth: AuthIdentity,
    State(state): State<AppState>,
) -> AppResult<impl IntoResponse> {
    let count = state.notifications.mark_all_read(&auth.identity).await?;

    Ok(Json(DataResponse {
        data: json!({ "marked_read": count }),
    }))
}

/// DELETE /api/v1/notifications/{id}
pub async fn delete_notification(
    auth: AuthIdentity,
    State(state): State<AppState>,
    Path(notification_id): Path<DbId>,
) -> AppResult<impl IntoResponse> {
    state
        .notifications
        .delete(notification_id, &auth.identity)
        .await?;

    Ok(StatusCode::NO_CONTENT)
}

/// GET /api/v1/notifications/templates
pub async fn list_templates(_auth: AuthIdentity) -> Json<DataResponse<&'static [Template]>> {
    Json(DataResponse { data: TEMPLATES })
}

/// POST /api/v1/notifications/test
///
/// Send a notification to the caller, pushed to their live sessions too.
pub async fn send_test(
    auth: AuthIdentity,
    State(state): State<AppState>,
    body: Option<Json<TestNotificationRequest>>,
) -> AppResult<impl IntoResponse> {
    let request = body.map(|Json(r)| r).unwrap_or_default();
    let source = request.template.unwrap_or_else(default_test_content);

    let delivery = state
        .notifications
        .notify(&auth.identity, &source, request.data, NotifyOptions::default())
        .await?;

    Ok((
        StatusCode::CREATED,
        Json(DataResponse {
            data: delivery.notification,
        }),
    ))
}

fn default_test_content() -> TemplateSource {
    TemplateSource::Custom(NotificationContent {
        title: "Test Notification 🧪".to_string(),
        message: "This is a test notification to verify the notification system is working."
            .to_string(),
        kind: NotificationKind::Info,
        priority: Priority::Medium,
        action: None,
    })
}

// ---------------------------------------------------------------------------
// Admin endpoints
// ---------------------------------------------------------------------------

/// POST /api/v1/notifications/broadcast
pub async fn broadcast(
    RequireAdmin(admin): RequireAdmin,
    State(state): State<AppState>,
    Json(request): Json<BroadcastRequest>,
) -> AppResult<impl IntoResponse> {
    let targets = request
        .targets
        .map(|raw| {
            raw.iter()
                .map(|t| Identity::parse(t))
                .collect::<Result<Vec<_>, _>>()
        })
        .transpose()?;

    tracing::info!(
        admin = %admin.identity,
        targeted = targets.is_some(),
        "Admin broadcast requested"
    );

    let report = state
        .notifications
        .broadcast(
            &request.announcement,
            request.data,
            NotifyOptions {
                priority: request.priority,
                expires_at: request.expires_at,
                idempotency_key: None,
            },
            targets,
        )
        .await?;

    Ok(Json(DataResponse { data: report }))
}

/// GET /api/v1/notifications/stats
pub async fn stats(
    RequireAdmin(_admin): RequireAdmin,
    State(state): State<AppState>,
) -> AppResult<impl IntoResponse> {
    let stats = state.notifications.stats().await?;

    Ok(Json(DataResponse { data: stats }))
}
