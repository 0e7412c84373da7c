//! Notification inbox, preferences and administrator broadcasts.
//!
//! The inbox endpoints act on the notifications of the caller named in
//! `X-Actor-Id`.

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::IntoResponse,
    routing::{delete, get, post},
    Json, Router,
};
use domain::models::notification::{
    BulkNotificationRequest, BulkNotificationResponse, ListNotificationsQuery,
    ListNotificationsResponse, UnreadCountResponse, UpdatePreferencesRequest,
};
use domain::models::{AuditAction, NewNotification, NotificationType};
use persistence::repositories::NotificationRepository;
use serde_json::json;
use shared::pagination::clamp_limit;
use tracing::info;
use uuid::Uuid;
use validator::Validate;

use crate::app::AppState;
use crate::error::ApiError;
use crate::extractors::Actor;

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/", get(list_notifications))
        .route("/unread-count", get(unread_count))
        .route("/read-all", post(mark_all_read))
        .route("/preferences", get(get_preferences).put(update_preferences))
        .route("/bulk", post(bulk_notify))
        .route("/:id/read", post(mark_read))
        .route("/:id", delete(delete_notification))
}

/// GET /api/v1/notifications?unread_only=
pub async fn list_notifications(
    State(state): State<AppState>,
    actor: Actor,
    Query(query): Query<ListNotificationsQuery>,
) -> Result<impl IntoResponse, ApiError> {
    let recipient = actor.require_id()?;
    let repo = NotificationRepository::new(state.pool.clone());
    let notifications = repo
        .list_for_recipient(
            recipient,
            query.unread_only.unwrap_or(false),
            clamp_limit(query.limit),
            query.offset.unwrap_or(0).max(0),
        )
        .await?;
    let unread = repo.count_unread(recipient).await?;
    Ok(Json(ListNotificationsResponse {
        notifications,
        unread,
    }))
}

pub async fn unread_count(
    State(state): State<AppState>,
    actor: Actor,
) -> Result<impl IntoResponse, ApiError> {
    let recipient = actor.require_id()?;
    let unread = NotificationRepository::new(state.pool.clone())
        .count_unread(recipient)
        .await?;
    Ok(Json(UnreadCountResponse { unread }))
}

pub async fn mark_read(
    State(state): State<AppState>,
    actor: Actor,
    Path(id): Path<Uuid>,
) -> Result<impl IntoResponse, ApiError> {
    let recipient = actor.require_id()?;
    let updated = NotificationRepository::new(state.pool.clone())
        .mark_read(id, recipient)
        .await?;
    if !updated {
        return Err(ApiError::NotFound(format!("Notification {} not found", id)));
    }
    Ok(StatusCode::NO_CONTENT)
}

pub async fn mark_all_read(
    State(state): State<AppState>,
    actor: Actor,
) -> Result<impl IntoResponse, ApiError> {
    let recipient = actor.require_id()?;
    let updated = NotificationRepository::new(state.pool.clone())
        .mark_all_read(recipient)
        .await?;
    Ok(Json(json!({ "updated": updated })))
}

pub async fn delete_notification(
    State(state): State<AppState>,
    actor: Actor,
    Path(id): Path<Uuid>,
) -> Result<impl IntoResponse, ApiError> {
    let recipient = actor.require_id()?;
    let deleted = NotificationRepository::new(state.pool.clone())
        .delete(id, recipient)
        .await?;
    if !deleted {
        return Err(ApiError::NotFound(format!("Notification {} not found", id)));
    }
    Ok(StatusCode::NO_CONTENT)
}

pub async fn get_preferences(
    State(state): State<AppState>,
    actor: Actor,
) -> Result<impl IntoResponse, ApiError> {
    let user_id = actor.require_id()?;
    Ok(Json(state.notifications.preferences(user_id).await?))
}

pub async fn update_preferences(
    State(state): State<AppState>,
    actor: Actor,
    Json(request): Json<UpdatePreferencesRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let user_id = actor.require_id()?;
    request.validate()?;
    Ok(Json(
        state
            .notifications
            .update_preferences(user_id, &request)
            .await?,
    ))
}

/// POST /api/v1/notifications/bulk
///
/// In-app only; broadcasts never send email.
pub async fn bulk_notify(
    State(state): State<AppState>,
    actor: Actor,
    Json(request): Json<BulkNotificationRequest>,
) -> Result<impl IntoResponse, ApiError> {
    request.validate()?;
    let notification_type = request.notification_type.unwrap_or(NotificationType::Info);
    let batch: Vec<NewNotification> = request
        .recipient_ids
        .iter()
        .map(|&recipient| {
            let mut new = NewNotification::new(
                recipient,
                notification_type,
                request.title.clone(),
                request.message.clone(),
            );
            if let Some(priority) = request.priority {
                new = new.priority(priority);
            }
            new
        })
        .collect();

    let created = state.notifications.create_many(batch).await;

    state
        .audit
        .record_or_warn(
            actor
                .audit(AuditAction::NotificationBulk)
                .on_resource_type("notification")
                .describe(format!("Broadcast \"{}\" to {} users", request.title, created))
                .with_extra(json!({
                    "requested": request.recipient_ids.len(),
                    "created": created,
                }))
                .build(),
        )
        .await;

    info!(
        requested = request.recipient_ids.len(),
        created,
        "Bulk notification sent"
    );
    Ok(Json(BulkNotificationResponse { created }))
}
