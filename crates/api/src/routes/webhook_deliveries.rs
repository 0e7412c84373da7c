//! Single delivery lookup and manual retrigger.

use axum::{
    extract::{Path, State},
    response::IntoResponse,
    routing::{get, post},
    Json, Router,
};
use domain::models::AuditAction;
use persistence::repositories::WebhookDeliveryRepository;
use serde_json::json;
use uuid::Uuid;

use crate::app::AppState;
use crate::error::ApiError;
use crate::extractors::Actor;

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/:id", get(get_delivery))
        .route("/:id/retry", post(retry_delivery))
}

pub async fn get_delivery(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<impl IntoResponse, ApiError> {
    let delivery = WebhookDeliveryRepository::new(state.pool.clone())
        .find_by_id(id)
        .await?
        .ok_or_else(|| ApiError::NotFound(format!("Delivery {} not found", id)))?;
    Ok(Json(delivery))
}

/// POST /api/v1/webhook-deliveries/:id/retry
///
/// Resets the attempt budget and attempts the delivery once, now.
pub async fn retry_delivery(
    State(state): State<AppState>,
    actor: Actor,
    Path(id): Path<Uuid>,
) -> Result<impl IntoResponse, ApiError> {
    let delivery = state.webhooks.retrigger(id).await?;

    state
        .audit
        .record_or_warn(
            actor
                .audit(AuditAction::WebhookRetrigger)
                .on_resource("webhook_delivery", delivery.id)
                .describe(format!("Delivery {} retriggered", delivery.id))
                .with_extra(json!({
                    "webhook_id": delivery.webhook_id,
                    "event": delivery.event,
                    "status": delivery.status,
                }))
                .build(),
        )
        .await;

    Ok(Json(delivery))
}
