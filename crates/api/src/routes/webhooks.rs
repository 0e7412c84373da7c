//! Webhook subscription routes and the inbound receiver.

use axum::{
    body::Bytes,
    extract::{Path, Query, State},
    http::{HeaderMap, StatusCode},
    response::IntoResponse,
    routing::{get, post},
    Json, Router,
};
use chrono::Utc;
use domain::models::webhook::{
    CreateWebhookRequest, ListWebhooksQuery, ListWebhooksResponse, UpdateWebhookRequest,
    WebhookResponse, WebhookStats,
};
use domain::models::webhook_delivery::{ListDeliveriesQuery, ListDeliveriesResponse};
use domain::models::{AuditAction, Webhook};
use persistence::repositories::{WebhookDeliveryRepository, WebhookRepository};
use serde_json::{json, Value as JsonValue};
use shared::crypto::{generate_secret, verify_hmac_sha256};
use shared::pagination::clamp_limit;
use tracing::{info, warn};
use uuid::Uuid;
use validator::Validate;

use crate::app::AppState;
use crate::error::ApiError;
use crate::extractors::Actor;
use crate::services::webhook_delivery::SIGNATURE_HEADER;

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/", get(list_webhooks).post(create_webhook))
        .route("/incoming/:source", post(receive_webhook))
        .route(
            "/:id",
            get(get_webhook).patch(update_webhook).delete(delete_webhook),
        )
        .route("/:id/test", post(test_webhook))
        .route("/:id/deliveries", get(list_deliveries))
        .route("/:id/stats", get(webhook_stats))
}

async fn load(state: &AppState, id: Uuid) -> Result<Webhook, ApiError> {
    WebhookRepository::new(state.pool.clone())
        .find_by_id(id)
        .await?
        .ok_or_else(|| ApiError::NotFound(format!("Webhook {} not found", id)))
}

async fn audit_webhook(state: &AppState, actor: &Actor, action: AuditAction, webhook: &Webhook, description: String) {
    state
        .audit
        .record_or_warn(
            actor
                .audit(action)
                .on_resource("webhook", webhook.id)
                .describe(description)
                .with_extra(json!({ "url": webhook.url, "events": webhook.events }))
                .build(),
        )
        .await;
}

/// POST /api/v1/webhooks
///
/// A blank or missing secret is replaced by a generated one. The response
/// carries the secret so the subscriber can verify signatures.
pub async fn create_webhook(
    State(state): State<AppState>,
    actor: Actor,
    Json(request): Json<CreateWebhookRequest>,
) -> Result<impl IntoResponse, ApiError> {
    request.validate()?;

    let secret = request
        .secret
        .as_deref()
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .unwrap_or_else(generate_secret);

    let webhook = WebhookRepository::new(state.pool.clone())
        .create(&request, &secret, actor.id)
        .await?;

    info!(webhook_id = %webhook.id, name = %webhook.name, events = ?webhook.events, "Webhook created");
    audit_webhook(
        &state,
        &actor,
        AuditAction::WebhookCreate,
        &webhook,
        format!("Webhook {} created", webhook.name),
    )
    .await;

    Ok((StatusCode::CREATED, Json(WebhookResponse::from(webhook))))
}

pub async fn list_webhooks(
    State(state): State<AppState>,
    Query(query): Query<ListWebhooksQuery>,
) -> Result<impl IntoResponse, ApiError> {
    let (webhooks, total) = WebhookRepository::new(state.pool.clone())
        .list(clamp_limit(query.limit), query.offset.unwrap_or(0).max(0))
        .await?;
    Ok(Json(ListWebhooksResponse {
        webhooks: webhooks.into_iter().map(WebhookResponse::from).collect(),
        total,
    }))
}

pub async fn get_webhook(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<impl IntoResponse, ApiError> {
    Ok(Json(WebhookResponse::from(load(&state, id).await?)))
}

/// PATCH /api/v1/webhooks/:id
pub async fn update_webhook(
    State(state): State<AppState>,
    actor: Actor,
    Path(id): Path<Uuid>,
    Json(request): Json<UpdateWebhookRequest>,
) -> Result<impl IntoResponse, ApiError> {
    request.validate()?;
    let mut webhook = load(&state, id).await?;
    webhook.apply_update(&request);

    let webhook = WebhookRepository::new(state.pool.clone())
        .update(&webhook)
        .await?
        .ok_or_else(|| ApiError::NotFound(format!("Webhook {} not found", id)))?;

    info!(webhook_id = %webhook.id, status = webhook.status.as_str(), "Webhook updated");
    audit_webhook(
        &state,
        &actor,
        AuditAction::WebhookUpdate,
        &webhook,
        format!("Webhook {} updated", webhook.name),
    )
    .await;
    Ok(Json(WebhookResponse::from(webhook)))
}

pub async fn delete_webhook(
    State(state): State<AppState>,
    actor: Actor,
    Path(id): Path<Uuid>,
) -> Result<impl IntoResponse, ApiError> {
    let webhook = load(&state, id).await?;
    if !WebhookRepository::new(state.pool.clone()).delete(id).await? {
        return Err(ApiError::NotFound(format!("Webhook {} not found", id)));
    }

    info!(webhook_id = %id, "Webhook deleted");
    audit_webhook(
        &state,
        &actor,
        AuditAction::WebhookDelete,
        &webhook,
        format!("Webhook {} deleted", webhook.name),
    )
    .await;
    Ok(StatusCode::NO_CONTENT)
}

/// POST /api/v1/webhooks/:id/test
pub async fn test_webhook(
    State(state): State<AppState>,
    actor: Actor,
    Path(id): Path<Uuid>,
) -> Result<impl IntoResponse, ApiError> {
    let webhook = load(&state, id).await?;
    let delivery = state.webhooks.send_test(&webhook).await?;

    audit_webhook(
        &state,
        &actor,
        AuditAction::WebhookTest,
        &webhook,
        format!("Test delivery {} sent to {}", delivery.id, webhook.name),
    )
    .await;
    Ok(Json(delivery))
}

/// GET /api/v1/webhooks/:id/deliveries?status=
pub async fn list_deliveries(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Query(query): Query<ListDeliveriesQuery>,
) -> Result<impl IntoResponse, ApiError> {
    load(&state, id).await?;
    let (deliveries, total) = WebhookDeliveryRepository::new(state.pool.clone())
        .list_by_webhook(
            id,
            query.status,
            clamp_limit(query.limit),
            query.offset.unwrap_or(0).max(0),
        )
        .await?;
    Ok(Json(ListDeliveriesResponse { deliveries, total }))
}

pub async fn webhook_stats(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<impl IntoResponse, ApiError> {
    let webhook = load(&state, id).await?;
    let counts = WebhookDeliveryRepository::new(state.pool.clone())
        .counts_for_webhook(id)
        .await?;

    Ok(Json(WebhookStats {
        webhook_id: webhook.id,
        success_count: webhook.success_count,
        failure_count: webhook.failure_count,
        success_rate: webhook.success_rate(),
        deliveries_total: counts.total,
        deliveries_pending: counts.pending,
        deliveries_success: counts.success,
        deliveries_failed: counts.failed,
        last_success: webhook.last_success,
        last_failure: webhook.last_failure,
        last_error: webhook.last_error,
    }))
}

/// Verifies an inbound body against the source secret and parses it.
///
/// Without a configured secret the body is accepted unsigned.
pub fn accept_inbound(
    secret: Option<&str>,
    signature: Option<&str>,
    body: &[u8],
) -> Result<JsonValue, ApiError> {
    if let Some(secret) = secret {
        let valid = signature
            .map(|sig| verify_hmac_sha256(secret, body, sig))
            .unwrap_or(false);
        if !valid {
            return Err(ApiError::Unauthorized("Invalid webhook signature".to_string()));
        }
    }

    serde_json::from_slice(body)
        .map_err(|_| ApiError::Validation("Webhook body must be valid JSON".to_string()))
}

/// POST /api/v1/webhooks/incoming/:source
pub async fn receive_webhook(
    State(state): State<AppState>,
    Path(source): Path<String>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<impl IntoResponse, ApiError> {
    let secret = state
        .config
        .webhooks
        .inbound_secrets
        .get(&source)
        .map(String::as_str);
    let signature = headers
        .get(SIGNATURE_HEADER)
        .and_then(|value| value.to_str().ok());

    let payload = match accept_inbound(secret, signature, &body) {
        Ok(payload) => payload,
        Err(e) => {
            warn!(source = %source, error = %e, "Inbound webhook rejected");
            return Err(e);
        }
    };

    info!(
        source = %source,
        bytes = body.len(),
        event = payload.get("event").and_then(JsonValue::as_str).unwrap_or("unknown"),
        "Inbound webhook received"
    );

    Ok(Json(json!({
        "status": "received",
        "source": source,
        "timestamp": Utc::now(),
    })))
}

#[cfg(test)]
mod tests {
    use super::*;
    use shared::crypto::sign_hmac_sha256;

    const BODY: &[u8] = br#"{"event":"payment.completed","amount":500000}"#;

    #[test]
    fn test_unsigned_source_accepts_json() {
        let payload = accept_inbound(None, None, BODY).unwrap();
        assert_eq!(payload["event"], "payment.completed");
    }

    #[test]
    fn test_signed_source_accepts_valid_signature_with_or_without_prefix() {
        let digest = sign_hmac_sha256("treasury-secret", BODY).unwrap();
        assert!(accept_inbound(Some("treasury-secret"), Some(&digest), BODY).is_ok());

        let prefixed = format!("sha256={}", digest);
        assert!(accept_inbound(Some("treasury-secret"), Some(&prefixed), BODY).is_ok());
    }

    #[test]
    fn test_signed_source_rejects_missing_or_wrong_signature() {
        let missing = accept_inbound(Some("treasury-secret"), None, BODY);
        assert!(matches!(missing, Err(ApiError::Unauthorized(_))));

        let digest = sign_hmac_sha256("other-secret", BODY).unwrap();
        let wrong = accept_inbound(Some("treasury-secret"), Some(&digest), BODY);
        assert!(matches!(wrong, Err(ApiError::Unauthorized(_))));
    }

    #[test]
    fn test_non_json_body_is_rejected() {
        let result = accept_inbound(None, None, b"not json");
        assert!(matches!(result, Err(ApiError::Validation(_))));
    }
}
