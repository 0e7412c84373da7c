//! Webhook delivery entity (database row mapping).

use chrono::{DateTime, Utc};
use domain::models::WebhookDelivery;
use sqlx::FromRow;
use uuid::Uuid;

use super::decode_text;

/// Database row mapping for the webhook_deliveries table.
#[derive(Debug, Clone, FromRow)]
pub struct WebhookDeliveryEntity {
    pub id: Uuid,
    pub webhook_id: Uuid,
    pub event: String,
    pub payload: serde_json::Value,
    pub status: String,
    pub http_status: Option<i32>,
    pub response_body: Option<String>,
    pub error_message: Option<String>,
    pub attempts: i32,
    pub max_attempts: i32,
    pub next_retry: Option<DateTime<Utc>>,
    pub delivered_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl TryFrom<WebhookDeliveryEntity> for WebhookDelivery {
    type Error = sqlx::Error;

    fn try_from(entity: WebhookDeliveryEntity) -> Result<Self, Self::Error> {
        Ok(Self {
            id: entity.id,
            webhook_id: entity.webhook_id,
            event: entity.event,
            payload: entity.payload,
            status: decode_text("status", &entity.status)?,
            http_status: entity.http_status,
            response_body: entity.response_body,
            error_message: entity.error_message,
            attempts: entity.attempts,
            max_attempts: entity.max_attempts,
            next_retry: entity.next_retry,
            delivered_at: entity.delivered_at,
            created_at: entity.created_at,
            updated_at: entity.updated_at,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use domain::models::DeliveryStatus;

    #[test]
    fn test_delivery_entity_conversion() {
        let entity = WebhookDeliveryEntity {
            id: Uuid::new_v4(),
            webhook_id: Uuid::new_v4(),
            event: "request.created".into(),
            payload: serde_json::json!({"event": "request.created"}),
            status: "retry".into(),
            http_status: Some(500),
            response_body: Some("boom".into()),
            error_message: Some("HTTP 500: boom".into()),
            attempts: 2,
            max_attempts: 3,
            next_retry: Some(Utc::now()),
            delivered_at: None,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        };
        let delivery = WebhookDelivery::try_from(entity).unwrap();
        assert_eq!(delivery.status, DeliveryStatus::Retry);
        assert!(!delivery.is_exhausted());
    }
}
