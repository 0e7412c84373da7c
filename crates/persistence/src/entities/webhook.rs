//! Webhook entity (database row mapping).

use chrono::{DateTime, Utc};
use domain::models::Webhook;
use sqlx::types::Json;
use sqlx::FromRow;
use std::collections::HashMap;
use uuid::Uuid;

use super::decode_text;

/// Database row mapping for the webhooks table.
#[derive(Debug, Clone, FromRow)]
pub struct WebhookEntity {
    pub id: Uuid,
    pub name: String,
    pub url: String,
    pub description: Option<String>,
    pub events: Vec<String>,
    pub secret: Option<String>,
    pub headers: Json<HashMap<String, String>>,
    pub status: String,
    pub is_active: bool,
    pub success_count: i64,
    pub failure_count: i64,
    pub last_success: Option<DateTime<Utc>>,
    pub last_failure: Option<DateTime<Utc>>,
    pub last_error: Option<String>,
    pub created_by: Option<Uuid>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl TryFrom<WebhookEntity> for Webhook {
    type Error = sqlx::Error;

    fn try_from(entity: WebhookEntity) -> Result<Self, Self::Error> {
        Ok(Self {
            id: entity.id,
            name: entity.name,
            url: entity.url,
            description: entity.description,
            events: entity.events,
            secret: entity.secret,
            headers: entity.headers.0,
            status: decode_text("status", &entity.status)?,
            is_active: entity.is_active,
            success_count: entity.success_count,
            failure_count: entity.failure_count,
            last_success: entity.last_success,
            last_failure: entity.last_failure,
            last_error: entity.last_error,
            created_by: entity.created_by,
            created_at: entity.created_at,
            updated_at: entity.updated_at,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use domain::models::WebhookStatus;

    #[test]
    fn test_webhook_entity_conversion() {
        let entity = WebhookEntity {
            id: Uuid::new_v4(),
            name: "ERP".into(),
            url: "https://erp.example/hooks".into(),
            description: None,
            events: vec!["title.created".into()],
            secret: Some("s3cret".into()),
            headers: Json(HashMap::from([("X-Tenant".to_string(), "arpt".to_string())])),
            status: "active".into(),
            is_active: true,
            success_count: 4,
            failure_count: 1,
            last_success: None,
            last_failure: None,
            last_error: None,
            created_by: None,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        };
        let webhook = Webhook::try_from(entity).unwrap();
        assert_eq!(webhook.status, WebhookStatus::Active);
        assert_eq!(webhook.headers["X-Tenant"], "arpt");
        assert!(webhook.is_deliverable());
    }
}
