//! External service and health check entities.

use chrono::{DateTime, Utc};
use domain::models::{ExternalService, HealthCheck};
use sqlx::types::Json;
use sqlx::FromRow;
use std::collections::HashMap;
use uuid::Uuid;

use super::decode_text;

/// Database row mapping for the external_services table.
#[derive(Debug, Clone, FromRow)]
pub struct ExternalServiceEntity {
    pub id: Uuid,
    pub name: String,
    pub base_url: String,
    pub headers: Json<HashMap<String, String>>,
    pub status: String,
    pub last_check: Option<DateTime<Utc>>,
    pub response_time_ms: Option<i64>,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
}

impl TryFrom<ExternalServiceEntity> for ExternalService {
    type Error = sqlx::Error;

    fn try_from(entity: ExternalServiceEntity) -> Result<Self, Self::Error> {
        Ok(Self {
            id: entity.id,
            name: entity.name,
            base_url: entity.base_url,
            headers: entity.headers.0,
            status: decode_text("status", &entity.status)?,
            last_check: entity.last_check,
            response_time_ms: entity.response_time_ms,
            is_active: entity.is_active,
            created_at: entity.created_at,
        })
    }
}

/// Database row mapping for the health_checks table.
#[derive(Debug, Clone, FromRow)]
pub struct HealthCheckEntity {
    pub id: Uuid,
    pub service_id: Uuid,
    pub status: String,
    pub response_time_ms: Option<i64>,
    pub status_code: Option<i32>,
    pub error_message: Option<String>,
    pub checked_at: DateTime<Utc>,
}

impl TryFrom<HealthCheckEntity> for HealthCheck {
    type Error = sqlx::Error;

    fn try_from(entity: HealthCheckEntity) -> Result<Self, Self::Error> {
        Ok(Self {
            id: entity.id,
            service_id: entity.service_id,
            status: decode_text("status", &entity.status)?,
            response_time_ms: entity.response_time_ms,
            status_code: entity.status_code,
            error_message: entity.error_message,
            checked_at: entity.checked_at,
        })
    }
}
