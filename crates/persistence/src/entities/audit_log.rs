//! Audit log entity (database row mapping).

use chrono::{DateTime, Utc};
use domain::models::AuditLog;
use sqlx::FromRow;
use uuid::Uuid;

use super::decode_text;

/// Database row mapping for the audit_logs table.
#[derive(Debug, Clone, FromRow)]
pub struct AuditLogEntity {
    pub id: Uuid,
    pub actor_id: Option<Uuid>,
    pub action: String,
    pub level: String,
    pub resource_type: String,
    pub resource_id: Option<String>,
    pub description: String,
    pub ip_address: Option<String>,
    pub user_agent: Option<String>,
    pub extra_data: Option<serde_json::Value>,
    pub created_at: DateTime<Utc>,
}

impl TryFrom<AuditLogEntity> for AuditLog {
    type Error = sqlx::Error;

    fn try_from(entity: AuditLogEntity) -> Result<Self, Self::Error> {
        Ok(Self {
            id: entity.id,
            actor_id: entity.actor_id,
            action: entity.action,
            level: decode_text("level", &entity.level)?,
            resource_type: entity.resource_type,
            resource_id: entity.resource_id,
            description: entity.description,
            ip_address: entity.ip_address,
            user_agent: entity.user_agent,
            extra_data: entity.extra_data,
            created_at: entity.created_at,
        })
    }
}
