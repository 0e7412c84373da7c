//! Maintenance window and system setting entities.

use chrono::{DateTime, Utc};
use domain::models::{SystemMaintenance, SystemSetting};
use sqlx::FromRow;
use uuid::Uuid;

use super::decode_text;

/// Database row mapping for the system_maintenances table.
#[derive(Debug, Clone, FromRow)]
pub struct MaintenanceEntity {
    pub id: Uuid,
    pub title: String,
    pub description: String,
    pub status: String,
    pub priority: String,
    pub scheduled_start: DateTime<Utc>,
    pub scheduled_end: DateTime<Utc>,
    pub actual_start: Option<DateTime<Utc>>,
    pub actual_end: Option<DateTime<Utc>>,
    pub impact_description: Option<String>,
    pub notification_sent: bool,
    pub created_by: Option<Uuid>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl TryFrom<MaintenanceEntity> for SystemMaintenance {
    type Error = sqlx::Error;

    fn try_from(entity: MaintenanceEntity) -> Result<Self, Self::Error> {
        Ok(Self {
            id: entity.id,
            title: entity.title,
            description: entity.description,
            status: decode_text("status", &entity.status)?,
            priority: decode_text("priority", &entity.priority)?,
            scheduled_start: entity.scheduled_start,
            scheduled_end: entity.scheduled_end,
            actual_start: entity.actual_start,
            actual_end: entity.actual_end,
            impact_description: entity.impact_description,
            notification_sent: entity.notification_sent,
            created_by: entity.created_by,
            created_at: entity.created_at,
            updated_at: entity.updated_at,
        })
    }
}

/// Database row mapping for the system_settings table.
#[derive(Debug, Clone, FromRow)]
pub struct SystemSettingEntity {
    pub key: String,
    pub value: serde_json::Value,
    pub description: String,
    pub category: String,
    pub is_active: bool,
    pub updated_by: Option<Uuid>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl From<SystemSettingEntity> for SystemSetting {
    fn from(entity: SystemSettingEntity) -> Self {
        Self {
            key: entity.key,
            value: entity.value,
            description: entity.description,
            category: entity.category,
            is_active: entity.is_active,
            updated_by: entity.updated_by,
            created_at: entity.created_at,
            updated_at: entity.updated_at,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use domain::models::{MaintenancePriority, MaintenanceStatus};

    #[test]
    fn test_maintenance_entity_conversion() {
        let start = Utc::now();
        let entity = MaintenanceEntity {
            id: Uuid::new_v4(),
            title: "Backup restore drill".into(),
            description: "Quarterly drill".into(),
            status: "in_progress".into(),
            priority: "critical".into(),
            scheduled_start: start,
            scheduled_end: start + chrono::Duration::hours(2),
            actual_start: Some(start),
            actual_end: None,
            impact_description: None,
            notification_sent: true,
            created_by: None,
            created_at: start,
            updated_at: start,
        };
        let maintenance = SystemMaintenance::try_from(entity).unwrap();
        assert_eq!(maintenance.status, MaintenanceStatus::InProgress);
        assert_eq!(maintenance.priority, MaintenancePriority::Critical);
        assert!(maintenance.notification_sent);
    }

    #[test]
    fn test_unknown_priority_is_a_decode_error() {
        let start = Utc::now();
        let entity = MaintenanceEntity {
            id: Uuid::new_v4(),
            title: "Patch".into(),
            description: "Kernel".into(),
            status: "scheduled".into(),
            priority: "blocker".into(),
            scheduled_start: start,
            scheduled_end: start + chrono::Duration::hours(1),
            actual_start: None,
            actual_end: None,
            impact_description: None,
            notification_sent: false,
            created_by: None,
            created_at: start,
            updated_at: start,
        };
        assert!(SystemMaintenance::try_from(entity).is_err());
    }
}
