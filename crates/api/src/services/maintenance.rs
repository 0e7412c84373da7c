//! Maintenance windows and runtime settings.
//!
//! Every change is audited. Maintenance phases are published to the
//! lifecycle listeners; the start of a window warns every active user once.

use chrono::Utc;
use domain::models::maintenance::{ListMaintenanceQuery, ScheduleMaintenanceRequest};
use domain::models::system_setting::{is_valid_key, ListSettingsQuery, PutSettingRequest};
use domain::models::{
    AuditAction, MaintenanceStatus, SystemMaintenance, SystemSetting, TransitionError,
};
use domain::services::{AuditLogger, LifecycleEvent, ListenerRegistry};
use persistence::repositories::{MaintenanceRepository, SystemSettingRepository};
use serde_json::json;
use shared::pagination::clamp_limit;
use sqlx::PgPool;
use std::sync::Arc;
use thiserror::Error;
use tracing::info;
use uuid::Uuid;

use crate::extractors::Actor;

#[derive(Debug, Error)]
pub enum MaintenanceError {
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error(transparent)]
    Transition(#[from] TransitionError),

    #[error("{0}")]
    NotFound(String),

    #[error("{0}")]
    Conflict(String),

    #[error("{0}")]
    Invalid(String),
}

/// Maintenance window lifecycle.
#[derive(Clone)]
pub struct MaintenanceService {
    maintenances: MaintenanceRepository,
    listeners: ListenerRegistry,
    audit: Arc<dyn AuditLogger>,
}

impl MaintenanceService {
    pub fn new(pool: PgPool, listeners: ListenerRegistry, audit: Arc<dyn AuditLogger>) -> Self {
        Self {
            maintenances: MaintenanceRepository::new(pool),
            listeners,
            audit,
        }
    }

    async fn audit(&self, actor: &Actor, action: AuditAction, maintenance: &SystemMaintenance) {
        self.audit
            .record_or_warn(
                actor
                    .audit(action)
                    .on_resource("maintenance", maintenance.id)
                    .describe(format!("Maintenance '{}' {}", maintenance.title, maintenance.status))
                    .with_extra(json!({
                        "priority": maintenance.priority.as_str(),
                        "scheduled_start": maintenance.scheduled_start,
                        "scheduled_end": maintenance.scheduled_end,
                    }))
                    .build(),
            )
            .await;
    }

    pub async fn get(&self, id: Uuid) -> Result<SystemMaintenance, MaintenanceError> {
        self.maintenances
            .find_by_id(id)
            .await?
            .ok_or_else(|| MaintenanceError::NotFound(format!("Maintenance {} not found", id)))
    }

    pub async fn list(
        &self,
        query: &ListMaintenanceQuery,
    ) -> Result<(Vec<SystemMaintenance>, i64), MaintenanceError> {
        let limit = clamp_limit(query.limit);
        let offset = query.offset.unwrap_or(0).max(0);
        Ok(self.maintenances.list(query.status, limit, offset).await?)
    }

    /// Windows running now or due now.
    pub async fn active(&self) -> Result<Vec<SystemMaintenance>, MaintenanceError> {
        Ok(self.maintenances.list_active(Utc::now()).await?)
    }

    pub async fn schedule(
        &self,
        input: &ScheduleMaintenanceRequest,
        actor: &Actor,
    ) -> Result<SystemMaintenance, MaintenanceError> {
        let maintenance = self.maintenances.create(input, actor.id).await?;
        info!(
            maintenance_id = %maintenance.id,
            start = %maintenance.scheduled_start,
            "Maintenance scheduled"
        );

        self.audit(actor, AuditAction::MaintenanceSchedule, &maintenance)
            .await;
        self.listeners
            .publish(LifecycleEvent::Maintenance {
                maintenance: maintenance.clone(),
                actor: actor.id,
            })
            .await;
        Ok(maintenance)
    }

    /// Starts the window and notifies every active user.
    ///
    /// The notification flag is only set once the notification listener
    /// succeeded, so a failed fan-out shows up on the window.
    pub async fn start(&self, id: Uuid, actor: &Actor) -> Result<SystemMaintenance, MaintenanceError> {
        let mut maintenance = self
            .move_to(id, MaintenanceStatus::InProgress, AuditAction::MaintenanceStart, actor)
            .await?;

        let report = self
            .listeners
            .dispatch(&LifecycleEvent::Maintenance {
                maintenance: maintenance.clone(),
                actor: actor.id,
            })
            .await;
        report.log_failures();

        if !maintenance.notification_sent && !report.failed("notifications") {
            self.maintenances.mark_notification_sent(id).await?;
            maintenance.notification_sent = true;
        }
        Ok(maintenance)
    }

    pub async fn complete(
        &self,
        id: Uuid,
        actor: &Actor,
    ) -> Result<SystemMaintenance, MaintenanceError> {
        let maintenance = self
            .move_to(id, MaintenanceStatus::Completed, AuditAction::MaintenanceComplete, actor)
            .await?;
        self.listeners
            .publish(LifecycleEvent::Maintenance {
                maintenance: maintenance.clone(),
                actor: actor.id,
            })
            .await;
        Ok(maintenance)
    }

    pub async fn cancel(&self, id: Uuid, actor: &Actor) -> Result<SystemMaintenance, MaintenanceError> {
        let maintenance = self
            .move_to(id, MaintenanceStatus::Cancelled, AuditAction::MaintenanceCancel, actor)
            .await?;
        self.listeners
            .publish(LifecycleEvent::Maintenance {
                maintenance: maintenance.clone(),
                actor: actor.id,
            })
            .await;
        Ok(maintenance)
    }

    /// Applies the transition and stores it against the status it was read with.
    async fn move_to(
        &self,
        id: Uuid,
        next: MaintenanceStatus,
        action: AuditAction,
        actor: &Actor,
    ) -> Result<SystemMaintenance, MaintenanceError> {
        let mut maintenance = self.get(id).await?;
        let previous = maintenance.status;
        maintenance.transition(next, Utc::now())?;

        let maintenance = self
            .maintenances
            .save_transition(&maintenance, previous)
            .await?
            .ok_or_else(|| {
                MaintenanceError::Conflict(format!("Maintenance {} changed concurrently", id))
            })?;

        info!(
            maintenance_id = %id,
            from = %previous,
            to = %next,
            "Maintenance status changed"
        );
        self.audit(actor, action, &maintenance).await;
        Ok(maintenance)
    }
}

/// Runtime settings.
#[derive(Clone)]
pub struct SettingsService {
    settings: SystemSettingRepository,
    audit: Arc<dyn AuditLogger>,
}

fn check_key(key: &str) -> Result<(), MaintenanceError> {
    if is_valid_key(key) {
        Ok(())
    } else {
        Err(MaintenanceError::Invalid(format!(
            "Invalid setting key '{}': use lowercase letters, digits, '_', '.' or '-'",
            key
        )))
    }
}

impl SettingsService {
    pub fn new(pool: PgPool, audit: Arc<dyn AuditLogger>) -> Self {
        Self {
            settings: SystemSettingRepository::new(pool),
            audit,
        }
    }

    pub async fn get(&self, key: &str) -> Result<SystemSetting, MaintenanceError> {
        check_key(key)?;
        self.settings
            .find(key)
            .await?
            .ok_or_else(|| MaintenanceError::NotFound(format!("Setting {} not found", key)))
    }

    pub async fn list(&self, query: &ListSettingsQuery) -> Result<Vec<SystemSetting>, MaintenanceError> {
        Ok(self
            .settings
            .list(query.category.as_deref(), query.include_inactive)
            .await?)
    }

    pub async fn put(
        &self,
        key: &str,
        input: &PutSettingRequest,
        actor: &Actor,
    ) -> Result<SystemSetting, MaintenanceError> {
        check_key(key)?;
        let previous = self.settings.find(key).await?;
        let setting = self.settings.upsert(key, input, actor.id).await?;
        info!(key, category = %setting.category, "Setting updated");

        self.audit
            .record_or_warn(
                actor
                    .audit(AuditAction::SettingUpdate)
                    .on_resource("setting", key)
                    .describe(format!("Setting {} updated", key))
                    .with_extra(json!({
                        "key": key,
                        "old_value": previous.map(|p| p.value),
                        "new_value": setting.value,
                    }))
                    .build(),
            )
            .await;
        Ok(setting)
    }

    pub async fn delete(&self, key: &str, actor: &Actor) -> Result<(), MaintenanceError> {
        check_key(key)?;
        if !self.settings.delete(key).await? {
            return Err(MaintenanceError::NotFound(format!("Setting {} not found", key)));
        }
        info!(key, "Setting deleted");

        self.audit
            .record_or_warn(
                actor
                    .audit(AuditAction::SettingDelete)
                    .on_resource("setting", key)
                    .describe(format!("Setting {} deleted", key))
                    .with_extra(json!({ "key": key }))
                    .build(),
            )
            .await;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_setting_keys_are_checked() {
        assert!(check_key("fees.reminder_days").is_ok());
        assert!(matches!(check_key("Fees Reminder"), Err(MaintenanceError::Invalid(_))));
    }
}
