//! Audit log domain models.
//!
//! Administrative actions are recorded separately from the lifecycle history:
//! history answers "what happened to this title", the audit log answers
//! "who did what in the back office".

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;
use std::str::FromStr;
use uuid::Uuid;

/// Severity of an audited action.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AuditLevel {
    Info,
    Warning,
    Error,
    Critical,
}

impl AuditLevel {
    pub fn as_str(&self) -> &'static str {
        match self {
            AuditLevel::Info => "info",
            AuditLevel::Warning => "warning",
            AuditLevel::Error => "error",
            AuditLevel::Critical => "critical",
        }
    }
}

impl FromStr for AuditLevel {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "info" => Ok(AuditLevel::Info),
            "warning" => Ok(AuditLevel::Warning),
            "error" => Ok(AuditLevel::Error),
            "critical" => Ok(AuditLevel::Critical),
            _ => Err(format!("Unknown audit level: {}", s)),
        }
    }
}

impl std::fmt::Display for AuditLevel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Audited actions following the format: resource.operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum AuditAction {
    TitleCreate,
    TitleUpdate,
    TitleTransition,
    TitleSuspend,
    TitleReactivate,
    TitleRenew,

    RequestStatusChange,
    RequestAssign,

    FeeGenerate,
    FeePay,
    FeeCancel,

    WebhookCreate,
    WebhookUpdate,
    WebhookDelete,
    WebhookRetrigger,
    WebhookTest,

    MaintenanceSchedule,
    MaintenanceStart,
    MaintenanceComplete,
    MaintenanceCancel,

    SettingUpdate,
    SettingDelete,

    UserCreate,
    NotificationBulk,
}

impl AuditAction {
    pub const ALL: [AuditAction; 24] = [
        AuditAction::TitleCreate,
        AuditAction::TitleUpdate,
        AuditAction::TitleTransition,
        AuditAction::TitleSuspend,
        AuditAction::TitleReactivate,
        AuditAction::TitleRenew,
        AuditAction::RequestStatusChange,
        AuditAction::RequestAssign,
        AuditAction::FeeGenerate,
        AuditAction::FeePay,
        AuditAction::FeeCancel,
        AuditAction::WebhookCreate,
        AuditAction::WebhookUpdate,
        AuditAction::WebhookDelete,
        AuditAction::WebhookRetrigger,
        AuditAction::WebhookTest,
        AuditAction::MaintenanceSchedule,
        AuditAction::MaintenanceStart,
        AuditAction::MaintenanceComplete,
        AuditAction::MaintenanceCancel,
        AuditAction::SettingUpdate,
        AuditAction::SettingDelete,
        AuditAction::UserCreate,
        AuditAction::NotificationBulk,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            AuditAction::TitleCreate => "title.create",
            AuditAction::TitleUpdate => "title.update",
            AuditAction::TitleTransition => "title.transition",
            AuditAction::TitleSuspend => "title.suspend",
            AuditAction::TitleReactivate => "title.reactivate",
            AuditAction::TitleRenew => "title.renew",
            AuditAction::RequestStatusChange => "request.status_change",
            AuditAction::RequestAssign => "request.assign",
            AuditAction::FeeGenerate => "fee.generate",
            AuditAction::FeePay => "fee.pay",
            AuditAction::FeeCancel => "fee.cancel",
            AuditAction::WebhookCreate => "webhook.create",
            AuditAction::WebhookUpdate => "webhook.update",
            AuditAction::WebhookDelete => "webhook.delete",
            AuditAction::WebhookRetrigger => "webhook.retrigger",
            AuditAction::WebhookTest => "webhook.test",
            AuditAction::MaintenanceSchedule => "maintenance.schedule",
            AuditAction::MaintenanceStart => "maintenance.start",
            AuditAction::MaintenanceComplete => "maintenance.complete",
            AuditAction::MaintenanceCancel => "maintenance.cancel",
            AuditAction::SettingUpdate => "setting.update",
            AuditAction::SettingDelete => "setting.delete",
            AuditAction::UserCreate => "user.create",
            AuditAction::NotificationBulk => "notification.bulk",
        }
    }
}

impl FromStr for AuditAction {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        AuditAction::ALL
            .into_iter()
            .find(|a| a.as_str() == s)
            .ok_or_else(|| format!("Unknown audit action: {}", s))
    }
}

impl std::fmt::Display for AuditAction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Audit log entry domain model.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuditLog {
    pub id: Uuid,
    pub actor_id: Option<Uuid>,
    pub action: String,
    pub level: AuditLevel,
    pub resource_type: String,
    pub resource_id: Option<String>,
    pub description: String,
    pub ip_address: Option<String>,
    pub user_agent: Option<String>,
    pub extra_data: Option<JsonValue>,
    pub created_at: DateTime<Utc>,
}

/// Input for creating a new audit log entry.
#[derive(Debug, Clone, PartialEq)]
pub struct CreateAuditLogInput {
    pub actor_id: Option<Uuid>,
    pub action: AuditAction,
    pub level: AuditLevel,
    pub resource_type: String,
    pub resource_id: Option<String>,
    pub description: String,
    pub ip_address: Option<String>,
    pub user_agent: Option<String>,
    pub extra_data: Option<JsonValue>,
}

/// Query parameters for listing audit logs.
#[derive(Debug, Clone, Deserialize, Default)]
pub struct ListAuditLogsQuery {
    pub actor_id: Option<Uuid>,
    pub action: Option<String>,
    pub resource_type: Option<String>,
    pub level: Option<AuditLevel>,
    pub cursor: Option<String>,
    pub limit: Option<i64>,
}

/// Response for audit log list.
#[derive(Debug, Clone, Serialize)]
pub struct ListAuditLogsResponse {
    pub data: Vec<AuditLog>,
    pub next_cursor: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_audit_action_names_parse_back() {
        for action in AuditAction::ALL {
            assert_eq!(action.as_str().parse::<AuditAction>().unwrap(), action);
        }
        assert!("title.delete".parse::<AuditAction>().is_err());
    }

    #[test]
    fn test_audit_action_display() {
        assert_eq!(AuditAction::WebhookRetrigger.to_string(), "webhook.retrigger");
        assert_eq!(AuditAction::FeePay.to_string(), "fee.pay");
        assert_eq!(AuditAction::MaintenanceStart.to_string(), "maintenance.start");
    }

    #[test]
    fn test_level_from_str() {
        assert_eq!("WARNING".parse::<AuditLevel>().unwrap(), AuditLevel::Warning);
        assert!("debug".parse::<AuditLevel>().is_err());
    }
}
