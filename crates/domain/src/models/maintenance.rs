//! Planned system maintenance windows.
//!
//! A window is scheduled, then started and completed, or cancelled before it
//! starts. Starting a window is what warns every active user; each phase is
//! published as a `system.maintenance` webhook event.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::str::FromStr;
use uuid::Uuid;
use validator::Validate;

use super::history::TransitionError;
use super::notification::NotificationPriority;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MaintenanceStatus {
    Scheduled,
    InProgress,
    Completed,
    Cancelled,
}

impl MaintenanceStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            MaintenanceStatus::Scheduled => "scheduled",
            MaintenanceStatus::InProgress => "in_progress",
            MaintenanceStatus::Completed => "completed",
            MaintenanceStatus::Cancelled => "cancelled",
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, MaintenanceStatus::Completed | MaintenanceStatus::Cancelled)
    }

    pub fn can_transition_to(&self, next: MaintenanceStatus) -> bool {
        matches!(
            (self, next),
            (MaintenanceStatus::Scheduled, MaintenanceStatus::InProgress)
                | (MaintenanceStatus::Scheduled, MaintenanceStatus::Cancelled)
                | (MaintenanceStatus::InProgress, MaintenanceStatus::Completed)
        )
    }

    /// Phase name carried in the `system.maintenance` webhook payload.
    pub fn phase(&self) -> &'static str {
        match self {
            MaintenanceStatus::Scheduled => "scheduled",
            MaintenanceStatus::InProgress => "started",
            MaintenanceStatus::Completed => "completed",
            MaintenanceStatus::Cancelled => "cancelled",
        }
    }
}

impl std::fmt::Display for MaintenanceStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for MaintenanceStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "scheduled" => Ok(MaintenanceStatus::Scheduled),
            "in_progress" => Ok(MaintenanceStatus::InProgress),
            "completed" => Ok(MaintenanceStatus::Completed),
            "cancelled" => Ok(MaintenanceStatus::Cancelled),
            _ => Err(format!("Unknown maintenance status: {}", s)),
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MaintenancePriority {
    Low,
    #[default]
    Medium,
    High,
    Critical,
}

impl MaintenancePriority {
    pub fn as_str(&self) -> &'static str {
        match self {
            MaintenancePriority::Low => "low",
            MaintenancePriority::Medium => "medium",
            MaintenancePriority::High => "high",
            MaintenancePriority::Critical => "critical",
        }
    }

    /// Priority of the notification sent to users when the window starts.
    pub fn notification_priority(&self) -> NotificationPriority {
        match self {
            MaintenancePriority::Low => NotificationPriority::Low,
            MaintenancePriority::Medium => NotificationPriority::Medium,
            MaintenancePriority::High => NotificationPriority::High,
            MaintenancePriority::Critical => NotificationPriority::Urgent,
        }
    }
}

impl FromStr for MaintenancePriority {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "low" => Ok(MaintenancePriority::Low),
            "medium" => Ok(MaintenancePriority::Medium),
            "high" => Ok(MaintenancePriority::High),
            "critical" => Ok(MaintenancePriority::Critical),
            _ => Err(format!("Unknown maintenance priority: {}", s)),
        }
    }
}

/// A maintenance window.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SystemMaintenance {
    pub id: Uuid,
    pub title: String,
    pub description: String,
    pub status: MaintenanceStatus,
    pub priority: MaintenancePriority,
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

impl SystemMaintenance {
    /// Running, or inside its planned window and neither completed nor
    /// cancelled.
    pub fn is_active(&self, now: DateTime<Utc>) -> bool {
        match self.status {
            MaintenanceStatus::InProgress => true,
            MaintenanceStatus::Scheduled => self.scheduled_start <= now && now <= self.scheduled_end,
            MaintenanceStatus::Completed | MaintenanceStatus::Cancelled => false,
        }
    }

    /// Moves the window to `next`, stamping the actual start or end.
    pub fn transition(&mut self, next: MaintenanceStatus, now: DateTime<Utc>) -> Result<(), TransitionError> {
        if !self.status.can_transition_to(next) {
            return Err(TransitionError::NotAllowed {
                entity: "maintenance",
                from: self.status.to_string(),
                to: next.to_string(),
            });
        }
        match next {
            MaintenanceStatus::InProgress => self.actual_start = Some(now),
            MaintenanceStatus::Completed => self.actual_end = Some(now),
            MaintenanceStatus::Scheduled | MaintenanceStatus::Cancelled => {}
        }
        self.status = next;
        self.updated_at = now;
        Ok(())
    }

    /// Body of the notification sent to every active user.
    pub fn notice(&self) -> String {
        let mut message = format!(
            "A system maintenance is planned from {} to {}.\n\n{}",
            self.scheduled_start.format("%d/%m/%Y %H:%M"),
            self.scheduled_end.format("%d/%m/%Y %H:%M"),
            self.description
        );
        if let Some(impact) = self.impact_description.as_deref().filter(|s| !s.is_empty()) {
            message.push_str(&format!("\n\nImpact: {}", impact));
        }
        message
    }
}

/// Request payload for scheduling a window.
#[derive(Debug, Clone, Deserialize, Validate)]
#[validate(schema(function = "validate_window"))]
pub struct ScheduleMaintenanceRequest {
    #[validate(length(min = 1, max = 200, message = "Title must be 1-200 characters"))]
    pub title: String,

    #[validate(length(min = 1, max = 5000, message = "Description must be 1-5000 characters"))]
    pub description: String,

    #[serde(default)]
    pub priority: MaintenancePriority,

    pub scheduled_start: DateTime<Utc>,

    pub scheduled_end: DateTime<Utc>,

    #[validate(length(max = 2000, message = "Impact must be at most 2000 characters"))]
    pub impact_description: Option<String>,
}

fn validate_window(req: &ScheduleMaintenanceRequest) -> Result<(), validator::ValidationError> {
    if req.scheduled_end <= req.scheduled_start {
        let mut err = validator::ValidationError::new("window_order");
        err.message = Some("Scheduled end must be after the scheduled start".into());
        return Err(err);
    }
    Ok(())
}

/// Query parameters for listing windows.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ListMaintenanceQuery {
    pub status: Option<MaintenanceStatus>,
    pub limit: Option<i64>,
    pub offset: Option<i64>,
}

#[derive(Debug, Clone, Serialize)]
pub struct ListMaintenanceResponse {
    pub maintenances: Vec<SystemMaintenance>,
    pub total: i64,
}
