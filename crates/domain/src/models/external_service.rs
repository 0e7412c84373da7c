//! External services watched by the health probe.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::str::FromStr;
use uuid::Uuid;
use validator::Validate;

/// Cached status of an external service.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ServiceStatus {
    Active,
    Inactive,
    Error,
    Maintenance,
}

impl ServiceStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            ServiceStatus::Active => "active",
            ServiceStatus::Inactive => "inactive",
            ServiceStatus::Error => "error",
            ServiceStatus::Maintenance => "maintenance",
        }
    }
}

impl FromStr for ServiceStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "active" => Ok(ServiceStatus::Active),
            "inactive" => Ok(ServiceStatus::Inactive),
            "error" => Ok(ServiceStatus::Error),
            "maintenance" => Ok(ServiceStatus::Maintenance),
            _ => Err(format!("Unknown service status: {}", s)),
        }
    }
}

/// Result classification of one probe.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum HealthStatus {
    Up,
    Down,
    Degraded,
}

impl HealthStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            HealthStatus::Up => "up",
            HealthStatus::Down => "down",
            HealthStatus::Degraded => "degraded",
        }
    }

    /// 2xx is up, 5xx is down, anything else is degraded.
    pub fn from_status_code(code: u16) -> Self {
        match code {
            200..=299 => HealthStatus::Up,
            500..=599 => HealthStatus::Down,
            _ => HealthStatus::Degraded,
        }
    }

    /// Service status cached after a probe with this result.
    pub fn service_status(&self) -> ServiceStatus {
        match self {
            HealthStatus::Up => ServiceStatus::Active,
            HealthStatus::Down => ServiceStatus::Error,
            HealthStatus::Degraded => ServiceStatus::Maintenance,
        }
    }

    /// Gauge value exported for this result.
    pub fn gauge_value(&self) -> f64 {
        match self {
            HealthStatus::Up => 1.0,
            HealthStatus::Degraded => 0.5,
            HealthStatus::Down => 0.0,
        }
    }
}

impl FromStr for HealthStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "up" => Ok(HealthStatus::Up),
            "down" => Ok(HealthStatus::Down),
            "degraded" => Ok(HealthStatus::Degraded),
            _ => Err(format!("Unknown health status: {}", s)),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExternalService {
    pub id: Uuid,
    pub name: String,
    pub base_url: String,
    pub headers: HashMap<String, String>,
    pub status: ServiceStatus,
    pub last_check: Option<DateTime<Utc>>,
    pub response_time_ms: Option<i64>,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
}

impl ExternalService {
    /// Probe URL: `{base_url}/health` without a doubled slash.
    pub fn health_url(&self) -> String {
        format!("{}/health", self.base_url.trim_end_matches('/'))
    }
}

/// One recorded probe.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthCheck {
    pub id: Uuid,
    pub service_id: Uuid,
    pub status: HealthStatus,
    pub response_time_ms: Option<i64>,
    pub status_code: Option<i32>,
    pub error_message: Option<String>,
    pub checked_at: DateTime<Utc>,
}

fn default_true() -> bool {
    true
}

#[derive(Debug, Clone, Deserialize, Validate)]
pub struct CreateExternalServiceRequest {
    #[validate(length(min = 1, max = 100, message = "Name must be 1-100 characters"))]
    pub name: String,

    #[validate(
        length(max = 2048, message = "URL must be at most 2048 characters"),
        custom(function = "shared::validation::validate_http_url")
    )]
    pub base_url: String,

    #[serde(default)]
    pub headers: HashMap<String, String>,

    #[serde(default = "default_true")]
    pub is_active: bool,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_classification() {
        assert_eq!(HealthStatus::from_status_code(200), HealthStatus::Up);
        assert_eq!(HealthStatus::from_status_code(204), HealthStatus::Up);
        assert_eq!(HealthStatus::from_status_code(503), HealthStatus::Down);
        assert_eq!(HealthStatus::from_status_code(404), HealthStatus::Degraded);
        assert_eq!(HealthStatus::from_status_code(301), HealthStatus::Degraded);
    }

    #[test]
    fn test_service_status_mapping() {
        assert_eq!(HealthStatus::Up.service_status(), ServiceStatus::Active);
        assert_eq!(HealthStatus::Down.service_status(), ServiceStatus::Error);
        assert_eq!(HealthStatus::Degraded.service_status(), ServiceStatus::Maintenance);
    }

    #[test]
    fn test_health_url() {
        let mut service = ExternalService {
            id: Uuid::new_v4(),
            name: "Payments".into(),
            base_url: "https://pay.example/".into(),
            headers: HashMap::new(),
            status: ServiceStatus::Active,
            last_check: None,
            response_time_ms: None,
            is_active: true,
            created_at: Utc::now(),
        };
        assert_eq!(service.health_url(), "https://pay.example/health");
        service.base_url = "https://pay.example/api".into();
        assert_eq!(service.health_url(), "https://pay.example/api/health");
    }
}
