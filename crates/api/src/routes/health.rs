//! Health check endpoint handlers.

use axum::{extract::State, http::StatusCode, Json};
use domain::models::{ExternalService, ServiceStatus};
use serde::Serialize;

use crate::app::AppState;

#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: String,
    pub version: String,
    pub database: DatabaseHealth,
    pub external_services: ExternalServicesHealth,
}

#[derive(Debug, Serialize)]
pub struct DatabaseHealth {
    pub connected: bool,
    pub latency_ms: Option<u64>,
}

/// Last known state of the watched services, from their latest probes.
#[derive(Debug, Default, PartialEq, Eq, Serialize)]
pub struct ExternalServicesHealth {
    pub total: usize,
    pub active: usize,
    pub error: usize,
    pub maintenance: usize,
    pub unchecked: usize,
}

impl ExternalServicesHealth {
    pub fn summarize(services: &[ExternalService]) -> Self {
        let mut summary = Self {
            total: services.len(),
            ..Default::default()
        };
        for service in services {
            if service.last_check.is_none() {
                summary.unchecked += 1;
                continue;
            }
            match service.status {
                ServiceStatus::Active => summary.active += 1,
                ServiceStatus::Error => summary.error += 1,
                ServiceStatus::Maintenance => summary.maintenance += 1,
                ServiceStatus::Inactive => {}
            }
        }
        summary
    }
}

#[derive(Debug, Serialize)]
pub struct StatusResponse {
    pub status: String,
}

/// Full health check: database round trip plus watched service summary.
///
/// Unhealthy watched services do not fail this check; only the database does.
pub async fn health_check(
    State(state): State<AppState>,
) -> Result<Json<HealthResponse>, StatusCode> {
    let start = std::time::Instant::now();
    let db_connected = sqlx::query("SELECT 1").execute(&state.pool).await.is_ok();
    let latency_ms = start.elapsed().as_millis() as u64;

    if !db_connected {
        return Err(StatusCode::SERVICE_UNAVAILABLE);
    }

    let services = state.probe.list(true).await.unwrap_or_default();

    Ok(Json(HealthResponse {
        status: "healthy".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        database: DatabaseHealth {
            connected: true,
            latency_ms: Some(latency_ms),
        },
        external_services: ExternalServicesHealth::summarize(&services),
    }))
}

/// Liveness probe: 200 while the process runs.
pub async fn live() -> Json<StatusResponse> {
    Json(StatusResponse {
        status: "alive".to_string(),
    })
}

/// Readiness probe: 200 once the database answers.
pub async fn ready(State(state): State<AppState>) -> Result<Json<StatusResponse>, StatusCode> {
    let db_connected = sqlx::query("SELECT 1").execute(&state.pool).await.is_ok();

    if db_connected {
        Ok(Json(StatusResponse {
            status: "ready".to_string(),
        }))
    } else {
        Err(StatusCode::SERVICE_UNAVAILABLE)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use std::collections::HashMap;
    use uuid::Uuid;

    fn service(status: ServiceStatus, checked: bool) -> ExternalService {
        ExternalService {
            id: Uuid::new_v4(),
            name: "treasury".into(),
            base_url: "http://treasury.local".into(),
            headers: HashMap::new(),
            status,
            last_check: checked.then(Utc::now),
            response_time_ms: None,
            is_active: true,
            created_at: Utc::now(),
        }
    }

    #[test]
    fn test_summary_counts_by_last_status() {
        let services = vec![
            service(ServiceStatus::Active, true),
            service(ServiceStatus::Active, true),
            service(ServiceStatus::Error, true),
            service(ServiceStatus::Maintenance, true),
            service(ServiceStatus::Active, false),
        ];
        assert_eq!(
            ExternalServicesHealth::summarize(&services),
            ExternalServicesHealth {
                total: 5,
                active: 2,
                error: 1,
                maintenance: 1,
                unchecked: 1,
            }
        );
    }

    #[tokio::test]
    async fn test_live_reports_alive() {
        let Json(response) = live().await;
        assert_eq!(response.status, "alive");
    }
}
