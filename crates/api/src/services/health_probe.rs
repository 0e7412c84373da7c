//! External service health probe.
//!
//! GETs `{base_url}/health` of each watched service, classifies the answer
//! and stores one health check row per probe.

use chrono::Utc;
use domain::models::external_service::CreateExternalServiceRequest;
use domain::models::{ExternalService, HealthCheck, HealthStatus};
use persistence::repositories::{ExternalServiceRepository, NewHealthCheck};
use reqwest::header::{HeaderMap, HeaderName, HeaderValue};
use reqwest::Client;
use sqlx::PgPool;
use std::collections::HashMap;
use std::time::{Duration, Instant};
use thiserror::Error;
use tracing::{info, warn};
use uuid::Uuid;

use crate::config::HealthProbeConfig;
use crate::middleware::metrics::record_health_probe;

#[derive(Debug, Error)]
pub enum ProbeError {
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("HTTP client error: {0}")]
    Client(#[from] reqwest::Error),

    #[error("{0}")]
    NotFound(String),
}

/// Classified result of one GET, before it is stored.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProbeResult {
    pub status: HealthStatus,
    pub status_code: Option<u16>,
    pub response_time_ms: Option<i64>,
    pub error_message: Option<String>,
}

/// Counts from one probe round.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ProbeReport {
    pub checked: usize,
    pub up: usize,
    pub degraded: usize,
    pub down: usize,
    pub failed: usize,
}

#[derive(Clone)]
pub struct HealthProbeService {
    services: ExternalServiceRepository,
    client: Client,
}

impl HealthProbeService {
    pub fn new(pool: PgPool, config: &HealthProbeConfig) -> Result<Self, ProbeError> {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .user_agent(config.user_agent.clone())
            .build()?;
        Ok(Self {
            services: ExternalServiceRepository::new(pool),
            client,
        })
    }

    pub async fn create(&self, input: &CreateExternalServiceRequest) -> Result<ExternalService, ProbeError> {
        let service = self.services.create(input).await?;
        info!(service_id = %service.id, name = %service.name, "External service registered");
        Ok(service)
    }

    pub async fn list(&self, active_only: bool) -> Result<Vec<ExternalService>, ProbeError> {
        Ok(self.services.list(active_only).await?)
    }

    pub async fn find(&self, id: Uuid) -> Result<ExternalService, ProbeError> {
        self.services
            .find_by_id(id)
            .await?
            .ok_or_else(|| ProbeError::NotFound(format!("External service {} not found", id)))
    }

    pub async fn checks(&self, id: Uuid, limit: i64) -> Result<Vec<HealthCheck>, ProbeError> {
        self.find(id).await?;
        Ok(self.services.list_checks(id, limit).await?)
    }

    /// Probes one service and stores the result.
    pub async fn check(&self, service: &ExternalService) -> Result<HealthCheck, ProbeError> {
        let result = probe(&self.client, &service.health_url(), &service.headers).await;
        record_health_probe(&service.name, result.status, result.response_time_ms);

        let check = self
            .services
            .record_check(&NewHealthCheck {
                service_id: service.id,
                status: result.status,
                response_time_ms: result.response_time_ms,
                status_code: result.status_code.map(i32::from),
                error_message: result.error_message.clone(),
                checked_at: Utc::now(),
            })
            .await?;

        if result.status == HealthStatus::Up {
            info!(
                service = %service.name,
                response_time_ms = ?result.response_time_ms,
                "External service is up"
            );
        } else {
            warn!(
                service = %service.name,
                status = result.status.as_str(),
                status_code = ?result.status_code,
                error = ?result.error_message,
                "External service is not healthy"
            );
        }
        Ok(check)
    }

    pub async fn check_by_id(&self, id: Uuid) -> Result<HealthCheck, ProbeError> {
        let service = self.find(id).await?;
        self.check(&service).await
    }

    /// Probes every active service; one failure never stops the round.
    pub async fn probe_all(&self) -> Result<ProbeReport, ProbeError> {
        let services = self.services.list(true).await?;
        let mut report = ProbeReport::default();
        for service in &services {
            match self.check(service).await {
                Ok(check) => {
                    report.checked += 1;
                    match check.status {
                        HealthStatus::Up => report.up += 1,
                        HealthStatus::Degraded => report.degraded += 1,
                        HealthStatus::Down => report.down += 1,
                    }
                }
                Err(e) => {
                    report.failed += 1;
                    warn!(service = %service.name, error = %e, "Failed to record health check");
                }
            }
        }
        Ok(report)
    }
}

/// GETs `url` and classifies the answer. A transport error is `Down`.
pub async fn probe(client: &Client, url: &str, headers: &HashMap<String, String>) -> ProbeResult {
    let mut header_map = HeaderMap::new();
    for (name, value) in headers {
        if let (Ok(name), Ok(value)) = (
            HeaderName::from_bytes(name.as_bytes()),
            HeaderValue::from_str(value),
        ) {
            header_map.insert(name, value);
        }
    }

    let started = Instant::now();
    match client.get(url).headers(header_map).send().await {
        Ok(response) => {
            let code = response.status().as_u16();
            ProbeResult {
                status: HealthStatus::from_status_code(code),
                status_code: Some(code),
                response_time_ms: Some(started.elapsed().as_millis() as i64),
                error_message: None,
            }
        }
        Err(e) => ProbeResult {
            status: HealthStatus::Down,
            status_code: None,
            response_time_ms: None,
            error_message: Some(e.to_string()),
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::{http::StatusCode, routing::get, Router};

    async fn spawn_service(status: StatusCode) -> String {
        let app = Router::new().route("/health", get(move || async move { status }));
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });
        format!("http://{}/health", addr)
    }

    fn client() -> Client {
        Client::builder()
            .timeout(Duration::from_secs(5))
            .build()
            .unwrap()
    }

    #[tokio::test]
    async fn test_probe_classifies_status_codes() {
        let cases = [
            (StatusCode::OK, HealthStatus::Up),
            (StatusCode::SERVICE_UNAVAILABLE, HealthStatus::Down),
            (StatusCode::NOT_FOUND, HealthStatus::Degraded),
        ];
        for (code, expected) in cases {
            let url = spawn_service(code).await;
            let result = probe(&client(), &url, &HashMap::new()).await;
            assert_eq!(result.status, expected);
            assert_eq!(result.status_code, Some(code.as_u16()));
            assert!(result.response_time_ms.is_some());
        }
    }

    #[tokio::test]
    async fn test_probe_connection_refused_is_down() {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        drop(listener);

        let result = probe(&client(), &format!("http://{}/health", addr), &HashMap::new()).await;
        assert_eq!(result.status, HealthStatus::Down);
        assert_eq!(result.status_code, None);
        assert!(result.error_message.is_some());
    }
}
