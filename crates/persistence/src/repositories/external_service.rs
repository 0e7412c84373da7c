//! External service and health check repository.

use chrono::{DateTime, Utc};
use domain::models::external_service::CreateExternalServiceRequest;
use domain::models::{ExternalService, HealthCheck, HealthStatus};
use sqlx::types::Json;
use sqlx::PgPool;
use uuid::Uuid;

use crate::entities::{ExternalServiceEntity, HealthCheckEntity};
use crate::metrics::QueryTimer;

/// Result of one probe, ready to be stored.
#[derive(Debug, Clone)]
pub struct NewHealthCheck {
    pub service_id: Uuid,
    pub status: HealthStatus,
    pub response_time_ms: Option<i64>,
    pub status_code: Option<i32>,
    pub error_message: Option<String>,
    pub checked_at: DateTime<Utc>,
}

/// Repository for watched external services.
#[derive(Clone)]
pub struct ExternalServiceRepository {
    pool: PgPool,
}

impl ExternalServiceRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub async fn create(
        &self,
        input: &CreateExternalServiceRequest,
    ) -> Result<ExternalService, sqlx::Error> {
        let entity = sqlx::query_as::<_, ExternalServiceEntity>(
            r#"
            INSERT INTO external_services (id, name, base_url, headers, is_active)
            VALUES ($1, $2, $3, $4, $5)
            RETURNING id, name, base_url, headers, status, last_check, response_time_ms,
                      is_active, created_at
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(&input.name)
        .bind(input.base_url.trim_end_matches('/'))
        .bind(Json(&input.headers))
        .bind(input.is_active)
        .fetch_one(&self.pool)
        .await?;

        entity.try_into()
    }

    pub async fn find_by_id(&self, id: Uuid) -> Result<Option<ExternalService>, sqlx::Error> {
        let entity = sqlx::query_as::<_, ExternalServiceEntity>(
            r#"
            SELECT id, name, base_url, headers, status, last_check, response_time_ms,
                   is_active, created_at
            FROM external_services
            WHERE id = $1
            "#,
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        entity.map(ExternalService::try_from).transpose()
    }

    /// All services, or only active ones.
    pub async fn list(&self, active_only: bool) -> Result<Vec<ExternalService>, sqlx::Error> {
        let entities = sqlx::query_as::<_, ExternalServiceEntity>(
            r#"
            SELECT id, name, base_url, headers, status, last_check, response_time_ms,
                   is_active, created_at
            FROM external_services
            WHERE (NOT $1 OR is_active)
            ORDER BY name
            "#,
        )
        .bind(active_only)
        .fetch_all(&self.pool)
        .await?;

        entities.into_iter().map(ExternalService::try_from).collect()
    }

    /// Stores a probe result and refreshes the cached status of its service.
    pub async fn record_check(&self, check: &NewHealthCheck) -> Result<HealthCheck, sqlx::Error> {
        let mut tx = self.pool.begin().await?;

        let timer = QueryTimer::new("record_health_check");
        let entity = sqlx::query_as::<_, HealthCheckEntity>(
            r#"
            INSERT INTO health_checks (id, service_id, status, response_time_ms, status_code,
                                       error_message, checked_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7)
            RETURNING id, service_id, status, response_time_ms, status_code, error_message,
                      checked_at
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(check.service_id)
        .bind(check.status.as_str())
        .bind(check.response_time_ms)
        .bind(check.status_code)
        .bind(&check.error_message)
        .bind(check.checked_at)
        .fetch_one(&mut *tx)
        .await?;

        sqlx::query(
            r#"
            UPDATE external_services
            SET status = $2, last_check = $3, response_time_ms = $4
            WHERE id = $1
            "#,
        )
        .bind(check.service_id)
        .bind(check.status.service_status().as_str())
        .bind(check.checked_at)
        .bind(check.response_time_ms)
        .execute(&mut *tx)
        .await?;
        timer.record();

        tx.commit().await?;
        entity.try_into()
    }

    /// Latest checks of one service, newest first.
    pub async fn list_checks(
        &self,
        service_id: Uuid,
        limit: i64,
    ) -> Result<Vec<HealthCheck>, sqlx::Error> {
        let entities = sqlx::query_as::<_, HealthCheckEntity>(
            r#"
            SELECT id, service_id, status, response_time_ms, status_code, error_message,
                   checked_at
            FROM health_checks
            WHERE service_id = $1
            ORDER BY checked_at DESC, id DESC
            LIMIT $2
            "#,
        )
        .bind(service_id)
        .bind(limit)
        .fetch_all(&self.pool)
        .await?;

        entities.into_iter().map(HealthCheck::try_from).collect()
    }
}
