//! Audit log repository.

use chrono::{DateTime, Utc};
use domain::models::{AuditLevel, AuditLog, CreateAuditLogInput};
use sqlx::PgPool;
use uuid::Uuid;

use crate::entities::AuditLogEntity;
use crate::metrics::QueryTimer;

/// Filters for listing audit entries with keyset pagination.
#[derive(Debug, Clone, Default)]
pub struct AuditLogFilter {
    pub actor_id: Option<Uuid>,
    pub action: Option<String>,
    pub resource_type: Option<String>,
    pub level: Option<AuditLevel>,
    /// Position after which to continue, from a previous page.
    pub after: Option<(DateTime<Utc>, Uuid)>,
    pub limit: i64,
}

/// Repository for audit log entries.
#[derive(Clone)]
pub struct AuditLogRepository {
    pool: PgPool,
}

impl AuditLogRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub async fn insert(&self, input: &CreateAuditLogInput) -> Result<AuditLog, sqlx::Error> {
        let timer = QueryTimer::new("insert_audit_log");
        let entity = sqlx::query_as::<_, AuditLogEntity>(
            r#"
            INSERT INTO audit_logs (id, actor_id, action, level, resource_type, resource_id,
                                    description, ip_address, user_agent, extra_data)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10)
            RETURNING id, actor_id, action, level, resource_type, resource_id, description,
                      ip_address, user_agent, extra_data, created_at
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(input.actor_id)
        .bind(input.action.as_str())
        .bind(input.level.as_str())
        .bind(&input.resource_type)
        .bind(&input.resource_id)
        .bind(&input.description)
        .bind(&input.ip_address)
        .bind(&input.user_agent)
        .bind(&input.extra_data)
        .fetch_one(&self.pool)
        .await;
        timer.record();

        entity?.try_into()
    }

    /// Newest entries first. Returns one page and whether more entries follow.
    pub async fn list(&self, filter: &AuditLogFilter) -> Result<(Vec<AuditLog>, bool), sqlx::Error> {
        let (cursor_ts, cursor_id) = match filter.after {
            Some((ts, id)) => (Some(ts), id),
            None => (None, Uuid::max()),
        };

        let timer = QueryTimer::new("list_audit_logs");
        let entities = sqlx::query_as::<_, AuditLogEntity>(
            r#"
            SELECT id, actor_id, action, level, resource_type, resource_id, description,
                   ip_address, user_agent, extra_data, created_at
            FROM audit_logs
            WHERE ($1::uuid IS NULL OR actor_id = $1)
              AND ($2::text IS NULL OR action = $2)
              AND ($3::text IS NULL OR resource_type = $3)
              AND ($4::text IS NULL OR level = $4)
              AND ($5::timestamptz IS NULL OR (created_at, id) < ($5, $6))
            ORDER BY created_at DESC, id DESC
            LIMIT $7
            "#,
        )
        .bind(filter.actor_id)
        .bind(&filter.action)
        .bind(&filter.resource_type)
        .bind(filter.level.map(|l| l.as_str()))
        .bind(cursor_ts)
        .bind(cursor_id)
        .bind(filter.limit + 1)
        .fetch_all(&self.pool)
        .await;
        timer.record();

        let mut logs = entities?
            .into_iter()
            .map(AuditLog::try_from)
            .collect::<Result<Vec<_>, _>>()?;
        let has_more = logs.len() as i64 > filter.limit;
        logs.truncate(filter.limit.max(0) as usize);
        Ok((logs, has_more))
    }
}
