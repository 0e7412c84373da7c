//! Maintenance window and system setting repositories.

use chrono::{DateTime, Utc};
use domain::models::maintenance::ScheduleMaintenanceRequest;
use domain::models::system_setting::PutSettingRequest;
use domain::models::{MaintenanceStatus, SystemMaintenance, SystemSetting};
use sqlx::PgPool;
use uuid::Uuid;

use crate::entities::{MaintenanceEntity, SystemSettingEntity};
use crate::metrics::QueryTimer;

/// Repository for maintenance windows.
#[derive(Clone)]
pub struct MaintenanceRepository {
    pool: PgPool,
}

impl MaintenanceRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub async fn create(
        &self,
        input: &ScheduleMaintenanceRequest,
        created_by: Option<Uuid>,
    ) -> Result<SystemMaintenance, sqlx::Error> {
        let timer = QueryTimer::new("create_maintenance");
        let entity = sqlx::query_as::<_, MaintenanceEntity>(
            r#"
            INSERT INTO system_maintenances (id, title, description, priority, scheduled_start,
                                             scheduled_end, impact_description, created_by)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
            RETURNING id, title, description, status, priority, scheduled_start, scheduled_end,
                      actual_start, actual_end, impact_description, notification_sent, created_by,
                      created_at, updated_at
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(input.title.trim())
        .bind(&input.description)
        .bind(input.priority.as_str())
        .bind(input.scheduled_start)
        .bind(input.scheduled_end)
        .bind(&input.impact_description)
        .bind(created_by)
        .fetch_one(&self.pool)
        .await;
        timer.record();

        entity?.try_into()
    }

    pub async fn find_by_id(&self, id: Uuid) -> Result<Option<SystemMaintenance>, sqlx::Error> {
        let timer = QueryTimer::new("find_maintenance_by_id");
        let entity = sqlx::query_as::<_, MaintenanceEntity>(
            r#"
            SELECT id, title, description, status, priority, scheduled_start, scheduled_end,
                   actual_start, actual_end, impact_description, notification_sent, created_by,
                   created_at, updated_at
            FROM system_maintenances
            WHERE id = $1
            "#,
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await;
        timer.record();

        entity?.map(SystemMaintenance::try_from).transpose()
    }

    /// Lists windows, newest planned start first.
    pub async fn list(
        &self,
        status: Option<MaintenanceStatus>,
        limit: i64,
        offset: i64,
    ) -> Result<(Vec<SystemMaintenance>, i64), sqlx::Error> {
        let status = status.map(|s| s.as_str());

        let total: i64 = sqlx::query_scalar(
            r#"SELECT COUNT(*) FROM system_maintenances WHERE ($1::text IS NULL OR status = $1)"#,
        )
        .bind(status)
        .fetch_one(&self.pool)
        .await?;

        let timer = QueryTimer::new("list_maintenances");
        let entities = sqlx::query_as::<_, MaintenanceEntity>(
            r#"
            SELECT id, title, description, status, priority, scheduled_start, scheduled_end,
                   actual_start, actual_end, impact_description, notification_sent, created_by,
                   created_at, updated_at
            FROM system_maintenances
            WHERE ($1::text IS NULL OR status = $1)
            ORDER BY scheduled_start DESC, id
            LIMIT $2 OFFSET $3
            "#,
        )
        .bind(status)
        .bind(limit)
        .bind(offset)
        .fetch_all(&self.pool)
        .await;
        timer.record();

        let maintenances = entities?
            .into_iter()
            .map(SystemMaintenance::try_from)
            .collect::<Result<Vec<_>, _>>()?;
        Ok((maintenances, total))
    }

    /// Windows running now, or scheduled with `now` inside their planned window.
    pub async fn list_active(
        &self,
        now: DateTime<Utc>,
    ) -> Result<Vec<SystemMaintenance>, sqlx::Error> {
        let timer = QueryTimer::new("list_active_maintenances");
        let entities = sqlx::query_as::<_, MaintenanceEntity>(
            r#"
            SELECT id, title, description, status, priority, scheduled_start, scheduled_end,
                   actual_start, actual_end, impact_description, notification_sent, created_by,
                   created_at, updated_at
            FROM system_maintenances
            WHERE status = 'in_progress'
               OR (status = 'scheduled' AND scheduled_start <= $1 AND scheduled_end >= $1)
            ORDER BY scheduled_start, id
            "#,
        )
        .bind(now)
        .fetch_all(&self.pool)
        .await;
        timer.record();

        entities?.into_iter().map(SystemMaintenance::try_from).collect()
    }

    /// Stores a status change made on a copy read with status `expected`.
    ///
    /// Returns `None` when the row moved in the meantime.
    pub async fn save_transition(
        &self,
        maintenance: &SystemMaintenance,
        expected: MaintenanceStatus,
    ) -> Result<Option<SystemMaintenance>, sqlx::Error> {
        let timer = QueryTimer::new("save_maintenance_transition");
        let entity = sqlx::query_as::<_, MaintenanceEntity>(
            r#"
            UPDATE system_maintenances
            SET status = $2,
                actual_start = $3,
                actual_end = $4,
                updated_at = NOW()
            WHERE id = $1 AND status = $5
            RETURNING id, title, description, status, priority, scheduled_start, scheduled_end,
                      actual_start, actual_end, impact_description, notification_sent, created_by,
                      created_at, updated_at
            "#,
        )
        .bind(maintenance.id)
        .bind(maintenance.status.as_str())
        .bind(maintenance.actual_start)
        .bind(maintenance.actual_end)
        .bind(expected.as_str())
        .fetch_optional(&self.pool)
        .await;
        timer.record();

        entity?.map(SystemMaintenance::try_from).transpose()
    }

    pub async fn mark_notification_sent(&self, id: Uuid) -> Result<(), sqlx::Error> {
        sqlx::query(
            r#"UPDATE system_maintenances SET notification_sent = TRUE, updated_at = NOW() WHERE id = $1"#,
        )
        .bind(id)
        .execute(&self.pool)
        .await?;
        Ok(())
    }
}

/// Repository for runtime settings.
#[derive(Clone)]
pub struct SystemSettingRepository {
    pool: PgPool,
}

impl SystemSettingRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Creates the setting or replaces its value and metadata.
    pub async fn upsert(
        &self,
        key: &str,
        input: &PutSettingRequest,
        updated_by: Option<Uuid>,
    ) -> Result<SystemSetting, sqlx::Error> {
        let timer = QueryTimer::new("upsert_system_setting");
        let entity = sqlx::query_as::<_, SystemSettingEntity>(
            r#"
            INSERT INTO system_settings (key, value, description, category, is_active, updated_by)
            VALUES ($1, $2, COALESCE($3, ''), $4, COALESCE($5, TRUE), $6)
            ON CONFLICT (key) DO UPDATE
            SET value = EXCLUDED.value,
                description = COALESCE($3, system_settings.description),
                category = EXCLUDED.category,
                is_active = COALESCE($5, system_settings.is_active),
                updated_by = EXCLUDED.updated_by,
                updated_at = NOW()
            RETURNING key, value, description, category, is_active, updated_by,
                      created_at, updated_at
            "#,
        )
        .bind(key)
        .bind(&input.value)
        .bind(&input.description)
        .bind(input.category())
        .bind(input.is_active)
        .bind(updated_by)
        .fetch_one(&self.pool)
        .await;
        timer.record();

        Ok(entity?.into())
    }

    pub async fn find(&self, key: &str) -> Result<Option<SystemSetting>, sqlx::Error> {
        let entity = sqlx::query_as::<_, SystemSettingEntity>(
            r#"
            SELECT key, value, description, category, is_active, updated_by, created_at, updated_at
            FROM system_settings
            WHERE key = $1
            "#,
        )
        .bind(key)
        .fetch_optional(&self.pool)
        .await?;

        Ok(entity.map(SystemSetting::from))
    }

    pub async fn list(
        &self,
        category: Option<&str>,
        include_inactive: bool,
    ) -> Result<Vec<SystemSetting>, sqlx::Error> {
        let timer = QueryTimer::new("list_system_settings");
        let entities = sqlx::query_as::<_, SystemSettingEntity>(
            r#"
            SELECT key, value, description, category, is_active, updated_by, created_at, updated_at
            FROM system_settings
            WHERE ($1::text IS NULL OR category = $1)
              AND ($2 OR is_active)
            ORDER BY category, key
            "#,
        )
        .bind(category)
        .bind(include_inactive)
        .fetch_all(&self.pool)
        .await;
        timer.record();

        Ok(entities?.into_iter().map(SystemSetting::from).collect())
    }

    pub async fn delete(&self, key: &str) -> Result<bool, sqlx::Error> {
        let result = sqlx::query(r#"DELETE FROM system_settings WHERE key = $1"#)
            .bind(key)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }
}
