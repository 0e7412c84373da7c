//! Webhook repository.

use chrono::{DateTime, Utc};
use domain::models::webhook::CreateWebhookRequest;
use domain::models::Webhook;
use sqlx::types::Json;
use sqlx::PgPool;
use uuid::Uuid;

use crate::entities::WebhookEntity;
use crate::metrics::QueryTimer;

/// Repository for webhook subscriptions.
#[derive(Clone)]
pub struct WebhookRepository {
    pool: PgPool,
}

impl WebhookRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub async fn create(
        &self,
        input: &CreateWebhookRequest,
        secret: &str,
        created_by: Option<Uuid>,
    ) -> Result<Webhook, sqlx::Error> {
        let timer = QueryTimer::new("create_webhook");
        let entity = sqlx::query_as::<_, WebhookEntity>(
            r#"
            INSERT INTO webhooks (id, name, url, description, events, secret, headers,
                                  is_active, created_by)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)
            RETURNING id, name, url, description, events, secret, headers, status, is_active,
                      success_count, failure_count, last_success, last_failure, last_error,
                      created_by, created_at, updated_at
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(&input.name)
        .bind(&input.url)
        .bind(&input.description)
        .bind(&input.events)
        .bind(secret)
        .bind(Json(&input.headers))
        .bind(input.is_active)
        .bind(created_by)
        .fetch_one(&self.pool)
        .await;
        timer.record();

        entity?.try_into()
    }

    pub async fn find_by_id(&self, id: Uuid) -> Result<Option<Webhook>, sqlx::Error> {
        let timer = QueryTimer::new("find_webhook_by_id");
        let entity = sqlx::query_as::<_, WebhookEntity>(
            r#"
            SELECT id, name, url, description, events, secret, headers, status, is_active,
                   success_count, failure_count, last_success, last_failure, last_error,
                   created_by, created_at, updated_at
            FROM webhooks
            WHERE id = $1
            "#,
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await;
        timer.record();

        entity?.map(Webhook::try_from).transpose()
    }

    pub async fn list(&self, limit: i64, offset: i64) -> Result<(Vec<Webhook>, i64), sqlx::Error> {
        let total: i64 = sqlx::query_scalar(r#"SELECT COUNT(*) FROM webhooks"#)
            .fetch_one(&self.pool)
            .await?;

        let entities = sqlx::query_as::<_, WebhookEntity>(
            r#"
            SELECT id, name, url, description, events, secret, headers, status, is_active,
                   success_count, failure_count, last_success, last_failure, last_error,
                   created_by, created_at, updated_at
            FROM webhooks
            ORDER BY created_at DESC, id
            LIMIT $1 OFFSET $2
            "#,
        )
        .bind(limit)
        .bind(offset)
        .fetch_all(&self.pool)
        .await?;

        let webhooks = entities
            .into_iter()
            .map(Webhook::try_from)
            .collect::<Result<Vec<_>, _>>()?;
        Ok((webhooks, total))
    }

    /// Active webhooks subscribed to `event`, optionally narrowed to one webhook.
    pub async fn find_subscribed(
        &self,
        event: &str,
        only: Option<Uuid>,
    ) -> Result<Vec<Webhook>, sqlx::Error> {
        let timer = QueryTimer::new("find_subscribed_webhooks");
        let entities = sqlx::query_as::<_, WebhookEntity>(
            r#"
            SELECT id, name, url, description, events, secret, headers, status, is_active,
                   success_count, failure_count, last_success, last_failure, last_error,
                   created_by, created_at, updated_at
            FROM webhooks
            WHERE is_active
              AND status = 'active'
              AND events @> ARRAY[$1]::text[]
              AND ($2::uuid IS NULL OR id = $2)
            ORDER BY created_at, id
            "#,
        )
        .bind(event)
        .bind(only)
        .fetch_all(&self.pool)
        .await;
        timer.record();

        entities?.into_iter().map(Webhook::try_from).collect()
    }

    /// Writes the editable fields of `webhook`.
    pub async fn update(&self, webhook: &Webhook) -> Result<Option<Webhook>, sqlx::Error> {
        let timer = QueryTimer::new("update_webhook");
        let entity = sqlx::query_as::<_, WebhookEntity>(
            r#"
            UPDATE webhooks
            SET name = $2,
                url = $3,
                description = $4,
                events = $5,
                secret = $6,
                headers = $7,
                status = $8,
                is_active = $9,
                updated_at = NOW()
            WHERE id = $1
            RETURNING id, name, url, description, events, secret, headers, status, is_active,
                      success_count, failure_count, last_success, last_failure, last_error,
                      created_by, created_at, updated_at
            "#,
        )
        .bind(webhook.id)
        .bind(&webhook.name)
        .bind(&webhook.url)
        .bind(&webhook.description)
        .bind(&webhook.events)
        .bind(&webhook.secret)
        .bind(Json(&webhook.headers))
        .bind(webhook.status.as_str())
        .bind(webhook.is_active)
        .fetch_optional(&self.pool)
        .await;
        timer.record();

        entity?.map(Webhook::try_from).transpose()
    }

    /// Deletes a webhook and, by cascade, its deliveries.
    pub async fn delete(&self, id: Uuid) -> Result<bool, sqlx::Error> {
        let result = sqlx::query(r#"DELETE FROM webhooks WHERE id = $1"#)
            .bind(id)
            .execute(&self.pool)
            .await?;

        Ok(result.rows_affected() > 0)
    }

    pub async fn record_success(&self, id: Uuid, at: DateTime<Utc>) -> Result<(), sqlx::Error> {
        let timer = QueryTimer::new("record_webhook_success");
        let result = sqlx::query(
            r#"
            UPDATE webhooks
            SET success_count = success_count + 1, last_success = $2
            WHERE id = $1
            "#,
        )
        .bind(id)
        .bind(at)
        .execute(&self.pool)
        .await;
        timer.record();

        result.map(|_| ())
    }

    pub async fn record_failure(
        &self,
        id: Uuid,
        at: DateTime<Utc>,
        error: &str,
    ) -> Result<(), sqlx::Error> {
        let timer = QueryTimer::new("record_webhook_failure");
        let result = sqlx::query(
            r#"
            UPDATE webhooks
            SET failure_count = failure_count + 1, last_failure = $2, last_error = $3
            WHERE id = $1
            "#,
        )
        .bind(id)
        .bind(at)
        .bind(error)
        .execute(&self.pool)
        .await;
        timer.record();

        result.map(|_| ())
    }
}
