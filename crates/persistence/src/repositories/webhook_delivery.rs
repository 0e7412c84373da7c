//! Webhook delivery repository.
//!
//! Every attempt claims its row with a compare-and-set on (attempts, status)
//! before the HTTP call, so two sweeps can never run the same attempt.

use chrono::{DateTime, Utc};
use domain::models::webhook_delivery::DeliveryClaim;
use domain::models::{DeliveryStatus, WebhookDelivery};
use sqlx::{FromRow, PgPool};
use uuid::Uuid;

use crate::entities::WebhookDeliveryEntity;
use crate::metrics::QueryTimer;

/// Delivery counts of one webhook per status.
#[derive(Debug, Clone, Default, PartialEq, Eq, FromRow)]
pub struct DeliveryCounts {
    pub total: i64,
    pub pending: i64,
    pub success: i64,
    pub failed: i64,
}

/// Repository for webhook delivery records.
#[derive(Clone)]
pub struct WebhookDeliveryRepository {
    pool: PgPool,
}

impl WebhookDeliveryRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub async fn create(&self, delivery: &WebhookDelivery) -> Result<WebhookDelivery, sqlx::Error> {
        let timer = QueryTimer::new("create_webhook_delivery");
        let entity = sqlx::query_as::<_, WebhookDeliveryEntity>(
            r#"
            INSERT INTO webhook_deliveries (id, webhook_id, event, payload, status, attempts,
                                            max_attempts, next_retry)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
            RETURNING id, webhook_id, event, payload, status, http_status, response_body,
                      error_message, attempts, max_attempts, next_retry, delivered_at,
                      created_at, updated_at
            "#,
        )
        .bind(delivery.id)
        .bind(delivery.webhook_id)
        .bind(&delivery.event)
        .bind(&delivery.payload)
        .bind(delivery.status.as_str())
        .bind(delivery.attempts)
        .bind(delivery.max_attempts)
        .bind(delivery.next_retry)
        .fetch_one(&self.pool)
        .await;
        timer.record();

        entity?.try_into()
    }

    pub async fn find_by_id(&self, id: Uuid) -> Result<Option<WebhookDelivery>, sqlx::Error> {
        let timer = QueryTimer::new("find_webhook_delivery_by_id");
        let entity = sqlx::query_as::<_, WebhookDeliveryEntity>(
            r#"
            SELECT id, webhook_id, event, payload, status, http_status, response_body,
                   error_message, attempts, max_attempts, next_retry, delivered_at,
                   created_at, updated_at
            FROM webhook_deliveries
            WHERE id = $1
            "#,
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await;
        timer.record();

        entity?.map(WebhookDelivery::try_from).transpose()
    }

    /// Applies `claim` if the row still has the expected attempts and status.
    ///
    /// Returns false when another worker claimed the attempt first.
    pub async fn claim(&self, claim: &DeliveryClaim) -> Result<bool, sqlx::Error> {
        let timer = QueryTimer::new("claim_webhook_delivery");
        let result = sqlx::query(
            r#"
            UPDATE webhook_deliveries
            SET attempts = $4,
                status = $5,
                next_retry = $6,
                updated_at = NOW()
            WHERE id = $1 AND attempts = $2 AND status = $3
            "#,
        )
        .bind(claim.delivery_id)
        .bind(claim.expected_attempts)
        .bind(claim.expected_status.as_str())
        .bind(claim.attempts)
        .bind(claim.status.as_str())
        .bind(claim.next_retry)
        .execute(&self.pool)
        .await;
        timer.record();

        Ok(result?.rows_affected() == 1)
    }

    /// Stores the result of an attempt on a claimed row.
    ///
    /// Returns false when the row no longer carries the attempt number of the
    /// claim, i.e. a manual retrigger reset it while the attempt ran.
    pub async fn save_outcome(&self, delivery: &WebhookDelivery) -> Result<bool, sqlx::Error> {
        let timer = QueryTimer::new("save_webhook_delivery_outcome");
        let result = sqlx::query(
            r#"
            UPDATE webhook_deliveries
            SET status = $2,
                http_status = $3,
                response_body = $4,
                error_message = $5,
                next_retry = $6,
                delivered_at = $7,
                updated_at = NOW()
            WHERE id = $1 AND attempts = $8 AND status IN ('pending', 'retry')
            "#,
        )
        .bind(delivery.id)
        .bind(delivery.status.as_str())
        .bind(delivery.http_status)
        .bind(&delivery.response_body)
        .bind(&delivery.error_message)
        .bind(delivery.next_retry)
        .bind(delivery.delivered_at)
        .bind(delivery.attempts)
        .execute(&self.pool)
        .await;
        timer.record();

        Ok(result?.rows_affected() == 1)
    }

    /// Closes a delivery that will not be attempted again, without counting
    /// an attempt.
    ///
    /// Applied only if the row still has the attempts and status it was read
    /// with; returns false otherwise.
    pub async fn save_skip(
        &self,
        delivery: &WebhookDelivery,
        expected_status: DeliveryStatus,
    ) -> Result<bool, sqlx::Error> {
        let timer = QueryTimer::new("skip_webhook_delivery");
        let result = sqlx::query(
            r#"
            UPDATE webhook_deliveries
            SET status = $4,
                error_message = $5,
                next_retry = NULL,
                updated_at = NOW()
            WHERE id = $1 AND attempts = $2 AND status = $3
            "#,
        )
        .bind(delivery.id)
        .bind(delivery.attempts)
        .bind(expected_status.as_str())
        .bind(delivery.status.as_str())
        .bind(&delivery.error_message)
        .execute(&self.pool)
        .await;
        timer.record();

        Ok(result?.rows_affected() == 1)
    }

    /// Writes a manual retrigger reset (attempts, status and schedule).
    ///
    /// Only a settled row (success or failed) that still has the attempts
    /// and status it was read with is reset; an attempt in flight keeps its
    /// claim and the call returns false.
    pub async fn save_reset(
        &self,
        delivery: &WebhookDelivery,
        expected_attempts: i32,
        expected_status: DeliveryStatus,
    ) -> Result<bool, sqlx::Error> {
        let timer = QueryTimer::new("reset_webhook_delivery");
        let result = sqlx::query(
            r#"
            UPDATE webhook_deliveries
            SET attempts = $2,
                status = $3,
                next_retry = $4,
                updated_at = NOW()
            WHERE id = $1
              AND attempts = $5
              AND status = $6
              AND status IN ('success', 'failed')
            "#,
        )
        .bind(delivery.id)
        .bind(delivery.attempts)
        .bind(delivery.status.as_str())
        .bind(delivery.next_retry)
        .bind(expected_attempts)
        .bind(expected_status.as_str())
        .execute(&self.pool)
        .await;
        timer.record();

        Ok(result?.rows_affected() == 1)
    }

    /// Deliveries the retry sweep should attempt, oldest due first.
    ///
    /// Failed rows with attempts left, plus pending or retry rows whose
    /// attempt never ran or never finished, once their schedule expired.
    pub async fn find_due(
        &self,
        now: DateTime<Utc>,
        limit: i64,
    ) -> Result<Vec<WebhookDelivery>, sqlx::Error> {
        let timer = QueryTimer::new("find_due_webhook_deliveries");
        let entities = sqlx::query_as::<_, WebhookDeliveryEntity>(
            r#"
            SELECT id, webhook_id, event, payload, status, http_status, response_body,
                   error_message, attempts, max_attempts, next_retry, delivered_at,
                   created_at, updated_at
            FROM webhook_deliveries
            WHERE attempts < max_attempts
              AND next_retry IS NOT NULL
              AND next_retry <= $1
              AND status IN ('pending', 'retry', 'failed')
            ORDER BY next_retry ASC
            LIMIT $2
            "#,
        )
        .bind(now)
        .bind(limit)
        .fetch_all(&self.pool)
        .await;
        timer.record();

        entities?.into_iter().map(WebhookDelivery::try_from).collect()
    }

    /// Deliveries of one webhook, newest first, with the total count.
    pub async fn list_by_webhook(
        &self,
        webhook_id: Uuid,
        status: Option<DeliveryStatus>,
        limit: i64,
        offset: i64,
    ) -> Result<(Vec<WebhookDelivery>, i64), sqlx::Error> {
        let status = status.map(|s| s.as_str());

        let total: i64 = sqlx::query_scalar(
            r#"
            SELECT COUNT(*)
            FROM webhook_deliveries
            WHERE webhook_id = $1 AND ($2::text IS NULL OR status = $2)
            "#,
        )
        .bind(webhook_id)
        .bind(status)
        .fetch_one(&self.pool)
        .await?;

        let timer = QueryTimer::new("list_webhook_deliveries");
        let entities = sqlx::query_as::<_, WebhookDeliveryEntity>(
            r#"
            SELECT id, webhook_id, event, payload, status, http_status, response_body,
                   error_message, attempts, max_attempts, next_retry, delivered_at,
                   created_at, updated_at
            FROM webhook_deliveries
            WHERE webhook_id = $1 AND ($2::text IS NULL OR status = $2)
            ORDER BY created_at DESC, id DESC
            LIMIT $3 OFFSET $4
            "#,
        )
        .bind(webhook_id)
        .bind(status)
        .bind(limit)
        .bind(offset)
        .fetch_all(&self.pool)
        .await;
        timer.record();

        let deliveries = entities?
            .into_iter()
            .map(WebhookDelivery::try_from)
            .collect::<Result<Vec<_>, _>>()?;
        Ok((deliveries, total))
    }

    pub async fn counts_for_webhook(&self, webhook_id: Uuid) -> Result<DeliveryCounts, sqlx::Error> {
        sqlx::query_as::<_, DeliveryCounts>(
            r#"
            SELECT
                COUNT(*) AS total,
                COUNT(*) FILTER (WHERE status IN ('pending', 'retry')) AS pending,
                COUNT(*) FILTER (WHERE status = 'success') AS success,
                COUNT(*) FILTER (WHERE status = 'failed') AS failed
            FROM webhook_deliveries
            WHERE webhook_id = $1
            "#,
        )
        .bind(webhook_id)
        .fetch_one(&self.pool)
        .await
    }

    /// Deletes finished deliveries created before `cutoff`.
    pub async fn delete_finished_before(&self, cutoff: DateTime<Utc>) -> Result<u64, sqlx::Error> {
        let timer = QueryTimer::new("delete_finished_webhook_deliveries");
        let result = sqlx::query(
            r#"
            DELETE FROM webhook_deliveries
            WHERE status IN ('success', 'failed') AND created_at < $1
            "#,
        )
        .bind(cutoff)
        .execute(&self.pool)
        .await;
        timer.record();

        Ok(result?.rows_affected())
    }

    pub async fn count_by_status(&self, status: DeliveryStatus) -> Result<i64, sqlx::Error> {
        sqlx::query_scalar(r#"SELECT COUNT(*) FROM webhook_deliveries WHERE status = $1"#)
            .bind(status.as_str())
            .fetch_one(&self.pool)
            .await
    }
}
