//! Fee record repository.

use chrono::NaiveDate;
use domain::models::fee::{FeeStatistics, ListFeesQuery};
use domain::models::{FeeRecord, PaymentStatus};
use sqlx::PgPool;
use uuid::Uuid;

use crate::entities::{FeeRecordEntity, FeeStatsEntity};
use crate::metrics::QueryTimer;

/// Repository for annual fee records.
#[derive(Clone)]
pub struct FeeRecordRepository {
    pool: PgPool,
}

impl FeeRecordRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Inserts the fee of (title, year) unless one already exists.
    ///
    /// Returns `None` when the record was already there.
    pub async fn create_if_missing(
        &self,
        title_id: Uuid,
        year: i32,
        amount: i64,
        due_date: NaiveDate,
    ) -> Result<Option<FeeRecord>, sqlx::Error> {
        let timer = QueryTimer::new("create_fee_if_missing");
        let entity = sqlx::query_as::<_, FeeRecordEntity>(
            r#"
            INSERT INTO fee_records (id, title_id, year, amount, due_date, status)
            VALUES ($1, $2, $3, $4, $5, 'pending')
            ON CONFLICT ON CONSTRAINT fee_records_title_year_unique DO NOTHING
            RETURNING id, title_id, year, amount, due_date, status, payment_reference,
                      payment_date, created_at, updated_at
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(title_id)
        .bind(year)
        .bind(amount)
        .bind(due_date)
        .fetch_optional(&self.pool)
        .await;
        timer.record();

        entity?.map(FeeRecord::try_from).transpose()
    }

    pub async fn find_by_id(&self, id: Uuid) -> Result<Option<FeeRecord>, sqlx::Error> {
        let entity = sqlx::query_as::<_, FeeRecordEntity>(
            r#"
            SELECT id, title_id, year, amount, due_date, status, payment_reference,
                   payment_date, created_at, updated_at
            FROM fee_records
            WHERE id = $1
            "#,
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        entity.map(FeeRecord::try_from).transpose()
    }

    /// Writes the payment fields of `fee` if its status is still `expected`.
    ///
    /// Returns `None` when another writer changed the status first.
    pub async fn save_payment_state(
        &self,
        fee: &FeeRecord,
        expected: PaymentStatus,
    ) -> Result<Option<FeeRecord>, sqlx::Error> {
        let timer = QueryTimer::new("update_fee_payment_state");
        let entity = sqlx::query_as::<_, FeeRecordEntity>(
            r#"
            UPDATE fee_records
            SET status = $3,
                payment_reference = $4,
                payment_date = $5,
                updated_at = NOW()
            WHERE id = $1 AND status = $2
            RETURNING id, title_id, year, amount, due_date, status, payment_reference,
                      payment_date, created_at, updated_at
            "#,
        )
        .bind(fee.id)
        .bind(expected.as_str())
        .bind(fee.status.as_str())
        .bind(&fee.payment_reference)
        .bind(fee.payment_date)
        .fetch_optional(&self.pool)
        .await;
        timer.record();

        entity?.map(FeeRecord::try_from).transpose()
    }

    /// Promotes pending fees due before `today` to overdue.
    pub async fn mark_overdue(&self, today: NaiveDate) -> Result<u64, sqlx::Error> {
        let timer = QueryTimer::new("mark_fees_overdue");
        let result = sqlx::query(
            r#"
            UPDATE fee_records
            SET status = 'overdue', updated_at = NOW()
            WHERE status = 'pending' AND due_date < $1
            "#,
        )
        .bind(today)
        .execute(&self.pool)
        .await;
        timer.record();

        Ok(result?.rows_affected())
    }

    /// Lists fees, newest year first, with the total count.
    pub async fn list(
        &self,
        query: &ListFeesQuery,
        limit: i64,
        offset: i64,
    ) -> Result<(Vec<FeeRecord>, i64), sqlx::Error> {
        let status = query.status.map(|s| s.as_str());

        let total: i64 = sqlx::query_scalar(
            r#"
            SELECT COUNT(*)
            FROM fee_records
            WHERE ($1::text IS NULL OR status = $1)
              AND ($2::int IS NULL OR year = $2)
              AND ($3::uuid IS NULL OR title_id = $3)
            "#,
        )
        .bind(status)
        .bind(query.year)
        .bind(query.title_id)
        .fetch_one(&self.pool)
        .await?;

        let timer = QueryTimer::new("list_fee_records");
        let entities = sqlx::query_as::<_, FeeRecordEntity>(
            r#"
            SELECT id, title_id, year, amount, due_date, status, payment_reference,
                   payment_date, created_at, updated_at
            FROM fee_records
            WHERE ($1::text IS NULL OR status = $1)
              AND ($2::int IS NULL OR year = $2)
              AND ($3::uuid IS NULL OR title_id = $3)
            ORDER BY year DESC, created_at DESC, id
            LIMIT $4 OFFSET $5
            "#,
        )
        .bind(status)
        .bind(query.year)
        .bind(query.title_id)
        .bind(limit)
        .bind(offset)
        .fetch_all(&self.pool)
        .await;
        timer.record();

        let fees = entities?
            .into_iter()
            .map(FeeRecord::try_from)
            .collect::<Result<Vec<_>, _>>()?;
        Ok((fees, total))
    }

    /// Amounts and counts per payment status.
    pub async fn statistics(&self) -> Result<FeeStatistics, sqlx::Error> {
        let timer = QueryTimer::new("fee_statistics");
        let entity = sqlx::query_as::<_, FeeStatsEntity>(
            r#"
            SELECT
                COUNT(*) AS total_records,
                SUM(amount) FILTER (WHERE status IN ('pending', 'overdue'))::bigint AS amount_due,
                SUM(amount) FILTER (WHERE status = 'paid')::bigint AS amount_paid,
                SUM(amount) FILTER (WHERE status = 'overdue')::bigint AS amount_overdue,
                COUNT(*) FILTER (WHERE status = 'pending') AS pending_count,
                COUNT(*) FILTER (WHERE status = 'paid') AS paid_count,
                COUNT(*) FILTER (WHERE status = 'overdue') AS overdue_count,
                COUNT(*) FILTER (WHERE status = 'cancelled') AS cancelled_count
            FROM fee_records
            "#,
        )
        .fetch_one(&self.pool)
        .await;
        timer.record();

        Ok(entity?.into())
    }

    pub async fn count_overdue(&self) -> Result<i64, sqlx::Error> {
        sqlx::query_scalar(r#"SELECT COUNT(*) FROM fee_records WHERE status = 'overdue'"#)
            .fetch_one(&self.pool)
            .await
    }
}
