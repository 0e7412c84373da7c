//! Fee record entity (database row mapping).

use chrono::{DateTime, NaiveDate, Utc};
use domain::models::fee::FeeStatistics;
use domain::models::FeeRecord;
use sqlx::FromRow;
use uuid::Uuid;

use super::decode_text;

/// Database row mapping for the fee_records table.
#[derive(Debug, Clone, FromRow)]
pub struct FeeRecordEntity {
    pub id: Uuid,
    pub title_id: Uuid,
    pub year: i32,
    pub amount: i64,
    pub due_date: NaiveDate,
    pub status: String,
    pub payment_reference: Option<String>,
    pub payment_date: Option<NaiveDate>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl TryFrom<FeeRecordEntity> for FeeRecord {
    type Error = sqlx::Error;

    fn try_from(entity: FeeRecordEntity) -> Result<Self, Self::Error> {
        Ok(Self {
            id: entity.id,
            title_id: entity.title_id,
            year: entity.year,
            amount: entity.amount,
            due_date: entity.due_date,
            status: decode_text("status", &entity.status)?,
            payment_reference: entity.payment_reference,
            payment_date: entity.payment_date,
            created_at: entity.created_at,
            updated_at: entity.updated_at,
        })
    }
}

/// Aggregates over fee_records; SUM/COUNT columns are nullable in Postgres.
#[derive(Debug, Clone, FromRow)]
pub struct FeeStatsEntity {
    pub total_records: Option<i64>,
    pub amount_due: Option<i64>,
    pub amount_paid: Option<i64>,
    pub amount_overdue: Option<i64>,
    pub pending_count: Option<i64>,
    pub paid_count: Option<i64>,
    pub overdue_count: Option<i64>,
    pub cancelled_count: Option<i64>,
}

impl From<FeeStatsEntity> for FeeStatistics {
    fn from(entity: FeeStatsEntity) -> Self {
        Self {
            total_records: entity.total_records.unwrap_or(0),
            amount_due: entity.amount_due.unwrap_or(0),
            amount_paid: entity.amount_paid.unwrap_or(0),
            amount_overdue: entity.amount_overdue.unwrap_or(0),
            pending_count: entity.pending_count.unwrap_or(0),
            paid_count: entity.paid_count.unwrap_or(0),
            overdue_count: entity.overdue_count.unwrap_or(0),
            cancelled_count: entity.cancelled_count.unwrap_or(0),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_stats_default_to_zero() {
        let stats = FeeStatistics::from(FeeStatsEntity {
            total_records: Some(0),
            amount_due: None,
            amount_paid: None,
            amount_overdue: None,
            pending_count: Some(0),
            paid_count: Some(0),
            overdue_count: Some(0),
            cancelled_count: Some(0),
        });
        assert_eq!(stats, FeeStatistics::default());
    }
}
