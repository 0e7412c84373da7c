//! Annual fee records.

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use std::str::FromStr;
use uuid::Uuid;
use validator::Validate;

use super::history::TransitionError;

/// Payment status of a fee record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PaymentStatus {
    Pending,
    Paid,
    Overdue,
    Cancelled,
}

impl PaymentStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            PaymentStatus::Pending => "pending",
            PaymentStatus::Paid => "paid",
            PaymentStatus::Overdue => "overdue",
            PaymentStatus::Cancelled => "cancelled",
        }
    }
}

impl std::fmt::Display for PaymentStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for PaymentStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(PaymentStatus::Pending),
            "paid" => Ok(PaymentStatus::Paid),
            "overdue" => Ok(PaymentStatus::Overdue),
            "cancelled" => Ok(PaymentStatus::Cancelled),
            _ => Err(format!("Unknown payment status: {}", s)),
        }
    }
}

/// December 31st of `year`, the due date of every annual fee.
pub fn due_date_for_year(year: i32) -> Option<NaiveDate> {
    NaiveDate::from_ymd_opt(year, 12, 31)
}

/// One yearly fee obligation of a title. Unique per (title, year).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FeeRecord {
    pub id: Uuid,
    pub title_id: Uuid,
    pub year: i32,
    pub amount: i64,
    pub due_date: NaiveDate,
    pub status: PaymentStatus,
    pub payment_reference: Option<String>,
    pub payment_date: Option<NaiveDate>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl FeeRecord {
    /// A pending fee past its due date without payment is overdue.
    pub fn is_past_due(&self, today: NaiveDate) -> bool {
        self.status == PaymentStatus::Pending && today > self.due_date
    }

    pub fn mark_paid(&mut self, reference: &str, date: NaiveDate) -> Result<(), TransitionError> {
        match self.status {
            PaymentStatus::Pending | PaymentStatus::Overdue => {
                self.status = PaymentStatus::Paid;
                self.payment_reference = Some(reference.to_string());
                self.payment_date = Some(date);
                Ok(())
            }
            other => Err(TransitionError::NotAllowed {
                entity: "fee",
                from: other.to_string(),
                to: PaymentStatus::Paid.to_string(),
            }),
        }
    }

    pub fn cancel(&mut self) -> Result<(), TransitionError> {
        match self.status {
            PaymentStatus::Pending | PaymentStatus::Overdue => {
                self.status = PaymentStatus::Cancelled;
                Ok(())
            }
            other => Err(TransitionError::NotAllowed {
                entity: "fee",
                from: other.to_string(),
                to: PaymentStatus::Cancelled.to_string(),
            }),
        }
    }
}

/// Request payload for recording a payment.
#[derive(Debug, Clone, Deserialize, Validate)]
pub struct MarkFeePaidRequest {
    #[validate(
        length(min = 1, max = 100, message = "Payment reference must be 1-100 characters"),
        custom(function = "shared::validation::validate_not_blank")
    )]
    pub payment_reference: String,

    /// Defaults to today.
    pub payment_date: Option<NaiveDate>,
}

/// Request payload for the bulk annual generation.
#[derive(Debug, Clone, Deserialize, Validate)]
pub struct GenerateFeesRequest {
    #[validate(range(min = 2000, max = 2100, message = "Year must be between 2000 and 2100"))]
    pub year: i32,
}

/// Result of a bulk annual generation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct GenerateFeesResponse {
    pub year: i32,
    pub created: u64,
}

/// Query parameters for listing fees.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ListFeesQuery {
    pub status: Option<PaymentStatus>,
    pub year: Option<i32>,
    pub title_id: Option<Uuid>,
    pub limit: Option<i64>,
    pub offset: Option<i64>,
}

#[derive(Debug, Clone, Serialize)]
pub struct ListFeesResponse {
    pub fees: Vec<FeeRecord>,
    pub total: i64,
}

/// Aggregate amounts per payment status.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct FeeStatistics {
    pub total_records: i64,
    pub amount_due: i64,
    pub amount_paid: i64,
    pub amount_overdue: i64,
    pub pending_count: i64,
    pub paid_count: i64,
    pub overdue_count: i64,
    pub cancelled_count: i64,
}
