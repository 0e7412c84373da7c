//! Webhook delivery records and their attempt state machine.
//!
//! A delivery is created with zero attempts and a recovery deadline one
//! backoff step out, after which the retry sweep picks it up if its first
//! attempt never ran. Every attempt first claims the
//! row, which bumps `attempts` by exactly one and schedules the next retry
//! with exponential backoff, then records the outcome as success or failed.
//! A delivery that reaches `max_attempts` without success stays failed.

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;
use std::str::FromStr;
use uuid::Uuid;

/// Default number of attempts per delivery.
pub const DEFAULT_MAX_ATTEMPTS: i32 = 3;

/// Stored response bodies are cut to this many characters.
pub const RESPONSE_BODY_LIMIT: usize = 1000;

/// Error details kept on the webhook are cut to this many characters.
pub const ERROR_DETAIL_LIMIT: usize = 200;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DeliveryStatus {
    Pending,
    Success,
    Failed,
    Retry,
}

impl DeliveryStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            DeliveryStatus::Pending => "pending",
            DeliveryStatus::Success => "success",
            DeliveryStatus::Failed => "failed",
            DeliveryStatus::Retry => "retry",
        }
    }
}

impl std::fmt::Display for DeliveryStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for DeliveryStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(DeliveryStatus::Pending),
            "success" => Ok(DeliveryStatus::Success),
            "failed" => Ok(DeliveryStatus::Failed),
            "retry" => Ok(DeliveryStatus::Retry),
            _ => Err(format!("Unknown delivery status: {}", s)),
        }
    }
}

/// Whether an attempt is the first one (or a manual retrigger) or a sweep retry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AttemptKind {
    Initial,
    Retry,
}

/// Backoff before the attempt following attempt number `attempts`.
pub fn backoff_after(attempts: i32) -> Duration {
    let exponent = attempts.clamp(0, 20) as u32;
    Duration::minutes(2_i64.pow(exponent))
}

/// Cuts `text` to at most `limit` characters on a char boundary.
pub fn truncate_chars(text: &str, limit: usize) -> String {
    match text.char_indices().nth(limit) {
        Some((idx, _)) => text[..idx].to_string(),
        None => text.to_string(),
    }
}

/// One tracked delivery of one event to one webhook.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WebhookDelivery {
    pub id: Uuid,
    pub webhook_id: Uuid,
    pub event: String,
    pub payload: JsonValue,
    pub status: DeliveryStatus,
    pub http_status: Option<i32>,
    pub response_body: Option<String>,
    pub error_message: Option<String>,
    pub attempts: i32,
    pub max_attempts: i32,
    pub next_retry: Option<DateTime<Utc>>,
    pub delivered_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Compare-and-set update that reserves one attempt on a delivery.
///
/// The persistence layer applies it only if the row still carries
/// `expected_attempts` and `expected_status`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeliveryClaim {
    pub delivery_id: Uuid,
    pub expected_attempts: i32,
    pub expected_status: DeliveryStatus,
    pub attempts: i32,
    pub status: DeliveryStatus,
    pub next_retry: DateTime<Utc>,
}

/// Result of one HTTP delivery attempt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DeliveryOutcome {
    /// The subscriber answered (any status code).
    Response { status_code: u16, body: String },
    /// No HTTP response: timeout, refused connection, DNS failure.
    Transport { error: String },
    /// The attempt was not made; the webhook is gone or disabled.
    Skipped { reason: String },
}

impl DeliveryOutcome {
    pub fn is_success(&self) -> bool {
        matches!(self, DeliveryOutcome::Response { status_code, .. } if (200..300).contains(status_code))
    }

    pub fn status_code(&self) -> Option<u16> {
        match self {
            DeliveryOutcome::Response { status_code, .. } => Some(*status_code),
            _ => None,
        }
    }

    /// Detail stored on the webhook's `last_error` after a failure.
    pub fn error_detail(&self) -> Option<String> {
        match self {
            DeliveryOutcome::Response { status_code, body } if !self.is_success() => Some(format!(
                "HTTP {}: {}",
                status_code,
                truncate_chars(body, ERROR_DETAIL_LIMIT)
            )),
            DeliveryOutcome::Response { .. } => None,
            DeliveryOutcome::Transport { error } => Some(truncate_chars(error, ERROR_DETAIL_LIMIT)),
            DeliveryOutcome::Skipped { reason } => Some(reason.clone()),
        }
    }
}

impl WebhookDelivery {
    /// A fresh delivery, created before its first attempt.
    ///
    /// `next_retry` is the recovery deadline for an attempt that never runs.
    pub fn new(webhook_id: Uuid, event: &str, payload: JsonValue, max_attempts: i32, now: DateTime<Utc>) -> Self {
        Self {
            id: Uuid::new_v4(),
            webhook_id,
            event: event.to_string(),
            payload,
            status: DeliveryStatus::Pending,
            http_status: None,
            response_body: None,
            error_message: None,
            attempts: 0,
            max_attempts,
            next_retry: Some(now + backoff_after(0)),
            delivered_at: None,
            created_at: now,
            updated_at: now,
        }
    }

    pub fn is_exhausted(&self) -> bool {
        self.attempts >= self.max_attempts
    }

    /// Whether the retry sweep should pick this delivery up.
    ///
    /// Rows without a scheduled retry are final. Failed deliveries are due
    /// once their backoff has elapsed. Pending or retry rows are attempts that
    /// never ran or never finished, and are recovered on the same schedule.
    pub fn is_retry_due(&self, now: DateTime<Utc>) -> bool {
        if self.is_exhausted() || self.status == DeliveryStatus::Success {
            return false;
        }
        self.next_retry.map_or(false, |at| at <= now)
    }

    /// Whether no attempt is scheduled or running: the last one succeeded or
    /// failed.
    pub fn is_settled(&self) -> bool {
        matches!(self.status, DeliveryStatus::Success | DeliveryStatus::Failed)
    }

    /// Plans the claim for the next attempt.
    pub fn plan_claim(&self, kind: AttemptKind, now: DateTime<Utc>) -> DeliveryClaim {
        let attempts = self.attempts + 1;
        DeliveryClaim {
            delivery_id: self.id,
            expected_attempts: self.attempts,
            expected_status: self.status,
            attempts,
            status: match kind {
                AttemptKind::Initial => DeliveryStatus::Pending,
                AttemptKind::Retry => DeliveryStatus::Retry,
            },
            next_retry: now + backoff_after(attempts),
        }
    }

    pub fn apply_claim(&mut self, claim: &DeliveryClaim) {
        self.attempts = claim.attempts;
        self.status = claim.status;
        self.next_retry = Some(claim.next_retry);
    }

    /// Records the outcome of the claimed attempt.
    pub fn record_outcome(&mut self, outcome: &DeliveryOutcome, now: DateTime<Utc>) {
        self.http_status = outcome.status_code().map(i32::from);
        self.updated_at = now;
        match outcome {
            DeliveryOutcome::Response { body, .. } if outcome.is_success() => {
                self.status = DeliveryStatus::Success;
                self.response_body = Some(truncate_chars(body, RESPONSE_BODY_LIMIT));
                self.error_message = None;
                self.delivered_at = Some(now);
                self.next_retry = None;
            }
            DeliveryOutcome::Response { body, .. } => {
                self.status = DeliveryStatus::Failed;
                self.response_body = Some(truncate_chars(body, RESPONSE_BODY_LIMIT));
                self.error_message = outcome.error_detail();
            }
            DeliveryOutcome::Transport { .. } => {
                self.status = DeliveryStatus::Failed;
                self.response_body = None;
                self.error_message = outcome.error_detail();
            }
            DeliveryOutcome::Skipped { .. } => {
                self.status = DeliveryStatus::Failed;
                self.error_message = outcome.error_detail();
                self.next_retry = None;
            }
        }
        if self.status == DeliveryStatus::Failed && self.is_exhausted() {
            self.next_retry = None;
        }
    }

    /// Administrative retrigger: clears the attempt budget so the next
    /// attempt can run immediately. The row gets the same recovery deadline
    /// as a fresh delivery.
    pub fn reset_for_manual_retry(&mut self, now: DateTime<Utc>) {
        self.attempts = 0;
        self.status = DeliveryStatus::Pending;
        self.next_retry = Some(now + backoff_after(0));
        self.updated_at = now;
    }
}

/// Query parameters for listing a webhook's deliveries.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ListDeliveriesQuery {
    pub status: Option<DeliveryStatus>,
    pub limit: Option<i64>,
    pub offset: Option<i64>,
}

#[derive(Debug, Clone, Serialize)]
pub struct ListDeliveriesResponse {
    pub deliveries: Vec<WebhookDelivery>,
    pub total: i64,
}
