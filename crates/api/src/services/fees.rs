//! Annual fee records.
//!
//! Fee creation after an approval is best effort: the caller logs a failure
//! and the daily generation picks the title up again.

use chrono::{Datelike, Utc};
use domain::models::fee::{
    due_date_for_year, FeeStatistics, GenerateFeesResponse, ListFeesQuery, MarkFeePaidRequest,
};
use domain::models::{
    AuditAction, FeeRecord, HistoryAction, HistorySubject, NewHistoryEntry, PaymentStatus,
    Title, TransitionError,
};
use domain::services::AuditLogger;
use persistence::repositories::{FeeRecordRepository, HistoryRepository, TitleRepository};
use shared::pagination::clamp_limit;
use sqlx::PgPool;
use std::sync::Arc;
use tracing::{info, warn};
use uuid::Uuid;

use super::lifecycle::LifecycleError;
use crate::extractors::Actor;

/// Service for fee generation, payment and overdue promotion.
#[derive(Clone)]
pub struct FeeService {
    fees: FeeRecordRepository,
    titles: TitleRepository,
    history: HistoryRepository,
    audit: Arc<dyn AuditLogger>,
}

impl FeeService {
    pub fn new(pool: PgPool, audit: Arc<dyn AuditLogger>) -> Self {
        Self {
            fees: FeeRecordRepository::new(pool.clone()),
            titles: TitleRepository::new(pool.clone()),
            history: HistoryRepository::new(pool),
            audit,
        }
    }

    /// Creates the fee of `title` for `year` unless it exists, and notes it in
    /// the title history. Returns `None` when the fee was already there.
    pub async fn create_fee(
        &self,
        title: &Title,
        year: i32,
        actor_id: Option<Uuid>,
    ) -> Result<Option<FeeRecord>, LifecycleError> {
        let due_date = due_date_for_year(year)
            .ok_or_else(|| TransitionError::Invalid(format!("Invalid fee year {}", year)))?;

        let Some(fee) = self
            .fees
            .create_if_missing(title.id, year, title.annual_fee, due_date)
            .await?
        else {
            return Ok(None);
        };

        let entry = NewHistoryEntry::new(HistorySubject::Title, title.id, HistoryAction::Modification)
            .by(actor_id)
            .with_comment(Some(format!(
                "Fee generated for year {}: amount {} FCFA",
                year, fee.amount
            )));
        self.history.append(&entry).await?;

        info!(title_id = %title.id, fee_id = %fee.id, year, amount = fee.amount, "Fee generated");
        Ok(Some(fee))
    }

    /// Current-year fee of `title`; failures are logged only.
    pub async fn ensure_current_year_fee(&self, title: &Title, actor_id: Option<Uuid>) {
        let year = Utc::now().year();
        if let Err(e) = self.create_fee(title, year, actor_id).await {
            warn!(title_id = %title.id, year, error = %e, "Failed to create current year fee");
        }
    }

    /// Creates the `year` fee of every approved title that lacks one.
    pub async fn generate_annual_fees(
        &self,
        year: i32,
        actor: &Actor,
    ) -> Result<GenerateFeesResponse, LifecycleError> {
        let titles = self.titles.find_approved_without_fee(year).await?;
        let mut created: u64 = 0;
        for title in &titles {
            match self.create_fee(title, year, actor.id).await {
                Ok(Some(_)) => created += 1,
                Ok(None) => {}
                Err(e) => warn!(title_id = %title.id, year, error = %e, "Fee generation failed"),
            }
        }

        self.audit
            .record_or_warn(
                actor
                    .audit(AuditAction::FeeGenerate)
                    .on_resource_type("fee")
                    .describe(format!("Generated {} fees for {}", created, year))
                    .with_extra(serde_json::json!({ "year": year, "created": created }))
                    .build(),
            )
            .await;

        info!(year, created, candidates = titles.len(), "Annual fee generation finished");
        Ok(GenerateFeesResponse { year, created })
    }

    /// Promotes pending fees past their due date to overdue.
    pub async fn promote_overdue(&self) -> Result<u64, LifecycleError> {
        let today = Utc::now().date_naive();
        let promoted = self.fees.mark_overdue(today).await?;
        if promoted > 0 {
            info!(promoted, "Fees marked overdue");
        }
        Ok(promoted)
    }

    async fn load(&self, id: Uuid) -> Result<FeeRecord, LifecycleError> {
        self.promote_overdue().await?;
        self.fees
            .find_by_id(id)
            .await?
            .ok_or_else(|| LifecycleError::NotFound(format!("Fee {} not found", id)))
    }

    pub async fn mark_paid(
        &self,
        id: Uuid,
        input: &MarkFeePaidRequest,
        actor: &Actor,
    ) -> Result<FeeRecord, LifecycleError> {
        let mut fee = self.load(id).await?;
        let expected = fee.status;
        let date = input.payment_date.unwrap_or_else(|| Utc::now().date_naive());
        fee.mark_paid(input.payment_reference.trim(), date)?;

        let fee = self.save(&fee, expected).await?;

        let entry =
            NewHistoryEntry::new(HistorySubject::Title, fee.title_id, HistoryAction::Modification)
                .by(actor.id)
                .with_comment(Some(format!(
                    "Fee {} paid, reference {}",
                    fee.year,
                    input.payment_reference.trim()
                )));
        if let Err(e) = self.history.append(&entry).await {
            warn!(fee_id = %fee.id, error = %e, "Failed to record fee payment in history");
        }

        self.audit_fee(actor, AuditAction::FeePay, &fee, format!("Fee {} paid", fee.year))
            .await;
        Ok(fee)
    }

    pub async fn cancel(&self, id: Uuid, actor: &Actor) -> Result<FeeRecord, LifecycleError> {
        let mut fee = self.load(id).await?;
        let expected = fee.status;
        fee.cancel()?;

        let fee = self.save(&fee, expected).await?;
        self.audit_fee(actor, AuditAction::FeeCancel, &fee, format!("Fee {} cancelled", fee.year))
            .await;
        Ok(fee)
    }

    async fn save(
        &self,
        fee: &FeeRecord,
        expected: PaymentStatus,
    ) -> Result<FeeRecord, LifecycleError> {
        self.fees
            .save_payment_state(fee, expected)
            .await?
            .ok_or_else(|| {
                LifecycleError::Conflict(format!("Fee {} was modified concurrently", fee.id))
            })
    }

    async fn audit_fee(&self, actor: &Actor, action: AuditAction, fee: &FeeRecord, description: String) {
        self.audit
            .record_or_warn(
                actor
                    .audit(action)
                    .on_resource("fee", fee.id)
                    .describe(description)
                    .with_extra(serde_json::json!({
                        "title_id": fee.title_id,
                        "year": fee.year,
                        "amount": fee.amount,
                    }))
                    .build(),
            )
            .await;
    }

    pub async fn list(&self, query: &ListFeesQuery) -> Result<(Vec<FeeRecord>, i64), LifecycleError> {
        self.promote_overdue().await?;
        let limit = clamp_limit(query.limit);
        let offset = query.offset.unwrap_or(0).max(0);
        Ok(self.fees.list(query, limit, offset).await?)
    }

    pub async fn statistics(&self) -> Result<FeeStatistics, LifecycleError> {
        self.promote_overdue().await?;
        Ok(self.fees.statistics().await?)
    }
}

