//! Daily in-app summary for administrators.

use chrono::Utc;
use domain::models::{DeliveryStatus, UserRole};
use domain::services::notification::{admin_digest, DigestFigures};
use persistence::repositories::{
    FeeRecordRepository, LicenseRequestRepository, TitleRepository, UserRepository,
    WebhookDeliveryRepository,
};
use sqlx::PgPool;
use tracing::info;

use crate::services::NotificationDispatcher;

use super::scheduler::{Job, JobFrequency};

pub struct AdminDigestJob {
    titles: TitleRepository,
    requests: LicenseRequestRepository,
    fees: FeeRecordRepository,
    deliveries: WebhookDeliveryRepository,
    users: UserRepository,
    dispatcher: NotificationDispatcher,
}

impl AdminDigestJob {
    pub fn new(pool: PgPool, dispatcher: NotificationDispatcher) -> Self {
        Self {
            titles: TitleRepository::new(pool.clone()),
            requests: LicenseRequestRepository::new(pool.clone()),
            fees: FeeRecordRepository::new(pool.clone()),
            deliveries: WebhookDeliveryRepository::new(pool.clone()),
            users: UserRepository::new(pool),
            dispatcher,
        }
    }

    async fn figures(&self) -> Result<DigestFigures, sqlx::Error> {
        let now = Utc::now();
        let titles = self.titles.statistics(now.date_naive()).await?;
        let requests = self.requests.statistics(now).await?;
        Ok(DigestFigures {
            open_requests: self.requests.count_open().await?,
            overdue_requests: requests.overdue,
            titles_expiring_soon: titles.expiring_within_30_days,
            overdue_fees: self.fees.count_overdue().await?,
            failed_deliveries: self.deliveries.count_by_status(DeliveryStatus::Failed).await?,
        })
    }
}

#[async_trait::async_trait]
impl Job for AdminDigestJob {
    fn name(&self) -> &'static str {
        "admin_digest"
    }

    fn frequency(&self) -> JobFrequency {
        JobFrequency::Daily
    }

    async fn execute(&self) -> Result<(), String> {
        let figures = self
            .figures()
            .await
            .map_err(|e| format!("Failed to compute digest figures: {}", e))?;
        let admins = self
            .users
            .list_active_with_roles(&[UserRole::Admin])
            .await
            .map_err(|e| format!("Failed to load admins: {}", e))?;

        let batch = admins.iter().map(|a| admin_digest(a.id, &figures)).collect();
        let created = self.dispatcher.create_many(batch).await;
        info!(admins = admins.len(), created, figures = ?figures, "Admin digest sent");
        Ok(())
    }
}
