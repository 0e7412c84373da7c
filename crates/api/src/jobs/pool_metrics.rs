//! Pool and backlog gauges.

use domain::models::{DeliveryStatus, TitleStatus};
use persistence::metrics::{record_backlog_metrics, record_pool_metrics, BacklogSnapshot};
use persistence::repositories::{
    FeeRecordRepository, LicenseRequestRepository, TitleRepository, WebhookDeliveryRepository,
};
use sqlx::PgPool;

use super::scheduler::{Job, JobFrequency};

pub struct PoolMetricsJob {
    pool: PgPool,
    titles: TitleRepository,
    requests: LicenseRequestRepository,
    fees: FeeRecordRepository,
    deliveries: WebhookDeliveryRepository,
}

impl PoolMetricsJob {
    pub fn new(pool: PgPool) -> Self {
        Self {
            titles: TitleRepository::new(pool.clone()),
            requests: LicenseRequestRepository::new(pool.clone()),
            fees: FeeRecordRepository::new(pool.clone()),
            deliveries: WebhookDeliveryRepository::new(pool.clone()),
            pool,
        }
    }

    async fn backlog(&self) -> Result<BacklogSnapshot, sqlx::Error> {
        Ok(BacklogSnapshot {
            pending_deliveries: self.deliveries.count_by_status(DeliveryStatus::Pending).await?,
            failed_deliveries: self.deliveries.count_by_status(DeliveryStatus::Failed).await?,
            open_requests: self.requests.count_open().await?,
            approved_titles: self.titles.count_by_status(TitleStatus::Approved).await?,
            overdue_fees: self.fees.count_overdue().await?,
        })
    }
}

#[async_trait::async_trait]
impl Job for PoolMetricsJob {
    fn name(&self) -> &'static str {
        "pool_metrics"
    }

    fn frequency(&self) -> JobFrequency {
        JobFrequency::Seconds(10)
    }

    async fn execute(&self) -> Result<(), String> {
        record_pool_metrics(&self.pool);
        let snapshot = self
            .backlog()
            .await
            .map_err(|e| format!("Failed to count backlog: {}", e))?;
        record_backlog_metrics(&snapshot);
        Ok(())
    }
}
