//! Retry sweep over failed and abandoned webhook deliveries.

use tracing::info;

use crate::services::WebhookDeliveryService;

use super::scheduler::{Job, JobFrequency};

pub struct WebhookRetryJob {
    deliveries: WebhookDeliveryService,
    batch_size: i64,
}

impl WebhookRetryJob {
    pub fn new(deliveries: WebhookDeliveryService, batch_size: i64) -> Self {
        Self {
            deliveries,
            batch_size,
        }
    }
}

#[async_trait::async_trait]
impl Job for WebhookRetryJob {
    fn name(&self) -> &'static str {
        "webhook_retry"
    }

    fn frequency(&self) -> JobFrequency {
        JobFrequency::Minutes(1)
    }

    async fn execute(&self) -> Result<(), String> {
        let report = self
            .deliveries
            .process_due_retries(self.batch_size)
            .await
            .map_err(|e| format!("Failed to process webhook retries: {}", e))?;

        if report.selected > 0 {
            info!(
                selected = report.selected,
                succeeded = report.succeeded,
                failed = report.failed,
                finalised = report.finalised,
                lost = report.lost,
                "Webhook retry sweep finished"
            );
        }
        Ok(())
    }
}
