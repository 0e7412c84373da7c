//! Daily deletion of finished webhook deliveries past retention.

use crate::services::WebhookDeliveryService;

use super::scheduler::{Job, JobFrequency};

pub struct WebhookCleanupJob {
    deliveries: WebhookDeliveryService,
    retention_days: i64,
}

impl WebhookCleanupJob {
    pub fn new(deliveries: WebhookDeliveryService, retention_days: i64) -> Self {
        Self {
            deliveries,
            retention_days,
        }
    }
}

#[async_trait::async_trait]
impl Job for WebhookCleanupJob {
    fn name(&self) -> &'static str {
        "webhook_cleanup"
    }

    fn frequency(&self) -> JobFrequency {
        JobFrequency::Daily
    }

    async fn execute(&self) -> Result<(), String> {
        self.deliveries
            .cleanup(self.retention_days)
            .await
            .map(|_| ())
            .map_err(|e| format!("Failed to clean up webhook deliveries: {}", e))
    }
}
