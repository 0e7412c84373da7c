//! Daily deletion of read notifications past retention.

use chrono::{Duration, Utc};
use persistence::repositories::NotificationRepository;
use sqlx::PgPool;
use tracing::info;

use super::scheduler::{Job, JobFrequency};

pub struct NotificationCleanupJob {
    notifications: NotificationRepository,
    retention_days: i64,
}

impl NotificationCleanupJob {
    pub fn new(pool: PgPool, retention_days: i64) -> Self {
        Self {
            notifications: NotificationRepository::new(pool),
            retention_days,
        }
    }
}

#[async_trait::async_trait]
impl Job for NotificationCleanupJob {
    fn name(&self) -> &'static str {
        "notification_cleanup"
    }

    fn frequency(&self) -> JobFrequency {
        JobFrequency::Daily
    }

    async fn execute(&self) -> Result<(), String> {
        let cutoff = Utc::now() - Duration::days(self.retention_days);
        let deleted = self
            .notifications
            .delete_read_before(cutoff)
            .await
            .map_err(|e| format!("Failed to delete old notifications: {}", e))?;
        if deleted > 0 {
            info!(deleted, retention_days = self.retention_days, "Old notifications deleted");
        }
        Ok(())
    }
}
