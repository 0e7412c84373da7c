//! Hourly expiry pass over all titles.

use tracing::info;

use crate::services::LifecycleService;

use super::scheduler::{Job, JobFrequency};

pub struct TitleExpiryJob {
    lifecycle: LifecycleService,
}

impl TitleExpiryJob {
    pub fn new(lifecycle: LifecycleService) -> Self {
        Self { lifecycle }
    }
}

#[async_trait::async_trait]
impl Job for TitleExpiryJob {
    fn name(&self) -> &'static str {
        "title_expiry"
    }

    fn frequency(&self) -> JobFrequency {
        JobFrequency::Hourly
    }

    async fn execute(&self) -> Result<(), String> {
        let expired = self
            .lifecycle
            .expire_due_titles(None)
            .await
            .map_err(|e| format!("Failed to expire titles: {}", e))?;
        if expired > 0 {
            info!(expired, "Titles expired");
        }
        Ok(())
    }
}
