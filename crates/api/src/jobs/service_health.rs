//! Periodic health probe of watched external services.

use tracing::info;

use crate::services::HealthProbeService;

use super::scheduler::{Job, JobFrequency};

pub struct ServiceHealthProbeJob {
    probe: HealthProbeService,
    interval_minutes: u64,
}

impl ServiceHealthProbeJob {
    pub fn new(probe: HealthProbeService, interval_minutes: u64) -> Self {
        Self {
            probe,
            interval_minutes: interval_minutes.max(1),
        }
    }
}

#[async_trait::async_trait]
impl Job for ServiceHealthProbeJob {
    fn name(&self) -> &'static str {
        "service_health_probe"
    }

    fn frequency(&self) -> JobFrequency {
        JobFrequency::Minutes(self.interval_minutes)
    }

    async fn execute(&self) -> Result<(), String> {
        let report = self
            .probe
            .probe_all()
            .await
            .map_err(|e| format!("Failed to list external services: {}", e))?;
        if report.checked + report.failed > 0 {
            info!(
                checked = report.checked,
                up = report.up,
                degraded = report.degraded,
                down = report.down,
                failed = report.failed,
                "External services probed"
            );
        }
        Ok(())
    }
}
