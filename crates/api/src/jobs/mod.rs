//! Background jobs and their scheduler.

mod admin_digest;
mod expiration_warnings;
mod fee_overdue;
mod notification_cleanup;
mod overdue_requests;
mod pool_metrics;
mod scheduler;
mod service_health;
mod title_expiry;
mod webhook_cleanup;
mod webhook_retry;

pub use admin_digest::AdminDigestJob;
pub use expiration_warnings::ExpirationWarningJob;
pub use fee_overdue::FeeOverdueJob;
pub use notification_cleanup::NotificationCleanupJob;
pub use overdue_requests::OverdueRequestReminderJob;
pub use pool_metrics::PoolMetricsJob;
pub use scheduler::{Job, JobFrequency, JobScheduler};
pub use service_health::ServiceHealthProbeJob;
pub use title_expiry::TitleExpiryJob;
pub use webhook_cleanup::WebhookCleanupJob;
pub use webhook_retry::WebhookRetryJob;

use crate::app::AppState;

/// A scheduler with every back-office job registered from `state`.
pub fn build_scheduler(state: &AppState) -> JobScheduler {
    let config = &state.config;
    let mut scheduler = JobScheduler::new();

    scheduler.register(WebhookRetryJob::new(
        state.webhooks.clone(),
        config.webhooks.retry_batch_size,
    ));
    scheduler.register(WebhookCleanupJob::new(
        state.webhooks.clone(),
        config.webhooks.retention_days,
    ));
    scheduler.register(TitleExpiryJob::new(state.lifecycle.clone()));
    scheduler.register(FeeOverdueJob::new(state.fees.clone()));
    scheduler.register(ExpirationWarningJob::new(
        state.pool.clone(),
        state.notifications.clone(),
        &config.notifications,
    ));
    scheduler.register(OverdueRequestReminderJob::new(
        state.pool.clone(),
        state.lifecycle.clone(),
        state.notifications.clone(),
    ));
    scheduler.register(NotificationCleanupJob::new(
        state.pool.clone(),
        config.notifications.read_retention_days,
    ));
    scheduler.register(AdminDigestJob::new(state.pool.clone(), state.notifications.clone()));
    scheduler.register(ServiceHealthProbeJob::new(
        state.probe.clone(),
        config.health.probe_interval_minutes,
    ));
    scheduler.register(PoolMetricsJob::new(state.pool.clone()));

    scheduler
}
