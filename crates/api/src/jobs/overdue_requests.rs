//! Daily reminders to staff about requests left open too long.

use chrono::Utc;
use domain::services::notification::overdue_request_reminder;
use persistence::repositories::UserRepository;
use sqlx::PgPool;
use tracing::info;

use crate::services::{LifecycleService, NotificationDispatcher};

use super::scheduler::{Job, JobFrequency};

pub struct OverdueRequestReminderJob {
    lifecycle: LifecycleService,
    users: UserRepository,
    dispatcher: NotificationDispatcher,
}

impl OverdueRequestReminderJob {
    pub fn new(pool: PgPool, lifecycle: LifecycleService, dispatcher: NotificationDispatcher) -> Self {
        Self {
            lifecycle,
            users: UserRepository::new(pool),
            dispatcher,
        }
    }
}

#[async_trait::async_trait]
impl Job for OverdueRequestReminderJob {
    fn name(&self) -> &'static str {
        "overdue_request_reminders"
    }

    fn frequency(&self) -> JobFrequency {
        JobFrequency::Daily
    }

    async fn execute(&self) -> Result<(), String> {
        let now = Utc::now();
        let overdue = self
            .lifecycle
            .overdue_requests()
            .await
            .map_err(|e| format!("Failed to load overdue requests: {}", e))?;
        if overdue.is_empty() {
            return Ok(());
        }

        let staff = self
            .users
            .list_active_staff()
            .await
            .map_err(|e| format!("Failed to load staff: {}", e))?;

        let batch: Vec<_> = overdue
            .iter()
            .flat_map(|request| {
                let days_open = request.days_since_submission(now);
                staff
                    .iter()
                    .map(move |s| overdue_request_reminder(request, s.id, days_open))
            })
            .collect();

        let created = self.dispatcher.create_many(batch).await;
        info!(requests = overdue.len(), staff = staff.len(), created, "Overdue request reminders sent");
        Ok(())
    }
}
