//! Daily expiry warnings for approved titles.
//!
//! A title is warned about on the days its remaining validity equals one of
//! the configured tiers. The owner is always emailed; staff only close to
//! expiry.

use chrono::{Duration, Utc};
use domain::models::{NewNotification, Title, User};
use domain::services::notification as compose;
use persistence::repositories::{TitleRepository, UserRepository};
use sqlx::PgPool;
use tracing::info;

use crate::config::NotificationConfig;
use crate::services::NotificationDispatcher;

use super::scheduler::{Job, JobFrequency};

pub struct ExpirationWarningJob {
    titles: TitleRepository,
    users: UserRepository,
    dispatcher: NotificationDispatcher,
    tiers: Vec<i64>,
    email_threshold: i64,
}

impl ExpirationWarningJob {
    pub fn new(pool: PgPool, dispatcher: NotificationDispatcher, config: &NotificationConfig) -> Self {
        Self {
            titles: TitleRepository::new(pool.clone()),
            users: UserRepository::new(pool),
            dispatcher,
            tiers: config.expiration_warning_days.clone(),
            email_threshold: config.email_warning_threshold_days,
        }
    }
}

/// Owner and staff warnings for `title`, which has `days_left` days of validity.
pub fn warnings_for(
    title: &Title,
    days_left: i64,
    staff: &[User],
    email_threshold: i64,
) -> Vec<NewNotification> {
    std::iter::once(compose::expiration_warning_for_owner(title, days_left, email_threshold))
        .chain(staff.iter().filter(|s| s.id != title.owner_id).map(|s| {
            compose::expiration_warning_for_staff(title, s.id, days_left, email_threshold)
        }))
        .collect()
}

#[async_trait::async_trait]
impl Job for ExpirationWarningJob {
    fn name(&self) -> &'static str {
        "expiration_warnings"
    }

    fn frequency(&self) -> JobFrequency {
        JobFrequency::Daily
    }

    async fn execute(&self) -> Result<(), String> {
        let today = Utc::now().date_naive();
        let staff = self
            .users
            .list_active_staff()
            .await
            .map_err(|e| format!("Failed to load staff: {}", e))?;

        let mut batch = Vec::new();
        let mut warned_titles = 0;
        for &days_left in &self.tiers {
            let titles = self
                .titles
                .find_approved_expiring_on(today + Duration::days(days_left))
                .await
                .map_err(|e| format!("Failed to load titles expiring in {} days: {}", days_left, e))?;
            warned_titles += titles.len();
            for title in &titles {
                batch.extend(warnings_for(title, days_left, &staff, self.email_threshold));
            }
        }

        let expected = batch.len();
        let created = self.dispatcher.create_many(batch).await;
        info!(titles = warned_titles, created, expected, "Expiration warnings sent");
        Ok(())
    }
}
