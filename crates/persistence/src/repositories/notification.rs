//! Notification, preference and email template repositories.

use chrono::{DateTime, Utc};
use domain::models::notification::UpsertEmailTemplateRequest;
use domain::models::{EmailTemplate, NewNotification, Notification, NotificationPreference};
use sqlx::PgPool;
use uuid::Uuid;

use crate::entities::{EmailTemplateEntity, NotificationEntity, NotificationPreferenceEntity};
use crate::metrics::QueryTimer;

/// Repository for in-app notifications.
#[derive(Clone)]
pub struct NotificationRepository {
    pool: PgPool,
}

impl NotificationRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub async fn create(&self, new: &NewNotification) -> Result<Notification, sqlx::Error> {
        let timer = QueryTimer::new("create_notification");
        let entity = sqlx::query_as::<_, NotificationEntity>(
            r#"
            INSERT INTO notifications (id, recipient_id, title, message, notification_type,
                                       priority, title_ref, request_ref)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
            RETURNING id, recipient_id, title, message, notification_type, priority, title_ref,
                      request_ref, is_read, email_sent, created_at, read_at
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(new.recipient_id)
        .bind(&new.title)
        .bind(&new.message)
        .bind(new.notification_type.as_str())
        .bind(new.priority.as_str())
        .bind(new.title_ref)
        .bind(new.request_ref)
        .fetch_one(&self.pool)
        .await;
        timer.record();

        entity?.try_into()
    }

    pub async fn mark_email_sent(&self, id: Uuid) -> Result<(), sqlx::Error> {
        sqlx::query(r#"UPDATE notifications SET email_sent = TRUE WHERE id = $1"#)
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    /// Notifications of one recipient, newest first.
    pub async fn list_for_recipient(
        &self,
        recipient_id: Uuid,
        unread_only: bool,
        limit: i64,
        offset: i64,
    ) -> Result<Vec<Notification>, sqlx::Error> {
        let timer = QueryTimer::new("list_notifications_for_recipient");
        let entities = sqlx::query_as::<_, NotificationEntity>(
            r#"
            SELECT id, recipient_id, title, message, notification_type, priority, title_ref,
                   request_ref, is_read, email_sent, created_at, read_at
            FROM notifications
            WHERE recipient_id = $1 AND (NOT $2 OR NOT is_read)
            ORDER BY created_at DESC, id DESC
            LIMIT $3 OFFSET $4
            "#,
        )
        .bind(recipient_id)
        .bind(unread_only)
        .bind(limit)
        .bind(offset)
        .fetch_all(&self.pool)
        .await;
        timer.record();

        entities?.into_iter().map(Notification::try_from).collect()
    }

    pub async fn count_unread(&self, recipient_id: Uuid) -> Result<i64, sqlx::Error> {
        sqlx::query_scalar(
            r#"SELECT COUNT(*) FROM notifications WHERE recipient_id = $1 AND NOT is_read"#,
        )
        .bind(recipient_id)
        .fetch_one(&self.pool)
        .await
    }

    /// Marks one notification of `recipient_id` read. Returns false if it does not exist.
    pub async fn mark_read(&self, id: Uuid, recipient_id: Uuid) -> Result<bool, sqlx::Error> {
        let result = sqlx::query(
            r#"
            UPDATE notifications
            SET is_read = TRUE, read_at = COALESCE(read_at, NOW())
            WHERE id = $1 AND recipient_id = $2
            "#,
        )
        .bind(id)
        .bind(recipient_id)
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected() > 0)
    }

    pub async fn mark_all_read(&self, recipient_id: Uuid) -> Result<u64, sqlx::Error> {
        let result = sqlx::query(
            r#"
            UPDATE notifications
            SET is_read = TRUE, read_at = NOW()
            WHERE recipient_id = $1 AND NOT is_read
            "#,
        )
        .bind(recipient_id)
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected())
    }

    pub async fn delete(&self, id: Uuid, recipient_id: Uuid) -> Result<bool, sqlx::Error> {
        let result = sqlx::query(r#"DELETE FROM notifications WHERE id = $1 AND recipient_id = $2"#)
            .bind(id)
            .bind(recipient_id)
            .execute(&self.pool)
            .await?;

        Ok(result.rows_affected() > 0)
    }

    /// Deletes read notifications created before `cutoff`.
    pub async fn delete_read_before(&self, cutoff: DateTime<Utc>) -> Result<u64, sqlx::Error> {
        let timer = QueryTimer::new("delete_read_notifications");
        let result = sqlx::query(
            r#"DELETE FROM notifications WHERE is_read AND created_at < $1"#,
        )
        .bind(cutoff)
        .execute(&self.pool)
        .await;
        timer.record();

        Ok(result?.rows_affected())
    }
}

/// Repository for per-user notification preferences.
#[derive(Clone)]
pub struct NotificationPreferenceRepository {
    pool: PgPool,
}

impl NotificationPreferenceRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Returns the preferences of `user_id`, creating the defaults on first use.
    pub async fn get_or_create(&self, user_id: Uuid) -> Result<NotificationPreference, sqlx::Error> {
        let defaults = NotificationPreference::defaults_for(user_id);
        let timer = QueryTimer::new("get_or_create_notification_preference");
        sqlx::query(
            r#"
            INSERT INTO notification_preferences
                (user_id, email_expiration, email_status_change, email_assignment,
                 email_reminders, app_notifications, reminder_frequency_days)
            VALUES ($1, $2, $3, $4, $5, $6, $7)
            ON CONFLICT (user_id) DO NOTHING
            "#,
        )
        .bind(user_id)
        .bind(defaults.email_expiration)
        .bind(defaults.email_status_change)
        .bind(defaults.email_assignment)
        .bind(defaults.email_reminders)
        .bind(defaults.app_notifications)
        .bind(defaults.reminder_frequency_days)
        .execute(&self.pool)
        .await?;

        let entity = sqlx::query_as::<_, NotificationPreferenceEntity>(
            r#"
            SELECT user_id, email_expiration, email_status_change, email_assignment,
                   email_reminders, app_notifications, reminder_frequency_days
            FROM notification_preferences
            WHERE user_id = $1
            "#,
        )
        .bind(user_id)
        .fetch_one(&self.pool)
        .await;
        timer.record();

        Ok(entity?.into())
    }

    pub async fn save(
        &self,
        preference: &NotificationPreference,
    ) -> Result<NotificationPreference, sqlx::Error> {
        let entity = sqlx::query_as::<_, NotificationPreferenceEntity>(
            r#"
            UPDATE notification_preferences
            SET email_expiration = $2,
                email_status_change = $3,
                email_assignment = $4,
                email_reminders = $5,
                app_notifications = $6,
                reminder_frequency_days = $7,
                updated_at = NOW()
            WHERE user_id = $1
            RETURNING user_id, email_expiration, email_status_change, email_assignment,
                      email_reminders, app_notifications, reminder_frequency_days
            "#,
        )
        .bind(preference.user_id)
        .bind(preference.email_expiration)
        .bind(preference.email_status_change)
        .bind(preference.email_assignment)
        .bind(preference.email_reminders)
        .bind(preference.app_notifications)
        .bind(preference.reminder_frequency_days)
        .fetch_one(&self.pool)
        .await?;

        Ok(entity.into())
    }
}

/// Repository for email templates.
#[derive(Clone)]
pub struct EmailTemplateRepository {
    pool: PgPool,
}

impl EmailTemplateRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub async fn find_active(&self, name: &str) -> Result<Option<EmailTemplate>, sqlx::Error> {
        let entity = sqlx::query_as::<_, EmailTemplateEntity>(
            r#"
            SELECT name, subject, html_body, text_body, is_active, updated_at
            FROM email_templates
            WHERE name = $1 AND is_active
            "#,
        )
        .bind(name)
        .fetch_optional(&self.pool)
        .await?;

        Ok(entity.map(Into::into))
    }

    pub async fn list(&self) -> Result<Vec<EmailTemplate>, sqlx::Error> {
        let entities = sqlx::query_as::<_, EmailTemplateEntity>(
            r#"
            SELECT name, subject, html_body, text_body, is_active, updated_at
            FROM email_templates
            ORDER BY name
            "#,
        )
        .fetch_all(&self.pool)
        .await?;

        Ok(entities.into_iter().map(Into::into).collect())
    }

    pub async fn upsert(
        &self,
        name: &str,
        input: &UpsertEmailTemplateRequest,
    ) -> Result<EmailTemplate, sqlx::Error> {
        let entity = sqlx::query_as::<_, EmailTemplateEntity>(
            r#"
            INSERT INTO email_templates (name, subject, html_body, text_body, is_active)
            VALUES ($1, $2, $3, $4, $5)
            ON CONFLICT (name) DO UPDATE
            SET subject = EXCLUDED.subject,
                html_body = EXCLUDED.html_body,
                text_body = EXCLUDED.text_body,
                is_active = EXCLUDED.is_active,
                updated_at = NOW()
            RETURNING name, subject, html_body, text_body, is_active, updated_at
            "#,
        )
        .bind(name)
        .bind(&input.subject)
        .bind(&input.html_body)
        .bind(&input.text_body)
        .bind(input.is_active)
        .fetch_one(&self.pool)
        .await?;

        Ok(entity.into())
    }
}
