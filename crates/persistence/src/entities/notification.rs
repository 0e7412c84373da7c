//! Notification, preference and email template entities.

use chrono::{DateTime, Utc};
use domain::models::{EmailTemplate, Notification, NotificationPreference};
use sqlx::FromRow;
use uuid::Uuid;

use super::decode_text;

/// Database row mapping for the notifications table.
#[derive(Debug, Clone, FromRow)]
pub struct NotificationEntity {
    pub id: Uuid,
    pub recipient_id: Uuid,
    pub title: String,
    pub message: String,
    pub notification_type: String,
    pub priority: String,
    pub title_ref: Option<Uuid>,
    pub request_ref: Option<Uuid>,
    pub is_read: bool,
    pub email_sent: bool,
    pub created_at: DateTime<Utc>,
    pub read_at: Option<DateTime<Utc>>,
}

impl TryFrom<NotificationEntity> for Notification {
    type Error = sqlx::Error;

    fn try_from(entity: NotificationEntity) -> Result<Self, Self::Error> {
        Ok(Self {
            id: entity.id,
            recipient_id: entity.recipient_id,
            title: entity.title,
            message: entity.message,
            notification_type: decode_text("notification_type", &entity.notification_type)?,
            priority: decode_text("priority", &entity.priority)?,
            title_ref: entity.title_ref,
            request_ref: entity.request_ref,
            is_read: entity.is_read,
            email_sent: entity.email_sent,
            created_at: entity.created_at,
            read_at: entity.read_at,
        })
    }
}

/// Database row mapping for the notification_preferences table.
#[derive(Debug, Clone, FromRow)]
pub struct NotificationPreferenceEntity {
    pub user_id: Uuid,
    pub email_expiration: bool,
    pub email_status_change: bool,
    pub email_assignment: bool,
    pub email_reminders: bool,
    pub app_notifications: bool,
    pub reminder_frequency_days: i32,
}

impl From<NotificationPreferenceEntity> for NotificationPreference {
    fn from(entity: NotificationPreferenceEntity) -> Self {
        Self {
            user_id: entity.user_id,
            email_expiration: entity.email_expiration,
            email_status_change: entity.email_status_change,
            email_assignment: entity.email_assignment,
            email_reminders: entity.email_reminders,
            app_notifications: entity.app_notifications,
            reminder_frequency_days: entity.reminder_frequency_days,
        }
    }
}

/// Database row mapping for the email_templates table.
#[derive(Debug, Clone, FromRow)]
pub struct EmailTemplateEntity {
    pub name: String,
    pub subject: String,
    pub html_body: String,
    pub text_body: String,
    pub is_active: bool,
    pub updated_at: DateTime<Utc>,
}

impl From<EmailTemplateEntity> for EmailTemplate {
    fn from(entity: EmailTemplateEntity) -> Self {
        Self {
            name: entity.name,
            subject: entity.subject,
            html_body: entity.html_body,
            text_body: entity.text_body,
            is_active: entity.is_active,
            updated_at: entity.updated_at,
        }
    }
}
