//! Notification dispatcher.
//!
//! `create_notification` always stores the notification. When it asks for an
//! email, the recipient's preferences decide whether one is sent; template
//! lookup, rendering and delivery failures are logged and never fail the call.

use domain::models::notification::{render_default_email, TemplateContext, UpdatePreferencesRequest};
use domain::models::{EmailTemplate, NewNotification, Notification, NotificationPreference, User};
use domain::services::{EmailSender, OutgoingEmail};
use persistence::repositories::{
    EmailTemplateRepository, NotificationPreferenceRepository, NotificationRepository,
    UserRepository,
};
use sqlx::PgPool;
use std::sync::Arc;
use thiserror::Error;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::middleware::metrics::{record_email, record_notification_created};

#[derive(Debug, Error)]
pub enum NotificationError {
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),
}

/// What happened to the email side of a notification.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EmailDisposition {
    NotRequested,
    Disabled,
    OptedOut,
    NoRecipient,
    Sent,
    Failed,
}

/// Creates notifications and sends their emails.
#[derive(Clone)]
pub struct NotificationDispatcher {
    notifications: NotificationRepository,
    preferences: NotificationPreferenceRepository,
    templates: EmailTemplateRepository,
    users: UserRepository,
    email: Arc<dyn EmailSender>,
}

impl NotificationDispatcher {
    pub fn new(pool: PgPool, email: Arc<dyn EmailSender>) -> Self {
        Self {
            notifications: NotificationRepository::new(pool.clone()),
            preferences: NotificationPreferenceRepository::new(pool.clone()),
            templates: EmailTemplateRepository::new(pool.clone()),
            users: UserRepository::new(pool),
            email,
        }
    }

    /// Stores `new` and, if requested and allowed, emails its recipient.
    pub async fn create_notification(
        &self,
        new: NewNotification,
    ) -> Result<Notification, NotificationError> {
        let mut notification = self.notifications.create(&new).await?;
        record_notification_created(notification.notification_type.as_str());

        if new.send_email {
            let disposition = self.email_notification(&notification).await;
            debug!(
                notification_id = %notification.id,
                disposition = ?disposition,
                "Notification email handled"
            );
            if disposition == EmailDisposition::Sent {
                notification.email_sent = true;
            }
        }

        Ok(notification)
    }

    /// Creates each notification independently; returns how many were stored.
    pub async fn create_many(&self, batch: Vec<NewNotification>) -> usize {
        let mut created = 0;
        for new in batch {
            let recipient = new.recipient_id;
            match self.create_notification(new).await {
                Ok(_) => created += 1,
                Err(e) => warn!(
                    recipient_id = %recipient,
                    error = %e,
                    "Failed to create notification"
                ),
            }
        }
        created
    }

    async fn email_notification(&self, notification: &Notification) -> EmailDisposition {
        if !self.email.is_enabled() {
            return EmailDisposition::Disabled;
        }

        let preference = match self.preferences.get_or_create(notification.recipient_id).await {
            Ok(p) => p,
            Err(e) => {
                warn!(
                    recipient_id = %notification.recipient_id,
                    error = %e,
                    "Failed to load notification preferences"
                );
                record_email("failed");
                return EmailDisposition::Failed;
            }
        };
        if !wants_email(&preference, notification) {
            return EmailDisposition::OptedOut;
        }

        let recipient = match self.users.find_by_id(notification.recipient_id).await {
            Ok(Some(user)) if user.is_active => user,
            Ok(_) => return EmailDisposition::NoRecipient,
            Err(e) => {
                warn!(recipient_id = %notification.recipient_id, error = %e, "Failed to load recipient");
                record_email("failed");
                return EmailDisposition::Failed;
            }
        };

        let template_name = notification.notification_type.template_name();
        let template = match self.templates.find_active(&template_name).await {
            Ok(t) => t,
            Err(e) => {
                warn!(template = %template_name, error = %e, "Template lookup failed, using default");
                None
            }
        };

        let email = compose_email(template.as_ref(), &recipient, notification);
        match self.email.send_email(email).await {
            Ok(()) => {
                if let Err(e) = self.notifications.mark_email_sent(notification.id).await {
                    warn!(notification_id = %notification.id, error = %e, "Failed to flag email as sent");
                }
                info!(
                    notification_id = %notification.id,
                    recipient_id = %recipient.id,
                    "Notification email sent"
                );
                record_email("sent");
                EmailDisposition::Sent
            }
            Err(e) => {
                warn!(
                    notification_id = %notification.id,
                    recipient_id = %recipient.id,
                    error = %e,
                    "Notification email failed"
                );
                record_email("failed");
                EmailDisposition::Failed
            }
        }
    }

    /// Preferences of `user_id`, created with defaults on first read.
    pub async fn preferences(&self, user_id: Uuid) -> Result<NotificationPreference, NotificationError> {
        Ok(self.preferences.get_or_create(user_id).await?)
    }

    pub async fn update_preferences(
        &self,
        user_id: Uuid,
        update: &UpdatePreferencesRequest,
    ) -> Result<NotificationPreference, NotificationError> {
        let mut preference = self.preferences.get_or_create(user_id).await?;
        preference.apply(update);
        Ok(self.preferences.save(&preference).await?)
    }
}

fn wants_email(preference: &NotificationPreference, notification: &Notification) -> bool {
    preference.allows_email(notification.notification_type)
}

/// Renders `notification` for `recipient` with `template`, or the built-in
/// email when there is no active template.
pub fn compose_email(
    template: Option<&EmailTemplate>,
    recipient: &User,
    notification: &Notification,
) -> OutgoingEmail {
    let ctx = TemplateContext {
        title: &notification.title,
        message: &notification.message,
        recipient_name: &recipient.full_name,
        priority: notification.priority,
        notification_type: notification.notification_type,
    };
    let rendered = match template.filter(|t| t.is_active) {
        Some(template) => template.render(&ctx),
        None => render_default_email(&ctx),
    };

    OutgoingEmail {
        to: recipient.email.clone(),
        to_name: Some(recipient.full_name.clone()),
        subject: rendered.subject,
        body_text: rendered.text_body,
        body_html: Some(rendered.html_body).filter(|html| !html.is_empty()),
    }
}
