//! In-app notifications, per-user preferences and email templates.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::str::FromStr;
use uuid::Uuid;
use validator::Validate;

/// Prefix of the subject used when no template is configured.
pub const DEFAULT_SUBJECT_PREFIX: &str = "[Telecom Licensing]";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NotificationType {
    Info,
    Warning,
    Error,
    Success,
    Expiration,
    StatusChange,
    Assignment,
    Reminder,
}

impl NotificationType {
    pub fn as_str(&self) -> &'static str {
        match self {
            NotificationType::Info => "info",
            NotificationType::Warning => "warning",
            NotificationType::Error => "error",
            NotificationType::Success => "success",
            NotificationType::Expiration => "expiration",
            NotificationType::StatusChange => "status_change",
            NotificationType::Assignment => "assignment",
            NotificationType::Reminder => "reminder",
        }
    }

    /// Name of the email template looked up for this type.
    pub fn template_name(&self) -> String {
        format!("notification_{}", self.as_str())
    }
}

impl std::fmt::Display for NotificationType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for NotificationType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "info" => Ok(NotificationType::Info),
            "warning" => Ok(NotificationType::Warning),
            "error" => Ok(NotificationType::Error),
            "success" => Ok(NotificationType::Success),
            "expiration" => Ok(NotificationType::Expiration),
            "status_change" => Ok(NotificationType::StatusChange),
            "assignment" => Ok(NotificationType::Assignment),
            "reminder" => Ok(NotificationType::Reminder),
            _ => Err(format!("Unknown notification type: {}", s)),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NotificationPriority {
    Low,
    Medium,
    High,
    Urgent,
}

impl NotificationPriority {
    pub fn as_str(&self) -> &'static str {
        match self {
            NotificationPriority::Low => "low",
            NotificationPriority::Medium => "medium",
            NotificationPriority::High => "high",
            NotificationPriority::Urgent => "urgent",
        }
    }
}

impl std::fmt::Display for NotificationPriority {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for NotificationPriority {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "low" => Ok(NotificationPriority::Low),
            "medium" => Ok(NotificationPriority::Medium),
            "high" => Ok(NotificationPriority::High),
            "urgent" => Ok(NotificationPriority::Urgent),
            _ => Err(format!("Unknown notification priority: {}", s)),
        }
    }
}

/// A notification addressed to one recipient.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Notification {
    pub id: Uuid,
    pub recipient_id: Uuid,
    pub title: String,
    pub message: String,
    pub notification_type: NotificationType,
    pub priority: NotificationPriority,
    pub title_ref: Option<Uuid>,
    pub request_ref: Option<Uuid>,
    pub is_read: bool,
    pub email_sent: bool,
    pub created_at: DateTime<Utc>,
    pub read_at: Option<DateTime<Utc>>,
}

/// Input for creating a notification.
#[derive(Debug, Clone)]
pub struct NewNotification {
    pub recipient_id: Uuid,
    pub title: String,
    pub message: String,
    pub notification_type: NotificationType,
    pub priority: NotificationPriority,
    pub title_ref: Option<Uuid>,
    pub request_ref: Option<Uuid>,
    pub send_email: bool,
}

impl NewNotification {
    pub fn new(
        recipient_id: Uuid,
        notification_type: NotificationType,
        title: impl Into<String>,
        message: impl Into<String>,
    ) -> Self {
        Self {
            recipient_id,
            title: title.into(),
            message: message.into(),
            notification_type,
            priority: NotificationPriority::Medium,
            title_ref: None,
            request_ref: None,
            send_email: false,
        }
    }

    pub fn priority(mut self, priority: NotificationPriority) -> Self {
        self.priority = priority;
        self
    }

    pub fn about_title(mut self, title_id: Uuid) -> Self {
        self.title_ref = Some(title_id);
        self
    }

    pub fn about_request(mut self, request_id: Uuid) -> Self {
        self.request_ref = Some(request_id);
        self
    }

    pub fn with_email(mut self, send_email: bool) -> Self {
        self.send_email = send_email;
        self
    }
}

fn default_true() -> bool {
    true
}

fn default_reminder_frequency() -> i32 {
    7
}

/// Per-user notification preferences. Auto-created with defaults on first use.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NotificationPreference {
    pub user_id: Uuid,
    pub email_expiration: bool,
    pub email_status_change: bool,
    pub email_assignment: bool,
    pub email_reminders: bool,
    pub app_notifications: bool,
    pub reminder_frequency_days: i32,
}

impl NotificationPreference {
    pub fn defaults_for(user_id: Uuid) -> Self {
        Self {
            user_id,
            email_expiration: true,
            email_status_change: true,
            email_assignment: true,
            email_reminders: true,
            app_notifications: true,
            reminder_frequency_days: default_reminder_frequency(),
        }
    }

    /// Whether an email may be sent for a notification of this type.
    ///
    /// Types without a dedicated flag always allow email.
    pub fn allows_email(&self, notification_type: NotificationType) -> bool {
        match notification_type {
            NotificationType::Expiration => self.email_expiration,
            NotificationType::StatusChange => self.email_status_change,
            NotificationType::Assignment => self.email_assignment,
            NotificationType::Reminder => self.email_reminders,
            _ => true,
        }
    }

    pub fn apply(&mut self, update: &UpdatePreferencesRequest) {
        if let Some(v) = update.email_expiration {
            self.email_expiration = v;
        }
        if let Some(v) = update.email_status_change {
            self.email_status_change = v;
        }
        if let Some(v) = update.email_assignment {
            self.email_assignment = v;
        }
        if let Some(v) = update.email_reminders {
            self.email_reminders = v;
        }
        if let Some(v) = update.app_notifications {
            self.app_notifications = v;
        }
        if let Some(v) = update.reminder_frequency_days {
            self.reminder_frequency_days = v;
        }
    }
}

/// An editable email template, looked up by name.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EmailTemplate {
    pub name: String,
    pub subject: String,
    pub html_body: String,
    pub text_body: String,
    pub is_active: bool,
    pub updated_at: DateTime<Utc>,
}

/// Values substituted into `{{placeholder}}` slots.
#[derive(Debug, Clone)]
pub struct TemplateContext<'a> {
    pub title: &'a str,
    pub message: &'a str,
    pub recipient_name: &'a str,
    pub priority: NotificationPriority,
    pub notification_type: NotificationType,
}

/// A rendered email ready to hand to a sender.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RenderedEmail {
    pub subject: String,
    pub text_body: String,
    pub html_body: String,
}

impl TemplateContext<'_> {
    pub fn render(&self, template: &str) -> String {
        template
            .replace("{{title}}", self.title)
            .replace("{{message}}", self.message)
            .replace("{{recipient_name}}", self.recipient_name)
            .replace("{{priority}}", self.priority.as_str())
            .replace("{{type}}", self.notification_type.as_str())
    }
}

impl EmailTemplate {
    pub fn render(&self, ctx: &TemplateContext<'_>) -> RenderedEmail {
        RenderedEmail {
            subject: ctx.render(&self.subject),
            text_body: ctx.render(&self.text_body),
            html_body: ctx.render(&self.html_body),
        }
    }
}

/// Built-in email used when no active template exists.
pub fn render_default_email(ctx: &TemplateContext<'_>) -> RenderedEmail {
    let subject = format!("{} {}", DEFAULT_SUBJECT_PREFIX, ctx.title);
    let text_body = format!(
        "Hello {},\n\n{}\n\nPriority: {}\n\nThis is an automated message from the telecom licensing office.",
        ctx.recipient_name, ctx.message, ctx.priority
    );
    let html_body = format!(
        "<p>Hello {},</p><p>{}</p><p><small>Priority: {}</small></p>\
         <p><small>This is an automated message from the telecom licensing office.</small></p>",
        ctx.recipient_name, ctx.message, ctx.priority
    );
    RenderedEmail {
        subject,
        text_body,
        html_body,
    }
}

/// Request payload for updating preferences.
#[derive(Debug, Clone, Default, Deserialize, Validate)]
pub struct UpdatePreferencesRequest {
    pub email_expiration: Option<bool>,
    pub email_status_change: Option<bool>,
    pub email_assignment: Option<bool>,
    pub email_reminders: Option<bool>,
    pub app_notifications: Option<bool>,
    #[validate(range(min = 1, max = 90, message = "Reminder frequency must be 1-90 days"))]
    pub reminder_frequency_days: Option<i32>,
}

/// Request payload for an administrator broadcast.
#[derive(Debug, Clone, Deserialize, Validate)]
pub struct BulkNotificationRequest {
    #[validate(length(min = 1, max = 1000, message = "Recipients must contain 1-1000 users"))]
    pub recipient_ids: Vec<Uuid>,

    #[validate(length(min = 1, max = 200, message = "Title must be 1-200 characters"))]
    pub title: String,

    #[validate(length(min = 1, max = 5000, message = "Message must be 1-5000 characters"))]
    pub message: String,

    pub notification_type: Option<NotificationType>,

    pub priority: Option<NotificationPriority>,
}

#[derive(Debug, Clone, Serialize)]
pub struct BulkNotificationResponse {
    pub created: usize,
}

/// Request payload for creating or replacing a template.
#[derive(Debug, Clone, Deserialize, Validate)]
pub struct UpsertEmailTemplateRequest {
    #[validate(length(min = 1, max = 200, message = "Subject must be 1-200 characters"))]
    pub subject: String,

    #[validate(length(min = 1, message = "HTML body cannot be empty"))]
    pub html_body: String,

    #[validate(length(min = 1, message = "Text body cannot be empty"))]
    pub text_body: String,

    #[serde(default = "default_true")]
    pub is_active: bool,
}

/// Query parameters for listing notifications.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ListNotificationsQuery {
    pub unread_only: Option<bool>,
    pub limit: Option<i64>,
    pub offset: Option<i64>,
}

#[derive(Debug, Clone, Serialize)]
pub struct ListNotificationsResponse {
    pub notifications: Vec<Notification>,
    pub unread: i64,
}

#[derive(Debug, Clone, Serialize)]
pub struct UnreadCountResponse {
    pub unread: i64,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ctx() -> TemplateContext<'static> {
        TemplateContext {
            title: "Title LT1-2026-0001 expires in 7 days",
            message: "Please renew.",
            recipient_name: "Awa Diallo",
            priority: NotificationPriority::High,
            notification_type: NotificationType::Expiration,
        }
    }

    #[test]
    fn test_template_name() {
        assert_eq!(
            NotificationType::StatusChange.template_name(),
            "notification_status_change"
        );
    }

    #[test]
    fn test_preference_gating_per_type() {
        let mut prefs = NotificationPreference::defaults_for(Uuid::new_v4());
        prefs.email_expiration = false;

        assert!(!prefs.allows_email(NotificationType::Expiration));
        assert!(prefs.allows_email(NotificationType::StatusChange));
        prefs.email_reminders = false;
        assert!(!prefs.allows_email(NotificationType::Reminder));
        assert!(prefs.allows_email(NotificationType::Info));
        assert!(prefs.allows_email(NotificationType::Warning));
    }

    #[test]
    fn test_defaults_all_enabled() {
        let prefs = NotificationPreference::defaults_for(Uuid::new_v4());
        assert!(prefs.email_expiration && prefs.email_status_change);
        assert!(prefs.email_assignment && prefs.email_reminders);
        assert!(prefs.app_notifications);
        assert_eq!(prefs.reminder_frequency_days, 7);
    }

    #[test]
    fn test_apply_partial_update() {
        let mut prefs = NotificationPreference::defaults_for(Uuid::new_v4());
        prefs.apply(&UpdatePreferencesRequest {
            email_assignment: Some(false),
            reminder_frequency_days: Some(14),
            ..Default::default()
        });
        assert!(!prefs.email_assignment);
        assert!(prefs.email_expiration);
        assert_eq!(prefs.reminder_frequency_days, 14);
    }

    #[test]
    fn test_template_render_substitutes_placeholders() {
        let template = EmailTemplate {
            name: "notification_expiration".into(),
            subject: "{{priority}}: {{title}}".into(),
            html_body: "<p>{{recipient_name}}</p><p>{{message}}</p>".into(),
            text_body: "{{type}} - {{message}}".into(),
            is_active: true,
            updated_at: Utc::now(),
        };
        let rendered = template.render(&ctx());
        assert_eq!(rendered.subject, "high: Title LT1-2026-0001 expires in 7 days");
        assert_eq!(rendered.text_body, "expiration - Please renew.");
        assert_eq!(rendered.html_body, "<p>Awa Diallo</p><p>Please renew.</p>");
    }

    #[test]
    fn test_default_email_subject() {
        let rendered = render_default_email(&ctx());
        assert_eq!(
            rendered.subject,
            "[Telecom Licensing] Title LT1-2026-0001 expires in 7 days"
        );
        assert!(rendered.text_body.contains("Please renew."));
        assert!(rendered.html_body.contains("Awa Diallo"));
    }

    #[test]
    fn test_priority_ordering() {
        assert!(NotificationPriority::Urgent > NotificationPriority::High);
        assert!(NotificationPriority::Low < NotificationPriority::Medium);
    }
}
