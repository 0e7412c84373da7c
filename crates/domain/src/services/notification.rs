//! Notification composition and the email capability.
//!
//! The dispatcher in the API crate persists notifications and consults
//! preferences; this module decides what each trigger says, to whom, and
//! whether it asks for an email.

use thiserror::Error;
use uuid::Uuid;

use crate::models::{
    LicenseRequest, NewNotification, NotificationPriority, NotificationType, RequestStatus,
    SystemMaintenance, Title, TitleStatus,
};

/// Days before expiry at which warnings go out.
pub const EXPIRATION_WARNING_DAYS: [i64; 4] = [30, 15, 7, 1];

/// Warnings at or below this many days are urgent enough to email staff.
pub const EMAIL_WARNING_THRESHOLD_DAYS: i64 = 7;

/// An email ready for delivery.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutgoingEmail {
    pub to: String,
    pub to_name: Option<String>,
    pub subject: String,
    pub body_text: String,
    pub body_html: Option<String>,
}

#[derive(Debug, Error)]
pub enum EmailSendError {
    #[error("Email provider rejected the message: {0}")]
    Rejected(String),

    #[error("Email provider unavailable: {0}")]
    Unavailable(String),

    #[error("Email configuration error: {0}")]
    Configuration(String),
}

/// Capability to send email, injected into the notification dispatcher.
#[async_trait::async_trait]
pub trait EmailSender: Send + Sync {
    /// False when sending is switched off; callers then skip email entirely.
    fn is_enabled(&self) -> bool {
        true
    }

    async fn send_email(&self, email: OutgoingEmail) -> Result<(), EmailSendError>;
}

/// Title issued or created on behalf of its owner.
pub fn title_created(title: &Title) -> NewNotification {
    NewNotification::new(
        title.owner_id,
        NotificationType::Success,
        format!("Title {} created", title.number),
        format!(
            "Your {} {} has been registered with status {}. It expires on {}.",
            title.title_type.label(),
            title.number,
            title.status,
            title.expiration_date
        ),
    )
    .about_title(title.id)
    .with_email(true)
}

/// Title changed; a status change is reported as such.
pub fn title_updated(title: &Title, previous_status: Option<TitleStatus>) -> NewNotification {
    let (notification_type, priority, message) = match previous_status {
        Some(previous) if previous != title.status => (
            NotificationType::StatusChange,
            if matches!(title.status, TitleStatus::Suspended | TitleStatus::Rejected) {
                NotificationPriority::High
            } else {
                NotificationPriority::Medium
            },
            format!(
                "The status of title {} changed from {} to {}.",
                title.number, previous, title.status
            ),
        ),
        _ => (
            NotificationType::Info,
            NotificationPriority::Low,
            format!("Title {} has been updated.", title.number),
        ),
    };

    NewNotification::new(
        title.owner_id,
        notification_type,
        format!("Title {} updated", title.number),
        message,
    )
    .priority(priority)
    .about_title(title.id)
    .with_email(notification_type == NotificationType::StatusChange)
}

/// Title expired automatically.
pub fn title_expired(title: &Title) -> NewNotification {
    NewNotification::new(
        title.owner_id,
        NotificationType::Expiration,
        format!("Title {} has expired", title.number),
        format!(
            "Title {} expired on {}. Submit a renewal to keep operating.",
            title.number, title.expiration_date
        ),
    )
    .priority(NotificationPriority::Urgent)
    .about_title(title.id)
    .with_email(true)
}

/// Acknowledgement to the requester.
pub fn request_submitted(request: &LicenseRequest) -> NewNotification {
    NewNotification::new(
        request.requester_id,
        NotificationType::Info,
        format!("Request {} received", request.file_number),
        format!(
            "Your request for a {} on behalf of {} has been received and will be reviewed.",
            request.title_type.label(),
            request.company
        ),
    )
    .about_request(request.id)
    .with_email(true)
}

/// New request announcement to one staff member.
pub fn request_submitted_for_staff(request: &LicenseRequest, staff_id: Uuid) -> NewNotification {
    NewNotification::new(
        staff_id,
        NotificationType::Info,
        format!("New request {}", request.file_number),
        format!(
            "{} submitted a request for a {}.",
            request.company,
            request.title_type.label()
        ),
    )
    .about_request(request.id)
    .with_email(true)
}

/// Status change reported to the requester.
pub fn request_status_changed(
    request: &LicenseRequest,
    previous_status: RequestStatus,
) -> NewNotification {
    let priority = if request.status.is_terminal() {
        NotificationPriority::High
    } else {
        NotificationPriority::Medium
    };
    let mut message = format!(
        "The status of request {} changed from {} to {}.",
        request.file_number, previous_status, request.status
    );
    if let Some(comments) = request.admin_comments.as_deref().filter(|c| !c.is_empty()) {
        message.push_str(&format!(" Comments: {}", comments));
    }

    NewNotification::new(
        request.requester_id,
        NotificationType::StatusChange,
        format!("Request {} is {}", request.file_number, request.status),
        message,
    )
    .priority(priority)
    .about_request(request.id)
    .with_email(true)
}

/// Details of an open request changed; reported to the requester.
pub fn request_updated(request: &LicenseRequest) -> NewNotification {
    NewNotification::new(
        request.requester_id,
        NotificationType::Info,
        format!("Request {} updated", request.file_number),
        format!("Request {} has been updated.", request.file_number),
    )
    .priority(NotificationPriority::Low)
    .about_request(request.id)
}

/// Assignment announcement to the new assignee.
pub fn request_assigned(request: &LicenseRequest, assignee_id: Uuid) -> NewNotification {
    NewNotification::new(
        assignee_id,
        NotificationType::Assignment,
        format!("Request {} assigned to you", request.file_number),
        format!(
            "You have been assigned request {} from {}.",
            request.file_number, request.company
        ),
    )
    .about_request(request.id)
    .with_email(true)
}

/// Whether `days_left` is one of the warning tiers.
pub fn is_warning_day(days_left: i64, tiers: &[i64]) -> bool {
    tiers.contains(&days_left)
}

/// Expiry warning for the title owner: always emailed, high priority close to expiry.
pub fn expiration_warning_for_owner(title: &Title, days_left: i64, email_threshold: i64) -> NewNotification {
    let priority = if days_left <= email_threshold {
        NotificationPriority::High
    } else {
        NotificationPriority::Medium
    };
    expiration_warning(title, title.owner_id, days_left)
        .priority(priority)
        .with_email(true)
}

/// Expiry warning for a staff member: emailed only close to expiry.
pub fn expiration_warning_for_staff(
    title: &Title,
    staff_id: Uuid,
    days_left: i64,
    email_threshold: i64,
) -> NewNotification {
    expiration_warning(title, staff_id, days_left)
        .priority(NotificationPriority::Medium)
        .with_email(days_left <= email_threshold)
}

fn expiration_warning(title: &Title, recipient: Uuid, days_left: i64) -> NewNotification {
    let unit = if days_left == 1 { "day" } else { "days" };
    NewNotification::new(
        recipient,
        NotificationType::Expiration,
        format!("Title {} expires in {} {}", title.number, days_left, unit),
        format!(
            "Title {} ({}) expires on {}. Plan its renewal.",
            title.number,
            title.title_type.label(),
            title.expiration_date
        ),
    )
    .about_title(title.id)
}

/// Daily reminder to a staff member about a request open too long.
pub fn overdue_request_reminder(request: &LicenseRequest, staff_id: Uuid, days_open: i64) -> NewNotification {
    NewNotification::new(
        staff_id,
        NotificationType::Reminder,
        format!("Request {} is overdue", request.file_number),
        format!(
            "Request {} from {} has been open for {} days (status {}).",
            request.file_number, request.company, days_open, request.status
        ),
    )
    .priority(NotificationPriority::High)
    .about_request(request.id)
    .with_email(true)
}

/// Figures summarised in the daily admin digest.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DigestFigures {
    pub open_requests: i64,
    pub overdue_requests: i64,
    pub titles_expiring_soon: i64,
    pub overdue_fees: i64,
    pub failed_deliveries: i64,
}

pub fn admin_digest(admin_id: Uuid, figures: &DigestFigures) -> NewNotification {
    NewNotification::new(
        admin_id,
        NotificationType::Info,
        "Daily summary",
        format!(
            "Open requests: {}. Overdue requests: {}. Titles expiring within 30 days: {}. \
             Overdue fees: {}. Failed webhook deliveries: {}.",
            figures.open_requests,
            figures.overdue_requests,
            figures.titles_expiring_soon,
            figures.overdue_fees,
            figures.failed_deliveries
        ),
    )
    .priority(NotificationPriority::Low)
}

/// Maintenance window starting, sent to every active user.
pub fn maintenance_started(maintenance: &SystemMaintenance, recipient_id: Uuid) -> NewNotification {
    NewNotification::new(
        recipient_id,
        NotificationType::Warning,
        format!("Scheduled maintenance: {}", maintenance.title),
        maintenance.notice(),
    )
    .priority(maintenance.priority.notification_priority())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::TitleType;
    use chrono::{NaiveDate, Utc};

    fn title() -> Title {
        Title {
            id: Uuid::new_v4(),
            number: "CON-2026-0002".into(),
            title_type: TitleType::Concessions,
            owner_id: Uuid::new_v4(),
            description: None,
            issue_date: NaiveDate::from_ymd_opt(2026, 1, 1).unwrap(),
            expiration_date: NaiveDate::from_ymd_opt(2036, 1, 1).unwrap(),
            duration_years: 10,
            status: TitleStatus::Approved,
            annual_fee: 1_000_000,
            conditions: vec![],
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    fn request(status: RequestStatus) -> LicenseRequest {
        LicenseRequest {
            id: Uuid::new_v4(),
            file_number: "DEM-CON-2026-0004".into(),
            requester_id: Uuid::new_v4(),
            company: "Acme".into(),
            contact_email: "ops@acme.example".into(),
            phone: None,
            address: None,
            title_type: TitleType::Concessions,
            description: "Fibre backbone".into(),
            justification: None,
            status,
            admin_comments: Some("File complete".into()),
            assignee_id: None,
            document_urls: vec![],
            submission_date: Utc::now(),
            processing_date: None,
            updated_at: Utc::now(),
        }
    }

    #[test]
    fn test_warning_tiers() {
        for days in EXPIRATION_WARNING_DAYS {
            assert!(is_warning_day(days, &EXPIRATION_WARNING_DAYS));
        }
        assert!(!is_warning_day(8, &EXPIRATION_WARNING_DAYS));
        assert!(!is_warning_day(0, &EXPIRATION_WARNING_DAYS));
    }

    #[test]
    fn test_owner_warning_priority_and_email() {
        let t = title();
        let far = expiration_warning_for_owner(&t, 30, EMAIL_WARNING_THRESHOLD_DAYS);
        assert_eq!(far.priority, NotificationPriority::Medium);
        assert!(far.send_email);
        assert_eq!(far.recipient_id, t.owner_id);

        let near = expiration_warning_for_owner(&t, 7, EMAIL_WARNING_THRESHOLD_DAYS);
        assert_eq!(near.priority, NotificationPriority::High);
        assert_eq!(near.notification_type, NotificationType::Expiration);
        assert_eq!(near.title_ref, Some(t.id));
    }

    #[test]
    fn test_staff_warning_emailed_only_close_to_expiry() {
        let t = title();
        let staff = Uuid::new_v4();
        assert!(!expiration_warning_for_staff(&t, staff, 15, EMAIL_WARNING_THRESHOLD_DAYS).send_email);
        assert!(expiration_warning_for_staff(&t, staff, 7, EMAIL_WARNING_THRESHOLD_DAYS).send_email);
        let one = expiration_warning_for_staff(&t, staff, 1, EMAIL_WARNING_THRESHOLD_DAYS);
        assert!(one.send_email);
        assert_eq!(one.priority, NotificationPriority::Medium);
        assert_eq!(one.title, "Title CON-2026-0002 expires in 1 day");
    }

    #[test]
    fn test_status_change_notification() {
        let r = request(RequestStatus::Approved);
        let n = request_status_changed(&r, RequestStatus::InReview);
        assert_eq!(n.recipient_id, r.requester_id);
        assert_eq!(n.notification_type, NotificationType::StatusChange);
        assert_eq!(n.priority, NotificationPriority::High);
        assert!(n.message.contains("from in_review to approved"));
        assert!(n.message.contains("File complete"));
        assert_eq!(n.request_ref, Some(r.id));
    }

    #[test]
    fn test_title_update_without_status_change_is_quiet() {
        let t = title();
        let n = title_updated(&t, None);
        assert_eq!(n.notification_type, NotificationType::Info);
        assert!(!n.send_email);

        let n = title_updated(&t, Some(TitleStatus::Suspended));
        assert_eq!(n.notification_type, NotificationType::StatusChange);
        assert!(n.send_email);
    }

    #[test]
    fn test_overdue_reminder() {
        let r = request(RequestStatus::InReview);
        let staff = Uuid::new_v4();
        let n = overdue_request_reminder(&r, staff, 41);
        assert_eq!(n.recipient_id, staff);
        assert_eq!(n.notification_type, NotificationType::Reminder);
        assert_eq!(n.priority, NotificationPriority::High);
        assert!(n.send_email);
        assert!(n.message.contains("41 days"));
    }

    #[test]
    fn test_admin_digest_has_no_email() {
        let n = admin_digest(Uuid::new_v4(), &DigestFigures {
            open_requests: 4,
            ..Default::default()
        });
        assert!(!n.send_email);
        assert!(n.message.starts_with("Open requests: 4."));
    }

    #[test]
    fn test_maintenance_notice_follows_window_priority() {
        use crate::models::maintenance::{MaintenancePriority, MaintenanceStatus};

        let start = Utc::now();
        let maintenance = SystemMaintenance {
            id: Uuid::new_v4(),
            title: "Network cutover".into(),
            description: "Switching uplinks".into(),
            status: MaintenanceStatus::InProgress,
            priority: MaintenancePriority::High,
            scheduled_start: start,
            scheduled_end: start + chrono::Duration::hours(1),
            actual_start: Some(start),
            actual_end: None,
            impact_description: Some("Portal unavailable".into()),
            notification_sent: false,
            created_by: None,
            created_at: start,
            updated_at: start,
        };
        let user = Uuid::new_v4();
        let n = maintenance_started(&maintenance, user);
        assert_eq!(n.recipient_id, user);
        assert_eq!(n.notification_type, NotificationType::Warning);
        assert_eq!(n.priority, NotificationPriority::High);
        assert_eq!(n.title, "Scheduled maintenance: Network cutover");
        assert!(n.message.contains("Portal unavailable"));
        assert!(!n.send_email);
    }
}
