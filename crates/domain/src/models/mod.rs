//! Domain models for the licensing back office.

pub mod audit_log;
pub mod external_service;
pub mod fee;
pub mod history;
pub mod license_request;
pub mod maintenance;
pub mod notification;
pub mod system_setting;
pub mod title;
pub mod user;
pub mod webhook;
pub mod webhook_delivery;

pub use audit_log::{AuditAction, AuditLevel, AuditLog, CreateAuditLogInput};
pub use external_service::{ExternalService, HealthCheck, HealthStatus, ServiceStatus};
pub use fee::{FeeRecord, PaymentStatus};
pub use history::{FieldChange, HistoryAction, HistoryEntry, HistorySubject, NewHistoryEntry, TransitionError};
pub use license_request::{LicenseRequest, NewLicenseRequest, RequestStatus};
pub use maintenance::{MaintenancePriority, MaintenanceStatus, SystemMaintenance};
pub use notification::{
    EmailTemplate, NewNotification, Notification, NotificationPreference, NotificationPriority,
    NotificationType,
};
pub use system_setting::SystemSetting;
pub use title::{NewTitle, Title, TitleStatus, TitleType};
pub use user::{User, UserRole};
pub use webhook::{Webhook, WebhookEnvelope, WebhookEvent, WebhookStatus};
pub use webhook_delivery::{AttemptKind, DeliveryOutcome, DeliveryStatus, WebhookDelivery};
