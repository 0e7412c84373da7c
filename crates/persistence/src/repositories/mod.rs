//! Repository implementations for database operations.

pub mod audit_log;
pub mod external_service;
pub mod fee_record;
pub mod history;
pub mod license_request;
pub mod maintenance;
pub mod notification;
pub mod title;
pub mod user;
pub mod webhook;
pub mod webhook_delivery;

pub use audit_log::{AuditLogFilter, AuditLogRepository};
pub use external_service::{ExternalServiceRepository, NewHealthCheck};
pub use fee_record::FeeRecordRepository;
pub use history::HistoryRepository;
pub use license_request::LicenseRequestRepository;
pub use maintenance::{MaintenanceRepository, SystemSettingRepository};
pub use notification::{
    EmailTemplateRepository, NotificationPreferenceRepository, NotificationRepository,
};
pub use title::TitleRepository;
pub use user::UserRepository;
pub use webhook::WebhookRepository;
pub use webhook_delivery::{DeliveryCounts, WebhookDeliveryRepository};
