//! Service layer: lifecycle, fees, notifications, email, webhooks, health probe
//! and maintenance.

pub mod audit;
pub mod email;
pub mod fees;
pub mod health_probe;
pub mod lifecycle;
pub mod listeners;
pub mod maintenance;
pub mod notifications;
pub mod webhook_delivery;

pub use audit::PgAuditLogger;
pub use email::EmailService;
pub use fees::FeeService;
pub use health_probe::{HealthProbeService, ProbeError};
pub use lifecycle::{LifecycleError, LifecycleService};
pub use listeners::{NotificationListener, WebhookListener};
pub use maintenance::{MaintenanceError, MaintenanceService, SettingsService};
pub use notifications::{NotificationDispatcher, NotificationError};
pub use webhook_delivery::{WebhookDeliveryError, WebhookDeliveryService};
