//! HTTP route handlers.

pub mod audit_logs;
pub mod email_templates;
pub mod external_services;
pub mod fees;
pub mod health;
pub mod maintenance;
pub mod notifications;
pub mod requests;
pub mod settings;
pub mod titles;
pub mod users;
pub mod webhook_deliveries;
pub mod webhooks;
