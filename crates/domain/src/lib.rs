//! Domain layer for the telecommunications licensing back office.
//!
//! This crate contains:
//! - Domain models (Title, LicenseRequest, FeeRecord, Notification, Webhook, ...)
//! - Lifecycle rules: status transitions, expiry, numbering, fee schedule
//! - Capability traits injected into the service layer (listeners, audit, email)

pub mod models;
pub mod services;
