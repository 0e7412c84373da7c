//! Database entity definitions.
//!
//! Entities are direct mappings to database rows. Status and type columns
//! are stored as text and decoded into domain enums on conversion.

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

pub use audit_log::AuditLogEntity;
pub use external_service::{ExternalServiceEntity, HealthCheckEntity};
pub use fee_record::{FeeRecordEntity, FeeStatsEntity};
pub use history::HistoryEntryEntity;
pub use license_request::LicenseRequestEntity;
pub use maintenance::{MaintenanceEntity, SystemSettingEntity};
pub use notification::{EmailTemplateEntity, NotificationEntity, NotificationPreferenceEntity};
pub use title::TitleEntity;
pub use user::UserEntity;
pub use webhook::WebhookEntity;
pub use webhook_delivery::WebhookDeliveryEntity;

use std::str::FromStr;

/// Parses a text column into a domain enum, reporting the column on failure.
pub(crate) fn decode_text<T>(column: &str, value: &str) -> Result<T, sqlx::Error>
where
    T: FromStr<Err = String>,
{
    value.parse().map_err(|e: String| sqlx::Error::ColumnDecode {
        index: column.to_string(),
        source: e.into(),
    })
}

/// Decodes a JSONB column into a typed value, reporting the column on failure.
pub(crate) fn decode_json<T>(column: &str, value: serde_json::Value) -> Result<T, sqlx::Error>
where
    T: serde::de::DeserializeOwned,
{
    serde_json::from_value(value).map_err(|e| sqlx::Error::ColumnDecode {
        index: column.to_string(),
        source: Box::new(e),
    })
}
