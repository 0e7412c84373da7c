//! Runtime settings edited from the back office.
//!
//! Values are free-form JSON grouped by category. File and environment
//! configuration stays authoritative for anything the service needs to boot.

use chrono::{DateTime, Utc};
use lazy_static::lazy_static;
use regex::Regex;
use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;
use uuid::Uuid;
use validator::Validate;

pub const DEFAULT_CATEGORY: &str = "general";

lazy_static! {
    static ref KEY_REGEX: Regex = Regex::new(r"^[a-z0-9][a-z0-9_.-]{0,99}$").unwrap();
}

/// Lowercase letters, digits, `_`, `.` and `-`; at most 100 characters.
pub fn is_valid_key(key: &str) -> bool {
    KEY_REGEX.is_match(key)
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SystemSetting {
    pub key: String,
    pub value: JsonValue,
    pub description: String,
    pub category: String,
    pub is_active: bool,
    pub updated_by: Option<Uuid>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Request payload for creating or replacing a setting.
#[derive(Debug, Clone, Deserialize, Validate)]
pub struct PutSettingRequest {
    pub value: JsonValue,

    #[validate(length(max = 2000, message = "Description must be at most 2000 characters"))]
    pub description: Option<String>,

    #[validate(length(min = 1, max = 50, message = "Category must be 1-50 characters"))]
    pub category: Option<String>,

    pub is_active: Option<bool>,
}

impl PutSettingRequest {
    pub fn category(&self) -> &str {
        self.category.as_deref().unwrap_or(DEFAULT_CATEGORY)
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct ListSettingsQuery {
    pub category: Option<String>,
    #[serde(default)]
    pub include_inactive: bool,
}

#[derive(Debug, Clone, Serialize)]
pub struct ListSettingsResponse {
    pub settings: Vec<SystemSetting>,
}
