//! Webhook subscriber domain model.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;
use std::collections::HashMap;
use std::str::FromStr;
use uuid::Uuid;
use validator::Validate;

/// Events a webhook can subscribe to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum WebhookEvent {
    #[serde(rename = "title.created")]
    TitleCreated,
    #[serde(rename = "title.updated")]
    TitleUpdated,
    #[serde(rename = "title.expired")]
    TitleExpired,
    #[serde(rename = "request.created")]
    RequestCreated,
    #[serde(rename = "request.updated")]
    RequestUpdated,
    #[serde(rename = "request.approved")]
    RequestApproved,
    #[serde(rename = "request.rejected")]
    RequestRejected,
    #[serde(rename = "user.created")]
    UserCreated,
    #[serde(rename = "system.maintenance")]
    SystemMaintenance,
    #[serde(rename = "webhook.test")]
    WebhookTest,
}

impl WebhookEvent {
    /// Events a subscriber may list. The test event is delivered ad hoc only.
    pub const SUBSCRIBABLE: [WebhookEvent; 9] = [
        WebhookEvent::TitleCreated,
        WebhookEvent::TitleUpdated,
        WebhookEvent::TitleExpired,
        WebhookEvent::RequestCreated,
        WebhookEvent::RequestUpdated,
        WebhookEvent::RequestApproved,
        WebhookEvent::RequestRejected,
        WebhookEvent::UserCreated,
        WebhookEvent::SystemMaintenance,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            WebhookEvent::TitleCreated => "title.created",
            WebhookEvent::TitleUpdated => "title.updated",
            WebhookEvent::TitleExpired => "title.expired",
            WebhookEvent::RequestCreated => "request.created",
            WebhookEvent::RequestUpdated => "request.updated",
            WebhookEvent::RequestApproved => "request.approved",
            WebhookEvent::RequestRejected => "request.rejected",
            WebhookEvent::UserCreated => "user.created",
            WebhookEvent::SystemMaintenance => "system.maintenance",
            WebhookEvent::WebhookTest => "webhook.test",
        }
    }
}

impl std::fmt::Display for WebhookEvent {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for WebhookEvent {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if s == WebhookEvent::WebhookTest.as_str() {
            return Ok(WebhookEvent::WebhookTest);
        }
        WebhookEvent::SUBSCRIBABLE
            .into_iter()
            .find(|e| e.as_str() == s)
            .ok_or_else(|| format!("Unknown webhook event: {}", s))
    }
}

/// Administrative status of a webhook.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WebhookStatus {
    Active,
    Inactive,
    Failed,
}

impl WebhookStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            WebhookStatus::Active => "active",
            WebhookStatus::Inactive => "inactive",
            WebhookStatus::Failed => "failed",
        }
    }
}

impl FromStr for WebhookStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "active" => Ok(WebhookStatus::Active),
            "inactive" => Ok(WebhookStatus::Inactive),
            "failed" => Ok(WebhookStatus::Failed),
            _ => Err(format!("Unknown webhook status: {}", s)),
        }
    }
}

/// An external HTTP subscriber.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Webhook {
    pub id: Uuid,
    pub name: String,
    pub url: String,
    pub description: Option<String>,
    pub events: Vec<String>,
    pub secret: Option<String>,
    pub headers: HashMap<String, String>,
    pub status: WebhookStatus,
    pub is_active: bool,
    pub success_count: i64,
    pub failure_count: i64,
    pub last_success: Option<DateTime<Utc>>,
    pub last_failure: Option<DateTime<Utc>>,
    pub last_error: Option<String>,
    pub created_by: Option<Uuid>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Webhook {
    pub fn subscribes_to(&self, event: &str) -> bool {
        self.events.iter().any(|e| e == event)
    }

    /// Whether deliveries may be attempted for this webhook.
    pub fn is_deliverable(&self) -> bool {
        self.is_active && self.status == WebhookStatus::Active
    }

    /// Share of successful attempts, in percent.
    pub fn success_rate(&self) -> f64 {
        let total = self.success_count + self.failure_count;
        if total == 0 {
            0.0
        } else {
            self.success_count as f64 * 100.0 / total as f64
        }
    }

    /// Applies a partial update.
    pub fn apply_update(&mut self, patch: &UpdateWebhookRequest) {
        if let Some(name) = &patch.name {
            self.name = name.clone();
        }
        if let Some(url) = &patch.url {
            self.url = url.clone();
        }
        if let Some(description) = &patch.description {
            self.description = Some(description.clone());
        }
        if let Some(events) = &patch.events {
            self.events = events.clone();
        }
        if let Some(secret) = &patch.secret {
            self.secret = Some(secret.clone());
        }
        if let Some(headers) = &patch.headers {
            self.headers = headers.clone();
        }
        if let Some(status) = patch.status {
            self.status = status;
        }
        if let Some(is_active) = patch.is_active {
            self.is_active = is_active;
        }
    }
}

/// Wire body of an outbound delivery.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WebhookEnvelope {
    pub event: String,
    pub timestamp: DateTime<Utc>,
    pub data: JsonValue,
}

impl WebhookEnvelope {
    pub fn new(event: &str, data: JsonValue, timestamp: DateTime<Utc>) -> Self {
        Self {
            event: event.to_string(),
            timestamp,
            data,
        }
    }
}

/// Validates that every listed event is a subscribable event name.
pub fn validate_event_names(events: &[String]) -> Result<(), validator::ValidationError> {
    let unknown: Vec<&str> = events
        .iter()
        .map(String::as_str)
        .filter(|e| {
            !WebhookEvent::SUBSCRIBABLE
                .iter()
                .any(|known| known.as_str() == *e)
        })
        .collect();

    if unknown.is_empty() {
        Ok(())
    } else {
        let mut err = validator::ValidationError::new("unknown_event");
        err.message = Some(format!("Unknown events: {}", unknown.join(", ")).into());
        Err(err)
    }
}

fn validate_events(events: &Vec<String>) -> Result<(), validator::ValidationError> {
    validate_event_names(events)
}

fn default_true() -> bool {
    true
}

/// Request payload for creating a webhook.
#[derive(Debug, Clone, Deserialize, Validate)]
pub struct CreateWebhookRequest {
    #[validate(length(min = 1, max = 100, message = "Name must be 1-100 characters"))]
    pub name: String,

    #[validate(
        length(max = 2048, message = "URL must be at most 2048 characters"),
        custom(function = "shared::validation::validate_http_url")
    )]
    pub url: String,

    #[validate(length(max = 1000, message = "Description must be at most 1000 characters"))]
    pub description: Option<String>,

    #[validate(
        length(min = 1, message = "At least one event is required"),
        custom(function = "validate_events")
    )]
    pub events: Vec<String>,

    /// Generated when absent or blank.
    #[validate(length(max = 256, message = "Secret must be at most 256 characters"))]
    pub secret: Option<String>,

    #[serde(default)]
    pub headers: HashMap<String, String>,

    #[serde(default = "default_true")]
    pub is_active: bool,
}

/// Request payload for updating a webhook (partial update).
#[derive(Debug, Clone, Default, Deserialize, Validate)]
pub struct UpdateWebhookRequest {
    #[validate(length(min = 1, max = 100, message = "Name must be 1-100 characters"))]
    pub name: Option<String>,

    #[validate(
        length(max = 2048, message = "URL must be at most 2048 characters"),
        custom(function = "shared::validation::validate_http_url")
    )]
    pub url: Option<String>,

    #[validate(length(max = 1000, message = "Description must be at most 1000 characters"))]
    pub description: Option<String>,

    #[validate(
        length(min = 1, message = "At least one event is required"),
        custom(function = "validate_events")
    )]
    pub events: Option<Vec<String>>,

    #[validate(length(min = 8, max = 256, message = "Secret must be 8-256 characters"))]
    pub secret: Option<String>,

    pub headers: Option<HashMap<String, String>>,

    pub status: Option<WebhookStatus>,

    pub is_active: Option<bool>,
}

/// Response payload for webhook operations.
///
/// The secret is returned so the subscriber can verify signatures.
#[derive(Debug, Clone, Serialize)]
pub struct WebhookResponse {
    #[serde(flatten)]
    pub webhook: Webhook,
    pub success_rate: f64,
}

impl From<Webhook> for WebhookResponse {
    fn from(webhook: Webhook) -> Self {
        Self {
            success_rate: webhook.success_rate(),
            webhook,
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct ListWebhooksQuery {
    pub limit: Option<i64>,
    pub offset: Option<i64>,
}

#[derive(Debug, Clone, Serialize)]
pub struct ListWebhooksResponse {
    pub webhooks: Vec<WebhookResponse>,
    pub total: i64,
}

/// Delivery statistics for one webhook.
#[derive(Debug, Clone, Default, Serialize)]
pub struct WebhookStats {
    pub webhook_id: Uuid,
    pub success_count: i64,
    pub failure_count: i64,
    pub success_rate: f64,
    pub deliveries_total: i64,
    pub deliveries_pending: i64,
    pub deliveries_success: i64,
    pub deliveries_failed: i64,
    pub last_success: Option<DateTime<Utc>>,
    pub last_failure: Option<DateTime<Utc>>,
    pub last_error: Option<String>,
}
