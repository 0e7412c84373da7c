//! Audit logging for back-office actions.
//!
//! Route handlers and services describe an action with [`AuditLogBuilder`]
//! and hand it to an injected [`AuditLogger`]. Audit writes are best effort:
//! a failed write is logged and never fails the action being audited.

use crate::models::{AuditAction, AuditLevel, CreateAuditLogInput};
use serde_json::Value as JsonValue;
use thiserror::Error;
use tracing::warn;
use uuid::Uuid;

#[derive(Debug, Error)]
pub enum AuditError {
    #[error("Audit storage error: {0}")]
    Storage(String),
}

/// Sink for audit entries.
#[async_trait::async_trait]
pub trait AuditLogger: Send + Sync {
    async fn record(&self, entry: CreateAuditLogInput) -> Result<(), AuditError>;

    /// Records the entry and downgrades a failure to a warning.
    async fn record_or_warn(&self, entry: CreateAuditLogInput) {
        let action = entry.action;
        if let Err(e) = self.record(entry).await {
            warn!(action = %action, error = %e, "Failed to write audit log entry");
        }
    }
}

/// Builder for creating audit log entries with a fluent API.
#[derive(Debug, Clone)]
pub struct AuditLogBuilder {
    actor_id: Option<Uuid>,
    action: AuditAction,
    level: AuditLevel,
    resource_type: String,
    resource_id: Option<String>,
    description: String,
    ip_address: Option<String>,
    user_agent: Option<String>,
    extra_data: Option<JsonValue>,
}

impl AuditLogBuilder {
    /// An action performed by a user, or by the system when `actor_id` is `None`.
    pub fn action(actor_id: Option<Uuid>, action: AuditAction) -> Self {
        Self {
            actor_id,
            action,
            level: AuditLevel::Info,
            resource_type: String::new(),
            resource_id: None,
            description: String::new(),
            ip_address: None,
            user_agent: None,
            extra_data: None,
        }
    }

    pub fn system_action(action: AuditAction) -> Self {
        Self::action(None, action)
    }

    /// Set the resource being acted upon.
    pub fn on_resource(
        mut self,
        resource_type: impl Into<String>,
        resource_id: impl ToString,
    ) -> Self {
        self.resource_type = resource_type.into();
        self.resource_id = Some(resource_id.to_string());
        self
    }

    /// Set just the resource type (when no ID is available).
    pub fn on_resource_type(mut self, resource_type: impl Into<String>) -> Self {
        self.resource_type = resource_type.into();
        self
    }

    pub fn describe(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    pub fn level(mut self, level: AuditLevel) -> Self {
        self.level = level;
        self
    }

    pub fn with_extra(mut self, extra: JsonValue) -> Self {
        self.extra_data = Some(extra);
        self
    }

    pub fn with_ip(mut self, ip: Option<String>) -> Self {
        self.ip_address = ip;
        self
    }

    pub fn with_user_agent(mut self, ua: Option<String>) -> Self {
        self.user_agent = ua;
        self
    }

    pub fn build(self) -> CreateAuditLogInput {
        let description = if self.description.is_empty() {
            self.action.to_string()
        } else {
            self.description
        };
        CreateAuditLogInput {
            actor_id: self.actor_id,
            action: self.action,
            level: self.level,
            resource_type: self.resource_type,
            resource_id: self.resource_id,
            description,
            ip_address: self.ip_address,
            user_agent: self.user_agent,
            extra_data: self.extra_data,
        }
    }
}

#[cfg(test)]
pub(crate) mod mock {
    use super::*;
    use std::sync::Mutex;

    /// Keeps entries in memory; optionally fails every write.
    #[derive(Default)]
    pub struct MemoryAuditLogger {
        pub entries: Mutex<Vec<CreateAuditLogInput>>,
        pub fail: bool,
    }

    #[async_trait::async_trait]
    impl AuditLogger for MemoryAuditLogger {
        async fn record(&self, entry: CreateAuditLogInput) -> Result<(), AuditError> {
            if self.fail {
                return Err(AuditError::Storage("connection reset".into()));
            }
            self.entries.lock().unwrap().push(entry);
            Ok(())
        }
    }
}
