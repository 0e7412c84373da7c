//! PostgreSQL audit log sink.

use async_trait::async_trait;
use domain::models::CreateAuditLogInput;
use domain::services::{AuditError, AuditLogger};
use persistence::repositories::AuditLogRepository;
use sqlx::PgPool;
use tracing::debug;

/// Writes audit entries to the `audit_logs` table.
#[derive(Clone)]
pub struct PgAuditLogger {
    repo: AuditLogRepository,
}

impl PgAuditLogger {
    pub fn new(pool: PgPool) -> Self {
        Self {
            repo: AuditLogRepository::new(pool),
        }
    }
}

#[async_trait]
impl AuditLogger for PgAuditLogger {
    async fn record(&self, entry: CreateAuditLogInput) -> Result<(), AuditError> {
        let log = self
            .repo
            .insert(&entry)
            .await
            .map_err(|e| AuditError::Storage(e.to_string()))?;
        debug!(
            audit_id = %log.id,
            action = %log.action,
            resource_type = %log.resource_type,
            "Audit entry recorded"
        );
        Ok(())
    }
}
