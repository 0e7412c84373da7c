//! History entry entity (database row mapping).

use chrono::{DateTime, Utc};
use domain::models::HistoryEntry;
use sqlx::FromRow;
use uuid::Uuid;

use super::{decode_json, decode_text};

/// Database row mapping for the history_entries table.
#[derive(Debug, Clone, FromRow)]
pub struct HistoryEntryEntity {
    pub id: Uuid,
    pub subject: String,
    pub subject_id: Uuid,
    pub action: String,
    pub actor_id: Option<Uuid>,
    pub old_status: Option<String>,
    pub new_status: Option<String>,
    pub comment: Option<String>,
    pub changes: serde_json::Value,
    pub created_at: DateTime<Utc>,
}

impl TryFrom<HistoryEntryEntity> for HistoryEntry {
    type Error = sqlx::Error;

    fn try_from(entity: HistoryEntryEntity) -> Result<Self, Self::Error> {
        Ok(Self {
            id: entity.id,
            subject: decode_text("subject", &entity.subject)?,
            subject_id: entity.subject_id,
            action: decode_text("action", &entity.action)?,
            actor_id: entity.actor_id,
            old_status: entity.old_status,
            new_status: entity.new_status,
            comment: entity.comment,
            changes: decode_json("changes", entity.changes)?,
            created_at: entity.created_at,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use domain::models::{HistoryAction, HistorySubject};

    #[test]
    fn test_history_entity_conversion() {
        let entity = HistoryEntryEntity {
            id: Uuid::new_v4(),
            subject: "request".into(),
            subject_id: Uuid::new_v4(),
            action: "document_added".into(),
            actor_id: None,
            old_status: None,
            new_status: None,
            comment: Some("Added https://files.example/a.pdf".into()),
            changes: serde_json::json!({
                "document_urls": {"old": [], "new": ["https://files.example/a.pdf"]}
            }),
            created_at: Utc::now(),
        };
        let entry = HistoryEntry::try_from(entity).unwrap();
        assert_eq!(entry.subject, HistorySubject::Request);
        assert_eq!(entry.action, HistoryAction::DocumentAdded);
        assert!(entry.changes.contains_key("document_urls"));
    }
}
