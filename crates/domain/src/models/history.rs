//! Lifecycle history domain model.
//!
//! Every status transition of a Title or a LicenseRequest appends exactly one
//! immutable [`HistoryEntry`]. Entries are never updated or deleted.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;
use std::collections::HashMap;
use std::str::FromStr;
use thiserror::Error;
use uuid::Uuid;

/// Entity a history entry belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum HistorySubject {
    Title,
    Request,
}

impl HistorySubject {
    pub fn as_str(&self) -> &'static str {
        match self {
            HistorySubject::Title => "title",
            HistorySubject::Request => "request",
        }
    }
}

impl FromStr for HistorySubject {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "title" => Ok(HistorySubject::Title),
            "request" => Ok(HistorySubject::Request),
            _ => Err(format!("Unknown history subject: {}", s)),
        }
    }
}

/// Kind of action recorded in the history ledger.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum HistoryAction {
    Creation,
    Modification,
    Review,
    Approval,
    Rejection,
    Suspension,
    Reactivation,
    Renewal,
    Expiration,
    Submission,
    Assignment,
    Comment,
    DocumentAdded,
    DocumentRemoved,
}

impl HistoryAction {
    pub fn as_str(&self) -> &'static str {
        match self {
            HistoryAction::Creation => "creation",
            HistoryAction::Modification => "modification",
            HistoryAction::Review => "review",
            HistoryAction::Approval => "approval",
            HistoryAction::Rejection => "rejection",
            HistoryAction::Suspension => "suspension",
            HistoryAction::Reactivation => "reactivation",
            HistoryAction::Renewal => "renewal",
            HistoryAction::Expiration => "expiration",
            HistoryAction::Submission => "submission",
            HistoryAction::Assignment => "assignment",
            HistoryAction::Comment => "comment",
            HistoryAction::DocumentAdded => "document_added",
            HistoryAction::DocumentRemoved => "document_removed",
        }
    }
}

impl std::fmt::Display for HistoryAction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for HistoryAction {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "creation" => Ok(HistoryAction::Creation),
            "modification" => Ok(HistoryAction::Modification),
            "review" => Ok(HistoryAction::Review),
            "approval" => Ok(HistoryAction::Approval),
            "rejection" => Ok(HistoryAction::Rejection),
            "suspension" => Ok(HistoryAction::Suspension),
            "reactivation" => Ok(HistoryAction::Reactivation),
            "renewal" => Ok(HistoryAction::Renewal),
            "expiration" => Ok(HistoryAction::Expiration),
            "submission" => Ok(HistoryAction::Submission),
            "assignment" => Ok(HistoryAction::Assignment),
            "comment" => Ok(HistoryAction::Comment),
            "document_added" => Ok(HistoryAction::DocumentAdded),
            "document_removed" => Ok(HistoryAction::DocumentRemoved),
            _ => Err(format!("Unknown history action: {}", s)),
        }
    }
}

/// Represents a change to a field with old and new values.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FieldChange {
    pub old: Option<JsonValue>,
    pub new: Option<JsonValue>,
}

impl FieldChange {
    pub fn new(old: Option<JsonValue>, new: Option<JsonValue>) -> Self {
        Self { old, new }
    }
}

/// Records `field` in `changes` when `old` and `new` serialize differently.
pub fn diff_field<T: Serialize + PartialEq>(
    changes: &mut HashMap<String, FieldChange>,
    field: &str,
    old: &T,
    new: &T,
) {
    if old != new {
        changes.insert(
            field.to_string(),
            FieldChange::new(serde_json::to_value(old).ok(), serde_json::to_value(new).ok()),
        );
    }
}

/// Immutable record of one lifecycle transition.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HistoryEntry {
    pub id: Uuid,
    pub subject: HistorySubject,
    pub subject_id: Uuid,
    pub action: HistoryAction,
    /// `None` for system-initiated transitions.
    pub actor_id: Option<Uuid>,
    pub old_status: Option<String>,
    pub new_status: Option<String>,
    pub comment: Option<String>,
    pub changes: HashMap<String, FieldChange>,
    pub created_at: DateTime<Utc>,
}

/// Input for appending a history entry.
#[derive(Debug, Clone)]
pub struct NewHistoryEntry {
    pub subject: HistorySubject,
    pub subject_id: Uuid,
    pub action: HistoryAction,
    pub actor_id: Option<Uuid>,
    pub old_status: Option<String>,
    pub new_status: Option<String>,
    pub comment: Option<String>,
    pub changes: HashMap<String, FieldChange>,
}

impl NewHistoryEntry {
    pub fn new(subject: HistorySubject, subject_id: Uuid, action: HistoryAction) -> Self {
        Self {
            subject,
            subject_id,
            action,
            actor_id: None,
            old_status: None,
            new_status: None,
            comment: None,
            changes: HashMap::new(),
        }
    }

    pub fn by(mut self, actor_id: Option<Uuid>) -> Self {
        self.actor_id = actor_id;
        self
    }

    pub fn status_change(mut self, old: Option<&str>, new: &str) -> Self {
        self.old_status = old.map(str::to_string);
        self.new_status = Some(new.to_string());
        self
    }

    pub fn with_comment(mut self, comment: Option<String>) -> Self {
        self.comment = comment.filter(|c| !c.trim().is_empty());
        self
    }

    pub fn with_changes(mut self, changes: HashMap<String, FieldChange>) -> Self {
        self.changes = changes;
        self
    }
}

/// Errors raised by lifecycle rules before anything is persisted.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum TransitionError {
    #[error("Cannot move {entity} from '{from}' to '{to}'")]
    NotAllowed {
        entity: &'static str,
        from: String,
        to: String,
    },

    #[error("{0}")]
    Invalid(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_history_action_round_trip_strings() {
        for action in [
            HistoryAction::Creation,
            HistoryAction::Suspension,
            HistoryAction::DocumentAdded,
            HistoryAction::Expiration,
        ] {
            assert_eq!(action.as_str().parse::<HistoryAction>().unwrap(), action);
        }
        assert!("renouvellement".parse::<HistoryAction>().is_err());
    }

    #[test]
    fn test_diff_field_records_only_changes() {
        let mut changes = HashMap::new();
        diff_field(&mut changes, "company", &"Acme".to_string(), &"Acme".to_string());
        assert!(changes.is_empty());

        diff_field(&mut changes, "duration_years", &5, &10);
        let change = changes.get("duration_years").unwrap();
        assert_eq!(change.old, Some(serde_json::json!(5)));
        assert_eq!(change.new, Some(serde_json::json!(10)));
    }

    #[test]
    fn test_new_history_entry_builder() {
        let subject_id = Uuid::new_v4();
        let actor = Uuid::new_v4();
        let entry = NewHistoryEntry::new(HistorySubject::Title, subject_id, HistoryAction::Approval)
            .by(Some(actor))
            .status_change(Some("in_review"), "approved")
            .with_comment(Some("  ".to_string()));

        assert_eq!(entry.actor_id, Some(actor));
        assert_eq!(entry.old_status.as_deref(), Some("in_review"));
        assert_eq!(entry.new_status.as_deref(), Some("approved"));
        assert!(entry.comment.is_none());
    }

    #[test]
    fn test_transition_error_message() {
        let err = TransitionError::NotAllowed {
            entity: "title",
            from: "rejected".into(),
            to: "approved".into(),
        };
        assert_eq!(err.to_string(), "Cannot move title from 'rejected' to 'approved'");
    }
}
