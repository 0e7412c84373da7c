//! Title and request lifecycle.
//!
//! Every state change is validated by the domain model, then written together
//! with its history entry in one transaction. Fee creation, audit entries and
//! listener fan-out run after the commit and only log their failures.

use chrono::{Datelike, NaiveDate, Utc};
use domain::models::license_request::{
    CreateLicenseRequest, ListRequestsQuery, RequestStatistics, UpdateLicenseRequest,
    UpdateRequestStatus,
};
use domain::models::title::{CreateTitleRequest, ListTitlesQuery, TitleStatistics, UpdateTitleRequest};
use domain::models::user::CreateUserRequest;
use domain::models::{
    AuditAction, FieldChange, HistoryAction, HistoryEntry, HistorySubject, LicenseRequest,
    NewHistoryEntry, NewLicenseRequest, NewTitle, Title, TitleStatus,
    TransitionError, User, UserRole,
};
use domain::services::{AuditLogger, LifecycleEvent, ListenerRegistry};
use persistence::repositories::{
    HistoryRepository, LicenseRequestRepository, TitleRepository, UserRepository,
};
use shared::pagination::clamp_limit;
use sqlx::PgPool;
use std::collections::HashMap;
use std::sync::Arc;
use thiserror::Error;
use tracing::info;
use uuid::Uuid;

use super::fees::FeeService;
use crate::extractors::Actor;

#[derive(Debug, Error)]
pub enum LifecycleError {
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error(transparent)]
    Transition(#[from] TransitionError),

    #[error("{0}")]
    NotFound(String),

    #[error("{0}")]
    Conflict(String),
}

/// Title, request and user operations.
#[derive(Clone)]
pub struct LifecycleService {
    titles: TitleRepository,
    requests: LicenseRequestRepository,
    history: HistoryRepository,
    users: UserRepository,
    fees: FeeService,
    listeners: ListenerRegistry,
    audit: Arc<dyn AuditLogger>,
}

fn today() -> NaiveDate {
    Utc::now().date_naive()
}

/// Rejects `action` unless it is one of `allowed`.
fn ensure_action(
    action: HistoryAction,
    allowed: &[HistoryAction],
    from: TitleStatus,
    to: TitleStatus,
) -> Result<(), TransitionError> {
    if allowed.contains(&action) {
        Ok(())
    } else {
        Err(TransitionError::NotAllowed {
            entity: "title",
            from: from.to_string(),
            to: to.to_string(),
        })
    }
}

impl LifecycleService {
    pub fn new(
        pool: PgPool,
        fees: FeeService,
        listeners: ListenerRegistry,
        audit: Arc<dyn AuditLogger>,
    ) -> Self {
        Self {
            titles: TitleRepository::new(pool.clone()),
            requests: LicenseRequestRepository::new(pool.clone()),
            history: HistoryRepository::new(pool.clone()),
            users: UserRepository::new(pool),
            fees,
            listeners,
            audit,
        }
    }

    async fn audit(
        &self,
        actor: &Actor,
        action: AuditAction,
        resource_type: &str,
        resource_id: Uuid,
        description: String,
    ) {
        self.audit
            .record_or_warn(
                actor
                    .audit(action)
                    .on_resource(resource_type, resource_id)
                    .describe(description)
                    .build(),
            )
            .await;
    }

    // Users

    pub async fn create_user(&self, input: &CreateUserRequest, actor: &Actor) -> Result<User, LifecycleError> {
        let user = self.users.create(input).await?;
        info!(user_id = %user.id, role = user.role.as_str(), "User created");

        self.audit(
            actor,
            AuditAction::UserCreate,
            "user",
            user.id,
            format!("Created user {}", user.email),
        )
        .await;
        self.listeners
            .publish(LifecycleEvent::UserCreated { user: user.clone() })
            .await;
        Ok(user)
    }

    pub async fn get_user(&self, id: Uuid) -> Result<User, LifecycleError> {
        self.users
            .find_by_id(id)
            .await?
            .ok_or_else(|| LifecycleError::NotFound(format!("User {} not found", id)))
    }

    pub async fn list_users(
        &self,
        role: Option<UserRole>,
        limit: Option<i64>,
        offset: Option<i64>,
    ) -> Result<(Vec<User>, i64), LifecycleError> {
        Ok(self
            .users
            .list(role, clamp_limit(limit), offset.unwrap_or(0).max(0))
            .await?)
    }

    // Titles

    pub async fn create_title(
        &self,
        input: &CreateTitleRequest,
        actor: &Actor,
    ) -> Result<Title, LifecycleError> {
        let owner = self.get_user(input.owner_id).await?;
        if owner.role != UserRole::Operator {
            return Err(TransitionError::Invalid(format!(
                "Title owner must be an operator, {} is {}",
                owner.email,
                owner.role.as_str()
            ))
            .into());
        }

        let new = NewTitle::from_request(input);
        if !new.status.is_initial() {
            return Err(TransitionError::Invalid(format!(
                "A title cannot be created as {}",
                new.status
            ))
            .into());
        }

        let (title, _) = self.titles.create(&new, Utc::now().year(), actor.id).await?;
        info!(title_id = %title.id, number = %title.number, status = %title.status, "Title created");

        if title.status == TitleStatus::Approved {
            self.fees.ensure_current_year_fee(&title, actor.id).await;
        }
        self.audit(
            actor,
            AuditAction::TitleCreate,
            "title",
            title.id,
            format!("Created title {}", title.number),
        )
        .await;
        self.listeners
            .publish(LifecycleEvent::TitleCreated {
                title: title.clone(),
                actor: actor.id,
            })
            .await;
        Ok(title)
    }

    /// Flips due titles to expired and publishes `TitleExpired` for each.
    ///
    /// `only` narrows the check to one title.
    pub async fn expire_due_titles(&self, only: Option<Uuid>) -> Result<usize, LifecycleError> {
        let expired = self.titles.expire_due(today(), only).await?;
        let count = expired.len();
        for (title, previous_status) in expired {
            info!(
                title_id = %title.id,
                number = %title.number,
                previous_status = %previous_status,
                "Title expired"
            );
            self.listeners
                .publish(LifecycleEvent::TitleExpired {
                    title,
                    previous_status,
                })
                .await;
        }
        Ok(count)
    }

    /// Loads a title after applying the expiry check to it.
    pub async fn get_title(&self, id: Uuid) -> Result<Title, LifecycleError> {
        self.expire_due_titles(Some(id)).await?;
        self.titles
            .find_by_id(id)
            .await?
            .ok_or_else(|| LifecycleError::NotFound(format!("Title {} not found", id)))
    }

    pub async fn list_titles(&self, query: &ListTitlesQuery) -> Result<(Vec<Title>, i64), LifecycleError> {
        self.expire_due_titles(None).await?;
        let limit = clamp_limit(query.limit);
        let offset = query.offset.unwrap_or(0).max(0);
        Ok(self.titles.list(query, today(), limit, offset).await?)
    }

    pub async fn title_statistics(&self) -> Result<TitleStatistics, LifecycleError> {
        self.expire_due_titles(None).await?;
        Ok(self.titles.statistics(today()).await?)
    }

    pub async fn title_history(&self, id: Uuid) -> Result<Vec<HistoryEntry>, LifecycleError> {
        self.get_title(id).await?;
        Ok(self.history.list_for_subject(HistorySubject::Title, id).await?)
    }

    async fn save_title(&self, title: &Title, entry: &NewHistoryEntry) -> Result<Title, LifecycleError> {
        self.titles
            .save_with_history(title, entry)
            .await?
            .map(|(saved, _)| saved)
            .ok_or_else(|| {
                LifecycleError::Conflict(format!("Title {} was modified concurrently", title.number))
            })
    }

    pub async fn update_title(
        &self,
        id: Uuid,
        patch: &UpdateTitleRequest,
        actor: &Actor,
    ) -> Result<Title, LifecycleError> {
        let mut title = self.get_title(id).await?;
        let changes = title.apply_update(patch)?;
        if changes.is_empty() {
            return Ok(title);
        }

        let entry = NewHistoryEntry::new(HistorySubject::Title, id, HistoryAction::Modification)
            .by(actor.id)
            .with_comment(patch.comment.clone())
            .with_changes(changes.clone());
        let title = self.save_title(&title, &entry).await?;

        self.audit(
            actor,
            AuditAction::TitleUpdate,
            "title",
            id,
            format!("Updated title {} ({})", title.number, changed_fields(&changes)),
        )
        .await;
        self.listeners
            .publish(LifecycleEvent::TitleUpdated {
                title: title.clone(),
                previous_status: None,
                actor: actor.id,
            })
            .await;
        Ok(title)
    }

    async fn change_title_status(
        &self,
        id: Uuid,
        target: TitleStatus,
        allowed: &[HistoryAction],
        audit_action: AuditAction,
        comment: Option<String>,
        actor: &Actor,
    ) -> Result<Title, LifecycleError> {
        let mut title = self.get_title(id).await?;
        let action = title.plan_transition(target)?;
        ensure_action(action, allowed, title.status, target)?;

        let previous = title.status;
        title.status = target;
        let entry = NewHistoryEntry::new(HistorySubject::Title, id, action)
            .by(actor.id)
            .status_change(Some(previous.as_str()), target.as_str())
            .with_comment(comment);
        let title = self.save_title(&title, &entry).await?;

        info!(
            title_id = %id,
            number = %title.number,
            from = %previous,
            to = %target,
            "Title status changed"
        );

        if action == HistoryAction::Approval {
            self.fees.ensure_current_year_fee(&title, actor.id).await;
        }
        self.audit(
            actor,
            audit_action,
            "title",
            id,
            format!("Title {}: {} -> {}", title.number, previous, target),
        )
        .await;
        self.listeners
            .publish(LifecycleEvent::TitleUpdated {
                title: title.clone(),
                previous_status: Some(previous),
                actor: actor.id,
            })
            .await;
        Ok(title)
    }

    /// Review, approval or rejection of a title.
    pub async fn transition_title(
        &self,
        id: Uuid,
        target: TitleStatus,
        comment: Option<String>,
        actor: &Actor,
    ) -> Result<Title, LifecycleError> {
        self.change_title_status(
            id,
            target,
            &[
                HistoryAction::Review,
                HistoryAction::Approval,
                HistoryAction::Rejection,
            ],
            AuditAction::TitleTransition,
            comment,
            actor,
        )
        .await
    }

    pub async fn suspend_title(
        &self,
        id: Uuid,
        comment: Option<String>,
        actor: &Actor,
    ) -> Result<Title, LifecycleError> {
        self.change_title_status(
            id,
            TitleStatus::Suspended,
            &[HistoryAction::Suspension],
            AuditAction::TitleSuspend,
            comment,
            actor,
        )
        .await
    }

    pub async fn reactivate_title(
        &self,
        id: Uuid,
        comment: Option<String>,
        actor: &Actor,
    ) -> Result<Title, LifecycleError> {
        self.change_title_status(
            id,
            TitleStatus::Approved,
            &[HistoryAction::Reactivation],
            AuditAction::TitleReactivate,
            comment,
            actor,
        )
        .await
    }

    /// Renews a title from today for `years` (default: its current duration).
    pub async fn renew_title(
        &self,
        id: Uuid,
        years: Option<i32>,
        comment: Option<String>,
        actor: &Actor,
    ) -> Result<Title, LifecycleError> {
        let mut title = self.get_title(id).await?;
        let renewal = title.plan_renewal(years, today())?;

        let previous = title.status;
        let changes = title.apply_renewal(&renewal);
        let comment = comment.or_else(|| {
            Some(format!(
                "Renewed for {} years until {}",
                renewal.duration_years, renewal.expiration_date
            ))
        });
        let entry = NewHistoryEntry::new(HistorySubject::Title, id, HistoryAction::Renewal)
            .by(actor.id)
            .status_change(Some(previous.as_str()), TitleStatus::Approved.as_str())
            .with_comment(comment)
            .with_changes(changes);
        let title = self.save_title(&title, &entry).await?;

        info!(
            title_id = %id,
            number = %title.number,
            expiration_date = %title.expiration_date,
            "Title renewed"
        );

        self.fees.ensure_current_year_fee(&title, actor.id).await;
        self.audit(
            actor,
            AuditAction::TitleRenew,
            "title",
            id,
            format!("Renewed title {} until {}", title.number, title.expiration_date),
        )
        .await;
        self.listeners
            .publish(LifecycleEvent::TitleUpdated {
                title: title.clone(),
                previous_status: Some(previous).filter(|p| *p != TitleStatus::Approved),
                actor: actor.id,
            })
            .await;
        Ok(title)
    }

    // Requests

    pub async fn create_request(&self, input: CreateLicenseRequest) -> Result<LicenseRequest, LifecycleError> {
        self.get_user(input.requester_id).await?;
        let new = NewLicenseRequest::from(input);
        let (request, _) = self.requests.create(&new, Utc::now().year()).await?;
        info!(request_id = %request.id, file_number = %request.file_number, "Request submitted");

        self.listeners
            .publish(LifecycleEvent::RequestCreated {
                request: request.clone(),
            })
            .await;
        Ok(request)
    }

    pub async fn get_request(&self, id: Uuid) -> Result<LicenseRequest, LifecycleError> {
        self.requests
            .find_by_id(id)
            .await?
            .ok_or_else(|| LifecycleError::NotFound(format!("Request {} not found", id)))
    }

    pub async fn list_requests(
        &self,
        query: &ListRequestsQuery,
    ) -> Result<(Vec<LicenseRequest>, i64), LifecycleError> {
        let limit = clamp_limit(query.limit);
        let offset = query.offset.unwrap_or(0).max(0);
        Ok(self.requests.list(query, Utc::now(), limit, offset).await?)
    }

    pub async fn request_statistics(&self) -> Result<RequestStatistics, LifecycleError> {
        Ok(self.requests.statistics(Utc::now()).await?)
    }

    pub async fn request_history(&self, id: Uuid) -> Result<Vec<HistoryEntry>, LifecycleError> {
        self.get_request(id).await?;
        Ok(self.history.list_for_subject(HistorySubject::Request, id).await?)
    }

    async fn save_request(
        &self,
        request: &LicenseRequest,
        entry: &NewHistoryEntry,
    ) -> Result<LicenseRequest, LifecycleError> {
        self.requests
            .save_with_history(request, entry)
            .await?
            .map(|(saved, _)| saved)
            .ok_or_else(|| {
                LifecycleError::Conflict(format!(
                    "Request {} was modified concurrently",
                    request.file_number
                ))
            })
    }

    pub async fn update_request(
        &self,
        id: Uuid,
        patch: &UpdateLicenseRequest,
        actor: &Actor,
    ) -> Result<LicenseRequest, LifecycleError> {
        let mut request = self.get_request(id).await?;
        let changes = request.apply_update(patch)?;
        if changes.is_empty() {
            return Ok(request);
        }

        let entry = NewHistoryEntry::new(HistorySubject::Request, id, HistoryAction::Modification)
            .by(actor.id)
            .with_comment(Some(format!("Updated {}", changed_fields(&changes))))
            .with_changes(changes);
        let request = self.save_request(&request, &entry).await?;

        self.listeners
            .publish(LifecycleEvent::RequestUpdated {
                request: request.clone(),
                actor: actor.id,
            })
            .await;
        Ok(request)
    }

    /// Loads `id` and checks it is active staff.
    async fn staff_member(&self, id: Uuid) -> Result<User, LifecycleError> {
        let user = self.get_user(id).await?;
        if !user.is_active_staff() {
            return Err(TransitionError::Invalid(format!(
                "Assignee {} must be an active admin or personnel member",
                user.email
            ))
            .into());
        }
        Ok(user)
    }

    pub async fn assign_request(
        &self,
        id: Uuid,
        assignee: Option<Uuid>,
        actor: &Actor,
    ) -> Result<LicenseRequest, LifecycleError> {
        let assignee_user = match assignee {
            Some(assignee_id) => Some(self.staff_member(assignee_id).await?),
            None => None,
        };

        let mut request = self.get_request(id).await?;
        let previous = request.assign(assignee)?;

        let mut changes = HashMap::new();
        changes.insert(
            "assignee_id".to_string(),
            FieldChange::new(
                previous.map(|p| serde_json::json!(p)),
                assignee.map(|a| serde_json::json!(a)),
            ),
        );
        let comment = match &assignee_user {
            Some(user) => format!("Assigned to {}", user.full_name),
            None => "Assignment cleared".to_string(),
        };
        let entry = NewHistoryEntry::new(HistorySubject::Request, id, HistoryAction::Assignment)
            .by(actor.id)
            .with_comment(Some(comment.clone()))
            .with_changes(changes);
        let request = self.save_request(&request, &entry).await?;

        info!(request_id = %id, assignee_id = ?assignee, "Request assigned");
        self.audit(
            actor,
            AuditAction::RequestAssign,
            "license_request",
            id,
            format!("Request {}: {}", request.file_number, comment),
        )
        .await;
        self.listeners
            .publish(LifecycleEvent::RequestAssigned {
                request: request.clone(),
                previous_assignee: previous,
                actor: actor.id,
            })
            .await;
        Ok(request)
    }

    pub async fn update_request_status(
        &self,
        id: Uuid,
        input: &UpdateRequestStatus,
        actor: &Actor,
    ) -> Result<LicenseRequest, LifecycleError> {
        if let Some(assignee_id) = input.assignee_id {
            self.staff_member(assignee_id).await?;
        }

        let mut request = self.get_request(id).await?;
        let change = request.apply_status(input.status, input.admin_comments.clone(), Utc::now())?;
        if let Some(comments) = input.admin_comments.as_ref().filter(|c| !c.trim().is_empty()) {
            request.admin_comments = Some(comments.clone());
        }
        if input.assignee_id.is_some() {
            request.assignee_id = input.assignee_id;
        }

        let entry = NewHistoryEntry::new(HistorySubject::Request, id, change.action)
            .by(actor.id)
            .status_change(Some(change.previous.as_str()), input.status.as_str())
            .with_comment(Some(change.comment.clone()));
        let request = self.save_request(&request, &entry).await?;

        info!(
            request_id = %id,
            file_number = %request.file_number,
            from = %change.previous,
            to = %request.status,
            "Request status changed"
        );
        self.audit(
            actor,
            AuditAction::RequestStatusChange,
            "license_request",
            id,
            format!(
                "Request {}: {} -> {}",
                request.file_number, change.previous, request.status
            ),
        )
        .await;
        self.listeners
            .publish(LifecycleEvent::RequestStatusChanged {
                request: request.clone(),
                previous_status: change.previous,
                actor: actor.id,
            })
            .await;
        Ok(request)
    }

    pub async fn add_comment(
        &self,
        id: Uuid,
        comment: &str,
        actor: &Actor,
    ) -> Result<HistoryEntry, LifecycleError> {
        self.get_request(id).await?;
        let entry = NewHistoryEntry::new(HistorySubject::Request, id, HistoryAction::Comment)
            .by(actor.id)
            .with_comment(Some(comment.trim().to_string()));
        Ok(self.history.append(&entry).await?)
    }

    pub async fn add_document(
        &self,
        id: Uuid,
        url: &str,
        actor: &Actor,
    ) -> Result<LicenseRequest, LifecycleError> {
        let mut request = self.get_request(id).await?;
        if !request.add_document(url) {
            return Err(LifecycleError::Conflict(format!(
                "Document {} is already attached",
                url
            )));
        }
        let entry = NewHistoryEntry::new(HistorySubject::Request, id, HistoryAction::DocumentAdded)
            .by(actor.id)
            .with_comment(Some(format!("Document added: {}", url)));
        self.save_request(&request, &entry).await
    }

    pub async fn remove_document(
        &self,
        id: Uuid,
        url: &str,
        actor: &Actor,
    ) -> Result<LicenseRequest, LifecycleError> {
        let mut request = self.get_request(id).await?;
        if !request.remove_document(url) {
            return Err(LifecycleError::NotFound(format!("Document {} is not attached", url)));
        }
        let entry =
            NewHistoryEntry::new(HistorySubject::Request, id, HistoryAction::DocumentRemoved)
                .by(actor.id)
                .with_comment(Some(format!("Document removed: {}", url)));
        self.save_request(&request, &entry).await
    }

    /// Open requests older than the overdue threshold.
    pub async fn overdue_requests(&self) -> Result<Vec<LicenseRequest>, LifecycleError> {
        Ok(self.requests.find_overdue(Utc::now()).await?)
    }
}

fn changed_fields(changes: &HashMap<String, FieldChange>) -> String {
    let mut fields: Vec<&str> = changes.keys().map(String::as_str).collect();
    fields.sort_unstable();
    fields.join(", ")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_transition_endpoint_rejects_suspension() {
        let result = ensure_action(
            HistoryAction::Suspension,
            &[
                HistoryAction::Review,
                HistoryAction::Approval,
                HistoryAction::Rejection,
            ],
            TitleStatus::Approved,
            TitleStatus::Suspended,
        );
        assert_eq!(
            result,
            Err(TransitionError::NotAllowed {
                entity: "title",
                from: "approved".into(),
                to: "suspended".into(),
            })
        );
    }

    #[test]
    fn test_allowed_action_passes() {
        assert!(ensure_action(
            HistoryAction::Reactivation,
            &[HistoryAction::Reactivation],
            TitleStatus::Suspended,
            TitleStatus::Approved,
        )
        .is_ok());
    }

    #[test]
    fn test_changed_fields_are_sorted() {
        let mut changes = HashMap::new();
        changes.insert("phone".to_string(), FieldChange::new(None, None));
        changes.insert("company".to_string(), FieldChange::new(None, None));
        assert_eq!(changed_fields(&changes), "company, phone");
    }

    #[test]
    fn test_lifecycle_error_messages() {
        let err: LifecycleError = TransitionError::Invalid("bad date".into()).into();
        assert_eq!(err.to_string(), "bad date");
        let err = LifecycleError::NotFound("Title x not found".into());
        assert_eq!(err.to_string(), "Title x not found");
    }
}
