//! Licence request (application for a title) domain model.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::str::FromStr;
use uuid::Uuid;
use validator::Validate;

use super::history::{diff_field, FieldChange, HistoryAction, TransitionError};
use super::title::TitleType;

/// An open request older than this many days is overdue.
pub const OVERDUE_AFTER_DAYS: i64 = 30;

/// Request status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RequestStatus {
    Submitted,
    InReview,
    Approved,
    Rejected,
}

impl RequestStatus {
    pub const ALL: [RequestStatus; 4] = [
        RequestStatus::Submitted,
        RequestStatus::InReview,
        RequestStatus::Approved,
        RequestStatus::Rejected,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            RequestStatus::Submitted => "submitted",
            RequestStatus::InReview => "in_review",
            RequestStatus::Approved => "approved",
            RequestStatus::Rejected => "rejected",
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, RequestStatus::Approved | RequestStatus::Rejected)
    }

    pub fn transition_action(&self, target: RequestStatus) -> Option<HistoryAction> {
        use RequestStatus::*;
        match (*self, target) {
            (Submitted, InReview) => Some(HistoryAction::Review),
            (InReview, Approved) => Some(HistoryAction::Approval),
            (InReview, Rejected) => Some(HistoryAction::Rejection),
            _ => None,
        }
    }
}

impl std::fmt::Display for RequestStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for RequestStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        RequestStatus::ALL
            .into_iter()
            .find(|st| st.as_str() == s)
            .ok_or_else(|| format!("Unknown request status: {}", s))
    }
}

/// An application for a title.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LicenseRequest {
    pub id: Uuid,
    pub file_number: String,
    pub requester_id: Uuid,
    pub company: String,
    pub contact_email: String,
    pub phone: Option<String>,
    pub address: Option<String>,
    pub title_type: TitleType,
    pub description: String,
    pub justification: Option<String>,
    pub status: RequestStatus,
    pub admin_comments: Option<String>,
    pub assignee_id: Option<Uuid>,
    pub document_urls: Vec<String>,
    pub submission_date: DateTime<Utc>,
    pub processing_date: Option<DateTime<Utc>>,
    pub updated_at: DateTime<Utc>,
}

/// A request about to be inserted. The file number is assigned at insert time.
#[derive(Debug, Clone, PartialEq)]
pub struct NewLicenseRequest {
    pub requester_id: Uuid,
    pub company: String,
    pub contact_email: String,
    pub phone: Option<String>,
    pub address: Option<String>,
    pub title_type: TitleType,
    pub description: String,
    pub justification: Option<String>,
    pub document_urls: Vec<String>,
}

impl From<CreateLicenseRequest> for NewLicenseRequest {
    fn from(req: CreateLicenseRequest) -> Self {
        let mut document_urls: Vec<String> = Vec::with_capacity(req.document_urls.len());
        for url in req.document_urls {
            if !document_urls.contains(&url) {
                document_urls.push(url);
            }
        }
        Self {
            requester_id: req.requester_id,
            company: req.company.trim().to_string(),
            contact_email: req.contact_email,
            phone: req.phone,
            address: req.address,
            title_type: req.title_type,
            description: req.description,
            justification: req.justification,
            document_urls,
        }
    }
}

/// Outcome of a validated status change, ready to persist.
#[derive(Debug, Clone)]
pub struct StatusChange {
    pub action: HistoryAction,
    pub previous: RequestStatus,
    pub comment: String,
}

impl LicenseRequest {
    pub fn days_since_submission(&self, now: DateTime<Utc>) -> i64 {
        (now - self.submission_date).num_days()
    }

    /// True iff more than 30 days have passed since submission and the request is still open.
    pub fn is_overdue(&self, now: DateTime<Utc>) -> bool {
        !self.status.is_terminal() && self.days_since_submission(now) > OVERDUE_AFTER_DAYS
    }

    pub fn processing_days(&self) -> Option<i64> {
        self.processing_date
            .map(|done| (done - self.submission_date).num_days())
    }

    /// Validates and applies a status change.
    ///
    /// The processing date is stamped when the request reaches a terminal state.
    pub fn apply_status(
        &mut self,
        target: RequestStatus,
        comment: Option<String>,
        now: DateTime<Utc>,
    ) -> Result<StatusChange, TransitionError> {
        let action = self
            .status
            .transition_action(target)
            .ok_or_else(|| TransitionError::NotAllowed {
                entity: "request",
                from: self.status.to_string(),
                to: target.to_string(),
            })?;

        let previous = self.status;
        self.status = target;
        if target.is_terminal() {
            self.processing_date = Some(now);
        }

        let comment = comment
            .filter(|c| !c.trim().is_empty())
            .unwrap_or_else(|| format!("Status changed: {} → {}", previous, target));

        Ok(StatusChange {
            action,
            previous,
            comment,
        })
    }

    fn ensure_open(&self) -> Result<(), TransitionError> {
        if self.status.is_terminal() {
            return Err(TransitionError::Invalid(format!(
                "Request {} is {} and can no longer be modified",
                self.file_number, self.status
            )));
        }
        Ok(())
    }

    /// Applies a partial update to an open request and returns the changed fields.
    pub fn apply_update(
        &mut self,
        patch: &UpdateLicenseRequest,
    ) -> Result<HashMap<String, FieldChange>, TransitionError> {
        self.ensure_open()?;
        let mut changes = HashMap::new();

        if let Some(company) = &patch.company {
            diff_field(&mut changes, "company", &self.company, company);
            self.company = company.clone();
        }
        if let Some(email) = &patch.contact_email {
            diff_field(&mut changes, "contact_email", &self.contact_email, email);
            self.contact_email = email.clone();
        }
        if let Some(phone) = &patch.phone {
            let new = Some(phone.clone());
            diff_field(&mut changes, "phone", &self.phone, &new);
            self.phone = new;
        }
        if let Some(address) = &patch.address {
            let new = Some(address.clone());
            diff_field(&mut changes, "address", &self.address, &new);
            self.address = new;
        }
        if let Some(description) = &patch.description {
            diff_field(&mut changes, "description", &self.description, description);
            self.description = description.clone();
        }
        if let Some(justification) = &patch.justification {
            let new = Some(justification.clone());
            diff_field(&mut changes, "justification", &self.justification, &new);
            self.justification = new;
        }

        Ok(changes)
    }

    /// Sets or clears the assignee. Returns the previous assignee.
    pub fn assign(&mut self, assignee: Option<Uuid>) -> Result<Option<Uuid>, TransitionError> {
        self.ensure_open()?;
        let previous = self.assignee_id;
        self.assignee_id = assignee;
        Ok(previous)
    }

    /// Adds a document URL. Returns false when it is already attached.
    pub fn add_document(&mut self, url: &str) -> bool {
        if self.document_urls.iter().any(|u| u == url) {
            return false;
        }
        self.document_urls.push(url.to_string());
        true
    }

    /// Removes a document URL. Returns false when it was not attached.
    pub fn remove_document(&mut self, url: &str) -> bool {
        let before = self.document_urls.len();
        self.document_urls.retain(|u| u != url);
        self.document_urls.len() != before
    }
}

/// Request payload for submitting a licence request.
#[derive(Debug, Clone, Deserialize, Validate)]
pub struct CreateLicenseRequest {
    pub requester_id: Uuid,

    #[validate(
        length(min = 3, max = 200, message = "Company must be 3-200 characters"),
        custom(function = "shared::validation::validate_not_blank")
    )]
    pub company: String,

    #[validate(email(message = "Invalid email format"))]
    pub contact_email: String,

    #[validate(length(max = 32, message = "Phone must be at most 32 characters"))]
    pub phone: Option<String>,

    #[validate(length(max = 500, message = "Address must be at most 500 characters"))]
    pub address: Option<String>,

    pub title_type: TitleType,

    #[validate(length(min = 1, max = 5000, message = "Description must be 1-5000 characters"))]
    pub description: String,

    #[validate(length(max = 5000, message = "Justification must be at most 5000 characters"))]
    pub justification: Option<String>,

    #[serde(default)]
    pub document_urls: Vec<String>,
}

/// Request payload for updating an open request.
#[derive(Debug, Clone, Default, Deserialize, Validate)]
pub struct UpdateLicenseRequest {
    #[validate(length(min = 3, max = 200, message = "Company must be 3-200 characters"))]
    pub company: Option<String>,

    #[validate(email(message = "Invalid email format"))]
    pub contact_email: Option<String>,

    #[validate(length(max = 32, message = "Phone must be at most 32 characters"))]
    pub phone: Option<String>,

    #[validate(length(max = 500, message = "Address must be at most 500 characters"))]
    pub address: Option<String>,

    #[validate(length(min = 1, max = 5000, message = "Description must be 1-5000 characters"))]
    pub description: Option<String>,

    #[validate(length(max = 5000, message = "Justification must be at most 5000 characters"))]
    pub justification: Option<String>,
}

/// Request payload for changing a request's status.
#[derive(Debug, Clone, Deserialize, Validate)]
pub struct UpdateRequestStatus {
    pub status: RequestStatus,

    #[validate(length(max = 5000, message = "Comments must be at most 5000 characters"))]
    pub admin_comments: Option<String>,

    pub assignee_id: Option<Uuid>,
}

/// Request payload for (un)assigning a request.
#[derive(Debug, Clone, Deserialize)]
pub struct AssignRequest {
    pub assignee_id: Option<Uuid>,
}

/// Request payload for commenting on a request.
#[derive(Debug, Clone, Deserialize, Validate)]
pub struct AddCommentRequest {
    #[validate(
        length(min = 1, max = 2000, message = "Comment must be 1-2000 characters"),
        custom(function = "shared::validation::validate_not_blank")
    )]
    pub comment: String,
}

/// Request payload for attaching or detaching a document URL.
#[derive(Debug, Clone, Deserialize, Validate)]
pub struct DocumentRequest {
    #[validate(
        length(max = 2048, message = "URL must be at most 2048 characters"),
        custom(function = "shared::validation::validate_http_url")
    )]
    pub url: String,
}

/// Query parameters for listing requests.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ListRequestsQuery {
    pub status: Option<RequestStatus>,
    pub title_type: Option<TitleType>,
    pub requester_id: Option<Uuid>,
    pub assignee_id: Option<Uuid>,
    pub overdue: Option<bool>,
    pub search: Option<String>,
    pub limit: Option<i64>,
    pub offset: Option<i64>,
}

/// Response payload for a request, with derived age flags.
#[derive(Debug, Clone, Serialize)]
pub struct LicenseRequestResponse {
    #[serde(flatten)]
    pub request: LicenseRequest,
    pub is_overdue: bool,
    pub days_since_submission: i64,
}

impl LicenseRequestResponse {
    pub fn new(request: LicenseRequest, now: DateTime<Utc>) -> Self {
        Self {
            is_overdue: request.is_overdue(now),
            days_since_submission: request.days_since_submission(now),
            request,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct ListRequestsResponse {
    pub requests: Vec<LicenseRequestResponse>,
    pub total: i64,
}

/// Aggregate request counts.
#[derive(Debug, Clone, Default, Serialize)]
pub struct RequestStatistics {
    pub total: i64,
    pub by_status: HashMap<String, i64>,
    pub by_type: HashMap<String, i64>,
    pub overdue: i64,
    pub average_processing_days: Option<f64>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    fn sample_request(status: RequestStatus) -> LicenseRequest {
        let now = Utc::now();
        LicenseRequest {
            id: Uuid::new_v4(),
            file_number: "DEM-LT1-2026-0001".into(),
            requester_id: Uuid::new_v4(),
            company: "Acme".into(),
            contact_email: "contact@acme.example".into(),
            phone: None,
            address: None,
            title_type: TitleType::LicenceType1,
            description: "Mobile network rollout".into(),
            justification: None,
            status,
            admin_comments: None,
            assignee_id: None,
            document_urls: vec![],
            submission_date: now,
            processing_date: None,
            updated_at: now,
        }
    }

    #[test]
    fn test_is_overdue_after_thirty_days_when_open() {
        let request = sample_request(RequestStatus::InReview);
        let submitted = request.submission_date;

        assert!(!request.is_overdue(submitted + Duration::days(30)));
        assert!(request.is_overdue(submitted + Duration::days(31)));
    }

    #[test]
    fn test_terminal_request_is_never_overdue() {
        let request = sample_request(RequestStatus::Approved);
        assert!(!request.is_overdue(request.submission_date + Duration::days(400)));
    }

    #[test]
    fn test_status_flow_stamps_processing_date_on_terminal() {
        let mut request = sample_request(RequestStatus::Submitted);
        let now = Utc::now();

        let change = request.apply_status(RequestStatus::InReview, None, now).unwrap();
        assert_eq!(change.action, HistoryAction::Review);
        assert_eq!(change.comment, "Status changed: submitted → in_review");
        assert!(request.processing_date.is_none());

        let change = request
            .apply_status(RequestStatus::Approved, Some("Complete file".into()), now)
            .unwrap();
        assert_eq!(change.action, HistoryAction::Approval);
        assert_eq!(change.previous, RequestStatus::InReview);
        assert_eq!(change.comment, "Complete file");
        assert_eq!(request.processing_date, Some(now));
    }

    #[test]
    fn test_status_changes_rejected_outside_table() {
        let mut submitted = sample_request(RequestStatus::Submitted);
        assert!(submitted
            .apply_status(RequestStatus::Approved, None, Utc::now())
            .is_err());
        assert_eq!(submitted.status, RequestStatus::Submitted);

        let mut rejected = sample_request(RequestStatus::Rejected);
        for target in RequestStatus::ALL {
            assert!(rejected.apply_status(target, None, Utc::now()).is_err());
        }
    }

    #[test]
    fn test_update_refused_once_terminal() {
        let mut request = sample_request(RequestStatus::Approved);
        let patch = UpdateLicenseRequest {
            company: Some("Acme Telecom".into()),
            ..Default::default()
        };
        assert!(request.apply_update(&patch).is_err());
    }

    #[test]
    fn test_update_diff_lists_changed_fields() {
        let mut request = sample_request(RequestStatus::Submitted);
        let patch = UpdateLicenseRequest {
            company: Some("Acme Telecom".into()),
            description: Some("Mobile network rollout".into()),
            ..Default::default()
        };
        let changes = request.apply_update(&patch).unwrap();
        assert_eq!(changes.len(), 1);
        assert_eq!(changes["company"].new, Some(serde_json::json!("Acme Telecom")));
    }

    #[test]
    fn test_documents_are_deduplicated() {
        let mut request = sample_request(RequestStatus::Submitted);
        assert!(request.add_document("https://files.example/a.pdf"));
        assert!(!request.add_document("https://files.example/a.pdf"));
        assert!(request.remove_document("https://files.example/a.pdf"));
        assert!(!request.remove_document("https://files.example/a.pdf"));
    }

    #[test]
    fn test_create_request_validation() {
        let json = r#"{
            "requester_id": "550e8400-e29b-41d4-a716-446655440000",
            "company": "Ac",
            "contact_email": "not-an-email",
            "title_type": "licence_type_1",
            "description": "Rollout"
        }"#;
        let request: CreateLicenseRequest = serde_json::from_str(json).unwrap();
        let errors = request.validate().unwrap_err();
        let fields = errors.field_errors();
        assert!(fields.contains_key("company"));
        assert!(fields.contains_key("contact_email"));
    }

    #[test]
    fn test_new_request_trims_company_and_dedupes_documents() {
        let json = r#"{
            "requester_id": "550e8400-e29b-41d4-a716-446655440000",
            "company": "  Acme  ",
            "contact_email": "contact@acme.example",
            "title_type": "licence_type_1",
            "description": "Rollout",
            "document_urls": ["https://files.example/a.pdf", "https://files.example/a.pdf"]
        }"#;
        let request: CreateLicenseRequest = serde_json::from_str(json).unwrap();
        let new = NewLicenseRequest::from(request);
        assert_eq!(new.company, "Acme");
        assert_eq!(new.document_urls.len(), 1);
    }

    #[test]
    fn test_response_serializes_flags() {
        let request = sample_request(RequestStatus::Submitted);
        let now = request.submission_date + Duration::days(45);
        let json = serde_json::to_value(LicenseRequestResponse::new(request, now)).unwrap();
        assert_eq!(json["is_overdue"], true);
        assert_eq!(json["days_since_submission"], 45);
        assert_eq!(json["file_number"], "DEM-LT1-2026-0001");
    }
}
