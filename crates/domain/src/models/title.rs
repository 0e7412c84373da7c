//! Title (issued licence) domain model.

use chrono::{DateTime, Duration, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::str::FromStr;
use uuid::Uuid;
use validator::Validate;

use super::history::{diff_field, FieldChange, HistoryAction, TransitionError};

/// Days counted per year of validity when computing expiration dates.
pub const DAYS_PER_YEAR: i64 = 365;

/// A title expiring within this many days is "expiring soon".
pub const EXPIRING_SOON_DAYS: i64 = 30;

/// Bounds on a renewal duration in years.
pub const MIN_RENEWAL_YEARS: i32 = 1;
pub const MAX_RENEWAL_YEARS: i32 = 10;

/// The six kinds of title the authority issues.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum TitleType {
    #[serde(rename = "licence_type_1")]
    LicenceType1,
    #[serde(rename = "licence_type_2")]
    LicenceType2,
    #[serde(rename = "agrement_vendeurs")]
    AgrementVendeurs,
    #[serde(rename = "agrement_installateurs")]
    AgrementInstallateurs,
    #[serde(rename = "concessions")]
    Concessions,
    #[serde(rename = "recepisse")]
    Recepisse,
}

impl TitleType {
    pub const ALL: [TitleType; 6] = [
        TitleType::LicenceType1,
        TitleType::LicenceType2,
        TitleType::AgrementVendeurs,
        TitleType::AgrementInstallateurs,
        TitleType::Concessions,
        TitleType::Recepisse,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            TitleType::LicenceType1 => "licence_type_1",
            TitleType::LicenceType2 => "licence_type_2",
            TitleType::AgrementVendeurs => "agrement_vendeurs",
            TitleType::AgrementInstallateurs => "agrement_installateurs",
            TitleType::Concessions => "concessions",
            TitleType::Recepisse => "recepisse",
        }
    }

    /// Three-letter code used in title and request numbers.
    pub fn code(&self) -> &'static str {
        match self {
            TitleType::LicenceType1 => "LT1",
            TitleType::LicenceType2 => "LT2",
            TitleType::AgrementVendeurs => "AGV",
            TitleType::AgrementInstallateurs => "AGI",
            TitleType::Concessions => "CON",
            TitleType::Recepisse => "REC",
        }
    }

    /// Fixed annual fee in FCFA.
    pub fn annual_fee(&self) -> i64 {
        match self {
            TitleType::LicenceType1 => 500_000,
            TitleType::LicenceType2 => 300_000,
            TitleType::AgrementVendeurs => 100_000,
            TitleType::AgrementInstallateurs => 150_000,
            TitleType::Concessions => 1_000_000,
            TitleType::Recepisse => 50_000,
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            TitleType::LicenceType1 => "Type 1 licence",
            TitleType::LicenceType2 => "Type 2 licence",
            TitleType::AgrementVendeurs => "Vendor approval",
            TitleType::AgrementInstallateurs => "Installer approval",
            TitleType::Concessions => "Concession",
            TitleType::Recepisse => "Declaration receipt",
        }
    }
}

impl std::fmt::Display for TitleType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for TitleType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        TitleType::ALL
            .into_iter()
            .find(|t| t.as_str() == s)
            .ok_or_else(|| format!("Unknown title type: {}", s))
    }
}

/// Title status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TitleStatus {
    Pending,
    InReview,
    Approved,
    Rejected,
    Suspended,
    Expired,
}

impl TitleStatus {
    pub const ALL: [TitleStatus; 6] = [
        TitleStatus::Pending,
        TitleStatus::InReview,
        TitleStatus::Approved,
        TitleStatus::Rejected,
        TitleStatus::Suspended,
        TitleStatus::Expired,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            TitleStatus::Pending => "pending",
            TitleStatus::InReview => "in_review",
            TitleStatus::Approved => "approved",
            TitleStatus::Rejected => "rejected",
            TitleStatus::Suspended => "suspended",
            TitleStatus::Expired => "expired",
        }
    }

    /// Terminal statuses are never flipped to expired.
    pub fn is_terminal(&self) -> bool {
        matches!(self, TitleStatus::Rejected | TitleStatus::Expired)
    }

    /// History action for an explicit move to `target`, or `None` when the
    /// move is not part of the lifecycle.
    pub fn transition_action(&self, target: TitleStatus) -> Option<HistoryAction> {
        use TitleStatus::*;
        match (*self, target) {
            (Pending, InReview) => Some(HistoryAction::Review),
            (Pending | InReview, Approved) => Some(HistoryAction::Approval),
            (Pending | InReview, Rejected) => Some(HistoryAction::Rejection),
            (Approved | InReview, Suspended) => Some(HistoryAction::Suspension),
            (Suspended, Approved) => Some(HistoryAction::Reactivation),
            _ => None,
        }
    }

    pub fn can_renew(&self) -> bool {
        matches!(
            self,
            TitleStatus::Approved | TitleStatus::Expired | TitleStatus::Suspended
        )
    }

    /// Statuses a title may be created with.
    pub fn is_initial(&self) -> bool {
        matches!(
            self,
            TitleStatus::Pending | TitleStatus::InReview | TitleStatus::Approved
        )
    }
}

impl std::fmt::Display for TitleStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for TitleStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        TitleStatus::ALL
            .into_iter()
            .find(|st| st.as_str() == s)
            .ok_or_else(|| format!("Unknown title status: {}", s))
    }
}

/// An issued licence.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Title {
    pub id: Uuid,
    pub number: String,
    pub title_type: TitleType,
    pub owner_id: Uuid,
    pub description: Option<String>,
    pub issue_date: NaiveDate,
    pub expiration_date: NaiveDate,
    pub duration_years: i32,
    pub status: TitleStatus,
    pub annual_fee: i64,
    pub conditions: Vec<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// New validity window computed for a renewal.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Renewal {
    pub issue_date: NaiveDate,
    pub expiration_date: NaiveDate,
    pub duration_years: i32,
    pub annual_fee: i64,
}

impl Title {
    /// True iff `today` is past the expiration date, whatever the stored status.
    pub fn is_expired_on(&self, today: NaiveDate) -> bool {
        today > self.expiration_date
    }

    pub fn days_until_expiration(&self, today: NaiveDate) -> i64 {
        (self.expiration_date - today).num_days()
    }

    pub fn is_expiring_soon(&self, today: NaiveDate) -> bool {
        (0..=EXPIRING_SOON_DAYS).contains(&self.days_until_expiration(today))
    }

    /// Whether the read/write-path expiry check must flip this title.
    pub fn needs_expiry(&self, today: NaiveDate) -> bool {
        self.is_expired_on(today) && !self.status.is_terminal()
    }

    /// Flips the status to expired when due. Returns the prior status if it changed.
    pub fn refresh_expiry(&mut self, today: NaiveDate) -> Option<TitleStatus> {
        if self.needs_expiry(today) {
            let previous = self.status;
            self.status = TitleStatus::Expired;
            Some(previous)
        } else {
            None
        }
    }

    /// Validates an explicit status move and returns the history action to record.
    pub fn plan_transition(&self, target: TitleStatus) -> Result<HistoryAction, TransitionError> {
        self.status
            .transition_action(target)
            .ok_or_else(|| TransitionError::NotAllowed {
                entity: "title",
                from: self.status.to_string(),
                to: target.to_string(),
            })
    }

    /// Computes a renewal starting today.
    ///
    /// `years` defaults to the current duration.
    pub fn plan_renewal(
        &self,
        years: Option<i32>,
        today: NaiveDate,
    ) -> Result<Renewal, TransitionError> {
        if !self.status.can_renew() {
            return Err(TransitionError::NotAllowed {
                entity: "title",
                from: self.status.to_string(),
                to: TitleStatus::Approved.to_string(),
            });
        }

        let years = years.unwrap_or(self.duration_years);
        if !(MIN_RENEWAL_YEARS..=MAX_RENEWAL_YEARS).contains(&years) {
            return Err(TransitionError::Invalid(format!(
                "Renewal duration must be between {} and {} years",
                MIN_RENEWAL_YEARS, MAX_RENEWAL_YEARS
            )));
        }

        Ok(Renewal {
            issue_date: today,
            expiration_date: today + Duration::days(years as i64 * DAYS_PER_YEAR),
            duration_years: years,
            annual_fee: self.title_type.annual_fee(),
        })
    }

    /// Applies a renewal; the title becomes approved. Returns the field diff.
    pub fn apply_renewal(&mut self, renewal: &Renewal) -> HashMap<String, FieldChange> {
        let mut changes = HashMap::new();
        diff_field(&mut changes, "issue_date", &self.issue_date, &renewal.issue_date);
        diff_field(
            &mut changes,
            "expiration_date",
            &self.expiration_date,
            &renewal.expiration_date,
        );
        diff_field(
            &mut changes,
            "duration_years",
            &self.duration_years,
            &renewal.duration_years,
        );
        diff_field(&mut changes, "annual_fee", &self.annual_fee, &renewal.annual_fee);

        self.issue_date = renewal.issue_date;
        self.expiration_date = renewal.expiration_date;
        self.duration_years = renewal.duration_years;
        self.annual_fee = renewal.annual_fee;
        self.status = TitleStatus::Approved;
        changes
    }

    /// Applies a partial update and returns the changed fields.
    pub fn apply_update(
        &mut self,
        patch: &UpdateTitleRequest,
    ) -> Result<HashMap<String, FieldChange>, TransitionError> {
        let mut changes = HashMap::new();

        if let Some(description) = &patch.description {
            let new = Some(description.clone());
            diff_field(&mut changes, "description", &self.description, &new);
            self.description = new;
        }
        if let Some(conditions) = &patch.conditions {
            diff_field(&mut changes, "conditions", &self.conditions, conditions);
            self.conditions = conditions.clone();
        }
        if let Some(expiration_date) = patch.expiration_date {
            if expiration_date <= self.issue_date {
                return Err(TransitionError::Invalid(
                    "Expiration date must be after the issue date".into(),
                ));
            }
            diff_field(
                &mut changes,
                "expiration_date",
                &self.expiration_date,
                &expiration_date,
            );
            self.expiration_date = expiration_date;
        }
        if let Some(duration_years) = patch.duration_years {
            diff_field(
                &mut changes,
                "duration_years",
                &self.duration_years,
                &duration_years,
            );
            self.duration_years = duration_years;
        }

        Ok(changes)
    }
}

/// A title about to be inserted. The number is assigned at insert time.
#[derive(Debug, Clone, PartialEq)]
pub struct NewTitle {
    pub title_type: TitleType,
    pub owner_id: Uuid,
    pub description: Option<String>,
    pub issue_date: NaiveDate,
    pub expiration_date: NaiveDate,
    pub duration_years: i32,
    pub status: TitleStatus,
    pub annual_fee: i64,
    pub conditions: Vec<String>,
}

impl NewTitle {
    pub fn from_request(req: &CreateTitleRequest) -> Self {
        Self {
            title_type: req.title_type,
            owner_id: req.owner_id,
            description: req.description.clone(),
            issue_date: req.issue_date,
            expiration_date: req.expiration_date,
            duration_years: req
                .duration_years
                .unwrap_or_else(|| derive_duration_years(req.issue_date, req.expiration_date)),
            status: req.status.unwrap_or(TitleStatus::Pending),
            annual_fee: req.title_type.annual_fee(),
            conditions: req.conditions.clone(),
        }
    }
}

/// Validity in whole years between two dates, at least one.
pub fn derive_duration_years(issue_date: NaiveDate, expiration_date: NaiveDate) -> i32 {
    let days = (expiration_date - issue_date).num_days();
    ((days / DAYS_PER_YEAR) as i32).max(1)
}

/// Request payload for creating a title.
#[derive(Debug, Clone, Deserialize, Validate)]
#[validate(schema(function = "validate_title_dates"))]
pub struct CreateTitleRequest {
    pub title_type: TitleType,

    pub owner_id: Uuid,

    #[validate(length(max = 2000, message = "Description must be at most 2000 characters"))]
    pub description: Option<String>,

    pub issue_date: NaiveDate,

    pub expiration_date: NaiveDate,

    #[validate(range(min = 1, max = 50, message = "Duration must be 1-50 years"))]
    pub duration_years: Option<i32>,

    pub status: Option<TitleStatus>,

    #[serde(default)]
    pub conditions: Vec<String>,
}

fn validate_title_dates(req: &CreateTitleRequest) -> Result<(), validator::ValidationError> {
    if req.expiration_date <= req.issue_date {
        let mut err = validator::ValidationError::new("date_order");
        err.message = Some("Expiration date must be after the issue date".into());
        return Err(err);
    }
    Ok(())
}

/// Request payload for updating a title (partial update).
#[derive(Debug, Clone, Default, Deserialize, Validate)]
pub struct UpdateTitleRequest {
    #[validate(length(max = 2000, message = "Description must be at most 2000 characters"))]
    pub description: Option<String>,

    pub expiration_date: Option<NaiveDate>,

    #[validate(range(min = 1, max = 50, message = "Duration must be 1-50 years"))]
    pub duration_years: Option<i32>,

    pub conditions: Option<Vec<String>>,

    #[validate(length(max = 1000, message = "Comment must be at most 1000 characters"))]
    pub comment: Option<String>,
}

/// Request payload for an explicit status move.
#[derive(Debug, Clone, Deserialize, Validate)]
pub struct TransitionTitleRequest {
    pub status: TitleStatus,

    #[validate(length(max = 1000, message = "Comment must be at most 1000 characters"))]
    pub comment: Option<String>,
}

/// Request payload for suspend/reactivate.
#[derive(Debug, Clone, Default, Deserialize, Validate)]
pub struct TitleActionRequest {
    #[validate(length(max = 1000, message = "Comment must be at most 1000 characters"))]
    pub comment: Option<String>,
}

/// Request payload for renewing a title.
#[derive(Debug, Clone, Default, Deserialize, Validate)]
pub struct RenewTitleRequest {
    #[validate(range(min = 1, max = 10, message = "Duration must be between 1 and 10 years"))]
    pub duration_years: Option<i32>,

    #[validate(length(max = 500, message = "Comment must be at most 500 characters"))]
    pub comment: Option<String>,
}

/// Query parameters for listing titles.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ListTitlesQuery {
    pub status: Option<TitleStatus>,
    pub title_type: Option<TitleType>,
    pub owner_id: Option<Uuid>,
    pub expiring_within_days: Option<i64>,
    pub limit: Option<i64>,
    pub offset: Option<i64>,
}

/// Response payload for a title, with date-derived flags.
#[derive(Debug, Clone, Serialize)]
pub struct TitleResponse {
    #[serde(flatten)]
    pub title: Title,
    pub type_code: &'static str,
    pub is_expired: bool,
    pub days_until_expiration: i64,
    pub is_expiring_soon: bool,
}

impl TitleResponse {
    pub fn new(title: Title, today: NaiveDate) -> Self {
        Self {
            type_code: title.title_type.code(),
            is_expired: title.is_expired_on(today),
            days_until_expiration: title.days_until_expiration(today),
            is_expiring_soon: title.is_expiring_soon(today),
            title,
        }
    }
}

/// Response for listing titles.
#[derive(Debug, Clone, Serialize)]
pub struct ListTitlesResponse {
    pub titles: Vec<TitleResponse>,
    pub total: i64,
}

/// Aggregate title counts.
#[derive(Debug, Clone, Default, Serialize)]
pub struct TitleStatistics {
    pub total: i64,
    pub by_status: HashMap<String, i64>,
    pub by_type: HashMap<String, i64>,
    pub expiring_within_30_days: i64,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    fn sample_title(status: TitleStatus) -> Title {
        Title {
            id: Uuid::new_v4(),
            number: "LT1-2026-0001".into(),
            title_type: TitleType::LicenceType1,
            owner_id: Uuid::new_v4(),
            description: None,
            issue_date: date(2026, 1, 1),
            expiration_date: date(2031, 1, 1),
            duration_years: 5,
            status,
            annual_fee: 500_000,
            conditions: vec!["Coverage in three regions".into()],
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    #[test]
    fn test_type_codes_and_fees() {
        let expected = [
            (TitleType::LicenceType1, "LT1", 500_000),
            (TitleType::LicenceType2, "LT2", 300_000),
            (TitleType::AgrementVendeurs, "AGV", 100_000),
            (TitleType::AgrementInstallateurs, "AGI", 150_000),
            (TitleType::Concessions, "CON", 1_000_000),
            (TitleType::Recepisse, "REC", 50_000),
        ];
        for (title_type, code, fee) in expected {
            assert_eq!(title_type.code(), code);
            assert_eq!(title_type.annual_fee(), fee);
        }
    }

    #[test]
    fn test_title_type_serde_names() {
        let json = serde_json::to_string(&TitleType::LicenceType1).unwrap();
        assert_eq!(json, "\"licence_type_1\"");
        let parsed: TitleType = serde_json::from_str("\"agrement_installateurs\"").unwrap();
        assert_eq!(parsed, TitleType::AgrementInstallateurs);
        assert_eq!("recepisse".parse::<TitleType>().unwrap(), TitleType::Recepisse);
        assert!("licence".parse::<TitleType>().is_err());
    }

    #[test]
    fn test_is_expired_ignores_stored_status() {
        let title = sample_title(TitleStatus::Approved);
        assert!(!title.is_expired_on(date(2031, 1, 1)));
        assert!(title.is_expired_on(date(2031, 1, 2)));

        let rejected = sample_title(TitleStatus::Rejected);
        assert!(rejected.is_expired_on(date(2031, 1, 2)));
    }

    #[test]
    fn test_refresh_expiry_flips_non_terminal_statuses() {
        let after = date(2031, 1, 2);
        for status in [
            TitleStatus::Pending,
            TitleStatus::InReview,
            TitleStatus::Approved,
            TitleStatus::Suspended,
        ] {
            let mut title = sample_title(status);
            assert_eq!(title.refresh_expiry(after), Some(status));
            assert_eq!(title.status, TitleStatus::Expired);
        }
    }

    #[test]
    fn test_refresh_expiry_leaves_terminal_and_current_titles() {
        let mut rejected = sample_title(TitleStatus::Rejected);
        assert_eq!(rejected.refresh_expiry(date(2040, 1, 1)), None);
        assert_eq!(rejected.status, TitleStatus::Rejected);

        let mut current = sample_title(TitleStatus::Approved);
        assert_eq!(current.refresh_expiry(date(2030, 12, 31)), None);
        assert_eq!(current.status, TitleStatus::Approved);
    }

    #[test]
    fn test_days_until_expiration_and_expiring_soon() {
        let title = sample_title(TitleStatus::Approved);
        assert_eq!(title.days_until_expiration(date(2030, 12, 2)), 30);
        assert!(title.is_expiring_soon(date(2030, 12, 2)));
        assert!(!title.is_expiring_soon(date(2030, 12, 1)));
        assert!(title.is_expiring_soon(date(2031, 1, 1)));
        assert!(!title.is_expiring_soon(date(2031, 1, 2)));
    }

    #[test]
    fn test_transition_table() {
        use TitleStatus::*;
        assert_eq!(Pending.transition_action(InReview), Some(HistoryAction::Review));
        assert_eq!(InReview.transition_action(Approved), Some(HistoryAction::Approval));
        assert_eq!(Pending.transition_action(Rejected), Some(HistoryAction::Rejection));
        assert_eq!(Approved.transition_action(Suspended), Some(HistoryAction::Suspension));
        assert_eq!(Suspended.transition_action(Approved), Some(HistoryAction::Reactivation));

        assert_eq!(Rejected.transition_action(Approved), None);
        assert_eq!(Expired.transition_action(Approved), None);
        assert_eq!(Approved.transition_action(Rejected), None);
        assert_eq!(Approved.transition_action(Pending), None);
    }

    #[test]
    fn test_plan_transition_reports_both_states() {
        let title = sample_title(TitleStatus::Rejected);
        let err = title.plan_transition(TitleStatus::Approved).unwrap_err();
        assert_eq!(
            err,
            TransitionError::NotAllowed {
                entity: "title",
                from: "rejected".into(),
                to: "approved".into()
            }
        );
    }

    #[test]
    fn test_renewal_extends_from_today_and_keeps_fee() {
        let mut title = sample_title(TitleStatus::Expired);
        let today = date(2031, 3, 10);

        let renewal = title.plan_renewal(Some(3), today).unwrap();
        assert_eq!(renewal.issue_date, today);
        assert_eq!(renewal.expiration_date, today + Duration::days(3 * 365));
        assert_eq!(renewal.annual_fee, 500_000);

        let changes = title.apply_renewal(&renewal);
        assert_eq!(title.status, TitleStatus::Approved);
        assert_eq!(title.annual_fee, 500_000);
        assert_eq!(title.duration_years, 3);
        assert!(changes.contains_key("expiration_date"));
        assert!(!changes.contains_key("annual_fee"));
    }

    #[test]
    fn test_renewal_defaults_to_current_duration() {
        let title = sample_title(TitleStatus::Approved);
        let renewal = title.plan_renewal(None, date(2026, 6, 1)).unwrap();
        assert_eq!(renewal.duration_years, 5);
        assert_eq!(renewal.expiration_date, date(2026, 6, 1) + Duration::days(5 * 365));
    }

    #[test]
    fn test_renewal_rejected_for_pending_or_out_of_range() {
        let pending = sample_title(TitleStatus::Pending);
        assert!(pending.plan_renewal(Some(2), date(2026, 6, 1)).is_err());

        let approved = sample_title(TitleStatus::Approved);
        assert!(matches!(
            approved.plan_renewal(Some(11), date(2026, 6, 1)),
            Err(TransitionError::Invalid(_))
        ));
    }

    #[test]
    fn test_apply_update_returns_diff() {
        let mut title = sample_title(TitleStatus::Approved);
        let patch = UpdateTitleRequest {
            conditions: Some(vec!["National coverage".into()]),
            duration_years: Some(5),
            ..Default::default()
        };
        let changes = title.apply_update(&patch).unwrap();
        assert_eq!(changes.len(), 1);
        assert!(changes.contains_key("conditions"));
        assert_eq!(title.conditions, vec!["National coverage".to_string()]);
    }

    #[test]
    fn test_apply_update_rejects_expiration_before_issue() {
        let mut title = sample_title(TitleStatus::Approved);
        let patch = UpdateTitleRequest {
            expiration_date: Some(date(2025, 12, 31)),
            ..Default::default()
        };
        assert!(title.apply_update(&patch).is_err());
    }

    #[test]
    fn test_new_title_from_request_derives_fee_and_duration() {
        let req = CreateTitleRequest {
            title_type: TitleType::Concessions,
            owner_id: Uuid::new_v4(),
            description: None,
            issue_date: date(2026, 1, 1),
            expiration_date: date(2029, 1, 1),
            duration_years: None,
            status: None,
            conditions: vec![],
        };
        let new = NewTitle::from_request(&req);
        assert_eq!(new.annual_fee, 1_000_000);
        assert_eq!(new.duration_years, 3);
        assert_eq!(new.status, TitleStatus::Pending);
    }

    #[test]
    fn test_derive_duration_years() {
        assert_eq!(derive_duration_years(date(2026, 1, 1), date(2031, 1, 1)), 5);
        assert_eq!(derive_duration_years(date(2026, 1, 1), date(2026, 3, 1)), 1);
    }

    #[test]
    fn test_create_request_date_validation() {
        let json = r#"{
            "title_type": "licence_type_1",
            "owner_id": "550e8400-e29b-41d4-a716-446655440000",
            "issue_date": "2026-01-01",
            "expiration_date": "2025-01-01"
        }"#;
        let request: CreateTitleRequest = serde_json::from_str(json).unwrap();
        assert!(request.validate().is_err());
        assert!(request.conditions.is_empty());
    }

    #[test]
    fn test_title_response_flags() {
        let title = sample_title(TitleStatus::Approved);
        let response = TitleResponse::new(title, date(2031, 1, 2));
        assert!(response.is_expired);
        assert_eq!(response.days_until_expiration, -1);
        assert_eq!(response.type_code, "LT1");

        let json = serde_json::to_value(&response).unwrap();
        assert_eq!(json["number"], "LT1-2026-0001");
        assert_eq!(json["status"], "approved");
    }
}
