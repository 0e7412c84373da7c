//! Licence request repository.

use chrono::{DateTime, Duration, Utc};
use domain::models::license_request::{ListRequestsQuery, RequestStatistics, OVERDUE_AFTER_DAYS};
use domain::models::{
    HistoryAction, HistoryEntry, HistorySubject, LicenseRequest, NewHistoryEntry,
    NewLicenseRequest, RequestStatus,
};
use domain::services::{NumberScope, MAX_NUMBER_ATTEMPTS};
use sqlx::PgPool;
use tracing::warn;
use uuid::Uuid;

use super::history::insert_history;
use super::title::{is_unique_violation_on, lock_scope, wait_before_retry};
use crate::entities::LicenseRequestEntity;
use crate::metrics::QueryTimer;

const FILE_NUMBER_CONSTRAINT: &str = "license_requests_file_number_key";

/// Repository for licence request operations.
#[derive(Clone)]
pub struct LicenseRequestRepository {
    pool: PgPool,
}

impl LicenseRequestRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Inserts a submitted request with the next free file number and its
    /// submission history entry. Number collisions are retried up to three
    /// times.
    pub async fn create(
        &self,
        new: &NewLicenseRequest,
        year: i32,
    ) -> Result<(LicenseRequest, HistoryEntry), sqlx::Error> {
        let scope = NumberScope::request(new.title_type, year);
        let mut attempt = 1;
        loop {
            match self.try_create(new, &scope).await {
                Err(e)
                    if is_unique_violation_on(&e, FILE_NUMBER_CONSTRAINT)
                        && attempt < MAX_NUMBER_ATTEMPTS =>
                {
                    warn!(attempt, scope = %scope.prefix(), "Request number collision, retrying");
                    wait_before_retry(attempt).await;
                    attempt += 1;
                }
                result => return result,
            }
        }
    }

    async fn try_create(
        &self,
        new: &NewLicenseRequest,
        scope: &NumberScope,
    ) -> Result<(LicenseRequest, HistoryEntry), sqlx::Error> {
        let mut tx = self.pool.begin().await?;
        lock_scope(&mut tx, scope).await?;

        let existing: Vec<String> = sqlx::query_scalar(
            r#"SELECT file_number FROM license_requests WHERE file_number LIKE $1"#,
        )
        .bind(scope.like_pattern())
        .fetch_all(&mut *tx)
        .await?;
        let file_number = scope.next_number(existing.iter().map(String::as_str));

        let timer = QueryTimer::new("insert_license_request");
        let entity = sqlx::query_as::<_, LicenseRequestEntity>(
            r#"
            INSERT INTO license_requests (id, file_number, requester_id, company, contact_email,
                                          phone, address, title_type, description, justification,
                                          status, document_urls)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, 'submitted', $11)
            RETURNING id, file_number, requester_id, company, contact_email, phone, address,
                      title_type, description, justification, status, admin_comments,
                      assignee_id, document_urls, submission_date, processing_date, updated_at
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(&file_number)
        .bind(new.requester_id)
        .bind(&new.company)
        .bind(&new.contact_email)
        .bind(&new.phone)
        .bind(&new.address)
        .bind(new.title_type.as_str())
        .bind(&new.description)
        .bind(&new.justification)
        .bind(&new.document_urls)
        .fetch_one(&mut *tx)
        .await;
        timer.record();
        let request: LicenseRequest = entity?.try_into()?;

        let entry = NewHistoryEntry::new(
            HistorySubject::Request,
            request.id,
            HistoryAction::Submission,
        )
        .by(Some(request.requester_id))
        .status_change(None, request.status.as_str())
        .with_comment(Some(format!("Request {} submitted", request.file_number)));
        let history = insert_history(&mut tx, &entry).await?;

        tx.commit().await?;
        Ok((request, history))
    }

    pub async fn find_by_id(&self, id: Uuid) -> Result<Option<LicenseRequest>, sqlx::Error> {
        let timer = QueryTimer::new("find_license_request_by_id");
        let entity = sqlx::query_as::<_, LicenseRequestEntity>(
            r#"
            SELECT id, file_number, requester_id, company, contact_email, phone, address,
                   title_type, description, justification, status, admin_comments,
                   assignee_id, document_urls, submission_date, processing_date, updated_at
            FROM license_requests
            WHERE id = $1
            "#,
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await;
        timer.record();

        entity?.map(LicenseRequest::try_from).transpose()
    }

    /// Persists a modified request and its history entry atomically.
    ///
    /// Returns `None` when the row changed since `request` was read.
    pub async fn save_with_history(
        &self,
        request: &LicenseRequest,
        entry: &NewHistoryEntry,
    ) -> Result<Option<(LicenseRequest, HistoryEntry)>, sqlx::Error> {
        let mut tx = self.pool.begin().await?;

        let timer = QueryTimer::new("update_license_request");
        let entity = sqlx::query_as::<_, LicenseRequestEntity>(
            r#"
            UPDATE license_requests
            SET company = $3,
                contact_email = $4,
                phone = $5,
                address = $6,
                description = $7,
                justification = $8,
                status = $9,
                admin_comments = $10,
                assignee_id = $11,
                document_urls = $12,
                processing_date = $13,
                updated_at = NOW()
            WHERE id = $1 AND updated_at = $2
            RETURNING id, file_number, requester_id, company, contact_email, phone, address,
                      title_type, description, justification, status, admin_comments,
                      assignee_id, document_urls, submission_date, processing_date, updated_at
            "#,
        )
        .bind(request.id)
        .bind(request.updated_at)
        .bind(&request.company)
        .bind(&request.contact_email)
        .bind(&request.phone)
        .bind(&request.address)
        .bind(&request.description)
        .bind(&request.justification)
        .bind(request.status.as_str())
        .bind(&request.admin_comments)
        .bind(request.assignee_id)
        .bind(&request.document_urls)
        .bind(request.processing_date)
        .fetch_optional(&mut *tx)
        .await;
        timer.record();

        let Some(entity) = entity? else {
            return Ok(None);
        };
        let saved: LicenseRequest = entity.try_into()?;
        let history = insert_history(&mut tx, entry).await?;

        tx.commit().await?;
        Ok(Some((saved, history)))
    }

    /// Lists requests matching the query, newest first, with the total count.
    pub async fn list(
        &self,
        query: &ListRequestsQuery,
        now: DateTime<Utc>,
        limit: i64,
        offset: i64,
    ) -> Result<(Vec<LicenseRequest>, i64), sqlx::Error> {
        let status = query.status.map(|s| s.as_str());
        let title_type = query.title_type.map(|t| t.as_str());
        let overdue_cutoff = now - Duration::days(OVERDUE_AFTER_DAYS);
        let search = query
            .search
            .as_deref()
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(|s| format!("%{}%", s.replace('%', "\\%").replace('_', "\\_")));

        let timer = QueryTimer::new("count_license_requests");
        let total: i64 = sqlx::query_scalar(
            r#"
            SELECT COUNT(*)
            FROM license_requests
            WHERE ($1::text IS NULL OR status = $1)
              AND ($2::text IS NULL OR title_type = $2)
              AND ($3::uuid IS NULL OR requester_id = $3)
              AND ($4::uuid IS NULL OR assignee_id = $4)
              AND ($5::bool IS NULL
                   OR $5 = (status IN ('submitted', 'in_review') AND submission_date < $6))
              AND ($7::text IS NULL OR company ILIKE $7 OR file_number ILIKE $7)
            "#,
        )
        .bind(status)
        .bind(title_type)
        .bind(query.requester_id)
        .bind(query.assignee_id)
        .bind(query.overdue)
        .bind(overdue_cutoff)
        .bind(&search)
        .fetch_one(&self.pool)
        .await?;
        timer.record();

        let timer = QueryTimer::new("list_license_requests");
        let entities = sqlx::query_as::<_, LicenseRequestEntity>(
            r#"
            SELECT id, file_number, requester_id, company, contact_email, phone, address,
                   title_type, description, justification, status, admin_comments,
                   assignee_id, document_urls, submission_date, processing_date, updated_at
            FROM license_requests
            WHERE ($1::text IS NULL OR status = $1)
              AND ($2::text IS NULL OR title_type = $2)
              AND ($3::uuid IS NULL OR requester_id = $3)
              AND ($4::uuid IS NULL OR assignee_id = $4)
              AND ($5::bool IS NULL
                   OR $5 = (status IN ('submitted', 'in_review') AND submission_date < $6))
              AND ($7::text IS NULL OR company ILIKE $7 OR file_number ILIKE $7)
            ORDER BY submission_date DESC, id DESC
            LIMIT $8 OFFSET $9
            "#,
        )
        .bind(status)
        .bind(title_type)
        .bind(query.requester_id)
        .bind(query.assignee_id)
        .bind(query.overdue)
        .bind(overdue_cutoff)
        .bind(&search)
        .bind(limit)
        .bind(offset)
        .fetch_all(&self.pool)
        .await;
        timer.record();

        let requests = entities?
            .into_iter()
            .map(LicenseRequest::try_from)
            .collect::<Result<Vec<_>, _>>()?;
        Ok((requests, total))
    }

    /// Open requests submitted more than 30 days before `now`, oldest first.
    pub async fn find_overdue(&self, now: DateTime<Utc>) -> Result<Vec<LicenseRequest>, sqlx::Error> {
        let timer = QueryTimer::new("find_overdue_license_requests");
        let entities = sqlx::query_as::<_, LicenseRequestEntity>(
            r#"
            SELECT id, file_number, requester_id, company, contact_email, phone, address,
                   title_type, description, justification, status, admin_comments,
                   assignee_id, document_urls, submission_date, processing_date, updated_at
            FROM license_requests
            WHERE status IN ('submitted', 'in_review') AND submission_date < $1
            ORDER BY submission_date ASC
            "#,
        )
        .bind(now - Duration::days(OVERDUE_AFTER_DAYS))
        .fetch_all(&self.pool)
        .await;
        timer.record();

        entities?.into_iter().map(LicenseRequest::try_from).collect()
    }

    pub async fn count_open(&self) -> Result<i64, sqlx::Error> {
        sqlx::query_scalar(
            r#"SELECT COUNT(*) FROM license_requests WHERE status IN ('submitted', 'in_review')"#,
        )
        .fetch_one(&self.pool)
        .await
    }

    /// Counts per status and type, overdue count and mean processing time.
    pub async fn statistics(&self, now: DateTime<Utc>) -> Result<RequestStatistics, sqlx::Error> {
        let timer = QueryTimer::new("license_request_statistics");
        let by_status: Vec<(String, i64)> =
            sqlx::query_as(r#"SELECT status, COUNT(*) FROM license_requests GROUP BY status"#)
                .fetch_all(&self.pool)
                .await?;
        let by_type: Vec<(String, i64)> = sqlx::query_as(
            r#"SELECT title_type, COUNT(*) FROM license_requests GROUP BY title_type"#,
        )
        .fetch_all(&self.pool)
        .await?;
        let (overdue, average_processing_days): (i64, Option<f64>) = sqlx::query_as(
            r#"
            SELECT
                COUNT(*) FILTER (
                    WHERE status IN ('submitted', 'in_review') AND submission_date < $1
                ),
                (AVG(EXTRACT(EPOCH FROM (processing_date - submission_date)) / 86400.0)
                    FILTER (WHERE processing_date IS NOT NULL))::float8
            FROM license_requests
            "#,
        )
        .bind(now - Duration::days(OVERDUE_AFTER_DAYS))
        .fetch_one(&self.pool)
        .await?;
        timer.record();

        let mut stats = RequestStatistics {
            total: by_status.iter().map(|(_, n)| n).sum(),
            overdue,
            average_processing_days,
            ..Default::default()
        };
        for status in RequestStatus::ALL {
            stats.by_status.insert(status.as_str().to_string(), 0);
        }
        stats.by_status.extend(by_status);
        stats.by_type.extend(by_type);
        Ok(stats)
    }
}
