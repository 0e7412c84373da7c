//! Title repository.
//!
//! Every status change is written together with its history entry in one
//! transaction. Updates are guarded by `updated_at` so a concurrent writer
//! surfaces as "not saved" instead of a lost update.

use chrono::{Duration, NaiveDate};
use domain::models::title::{ListTitlesQuery, TitleStatistics, EXPIRING_SOON_DAYS};
use domain::models::{
    HistoryAction, HistoryEntry, HistorySubject, NewHistoryEntry, NewTitle, Title, TitleStatus,
};
use domain::services::{collision_backoff, NumberScope, MAX_NUMBER_ATTEMPTS};
use rand::Rng;
use sqlx::{FromRow, PgConnection, PgPool};
use tracing::warn;
use uuid::Uuid;

use super::history::insert_history;
use crate::entities::{decode_text, TitleEntity};
use crate::metrics::QueryTimer;

const NUMBER_CONSTRAINT: &str = "titles_number_key";

/// A title flipped to expired, with the status it had before.
#[derive(Debug, Clone, FromRow)]
struct ExpiredTitleRow {
    #[sqlx(flatten)]
    title: TitleEntity,
    previous_status: String,
}

/// Repository for title operations.
#[derive(Clone)]
pub struct TitleRepository {
    pool: PgPool,
}

impl TitleRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Inserts a title with the next free number of its (type, year) scope and
    /// its creation history entry.
    ///
    /// A number taken by a concurrent insert is retried with a fresh sequence
    /// up to three times; after that the unique violation is returned as is.
    pub async fn create(
        &self,
        new: &NewTitle,
        year: i32,
        actor_id: Option<Uuid>,
    ) -> Result<(Title, HistoryEntry), sqlx::Error> {
        let scope = NumberScope::title(new.title_type, year);
        let mut attempt = 1;
        loop {
            match self.try_create(new, &scope, actor_id).await {
                Err(e) if is_number_collision(&e) && attempt < MAX_NUMBER_ATTEMPTS => {
                    warn!(attempt, scope = %scope.prefix(), "Title number collision, retrying");
                    wait_before_retry(attempt).await;
                    attempt += 1;
                }
                result => return result,
            }
        }
    }

    async fn try_create(
        &self,
        new: &NewTitle,
        scope: &NumberScope,
        actor_id: Option<Uuid>,
    ) -> Result<(Title, HistoryEntry), sqlx::Error> {
        let mut tx = self.pool.begin().await?;
        lock_scope(&mut tx, scope).await?;

        let existing: Vec<String> =
            sqlx::query_scalar(r#"SELECT number FROM titles WHERE number LIKE $1"#)
                .bind(scope.like_pattern())
                .fetch_all(&mut *tx)
                .await?;
        let number = scope.next_number(existing.iter().map(String::as_str));

        let timer = QueryTimer::new("insert_title");
        let entity = sqlx::query_as::<_, TitleEntity>(
            r#"
            INSERT INTO titles (id, number, title_type, owner_id, description, issue_date,
                                expiration_date, duration_years, status, annual_fee, conditions)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11)
            RETURNING id, number, title_type, owner_id, description, issue_date, expiration_date,
                      duration_years, status, annual_fee, conditions, created_at, updated_at
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(&number)
        .bind(new.title_type.as_str())
        .bind(new.owner_id)
        .bind(&new.description)
        .bind(new.issue_date)
        .bind(new.expiration_date)
        .bind(new.duration_years)
        .bind(new.status.as_str())
        .bind(new.annual_fee)
        .bind(&new.conditions)
        .fetch_one(&mut *tx)
        .await;
        timer.record();
        let title: Title = entity?.try_into()?;

        let entry = NewHistoryEntry::new(HistorySubject::Title, title.id, HistoryAction::Creation)
            .by(actor_id)
            .status_change(None, title.status.as_str())
            .with_comment(Some(format!("Title {} created", title.number)));
        let history = insert_history(&mut tx, &entry).await?;

        tx.commit().await?;
        Ok((title, history))
    }

    pub async fn find_by_id(&self, id: Uuid) -> Result<Option<Title>, sqlx::Error> {
        let timer = QueryTimer::new("find_title_by_id");
        let entity = sqlx::query_as::<_, TitleEntity>(
            r#"
            SELECT id, number, title_type, owner_id, description, issue_date, expiration_date,
                   duration_years, status, annual_fee, conditions, created_at, updated_at
            FROM titles
            WHERE id = $1
            "#,
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await;
        timer.record();

        entity?.map(Title::try_from).transpose()
    }

    /// Persists a modified title and its history entry atomically.
    ///
    /// Returns `None` when the row changed since `title` was read.
    pub async fn save_with_history(
        &self,
        title: &Title,
        entry: &NewHistoryEntry,
    ) -> Result<Option<(Title, HistoryEntry)>, sqlx::Error> {
        let mut tx = self.pool.begin().await?;

        let timer = QueryTimer::new("update_title");
        let entity = sqlx::query_as::<_, TitleEntity>(
            r#"
            UPDATE titles
            SET description = $3,
                issue_date = $4,
                expiration_date = $5,
                duration_years = $6,
                status = $7,
                annual_fee = $8,
                conditions = $9,
                updated_at = NOW()
            WHERE id = $1 AND updated_at = $2
            RETURNING id, number, title_type, owner_id, description, issue_date, expiration_date,
                      duration_years, status, annual_fee, conditions, created_at, updated_at
            "#,
        )
        .bind(title.id)
        .bind(title.updated_at)
        .bind(&title.description)
        .bind(title.issue_date)
        .bind(title.expiration_date)
        .bind(title.duration_years)
        .bind(title.status.as_str())
        .bind(title.annual_fee)
        .bind(&title.conditions)
        .fetch_optional(&mut *tx)
        .await;
        timer.record();

        let Some(entity) = entity? else {
            return Ok(None);
        };
        let saved: Title = entity.try_into()?;
        let history = insert_history(&mut tx, entry).await?;

        tx.commit().await?;
        Ok(Some((saved, history)))
    }

    /// Flips every non-terminal title whose expiration date is before `today`
    /// to expired, writing one system history entry per title.
    ///
    /// `only` narrows the sweep to one title. Returns the expired titles with
    /// their previous status.
    pub async fn expire_due(
        &self,
        today: NaiveDate,
        only: Option<Uuid>,
    ) -> Result<Vec<(Title, TitleStatus)>, sqlx::Error> {
        let mut tx = self.pool.begin().await?;

        let timer = QueryTimer::new("expire_due_titles");
        let rows = sqlx::query_as::<_, ExpiredTitleRow>(
            r#"
            WITH due AS (
                SELECT id, status
                FROM titles
                WHERE expiration_date < $1
                  AND status NOT IN ('expired', 'rejected')
                  AND ($2::uuid IS NULL OR id = $2)
                FOR UPDATE
            )
            UPDATE titles t
            SET status = 'expired', updated_at = NOW()
            FROM due
            WHERE t.id = due.id
            RETURNING t.id, t.number, t.title_type, t.owner_id, t.description, t.issue_date,
                      t.expiration_date, t.duration_years, t.status, t.annual_fee, t.conditions,
                      t.created_at, t.updated_at, due.status AS previous_status
            "#,
        )
        .bind(today)
        .bind(only)
        .fetch_all(&mut *tx)
        .await;
        timer.record();

        let mut expired = Vec::new();
        for row in rows? {
            let previous: TitleStatus = decode_text("previous_status", &row.previous_status)?;
            let title: Title = row.title.try_into()?;
            let entry =
                NewHistoryEntry::new(HistorySubject::Title, title.id, HistoryAction::Expiration)
                    .status_change(Some(previous.as_str()), TitleStatus::Expired.as_str())
                    .with_comment(Some(format!(
                        "Title expired on {}",
                        title.expiration_date
                    )));
            insert_history(&mut tx, &entry).await?;
            expired.push((title, previous));
        }

        tx.commit().await?;
        Ok(expired)
    }

    /// Lists titles matching the query, newest first, with the total count.
    pub async fn list(
        &self,
        query: &ListTitlesQuery,
        today: NaiveDate,
        limit: i64,
        offset: i64,
    ) -> Result<(Vec<Title>, i64), sqlx::Error> {
        let status = query.status.map(|s| s.as_str());
        let title_type = query.title_type.map(|t| t.as_str());
        let expiring_before = query
            .expiring_within_days
            .map(|days| today + Duration::days(days.max(0)));

        let timer = QueryTimer::new("count_titles");
        let total: i64 = sqlx::query_scalar(
            r#"
            SELECT COUNT(*)
            FROM titles
            WHERE ($1::text IS NULL OR status = $1)
              AND ($2::text IS NULL OR title_type = $2)
              AND ($3::uuid IS NULL OR owner_id = $3)
              AND ($4::date IS NULL OR expiration_date BETWEEN $5 AND $4)
            "#,
        )
        .bind(status)
        .bind(title_type)
        .bind(query.owner_id)
        .bind(expiring_before)
        .bind(today)
        .fetch_one(&self.pool)
        .await?;
        timer.record();

        let timer = QueryTimer::new("list_titles");
        let entities = sqlx::query_as::<_, TitleEntity>(
            r#"
            SELECT id, number, title_type, owner_id, description, issue_date, expiration_date,
                   duration_years, status, annual_fee, conditions, created_at, updated_at
            FROM titles
            WHERE ($1::text IS NULL OR status = $1)
              AND ($2::text IS NULL OR title_type = $2)
              AND ($3::uuid IS NULL OR owner_id = $3)
              AND ($4::date IS NULL OR expiration_date BETWEEN $5 AND $4)
            ORDER BY created_at DESC, id DESC
            LIMIT $6 OFFSET $7
            "#,
        )
        .bind(status)
        .bind(title_type)
        .bind(query.owner_id)
        .bind(expiring_before)
        .bind(today)
        .bind(limit)
        .bind(offset)
        .fetch_all(&self.pool)
        .await;
        timer.record();

        let titles = entities?
            .into_iter()
            .map(Title::try_from)
            .collect::<Result<Vec<_>, _>>()?;
        Ok((titles, total))
    }

    /// Approved titles expiring exactly on `date`.
    pub async fn find_approved_expiring_on(
        &self,
        date: NaiveDate,
    ) -> Result<Vec<Title>, sqlx::Error> {
        let timer = QueryTimer::new("find_approved_expiring_on");
        let entities = sqlx::query_as::<_, TitleEntity>(
            r#"
            SELECT id, number, title_type, owner_id, description, issue_date, expiration_date,
                   duration_years, status, annual_fee, conditions, created_at, updated_at
            FROM titles
            WHERE status = 'approved' AND expiration_date = $1
            ORDER BY number
            "#,
        )
        .bind(date)
        .fetch_all(&self.pool)
        .await;
        timer.record();

        entities?.into_iter().map(Title::try_from).collect()
    }

    /// Approved titles without a fee record for `year`.
    pub async fn find_approved_without_fee(&self, year: i32) -> Result<Vec<Title>, sqlx::Error> {
        let timer = QueryTimer::new("find_approved_without_fee");
        let entities = sqlx::query_as::<_, TitleEntity>(
            r#"
            SELECT t.id, t.number, t.title_type, t.owner_id, t.description, t.issue_date,
                   t.expiration_date, t.duration_years, t.status, t.annual_fee, t.conditions,
                   t.created_at, t.updated_at
            FROM titles t
            WHERE t.status = 'approved'
              AND NOT EXISTS (
                  SELECT 1 FROM fee_records f WHERE f.title_id = t.id AND f.year = $1
              )
            ORDER BY t.number
            "#,
        )
        .bind(year)
        .fetch_all(&self.pool)
        .await;
        timer.record();

        entities?.into_iter().map(Title::try_from).collect()
    }

    /// Counts per status and per type, plus approved titles expiring soon.
    pub async fn statistics(&self, today: NaiveDate) -> Result<TitleStatistics, sqlx::Error> {
        let timer = QueryTimer::new("title_statistics");
        let by_status: Vec<(String, i64)> =
            sqlx::query_as(r#"SELECT status, COUNT(*) FROM titles GROUP BY status"#)
                .fetch_all(&self.pool)
                .await?;
        let by_type: Vec<(String, i64)> =
            sqlx::query_as(r#"SELECT title_type, COUNT(*) FROM titles GROUP BY title_type"#)
                .fetch_all(&self.pool)
                .await?;
        let expiring: i64 = sqlx::query_scalar(
            r#"
            SELECT COUNT(*)
            FROM titles
            WHERE status = 'approved' AND expiration_date BETWEEN $1 AND $2
            "#,
        )
        .bind(today)
        .bind(today + Duration::days(EXPIRING_SOON_DAYS))
        .fetch_one(&self.pool)
        .await?;
        timer.record();

        let mut stats = TitleStatistics {
            total: by_status.iter().map(|(_, n)| n).sum(),
            expiring_within_30_days: expiring,
            ..Default::default()
        };
        for status in TitleStatus::ALL {
            stats.by_status.insert(status.as_str().to_string(), 0);
        }
        stats.by_status.extend(by_status);
        stats.by_type.extend(by_type);
        Ok(stats)
    }

    pub async fn count_by_status(&self, status: TitleStatus) -> Result<i64, sqlx::Error> {
        sqlx::query_scalar(r#"SELECT COUNT(*) FROM titles WHERE status = $1"#)
            .bind(status.as_str())
            .fetch_one(&self.pool)
            .await
    }
}

/// True when `err` is a unique violation on the given constraint.
pub(crate) fn is_unique_violation_on(err: &sqlx::Error, constraint: &str) -> bool {
    match err {
        sqlx::Error::Database(db) => {
            db.code().as_deref() == Some("23505") && db.constraint() == Some(constraint)
        }
        _ => false,
    }
}

/// Serialises number allocation in `scope` until the transaction ends.
pub(crate) async fn lock_scope(
    conn: &mut PgConnection,
    scope: &NumberScope,
) -> Result<(), sqlx::Error> {
    sqlx::query(r#"SELECT pg_advisory_xact_lock(hashtext($1))"#)
        .bind(scope.lock_key())
        .execute(&mut *conn)
        .await?;
    Ok(())
}

pub(crate) async fn wait_before_retry(attempt: u32) {
    let jitter = rand::thread_rng().gen_range(0..20);
    tokio::time::sleep(collision_backoff(attempt, jitter)).await;
}

fn is_number_collision(err: &sqlx::Error) -> bool {
    is_unique_violation_on(err, NUMBER_CONSTRAINT)
}
