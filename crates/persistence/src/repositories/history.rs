//! History entry repository.
//!
//! History is append-only; the table rejects UPDATE and DELETE.

use domain::models::{HistoryEntry, HistorySubject, NewHistoryEntry};
use sqlx::types::Json;
use sqlx::{PgConnection, PgPool};
use uuid::Uuid;

use crate::entities::HistoryEntryEntity;
use crate::metrics::QueryTimer;

/// Repository for history entries of titles and requests.
#[derive(Clone)]
pub struct HistoryRepository {
    pool: PgPool,
}

impl HistoryRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Appends one entry outside of any status change.
    pub async fn append(&self, entry: &NewHistoryEntry) -> Result<HistoryEntry, sqlx::Error> {
        let mut conn = self.pool.acquire().await?;
        insert_history(&mut conn, entry).await
    }

    /// All entries of one title or request, oldest first.
    pub async fn list_for_subject(
        &self,
        subject: HistorySubject,
        subject_id: Uuid,
    ) -> Result<Vec<HistoryEntry>, sqlx::Error> {
        let timer = QueryTimer::new("list_history_for_subject");
        let entities = sqlx::query_as::<_, HistoryEntryEntity>(
            r#"
            SELECT id, subject, subject_id, action, actor_id, old_status, new_status,
                   comment, changes, created_at
            FROM history_entries
            WHERE subject = $1 AND subject_id = $2
            ORDER BY created_at ASC, id ASC
            "#,
        )
        .bind(subject.as_str())
        .bind(subject_id)
        .fetch_all(&self.pool)
        .await;
        timer.record();

        entities?.into_iter().map(HistoryEntry::try_from).collect()
    }
}

/// Inserts a history entry on an existing connection or transaction.
pub(crate) async fn insert_history(
    conn: &mut PgConnection,
    entry: &NewHistoryEntry,
) -> Result<HistoryEntry, sqlx::Error> {
    let timer = QueryTimer::new("insert_history_entry");
    let entity = sqlx::query_as::<_, HistoryEntryEntity>(
        r#"
        INSERT INTO history_entries
            (id, subject, subject_id, action, actor_id, old_status, new_status, comment, changes)
        VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)
        RETURNING id, subject, subject_id, action, actor_id, old_status, new_status,
                  comment, changes, created_at
        "#,
    )
    .bind(Uuid::new_v4())
    .bind(entry.subject.as_str())
    .bind(entry.subject_id)
    .bind(entry.action.as_str())
    .bind(entry.actor_id)
    .bind(&entry.old_status)
    .bind(&entry.new_status)
    .bind(&entry.comment)
    .bind(Json(&entry.changes))
    .fetch_one(&mut *conn)
    .await;
    timer.record();

    entity?.try_into()
}
