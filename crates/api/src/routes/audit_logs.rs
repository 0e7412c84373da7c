//! Audit log query.

use axum::{
    extract::{Query, State},
    response::IntoResponse,
    routing::get,
    Json, Router,
};
use domain::models::audit_log::{ListAuditLogsQuery, ListAuditLogsResponse};
use persistence::repositories::{AuditLogFilter, AuditLogRepository};
use shared::pagination::{clamp_limit, decode_cursor, encode_cursor};

use crate::app::AppState;
use crate::error::ApiError;

pub fn router() -> Router<AppState> {
    Router::new().route("/", get(list_audit_logs))
}

/// Builds the repository filter from query parameters.
pub fn filter_from_query(query: &ListAuditLogsQuery) -> Result<AuditLogFilter, ApiError> {
    let after = query
        .cursor
        .as_deref()
        .map(decode_cursor)
        .transpose()
        .map_err(|e| ApiError::Validation(e.to_string()))?;

    Ok(AuditLogFilter {
        actor_id: query.actor_id,
        action: query.action.clone(),
        resource_type: query.resource_type.clone(),
        level: query.level,
        after,
        limit: clamp_limit(query.limit),
    })
}

/// GET /api/v1/audit-logs?actor_id=&action=&resource_type=&level=&cursor=&limit=
///
/// Newest first; `next_cursor` is set while more entries remain.
pub async fn list_audit_logs(
    State(state): State<AppState>,
    Query(query): Query<ListAuditLogsQuery>,
) -> Result<impl IntoResponse, ApiError> {
    let filter = filter_from_query(&query)?;
    let (data, has_more) = AuditLogRepository::new(state.pool.clone())
        .list(&filter)
        .await?;

    let next_cursor = if has_more {
        data.last().map(|log| encode_cursor(log.created_at, log.id))
    } else {
        None
    };

    Ok(Json(ListAuditLogsResponse { data, next_cursor }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use uuid::Uuid;

    #[test]
    fn test_filter_decodes_cursor() {
        let now = Utc::now();
        let id = Uuid::new_v4();
        let query = ListAuditLogsQuery {
            cursor: Some(encode_cursor(now, id)),
            limit: Some(10_000),
            ..Default::default()
        };
        let filter = filter_from_query(&query).unwrap();
        let (ts, cursor_id) = filter.after.unwrap();
        assert_eq!(cursor_id, id);
        assert_eq!(ts.timestamp_micros(), now.timestamp_micros());
        assert_eq!(filter.limit, shared::pagination::MAX_PAGE_SIZE);
    }

    #[test]
    fn test_filter_rejects_garbage_cursor() {
        let query = ListAuditLogsQuery {
            cursor: Some("%%%".into()),
            ..Default::default()
        };
        assert!(matches!(filter_from_query(&query), Err(ApiError::Validation(_))));
    }
}
