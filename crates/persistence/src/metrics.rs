//! Database metrics collection.

use metrics::{gauge, histogram};
use sqlx::PgPool;
use std::time::Instant;

/// Record the duration of one named query.
pub fn record_query_duration(query_name: &'static str, duration_secs: f64) {
    histogram!("licensing_db_query_duration_seconds", "query" => query_name).record(duration_secs);
}

/// Record connection pool gauges.
///
/// Call this periodically to track pool health.
pub fn record_pool_metrics(pool: &PgPool) {
    let size = pool.size() as usize;
    let idle = pool.num_idle();
    let active = size.saturating_sub(idle);

    gauge!("licensing_db_connections_active").set(active as f64);
    gauge!("licensing_db_connections_idle").set(idle as f64);
    gauge!("licensing_db_connections_total").set(size as f64);
}

/// Work waiting in the back office, exported as gauges.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BacklogSnapshot {
    pub pending_deliveries: i64,
    pub failed_deliveries: i64,
    pub open_requests: i64,
    pub approved_titles: i64,
    pub overdue_fees: i64,
}

pub fn record_backlog_metrics(snapshot: &BacklogSnapshot) {
    gauge!("licensing_webhook_deliveries_pending").set(snapshot.pending_deliveries as f64);
    gauge!("licensing_webhook_deliveries_failed").set(snapshot.failed_deliveries as f64);
    gauge!("licensing_requests_open").set(snapshot.open_requests as f64);
    gauge!("licensing_titles_approved").set(snapshot.approved_titles as f64);
    gauge!("licensing_fees_overdue").set(snapshot.overdue_fees as f64);
}

/// Times a database operation and records it on [`QueryTimer::record`].
///
/// ```ignore
/// let timer = QueryTimer::new("find_title_by_id");
/// let result = sqlx::query_as::<_, TitleEntity>(...).fetch_optional(&pool).await;
/// timer.record();
/// ```
pub struct QueryTimer {
    query_name: &'static str,
    start: Instant,
}

impl QueryTimer {
    pub fn new(query_name: &'static str) -> Self {
        Self {
            query_name,
            start: Instant::now(),
        }
    }

    pub fn record(self) {
        record_query_duration(self.query_name, self.start.elapsed().as_secs_f64());
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_query_timer_keeps_name() {
        let timer = QueryTimer::new("list_titles");
        assert_eq!(timer.query_name, "list_titles");
        timer.record();
    }

    #[test]
    fn test_backlog_metrics_without_recorder() {
        record_backlog_metrics(&BacklogSnapshot {
            pending_deliveries: 2,
            open_requests: 5,
            ..Default::default()
        });
    }
}
