//! Prometheus metrics middleware.
//!
//! HTTP request metrics, the business counters recorded by the service
//! layer, and the `/metrics` exporter.

use axum::{
    body::Body,
    extract::MatchedPath,
    http::{header, Method, Request, StatusCode},
    middleware::Next,
    response::{IntoResponse, Response},
};
use metrics::{counter, gauge, histogram};
use metrics_exporter_prometheus::{BuildError, PrometheusBuilder, PrometheusHandle};
use std::sync::OnceLock;
use std::time::Instant;

use domain::models::{DeliveryOutcome, HealthStatus};

static PROMETHEUS_HANDLE: OnceLock<PrometheusHandle> = OnceLock::new();

/// Records the following metrics:
/// - `http_requests_total`: Counter with labels (method, path, status)
/// - `http_request_duration_seconds`: Histogram with labels (method, path)
pub async fn metrics_middleware(req: Request<Body>, next: Next) -> Response {
    let start = Instant::now();
    let method = method_to_str(req.method());
    let path = req
        .extensions()
        .get::<MatchedPath>()
        .map(|p| p.as_str().to_string())
        .unwrap_or_else(|| req.uri().path().to_string());

    let response = next.run(req).await;

    let duration = start.elapsed().as_secs_f64();
    let status = response.status().as_u16().to_string();

    counter!(
        "http_requests_total",
        "method" => method,
        "path" => path.clone(),
        "status" => status
    )
    .increment(1);

    histogram!(
        "http_request_duration_seconds",
        "method" => method,
        "path" => path
    )
    .record(duration);

    response
}

/// Convert HTTP method to string for metric labels.
fn method_to_str(method: &Method) -> &'static str {
    match *method {
        Method::GET => "GET",
        Method::POST => "POST",
        Method::PUT => "PUT",
        Method::DELETE => "DELETE",
        Method::PATCH => "PATCH",
        Method::HEAD => "HEAD",
        Method::OPTIONS => "OPTIONS",
        _ => "OTHER",
    }
}

fn outcome_label(outcome: &DeliveryOutcome) -> &'static str {
    match outcome {
        _ if outcome.is_success() => "success",
        DeliveryOutcome::Response { .. } => "http_error",
        DeliveryOutcome::Transport { .. } => "transport_error",
        DeliveryOutcome::Skipped { .. } => "skipped",
    }
}

/// One webhook delivery attempt, by event and outcome.
pub fn record_webhook_attempt(event: &str, outcome: &DeliveryOutcome, duration_secs: f64) {
    let outcome = outcome_label(outcome);
    counter!(
        "webhook_delivery_attempts_total",
        "event" => event.to_string(),
        "outcome" => outcome
    )
    .increment(1);
    histogram!("webhook_delivery_duration_seconds", "outcome" => outcome).record(duration_secs);
}

/// Result of one external service probe.
pub fn record_health_probe(service: &str, status: HealthStatus, response_time_ms: Option<i64>) {
    gauge!("external_service_up", "service" => service.to_string()).set(status.gauge_value());
    if let Some(ms) = response_time_ms {
        histogram!("external_service_response_seconds", "service" => service.to_string())
            .record(ms as f64 / 1000.0);
    }
}

pub fn record_notification_created(notification_type: &'static str) {
    counter!("notifications_created_total", "type" => notification_type).increment(1);
}

pub fn record_email(result: &'static str) {
    counter!("notification_emails_total", "result" => result).increment(1);
}

/// Renders the Prometheus text format.
pub async fn metrics_handler() -> impl IntoResponse {
    match PROMETHEUS_HANDLE.get() {
        Some(handle) => (
            StatusCode::OK,
            [(header::CONTENT_TYPE, "text/plain; version=0.0.4")],
            handle.render(),
        ),
        None => (
            StatusCode::SERVICE_UNAVAILABLE,
            [(header::CONTENT_TYPE, "text/plain")],
            "Metrics not initialized".to_string(),
        ),
    }
}

/// Installs the global Prometheus recorder.
///
/// Must run once at startup, before any metric is recorded. A second call
/// keeps the first handle.
pub fn init_metrics() -> Result<(), BuildError> {
    if PROMETHEUS_HANDLE.get().is_some() {
        return Ok(());
    }

    let handle = PrometheusBuilder::new()
        .set_buckets(&[0.001, 0.005, 0.01, 0.05, 0.1, 0.2, 0.5, 1.0, 2.0, 5.0, 30.0])?
        .install_recorder()?;

    let _ = PROMETHEUS_HANDLE.set(handle);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_method_to_str() {
        assert_eq!(method_to_str(&Method::GET), "GET");
        assert_eq!(method_to_str(&Method::POST), "POST");
        assert_eq!(method_to_str(&Method::PATCH), "PATCH");
        assert_eq!(method_to_str(&Method::DELETE), "DELETE");
        assert_eq!(method_to_str(&Method::TRACE), "OTHER");
    }

    #[test]
    fn test_outcome_labels() {
        let ok = DeliveryOutcome::Response {
            status_code: 204,
            body: String::new(),
        };
        let err = DeliveryOutcome::Response {
            status_code: 500,
            body: "boom".into(),
        };
        let transport = DeliveryOutcome::Transport {
            error: "connection refused".into(),
        };
        assert_eq!(outcome_label(&ok), "success");
        assert_eq!(outcome_label(&err), "http_error");
        assert_eq!(outcome_label(&transport), "transport_error");
    }

    #[test]
    fn test_recording_without_recorder_is_noop() {
        record_webhook_attempt("title.created", &DeliveryOutcome::Transport { error: "x".into() }, 0.1);
        record_health_probe("registry", HealthStatus::Up, Some(12));
        record_notification_created("info");
        record_email("sent");
    }
}
