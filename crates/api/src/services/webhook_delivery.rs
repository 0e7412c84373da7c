//! Webhook delivery service.
//!
//! Fans lifecycle events out to subscribed webhooks, signs and posts each
//! delivery, and keeps the attempt bookkeeping on the delivery row and the
//! webhook counters. Delivery rows are written before the caller returns;
//! the first attempt of each runs on its own task. Every attempt claims its
//! row first; a lost claim means another worker owns the attempt and this one
//! backs off.

use chrono::{Duration as ChronoDuration, Utc};
use domain::models::webhook::WebhookEnvelope;
use domain::models::webhook_delivery::{AttemptKind, DeliveryOutcome};
use domain::models::{Webhook, WebhookDelivery, WebhookEvent};
use persistence::repositories::{WebhookDeliveryRepository, WebhookRepository};
use reqwest::header::{HeaderMap, HeaderName, HeaderValue, CONTENT_TYPE, USER_AGENT};
use reqwest::Client;
use serde_json::{json, Value as JsonValue};
use sqlx::PgPool;
use std::time::{Duration, Instant};
use thiserror::Error;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use crate::config::WebhookConfig;
use crate::middleware::metrics::record_webhook_attempt;

pub const EVENT_HEADER: &str = "x-webhook-event";
pub const DELIVERY_HEADER: &str = "x-webhook-delivery";
pub const SIGNATURE_HEADER: &str = "x-webhook-signature";

/// Errors that can occur during webhook delivery.
#[derive(Error, Debug)]
pub enum WebhookDeliveryError {
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("HTTP client error: {0}")]
    Client(#[from] reqwest::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("{0}")]
    NotFound(String),

    #[error("{0}")]
    Conflict(String),
}

/// Counts from one retry sweep.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RetrySweepReport {
    pub selected: usize,
    pub succeeded: usize,
    pub failed: usize,
    pub finalised: usize,
    pub lost: usize,
}

/// Service for delivering webhooks.
#[derive(Clone)]
pub struct WebhookDeliveryService {
    webhooks: WebhookRepository,
    deliveries: WebhookDeliveryRepository,
    client: Client,
    user_agent: String,
    max_attempts: i32,
}

impl WebhookDeliveryService {
    pub fn new(pool: PgPool, config: &WebhookConfig) -> Result<Self, WebhookDeliveryError> {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()?;

        Ok(Self {
            webhooks: WebhookRepository::new(pool.clone()),
            deliveries: WebhookDeliveryRepository::new(pool),
            client,
            user_agent: config.user_agent.clone(),
            max_attempts: config.max_attempts,
        })
    }

    /// Delivers `event` to every active webhook subscribed to it, or only to
    /// `only` when given.
    ///
    /// Each webhook gets its own delivery record, stored before this returns.
    /// The first attempts run in the background, so a slow subscriber never
    /// holds up the caller; an attempt that never runs is recovered by the
    /// retry sweep. A failure for one webhook never stops the others.
    pub async fn send_webhook(
        &self,
        event: &str,
        payload: JsonValue,
        only: Option<Uuid>,
    ) -> Result<Vec<WebhookDelivery>, WebhookDeliveryError> {
        let queued = self.enqueue(event, payload, only).await?;
        let deliveries = queued.iter().map(|(_, d)| d.clone()).collect();
        for (webhook, delivery) in queued {
            self.spawn_attempt(webhook, delivery);
        }
        Ok(deliveries)
    }

    /// Stores one pending delivery per subscribed webhook.
    async fn enqueue(
        &self,
        event: &str,
        payload: JsonValue,
        only: Option<Uuid>,
    ) -> Result<Vec<(Webhook, WebhookDelivery)>, WebhookDeliveryError> {
        let webhooks = self.webhooks.find_subscribed(event, only).await?;
        if webhooks.is_empty() {
            debug!(event = %event, "No webhooks subscribed");
            return Ok(Vec::new());
        }

        let mut queued = Vec::with_capacity(webhooks.len());
        let subscribed = webhooks.len();
        for webhook in webhooks {
            match self.create_delivery(webhook.id, event, payload.clone()).await {
                Ok(delivery) => queued.push((webhook, delivery)),
                Err(e) => warn!(
                    webhook_id = %webhook.id,
                    event = %event,
                    error = %e,
                    "Failed to store webhook delivery"
                ),
            }
        }

        info!(
            event = %event,
            webhooks = subscribed,
            queued = queued.len(),
            "Webhook event queued"
        );
        Ok(queued)
    }

    fn spawn_attempt(&self, webhook: Webhook, delivery: WebhookDelivery) {
        let service = self.clone();
        tokio::spawn(async move {
            let delivery_id = delivery.id;
            if let Err(e) = service.attempt(&webhook, delivery, AttemptKind::Initial).await {
                error!(
                    webhook_id = %webhook.id,
                    delivery_id = %delivery_id,
                    error = %e,
                    "Webhook delivery failed to run"
                );
            }
        });
    }

    /// Sends a `webhook.test` event to one webhook, whatever its state.
    pub async fn send_test(&self, webhook: &Webhook) -> Result<WebhookDelivery, WebhookDeliveryError> {
        let payload = json!({
            "message": "This is a test delivery",
            "webhook_id": webhook.id,
            "webhook_name": webhook.name,
        });
        let event = WebhookEvent::WebhookTest.as_str();
        let delivery = self.create_delivery(webhook.id, event, payload).await?;
        let id = delivery.id;

        match self.attempt(webhook, delivery, AttemptKind::Initial).await? {
            Some(delivery) => Ok(delivery),
            None => self.reload(id).await,
        }
    }

    async fn create_delivery(
        &self,
        webhook_id: Uuid,
        event: &str,
        payload: JsonValue,
    ) -> Result<WebhookDelivery, WebhookDeliveryError> {
        let delivery = WebhookDelivery::new(webhook_id, event, payload, self.max_attempts, Utc::now());
        Ok(self.deliveries.create(&delivery).await?)
    }

    async fn reload(&self, id: Uuid) -> Result<WebhookDelivery, WebhookDeliveryError> {
        self.deliveries
            .find_by_id(id)
            .await?
            .ok_or_else(|| WebhookDeliveryError::NotFound(format!("Delivery {} not found", id)))
    }

    /// Runs one attempt of `delivery` against `webhook`.
    ///
    /// Returns `None` when another worker claimed the attempt first.
    async fn attempt(
        &self,
        webhook: &Webhook,
        mut delivery: WebhookDelivery,
        kind: AttemptKind,
    ) -> Result<Option<WebhookDelivery>, WebhookDeliveryError> {
        let envelope = WebhookEnvelope::new(&delivery.event, delivery.payload.clone(), delivery.created_at);
        let body = serde_json::to_vec(&envelope)?;
        let headers = build_headers(webhook, &delivery, &self.user_agent, &body);

        if !self.claim(&mut delivery, kind).await? {
            return Ok(None);
        }

        let started = Instant::now();
        let outcome = self.post(&webhook.url, headers, body).await;
        record_webhook_attempt(&delivery.event, &outcome, started.elapsed().as_secs_f64());

        self.finish(&mut delivery, &outcome).await?;

        match &outcome {
            o if o.is_success() => info!(
                webhook_id = %webhook.id,
                delivery_id = %delivery.id,
                event = %delivery.event,
                attempt = delivery.attempts,
                status_code = o.status_code(),
                "Webhook delivered"
            ),
            o => warn!(
                webhook_id = %webhook.id,
                delivery_id = %delivery.id,
                event = %delivery.event,
                attempt = delivery.attempts,
                max_attempts = delivery.max_attempts,
                status_code = o.status_code(),
                error = ?o.error_detail(),
                next_retry = ?delivery.next_retry,
                "Webhook delivery failed"
            ),
        }

        Ok(Some(delivery))
    }

    async fn claim(
        &self,
        delivery: &mut WebhookDelivery,
        kind: AttemptKind,
    ) -> Result<bool, WebhookDeliveryError> {
        let claim = delivery.plan_claim(kind, Utc::now());
        if !self.deliveries.claim(&claim).await? {
            debug!(
                delivery_id = %delivery.id,
                attempts = delivery.attempts,
                "Delivery attempt claimed elsewhere"
            );
            return Ok(false);
        }
        delivery.apply_claim(&claim);
        Ok(true)
    }

    /// Stores the outcome on the delivery and on the webhook counters.
    async fn finish(
        &self,
        delivery: &mut WebhookDelivery,
        outcome: &DeliveryOutcome,
    ) -> Result<(), WebhookDeliveryError> {
        let now = Utc::now();
        delivery.record_outcome(outcome, now);
        if !self.deliveries.save_outcome(delivery).await? {
            warn!(
                delivery_id = %delivery.id,
                attempt = delivery.attempts,
                status = delivery.status.as_str(),
                "Delivery changed during attempt, outcome not stored"
            );
        }

        let counters = match outcome.error_detail() {
            None => self.webhooks.record_success(delivery.webhook_id, now).await,
            Some(detail) => {
                self.webhooks
                    .record_failure(delivery.webhook_id, now, &detail)
                    .await
            }
        };
        if let Err(e) = counters {
            warn!(webhook_id = %delivery.webhook_id, error = %e, "Failed to update webhook counters");
        }
        Ok(())
    }

    async fn post(&self, url: &str, headers: HeaderMap, body: Vec<u8>) -> DeliveryOutcome {
        let response = self.client.post(url).headers(headers).body(body).send().await;
        match response {
            Ok(response) => {
                let status_code = response.status().as_u16();
                let body = response.text().await.unwrap_or_default();
                DeliveryOutcome::Response { status_code, body }
            }
            Err(e) if e.is_timeout() => DeliveryOutcome::Transport {
                error: format!("Request timed out: {}", e),
            },
            Err(e) => DeliveryOutcome::Transport {
                error: e.to_string(),
            },
        }
    }

    /// Attempts every delivery that is due for a retry, up to `batch_size`.
    pub async fn process_due_retries(
        &self,
        batch_size: i64,
    ) -> Result<RetrySweepReport, WebhookDeliveryError> {
        let due = self.deliveries.find_due(Utc::now(), batch_size).await?;
        let mut report = RetrySweepReport {
            selected: due.len(),
            ..Default::default()
        };

        for delivery in due {
            let delivery_id = delivery.id;
            let (result, finalising) = match self.webhooks.find_by_id(delivery.webhook_id).await {
                Ok(Some(webhook)) if webhook.is_deliverable() => {
                    (self.attempt(&webhook, delivery, AttemptKind::Retry).await, false)
                }
                Ok(Some(_)) => (self.finalise(delivery, "Webhook is inactive").await, true),
                Ok(None) => (self.finalise(delivery, "Webhook no longer exists").await, true),
                Err(e) => (Err(e.into()), false),
            };

            match result {
                Ok(Some(_)) if finalising => report.finalised += 1,
                Ok(Some(d)) if d.delivered_at.is_some() => report.succeeded += 1,
                Ok(Some(_)) => report.failed += 1,
                Ok(None) => report.lost += 1,
                Err(e) => {
                    report.failed += 1;
                    error!(delivery_id = %delivery_id, error = %e, "Webhook retry failed to run");
                }
            }
        }

        Ok(report)
    }

    /// Closes a delivery that can no longer be attempted.
    ///
    /// No request is made, so the attempt count stays as it was. Returns
    /// `None` when the row changed since the sweep read it.
    async fn finalise(
        &self,
        mut delivery: WebhookDelivery,
        reason: &str,
    ) -> Result<Option<WebhookDelivery>, WebhookDeliveryError> {
        let expected_status = delivery.status;
        let outcome = DeliveryOutcome::Skipped {
            reason: reason.to_string(),
        };
        delivery.record_outcome(&outcome, Utc::now());
        if !self.deliveries.save_skip(&delivery, expected_status).await? {
            debug!(delivery_id = %delivery.id, "Delivery changed before it could be closed");
            return Ok(None);
        }
        record_webhook_attempt(&delivery.event, &outcome, 0.0);
        info!(
            delivery_id = %delivery.id,
            webhook_id = %delivery.webhook_id,
            attempts = delivery.attempts,
            reason = %reason,
            "Webhook delivery finalised without attempt"
        );
        Ok(Some(delivery))
    }

    /// Resets a settled delivery's attempt budget and attempts it once more.
    ///
    /// A delivery that is queued or has an attempt in flight is a conflict.
    pub async fn retrigger(&self, delivery_id: Uuid) -> Result<WebhookDelivery, WebhookDeliveryError> {
        let mut delivery = self.reload(delivery_id).await?;
        if !delivery.is_settled() {
            return Err(WebhookDeliveryError::Conflict(format!(
                "Delivery {} is already being attempted",
                delivery_id
            )));
        }
        let webhook = self
            .webhooks
            .find_by_id(delivery.webhook_id)
            .await?
            .ok_or_else(|| {
                WebhookDeliveryError::NotFound(format!("Webhook {} not found", delivery.webhook_id))
            })?;

        let (expected_attempts, expected_status) = (delivery.attempts, delivery.status);
        delivery.reset_for_manual_retry(Utc::now());
        if !self
            .deliveries
            .save_reset(&delivery, expected_attempts, expected_status)
            .await?
        {
            return Err(WebhookDeliveryError::Conflict(format!(
                "Delivery {} changed while being reset",
                delivery_id
            )));
        }

        info!(delivery_id = %delivery_id, webhook_id = %webhook.id, "Webhook delivery retriggered");
        match self.attempt(&webhook, delivery, AttemptKind::Initial).await? {
            Some(delivery) => Ok(delivery),
            None => Err(WebhookDeliveryError::Conflict(format!(
                "Delivery {} is already being attempted",
                delivery_id
            ))),
        }
    }

    /// Deletes finished deliveries older than `retention_days`.
    pub async fn cleanup(&self, retention_days: i64) -> Result<u64, WebhookDeliveryError> {
        let cutoff = Utc::now() - ChronoDuration::days(retention_days);
        let deleted = self.deliveries.delete_finished_before(cutoff).await?;
        if deleted > 0 {
            info!(deleted = deleted, retention_days = retention_days, "Old webhook deliveries deleted");
        }
        Ok(deleted)
    }
}

/// Headers of one delivery attempt.
///
/// Base headers first, then the webhook's custom headers over them, then the
/// signature over `body` when the webhook has a secret.
pub fn build_headers(
    webhook: &Webhook,
    delivery: &WebhookDelivery,
    user_agent: &str,
    body: &[u8],
) -> HeaderMap {
    let mut headers = HeaderMap::new();
    headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
    if let Ok(value) = HeaderValue::from_str(user_agent) {
        headers.insert(USER_AGENT, value);
    }
    if let Ok(value) = HeaderValue::from_str(&delivery.event) {
        headers.insert(EVENT_HEADER, value);
    }
    if let Ok(value) = HeaderValue::from_str(&delivery.id.to_string()) {
        headers.insert(DELIVERY_HEADER, value);
    }

    for (name, value) in &webhook.headers {
        match (
            HeaderName::from_bytes(name.as_bytes()),
            HeaderValue::from_str(value),
        ) {
            (Ok(name), Ok(value)) => {
                headers.insert(name, value);
            }
            _ => warn!(webhook_id = %webhook.id, header = %name, "Skipping invalid custom header"),
        }
    }

    if let Some(secret) = webhook.secret.as_deref().filter(|s| !s.is_empty()) {
        match shared::crypto::sign_hmac_sha256(secret, body) {
            Ok(signature) => {
                if let Ok(value) = HeaderValue::from_str(&signature) {
                    headers.insert(SIGNATURE_HEADER, value);
                }
            }
            Err(e) => warn!(webhook_id = %webhook.id, error = %e, "Failed to sign webhook payload"),
        }
    }

    headers
}

#[cfg(test)]
mod tests {
    use super::*;
    use domain::models::webhook::WebhookStatus;
    use hmac::{Hmac, Mac};
    use sha2::Sha256;
    use std::collections::HashMap;

    fn webhook(secret: Option<&str>, headers: &[(&str, &str)]) -> Webhook {
        Webhook {
            id: Uuid::new_v4(),
            name: "Registry sync".into(),
            url: "https://hooks.example/licensing".into(),
            description: None,
            events: vec!["request.approved".into()],
            secret: secret.map(String::from),
            headers: headers
                .iter()
                .map(|(k, v)| (k.to_string(), v.to_string()))
                .collect::<HashMap<_, _>>(),
            status: WebhookStatus::Active,
            is_active: true,
            success_count: 0,
            failure_count: 0,
            last_success: None,
            last_failure: None,
            last_error: None,
            created_by: None,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    fn delivery(webhook_id: Uuid) -> WebhookDelivery {
        WebhookDelivery::new(
            webhook_id,
            "request.approved",
            json!({"file_number": "DEM-LT1-2026-0001"}),
            3,
            Utc::now(),
        )
    }

    fn hmac_hex(secret: &str, body: &[u8]) -> String {
        let mut mac = Hmac::<Sha256>::new_from_slice(secret.as_bytes()).unwrap();
        mac.update(body);
        hex::encode(mac.finalize().into_bytes())
    }

    #[test]
    fn test_base_headers() {
        let hook = webhook(None, &[]);
        let d = delivery(hook.id);
        let headers = build_headers(&hook, &d, "TelecomLicensing-Webhook/1.0", b"{}");

        assert_eq!(headers[CONTENT_TYPE], "application/json");
        assert_eq!(headers[USER_AGENT], "TelecomLicensing-Webhook/1.0");
        assert_eq!(headers[EVENT_HEADER], "request.approved");
        assert_eq!(headers[DELIVERY_HEADER], d.id.to_string().as_str());
        assert!(headers.get(SIGNATURE_HEADER).is_none());
    }

    #[test]
    fn test_custom_headers_override_base() {
        let hook = webhook(None, &[("User-Agent", "custom/2.0"), ("X-Tenant", "acme")]);
        let d = delivery(hook.id);
        let headers = build_headers(&hook, &d, "TelecomLicensing-Webhook/1.0", b"{}");

        assert_eq!(headers[USER_AGENT], "custom/2.0");
        assert_eq!(headers["x-tenant"], "acme");
    }

    #[test]
    fn test_invalid_custom_header_is_skipped() {
        let hook = webhook(None, &[("bad header", "x"), ("X-Ok", "yes")]);
        let d = delivery(hook.id);
        let headers = build_headers(&hook, &d, "ua", b"{}");

        assert_eq!(headers["x-ok"], "yes");
        assert_eq!(headers.len(), 5);
    }

    #[test]
    fn test_signature_covers_exact_body() {
        let hook = webhook(Some("s3cret"), &[("X-Webhook-Signature", "forged")]);
        let d = delivery(hook.id);
        let body = serde_json::to_vec(&WebhookEnvelope::new(&d.event, d.payload.clone(), d.created_at)).unwrap();
        let headers = build_headers(&hook, &d, "ua", &body);

        let signature = headers[SIGNATURE_HEADER].to_str().unwrap();
        assert_eq!(signature, hmac_hex("s3cret", &body));

        let mut tampered = body.clone();
        tampered[0] = b' ';
        assert_ne!(signature, hmac_hex("s3cret", &tampered));
        assert!(shared::crypto::verify_hmac_sha256("s3cret", &body, signature));
    }

    #[test]
    fn test_envelope_is_stable_across_attempts() {
        let d = delivery(Uuid::new_v4());
        let first = serde_json::to_vec(&WebhookEnvelope::new(&d.event, d.payload.clone(), d.created_at)).unwrap();
        let second = serde_json::to_vec(&WebhookEnvelope::new(&d.event, d.payload.clone(), d.created_at)).unwrap();
        assert_eq!(first, second);

        let value: JsonValue = serde_json::from_slice(&first).unwrap();
        assert_eq!(value["event"], "request.approved");
        assert_eq!(value["data"]["file_number"], "DEM-LT1-2026-0001");
        assert!(value["timestamp"].is_string());
    }
}
