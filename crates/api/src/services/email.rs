//! Email delivery for notifications.
//!
//! Supports two providers:
//! - `console`: Logs emails (development)
//! - `sendgrid`: Uses the SendGrid v3 API

use async_trait::async_trait;
use domain::services::{EmailSendError, EmailSender, OutgoingEmail};
use serde_json::json;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, error, info};

use crate::config::EmailConfig;

const SENDGRID_TIMEOUT: Duration = Duration::from_secs(30);

/// Email service backed by the configured provider.
#[derive(Clone)]
pub struct EmailService {
    config: Arc<EmailConfig>,
    client: reqwest::Client,
}

impl EmailService {
    pub fn new(config: EmailConfig) -> Self {
        let client = reqwest::Client::builder()
            .timeout(SENDGRID_TIMEOUT)
            .build()
            .unwrap_or_default();
        Self {
            config: Arc::new(config),
            client,
        }
    }

    /// Appends the back-office link, when configured, to the plain text body.
    fn with_footer(&self, mut email: OutgoingEmail) -> OutgoingEmail {
        if !self.config.base_url.is_empty() {
            email
                .body_text
                .push_str(&format!("\n\n--\n{}", self.config.base_url));
        }
        email
    }

    async fn send_console(&self, email: OutgoingEmail) -> Result<(), EmailSendError> {
        info!(
            to = %email.to,
            to_name = ?email.to_name,
            subject = %email.subject,
            from = %self.config.sender_email,
            "Email (console provider)"
        );
        debug!(body_text = %email.body_text, "Email body");
        Ok(())
    }

    fn sendgrid_body(&self, email: &OutgoingEmail) -> serde_json::Value {
        let mut to = json!({ "email": email.to });
        if let Some(name) = &email.to_name {
            to["name"] = json!(name);
        }

        let mut content = vec![json!({ "type": "text/plain", "value": email.body_text })];
        if let Some(html) = &email.body_html {
            content.push(json!({ "type": "text/html", "value": html }));
        }

        json!({
            "personalizations": [{ "to": [to] }],
            "from": {
                "email": self.config.sender_email,
                "name": self.config.sender_name
            },
            "subject": email.subject,
            "content": content
        })
    }

    async fn send_sendgrid(&self, email: OutgoingEmail) -> Result<(), EmailSendError> {
        if self.config.sendgrid_api_key.is_empty() {
            return Err(EmailSendError::Configuration(
                "SendGrid API key is not set".into(),
            ));
        }

        let response = self
            .client
            .post(&self.config.sendgrid_url)
            .bearer_auth(&self.config.sendgrid_api_key)
            .json(&self.sendgrid_body(&email))
            .send()
            .await
            .map_err(|e| EmailSendError::Unavailable(format!("SendGrid request failed: {}", e)))?;

        let status = response.status();
        if status.is_success() {
            info!(to = %email.to, subject = %email.subject, "Email sent via SendGrid");
            return Ok(());
        }

        let error_body = response.text().await.unwrap_or_default();
        error!(status = %status, error = %error_body, "SendGrid API error");
        let detail = format!("SendGrid returned {}: {}", status, error_body);
        if status.is_server_error() {
            Err(EmailSendError::Unavailable(detail))
        } else {
            Err(EmailSendError::Rejected(detail))
        }
    }
}

#[async_trait]
impl EmailSender for EmailService {
    fn is_enabled(&self) -> bool {
        self.config.enabled
    }

    async fn send_email(&self, email: OutgoingEmail) -> Result<(), EmailSendError> {
        let email = self.with_footer(email);
        match self.config.provider.as_str() {
            "console" => self.send_console(email).await,
            "sendgrid" => self.send_sendgrid(email).await,
            provider => Err(EmailSendError::Configuration(format!(
                "Unknown email provider: {}",
                provider
            ))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::{http::HeaderMap, routing::post, Json, Router};
    use tokio::sync::mpsc;

    fn test_config() -> EmailConfig {
        EmailConfig {
            enabled: true,
            provider: "console".to_string(),
            sender_email: "licences@regulator.example".to_string(),
            sender_name: "Licensing".to_string(),
            ..Default::default()
        }
    }

    fn email() -> OutgoingEmail {
        OutgoingEmail {
            to: "ops@acme.example".into(),
            to_name: Some("Acme Ops".into()),
            subject: "Request DEM-LT1-2026-0001 received".into(),
            body_text: "Hello".into(),
            body_html: Some("<p>Hello</p>".into()),
        }
    }

    #[tokio::test]
    async fn test_console_provider_succeeds() {
        let service = EmailService::new(test_config());
        assert!(service.is_enabled());
        assert!(service.send_email(email()).await.is_ok());
    }

    #[tokio::test]
    async fn test_unknown_provider_is_configuration_error() {
        let service = EmailService::new(EmailConfig {
            provider: "carrier-pigeon".into(),
            ..test_config()
        });
        assert!(matches!(
            service.send_email(email()).await,
            Err(EmailSendError::Configuration(_))
        ));
    }

    #[tokio::test]
    async fn test_sendgrid_without_key_is_configuration_error() {
        let service = EmailService::new(EmailConfig {
            provider: "sendgrid".into(),
            ..test_config()
        });
        assert!(matches!(
            service.send_email(email()).await,
            Err(EmailSendError::Configuration(_))
        ));
    }

    #[test]
    fn test_sendgrid_body_shape() {
        let service = EmailService::new(test_config());
        let body = service.sendgrid_body(&email());
        assert_eq!(body["personalizations"][0]["to"][0]["email"], "ops@acme.example");
        assert_eq!(body["personalizations"][0]["to"][0]["name"], "Acme Ops");
        assert_eq!(body["from"]["email"], "licences@regulator.example");
        assert_eq!(body["content"][0]["type"], "text/plain");
        assert_eq!(body["content"][1]["type"], "text/html");
    }

    #[test]
    fn test_footer_appended_when_base_url_set() {
        let service = EmailService::new(EmailConfig {
            base_url: "https://licensing.example".into(),
            ..test_config()
        });
        let email = service.with_footer(email());
        assert!(email.body_text.ends_with("https://licensing.example"));
    }

    async fn spawn_sendgrid(status: u16) -> (String, mpsc::UnboundedReceiver<(HeaderMap, serde_json::Value)>) {
        let (tx, rx) = mpsc::unbounded_channel();
        let app = Router::new().route(
            "/v3/mail/send",
            post(move |headers: HeaderMap, Json(body): Json<serde_json::Value>| {
                let tx = tx.clone();
                async move {
                    let _ = tx.send((headers, body));
                    axum::http::StatusCode::from_u16(status).unwrap()
                }
            }),
        );
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });
        (format!("http://{}/v3/mail/send", addr), rx)
    }

    #[tokio::test]
    async fn test_sendgrid_posts_with_bearer_key() {
        let (url, mut rx) = spawn_sendgrid(202).await;
        let service = EmailService::new(EmailConfig {
            provider: "sendgrid".into(),
            sendgrid_api_key: "SG.test".into(),
            sendgrid_url: url,
            ..test_config()
        });

        service.send_email(email()).await.unwrap();

        let (headers, body) = rx.recv().await.unwrap();
        assert_eq!(headers["authorization"], "Bearer SG.test");
        assert_eq!(body["subject"], "Request DEM-LT1-2026-0001 received");
    }

    #[tokio::test]
    async fn test_sendgrid_error_status_is_classified() {
        let (url, _rx) = spawn_sendgrid(400).await;
        let service = EmailService::new(EmailConfig {
            provider: "sendgrid".into(),
            sendgrid_api_key: "SG.test".into(),
            sendgrid_url: url,
            ..test_config()
        });
        assert!(matches!(
            service.send_email(email()).await,
            Err(EmailSendError::Rejected(_))
        ));

        let (url, _rx) = spawn_sendgrid(503).await;
        let service = EmailService::new(EmailConfig {
            provider: "sendgrid".into(),
            sendgrid_api_key: "SG.test".into(),
            sendgrid_url: url,
            ..test_config()
        });
        assert!(matches!(
            service.send_email(email()).await,
            Err(EmailSendError::Unavailable(_))
        ));
    }
}
