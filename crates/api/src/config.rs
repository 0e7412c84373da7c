use serde::Deserialize;
use std::collections::HashMap;
use std::net::SocketAddr;

#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub server: ServerConfig,
    pub database: DatabaseConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
    #[serde(default)]
    pub security: SecurityConfig,
    /// Email delivery configuration
    #[serde(default)]
    pub email: EmailConfig,
    /// Outbound and inbound webhook configuration
    #[serde(default)]
    pub webhooks: WebhookConfig,
    #[serde(default)]
    pub notifications: NotificationConfig,
    /// External service health probe configuration
    #[serde(default)]
    pub health: HealthProbeConfig,
    #[serde(default)]
    pub jobs: JobsConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    #[serde(default = "default_host")]
    pub host: String,

    #[serde(default = "default_port")]
    pub port: u16,

    #[serde(default = "default_request_timeout")]
    pub request_timeout_secs: u64,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            request_timeout_secs: default_request_timeout(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct DatabaseConfig {
    #[serde(default)]
    pub url: String,

    #[serde(default = "default_max_connections")]
    pub max_connections: u32,

    #[serde(default = "default_min_connections")]
    pub min_connections: u32,

    #[serde(default = "default_connect_timeout")]
    pub connect_timeout_secs: u64,

    #[serde(default = "default_idle_timeout")]
    pub idle_timeout_secs: u64,
}

impl DatabaseConfig {
    /// Pool settings in the shape the persistence crate expects.
    pub fn pool_config(&self) -> persistence::db::DatabaseConfig {
        persistence::db::DatabaseConfig {
            url: self.url.clone(),
            max_connections: self.max_connections,
            min_connections: self.min_connections,
            connect_timeout_secs: self.connect_timeout_secs,
            idle_timeout_secs: self.idle_timeout_secs,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct LoggingConfig {
    #[serde(default = "default_log_level")]
    pub level: String,

    /// json or pretty
    #[serde(default = "default_log_format")]
    pub format: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            format: default_log_format(),
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct SecurityConfig {
    /// Allowed CORS origins; empty allows any origin.
    #[serde(default)]
    pub cors_origins: Vec<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct EmailConfig {
    /// Whether email sending is enabled
    #[serde(default)]
    pub enabled: bool,

    /// Email provider: console (development) or sendgrid
    #[serde(default = "default_email_provider")]
    pub provider: String,

    /// SendGrid API key (for sendgrid provider)
    #[serde(default)]
    pub sendgrid_api_key: String,

    /// SendGrid send endpoint
    #[serde(default = "default_sendgrid_url")]
    pub sendgrid_url: String,

    /// Sender email address (From header)
    #[serde(default = "default_sender_email")]
    pub sender_email: String,

    /// Sender name (From header)
    #[serde(default = "default_sender_name")]
    pub sender_name: String,

    /// Base URL of the back office, appended to emails
    #[serde(default)]
    pub base_url: String,
}

impl Default for EmailConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            provider: default_email_provider(),
            sendgrid_api_key: String::new(),
            sendgrid_url: default_sendgrid_url(),
            sender_email: default_sender_email(),
            sender_name: default_sender_name(),
            base_url: String::new(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct WebhookConfig {
    /// Per-request timeout of an outbound delivery
    #[serde(default = "default_webhook_timeout")]
    pub timeout_secs: u64,

    /// Attempts per delivery before it is permanently failed
    #[serde(default = "default_max_attempts")]
    pub max_attempts: i32,

    /// Deliveries picked up per retry sweep
    #[serde(default = "default_retry_batch_size")]
    pub retry_batch_size: i64,

    /// Finished deliveries older than this are deleted
    #[serde(default = "default_webhook_retention_days")]
    pub retention_days: i64,

    #[serde(default = "default_webhook_user_agent")]
    pub user_agent: String,

    /// Shared secrets of inbound webhook sources, by source tag.
    /// A source without a secret is accepted unsigned.
    #[serde(default)]
    pub inbound_secrets: HashMap<String, String>,
}

impl Default for WebhookConfig {
    fn default() -> Self {
        Self {
            timeout_secs: default_webhook_timeout(),
            max_attempts: default_max_attempts(),
            retry_batch_size: default_retry_batch_size(),
            retention_days: default_webhook_retention_days(),
            user_agent: default_webhook_user_agent(),
            inbound_secrets: HashMap::new(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct NotificationConfig {
    /// Days before expiry at which warnings are sent
    #[serde(default = "default_expiration_warning_days")]
    pub expiration_warning_days: Vec<i64>,

    /// Staff are emailed only for warnings at or below this many days
    #[serde(default = "default_email_warning_threshold")]
    pub email_warning_threshold_days: i64,

    /// Read notifications older than this are deleted
    #[serde(default = "default_read_retention_days")]
    pub read_retention_days: i64,
}

impl Default for NotificationConfig {
    fn default() -> Self {
        Self {
            expiration_warning_days: default_expiration_warning_days(),
            email_warning_threshold_days: default_email_warning_threshold(),
            read_retention_days: default_read_retention_days(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct HealthProbeConfig {
    #[serde(default = "default_probe_interval")]
    pub probe_interval_minutes: u64,

    #[serde(default = "default_probe_timeout")]
    pub timeout_secs: u64,

    #[serde(default = "default_probe_user_agent")]
    pub user_agent: String,
}

impl Default for HealthProbeConfig {
    fn default() -> Self {
        Self {
            probe_interval_minutes: default_probe_interval(),
            timeout_secs: default_probe_timeout(),
            user_agent: default_probe_user_agent(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct JobsConfig {
    /// Whether background jobs run in this process
    #[serde(default = "default_true")]
    pub enabled: bool,
}

impl Default for JobsConfig {
    fn default() -> Self {
        Self { enabled: true }
    }
}

// Default value functions
fn default_host() -> String {
    "0.0.0.0".to_string()
}
fn default_port() -> u16 {
    8080
}
fn default_request_timeout() -> u64 {
    30
}
fn default_max_connections() -> u32 {
    20
}
fn default_min_connections() -> u32 {
    2
}
fn default_connect_timeout() -> u64 {
    10
}
fn default_idle_timeout() -> u64 {
    600
}
fn default_log_level() -> String {
    "info".to_string()
}
fn default_log_format() -> String {
    "json".to_string()
}
fn default_true() -> bool {
    true
}

fn default_email_provider() -> String {
    "console".to_string()
}

fn default_sendgrid_url() -> String {
    "https://api.sendgrid.com/v3/mail/send".to_string()
}

fn default_sender_email() -> String {
    "noreply@licensing.example".to_string()
}

fn default_sender_name() -> String {
    "Telecom Licensing".to_string()
}

fn default_webhook_timeout() -> u64 {
    30
}
fn default_max_attempts() -> i32 {
    domain::models::webhook_delivery::DEFAULT_MAX_ATTEMPTS
}
fn default_retry_batch_size() -> i64 {
    50
}
fn default_webhook_retention_days() -> i64 {
    30
}
fn default_webhook_user_agent() -> String {
    "TelecomLicensing-Webhook/1.0".to_string()
}

fn default_expiration_warning_days() -> Vec<i64> {
    domain::services::notification::EXPIRATION_WARNING_DAYS.to_vec()
}
fn default_email_warning_threshold() -> i64 {
    domain::services::notification::EMAIL_WARNING_THRESHOLD_DAYS
}
fn default_read_retention_days() -> i64 {
    90
}

fn default_probe_interval() -> u64 {
    15
}
fn default_probe_timeout() -> u64 {
    30
}
fn default_probe_user_agent() -> String {
    "TelecomLicensing-HealthCheck/1.0".to_string()
}

/// Configuration validation error
#[derive(Debug, thiserror::Error)]
pub enum ConfigValidationError {
    #[error("Missing required configuration: {0}")]
    MissingRequired(String),

    #[error("Invalid configuration value: {0}")]
    InvalidValue(String),
}

impl Config {
    /// Load configuration from files and environment variables.
    ///
    /// Loading order (later sources override earlier):
    /// 1. config/default.toml - base configuration with defaults
    /// 2. config/local.toml - local overrides (optional, not in git)
    /// 3. Environment variables with LIC__ prefix
    pub fn load() -> Result<Self, config::ConfigError> {
        let config = config::Config::builder()
            .add_source(config::File::with_name("config/default"))
            .add_source(config::File::with_name("config/local").required(false))
            .add_source(
                config::Environment::with_prefix("LIC")
                    .separator("__")
                    .list_separator(",")
                    .with_list_parse_key("security.cors_origins")
                    .with_list_parse_key("notifications.expiration_warning_days")
                    .try_parsing(true),
            )
            .build()?;

        let cfg: Self = config.try_deserialize()?;
        cfg.validate()
            .map_err(|e| config::ConfigError::Message(e.to_string()))?;
        Ok(cfg)
    }

    /// Load configuration for testing with custom overrides.
    ///
    /// Builds the config from embedded defaults and overrides only, so tests
    /// do not depend on the working directory. Validation is skipped.
    pub fn load_for_test(overrides: &[(&str, &str)]) -> Result<Self, config::ConfigError> {
        let defaults = r#"
            [server]
            host = "127.0.0.1"
            port = 8080
            request_timeout_secs = 30

            [database]
            url = ""
            max_connections = 5
            min_connections = 0
            connect_timeout_secs = 2
            idle_timeout_secs = 600

            [logging]
            level = "info"
            format = "pretty"

            [security]
            cors_origins = []

            [email]
            enabled = false
            provider = "console"
            sender_email = "test@licensing.example"
            sender_name = "Test"

            [webhooks]
            timeout_secs = 5
            max_attempts = 3
            retry_batch_size = 10
            retention_days = 30

            [notifications]
            expiration_warning_days = [30, 15, 7, 1]
            email_warning_threshold_days = 7
            read_retention_days = 90

            [health]
            probe_interval_minutes = 15
            timeout_secs = 5

            [jobs]
            enabled = false
        "#;

        let mut builder = config::Config::builder()
            .add_source(config::File::from_str(defaults, config::FileFormat::Toml));

        for (key, value) in overrides {
            builder = builder.set_override(*key, *value)?;
        }

        builder.build()?.try_deserialize()
    }

    /// Validate configuration values.
    pub fn validate(&self) -> Result<(), ConfigValidationError> {
        if self.database.url.is_empty() {
            return Err(ConfigValidationError::MissingRequired(
                "LIC__DATABASE__URL environment variable must be set".to_string(),
            ));
        }

        if self.server.port == 0 {
            return Err(ConfigValidationError::InvalidValue(
                "Server port cannot be 0".to_string(),
            ));
        }

        if self.database.min_connections > self.database.max_connections {
            return Err(ConfigValidationError::InvalidValue(
                "min_connections cannot exceed max_connections".to_string(),
            ));
        }

        if self.notifications.expiration_warning_days.is_empty() {
            return Err(ConfigValidationError::InvalidValue(
                "notifications.expiration_warning_days cannot be empty".to_string(),
            ));
        }

        if self.webhooks.max_attempts < 1 {
            return Err(ConfigValidationError::InvalidValue(
                "webhooks.max_attempts must be at least 1".to_string(),
            ));
        }

        if !matches!(self.email.provider.as_str(), "console" | "sendgrid") {
            return Err(ConfigValidationError::InvalidValue(format!(
                "Unknown email provider: {}",
                self.email.provider
            )));
        }

        Ok(())
    }

    pub fn socket_addr(&self) -> Result<SocketAddr, ConfigValidationError> {
        format!("{}:{}", self.server.host, self.server.port)
            .parse()
            .map_err(|e| {
                ConfigValidationError::InvalidValue(format!("Invalid socket address: {}", e))
            })
    }
}
