use axum::{middleware, routing::get, Router};
use domain::services::{AuditLogger, ListenerRegistry};
use persistence::repositories::UserRepository;
use sqlx::PgPool;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tower_http::{
    compression::CompressionLayer,
    cors::{Any, CorsLayer},
    timeout::TimeoutLayer,
    trace::TraceLayer,
};

use crate::config::Config;
use crate::middleware::{metrics_handler, metrics_middleware, trace_id};
use crate::routes::{
    audit_logs, email_templates, external_services, fees, health, maintenance, notifications,
    requests, settings, titles, users, webhook_deliveries, webhooks,
};
use crate::services::{
    EmailService, FeeService, HealthProbeService, LifecycleService, MaintenanceService,
    NotificationDispatcher, NotificationListener, PgAuditLogger, ProbeError, SettingsService,
    WebhookDeliveryError, WebhookDeliveryService, WebhookListener,
};

#[derive(Debug, Error)]
pub enum StartupError {
    #[error("Webhook client: {0}")]
    Webhooks(#[from] WebhookDeliveryError),

    #[error("Health probe client: {0}")]
    Probe(#[from] ProbeError),
}

#[derive(Clone)]
pub struct AppState {
    pub pool: PgPool,
    pub config: Arc<Config>,
    pub lifecycle: LifecycleService,
    pub fees: FeeService,
    pub maintenance: MaintenanceService,
    pub settings: SettingsService,
    pub notifications: NotificationDispatcher,
    pub webhooks: WebhookDeliveryService,
    pub probe: HealthProbeService,
    pub audit: Arc<dyn AuditLogger>,
}

impl AppState {
    /// Builds the services and wires the lifecycle listeners.
    pub fn new(config: Config, pool: PgPool) -> Result<Self, StartupError> {
        let config = Arc::new(config);
        let audit: Arc<dyn AuditLogger> = Arc::new(PgAuditLogger::new(pool.clone()));

        let email = Arc::new(EmailService::new(config.email.clone()));
        let notifications = NotificationDispatcher::new(pool.clone(), email);
        let webhooks = WebhookDeliveryService::new(pool.clone(), &config.webhooks)?;
        let probe = HealthProbeService::new(pool.clone(), &config.health)?;

        let listeners = ListenerRegistry::new()
            .with(Arc::new(NotificationListener::new(
                notifications.clone(),
                UserRepository::new(pool.clone()),
            )))
            .with(Arc::new(WebhookListener::new(webhooks.clone())));

        let fees = FeeService::new(pool.clone(), audit.clone());
        let maintenance = MaintenanceService::new(pool.clone(), listeners.clone(), audit.clone());
        let settings = SettingsService::new(pool.clone(), audit.clone());
        let lifecycle = LifecycleService::new(pool.clone(), fees.clone(), listeners, audit.clone());

        Ok(Self {
            pool,
            config,
            lifecycle,
            fees,
            maintenance,
            settings,
            notifications,
            webhooks,
            probe,
            audit,
        })
    }
}

pub fn create_app(config: Config, pool: PgPool) -> Result<Router, StartupError> {
    Ok(create_router(AppState::new(config, pool)?))
}

pub fn create_router(state: AppState) -> Router {
    let config = state.config.clone();

    let cors = if config.security.cors_origins.is_empty() {
        CorsLayer::new()
            .allow_origin(Any)
            .allow_methods(Any)
            .allow_headers(Any)
    } else {
        use tower_http::cors::AllowOrigin;
        let origins: Vec<_> = config
            .security
            .cors_origins
            .iter()
            .filter_map(|o| o.parse().ok())
            .collect();
        CorsLayer::new()
            .allow_origin(AllowOrigin::list(origins))
            .allow_methods(Any)
            .allow_headers(Any)
    };

    let api_routes = Router::new()
        .nest("/users", users::router())
        .nest("/titles", titles::router())
        .nest("/requests", requests::router())
        .nest("/fees", fees::router())
        .nest("/notifications", notifications::router())
        .nest("/email-templates", email_templates::router())
        .nest("/webhooks", webhooks::router())
        .nest("/webhook-deliveries", webhook_deliveries::router())
        .nest("/maintenance", maintenance::router())
        .nest("/settings", settings::router())
        .nest("/audit-logs", audit_logs::router())
        .nest("/external-services", external_services::router());

    let public_routes = Router::new()
        .route("/api/health", get(health::health_check))
        .route("/api/health/ready", get(health::ready))
        .route("/api/health/live", get(health::live))
        .route("/metrics", get(metrics_handler));

    Router::new()
        .merge(public_routes)
        .nest("/api/v1", api_routes)
        // Bottom layers run first
        .layer(CompressionLayer::new())
        .layer(TimeoutLayer::new(Duration::from_secs(
            config.server.request_timeout_secs,
        )))
        .layer(middleware::from_fn(metrics_middleware))
        .layer(TraceLayer::new_for_http())
        .layer(middleware::from_fn(trace_id))
        .layer(cors)
        .with_state(state)
}
