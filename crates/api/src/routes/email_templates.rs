//! Email template management.

use axum::{
    extract::{Path, State},
    response::IntoResponse,
    routing::{get, put},
    Json, Router,
};
use domain::models::notification::UpsertEmailTemplateRequest;
use persistence::repositories::EmailTemplateRepository;
use tracing::info;
use validator::Validate;

use crate::app::AppState;
use crate::error::ApiError;

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/", get(list_templates))
        .route("/:name", put(upsert_template))
}

pub async fn list_templates(State(state): State<AppState>) -> Result<impl IntoResponse, ApiError> {
    let templates = EmailTemplateRepository::new(state.pool.clone()).list().await?;
    Ok(Json(templates))
}

/// PUT /api/v1/email-templates/:name
///
/// Notifications look templates up as `notification_{type}`.
pub async fn upsert_template(
    State(state): State<AppState>,
    Path(name): Path<String>,
    Json(request): Json<UpsertEmailTemplateRequest>,
) -> Result<impl IntoResponse, ApiError> {
    request.validate()?;
    let name = name.trim();
    if name.is_empty() || name.len() > 100 {
        return Err(ApiError::Validation(
            "Template name must be 1-100 characters".to_string(),
        ));
    }

    let template = EmailTemplateRepository::new(state.pool.clone())
        .upsert(name, &request)
        .await?;
    info!(template = %template.name, is_active = template.is_active, "Email template saved");
    Ok(Json(template))
}
