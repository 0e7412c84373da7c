//! Runtime setting routes.

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::IntoResponse,
    routing::get,
    Json, Router,
};
use domain::models::system_setting::{ListSettingsQuery, ListSettingsResponse, PutSettingRequest};
use validator::Validate;

use crate::app::AppState;
use crate::error::ApiError;
use crate::extractors::Actor;

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/", get(list_settings))
        .route("/:key", get(get_setting).put(put_setting).delete(delete_setting))
}

/// GET /api/v1/settings
pub async fn list_settings(
    State(state): State<AppState>,
    Query(query): Query<ListSettingsQuery>,
) -> Result<impl IntoResponse, ApiError> {
    let settings = state.settings.list(&query).await?;
    Ok(Json(ListSettingsResponse { settings }))
}

pub async fn get_setting(
    State(state): State<AppState>,
    Path(key): Path<String>,
) -> Result<impl IntoResponse, ApiError> {
    Ok(Json(state.settings.get(&key).await?))
}

/// PUT /api/v1/settings/:key
///
/// Creates the setting or replaces its value.
pub async fn put_setting(
    State(state): State<AppState>,
    actor: Actor,
    Path(key): Path<String>,
    Json(request): Json<PutSettingRequest>,
) -> Result<impl IntoResponse, ApiError> {
    request.validate()?;
    Ok(Json(state.settings.put(&key, &request, &actor).await?))
}

pub async fn delete_setting(
    State(state): State<AppState>,
    actor: Actor,
    Path(key): Path<String>,
) -> Result<impl IntoResponse, ApiError> {
    state.settings.delete(&key, &actor).await?;
    Ok(StatusCode::NO_CONTENT)
}
