//! Watched external services and their health checks.

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::IntoResponse,
    routing::{get, post},
    Json, Router,
};
use domain::models::external_service::CreateExternalServiceRequest;
use serde::Deserialize;
use uuid::Uuid;
use validator::Validate;

use crate::app::AppState;
use crate::error::ApiError;

const DEFAULT_CHECK_HISTORY: i64 = 50;

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/", get(list_services).post(create_service))
        .route("/:id/check", post(check_service))
        .route("/:id/checks", get(list_checks))
}

#[derive(Debug, Default, Deserialize)]
pub struct ListServicesQuery {
    pub active_only: Option<bool>,
}

#[derive(Debug, Default, Deserialize)]
pub struct ListChecksQuery {
    pub limit: Option<i64>,
}

pub async fn create_service(
    State(state): State<AppState>,
    Json(request): Json<CreateExternalServiceRequest>,
) -> Result<impl IntoResponse, ApiError> {
    request.validate()?;
    let service = state.probe.create(&request).await?;
    Ok((StatusCode::CREATED, Json(service)))
}

pub async fn list_services(
    State(state): State<AppState>,
    Query(query): Query<ListServicesQuery>,
) -> Result<impl IntoResponse, ApiError> {
    let services = state.probe.list(query.active_only.unwrap_or(false)).await?;
    Ok(Json(services))
}

/// POST /api/v1/external-services/:id/check
///
/// Probes the service now and returns the stored check.
pub async fn check_service(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<impl IntoResponse, ApiError> {
    Ok(Json(state.probe.check_by_id(id).await?))
}

pub async fn list_checks(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Query(query): Query<ListChecksQuery>,
) -> Result<impl IntoResponse, ApiError> {
    let limit = query.limit.unwrap_or(DEFAULT_CHECK_HISTORY).clamp(1, 500);
    Ok(Json(state.probe.checks(id, limit).await?))
}
