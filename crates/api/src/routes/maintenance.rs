//! Maintenance window routes.

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::IntoResponse,
    routing::{get, post},
    Json, Router,
};
use domain::models::maintenance::{
    ListMaintenanceQuery, ListMaintenanceResponse, ScheduleMaintenanceRequest,
};
use uuid::Uuid;
use validator::Validate;

use crate::app::AppState;
use crate::error::ApiError;
use crate::extractors::Actor;

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/", get(list_maintenances).post(schedule_maintenance))
        .route("/active", get(active_maintenances))
        .route("/:id", get(get_maintenance))
        .route("/:id/start", post(start_maintenance))
        .route("/:id/complete", post(complete_maintenance))
        .route("/:id/cancel", post(cancel_maintenance))
}

/// POST /api/v1/maintenance
pub async fn schedule_maintenance(
    State(state): State<AppState>,
    actor: Actor,
    Json(request): Json<ScheduleMaintenanceRequest>,
) -> Result<impl IntoResponse, ApiError> {
    request.validate()?;
    let maintenance = state.maintenance.schedule(&request, &actor).await?;
    Ok((StatusCode::CREATED, Json(maintenance)))
}

/// GET /api/v1/maintenance
pub async fn list_maintenances(
    State(state): State<AppState>,
    Query(query): Query<ListMaintenanceQuery>,
) -> Result<impl IntoResponse, ApiError> {
    let (maintenances, total) = state.maintenance.list(&query).await?;
    Ok(Json(ListMaintenanceResponse {
        maintenances,
        total,
    }))
}

/// GET /api/v1/maintenance/active
pub async fn active_maintenances(
    State(state): State<AppState>,
) -> Result<impl IntoResponse, ApiError> {
    Ok(Json(state.maintenance.active().await?))
}

pub async fn get_maintenance(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<impl IntoResponse, ApiError> {
    Ok(Json(state.maintenance.get(id).await?))
}

/// POST /api/v1/maintenance/:id/start
///
/// Notifies every active user the first time the window starts.
pub async fn start_maintenance(
    State(state): State<AppState>,
    actor: Actor,
    Path(id): Path<Uuid>,
) -> Result<impl IntoResponse, ApiError> {
    Ok(Json(state.maintenance.start(id, &actor).await?))
}

pub async fn complete_maintenance(
    State(state): State<AppState>,
    actor: Actor,
    Path(id): Path<Uuid>,
) -> Result<impl IntoResponse, ApiError> {
    Ok(Json(state.maintenance.complete(id, &actor).await?))
}

/// POST /api/v1/maintenance/:id/cancel
///
/// Only windows that have not started can be cancelled.
pub async fn cancel_maintenance(
    State(state): State<AppState>,
    actor: Actor,
    Path(id): Path<Uuid>,
) -> Result<impl IntoResponse, ApiError> {
    Ok(Json(state.maintenance.cancel(id, &actor).await?))
}
