//! Fee routes.

use axum::{
    extract::{Path, Query, State},
    response::IntoResponse,
    routing::{get, post},
    Json, Router,
};
use domain::models::fee::{GenerateFeesRequest, ListFeesQuery, ListFeesResponse, MarkFeePaidRequest};
use uuid::Uuid;
use validator::Validate;

use crate::app::AppState;
use crate::error::ApiError;
use crate::extractors::Actor;

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/", get(list_fees))
        .route("/stats", get(fee_statistics))
        .route("/generate", post(generate_fees))
        .route("/:id/pay", post(mark_fee_paid))
        .route("/:id/cancel", post(cancel_fee))
}

/// GET /api/v1/fees?status=&year=&title_id=
pub async fn list_fees(
    State(state): State<AppState>,
    Query(query): Query<ListFeesQuery>,
) -> Result<impl IntoResponse, ApiError> {
    let (fees, total) = state.fees.list(&query).await?;
    Ok(Json(ListFeesResponse { fees, total }))
}

pub async fn fee_statistics(State(state): State<AppState>) -> Result<impl IntoResponse, ApiError> {
    Ok(Json(state.fees.statistics().await?))
}

/// POST /api/v1/fees/generate
pub async fn generate_fees(
    State(state): State<AppState>,
    actor: Actor,
    Json(request): Json<GenerateFeesRequest>,
) -> Result<impl IntoResponse, ApiError> {
    request.validate()?;
    Ok(Json(state.fees.generate_annual_fees(request.year, &actor).await?))
}

pub async fn mark_fee_paid(
    State(state): State<AppState>,
    actor: Actor,
    Path(id): Path<Uuid>,
    Json(request): Json<MarkFeePaidRequest>,
) -> Result<impl IntoResponse, ApiError> {
    request.validate()?;
    Ok(Json(state.fees.mark_paid(id, &request, &actor).await?))
}

pub async fn cancel_fee(
    State(state): State<AppState>,
    actor: Actor,
    Path(id): Path<Uuid>,
) -> Result<impl IntoResponse, ApiError> {
    Ok(Json(state.fees.cancel(id, &actor).await?))
}
