//! Title routes.
//!
//! Every read goes through the lifecycle service so due titles are expired
//! before they are returned.

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::IntoResponse,
    routing::{get, post},
    Json, Router,
};
use chrono::Utc;
use domain::models::fee::{ListFeesQuery, ListFeesResponse};
use domain::models::title::{
    CreateTitleRequest, ListTitlesQuery, ListTitlesResponse, RenewTitleRequest,
    TitleActionRequest, TitleResponse, TransitionTitleRequest, UpdateTitleRequest,
};
use domain::models::Title;
use uuid::Uuid;
use validator::Validate;

use crate::app::AppState;
use crate::error::ApiError;
use crate::extractors::Actor;

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/", get(list_titles).post(create_title))
        .route("/stats", get(title_statistics))
        .route("/:id", get(get_title).patch(update_title))
        .route("/:id/transition", post(transition_title))
        .route("/:id/suspend", post(suspend_title))
        .route("/:id/reactivate", post(reactivate_title))
        .route("/:id/renew", post(renew_title))
        .route("/:id/history", get(title_history))
        .route("/:id/fees", get(title_fees))
}

fn respond(title: Title) -> Json<TitleResponse> {
    Json(TitleResponse::new(title, Utc::now().date_naive()))
}

/// POST /api/v1/titles
pub async fn create_title(
    State(state): State<AppState>,
    actor: Actor,
    Json(request): Json<CreateTitleRequest>,
) -> Result<impl IntoResponse, ApiError> {
    request.validate()?;
    let title = state.lifecycle.create_title(&request, &actor).await?;
    Ok((StatusCode::CREATED, respond(title)))
}

/// GET /api/v1/titles
pub async fn list_titles(
    State(state): State<AppState>,
    Query(query): Query<ListTitlesQuery>,
) -> Result<impl IntoResponse, ApiError> {
    let (titles, total) = state.lifecycle.list_titles(&query).await?;
    let today = Utc::now().date_naive();
    Ok(Json(ListTitlesResponse {
        titles: titles
            .into_iter()
            .map(|t| TitleResponse::new(t, today))
            .collect(),
        total,
    }))
}

pub async fn title_statistics(State(state): State<AppState>) -> Result<impl IntoResponse, ApiError> {
    Ok(Json(state.lifecycle.title_statistics().await?))
}

pub async fn get_title(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<impl IntoResponse, ApiError> {
    Ok(respond(state.lifecycle.get_title(id).await?))
}

/// PATCH /api/v1/titles/:id
pub async fn update_title(
    State(state): State<AppState>,
    actor: Actor,
    Path(id): Path<Uuid>,
    Json(request): Json<UpdateTitleRequest>,
) -> Result<impl IntoResponse, ApiError> {
    request.validate()?;
    Ok(respond(state.lifecycle.update_title(id, &request, &actor).await?))
}

/// POST /api/v1/titles/:id/transition
///
/// Review, approval and rejection only; suspension and reactivation have
/// their own endpoints.
pub async fn transition_title(
    State(state): State<AppState>,
    actor: Actor,
    Path(id): Path<Uuid>,
    Json(request): Json<TransitionTitleRequest>,
) -> Result<impl IntoResponse, ApiError> {
    request.validate()?;
    let title = state
        .lifecycle
        .transition_title(id, request.status, request.comment, &actor)
        .await?;
    Ok(respond(title))
}

pub async fn suspend_title(
    State(state): State<AppState>,
    actor: Actor,
    Path(id): Path<Uuid>,
    request: Option<Json<TitleActionRequest>>,
) -> Result<impl IntoResponse, ApiError> {
    let request = request.map(|Json(r)| r).unwrap_or_default();
    request.validate()?;
    let title = state
        .lifecycle
        .suspend_title(id, request.comment, &actor)
        .await?;
    Ok(respond(title))
}

pub async fn reactivate_title(
    State(state): State<AppState>,
    actor: Actor,
    Path(id): Path<Uuid>,
    request: Option<Json<TitleActionRequest>>,
) -> Result<impl IntoResponse, ApiError> {
    let request = request.map(|Json(r)| r).unwrap_or_default();
    request.validate()?;
    let title = state
        .lifecycle
        .reactivate_title(id, request.comment, &actor)
        .await?;
    Ok(respond(title))
}

/// POST /api/v1/titles/:id/renew
///
/// Without `duration_years` the title keeps its current duration.
pub async fn renew_title(
    State(state): State<AppState>,
    actor: Actor,
    Path(id): Path<Uuid>,
    request: Option<Json<RenewTitleRequest>>,
) -> Result<impl IntoResponse, ApiError> {
    let request = request.map(|Json(r)| r).unwrap_or_default();
    request.validate()?;
    let title = state
        .lifecycle
        .renew_title(id, request.duration_years, request.comment, &actor)
        .await?;
    Ok(respond(title))
}

pub async fn title_history(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<impl IntoResponse, ApiError> {
    Ok(Json(state.lifecycle.title_history(id).await?))
}

/// GET /api/v1/titles/:id/fees
pub async fn title_fees(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Query(query): Query<ListFeesQuery>,
) -> Result<impl IntoResponse, ApiError> {
    state.lifecycle.get_title(id).await?;
    let query = ListFeesQuery {
        title_id: Some(id),
        ..query
    };
    let (fees, total) = state.fees.list(&query).await?;
    Ok(Json(ListFeesResponse { fees, total }))
}
