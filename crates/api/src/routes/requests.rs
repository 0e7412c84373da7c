//! Licence request routes.

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::IntoResponse,
    routing::{get, post},
    Json, Router,
};
use chrono::Utc;
use domain::models::license_request::{
    AddCommentRequest, AssignRequest, CreateLicenseRequest, DocumentRequest,
    LicenseRequestResponse, ListRequestsQuery, ListRequestsResponse, UpdateLicenseRequest,
    UpdateRequestStatus,
};
use domain::models::LicenseRequest;
use uuid::Uuid;
use validator::Validate;

use crate::app::AppState;
use crate::error::ApiError;
use crate::extractors::Actor;

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/", get(list_requests).post(create_request))
        .route("/stats", get(request_statistics))
        .route("/:id", get(get_request).patch(update_request))
        .route("/:id/assign", post(assign_request))
        .route("/:id/status", post(update_request_status))
        .route("/:id/comments", post(add_comment))
        .route("/:id/documents", post(add_document).delete(remove_document))
        .route("/:id/history", get(request_history))
}

fn respond(request: LicenseRequest) -> Json<LicenseRequestResponse> {
    Json(LicenseRequestResponse::new(request, Utc::now()))
}

/// POST /api/v1/requests
pub async fn create_request(
    State(state): State<AppState>,
    Json(request): Json<CreateLicenseRequest>,
) -> Result<impl IntoResponse, ApiError> {
    request.validate()?;
    let created = state.lifecycle.create_request(request).await?;
    Ok((StatusCode::CREATED, respond(created)))
}

/// GET /api/v1/requests
pub async fn list_requests(
    State(state): State<AppState>,
    Query(query): Query<ListRequestsQuery>,
) -> Result<impl IntoResponse, ApiError> {
    let (requests, total) = state.lifecycle.list_requests(&query).await?;
    let now = Utc::now();
    Ok(Json(ListRequestsResponse {
        requests: requests
            .into_iter()
            .map(|r| LicenseRequestResponse::new(r, now))
            .collect(),
        total,
    }))
}

pub async fn request_statistics(State(state): State<AppState>) -> Result<impl IntoResponse, ApiError> {
    Ok(Json(state.lifecycle.request_statistics().await?))
}

pub async fn get_request(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<impl IntoResponse, ApiError> {
    Ok(respond(state.lifecycle.get_request(id).await?))
}

pub async fn update_request(
    State(state): State<AppState>,
    actor: Actor,
    Path(id): Path<Uuid>,
    Json(request): Json<UpdateLicenseRequest>,
) -> Result<impl IntoResponse, ApiError> {
    request.validate()?;
    Ok(respond(state.lifecycle.update_request(id, &request, &actor).await?))
}

/// POST /api/v1/requests/:id/assign
///
/// A null `assignee_id` removes the assignee.
pub async fn assign_request(
    State(state): State<AppState>,
    actor: Actor,
    Path(id): Path<Uuid>,
    Json(request): Json<AssignRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let updated = state
        .lifecycle
        .assign_request(id, request.assignee_id, &actor)
        .await?;
    Ok(respond(updated))
}

/// POST /api/v1/requests/:id/status
pub async fn update_request_status(
    State(state): State<AppState>,
    actor: Actor,
    Path(id): Path<Uuid>,
    Json(request): Json<UpdateRequestStatus>,
) -> Result<impl IntoResponse, ApiError> {
    request.validate()?;
    let updated = state
        .lifecycle
        .update_request_status(id, &request, &actor)
        .await?;
    Ok(respond(updated))
}

pub async fn add_comment(
    State(state): State<AppState>,
    actor: Actor,
    Path(id): Path<Uuid>,
    Json(request): Json<AddCommentRequest>,
) -> Result<impl IntoResponse, ApiError> {
    request.validate()?;
    let entry = state
        .lifecycle
        .add_comment(id, request.comment.trim(), &actor)
        .await?;
    Ok((StatusCode::CREATED, Json(entry)))
}

pub async fn add_document(
    State(state): State<AppState>,
    actor: Actor,
    Path(id): Path<Uuid>,
    Json(request): Json<DocumentRequest>,
) -> Result<impl IntoResponse, ApiError> {
    request.validate()?;
    let updated = state.lifecycle.add_document(id, &request.url, &actor).await?;
    Ok(respond(updated))
}

/// DELETE /api/v1/requests/:id/documents
///
/// The URL to detach is sent in the body, like on attach.
pub async fn remove_document(
    State(state): State<AppState>,
    actor: Actor,
    Path(id): Path<Uuid>,
    Json(request): Json<DocumentRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let updated = state
        .lifecycle
        .remove_document(id, &request.url, &actor)
        .await?;
    Ok(respond(updated))
}

pub async fn request_history(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<impl IntoResponse, ApiError> {
    Ok(Json(state.lifecycle.request_history(id).await?))
}
