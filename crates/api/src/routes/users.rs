//! User directory routes.

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::IntoResponse,
    routing::get,
    Json, Router,
};
use domain::models::user::{CreateUserRequest, ListUsersQuery, ListUsersResponse};
use uuid::Uuid;
use validator::Validate;

use crate::app::AppState;
use crate::error::ApiError;
use crate::extractors::Actor;

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/", get(list_users).post(create_user))
        .route("/:id", get(get_user))
}

/// POST /api/v1/users
pub async fn create_user(
    State(state): State<AppState>,
    actor: Actor,
    Json(request): Json<CreateUserRequest>,
) -> Result<impl IntoResponse, ApiError> {
    request.validate()?;
    let user = state.lifecycle.create_user(&request, &actor).await?;
    Ok((StatusCode::CREATED, Json(user)))
}

/// GET /api/v1/users?role=
pub async fn list_users(
    State(state): State<AppState>,
    Query(query): Query<ListUsersQuery>,
) -> Result<impl IntoResponse, ApiError> {
    let (users, total) = state
        .lifecycle
        .list_users(query.role, query.limit, query.offset)
        .await?;
    Ok(Json(ListUsersResponse { users, total }))
}

pub async fn get_user(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<impl IntoResponse, ApiError> {
    Ok(Json(state.lifecycle.get_user(id).await?))
}
