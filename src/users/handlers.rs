use axum::{
    extract::{Path, State},
    http::{header, StatusCode},
    routing::{delete, get, post, put},
    Json, Router,
};
use tracing::instrument;

use crate::{
    error::AppError,
    state::AppState,
    users::{
        dto::{CreateUserRequest, UpdateUserRequest, UserResponse},
        services,
    },
};

pub fn user_routes() -> Router<AppState> {
    Router::new()
        .route("/users", get(list_users))
        .route("/users/store", post(create_user))
        .route("/users/find/:id", get(find_user))
        .route("/users/update/:id", put(update_user))
        .route("/users/delete/:id", delete(delete_user))
}

#[instrument(skip(state))]
pub async fn list_users(
    State(state): State<AppState>,
) -> Result<Json<Vec<UserResponse>>, AppError> {
    let users = services::list_active_users(state.users.as_ref()).await?;
    Ok(Json(users.into_iter().map(UserResponse::from).collect()))
}

#[instrument(skip(state, payload))]
pub async fn create_user(
    State(state): State<AppState>,
    Json(payload): Json<CreateUserRequest>,
) -> Result<(StatusCode, [(header::HeaderName, String); 1], Json<UserResponse>), AppError> {
    let user = services::create_user(state.users.as_ref(), payload).await?;
    let location = format!("/users/find/{}", user.id);
    Ok((
        StatusCode::CREATED,
        [(header::LOCATION, location)],
        Json(user.into()),
    ))
}

#[instrument(skip(state))]
pub async fn find_user(
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> Result<Json<UserResponse>, AppError> {
    let user = services::get_user(state.users.as_ref(), id).await?;
    Ok(Json(user.into()))
}

#[instrument(skip(state, payload))]
pub async fn update_user(
    State(state): State<AppState>,
    Path(id): Path<i64>,
    Json(payload): Json<UpdateUserRequest>,
) -> Result<Json<UserResponse>, AppError> {
    let user = services::update_user(state.users.as_ref(), id, payload).await?;
    Ok(Json(user.into()))
}

#[instrument(skip(state))]
pub async fn delete_user(
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> Result<Json<UserResponse>, AppError> {
    let user = services::soft_delete_user(state.users.as_ref(), id).await?;
    Ok(Json(user.into()))
}
