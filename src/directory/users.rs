use axum::{
    extract::{Query, State},
    http::StatusCode,
    response::Json,
};
use std::sync::Arc;

use super::types::{CreateUserRequest, ListUsersQuery, UpdateProfileRequest};
use crate::core::shared::error::HelpdeskError;
use crate::core::shared::models::User;
use crate::core::shared::state::AppState;
use crate::security::OptionalCaller;

pub async fn list_users(
    State(state): State<Arc<AppState>>,
    caller: OptionalCaller,
    Query(query): Query<ListUsersQuery>,
) -> Result<Json<Vec<User>>, HelpdeskError> {
    let users = state
        .directory
        .list_users(caller.caller(), query.role.as_deref())
        .await?;
    Ok(Json(users))
}

pub async fn create_user(
    State(state): State<Arc<AppState>>,
    caller: OptionalCaller,
    Json(req): Json<CreateUserRequest>,
) -> Result<(StatusCode, Json<User>), HelpdeskError> {
    let user = state.directory.create_user(caller.caller(), req).await?;
    Ok((StatusCode::CREATED, Json(user)))
}

pub async fn get_profile(
    State(state): State<Arc<AppState>>,
    caller: OptionalCaller,
) -> Result<Json<User>, HelpdeskError> {
    Ok(Json(state.directory.profile(caller.caller()).await?))
}

pub async fn update_profile(
    State(state): State<Arc<AppState>>,
    caller: OptionalCaller,
    Json(req): Json<UpdateProfileRequest>,
) -> Result<Json<User>, HelpdeskError> {
    Ok(Json(state.directory.update_profile(caller.caller(), req).await?))
}
