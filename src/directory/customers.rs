use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::Json,
};
use std::sync::Arc;
use uuid::Uuid;

use super::types::{CreateCustomerRequest, CustomerView, PublicTokenView, UpdateProfileRequest};
use crate::core::shared::error::HelpdeskError;
use crate::core::shared::state::AppState;
use crate::security::OptionalCaller;

pub async fn list_customers(
    State(state): State<Arc<AppState>>,
    caller: OptionalCaller,
) -> Result<Json<Vec<CustomerView>>, HelpdeskError> {
    Ok(Json(state.directory.list_customers(caller.caller()).await?))
}

pub async fn create_customer(
    State(state): State<Arc<AppState>>,
    caller: OptionalCaller,
    Json(req): Json<CreateCustomerRequest>,
) -> Result<(StatusCode, Json<CustomerView>), HelpdeskError> {
    let customer = state.directory.create_customer(caller.caller(), req).await?;
    Ok((StatusCode::CREATED, Json(customer)))
}

pub async fn get_customer(
    State(state): State<Arc<AppState>>,
    caller: OptionalCaller,
    Path(id): Path<Uuid>,
) -> Result<Json<CustomerView>, HelpdeskError> {
    Ok(Json(state.directory.get_customer(caller.caller(), id).await?))
}

pub async fn update_customer(
    State(state): State<Arc<AppState>>,
    caller: OptionalCaller,
    Path(id): Path<Uuid>,
    Json(req): Json<UpdateProfileRequest>,
) -> Result<Json<CustomerView>, HelpdeskError> {
    Ok(Json(
        state.directory.update_customer(caller.caller(), id, req).await?,
    ))
}

pub async fn delete_customer(
    State(state): State<Arc<AppState>>,
    caller: OptionalCaller,
    Path(id): Path<Uuid>,
) -> Result<StatusCode, HelpdeskError> {
    state.directory.delete_customer(caller.caller(), id).await?;
    Ok(StatusCode::NO_CONTENT)
}

pub async fn get_public_token(
    State(state): State<Arc<AppState>>,
    caller: OptionalCaller,
    Path(id): Path<Uuid>,
) -> Result<Json<PublicTokenView>, HelpdeskError> {
    Ok(Json(
        state.directory.get_public_token(caller.caller(), id).await?,
    ))
}

pub async fn issue_public_token(
    State(state): State<Arc<AppState>>,
    caller: OptionalCaller,
    Path(id): Path<Uuid>,
) -> Result<Json<PublicTokenView>, HelpdeskError> {
    Ok(Json(
        state.directory.issue_public_token(caller.caller(), id).await?,
    ))
}
