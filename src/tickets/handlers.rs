use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    routing::{get, post},
    Json, Router,
};
use std::sync::Arc;
use uuid::Uuid;

use super::messages::PostMessage;
use super::types::{
    AssistRequest, AssistResponse, CreateTicketRequest, ListTicketsQuery, MessageView,
    PostMessageRequest, TicketDetail, TicketPage, UpdateTicketRequest,
};
use crate::core::shared::error::HelpdeskError;
use crate::core::shared::models::{MessageType, TicketStats};
use crate::core::shared::state::AppState;
use crate::security::OptionalCaller;

pub async fn list_tickets(
    State(state): State<Arc<AppState>>,
    caller: OptionalCaller,
    Query(query): Query<ListTicketsQuery>,
) -> Result<Json<TicketPage>, HelpdeskError> {
    Ok(Json(state.tickets.list(caller.caller(), query).await?))
}

pub async fn create_ticket(
    State(state): State<Arc<AppState>>,
    caller: OptionalCaller,
    Json(req): Json<CreateTicketRequest>,
) -> Result<(StatusCode, Json<TicketDetail>), HelpdeskError> {
    let ticket = state.tickets.create(caller.caller(), req).await?;
    Ok((StatusCode::CREATED, Json(ticket)))
}

pub async fn get_ticket_stats(
    State(state): State<Arc<AppState>>,
    caller: OptionalCaller,
) -> Result<Json<TicketStats>, HelpdeskError> {
    Ok(Json(state.tickets.stats(caller.caller()).await?))
}

pub async fn get_ticket(
    State(state): State<Arc<AppState>>,
    caller: OptionalCaller,
    Path(id): Path<Uuid>,
) -> Result<Json<TicketDetail>, HelpdeskError> {
    Ok(Json(state.tickets.get(caller.caller(), id).await?))
}

pub async fn update_ticket(
    State(state): State<Arc<AppState>>,
    caller: OptionalCaller,
    Path(id): Path<Uuid>,
    Json(req): Json<UpdateTicketRequest>,
) -> Result<Json<TicketDetail>, HelpdeskError> {
    Ok(Json(state.tickets.update(caller.caller(), id, req).await?))
}

pub async fn list_messages(
    State(state): State<Arc<AppState>>,
    caller: OptionalCaller,
    Path(id): Path<Uuid>,
) -> Result<Json<Vec<MessageView>>, HelpdeskError> {
    Ok(Json(state.messages.list(caller.caller(), id).await?))
}

/// Stores the message, then gives the assistant a chance to react to it.
pub async fn post_message(
    State(state): State<Arc<AppState>>,
    caller: OptionalCaller,
    Json(req): Json<PostMessageRequest>,
) -> Result<(StatusCode, Json<MessageView>), HelpdeskError> {
    let message_type = match req.message_type.as_deref() {
        Some(raw) => raw.parse()?,
        None => MessageType::Comment,
    };
    let input = PostMessage {
        ticket_id: req.ticket_id,
        content: req.content.unwrap_or_default(),
        is_internal: req.is_internal,
        message_type,
        attachments: req.attachments,
    };

    let view = state.messages.post(caller.caller(), input).await?;

    if let (Some(assistant), Some(author)) = (&state.assistant, caller.caller()) {
        assistant.on_message_posted(author, &view).await;
    }

    Ok((StatusCode::CREATED, Json(view)))
}

pub async fn assist_ticket(
    State(state): State<Arc<AppState>>,
    caller: OptionalCaller,
    Path(id): Path<Uuid>,
    Json(req): Json<AssistRequest>,
) -> Result<Json<AssistResponse>, HelpdeskError> {
    crate::security::require_caller(caller.caller())?;
    let assistant = state
        .assistant
        .as_ref()
        .ok_or_else(|| HelpdeskError::validation("AI assistant is not configured"))?;
    let user_message = req.user_message.unwrap_or_default();
    Ok(Json(
        assistant.assist(caller.caller(), id, &user_message).await?,
    ))
}

/// Anonymous submission through a customer's public link.
pub async fn submit_public_ticket(
    State(state): State<Arc<AppState>>,
    Path(token): Path<String>,
    Json(req): Json<CreateTicketRequest>,
) -> Result<(StatusCode, Json<TicketDetail>), HelpdeskError> {
    let ticket = state.tickets.submit_public(&token, req).await?;
    Ok((StatusCode::CREATED, Json(ticket)))
}

pub fn configure_tickets_routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/api/tickets", get(list_tickets).post(create_ticket))
        .route("/api/tickets/stats", get(get_ticket_stats))
        .route("/api/tickets/:id", get(get_ticket).patch(update_ticket))
        .route("/api/tickets/:id/messages", get(list_messages))
        .route("/api/tickets/:id/assist", post(assist_ticket))
        .route("/api/messages", post(post_message))
        .route("/api/public/tickets/:token", post(submit_public_ticket))
}
