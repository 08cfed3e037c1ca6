use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::core::shared::models::{
    deserialize_some, Category, Message, MessageType, Ticket, TicketPriority, TicketStatus,
    TicketType, UserSummary,
};

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateTicketRequest {
    pub subject: Option<String>,
    pub description: Option<String>,
    pub priority: Option<String>,
    #[serde(rename = "type")]
    pub ticket_type: Option<String>,
    pub category_id: Option<Uuid>,
    pub hours: Option<f64>,
    pub tags: Option<Vec<String>>,
    pub attachments: Option<Vec<String>>,
    pub customer_id: Option<Uuid>,
}

/// Partial update body. For nullable fields an explicit `null` clears the
/// value while an absent key leaves it untouched.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateTicketRequest {
    pub status: Option<String>,
    pub priority: Option<String>,
    #[serde(default, deserialize_with = "deserialize_some")]
    pub assignee_id: Option<Option<Uuid>>,
    #[serde(default, deserialize_with = "deserialize_some")]
    pub category_id: Option<Option<Uuid>>,
    #[serde(default, rename = "type", deserialize_with = "deserialize_some")]
    pub ticket_type: Option<Option<String>>,
    #[serde(default, deserialize_with = "deserialize_some")]
    pub hours: Option<Option<f64>>,
    pub subject: Option<String>,
    #[serde(default, deserialize_with = "deserialize_some")]
    pub description: Option<Option<String>>,
    pub tags: Option<Vec<String>>,
    pub attachments: Option<Vec<String>>,
    /// Immutable after creation; present only so the request can be refused.
    pub customer_id: Option<serde_json::Value>,
    pub number: Option<serde_json::Value>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ListTicketsQuery {
    pub status: Option<String>,
    pub priority: Option<String>,
    /// A user id or `unassigned`.
    pub assignee: Option<String>,
    pub search: Option<String>,
    pub page: Option<i64>,
    pub per_page: Option<i64>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PostMessageRequest {
    pub ticket_id: Uuid,
    pub content: Option<String>,
    #[serde(default)]
    pub is_internal: bool,
    #[serde(rename = "type")]
    pub message_type: Option<String>,
    #[serde(default)]
    pub attachments: Vec<String>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AssistRequest {
    pub user_message: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MessageView {
    pub id: Uuid,
    pub ticket_id: Uuid,
    pub content: String,
    #[serde(rename = "type")]
    pub message_type: MessageType,
    pub is_internal: bool,
    pub attachments: Vec<String>,
    pub created_at: DateTime<Utc>,
    pub author: Option<UserSummary>,
}

impl MessageView {
    pub fn new(message: Message, author: Option<UserSummary>) -> Self {
        Self {
            id: message.id,
            ticket_id: message.ticket_id,
            content: message.content,
            message_type: message.message_type,
            is_internal: message.is_internal,
            attachments: message.attachments,
            created_at: message.created_at,
            author,
        }
    }
}

/// A ticket with its relations and visible thread.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TicketDetail {
    pub id: Uuid,
    pub number: i64,
    pub subject: String,
    pub description: Option<String>,
    pub status: TicketStatus,
    pub priority: TicketPriority,
    #[serde(rename = "type")]
    pub ticket_type: Option<TicketType>,
    pub hours: Option<f64>,
    pub tags: Vec<String>,
    pub attachments: Vec<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub customer: Option<UserSummary>,
    pub assignee: Option<UserSummary>,
    pub category: Option<Category>,
    pub messages: Vec<MessageView>,
}

impl TicketDetail {
    pub fn new(
        ticket: Ticket,
        customer: Option<UserSummary>,
        assignee: Option<UserSummary>,
        category: Option<Category>,
        messages: Vec<MessageView>,
    ) -> Self {
        Self {
            id: ticket.id,
            number: ticket.number,
            subject: ticket.subject,
            description: ticket.description,
            status: ticket.status,
            priority: ticket.priority,
            ticket_type: ticket.ticket_type,
            hours: ticket.hours,
            tags: ticket.tags,
            attachments: ticket.attachments,
            created_at: ticket.created_at,
            updated_at: ticket.updated_at,
            customer,
            assignee,
            category,
            messages,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TicketListItem {
    #[serde(flatten)]
    pub ticket: Ticket,
    pub customer: Option<UserSummary>,
    pub assignee: Option<UserSummary>,
    pub category: Option<Category>,
    pub message_count: i64,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TicketPage {
    pub tickets: Vec<TicketListItem>,
    pub total: i64,
    pub page: i64,
    pub per_page: i64,
    pub total_pages: i64,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AssistResponse {
    pub success: bool,
    pub message: MessageView,
    pub ai_response: String,
}
