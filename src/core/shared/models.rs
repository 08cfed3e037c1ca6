use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize};
use uuid::Uuid;

use crate::core::shared::error::HelpdeskError;
use crate::security::Role;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TicketStatus {
    Open,
    Pending,
    Solved,
    Closed,
}

impl TicketStatus {
    pub const ALL: [TicketStatus; 4] = [Self::Open, Self::Pending, Self::Solved, Self::Closed];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Open => "OPEN",
            Self::Pending => "PENDING",
            Self::Solved => "SOLVED",
            Self::Closed => "CLOSED",
        }
    }

    /// Human-readable label used in audit messages.
    pub fn label(&self) -> &'static str {
        match self {
            Self::Open => "Abierto",
            Self::Pending => "Pendiente",
            Self::Solved => "Resuelto",
            Self::Closed => "Cerrado",
        }
    }
}

impl std::fmt::Display for TicketStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for TicketStatus {
    type Err = HelpdeskError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_uppercase().as_str() {
            "OPEN" => Ok(Self::Open),
            "PENDING" => Ok(Self::Pending),
            "SOLVED" => Ok(Self::Solved),
            "CLOSED" => Ok(Self::Closed),
            other => Err(HelpdeskError::validation(format!(
                "Unknown ticket status: {other}"
            ))),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TicketPriority {
    Low,
    #[default]
    Normal,
    High,
    Urgent,
}

impl TicketPriority {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Low => "LOW",
            Self::Normal => "NORMAL",
            Self::High => "HIGH",
            Self::Urgent => "URGENT",
        }
    }
}

impl std::fmt::Display for TicketPriority {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for TicketPriority {
    type Err = HelpdeskError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_uppercase().as_str() {
            "LOW" => Ok(Self::Low),
            "NORMAL" => Ok(Self::Normal),
            "HIGH" => Ok(Self::High),
            "URGENT" => Ok(Self::Urgent),
            other => Err(HelpdeskError::validation(format!(
                "Unknown ticket priority: {other}"
            ))),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TicketType {
    Incident,
    ChangeRequest,
    Project,
}

impl TicketType {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Incident => "INCIDENT",
            Self::ChangeRequest => "CHANGE_REQUEST",
            Self::Project => "PROJECT",
        }
    }
}

impl std::str::FromStr for TicketType {
    type Err = HelpdeskError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_uppercase().as_str() {
            "INCIDENT" => Ok(Self::Incident),
            "CHANGE_REQUEST" => Ok(Self::ChangeRequest),
            "PROJECT" => Ok(Self::Project),
            other => Err(HelpdeskError::validation(format!(
                "Unknown ticket type: {other}"
            ))),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum MessageType {
    #[default]
    Comment,
    System,
}

impl MessageType {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Comment => "COMMENT",
            Self::System => "SYSTEM",
        }
    }
}

impl std::str::FromStr for MessageType {
    type Err = HelpdeskError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_uppercase().as_str() {
            "COMMENT" => Ok(Self::Comment),
            "SYSTEM" => Ok(Self::System),
            other => Err(HelpdeskError::validation(format!(
                "Unknown message type: {other}"
            ))),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct User {
    pub id: Uuid,
    pub email: String,
    pub name: Option<String>,
    #[serde(skip_serializing, default)]
    pub password_hash: String,
    pub role: Role,
    pub avatar: Option<String>,
    pub phone: Option<String>,
    pub location: Option<String>,
    pub address: Option<String>,
    pub email_notifications: bool,
    #[serde(skip_serializing, default)]
    pub public_token: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl User {
    pub fn new(email: impl Into<String>, name: Option<String>, role: Role) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4(),
            email: email.into(),
            name,
            password_hash: String::new(),
            role,
            avatar: None,
            phone: None,
            location: None,
            address: None,
            email_notifications: true,
            public_token: None,
            created_at: now,
            updated_at: now,
        }
    }

    pub fn display_name(&self) -> &str {
        self.name
            .as_deref()
            .filter(|n| !n.trim().is_empty())
            .unwrap_or(&self.email)
    }

    pub fn summary(&self) -> UserSummary {
        UserSummary {
            id: self.id,
            name: self.name.clone(),
            email: self.email.clone(),
            avatar: self.avatar.clone(),
            role: self.role,
        }
    }
}

/// Public projection of a user; never carries credentials.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserSummary {
    pub id: Uuid,
    pub name: Option<String>,
    pub email: String,
    pub avatar: Option<String>,
    pub role: Role,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Category {
    pub id: Uuid,
    pub name: String,
    pub email: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Ticket {
    pub id: Uuid,
    pub number: i64,
    pub subject: String,
    pub description: Option<String>,
    pub status: TicketStatus,
    pub priority: TicketPriority,
    #[serde(rename = "type")]
    pub ticket_type: Option<TicketType>,
    pub category_id: Option<Uuid>,
    pub hours: Option<f64>,
    pub tags: Vec<String>,
    pub attachments: Vec<String>,
    pub customer_id: Uuid,
    pub assignee_id: Option<Uuid>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Message {
    pub id: Uuid,
    pub ticket_id: Uuid,
    pub author_id: Uuid,
    pub content: String,
    #[serde(rename = "type")]
    pub message_type: MessageType,
    pub is_internal: bool,
    pub attachments: Vec<String>,
    pub created_at: DateTime<Utc>,
    /// Insertion order, breaks `created_at` ties.
    #[serde(skip)]
    pub seq: i64,
}

/// Ticket fields supplied at creation. Number, status and timestamps are
/// assigned by the store.
#[derive(Debug, Clone, Default)]
pub struct NewTicket {
    pub subject: String,
    pub description: Option<String>,
    pub priority: TicketPriority,
    pub ticket_type: Option<TicketType>,
    pub category_id: Option<Uuid>,
    pub hours: Option<f64>,
    pub tags: Vec<String>,
    pub attachments: Vec<String>,
    pub customer_id: Uuid,
}

#[derive(Debug, Clone)]
pub struct NewMessage {
    pub ticket_id: Uuid,
    pub author_id: Uuid,
    pub content: String,
    pub message_type: MessageType,
    pub is_internal: bool,
    pub attachments: Vec<String>,
}

/// Partial ticket update. The outer `Option` means "leave untouched"; for
/// nullable fields the inner `None` clears the value.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TicketChanges {
    pub status: Option<TicketStatus>,
    pub priority: Option<TicketPriority>,
    pub assignee_id: Option<Option<Uuid>>,
    pub category_id: Option<Option<Uuid>>,
    pub ticket_type: Option<Option<TicketType>>,
    pub hours: Option<Option<f64>>,
    pub subject: Option<String>,
    pub description: Option<Option<String>>,
    pub tags: Option<Vec<String>>,
    pub attachments: Option<Vec<String>>,
}

impl TicketChanges {
    pub fn is_empty(&self) -> bool {
        *self == Self::default()
    }

    /// Applies the changes in place and refreshes `updated_at`. Number and
    /// owner are not reachable from here.
    pub fn apply_to(&self, ticket: &mut Ticket, now: DateTime<Utc>) {
        if let Some(status) = self.status {
            ticket.status = status;
        }
        if let Some(priority) = self.priority {
            ticket.priority = priority;
        }
        if let Some(assignee_id) = self.assignee_id {
            ticket.assignee_id = assignee_id;
        }
        if let Some(category_id) = self.category_id {
            ticket.category_id = category_id;
        }
        if let Some(ticket_type) = self.ticket_type {
            ticket.ticket_type = ticket_type;
        }
        if let Some(hours) = self.hours {
            ticket.hours = hours;
        }
        if let Some(subject) = &self.subject {
            ticket.subject = subject.clone();
        }
        if let Some(description) = &self.description {
            ticket.description = description.clone();
        }
        if let Some(tags) = &self.tags {
            ticket.tags = tags.clone();
        }
        if let Some(attachments) = &self.attachments {
            ticket.attachments = attachments.clone();
        }
        ticket.updated_at = now;
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AssigneeFilter {
    Unassigned,
    User(Uuid),
}

impl std::str::FromStr for AssigneeFilter {
    type Err = HelpdeskError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        if s.eq_ignore_ascii_case("unassigned") {
            return Ok(Self::Unassigned);
        }
        Uuid::parse_str(s)
            .map(Self::User)
            .map_err(|_| HelpdeskError::validation(format!("Invalid assignee filter: {s}")))
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct TicketFilter {
    pub status: Option<TicketStatus>,
    pub priority: Option<TicketPriority>,
    pub assignee: Option<AssigneeFilter>,
    pub search: Option<String>,
    pub customer_id: Option<Uuid>,
    pub page: i64,
    pub per_page: i64,
}

impl Default for TicketFilter {
    fn default() -> Self {
        Self {
            status: None,
            priority: None,
            assignee: None,
            search: None,
            customer_id: None,
            page: 1,
            per_page: 20,
        }
    }
}

impl TicketFilter {
    /// Rows to skip. Saturates, so a page far past the end yields an empty
    /// result instead of overflowing.
    pub fn offset(&self) -> i64 {
        (self.page.max(1) - 1).saturating_mul(self.per_page.max(1))
    }

    /// In-process form of the filter, shared by stores that cannot push it
    /// down into a query.
    pub fn matches(&self, ticket: &Ticket) -> bool {
        if self.status.is_some_and(|s| s != ticket.status) {
            return false;
        }
        if self.priority.is_some_and(|p| p != ticket.priority) {
            return false;
        }
        if self.customer_id.is_some_and(|c| c != ticket.customer_id) {
            return false;
        }
        match self.assignee {
            Some(AssigneeFilter::Unassigned) if ticket.assignee_id.is_some() => return false,
            Some(AssigneeFilter::User(id)) if ticket.assignee_id != Some(id) => return false,
            _ => {}
        }
        if let Some(search) = self.search.as_deref() {
            if !ticket
                .subject
                .to_lowercase()
                .contains(&search.to_lowercase())
            {
                return false;
            }
        }
        true
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TicketStats {
    pub open: i64,
    pub pending: i64,
    pub solved: i64,
    pub closed: i64,
    pub total: i64,
}

/// What happens to a customer's tickets when the customer is deleted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CustomerDeletePolicy {
    /// Tickets and their messages are removed with the customer.
    Cascade,
    /// Deletion fails while the customer still owns tickets.
    #[default]
    Restrict,
}

impl std::str::FromStr for CustomerDeletePolicy {
    type Err = HelpdeskError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "cascade" => Ok(Self::Cascade),
            "restrict" => Ok(Self::Restrict),
            other => Err(HelpdeskError::validation(format!(
                "Unknown customer delete policy: {other}"
            ))),
        }
    }
}

/// Deserializes a present JSON value (including `null`) as `Some(..)` so
/// that `Option<Option<T>>` can tell "absent" from "cleared".
pub fn deserialize_some<'de, T, D>(deserializer: D) -> Result<Option<T>, D::Error>
where
    T: Deserialize<'de>,
    D: Deserializer<'de>,
{
    T::deserialize(deserializer).map(Some)
}
