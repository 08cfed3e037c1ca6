//! Persistence seam for the helpdesk aggregates.
//!
//! Every write that must be atomic (number allocation, status change plus its
//! audit message, message plus ticket touch, cascading deletes) is a single
//! trait method, so each backend can wrap it in one transaction or one lock.

pub mod memory;
pub mod postgres;

use async_trait::async_trait;
use std::collections::HashMap;
use uuid::Uuid;

use crate::core::shared::error::HelpdeskError;
use crate::core::shared::models::{
    Category, CustomerDeletePolicy, Message, NewMessage, NewTicket, Ticket, TicketChanges,
    TicketFilter, TicketStats, User,
};
use crate::security::Role;

pub use memory::MemoryStore;
pub use postgres::PgStore;

/// Result of an update: the persisted ticket and, when the status moved,
/// the audit message written in the same transaction.
#[derive(Debug, Clone)]
pub struct TicketUpdateOutcome {
    pub ticket: Ticket,
    pub audit_message: Option<Message>,
}

#[async_trait]
pub trait HelpdeskStore: Send + Sync {
    async fn insert_user(&self, user: User) -> Result<User, HelpdeskError>;
    async fn find_user(&self, id: Uuid) -> Result<Option<User>, HelpdeskError>;
    async fn find_users(&self, ids: &[Uuid]) -> Result<Vec<User>, HelpdeskError>;
    async fn find_user_by_email(&self, email: &str) -> Result<Option<User>, HelpdeskError>;
    async fn find_customer_by_token(&self, token: &str) -> Result<Option<User>, HelpdeskError>;
    /// Newest first. An empty role slice means every role.
    async fn list_users(&self, roles: &[Role]) -> Result<Vec<User>, HelpdeskError>;
    async fn update_user(&self, user: User) -> Result<User, HelpdeskError>;
    /// Clears the customer's public token only if it still equals `token`.
    /// Returns whether this call was the one that cleared it.
    async fn claim_public_token(&self, customer_id: Uuid, token: &str)
        -> Result<bool, HelpdeskError>;
    /// Deletes a customer according to `policy`. `Restrict` fails with
    /// `Conflict` while tickets remain.
    async fn delete_customer(
        &self,
        id: Uuid,
        policy: CustomerDeletePolicy,
    ) -> Result<(), HelpdeskError>;
    async fn ticket_counts_by_customer(
        &self,
        customer_ids: &[Uuid],
    ) -> Result<HashMap<Uuid, i64>, HelpdeskError>;

    async fn insert_category(&self, category: Category) -> Result<Category, HelpdeskError>;
    async fn find_category(&self, id: Uuid) -> Result<Option<Category>, HelpdeskError>;
    /// Newest first.
    async fn list_categories(&self) -> Result<Vec<Category>, HelpdeskError>;
    async fn update_category(&self, category: Category) -> Result<Category, HelpdeskError>;
    /// Clears the reference on every ticket pointing at the category.
    async fn delete_category(&self, id: Uuid) -> Result<(), HelpdeskError>;

    /// Allocates the next ticket number and persists the ticket with status
    /// `OPEN`. Allocation is serialized inside the store.
    async fn insert_ticket(&self, new_ticket: NewTicket) -> Result<Ticket, HelpdeskError>;
    async fn find_ticket(&self, id: Uuid) -> Result<Option<Ticket>, HelpdeskError>;
    /// Page of tickets ordered by `updated_at` descending, plus the total
    /// number of matches.
    async fn list_tickets(&self, filter: &TicketFilter)
        -> Result<(Vec<Ticket>, i64), HelpdeskError>;
    /// Applies `changes` and refreshes `updated_at`. If the status differs
    /// from the stored one, a SYSTEM message authored by `actor_id` is
    /// appended in the same transaction.
    async fn apply_ticket_update(
        &self,
        id: Uuid,
        changes: TicketChanges,
        actor_id: Uuid,
    ) -> Result<TicketUpdateOutcome, HelpdeskError>;
    async fn ticket_stats(&self, customer_id: Option<Uuid>) -> Result<TicketStats, HelpdeskError>;

    /// Appends a message and refreshes the parent ticket's `updated_at`.
    async fn insert_message(&self, new_message: NewMessage) -> Result<Message, HelpdeskError>;
    /// Thread in creation order, insertion order on ties.
    async fn list_messages(&self, ticket_id: Uuid) -> Result<Vec<Message>, HelpdeskError>;
    /// Message count per ticket. Internal notes are counted only when
    /// `include_internal` is set.
    async fn message_counts(
        &self,
        ticket_ids: &[Uuid],
        include_internal: bool,
    ) -> Result<HashMap<Uuid, i64>, HelpdeskError>;
}
