use async_trait::async_trait;
use chrono::Utc;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;
use uuid::Uuid;

use super::{HelpdeskStore, TicketUpdateOutcome};
use crate::core::shared::error::HelpdeskError;
use crate::core::shared::models::{
    Category, CustomerDeletePolicy, Message, NewMessage, NewTicket, Ticket, TicketChanges,
    TicketFilter, TicketStats, TicketStatus, User,
};
use crate::security::Role;
use crate::tickets::status::StatusTransition;

#[derive(Debug, Default)]
struct MemoryState {
    users: HashMap<Uuid, User>,
    categories: HashMap<Uuid, Category>,
    tickets: HashMap<Uuid, Ticket>,
    messages: Vec<Message>,
    last_number: i64,
    last_seq: i64,
}

impl MemoryState {
    fn push_message(&mut self, new_message: NewMessage) -> Message {
        self.last_seq += 1;
        let message = Message {
            id: Uuid::new_v4(),
            ticket_id: new_message.ticket_id,
            author_id: new_message.author_id,
            content: new_message.content,
            message_type: new_message.message_type,
            is_internal: new_message.is_internal,
            attachments: new_message.attachments,
            created_at: Utc::now(),
            seq: self.last_seq,
        };
        self.messages.push(message.clone());
        message
    }

    fn ensure_unique_user(&self, user: &User) -> Result<(), HelpdeskError> {
        let clash = self.users.values().any(|existing| {
            existing.id != user.id
                && (existing.email.eq_ignore_ascii_case(&user.email)
                    || (user.public_token.is_some() && existing.public_token == user.public_token))
        });
        if clash {
            return Err(HelpdeskError::Conflict(format!(
                "A user with email {} already exists",
                user.email
            )));
        }
        Ok(())
    }
}

/// Process-local store. Every operation runs under one lock, which is what
/// serializes ticket numbering and keeps audit messages atomic with the
/// status write.
#[derive(Debug, Clone, Default)]
pub struct MemoryStore {
    state: Arc<RwLock<MemoryState>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Store whose first ticket gets `last_number + 1`.
    pub fn with_last_ticket_number(last_number: i64) -> Self {
        let state = MemoryState {
            last_number,
            ..Default::default()
        };
        Self {
            state: Arc::new(RwLock::new(state)),
        }
    }
}

#[async_trait]
impl HelpdeskStore for MemoryStore {
    async fn insert_user(&self, user: User) -> Result<User, HelpdeskError> {
        let mut state = self.state.write().await;
        state.ensure_unique_user(&user)?;
        state.users.insert(user.id, user.clone());
        Ok(user)
    }

    async fn find_user(&self, id: Uuid) -> Result<Option<User>, HelpdeskError> {
        Ok(self.state.read().await.users.get(&id).cloned())
    }

    async fn find_users(&self, ids: &[Uuid]) -> Result<Vec<User>, HelpdeskError> {
        let state = self.state.read().await;
        Ok(ids
            .iter()
            .filter_map(|id| state.users.get(id).cloned())
            .collect())
    }

    async fn find_user_by_email(&self, email: &str) -> Result<Option<User>, HelpdeskError> {
        let state = self.state.read().await;
        Ok(state
            .users
            .values()
            .find(|u| u.email.eq_ignore_ascii_case(email))
            .cloned())
    }

    async fn find_customer_by_token(&self, token: &str) -> Result<Option<User>, HelpdeskError> {
        let state = self.state.read().await;
        Ok(state
            .users
            .values()
            .find(|u| u.role == Role::Customer && u.public_token.as_deref() == Some(token))
            .cloned())
    }

    async fn list_users(&self, roles: &[Role]) -> Result<Vec<User>, HelpdeskError> {
        let state = self.state.read().await;
        let mut users: Vec<User> = state
            .users
            .values()
            .filter(|u| roles.is_empty() || roles.contains(&u.role))
            .cloned()
            .collect();
        users.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(users)
    }

    async fn update_user(&self, user: User) -> Result<User, HelpdeskError> {
        let mut state = self.state.write().await;
        if !state.users.contains_key(&user.id) {
            return Err(HelpdeskError::not_found("User not found"));
        }
        state.ensure_unique_user(&user)?;
        state.users.insert(user.id, user.clone());
        Ok(user)
    }

    async fn claim_public_token(
        &self,
        customer_id: Uuid,
        token: &str,
    ) -> Result<bool, HelpdeskError> {
        let mut state = self.state.write().await;
        match state.users.get_mut(&customer_id) {
            Some(user) if user.public_token.as_deref() == Some(token) => {
                user.public_token = None;
                user.updated_at = Utc::now();
                Ok(true)
            }
            _ => Ok(false),
        }
    }

    async fn delete_customer(
        &self,
        id: Uuid,
        policy: CustomerDeletePolicy,
    ) -> Result<(), HelpdeskError> {
        let mut state = self.state.write().await;
        match state.users.get(&id) {
            Some(user) if user.role == Role::Customer => {}
            _ => return Err(HelpdeskError::not_found("Customer not found")),
        }

        let owned: Vec<Uuid> = state
            .tickets
            .values()
            .filter(|t| t.customer_id == id)
            .map(|t| t.id)
            .collect();

        if policy == CustomerDeletePolicy::Restrict && !owned.is_empty() {
            return Err(HelpdeskError::Conflict(format!(
                "Customer still owns {} ticket(s)",
                owned.len()
            )));
        }

        state.messages.retain(|m| !owned.contains(&m.ticket_id));
        for ticket_id in &owned {
            state.tickets.remove(ticket_id);
        }
        for ticket in state.tickets.values_mut() {
            if ticket.assignee_id == Some(id) {
                ticket.assignee_id = None;
            }
        }
        state.users.remove(&id);
        Ok(())
    }

    async fn ticket_counts_by_customer(
        &self,
        customer_ids: &[Uuid],
    ) -> Result<HashMap<Uuid, i64>, HelpdeskError> {
        let state = self.state.read().await;
        let mut counts = HashMap::new();
        for ticket in state.tickets.values() {
            if customer_ids.contains(&ticket.customer_id) {
                *counts.entry(ticket.customer_id).or_insert(0) += 1;
            }
        }
        Ok(counts)
    }

    async fn insert_category(&self, category: Category) -> Result<Category, HelpdeskError> {
        let mut state = self.state.write().await;
        state.categories.insert(category.id, category.clone());
        Ok(category)
    }

    async fn find_category(&self, id: Uuid) -> Result<Option<Category>, HelpdeskError> {
        Ok(self.state.read().await.categories.get(&id).cloned())
    }

    async fn list_categories(&self) -> Result<Vec<Category>, HelpdeskError> {
        let state = self.state.read().await;
        let mut categories: Vec<Category> = state.categories.values().cloned().collect();
        categories.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(categories)
    }

    async fn update_category(&self, category: Category) -> Result<Category, HelpdeskError> {
        let mut state = self.state.write().await;
        match state.categories.get_mut(&category.id) {
            Some(existing) => {
                *existing = category.clone();
                Ok(category)
            }
            None => Err(HelpdeskError::not_found("Category not found")),
        }
    }

    async fn delete_category(&self, id: Uuid) -> Result<(), HelpdeskError> {
        let mut state = self.state.write().await;
        if state.categories.remove(&id).is_none() {
            return Err(HelpdeskError::not_found("Category not found"));
        }
        for ticket in state.tickets.values_mut() {
            if ticket.category_id == Some(id) {
                ticket.category_id = None;
            }
        }
        Ok(())
    }

    async fn insert_ticket(&self, new_ticket: NewTicket) -> Result<Ticket, HelpdeskError> {
        let mut state = self.state.write().await;
        if !state.users.contains_key(&new_ticket.customer_id) {
            return Err(HelpdeskError::validation("Customer does not exist"));
        }
        if let Some(category_id) = new_ticket.category_id {
            if !state.categories.contains_key(&category_id) {
                return Err(HelpdeskError::validation("Category does not exist"));
            }
        }

        state.last_number += 1;
        let now = Utc::now();
        let ticket = Ticket {
            id: Uuid::new_v4(),
            number: state.last_number,
            subject: new_ticket.subject,
            description: new_ticket.description,
            status: TicketStatus::Open,
            priority: new_ticket.priority,
            ticket_type: new_ticket.ticket_type,
            category_id: new_ticket.category_id,
            hours: new_ticket.hours,
            tags: new_ticket.tags,
            attachments: new_ticket.attachments,
            customer_id: new_ticket.customer_id,
            assignee_id: None,
            created_at: now,
            updated_at: now,
        };
        state.tickets.insert(ticket.id, ticket.clone());
        Ok(ticket)
    }

    async fn find_ticket(&self, id: Uuid) -> Result<Option<Ticket>, HelpdeskError> {
        Ok(self.state.read().await.tickets.get(&id).cloned())
    }

    async fn list_tickets(
        &self,
        filter: &TicketFilter,
    ) -> Result<(Vec<Ticket>, i64), HelpdeskError> {
        let state = self.state.read().await;
        let mut matched: Vec<&Ticket> = state
            .tickets
            .values()
            .filter(|t| filter.matches(t))
            .collect();
        matched.sort_by(|a, b| {
            b.updated_at
                .cmp(&a.updated_at)
                .then_with(|| b.number.cmp(&a.number))
        });

        let total = matched.len() as i64;
        let page = matched
            .into_iter()
            .skip(filter.offset().max(0) as usize)
            .take(filter.per_page.max(0) as usize)
            .cloned()
            .collect();
        Ok((page, total))
    }

    async fn apply_ticket_update(
        &self,
        id: Uuid,
        changes: TicketChanges,
        actor_id: Uuid,
    ) -> Result<TicketUpdateOutcome, HelpdeskError> {
        let mut state = self.state.write().await;
        let mut ticket = state
            .tickets
            .get(&id)
            .cloned()
            .ok_or_else(|| HelpdeskError::not_found("Ticket not found"))?;

        let previous_status = ticket.status;
        changes.apply_to(&mut ticket, Utc::now());
        state.tickets.insert(id, ticket.clone());

        let audit_message = StatusTransition::between(previous_status, ticket.status)
            .map(|transition| state.push_message(transition.audit_message(id, actor_id)));

        Ok(TicketUpdateOutcome {
            ticket,
            audit_message,
        })
    }

    async fn ticket_stats(&self, customer_id: Option<Uuid>) -> Result<TicketStats, HelpdeskError> {
        let state = self.state.read().await;
        let mut stats = TicketStats::default();
        for ticket in state
            .tickets
            .values()
            .filter(|t| customer_id.map_or(true, |c| t.customer_id == c))
        {
            stats.total += 1;
            match ticket.status {
                TicketStatus::Open => stats.open += 1,
                TicketStatus::Pending => stats.pending += 1,
                TicketStatus::Solved => stats.solved += 1,
                TicketStatus::Closed => stats.closed += 1,
            }
        }
        Ok(stats)
    }

    async fn insert_message(&self, new_message: NewMessage) -> Result<Message, HelpdeskError> {
        let mut state = self.state.write().await;
        if !state.users.contains_key(&new_message.author_id) {
            return Err(HelpdeskError::validation("Author does not exist"));
        }
        let ticket_id = new_message.ticket_id;
        if !state.tickets.contains_key(&ticket_id) {
            return Err(HelpdeskError::not_found("Ticket not found"));
        }

        let message = state.push_message(new_message);
        if let Some(ticket) = state.tickets.get_mut(&ticket_id) {
            ticket.updated_at = message.created_at;
        }
        Ok(message)
    }

    async fn list_messages(&self, ticket_id: Uuid) -> Result<Vec<Message>, HelpdeskError> {
        let state = self.state.read().await;
        let mut thread: Vec<Message> = state
            .messages
            .iter()
            .filter(|m| m.ticket_id == ticket_id)
            .cloned()
            .collect();
        thread.sort_by(|a, b| a.created_at.cmp(&b.created_at).then(a.seq.cmp(&b.seq)));
        Ok(thread)
    }

    async fn message_counts(
        &self,
        ticket_ids: &[Uuid],
        include_internal: bool,
    ) -> Result<HashMap<Uuid, i64>, HelpdeskError> {
        let state = self.state.read().await;
        let mut counts = HashMap::new();
        for message in &state.messages {
            if ticket_ids.contains(&message.ticket_id) && (include_internal || !message.is_internal) {
                *counts.entry(message.ticket_id).or_insert(0) += 1;
            }
        }
        Ok(counts)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::shared::models::{MessageType, TicketPriority};

    async fn seed_customer(store: &MemoryStore) -> User {
        store
            .insert_user(User::new("ana@x.com", Some("Ana".into()), Role::Customer))
            .await
            .expect("insert customer")
    }

    fn new_ticket(customer_id: Uuid, subject: &str) -> NewTicket {
        NewTicket {
            subject: subject.to_string(),
            customer_id,
            ..Default::default()
        }
    }

    #[tokio::test]
    async fn test_ticket_numbers_continue_from_last() {
        let store = MemoryStore::with_last_ticket_number(1006);
        let customer = seed_customer(&store).await;

        let first = store
            .insert_ticket(new_ticket(customer.id, "a"))
            .await
            .expect("insert");
        let second = store
            .insert_ticket(new_ticket(customer.id, "b"))
            .await
            .expect("insert");

        assert_eq!(first.number, 1007);
        assert_eq!(second.number, 1008);
        assert_eq!(first.status, TicketStatus::Open);
    }

    #[tokio::test]
    async fn test_duplicate_email_conflicts() {
        let store = MemoryStore::new();
        seed_customer(&store).await;
        let result = store
            .insert_user(User::new("ANA@x.com", None, Role::Agent))
            .await;
        assert!(matches!(result, Err(HelpdeskError::Conflict(_))));
    }

    #[tokio::test]
    async fn test_status_change_appends_audit_atomically() {
        let store = MemoryStore::new();
        let customer = seed_customer(&store).await;
        let agent = store
            .insert_user(User::new("agent@x.com", None, Role::Agent))
            .await
            .expect("agent");
        let ticket = store
            .insert_ticket(new_ticket(customer.id, "Login fails"))
            .await
            .expect("ticket");

        let outcome = store
            .apply_ticket_update(
                ticket.id,
                TicketChanges {
                    status: Some(TicketStatus::Pending),
                    ..Default::default()
                },
                agent.id,
            )
            .await
            .expect("update");

        let audit = outcome.audit_message.expect("audit message");
        assert_eq!(audit.message_type, MessageType::System);
        assert_eq!(audit.author_id, agent.id);
        assert_eq!(outcome.ticket.status, TicketStatus::Pending);

        let unchanged = store
            .apply_ticket_update(
                ticket.id,
                TicketChanges {
                    status: Some(TicketStatus::Pending),
                    priority: Some(TicketPriority::High),
                    ..Default::default()
                },
                agent.id,
            )
            .await
            .expect("update");
        assert!(unchanged.audit_message.is_none());
        assert_eq!(store.list_messages(ticket.id).await.expect("list").len(), 1);
    }

    #[tokio::test]
    async fn test_message_touches_ticket() {
        let store = MemoryStore::new();
        let customer = seed_customer(&store).await;
        let ticket = store
            .insert_ticket(new_ticket(customer.id, "Printer"))
            .await
            .expect("ticket");

        let message = store
            .insert_message(NewMessage {
                ticket_id: ticket.id,
                author_id: customer.id,
                content: "Still broken".into(),
                message_type: MessageType::Comment,
                is_internal: false,
                attachments: vec![],
            })
            .await
            .expect("message");

        let reloaded = store
            .find_ticket(ticket.id)
            .await
            .expect("find")
            .expect("exists");
        assert_eq!(reloaded.updated_at, message.created_at);
    }

    #[tokio::test]
    async fn test_claim_public_token_is_conditional() {
        let store = MemoryStore::new();
        let mut customer = seed_customer(&store).await;
        customer.public_token = Some("first".into());
        let customer = store.update_user(customer).await.expect("token");

        assert!(!store
            .claim_public_token(customer.id, "other")
            .await
            .expect("claim"));
        assert!(store
            .claim_public_token(customer.id, "first")
            .await
            .expect("claim"));
        assert!(!store
            .claim_public_token(customer.id, "first")
            .await
            .expect("claim"));

        let mut reissued = store
            .find_user(customer.id)
            .await
            .expect("find")
            .expect("exists");
        reissued.public_token = Some("second".into());
        store.update_user(reissued).await.expect("reissue");

        assert!(!store
            .claim_public_token(customer.id, "first")
            .await
            .expect("stale claim"));
        let current = store.find_user(customer.id).await.expect("find").expect("exists");
        assert_eq!(current.public_token.as_deref(), Some("second"));
    }

    #[tokio::test]
    async fn test_delete_customer_policies() {
        let store = MemoryStore::new();
        let customer = seed_customer(&store).await;
        let ticket = store
            .insert_ticket(new_ticket(customer.id, "Refund"))
            .await
            .expect("ticket");

        let restricted = store
            .delete_customer(customer.id, CustomerDeletePolicy::Restrict)
            .await;
        assert!(matches!(restricted, Err(HelpdeskError::Conflict(_))));
        assert!(store.find_user(customer.id).await.expect("find").is_some());

        store
            .delete_customer(customer.id, CustomerDeletePolicy::Cascade)
            .await
            .expect("cascade");
        assert!(store.find_user(customer.id).await.expect("find").is_none());
        assert!(store.find_ticket(ticket.id).await.expect("find").is_none());
    }

    #[tokio::test]
    async fn test_delete_category_clears_references() {
        let store = MemoryStore::new();
        let customer = seed_customer(&store).await;
        let now = Utc::now();
        let category = store
            .insert_category(Category {
                id: Uuid::new_v4(),
                name: "Billing".into(),
                email: None,
                created_at: now,
                updated_at: now,
            })
            .await
            .expect("category");
        let ticket = store
            .insert_ticket(NewTicket {
                category_id: Some(category.id),
                ..new_ticket(customer.id, "Invoice")
            })
            .await
            .expect("ticket");

        store.delete_category(category.id).await.expect("delete");

        let reloaded = store
            .find_ticket(ticket.id)
            .await
            .expect("find")
            .expect("exists");
        assert_eq!(reloaded.category_id, None);
    }
}
