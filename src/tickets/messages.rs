//! Ticket message thread: append-only, ordered by creation time with
//! insertion order breaking ties.

use log::debug;
use std::collections::HashMap;
use std::sync::Arc;
use uuid::Uuid;

use super::notifications::{NotificationDispatcher, TicketEvent};
use super::types::MessageView;
use crate::core::shared::error::HelpdeskError;
use crate::core::shared::models::{Message, MessageType, NewMessage, Ticket, UserSummary};
use crate::core::shared::storage::HelpdeskStore;
use crate::security::{require_permission, Caller, Permission};

#[derive(Debug, Clone)]
pub struct PostMessage {
    pub ticket_id: Uuid,
    pub content: String,
    pub is_internal: bool,
    pub message_type: MessageType,
    pub attachments: Vec<String>,
}

impl PostMessage {
    pub fn comment(ticket_id: Uuid, content: impl Into<String>) -> Self {
        Self {
            ticket_id,
            content: content.into(),
            is_internal: false,
            message_type: MessageType::Comment,
            attachments: Vec::new(),
        }
    }

    pub fn internal(mut self) -> Self {
        self.is_internal = true;
        self
    }
}

/// Whether `caller` may read `message`. Internal notes are staff-only.
pub fn is_visible_to(caller: &Caller, message: &Message) -> bool {
    !message.is_internal || caller.has_permission(Permission::PostInternalNotes)
}

/// Attaches author summaries, loading every author in one query.
pub(crate) async fn with_authors(
    store: &dyn HelpdeskStore,
    messages: Vec<Message>,
) -> Result<Vec<MessageView>, HelpdeskError> {
    let mut author_ids: Vec<Uuid> = messages.iter().map(|m| m.author_id).collect();
    author_ids.sort_unstable();
    author_ids.dedup();

    let authors: HashMap<Uuid, UserSummary> = store
        .find_users(&author_ids)
        .await?
        .into_iter()
        .map(|u| (u.id, u.summary()))
        .collect();

    Ok(messages
        .into_iter()
        .map(|m| {
            let author = authors.get(&m.author_id).cloned();
            MessageView::new(m, author)
        })
        .collect())
}

#[derive(Clone)]
pub struct MessageThread {
    store: Arc<dyn HelpdeskStore>,
    notifier: NotificationDispatcher,
}

impl std::fmt::Debug for MessageThread {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MessageThread")
            .field("notifier", &self.notifier)
            .finish_non_exhaustive()
    }
}

impl MessageThread {
    pub fn new(store: Arc<dyn HelpdeskStore>, notifier: NotificationDispatcher) -> Self {
        Self { store, notifier }
    }

    async fn visible_ticket(&self, caller: &Caller, ticket_id: Uuid) -> Result<Ticket, HelpdeskError> {
        let ticket = self
            .store
            .find_ticket(ticket_id)
            .await?
            .ok_or_else(|| HelpdeskError::not_found("Ticket not found"))?;
        if !caller.ticket_visibility().permits(ticket.customer_id) {
            return Err(HelpdeskError::forbidden("Access denied"));
        }
        Ok(ticket)
    }

    /// Appends a message authored by the caller. A public reply by anyone
    /// other than the ticket's customer notifies the customer.
    pub async fn post(
        &self,
        caller: Option<&Caller>,
        input: PostMessage,
    ) -> Result<MessageView, HelpdeskError> {
        let caller = require_permission(caller, Permission::PostMessages)?;

        let content = input.content.trim();
        if content.is_empty() {
            return Err(HelpdeskError::validation("Content is required"));
        }

        let ticket = self.visible_ticket(caller, input.ticket_id).await?;

        let privileged = input.is_internal || input.message_type == MessageType::System;
        if privileged && !caller.has_permission(Permission::PostInternalNotes) {
            return Err(HelpdeskError::forbidden(
                "Customers cannot post internal or system messages",
            ));
        }

        let author = self
            .store
            .find_user(caller.user_id)
            .await?
            .ok_or_else(|| HelpdeskError::Unauthorized("Unknown user".to_string()))?;

        let message = self
            .store
            .insert_message(NewMessage {
                ticket_id: ticket.id,
                author_id: author.id,
                content: content.to_string(),
                message_type: input.message_type,
                is_internal: input.is_internal,
                attachments: input.attachments,
            })
            .await?;
        debug!(
            "Message {} appended to ticket #{} by {}",
            message.id, ticket.number, author.email
        );

        if !message.is_internal && author.id != ticket.customer_id {
            match self.store.find_user(ticket.customer_id).await {
                Ok(Some(customer)) => {
                    let ticket = Ticket {
                        updated_at: message.created_at,
                        ..ticket
                    };
                    self.notifier
                        .dispatch(TicketEvent::Replied {
                            ticket,
                            customer,
                            author: author.clone(),
                            message: message.clone(),
                        })
                        .await;
                }
                Ok(None) => debug!("Ticket {} has no customer to notify", message.ticket_id),
                Err(e) => log::warn!("Skipping reply notification: {e}"),
            }
        }

        Ok(MessageView::new(message, Some(author.summary())))
    }

    /// The thread as the caller may see it.
    pub async fn list(
        &self,
        caller: Option<&Caller>,
        ticket_id: Uuid,
    ) -> Result<Vec<MessageView>, HelpdeskError> {
        let caller = crate::security::require_caller(caller)?;
        self.visible_ticket(caller, ticket_id).await?;
        self.thread_for(caller, ticket_id).await
    }

    /// Thread without the ticket access check, for callers that already did it.
    pub(crate) async fn thread_for(
        &self,
        caller: &Caller,
        ticket_id: Uuid,
    ) -> Result<Vec<MessageView>, HelpdeskError> {
        let messages: Vec<Message> = self
            .store
            .list_messages(ticket_id)
            .await?
            .into_iter()
            .filter(|m| is_visible_to(caller, m))
            .collect();
        with_authors(self.store.as_ref(), messages).await
    }
}
