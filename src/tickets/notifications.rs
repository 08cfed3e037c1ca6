//! Email side effects of ticket events.
//!
//! Services emit a [`TicketEvent`] after their write has committed. The
//! dispatcher decides whether the event warrants an email, renders it and
//! hands it to the [`EmailSender`]. Delivery problems are logged and never
//! reach the caller.

use log::{debug, info, warn};
use std::sync::Arc;

use crate::core::shared::models::{Message, Ticket, User};
use crate::email::templates::{self, EmailContent};
use crate::email::{EmailSender, SendOutcome};

#[derive(Debug, Clone)]
pub enum TicketEvent {
    Created {
        ticket: Ticket,
        customer: User,
    },
    Replied {
        ticket: Ticket,
        customer: User,
        author: User,
        message: Message,
    },
}

impl TicketEvent {
    pub fn name(&self) -> &'static str {
        match self {
            Self::Created { .. } => "ticket_created",
            Self::Replied { .. } => "message_replied",
        }
    }
}

/// A rendered email ready for the transport.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutboundEmail {
    pub to: String,
    pub content: EmailContent,
}

/// Applies the notification rules and renders the email, or `None` when the
/// event must not produce one.
pub fn build_email(event: &TicketEvent) -> Option<OutboundEmail> {
    match event {
        TicketEvent::Created { ticket, customer } => {
            if !customer.email_notifications {
                return None;
            }
            Some(OutboundEmail {
                to: customer.email.clone(),
                content: templates::ticket_created(
                    customer.display_name(),
                    ticket.number,
                    &ticket.subject,
                    ticket.description.as_deref(),
                ),
            })
        }
        TicketEvent::Replied {
            ticket,
            customer,
            author,
            message,
        } => {
            if message.is_internal
                || author.id == customer.id
                || message.author_id == ticket.customer_id
                || !customer.email_notifications
            {
                return None;
            }
            Some(OutboundEmail {
                to: customer.email.clone(),
                content: templates::ticket_reply(
                    customer.display_name(),
                    ticket.number,
                    &ticket.subject,
                    author.display_name(),
                    &message.content,
                ),
            })
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum DeliveryMode {
    /// Await the transport before returning to the caller.
    Inline,
    /// Hand the email to a spawned task.
    #[default]
    Background,
}

#[derive(Clone)]
pub struct NotificationDispatcher {
    sender: Arc<dyn EmailSender>,
    mode: DeliveryMode,
}

impl std::fmt::Debug for NotificationDispatcher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("NotificationDispatcher")
            .field("mode", &self.mode)
            .finish_non_exhaustive()
    }
}

impl NotificationDispatcher {
    pub fn new(sender: Arc<dyn EmailSender>, mode: DeliveryMode) -> Self {
        Self { sender, mode }
    }

    pub fn mode(&self) -> DeliveryMode {
        self.mode
    }

    /// Returns the transport outcome in inline mode. Background mode and
    /// suppressed events return `None`.
    pub async fn dispatch(&self, event: TicketEvent) -> Option<SendOutcome> {
        let Some(email) = build_email(&event) else {
            debug!("No email for {} event", event.name());
            return None;
        };

        match self.mode {
            DeliveryMode::Inline => Some(deliver(self.sender.as_ref(), event.name(), email).await),
            DeliveryMode::Background => {
                let sender = Arc::clone(&self.sender);
                let name = event.name();
                tokio::spawn(async move {
                    deliver(sender.as_ref(), name, email).await;
                });
                None
            }
        }
    }
}

async fn deliver(sender: &dyn EmailSender, event: &str, email: OutboundEmail) -> SendOutcome {
    let outcome = sender
        .send(&email.to, &email.content.subject, &email.content.html)
        .await;
    if outcome.success {
        info!("Sent {event} email to {}", email.to);
    } else {
        warn!(
            "Failed to send {event} email to {}: {}",
            email.to,
            outcome.error.as_deref().unwrap_or("unknown error")
        );
    }
    outcome
}
