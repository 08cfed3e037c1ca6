//! Ticket status state machine.
//!
//! Any status may follow any other, including reopening a closed ticket.
//! The only effect of a transition is the SYSTEM audit message that
//! describes it.

use uuid::Uuid;

use crate::core::shared::models::{MessageType, NewMessage, TicketStatus};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StatusTransition {
    pub from: TicketStatus,
    pub to: TicketStatus,
}

impl StatusTransition {
    /// `None` when the status does not actually change.
    pub fn between(from: TicketStatus, to: TicketStatus) -> Option<Self> {
        (from != to).then_some(Self { from, to })
    }

    pub fn audit_content(&self) -> String {
        format!(
            "Estado cambiado de **{}** a **{}**",
            self.from.label(),
            self.to.label()
        )
    }

    /// Audit entry authored by the user who made the change, visible to the
    /// customer.
    pub fn audit_message(&self, ticket_id: Uuid, actor_id: Uuid) -> NewMessage {
        NewMessage {
            ticket_id,
            author_id: actor_id,
            content: self.audit_content(),
            message_type: MessageType::System,
            is_internal: false,
            attachments: Vec::new(),
        }
    }
}
