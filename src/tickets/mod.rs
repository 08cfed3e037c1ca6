//! Tickets: lifecycle, message thread, status audit, notifications and
//! the AI assistant.

pub mod assistant;
pub mod handlers;
pub mod messages;
pub mod notifications;
pub mod service;
pub mod status;
pub mod types;

pub use assistant::TicketAssistant;
pub use handlers::configure_tickets_routes;
pub use messages::{MessageThread, PostMessage};
pub use notifications::{DeliveryMode, NotificationDispatcher, TicketEvent};
pub use service::TicketService;
pub use status::StatusTransition;
