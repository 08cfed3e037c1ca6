//! Multi-role helpdesk service.
//!
//! Customers open tickets and follow a message thread; agents and admins
//! triage, reply, leave internal notes and move tickets through
//! `OPEN -> PENDING -> SOLVED -> CLOSED`. Every status change leaves a
//! SYSTEM message in the thread and public agent replies are emailed to
//! the customer.

pub mod api_router;
pub mod categories;
pub mod core;
pub mod directory;
pub mod email;
pub mod llm;
pub mod main_module;
pub mod security;
pub mod tickets;

pub use crate::core::config::AppConfig;
pub use crate::core::shared::error::HelpdeskError;
pub use crate::core::shared::state::AppState;
pub use crate::main_module::{build_router, run_axum_server};
