//! Caller identity and the role model.
//!
//! Credential storage and token issuance belong to the login flow; this module
//! only resolves a bearer token into a [`Caller`] and answers permission
//! questions about it.

pub mod config;
pub mod middleware;
pub mod types;

pub use config::{AuthConfig, Claims};
pub use middleware::OptionalCaller;
pub use types::{
    require_caller, require_permission, Caller, Permission, Role, TicketVisibility,
};
