pub mod auth_api;
pub mod cors;
pub mod password;

pub use auth_api::{
    require_caller, require_permission, AuthConfig, Caller, OptionalCaller, Permission, Role,
    TicketVisibility,
};
pub use cors::create_cors_layer;
pub use password::{hash_password, validate_password, verify_password};
