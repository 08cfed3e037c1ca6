//! Users, customers and public submission links.

pub mod customers;
pub mod router;
pub mod service;
pub mod types;
pub mod users;

pub use router::configure;
pub use service::DirectoryService;
