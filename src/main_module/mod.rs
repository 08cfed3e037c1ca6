//! Server startup split from main.rs

mod health;
mod server;

pub use health::*;
pub use server::*;
