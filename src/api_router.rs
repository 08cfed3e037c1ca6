//! API Router
//!
//! Combines the endpoints of every module into one router.

use axum::{routing::get, Router};
use std::sync::Arc;

use crate::core::shared::state::AppState;
use crate::main_module::health_check_simple;

pub fn configure_api_routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/health", get(health_check_simple))
        .merge(crate::tickets::configure_tickets_routes())
        .merge(crate::categories::configure_categories_routes())
        .merge(crate::directory::configure())
}
