use axum::{routing::get, Router};
use std::sync::Arc;

use crate::core::shared::state::AppState;

use super::customers;
use super::users;

pub fn configure() -> Router<Arc<AppState>> {
    Router::new()
        .route(
            "/api/customers",
            get(customers::list_customers).post(customers::create_customer),
        )
        .route(
            "/api/customers/:id",
            get(customers::get_customer)
                .patch(customers::update_customer)
                .delete(customers::delete_customer),
        )
        .route(
            "/api/customers/:id/token",
            get(customers::get_public_token).post(customers::issue_public_token),
        )
        .route("/api/users", get(users::list_users).post(users::create_user))
        .route(
            "/api/profile",
            get(users::get_profile).patch(users::update_profile),
        )
}
