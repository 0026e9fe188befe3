//! HTTP router configuration

use std::sync::Arc;

use axum::{
    Router,
    routing::{get, post},
};

use crate::api::{inventory, system};
use crate::state::AppState;

/// Create the application router
pub fn create_router(state: Arc<AppState>) -> Router {
    Router::new()
        // System endpoints
        .route("/ping", get(system::ping))
        .route("/openapi.json", get(system::openapi))
        // Mutations
        .route("/create/hostgroup", post(inventory::create_hostgroup))
        .route("/create/host", post(inventory::create_host))
        .route("/create/fact", post(inventory::set_host_facts))
        // Listings
        .route("/get/inventory", get(inventory::get_inventory))
        .route("/get/hosts/{hostgroup}", get(inventory::get_hosts))
        // State
        .with_state(state)
}
