//! Application state shared across HTTP handlers

use std::sync::Arc;

use hostvars_core::Inventory;

/// Application state shared across all handlers
#[derive(Clone)]
pub struct AppState {
    /// The inventory served by this daemon
    pub inventory: Arc<Inventory>,
}

impl AppState {
    /// Create new application state
    pub fn new(inventory: Arc<Inventory>) -> Self {
        Self { inventory }
    }
}
