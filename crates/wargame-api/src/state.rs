//! Shared application state for the HTTP trigger/query surface.
//!
//! [`AppState`] holds the single [`Store`] handle every handler reads and
//! writes through. There is no background loop to read from:
//! `resolve_turn` runs synchronously inside the request handler and the
//! store is the only source of truth.

use std::sync::Arc;

use wargame_store::Store;

/// Shared state for the Axum application.
///
/// Wrapped in [`Arc`] and injected via Axum's `State` extractor. `store`
/// is itself `Send + Sync` (the [`Store`] trait requires it), so cloning
/// the `Arc` is the only synchronization this crate needs.
#[derive(Clone)]
pub struct AppState {
    /// The store every handler reads and writes through.
    pub store: Arc<dyn Store>,
}

impl AppState {
    /// Build application state over a store handle.
    #[must_use]
    pub fn new(store: Arc<dyn Store>) -> Self {
        Self { store }
    }
}
