//! Axum router construction for the turn-resolution trigger/query
//! surface.
//!
//! Assembles the two routes into a single [`Router`] with CORS and
//! tracing middleware.

use std::sync::Arc;

use axum::routing::{get, post};
use axum::Router;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use crate::handlers;
use crate::state::AppState;

/// Build the complete Axum router for the turn-resolution server.
///
/// - `GET /` -- minimal HTML status page
/// - `POST /guilds/:guild_id/turns/resolve` -- resolve one turn
/// - `GET /guilds/:guild_id/events` -- query the event log
///
/// CORS is configured to allow any origin; this server has no
/// authentication layer of its own (spec.md Non-goals).
pub fn build_router(state: Arc<AppState>) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .route("/", get(handlers::index))
        .route("/guilds/{guild_id}/turns/resolve", post(handlers::resolve_turn))
        .route("/guilds/{guild_id}/events", get(handlers::list_events))
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
