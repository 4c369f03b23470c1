//! HTTP trigger/query surface for the turn-resolution engine
//! (SPEC_FULL.md §7 "External Interfaces").
//!
//! This crate provides an Axum HTTP server that exposes:
//!
//! - `POST /guilds/:guild_id/turns/resolve` -- triggers
//!   [`wargame_core::resolve_turn`] for one guild and returns its
//!   outcome.
//! - `GET /guilds/:guild_id/events` -- a read-only query over the event
//!   log, optionally filtered by turn and by affected character.
//! - `GET /` -- a minimal HTML status page.
//!
//! # Architecture
//!
//! This API has no background tick loop: every request reads or writes
//! straight through the [`Store`](wargame_store::Store) handle in
//! [`AppState`], since `resolve_turn` itself is the only thing that
//! advances state.

pub mod error;
pub mod handlers;
pub mod router;
pub mod server;
pub mod state;

pub use error::ApiError;
pub use router::build_router;
pub use server::{start_server, ServerConfig, ServerError};
pub use state::AppState;
