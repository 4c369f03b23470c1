//! Order dispatch and the nine phase handlers of turn resolution
//! (spec.md §4).
//!
//! Each phase module exposes a single `execute_*_phase` entry point that
//! takes a `&dyn Store`, the guild id and turn number, and returns the
//! events the phase produced. [`core::resolve_turn`] (in `wargame-core`)
//! calls every phase in the fixed sequence from spec.md §2: Beginning,
//! Movement, Combat, Resource Collection, Resource Transfer,
//! Encirclement, Upkeep, Organization, Construction.
//!
//! # Modules
//!
//! - [`error`] -- [`error::OrderError`], the only error a handler can
//!   propagate (a store failure; everything else becomes an
//!   `ORDER_FAILED` event).
//! - [`dispatch`] -- shared helpers for loading a phase's eligible
//!   orders and routing them by [`wargame_types::OrderType`].
//! - [`beginning`] -- faction membership, alliances, wars.
//! - [`hostility`] -- shared war/engagement lookup used by movement and
//!   combat.
//! - [`movement`] -- land and naval movement, engagement, observation.
//! - [`combat`] -- deterministic round resolution between engaged stacks.
//! - [`resource_collection`] -- character and territory production.
//! - [`resource_transfer`] -- one-time and recurring transfers.
//! - [`encirclement`] -- reachability-to-home-territory check.
//! - [`upkeep`] -- faction spending, building upkeep, unit upkeep.
//! - [`organization`] -- disbanding, destruction, recovery.
//! - [`construction`] -- mobilization and construction orders.

pub mod beginning;
pub mod combat;
pub mod construction;
pub mod dispatch;
pub mod encirclement;
pub mod error;
pub mod hostility;
pub mod movement;
pub mod organization;
pub mod resource_collection;
pub mod resource_transfer;
pub mod upkeep;

pub use error::OrderError;

/// Convenience alias used throughout the phase handlers.
pub type OrderResult<T> = Result<T, OrderError>;
