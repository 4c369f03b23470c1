//! Resource balance primitives for the wargame turn-resolution engine.
//!
//! Every owed payment in turn resolution -- faction spending, building
//! upkeep, unit upkeep, a resource transfer, territory/character
//! production -- shares one shape: deduct what's owed from what's
//! available, never below zero, and report which resource kinds came up
//! short. This crate is that shared arithmetic, factored out so the
//! phase handlers in `wargame-orders` (§4.5–§4.8) don't each reimplement
//! it.
//!
//! # Modules
//!
//! - [`balance`] -- `deduct`/`credit`/`sum` over [`wargame_types::ResourceMap`].

pub mod balance;

pub use balance::{Deduction, credit, deduct, sum};
