//! Standalone herbalism recipe engine (spec.md §4.11).
//!
//! Given an ingredient list, [`engine::make_blend`] determines the
//! resulting product and quantity through a fixed pipeline: alcohol/
//! ingestible/aromatic/salt decision table, subset-recipe match, chakra/
//! tier computation, constraint-recipe match with wildcard ingredient
//! patterns, falling back to a ruined or sludge product. It shares no
//! state and no store dependency with the rest of the engine -- callers
//! (an out-of-scope chat surface, or any future order handler) pass in a
//! read-only [`engine::Catalog`] borrowed from whatever rule tables
//! they've already loaded.
//!
//! # Modules
//!
//! - [`engine`] -- the blending pipeline: [`engine::make_blend`],
//!   [`engine::Catalog`], [`engine::ChakraResult`].
//! - [`error`] -- [`error::HerbalismError`].

pub mod engine;
pub mod error;

pub use engine::{BlendResult, Catalog, ChakraResult, calculate_chakras, make_blend, pattern_matches};
pub use error::HerbalismError;
