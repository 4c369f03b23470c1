//! Territory graph and naval positioning for the wargame turn-resolution
//! engine.
//!
//! This crate models the per-guild territory adjacency graph used by the
//! Movement and Encirclement phases, and the ordered naval position track
//! that is the one piece of ordered multi-row state in the data model
//! (spec.md §9).
//!
//! # Modules
//!
//! - [`adjacency`] -- The territory graph: neighbor lookup, patrol range,
//!   and filtered reachability BFS.
//! - [`naval`] -- Ordered naval unit position sequences.
//! - [`error`] -- Error types for world-graph operations.

pub mod adjacency;
pub mod error;
pub mod naval;

pub use adjacency::{AdjacencyGraph, TerritoryIndex};
pub use error::WorldError;
pub use naval::NavalTrack;
