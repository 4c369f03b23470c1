//! Error types for the `wargame-world` crate.
//!
//! All fallible operations in this crate return [`WorldError`] through the
//! standard [`Result`] type alias.

use wargame_types::TerritoryKey;

/// Errors that can occur during world-graph operations.
#[derive(Debug, thiserror::Error)]
pub enum WorldError {
    /// A territory referenced by an order or adjacency row is not known
    /// to the guild's rule tables.
    #[error("territory not found: {0}")]
    TerritoryNotFound(TerritoryKey),

    /// Two path steps are not adjacent in the guild's territory graph
    /// (spec.md §4.3 step 1 validation).
    #[error("{from} and {to} are not adjacent")]
    NotAdjacent {
        /// Origin territory.
        from: TerritoryKey,
        /// Destination territory.
        to: TerritoryKey,
    },

    /// A movement path was empty.
    #[error("movement path must contain at least one step")]
    EmptyPath,
}
