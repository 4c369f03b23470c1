//! Error types for the turn engine.

/// Errors the turn engine can surface. Every variant here is the "Fatal"
/// kind from spec.md §7: a programmer-level assertion failure that aborts
/// the whole turn. Everything else -- validation errors, resource
/// shortfalls, integrity faults -- is absorbed by the phase handlers
/// themselves and turned into an event, never bubbled up here.
#[derive(Debug, thiserror::Error)]
pub enum TurnError {
    /// A phase handler's underlying store call failed.
    #[error("phase {phase} failed: {source}")]
    Phase {
        /// The phase that was executing when the store call failed.
        phase: wargame_types::Phase,
        /// The underlying error.
        #[source]
        source: wargame_orders::OrderError,
    },

    /// The guild named in `resolve_turn` does not exist.
    #[error("guild {0} not found")]
    GuildNotFound(i64),

    /// The store failed outside of a specific phase handler (loading the
    /// guild row, appending the committed event batch, advancing
    /// `current_turn`).
    #[error(transparent)]
    Store(#[from] wargame_store::StoreError),
}
