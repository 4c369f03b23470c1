//! Error types for phase handlers.
//!
//! Handlers never propagate a validation failure as an `Err` -- a bad
//! order becomes a FAILED status plus an `ORDER_FAILED` event, per the
//! propagation policy every handler follows. [`OrderError`] exists only
//! for the one thing a handler genuinely cannot recover from: the store
//! itself returning an error.

/// Errors surfaced by a phase driver when the store call underneath a
/// handler fails. A phase that hits this aborts the turn; the caller sees
/// `(false, message, [])` and the turn counter is not advanced.
#[derive(Debug, thiserror::Error)]
pub enum OrderError {
    /// The store failed to read or write a row.
    #[error(transparent)]
    Store(#[from] wargame_store::StoreError),
}
