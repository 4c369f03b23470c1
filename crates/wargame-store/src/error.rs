//! Error types for the data layer.
//!
//! All errors are propagated via [`StoreError`], which wraps the
//! underlying [`sqlx`] errors with additional context about which
//! operation failed.

/// Errors that can occur in the data layer.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    /// A `PostgreSQL` operation failed.
    #[error("PostgreSQL error: {0}")]
    Postgres(#[from] sqlx::Error),

    /// A `PostgreSQL` migration failed.
    #[error("PostgreSQL migration error: {0}")]
    Migration(#[from] sqlx::migrate::MigrateError),

    /// A JSON payload column failed to (de)serialize.
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// A fetch-by-key found no matching row where the caller required one.
    #[error("not found: {0}")]
    NotFound(String),

    /// A configuration error (connection URL, pool settings).
    #[error("configuration error: {0}")]
    Config(String),

    /// A write would have violated a spec.md §3 entity invariant (e.g. two
    /// owner kinds set at once). Caught at the store boundary rather than
    /// left to a database constraint so the in-memory test double enforces
    /// the same rule as `PostgreSQL`.
    #[error("invariant violation: {0}")]
    InvariantViolation(String),
}
