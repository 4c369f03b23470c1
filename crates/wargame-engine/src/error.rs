//! Error types for the engine binary.
//!
//! [`EngineError`] wraps every failure mode that can occur during
//! startup, so `main` can propagate with `?`.

/// Top-level error for the engine binary.
#[derive(Debug, thiserror::Error)]
pub enum EngineError {
    /// Configuration loading failed.
    #[error("config error: {source}")]
    Config {
        /// The underlying config error.
        #[from]
        source: wargame_core::config::ConfigError,
    },

    /// Connecting to `PostgreSQL` or running migrations failed.
    #[error("store error: {source}")]
    Store {
        /// The underlying store error.
        #[from]
        source: wargame_store::StoreError,
    },

    /// The HTTP trigger/query server failed to start or serve.
    #[error("server error: {source}")]
    Server {
        /// The underlying server error.
        #[from]
        source: wargame_api::ServerError,
    },
}
