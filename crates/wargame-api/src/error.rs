//! Error types for the HTTP trigger/query surface.
//!
//! [`ApiError`] unifies every failure mode this crate can surface into
//! one enum with a single [`IntoResponse`](axum::response::IntoResponse)
//! implementation, mirroring the teacher's `ObserverError` shape.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};

/// Errors that can occur in the HTTP layer.
#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    /// The guild named in the request path does not exist.
    #[error("not found: {0}")]
    NotFound(String),

    /// An invalid query parameter was provided.
    #[error("invalid query: {0}")]
    InvalidQuery(String),

    /// `resolve_turn` hit a Fatal error (spec.md §7): a programmer-level
    /// assertion failure that aborted the turn before anything committed.
    #[error(transparent)]
    Turn(#[from] wargame_core::TurnError),

    /// The store failed outside of turn resolution (a read for the
    /// events query endpoint).
    #[error(transparent)]
    Store(#[from] wargame_store::StoreError),
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, message) = match &self {
            Self::NotFound(msg) => (StatusCode::NOT_FOUND, msg.clone()),
            Self::InvalidQuery(msg) => (StatusCode::BAD_REQUEST, msg.clone()),
            Self::Turn(e) => (StatusCode::INTERNAL_SERVER_ERROR, e.to_string()),
            Self::Store(e) => (StatusCode::INTERNAL_SERVER_ERROR, e.to_string()),
        };

        let body = serde_json::json!({
            "error": message,
            "status": status.as_u16(),
        });

        (status, axum::Json(body)).into_response()
    }
}
