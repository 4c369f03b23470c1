//! REST endpoint handlers for the turn-resolution trigger/query surface.
//!
//! # Endpoints
//!
//! | Method | Path | Description |
//! |--------|------|-------------|
//! | `GET`  | `/` | Minimal HTML status page |
//! | `POST` | `/guilds/:guild_id/turns/resolve` | Run `resolve_turn` once |
//! | `GET`  | `/guilds/:guild_id/events` | Query the event log |

use std::sync::Arc;

use axum::extract::{Path, Query, State};
use axum::response::{Html, IntoResponse};
use axum::Json;
use wargame_types::ids::GuildId;

use crate::error::ApiError;
use crate::state::AppState;

/// Serve a minimal HTML status page linking the two JSON endpoints.
pub async fn index() -> impl IntoResponse {
    Html(
        r#"<!DOCTYPE html>
<html lang="en">
<head>
    <meta charset="utf-8">
    <title>Wargame Turn Engine</title>
    <style>
        body {
            background: #0d1117;
            color: #c9d1d9;
            font-family: 'Cascadia Code', 'Fira Code', 'Consolas', monospace;
            padding: 2rem;
            max-width: 800px;
            margin: 0 auto;
        }
        h1 { color: #58a6ff; margin-bottom: 0.25rem; }
        a { color: #58a6ff; text-decoration: none; }
        a:hover { text-decoration: underline; }
        ul { list-style: none; padding: 0; }
        li { padding: 0.3rem 0; }
    </style>
</head>
<body>
    <h1>Wargame Turn Engine</h1>
    <p>Status: <span style="color:#3fb950;font-weight:bold;">RUNNING</span></p>
    <h2>Endpoints</h2>
    <ul>
        <li><code>POST /guilds/:guild_id/turns/resolve</code> -- resolve one turn</li>
        <li><code>GET /guilds/:guild_id/events?turn=&character_id=</code> -- query the event log</li>
    </ul>
</body>
</html>"#,
    )
}

/// `POST /guilds/:guild_id/turns/resolve`.
///
/// Runs exactly one `resolve_turn` for the named guild (spec.md §6
/// "Inputs from outside the core: a tick/trigger to run
/// `resolve_turn(guild_id)`"), and returns the `(success, message,
/// events[])` tuple as JSON (spec.md §6 "Outputs: Return").
///
/// A `TurnError` (a Fatal per spec.md §7) surfaces as a `500` with the
/// error's message; it never partially commits (the engine's own
/// all-or-nothing guarantee, spec.md §5 "Cancellation and timeouts").
pub async fn resolve_turn(
    State(state): State<Arc<AppState>>,
    Path(guild_id): Path<i64>,
) -> Result<impl IntoResponse, ApiError> {
    let outcome = wargame_core::resolve_turn(state.store.as_ref(), GuildId::new(guild_id)).await?;
    Ok(Json(outcome))
}

/// Query parameters for `GET /guilds/:guild_id/events`.
#[derive(Debug, serde::Deserialize)]
pub struct EventsQuery {
    /// Restrict to one turn number.
    pub turn: Option<u32>,
    /// Restrict to events whose `affected_character_ids` contains this
    /// character (spec.md §6 "per-character report filtering").
    pub character_id: Option<i64>,
}

/// `GET /guilds/:guild_id/events?turn=&character_id=`.
///
/// A read-only query over the event log (spec.md §7 "External
/// Interfaces... the query surface, not the rendering, which stays out
/// of scope"). `turn` is pushed down to the store; `character_id`
/// filters client-side against each event's `affected_character_ids`
/// since that list lives inside `event_data` rather than an indexed
/// column (spec.md §6 "every `event_data` MUST contain
/// `affected_character_ids`").
pub async fn list_events(
    State(state): State<Arc<AppState>>,
    Path(guild_id): Path<i64>,
    Query(params): Query<EventsQuery>,
) -> Result<impl IntoResponse, ApiError> {
    let events = state.store.list_events(GuildId::new(guild_id), params.turn).await?;

    let events: Vec<_> = events
        .into_iter()
        .filter(|e| {
            params
                .character_id
                .is_none_or(|cid| e.affected_character_ids().contains(&cid))
        })
        .collect();

    Ok(Json(serde_json::json!({
        "count": events.len(),
        "events": events,
    })))
}
