//! Integration tests for the turn-resolution HTTP endpoints.
//!
//! Tests use Axum's `Router` directly via `tower::ServiceExt` without
//! starting a TCP server, against an [`InMemoryStore`] double.

#![allow(clippy::unwrap_used)]

use std::sync::Arc;

use axum::body::Body;
use axum::http::{Request, StatusCode};
use serde_json::Value;
use tower::ServiceExt;
use wargame_api::router::build_router;
use wargame_api::state::AppState;
use wargame_store::InMemoryStore;
use wargame_types::ids::GuildId;
use wargame_types::Guild;

async fn make_test_state() -> (Arc<AppState>, GuildId) {
    let store = InMemoryStore::new();
    let guild_id = GuildId::new(1);
    store
        .seed_guild(Guild { id: guild_id, current_turn: 0, max_movement_stat: 10 })
        .await;

    (Arc::new(AppState::new(Arc::new(store))), guild_id)
}

async fn body_to_json(body: Body) -> Value {
    let bytes = axum::body::to_bytes(body, usize::MAX).await.unwrap();
    serde_json::from_slice(&bytes).unwrap()
}

#[tokio::test]
async fn test_index_returns_html() {
    let (state, _) = make_test_state().await;
    let router = build_router(state);

    let response = router.oneshot(Request::get("/").body(Body::empty()).unwrap()).await.unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let content_type = response.headers().get("content-type").unwrap().to_str().unwrap();
    assert!(content_type.contains("text/html"));
}

#[tokio::test]
async fn test_resolve_turn_on_empty_guild_succeeds() {
    let (state, guild_id) = make_test_state().await;
    let router = build_router(state);

    let path = format!("/guilds/{}/turns/resolve", guild_id.into_inner());
    let response = router
        .oneshot(Request::post(&path).body(Body::empty()).unwrap())
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let json = body_to_json(response.into_body()).await;
    assert_eq!(json["success"], true);
    assert_eq!(json["turn_number"], 0);
    assert!(json["events"].as_array().unwrap().is_empty());
}

#[tokio::test]
async fn test_resolve_turn_missing_guild_returns_500() {
    let (state, _) = make_test_state().await;
    let router = build_router(state);

    let response = router
        .oneshot(Request::post("/guilds/999/turns/resolve").body(Body::empty()).unwrap())
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
}

#[tokio::test]
async fn test_list_events_empty_guild_returns_empty() {
    let (state, guild_id) = make_test_state().await;
    let router = build_router(state);

    let path = format!("/guilds/{}/events", guild_id.into_inner());
    let response = router.oneshot(Request::get(&path).body(Body::empty()).unwrap()).await.unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let json = body_to_json(response.into_body()).await;
    assert_eq!(json["count"], 0);
}

#[tokio::test]
async fn test_list_events_after_resolve_turn_returns_events() {
    let (state, guild_id) = make_test_state().await;
    let router = build_router(state);

    let resolve_path = format!("/guilds/{}/turns/resolve", guild_id.into_inner());
    let resolve_response = router
        .clone()
        .oneshot(Request::post(&resolve_path).body(Body::empty()).unwrap())
        .await
        .unwrap();
    assert_eq!(resolve_response.status(), StatusCode::OK);

    let events_path = format!("/guilds/{}/events", guild_id.into_inner());
    let events_response = router
        .oneshot(Request::get(&events_path).body(Body::empty()).unwrap())
        .await
        .unwrap();

    assert_eq!(events_response.status(), StatusCode::OK);
    let json = body_to_json(events_response.into_body()).await;
    assert_eq!(json["count"], json["events"].as_array().unwrap().len());
}

#[tokio::test]
async fn test_list_events_filter_by_turn_no_match() {
    let (state, guild_id) = make_test_state().await;
    let router = build_router(state);

    let path = format!("/guilds/{}/events?turn=999", guild_id.into_inner());
    let response = router.oneshot(Request::get(&path).body(Body::empty()).unwrap()).await.unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let json = body_to_json(response.into_body()).await;
    assert_eq!(json["count"], 0);
}

#[tokio::test]
async fn test_nonexistent_route_returns_404() {
    let (state, _) = make_test_state().await;
    let router = build_router(state);

    let response = router
        .oneshot(Request::get("/api/nonexistent").body(Body::empty()).unwrap())
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}
