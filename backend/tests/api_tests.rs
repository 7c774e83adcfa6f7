use std::sync::Arc;
use std::time::Duration;

use adapters::memory::{InMemoryCatalog, InMemoryIdentity, StaticSponsored};
use adapters::{CatalogEntity, EntityRef, SponsoredWrapper, UserProfile};
use axum::{
    body::{to_bytes, Body},
    http::{header, Request, StatusCode},
    Router,
};
use futures::StreamExt;
use serde_json::{json, Value};
use tower::ServiceExt;

use toolhub::{app, config::Config, state::AppState};

const ACME_ID: &str = "507f1f77bcf86cd799439011";

struct Harness {
    router: Router,
    catalog: Arc<InMemoryCatalog>,
    identity: Arc<InMemoryIdentity>,
    sponsored: Arc<StaticSponsored>,
}

fn harness() -> Harness {
    let config = Config::from_lookup(|key| match key {
        "TOOLHUB_ID_FORMAT" => Some("opaque".to_string()),
        _ => None,
    })
    .unwrap();

    let catalog = Arc::new(
        InMemoryCatalog::new()
            .with_entity(CatalogEntity::new(ACME_ID, "acme").with_name("Acme").with_votes(10))
            .with_entity(CatalogEntity::new("t1", "tool-one").with_votes(42)),
    );
    let identity = Arc::new(
        InMemoryIdentity::new()
            .with_user(UserProfile::new("u1").with_metadata("theme", json!("dark")))
            .with_session("tok", "u1"),
    );
    let sponsored = Arc::new(StaticSponsored::new(vec![
        SponsoredWrapper::new("acme-sponsored", Some(EntityRef::Unresolved(ACME_ID.to_string()))),
        SponsoredWrapper::new("ghost-sponsored", Some(EntityRef::Unresolved("undefined".to_string()))),
    ]));

    let state = AppState::with_adapters(config, catalog.clone(), identity.clone(), sponsored.clone());
    Harness {
        router: app(state),
        catalog,
        identity,
        sponsored,
    }
}

async fn send(router: &Router, method: &str, uri: &str, token: Option<&str>, body: Option<Value>) -> (StatusCode, Value) {
    let mut request = Request::builder().method(method).uri(uri);
    if let Some(token) = token {
        request = request.header(header::AUTHORIZATION, format!("Bearer {token}"));
    }
    let request = match body {
        Some(body) => request
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(body.to_string()))
            .unwrap(),
        None => request.body(Body::empty()).unwrap(),
    };

    let response = router.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    let value = if bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&bytes).unwrap_or(Value::Null)
    };
    (status, value)
}

#[tokio::test]
async fn sponsored_slug_keeps_display_slug_and_canonical_target() {
    let h = harness();

    let (status, body) = send(&h.router, "GET", "/api/tools/acme-sponsored", None, None).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["entity"]["slug"], "acme-sponsored");
    assert_eq!(body["target_id"], ACME_ID);
    assert_eq!(body["sponsored_slug"], "acme-sponsored");
    assert_eq!(body["upvoted"], false);
}

#[tokio::test]
async fn incomplete_sponsored_listing_is_a_resolution_error() {
    let h = harness();

    let (status, body) = send(&h.router, "GET", "/api/tools/ghost-sponsored", None, None).await;

    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["error"], "identity_resolution");
}

#[tokio::test]
async fn unknown_slug_is_not_found() {
    let h = harness();

    let (status, body) = send(&h.router, "GET", "/api/tools/nope", None, None).await;

    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["error"], "not_found");
}

#[tokio::test]
async fn plain_slugs_resolve_while_sponsored_listings_are_down() {
    let h = harness();
    h.sponsored.fail(true);

    let (status, body) = send(&h.router, "GET", "/api/tools/tool-one", None, None).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["target_id"], "t1");
    assert_eq!(body["sponsored_slug"], Value::Null);
}

#[tokio::test]
async fn signed_out_actions_require_auth() {
    let h = harness();

    let (status, body) = send(&h.router, "POST", "/api/tools/t1/upvote", None, Some(json!({ "current_count": 42 }))).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["error"], "auth_required");

    let (status, _) = send(&h.router, "POST", "/api/tools/t1/save", Some("not-signed-in"), None).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    assert_eq!(h.catalog.vote_calls().await, 0);
    assert_eq!(h.identity.update_calls(), 0);
}

#[tokio::test]
async fn forged_token_cannot_sign_in() {
    let h = harness();

    let (status, _) = send(&h.router, "POST", "/api/auth/sign-in", Some("forged"), None).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn upvote_scenario_updates_count_state_and_profile() {
    let h = harness();

    let (status, body) = send(&h.router, "POST", "/api/auth/sign-in", Some("tok"), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["user_id"], "u1");

    let (status, body) = send(&h.router, "POST", "/api/tools/t1/upvote", Some("tok"), Some(json!({ "current_count": 42 }))).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["votes"], 43);
    assert_eq!(body["upvoted"], true);
    assert_eq!(body["previous_count"], 42);

    let (_, body) = send(&h.router, "GET", "/api/user/actions", Some("tok"), None).await;
    assert_eq!(body["signed_in"], true);
    assert_eq!(body["upvoted"], json!(["t1"]));

    let (_, body) = send(&h.router, "GET", "/api/tools/tool-one", Some("tok"), None).await;
    assert_eq!(body["upvoted"], true);
    assert_eq!(body["entity"]["votes"], 43);

    let metadata = h.identity.metadata_of("u1").await.unwrap();
    assert_eq!(metadata.get("upvoted_tools"), Some(&json!(["t1"])));
    assert_eq!(metadata.get("theme"), Some(&json!("dark")));
}

#[tokio::test]
async fn placeholder_target_is_rejected() {
    let h = harness();
    send(&h.router, "POST", "/api/auth/sign-in", Some("tok"), None).await;

    let (status, body) = send(&h.router, "POST", "/api/tools/temp-123/upvote", Some("tok"), None).await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "invalid_target");
    assert_eq!(h.catalog.vote_calls().await, 0);
}

#[tokio::test]
async fn sign_out_clears_session_state() {
    let h = harness();
    send(&h.router, "POST", "/api/auth/sign-in", Some("tok"), None).await;
    let (status, body) = send(&h.router, "POST", "/api/tools/t1/save", Some("tok"), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["saved"], true);

    let (status, _) = send(&h.router, "POST", "/api/auth/sign-out", Some("tok"), None).await;
    assert_eq!(status, StatusCode::NO_CONTENT);

    let (_, body) = send(&h.router, "GET", "/api/user/actions", Some("tok"), None).await;
    assert_eq!(body["signed_in"], false);
    assert_eq!(body["saved"], json!([]));

    let metadata = h.identity.metadata_of("u1").await.unwrap();
    assert_eq!(metadata.get("saved_tools"), Some(&json!(["t1"])));
}

#[tokio::test]
async fn vote_stream_opens_for_signed_in_sessions() {
    let h = harness();

    let request = Request::builder()
        .uri("/api/tools/t1/votes")
        .body(Body::empty())
        .unwrap();
    let response = h.router.clone().oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);

    send(&h.router, "POST", "/api/auth/sign-in", Some("tok"), None).await;
    let request = Request::builder()
        .uri("/api/tools/t1/votes")
        .header(header::AUTHORIZATION, "Bearer tok")
        .body(Body::empty())
        .unwrap();
    let response = h.router.clone().oneshot(request).await.unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(
        response.headers().get(header::CONTENT_TYPE).unwrap(),
        "text/event-stream"
    );
}

#[tokio::test]
async fn vote_stream_delivers_only_its_entity() {
    let h = harness();
    send(&h.router, "POST", "/api/auth/sign-in", Some("tok"), None).await;

    let request = Request::builder()
        .uri("/api/tools/t1/votes")
        .header(header::AUTHORIZATION, "Bearer tok")
        .body(Body::empty())
        .unwrap();
    let response = h.router.clone().oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let mut frames = response.into_body().into_data_stream();

    let (status, _) = send(&h.router, "POST", &format!("/api/tools/{ACME_ID}/upvote"), Some("tok"), Some(json!({ "current_count": 10 }))).await;
    assert_eq!(status, StatusCode::OK);
    let (status, _) = send(&h.router, "POST", "/api/tools/t1/upvote", Some("tok"), Some(json!({ "current_count": 42 }))).await;
    assert_eq!(status, StatusCode::OK);

    let mut received = String::new();
    while !received.contains("\n\n") {
        let chunk = tokio::time::timeout(Duration::from_secs(2), frames.next())
            .await
            .expect("no vote event within 2s")
            .expect("stream ended")
            .unwrap();
        received.push_str(std::str::from_utf8(&chunk).unwrap());
    }

    let frame = received.split("\n\n").next().unwrap();
    assert!(frame.contains("event: vote"));
    let data = frame
        .lines()
        .find_map(|line| line.strip_prefix("data: "))
        .unwrap();
    let event: Value = serde_json::from_str(data).unwrap();
    assert_eq!(event["entity_id"], "t1");
    assert_eq!(event["new_count"], 43);
    assert_eq!(event["upvoted"], true);
}
