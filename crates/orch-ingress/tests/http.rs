use std::sync::Arc;

use axum::body::{to_bytes, Body};
use axum::http::{Request, StatusCode};
use orch_bus::{EventBus, InMemoryBus};
use orch_ingress::{router, AppState, Config};
use orch_store::InMemoryStore;
use serde_json::{json, Value};
use tower::ServiceExt;

fn test_state() -> AppState {
    AppState {
        store: Arc::new(InMemoryStore::new()),
        bus: Arc::new(InMemoryBus::default()),
        config: Arc::new(Config::default()),
    }
}

async fn body_json(response: axum::response::Response) -> Value {
    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    serde_json::from_slice(&bytes).unwrap()
}

#[tokio::test]
async fn happy_path_publishes_and_returns_201() {
    let state = test_state();
    let mut bus_rx = state.bus.subscribe(&state.config.topic_reasoning);
    let app = router(state);

    let response = app
        .oneshot(
            Request::post("/messages")
                .header("content-type", "application/json")
                .body(Body::from(json!({"content": "search for cats"}).to_string()))
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::CREATED);
    let body = body_json(response).await;
    assert_eq!(body["state"], "REASONING_REQUESTED");
    assert!(body["conversationId"].is_string());

    let envelope = bus_rx.try_recv().expect("reasoning event should be published");
    assert_eq!(envelope.conversation_id.to_string(), body["conversationId"]);
}

#[tokio::test]
async fn missing_content_is_a_bad_request() {
    let app = router(test_state());

    let response = app
        .oneshot(
            Request::post("/messages")
                .header("content-type", "application/json")
                .body(Body::from(json!({}).to_string()))
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let body = body_json(response).await;
    assert_eq!(body["error"], "Missing or invalid \"content\" field");
}

#[tokio::test]
async fn idempotency_key_replay_short_circuits() {
    let state = test_state();
    let app = router(state);

    let request = || {
        Request::post("/messages")
            .header("content-type", "application/json")
            .header("X-Idempotency-Key", "k1")
            .body(Body::from(json!({"content": "hello"}).to_string()))
            .unwrap()
    };

    let first = app.clone().oneshot(request()).await.unwrap();
    assert_eq!(first.status(), StatusCode::CREATED);
    let first_body = body_json(first).await;

    let second = app.oneshot(request()).await.unwrap();
    assert_eq!(second.status(), StatusCode::OK);
    let second_body = body_json(second).await;
    assert_eq!(second_body["duplicate"], true);
    assert_eq!(second_body["messageId"], first_body["messageId"]);
}

#[tokio::test]
async fn unknown_conversation_returns_404() {
    let app = router(test_state());

    let response = app
        .oneshot(
            Request::get(format!("/conversations/{}", uuid::Uuid::new_v4()))
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn health_reports_ok() {
    let app = router(test_state());

    let response = app
        .oneshot(Request::get("/health").body(Body::empty()).unwrap())
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let body = body_json(response).await;
    assert_eq!(body["status"], "ok");
}
