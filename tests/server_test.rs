mod helpers;

use axum::body::{to_bytes, Body};
use axum::http::{header, Request, StatusCode};
use docent::interactions::recent_interactions;
use docent::server::{router, AppState};
use helpers::{harness, passage, temp_pool, Harness};
use serde_json::{json, Value};
use tempfile::TempDir;
use tower::ServiceExt;

fn app(h: &Harness, tmp: &TempDir) -> (axum::Router, std::sync::Arc<docent::db::DbPool>) {
    let pool = temp_pool(tmp);
    let state = AppState {
        pipeline: h.pipeline.clone(),
        pool: pool.clone(),
    };
    (router(state), pool)
}

fn post_json(uri: &str, body: Value) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri(uri)
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from(body.to_string()))
        .unwrap()
}

async fn body_json(response: axum::response::Response) -> Value {
    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    serde_json::from_slice(&bytes).unwrap()
}

#[tokio::test]
async fn chat_streams_plain_text() {
    let tmp = TempDir::new().unwrap();
    let h = harness(vec![passage("AWP means average wholesale price.", 0.9)], "AWP is a price.");
    let (app, _) = app(&h, &tmp);

    let response = app
        .oneshot(post_json(
            "/api/chat",
            json!({
                "messages": [{"role": "user", "content": "What is AWP?"}],
                "userId": "user-42"
            }),
        ))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(
        response.headers()[header::CONTENT_TYPE],
        "text/plain; charset=utf-8"
    );
    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    assert_eq!(&bytes[..], b"AWP is a price.");
}

#[tokio::test]
async fn chat_without_messages_is_a_500_with_no_upstream_calls() {
    let tmp = TempDir::new().unwrap();
    let h = harness(Vec::new(), "unused");
    let (app, _) = app(&h, &tmp);

    let response = app
        .oneshot(post_json("/api/chat", json!({"userId": "user-42"})))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    assert!(body_json(response).await["error"].is_string());
    assert_eq!(h.embed_calls(), 0);
    assert!(h.prompts().is_empty());
}

#[tokio::test]
async fn chat_upstream_failure_hides_details() {
    let tmp = TempDir::new().unwrap();
    let h = helpers::failing_embedder_harness();
    let (app, _) = app(&h, &tmp);

    let response = app
        .oneshot(post_json(
            "/api/chat",
            json!({
                "messages": [{"role": "user", "content": "What is AWP?"}],
                "userId": "user-42"
            }),
        ))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    let body = body_json(response).await;
    assert_eq!(body, json!({"error": "Internal Server Error"}));
}

#[tokio::test]
async fn log_appends_interaction() {
    let tmp = TempDir::new().unwrap();
    let h = harness(Vec::new(), "unused");
    let (app, pool) = app(&h, &tmp);

    let response = app
        .oneshot(post_json(
            "/api/log",
            json!({
                "userId": "user-42",
                "question": "What is AWP?",
                "response": "The average wholesale price."
            }),
        ))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(body_json(response).await, json!({"success": true}));

    let records = pool
        .run(|conn| recent_interactions(conn, "user-42", 10))
        .await
        .unwrap();
    assert_eq!(records.len(), 1);
    assert_eq!(records[0].question, "What is AWP?");
}

#[tokio::test]
async fn log_with_missing_fields_is_a_500() {
    let tmp = TempDir::new().unwrap();
    let h = harness(Vec::new(), "unused");
    let (app, _) = app(&h, &tmp);

    let response = app
        .oneshot(post_json("/api/log", json!({"userId": "user-42"})))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    assert!(body_json(response).await["error"].is_string());
}

#[tokio::test]
async fn health_reports_version() {
    let tmp = TempDir::new().unwrap();
    let h = harness(Vec::new(), "unused");
    let (app, _) = app(&h, &tmp);

    let response = app
        .oneshot(Request::builder().uri("/health").body(Body::empty()).unwrap())
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let body = body_json(response).await;
    assert_eq!(body["status"], "ok");
    assert_eq!(body["version"], env!("CARGO_PKG_VERSION"));
}
