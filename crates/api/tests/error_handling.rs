mod common;

use std::sync::atomic::Ordering;

use axum::body::Body;
use axum::http::{Request, StatusCode};
use mediagen_core::webhook_auth;
use mediagen_pipeline::store::PointsStore;
use serde_json::json;

use common::{build_test_app, kling_payload, KLING_WEBHOOK_SECRET};

fn kling_request() -> serde_json::Value {
    json!({
        "user_id": "u1",
        "model": "kling-v2-1",
        "prompt": "a paper boat in the rain",
        "mode": "std",
        "duration": 5
    })
}

#[tokio::test]
async fn insufficient_balance_is_402_and_creates_nothing() {
    let app = build_test_app();
    app.store.deposit("u1", 5);

    let (status, body) = app
        .post_json("/api/v1/ai/video/generations", kling_request())
        .await;

    assert_eq!(status, StatusCode::PAYMENT_REQUIRED);
    assert_eq!(body["code"], "INSUFFICIENT_BALANCE");
    assert_eq!(app.store.task_count(), 0);
    assert_eq!(app.kling.created(), 0);
    assert_eq!(app.store.balance("u1").await.unwrap(), Some(5));
}

#[tokio::test]
async fn unknown_model_is_400() {
    let app = build_test_app();

    let (status, body) = app
        .post_json(
            "/api/v1/ai/video/generations",
            json!({ "user_id": "u1", "model": "veo-3", "prompt": "x" }),
        )
        .await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["code"], "INVALID_MODEL");
}

#[tokio::test]
async fn model_of_another_channel_is_400() {
    let app = build_test_app();
    app.store.deposit("u1", 100);

    let (status, body) = app
        .post_json(
            "/api/v1/ai/video/volcengine/generation",
            json!({
                "user_id": "u1",
                "model": "kling-v2-1",
                "content": [{ "type": "text", "text": "x" }]
            }),
        )
        .await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["code"], "INVALID_MODEL");
    assert_eq!(app.store.balance("u1").await.unwrap(), Some(100));
}

#[tokio::test]
async fn unconfigured_channel_is_400() {
    let app = build_test_app();
    app.store.deposit("u1", 100);

    let (status, body) = app
        .post_json(
            "/api/v1/ai/video/sora2/generation",
            json!({
                "user_id": "u1",
                "model": "sora-2",
                "prompt": "x",
                "images": ["https://img/a.png"],
                "duration": 10
            }),
        )
        .await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["code"], "INVALID_MODEL");
}

#[tokio::test]
async fn missing_image_is_a_validation_error() {
    let app = build_test_app();
    app.store.deposit("u1", 100);

    let (status, body) = app
        .post_json(
            "/api/v1/ai/video/kling/image2video",
            json!({ "user_id": "u1", "model_name": "kling-v2-1", "prompt": "x" }),
        )
        .await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["code"], "VALIDATION_ERROR");
    assert_eq!(app.store.balance("u1").await.unwrap(), Some(100));
}

#[tokio::test]
async fn provider_create_failure_is_502_and_refunded() {
    let app = build_test_app();
    app.store.deposit("u1", 10);
    app.kling.fail_create.store(true, Ordering::SeqCst);

    let (status, body) = app
        .post_json("/api/v1/ai/video/generations", kling_request())
        .await;

    assert_eq!(status, StatusCode::BAD_GATEWAY);
    assert_eq!(body["code"], "PROVIDER_CREATE_FAILURE");
    assert_eq!(app.store.balance("u1").await.unwrap(), Some(10));
    assert_eq!(app.store.task_count(), 0);
}

#[tokio::test]
async fn unknown_and_foreign_task_ids_are_404() {
    let app = build_test_app();
    app.store.deposit("u1", 10);
    let (_, body) = app
        .post_json("/api/v1/ai/video/generations", kling_request())
        .await;
    let task_id = body["data"]["task_id"].as_str().unwrap().to_string();

    for (user_id, id) in [
        ("u1", "not-a-uuid".to_string()),
        ("u1", "0190b4a8-0000-7000-8000-000000000000".to_string()),
        ("u2", task_id),
    ] {
        let (status, body) = app
            .post_json(
                "/api/v1/ai/video/task/query",
                json!({ "user_id": user_id, "task_id": id }),
            )
            .await;
        assert_eq!(status, StatusCode::NOT_FOUND, "{user_id} {id}");
        assert_eq!(body["code"], "INVALID_TASK_ID");
    }
}

#[tokio::test]
async fn empty_user_id_is_400() {
    let app = build_test_app();

    let (status, body) = app
        .post_json(
            "/api/v1/ai/video/task/list",
            json!({ "user_id": "" }),
        )
        .await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["code"], "BAD_REQUEST");
}

#[tokio::test]
async fn webhook_without_credentials_is_401() {
    let app = build_test_app();
    app.store.deposit("u1", 10);
    app.post_json("/api/v1/ai/video/generations", kling_request())
        .await;

    let request = Request::builder()
        .method("POST")
        .uri("/api/v1/callbacks/kling?token=wrong")
        .header("content-type", "application/json")
        .body(Body::from(kling_payload("kling-1", "failed").to_string()))
        .unwrap();
    let (status, body) = app.send(request).await;

    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["code"], "UNAUTHORIZED");
    // Nothing was applied: no refund.
    assert_eq!(app.store.balance("u1").await.unwrap(), Some(0));
}

#[tokio::test]
async fn webhook_for_channel_without_secret_is_401() {
    let app = build_test_app();
    app.store.deposit("u1", 100);
    let (status, _) = app
        .post_json(
            "/api/v1/ai/video/volcengine/generation",
            json!({
                "user_id": "u1",
                "model": "doubao-seedance-1-0-pro",
                "content": [{ "type": "text", "text": "x --resolution 720p --duration 5" }]
            }),
        )
        .await;
    assert_eq!(status, StatusCode::OK);

    let (status, body) = app
        .post_json(
            "/api/v1/callbacks/volcengine?token=anything",
            json!({ "id": "volcengine-1", "status": "failed" }),
        )
        .await;

    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["code"], "UNAUTHORIZED");
    assert_eq!(app.store.balance("u1").await.unwrap(), Some(85));
}

#[tokio::test]
async fn signed_webhook_is_accepted() {
    let app = build_test_app();
    app.store.deposit("u1", 10);
    app.post_json("/api/v1/ai/video/generations", kling_request())
        .await;

    let payload = kling_payload("kling-1", "failed").to_string();
    let signature = webhook_auth::sign_payload(KLING_WEBHOOK_SECRET, payload.as_bytes());
    let request = Request::builder()
        .method("POST")
        .uri("/api/v1/callbacks/kling")
        .header("content-type", "application/json")
        .header("x-signature", signature)
        .body(Body::from(payload))
        .unwrap();
    let (status, body) = app.send(request).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["outcome"], "failed");
    assert_eq!(app.store.balance("u1").await.unwrap(), Some(10));
}

#[tokio::test]
async fn webhook_for_unknown_task_is_acknowledged() {
    let app = build_test_app();

    let (status, body) = app.kling_webhook(kling_payload("kling-999", "succeed")).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["outcome"], "unknown_task");
}

#[tokio::test]
async fn malformed_webhook_body_is_400() {
    let app = build_test_app();

    let request = Request::builder()
        .method("POST")
        .uri(format!("/api/v1/callbacks/kling?token={KLING_WEBHOOK_SECRET}"))
        .header("content-type", "application/json")
        .body(Body::from("not json"))
        .unwrap();
    let (status, body) = app.send(request).await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["code"], "VALIDATION_ERROR");
}

#[tokio::test]
async fn webhook_for_unknown_channel_is_400() {
    let app = build_test_app();

    let (status, body) = app
        .post_json("/api/v1/callbacks/midjourney", json!({}))
        .await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["code"], "VALIDATION_ERROR");
}

#[tokio::test]
async fn responses_carry_a_request_id() {
    use tower::ServiceExt;

    let app = build_test_app();
    let response = app
        .router
        .clone()
        .oneshot(Request::builder().uri("/health").body(Body::empty()).unwrap())
        .await
        .unwrap();

    assert!(response.headers().contains_key("x-request-id"));
}
