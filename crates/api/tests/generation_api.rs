mod common;

use axum::http::StatusCode;
use mediagen_pipeline::store::PointsStore;
use serde_json::{json, Value};

use common::{build_test_app, kling_payload, TestApp, STORAGE_BASE};

async fn balance(app: &TestApp, owner_id: &str) -> i64 {
    app.store.balance(owner_id).await.unwrap().unwrap_or(0)
}

async fn submit_kling(app: &TestApp, user_id: &str) -> String {
    let (status, body) = app
        .post_json(
            "/api/v1/ai/video/generations",
            json!({
                "user_id": user_id,
                "model": "kling-v2-1",
                "prompt": "a paper boat in the rain",
                "mode": "std",
                "duration": 5
            }),
        )
        .await;
    assert_eq!(status, StatusCode::OK, "{body}");
    body["data"]["task_id"].as_str().unwrap().to_string()
}

async fn query(app: &TestApp, user_id: &str, task_id: &str) -> (StatusCode, Value) {
    app.post_json(
        "/api/v1/ai/video/task/query",
        json!({ "user_id": user_id, "task_id": task_id }),
    )
    .await
}

#[tokio::test]
async fn generate_reserves_the_resolved_price() {
    let app = build_test_app();
    app.store.deposit("u1", 10);

    let (status, body) = app
        .post_json(
            "/api/v1/ai/video/generations",
            json!({
                "user_id": "u1",
                "model": "kling-v2-1",
                "prompt": "a paper boat in the rain",
                "mode": "std",
                "duration": 5
            }),
        )
        .await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["status"], "SUBMITTED");
    assert!(body["data"]["task_id"].is_string());
    assert_eq!(balance(&app, "u1").await, 0);
    assert_eq!(app.kling.created(), 1);
}

#[tokio::test]
async fn success_webhook_archives_and_keeps_charge() {
    let app = build_test_app();
    app.store.deposit("u1", 10);
    let task_id = submit_kling(&app, "u1").await;

    let (status, body) = app.kling_webhook(kling_payload("kling-1", "succeed")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["outcome"], "succeeded");

    let (status, body) = query(&app, "u1", &task_id).await;
    assert_eq!(status, StatusCode::OK);
    let view = &body["data"];
    assert_eq!(view["task_id"], task_id.as_str());
    assert_eq!(view["status"], "SUCCESS");
    assert_eq!(view["progress"], "100%");
    assert_eq!(
        view["data"]["task_result"]["videos"][0]["url"],
        format!("{STORAGE_BASE}/ai/video/kling-v2-1/u1/{task_id}-0.mp4")
    );
    assert!(!body.to_string().contains("kling-1"), "{body}");
    assert_eq!(balance(&app, "u1").await, 0);

    let (_, body) = app
        .post_json("/api/v1/ai/video/task/list", json!({ "user_id": "u1" }))
        .await;
    assert_eq!(body["data"]["items"][0]["task_id"], task_id.as_str());
    assert!(!body.to_string().contains("kling-1"), "{body}");
}

#[tokio::test]
async fn failure_webhook_refunds_the_charge() {
    let app = build_test_app();
    app.store.deposit("u1", 10);
    let task_id = submit_kling(&app, "u1").await;
    assert_eq!(balance(&app, "u1").await, 0);

    let (status, body) = app.kling_webhook(kling_payload("kling-1", "failed")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["outcome"], "failed");
    assert_eq!(balance(&app, "u1").await, 10);

    let (_, body) = query(&app, "u1", &task_id).await;
    assert_eq!(body["data"]["status"], "FAILURE");
    assert_eq!(body["data"]["fail_reason"], "content moderation");

    // A redelivered failure must not refund again.
    let (_, body) = app.kling_webhook(kling_payload("kling-1", "failed")).await;
    assert_eq!(body["data"]["outcome"], "already_terminal");
    assert_eq!(balance(&app, "u1").await, 10);
}

#[tokio::test]
async fn poll_reconciles_before_the_webhook_arrives() {
    let app = build_test_app();
    app.store.deposit("u1", 10);
    let task_id = submit_kling(&app, "u1").await;

    app.kling.set_status(kling_payload("kling-1", "processing"));
    let (_, body) = query(&app, "u1", &task_id).await;
    assert_eq!(body["data"]["status"], "IN_PROGRESS");
    assert_eq!(body["data"]["progress"], "50%");

    app.kling.set_status(kling_payload("kling-1", "succeed"));
    let (_, body) = query(&app, "u1", &task_id).await;
    assert_eq!(body["data"]["status"], "SUCCESS");
    assert_eq!(app.storage.upload_count(), 1);

    let (status, body) = app.kling_webhook(kling_payload("kling-1", "succeed")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["outcome"], "already_terminal");
    assert_eq!(app.storage.upload_count(), 1);
    assert_eq!(balance(&app, "u1").await, 0);
}

#[tokio::test]
async fn kling_route_accepts_string_durations() {
    let app = build_test_app();
    app.store.deposit("u1", 100);

    let (status, body) = app
        .post_json(
            "/api/v1/ai/video/kling/text2video",
            json!({
                "user_id": "u1",
                "model_name": "kling-v2-1",
                "prompt": "a lighthouse at dusk",
                "mode": "std",
                "duration": "10"
            }),
        )
        .await;

    assert_eq!(status, StatusCode::OK, "{body}");
    assert_eq!(balance(&app, "u1").await, 80);
}

#[tokio::test]
async fn volcengine_prices_from_text_commands() {
    let app = build_test_app();
    app.store.deposit("u1", 100);

    let (status, body) = app
        .post_json(
            "/api/v1/ai/video/volcengine/generation",
            json!({
                "user_id": "u1",
                "model": "doubao-seedance-1-0-pro",
                "content": [
                    { "type": "text", "text": "a fox in snow --resolution 720p --duration 5" }
                ]
            }),
        )
        .await;

    assert_eq!(status, StatusCode::OK, "{body}");
    assert_eq!(balance(&app, "u1").await, 85);
    assert_eq!(app.volcengine.created(), 1);
}

#[tokio::test]
async fn admin_submissions_are_free() {
    let app = build_test_app();

    let (status, _) = app
        .post_json(
            "/api/v1/ai/video/generations",
            json!({
                "user_id": "ops",
                "user_type": "admin",
                "model": "kling-v2-1",
                "prompt": "test card"
            }),
        )
        .await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(app.store.balance("ops").await.unwrap(), None);
}

#[tokio::test]
async fn channel_scoped_query_hides_other_channels() {
    let app = build_test_app();
    app.store.deposit("u1", 10);
    let task_id = submit_kling(&app, "u1").await;

    let (status, _) = app
        .post_json(
            "/api/v1/ai/video/kling/task/query",
            json!({ "user_id": "u1", "task_id": task_id }),
        )
        .await;
    assert_eq!(status, StatusCode::OK);

    let (status, body) = app
        .post_json(
            "/api/v1/ai/video/volcengine/task/query",
            json!({ "user_id": "u1", "task_id": task_id }),
        )
        .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["code"], "INVALID_TASK_ID");
}

#[tokio::test]
async fn list_pages_through_the_owners_tasks() {
    let app = build_test_app();
    app.store.deposit("u1", 30);
    app.store.deposit("u2", 10);
    for _ in 0..3 {
        submit_kling(&app, "u1").await;
    }
    submit_kling(&app, "u2").await;

    let (status, body) = app
        .post_json(
            "/api/v1/ai/video/task/list",
            json!({ "user_id": "u1", "limit": 2 }),
        )
        .await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["total"], 3);
    assert_eq!(body["data"]["limit"], 2);
    assert_eq!(body["data"]["items"].as_array().unwrap().len(), 2);

    let (_, body) = app
        .post_json(
            "/api/v1/ai/video/task/list",
            json!({ "user_id": "u1", "limit": 2, "offset": 2 }),
        )
        .await;
    assert_eq!(body["data"]["items"].as_array().unwrap().len(), 1);
}

#[tokio::test]
async fn model_catalog_lists_video_models() {
    let app = build_test_app();

    let (status, body) = app
        .post_json("/api/v1/ai/video/generation/models", json!({}))
        .await;

    assert_eq!(status, StatusCode::OK);
    let names: Vec<&str> = body["data"]
        .as_array()
        .unwrap()
        .iter()
        .map(|m| m["name"].as_str().unwrap())
        .collect();
    assert_eq!(names, ["kling-v2-1", "doubao-seedance-1-0-pro", "sora-2"]);
}

#[tokio::test]
async fn health_reports_configured_channels() {
    let app = build_test_app();

    let (status, body) = app.get("/health").await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "ok");
    assert_eq!(body["channels"], json!(["kling", "volcengine"]));
}
