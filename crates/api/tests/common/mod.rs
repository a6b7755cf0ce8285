#![allow(dead_code)]

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use axum::body::Body;
use axum::http::{Request, StatusCode};
use axum::Router;
use http_body_util::BodyExt;
use mediagen_core::channels::Channel;
use mediagen_core::model_config::ModelRegistry;
use mediagen_core::pricing::PricingDimensions;
use mediagen_pipeline::memory::{MemoryObjectStorage, MemoryStore};
use mediagen_pipeline::{AssetArchiver, GenerationService};
use mediagen_providers::kling::{KlingAdapter, KlingConfig};
use mediagen_providers::volcengine::{VolcengineAdapter, VolcengineConfig};
use mediagen_providers::{
    AdapterRegistry, CanonicalRequest, CreatedTask, ProviderAdapter, ProviderError, WebhookAuth,
};
use serde_json::{json, Value};
use tower::ServiceExt;

use mediagen_api::config::ServerConfig;
use mediagen_api::router::build_app_router;
use mediagen_api::state::AppState;

pub const KLING_WEBHOOK_SECRET: &str = "kling-hook-secret";
pub const KLING_VIDEO_URL: &str = "https://cdn.kling/out.mp4";
pub const STORAGE_BASE: &str = "https://oss.example";

const CATALOG: &str = r#"{
    "models": [
        {
            "name": "kling-v2-1",
            "channel": "kling",
            "modes": ["text2video", "image2video", "multi-image2video"],
            "durations": [5, 10],
            "defaults": { "mode": "std", "duration": 5 },
            "pricing": [
                { "mode": "std", "duration": 5, "price": 10 },
                { "mode": "std", "duration": 10, "price": 20 },
                { "mode": "pro", "duration": 5, "price": 35 }
            ]
        },
        {
            "name": "doubao-seedance-1-0-pro",
            "channel": "volcengine",
            "defaults": { "resolution": "1080p", "duration": 5 },
            "pricing": [
                { "resolution": "1080p", "duration": 5, "price": 30 },
                { "resolution": "720p", "duration": 5, "price": 15 }
            ]
        },
        {
            "name": "sora-2",
            "channel": "sora2",
            "pricing": [{ "price": 50 }]
        },
        {
            "name": "seedream-3",
            "channel": "volcengine",
            "mediaType": "image",
            "pricing": [{ "price": 2 }]
        }
    ]
}"#;

/// Build a test `ServerConfig` with safe defaults.
pub fn test_config() -> ServerConfig {
    ServerConfig {
        host: "127.0.0.1".to_string(),
        port: 0,
        cors_origins: vec!["http://localhost:5173".to_string()],
        request_timeout_secs: 30,
        shutdown_timeout_secs: 30,
        database_url: "postgres://unused".to_string(),
        models_config_path: "unused".to_string(),
        archive_retry_interval_secs: 60,
        archive_batch_size: 20,
    }
}

/// A provider whose HTTP side is scripted; request rules and webhook
/// parsing come from the real adapter.
pub struct ScriptedAdapter {
    rules: Box<dyn ProviderAdapter>,
    pub fail_create: AtomicBool,
    created: AtomicUsize,
    status: Mutex<Value>,
}

impl ScriptedAdapter {
    fn new(rules: Box<dyn ProviderAdapter>) -> Self {
        Self {
            rules,
            fail_create: AtomicBool::new(false),
            created: AtomicUsize::new(0),
            status: Mutex::new(Value::Null),
        }
    }

    pub fn set_status(&self, value: Value) {
        *self.status.lock().unwrap() = value;
    }

    pub fn created(&self) -> usize {
        self.created.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl ProviderAdapter for ScriptedAdapter {
    fn channel(&self) -> Channel {
        self.rules.channel()
    }

    fn resolve_action(&self, request: &CanonicalRequest) -> Result<String, ProviderError> {
        self.rules.resolve_action(request)
    }

    fn pricing_dimensions(&self, request: &CanonicalRequest) -> PricingDimensions {
        self.rules.pricing_dimensions(request)
    }

    async fn create(
        &self,
        _request: &CanonicalRequest,
        _action: &str,
    ) -> Result<CreatedTask, ProviderError> {
        if self.fail_create.load(Ordering::SeqCst) {
            return Err(ProviderError::Unavailable {
                channel: self.channel(),
                message: "upstream down".into(),
            });
        }
        let n = self.created.fetch_add(1, Ordering::SeqCst) + 1;
        let id = format!("{}-{n}", self.channel());
        Ok(CreatedTask {
            raw: json!({ "id": id }),
            provider_task_id: id,
        })
    }

    async fn query(&self, _provider_task_id: &str, _action: &str) -> Result<Value, ProviderError> {
        Ok(self.status.lock().unwrap().clone())
    }

    fn parse_webhook(&self, auth: &WebhookAuth, body: &[u8]) -> Result<Value, ProviderError> {
        self.rules.parse_webhook(auth, body)
    }
}

pub struct TestApp {
    pub router: Router,
    pub store: Arc<MemoryStore>,
    pub storage: Arc<MemoryObjectStorage>,
    pub kling: Arc<ScriptedAdapter>,
    pub volcengine: Arc<ScriptedAdapter>,
}

/// Full application router over in-memory stores and scripted providers.
///
/// Kling and Volcengine are configured; Sora2 and Dashscope are not.
pub fn build_test_app() -> TestApp {
    let store = Arc::new(MemoryStore::new());
    let storage = Arc::new(MemoryObjectStorage::new(STORAGE_BASE));

    let kling_config = KlingConfig {
        webhook_secret: Some(KLING_WEBHOOK_SECRET.into()),
        ..KlingConfig::new("http://127.0.0.1:9", "ak")
    };
    let kling = Arc::new(ScriptedAdapter::new(Box::new(KlingAdapter::new(kling_config))));
    let volcengine = Arc::new(ScriptedAdapter::new(Box::new(VolcengineAdapter::new(
        VolcengineConfig::new("http://127.0.0.1:9", "key"),
    ))));

    let adapters = AdapterRegistry::new()
        .with(kling.clone())
        .with(volcengine.clone());
    let models = Arc::new(ModelRegistry::from_json_str(CATALOG).unwrap());
    let archiver = AssetArchiver::new(store.clone(), storage.clone());
    let service = GenerationService::new(models, adapters, store.clone(), store.clone(), archiver);

    let config = test_config();
    let state = AppState {
        service,
        config: Arc::new(config.clone()),
        pool: None,
    };

    TestApp {
        router: build_app_router(state, &config).unwrap(),
        store,
        storage,
        kling,
        volcengine,
    }
}

impl TestApp {
    /// POST a JSON body and return the status with the parsed JSON response.
    pub async fn post_json(&self, uri: &str, body: Value) -> (StatusCode, Value) {
        let request = Request::builder()
            .method("POST")
            .uri(uri)
            .header("content-type", "application/json")
            .body(Body::from(body.to_string()))
            .unwrap();
        self.send(request).await
    }

    /// POST a Kling webhook carrying the configured callback token.
    pub async fn kling_webhook(&self, payload: Value) -> (StatusCode, Value) {
        let request = Request::builder()
            .method("POST")
            .uri(format!(
                "/api/v1/callbacks/kling?token={KLING_WEBHOOK_SECRET}"
            ))
            .header("content-type", "application/json")
            .body(Body::from(payload.to_string()))
            .unwrap();
        self.send(request).await
    }

    pub async fn get(&self, uri: &str) -> (StatusCode, Value) {
        let request = Request::builder()
            .method("GET")
            .uri(uri)
            .body(Body::empty())
            .unwrap();
        self.send(request).await
    }

    pub async fn send(&self, request: Request<Body>) -> (StatusCode, Value) {
        let response = self.router.clone().oneshot(request).await.unwrap();
        let status = response.status();
        let bytes = response.into_body().collect().await.unwrap().to_bytes();
        let json = if bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&bytes)
                .unwrap_or_else(|_| Value::String(String::from_utf8_lossy(&bytes).into_owned()))
        };
        (status, json)
    }
}

/// A Kling task payload as the webhook and the query endpoint deliver it.
pub fn kling_payload(provider_task_id: &str, status: &str) -> Value {
    json!({
        "task_id": provider_task_id,
        "task_status": status,
        "task_status_msg": if status == "failed" { "content moderation" } else { "" },
        "task_result": { "videos": [{ "id": "v1", "url": KLING_VIDEO_URL, "duration": "5" }] }
    })
}
