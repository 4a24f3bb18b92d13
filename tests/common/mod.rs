#![allow(dead_code)]

//! Router over the sample schema and a freshly seeded in-memory store.

use axum::{
    body::Body,
    http::{header, HeaderMap, Method, Request, StatusCode},
    Router,
};
use jsonapi_bridge::config::{resolve, ApiConfig, FullConfig, ModelConfig};
use jsonapi_bridge::{app, AppState, Hooks, MemoryStore};
use serde_json::Value;
use std::sync::Arc;
use tower::ServiceExt;

pub const JSONAPI: &str = "application/vnd.api+json";

pub fn router_with_hooks(hooks: Hooks) -> Router {
    let models: Vec<ModelConfig> = serde_json::from_str(include_str!("../../sample/models.json")).unwrap();
    let registry = Arc::new(
        resolve(&FullConfig {
            api: ApiConfig::default(),
            models,
        })
        .unwrap(),
    );
    let store = MemoryStore::new(Arc::clone(&registry));
    store
        .seed_from_value(serde_json::from_str(include_str!("../../sample/seed.json")).unwrap())
        .unwrap();
    app(AppState::new(Arc::new(store), registry).with_hooks(hooks))
}

pub fn router() -> Router {
    router_with_hooks(Hooks::new())
}

pub struct TestResponse {
    pub status: StatusCode,
    pub headers: HeaderMap,
    pub text: String,
    pub body: Value,
}

pub async fn send(app: &Router, request: Request<Body>) -> TestResponse {
    let response = app.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let headers = response.headers().clone();
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX).await.unwrap();
    let text = String::from_utf8(bytes.to_vec()).unwrap();
    let body = if text.is_empty() {
        Value::Null
    } else {
        serde_json::from_str(&text).unwrap_or(Value::Null)
    };
    TestResponse {
        status,
        headers,
        text,
        body,
    }
}

pub async fn get(app: &Router, uri: &str) -> TestResponse {
    send(app, Request::builder().uri(uri).body(Body::empty()).unwrap()).await
}

pub async fn write(app: &Router, method: Method, uri: &str, body: &Value) -> TestResponse {
    let request = Request::builder()
        .method(method)
        .uri(uri)
        .header(header::CONTENT_TYPE, JSONAPI)
        .body(Body::from(body.to_string()))
        .unwrap();
    send(app, request).await
}

/// `path?k=v&...` with keys and values percent-encoded.
pub fn uri(path: &str, params: &[(&str, &str)]) -> String {
    let query: Vec<String> = params
        .iter()
        .map(|(k, v)| format!("{}={}", encode(k), encode(v)))
        .collect();
    format!("{}?{}", path, query.join("&"))
}

fn encode(s: &str) -> String {
    s.bytes()
        .map(|b| match b {
            b'A'..=b'Z' | b'a'..=b'z' | b'0'..=b'9' | b'-' | b'.' | b'_' | b'~' => (b as char).to_string(),
            _ => format!("%{:02X}", b),
        })
        .collect()
}

pub fn texts(body: &Value) -> Vec<String> {
    body["data"]
        .as_array()
        .unwrap()
        .iter()
        .map(|d| d["attributes"]["text"].as_str().unwrap().to_string())
        .collect()
}
