//! # 管理API集成测试
//!
//! 直接驱动路由（`tower::ServiceExt::oneshot`），不监听端口

use std::sync::Arc;

use axum::Router;
use axum::body::{Body, to_bytes};
use axum::http::{Method, Request, StatusCode};
use pretty_assertions::assert_eq;
use proxy_trace::AppContext;
use proxy_trace::config::{AppConfig, ConfigManager};
use proxy_trace::management::ManagementServer;
use proxy_trace::trace::TraceRecord;
use serde_json::{Value, json};
use tower::ServiceExt;

fn setup() -> (Router, Arc<AppContext>) {
    let config = Arc::new(ConfigManager::in_memory(AppConfig::default()));
    let context = Arc::new(AppContext::build(Arc::clone(&config)).unwrap());
    let server = ManagementServer::new(config.get_config().server, Arc::clone(&context));
    (server.router(), context)
}

async fn call(router: &Router, method: Method, uri: &str, body: Option<Value>) -> (StatusCode, Value) {
    let builder = Request::builder().method(method).uri(uri);
    let request = match body {
        Some(body) => builder
            .header("content-type", "application/json")
            .body(Body::from(body.to_string()))
            .unwrap(),
        None => builder.body(Body::empty()).unwrap(),
    };
    let response = router.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    let value = if bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&bytes).unwrap_or_else(|_| Value::String(String::from_utf8_lossy(&bytes).into_owned()))
    };
    (status, value)
}

fn seed(context: &AppContext, count: usize) {
    for i in 0..count {
        let path = format!("/proxy/openai/{i}");
        context.traces.publish(TraceRecord::pending("POST", &path, &path));
    }
}

#[tokio::test]
async fn ping_answers_pong() {
    let (router, _) = setup();
    let (status, body) = call(&router, Method::GET, "/ping", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, Value::String("pong".into()));
}

#[tokio::test]
async fn list_traces_is_paginated() {
    let (router, context) = setup();
    seed(&context, 125);

    let (status, body) = call(&router, Method::GET, "/api/traces?page=3&limit=50", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["success"], true);
    assert_eq!(body["data"]["traces"].as_array().map(Vec::len), Some(25));
    assert_eq!(
        body["data"]["pagination"],
        json!({"total": 125, "page": 3, "limit": 50, "pages": 3})
    );
}

#[tokio::test]
async fn get_trace_by_id_and_missing() {
    let (router, context) = setup();
    seed(&context, 1);
    let (traces, _) = context.traces.list(proxy_trace::trace::PaginationParams::default());
    let id = traces[0].id.clone();

    let (status, body) = call(&router, Method::GET, &format!("/api/traces/{id}"), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["path"], "/proxy/openai/0");

    let (status, body) = call(&router, Method::GET, "/api/traces/nope", None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["error"]["code"], "RESOURCE_NOT_FOUND");
}

#[tokio::test]
async fn clear_via_delete_and_post() {
    let (router, context) = setup();
    seed(&context, 3);

    let (status, body) = call(&router, Method::DELETE, "/api/traces", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["removed"], 3);
    assert!(context.traces.is_empty());

    seed(&context, 1);
    let (_, body) = call(&router, Method::POST, "/api/traces/clear", None).await;
    assert_eq!(body["data"]["removed"], 1);
}

#[tokio::test]
async fn tracing_config_roundtrip() {
    let (router, context) = setup();

    let (status, body) = call(&router, Method::GET, "/api/tracing/config", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["maxBodySize"], 102_400);
    assert_eq!(body["data"]["detailedSSECapture"], false);

    let (status, body) = call(
        &router,
        Method::PATCH,
        "/api/tracing/config",
        Some(json!({"enabled": false, "maxStreamSize": "big"})),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["config"]["enabled"], false);
    assert_eq!(body["data"]["rejected"][0]["field"], "maxStreamSize");
    assert_eq!(body["data"]["changes"], json!(["enabled: true → false"]));
    assert!(!context.policy.is_tracing_enabled());

    let (status, body) = call(&router, Method::PATCH, "/api/tracing/config", Some(json!([1]))).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"]["code"], "CONFIG_ERROR");

    let (_, body) = call(&router, Method::POST, "/api/tracing/config/toggle-body", None).await;
    assert_eq!(body["data"]["detailedBodyCapture"], true);
    let (_, body) = call(&router, Method::POST, "/api/tracing/config/toggle-sse", None).await;
    assert_eq!(body["data"]["detailedSSECapture"], true);

    let (_, body) = call(&router, Method::POST, "/api/tracing/config/reset", None).await;
    assert_eq!(body["data"]["config"]["enabled"], true);
    assert_eq!(body["data"]["config"]["detailedBodyCapture"], false);
    assert!(context.policy.is_tracing_enabled());
}

#[tokio::test]
async fn server_status_relay() {
    let (router, context) = setup();
    let mut subscription = context.traces.subscribe(50);
    let _ = subscription.observer.try_recv();

    let (status, body) = call(
        &router,
        Method::PUT,
        "/api/system/servers/sse",
        Some(json!({"status": "running"})),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"], json!({"server": "sse", "status": "running"}));

    let message = subscription.observer.try_recv().unwrap();
    assert_eq!(
        serde_json::to_value(message.as_ref()).unwrap(),
        json!({"type": "serverStatus", "data": {"server": "sse", "status": "running"}})
    );

    let (_, body) = call(&router, Method::GET, "/api/system/servers", None).await;
    assert_eq!(body["data"], json!([{"server": "sse", "status": "running"}]));

    let (_, body) = call(&router, Method::GET, "/api/system/info", None).await;
    assert_eq!(body["data"]["live"]["activeConnections"], 1);
}

#[tokio::test]
async fn request_id_is_echoed() {
    let (router, _) = setup();
    let request = Request::builder()
        .uri("/api/tracing/config")
        .header("x-request-id", "req-42")
        .body(Body::empty())
        .unwrap();
    let response = router.oneshot(request).await.unwrap();
    assert_eq!(
        response.headers().get("x-request-id").and_then(|v| v.to_str().ok()),
        Some("req-42")
    );
}
