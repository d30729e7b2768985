//! # 采集管道集成测试
//!
//! 从 `CaptureService` 到记录存储与实时推送的完整链路

use std::sync::Arc;

use axum::http::{HeaderMap, HeaderValue, header};
use bytes::Bytes;
use futures::StreamExt;
use futures::stream;
use pretty_assertions::assert_eq;
use proxy_trace::AppContext;
use proxy_trace::config::{AppConfig, ConfigManager};
use proxy_trace::trace::{
    ExchangeStart, HubMessage, PaginationParams, ResponseTap, TraceRecord, TracingConfig,
};

fn context(tracing: TracingConfig) -> AppContext {
    let mut config = AppConfig::default();
    config.gateway.tracing = tracing;
    AppContext::build(Arc::new(ConfigManager::in_memory(config))).unwrap()
}

fn sse_headers() -> HeaderMap {
    let mut headers = HeaderMap::new();
    headers.insert(header::CONTENT_TYPE, HeaderValue::from_static("text/event-stream"));
    headers
}

fn latest(context: &AppContext) -> Arc<TraceRecord> {
    let (mut traces, _) = context.traces.list(PaginationParams::default());
    traces.remove(0)
}

#[tokio::test]
async fn response_tap_captures_sse_stream() {
    let context = context(TracingConfig {
        detailed_sse_capture: true,
        ..TracingConfig::default()
    });
    let request_headers = HeaderMap::new();
    let mut capture = context
        .capture
        .on_start(ExchangeStart {
            method: "GET",
            path: "/sse",
            url: "http://localhost:3000/sse",
            headers: &request_headers,
        })
        .unwrap();
    capture.on_complete(200, 3.0, &sse_headers());

    let upstream = stream::iter(vec![
        Ok::<_, std::io::Error>(Bytes::from_static(b"event: endpoint\n\n")),
        Ok(Bytes::from_static(b"data: {\"id\":1}\n\n")),
    ]);
    let forwarded: Vec<_> = ResponseTap::new(upstream, capture)
        .map(|item| item.unwrap())
        .collect()
        .await;

    assert_eq!(forwarded.len(), 2);
    let record = latest(&context);
    assert!(record.complete);
    let chunks = record.stream_chunks.as_ref().unwrap();
    assert_eq!(chunks.len(), 2);
    assert_eq!(chunks[0].content, "event: endpoint\n\n");
    assert_eq!(chunks[1].index, 1);
    assert!(!record.stream_truncated);
}

#[tokio::test]
async fn response_tap_error_degrades_to_metadata() {
    let context = context(TracingConfig {
        detailed_body_capture: true,
        ..TracingConfig::default()
    });
    let request_headers = HeaderMap::new();
    let mut capture = context
        .capture
        .on_start(ExchangeStart {
            method: "POST",
            path: "/proxy/gemini/v1/models",
            url: "http://localhost/proxy/gemini/v1/models",
            headers: &request_headers,
        })
        .unwrap();
    capture.on_request_body(b"{\"q\":1}");
    capture.on_complete(200, 8.0, &HeaderMap::new());

    let upstream = stream::iter(vec![
        Ok(Bytes::from_static(b"{\"partial\"")),
        Err(std::io::Error::other("upstream reset")),
    ]);
    let items: Vec<_> = ResponseTap::new(upstream, capture).collect().await;
    assert!(items[1].is_err());

    let record = latest(&context);
    assert_eq!(
        record.capture_error.as_deref(),
        Some("采集错误: 响应体读取中断: upstream reset")
    );
    assert!(record.request_body.is_none());
    assert!(record.response_body.is_none());
    assert_eq!(record.status, Some(200));
}

#[tokio::test]
async fn observers_receive_finished_exchanges() {
    let context = context(TracingConfig::default());
    let mut subscription = context.traces.subscribe(50);
    let _ = subscription.observer.try_recv();

    let headers = HeaderMap::new();
    for path in ["/proxy/openai/a", "/api/ignored", "/messages"] {
        if let Some(mut capture) = context.capture.on_start(ExchangeStart {
            method: "POST",
            path,
            url: path,
            headers: &headers,
        }) {
            capture.on_complete(204, 1.0, &HeaderMap::new());
            capture.finish();
        }
    }

    let mut paths = Vec::new();
    while let Some(message) = subscription.observer.try_recv() {
        if let HubMessage::NewTrace(record) = message.as_ref() {
            paths.push(record.path.clone());
        }
    }
    assert_eq!(paths, vec!["/proxy/openai/a".to_string(), "/messages".to_string()]);
}

#[test]
fn disabled_tracing_produces_nothing() {
    let context = context(TracingConfig {
        enabled: false,
        ..TracingConfig::default()
    });
    let headers = HeaderMap::new();
    let capture = context.capture.on_start(ExchangeStart {
        method: "GET",
        path: "/proxy/openai/v1/models",
        url: "/proxy/openai/v1/models",
        headers: &headers,
    });
    assert!(capture.is_none());
    assert!(context.traces.is_empty());
}
