//! # 追踪记录模型

use std::collections::BTreeMap;

use axum::http::HeaderMap;
use base64::Engine as _;
use base64::engine::general_purpose::STANDARD;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// 敏感请求/响应头，记录时以占位符替换
pub const REDACTED_HEADERS: &[&str] = &[
    "authorization",
    "proxy-authorization",
    "cookie",
    "set-cookie",
    "x-api-key",
    "api-key",
    "x-goog-api-key",
];

const REDACTED_VALUE: &str = "[REDACTED]";

/// 负载编码方式
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PayloadEncoding {
    Utf8,
    Base64,
}

/// 已采集的请求体或响应体
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CapturedPayload {
    pub encoding: PayloadEncoding,
    pub content: String,
    /// 实际保留的字节数
    pub size: u64,
    pub truncated: bool,
}

impl CapturedPayload {
    /// 由原始字节构造，非 UTF-8 内容转为 base64
    ///
    /// 截断导致的残缺 UTF-8 序列会被裁掉，而不是替换成 U+FFFD。
    #[must_use]
    pub fn from_bytes(bytes: &[u8], truncated: bool) -> Self {
        let (encoding, content, size) = encode(bytes, truncated);
        Self {
            encoding,
            content,
            size,
            truncated,
        }
    }
}

/// 流式响应中的一个分块
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StreamChunk {
    pub index: usize,
    /// 相对于交换开始的毫秒偏移
    pub offset_ms: u64,
    pub encoding: PayloadEncoding,
    pub content: String,
    pub size: u64,
}

impl StreamChunk {
    /// `partial` 表示该分块在累计上限处被截断
    #[must_use]
    pub fn from_bytes(index: usize, offset_ms: u64, bytes: &[u8], partial: bool) -> Self {
        let (encoding, content, size) = encode(bytes, partial);
        Self {
            index,
            offset_ms,
            encoding,
            content,
            size,
        }
    }
}

fn encode(bytes: &[u8], truncated: bool) -> (PayloadEncoding, String, u64) {
    let bytes = if truncated { trim_partial_utf8(bytes) } else { bytes };
    match std::str::from_utf8(bytes) {
        Ok(text) => (PayloadEncoding::Utf8, text.to_string(), bytes.len() as u64),
        Err(_) => (PayloadEncoding::Base64, STANDARD.encode(bytes), bytes.len() as u64),
    }
}

// 只裁掉末尾不完整的多字节序列，真正的非法字节保持原样
fn trim_partial_utf8(bytes: &[u8]) -> &[u8] {
    &bytes[..complete_utf8_len(bytes)]
}

/// 去掉末尾不完整的 UTF-8 序列后的长度；含非法字节时返回全长
#[must_use]
pub(crate) fn complete_utf8_len(bytes: &[u8]) -> usize {
    match std::str::from_utf8(bytes) {
        Err(err) if err.error_len().is_none() => err.valid_up_to(),
        _ => bytes.len(),
    }
}

/// 一次被代理交换的追踪记录
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TraceRecord {
    pub id: String,
    pub method: String,
    pub path: String,
    pub url: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub status: Option<u16>,
    pub start_time: DateTime<Utc>,
    /// 毫秒
    #[serde(skip_serializing_if = "Option::is_none")]
    pub duration: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub request_headers: Option<BTreeMap<String, String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub response_headers: Option<BTreeMap<String, String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub request_body: Option<CapturedPayload>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub response_body: Option<CapturedPayload>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub stream_chunks: Option<Vec<StreamChunk>>,
    #[serde(default)]
    pub stream_truncated: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub capture_error: Option<String>,
    pub complete: bool,
}

impl TraceRecord {
    /// 创建一条尚未完成的记录
    #[must_use]
    pub fn pending(method: &str, path: &str, url: &str) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            method: method.to_string(),
            path: path.to_string(),
            url: url.to_string(),
            status: None,
            start_time: Utc::now(),
            duration: None,
            request_headers: None,
            response_headers: None,
            request_body: None,
            response_body: None,
            stream_chunks: None,
            stream_truncated: false,
            capture_error: None,
            complete: false,
        }
    }
}

/// 将请求头转换为可序列化的映射，敏感头被替换
///
/// 同名多值头以 `, ` 连接；非 ASCII 值按有损 UTF-8 处理。
#[must_use]
pub fn redact_headers(headers: &HeaderMap) -> BTreeMap<String, String> {
    let mut out: BTreeMap<String, String> = BTreeMap::new();
    for (name, value) in headers {
        let key = name.as_str().to_string();
        let value = if REDACTED_HEADERS.contains(&name.as_str()) {
            REDACTED_VALUE.to_string()
        } else {
            String::from_utf8_lossy(value.as_bytes()).into_owned()
        };
        out.entry(key)
            .and_modify(|existing| {
                if *existing != REDACTED_VALUE {
                    existing.push_str(", ");
                    existing.push_str(&value);
                }
            })
            .or_insert(value);
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;
    use pretty_assertions::assert_eq;

    #[test]
    fn utf8_payload_kept_as_text() {
        let payload = CapturedPayload::from_bytes("{\"a\":1}".as_bytes(), false);
        assert_eq!(payload.encoding, PayloadEncoding::Utf8);
        assert_eq!(payload.content, "{\"a\":1}");
        assert_eq!(payload.size, 7);
    }

    #[test]
    fn binary_payload_is_base64() {
        let payload = CapturedPayload::from_bytes(&[0xff, 0x00, 0xfe], false);
        assert_eq!(payload.encoding, PayloadEncoding::Base64);
        assert_eq!(payload.content, "/wD+");
        assert_eq!(payload.size, 3);
    }

    #[test]
    fn truncation_trims_split_multibyte_sequence() {
        // "你" = e4 bd a0，截断在第二个字节后
        let bytes = [b'a', 0xe4, 0xbd];
        let payload = CapturedPayload::from_bytes(&bytes, true);
        assert_eq!(payload.encoding, PayloadEncoding::Utf8);
        assert_eq!(payload.content, "a");
        assert_eq!(payload.size, 1);
        assert!(payload.truncated);
    }

    #[test]
    fn complete_len_stops_before_split_sequence() {
        assert_eq!(complete_utf8_len("data: 你".as_bytes()), 9);
        assert_eq!(complete_utf8_len(&"data: 你".as_bytes()[..8]), 6);
        assert_eq!(complete_utf8_len(&[0xff, b'a', 0xe4]), 3);
    }

    #[test]
    fn sensitive_headers_are_redacted() {
        let mut headers = HeaderMap::new();
        headers.insert("authorization", HeaderValue::from_static("Bearer sk-123"));
        headers.insert("x-api-key", HeaderValue::from_static("secret"));
        headers.insert("content-type", HeaderValue::from_static("application/json"));
        headers.append("accept", HeaderValue::from_static("text/plain"));
        headers.append("accept", HeaderValue::from_static("application/json"));

        let map = redact_headers(&headers);
        assert_eq!(map["authorization"], "[REDACTED]");
        assert_eq!(map["x-api-key"], "[REDACTED]");
        assert_eq!(map["content-type"], "application/json");
        assert_eq!(map["accept"], "text/plain, application/json");
    }

    #[test]
    fn pending_record_serializes_camel_case() {
        let record = TraceRecord::pending("POST", "/proxy/openai/v1/chat", "http://localhost/proxy/openai/v1/chat");
        let json = serde_json::to_value(&record).unwrap();
        assert!(json.get("startTime").is_some());
        assert!(json.get("status").is_none());
        assert_eq!(json["complete"], false);
        assert_eq!(json["streamTruncated"], false);
        assert!(uuid::Uuid::parse_str(&record.id).is_ok());
    }
}
