//! # 错误处理测试

use crate::error::{Context, ErrorCategory, TraceError};
use axum::http::StatusCode;
use std::error::Error;

#[test]
fn test_config_error_creation() {
    let err = TraceError::config("测试配置错误");
    assert!(matches!(err, TraceError::Config { .. }));
    assert_eq!(err.to_string(), "配置错误: 测试配置错误");
    assert_eq!(err.category(), ErrorCategory::Client);
}

#[test]
fn test_config_error_with_source() {
    let io_err = std::io::Error::new(std::io::ErrorKind::NotFound, "文件不存在");
    let err = TraceError::config_with_source("配置文件加载失败", io_err);

    assert!(matches!(err, TraceError::Config { .. }));
    assert!(err.to_string().contains("配置错误: 配置文件加载失败"));
    assert!(err.source().is_some());
}

#[test]
fn test_auto_conversion_from_io_error() {
    let io_err = std::io::Error::new(std::io::ErrorKind::NotFound, "文件不存在");
    let err: TraceError = io_err.into();

    assert!(matches!(err, TraceError::Io { .. }));
    assert!(err.to_string().contains("IO错误: 文件操作失败"));
    assert_eq!(err.category(), ErrorCategory::Server);
}

#[test]
fn test_auto_conversion_from_toml_error() {
    let invalid_toml = "invalid = toml = syntax";
    let toml_err = toml::from_str::<toml::Value>(invalid_toml).unwrap_err();
    let err: TraceError = toml_err.into();

    assert!(matches!(err, TraceError::Config { .. }));
    assert!(err.to_string().contains("配置错误: TOML解析失败"));
}

#[test]
fn test_context_wraps_source() {
    let result: Result<(), std::io::Error> = Err(std::io::Error::new(
        std::io::ErrorKind::PermissionDenied,
        "权限不足",
    ));

    let err = result.context("写入配置文件").unwrap_err();
    assert!(matches!(err, TraceError::Internal { .. }));
    assert!(err.to_string().contains("写入配置文件"));
    assert!(err.source().is_some());
}

#[test]
fn test_http_mapping() {
    let (status, code) = TraceError::not_found("trace", "abc").to_http_response_parts();
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(code, "RESOURCE_NOT_FOUND");

    let err = TraceError::distribution(7, "queue full");
    assert_eq!(err.to_string(), "分发错误: observer 7: queue full");
    assert_eq!(err.category(), ErrorCategory::Server);

    let err = TraceError::capture("响应体读取中断: reset");
    assert_eq!(err.to_string(), "采集错误: 响应体读取中断: reset");
    assert_eq!(err.to_http_response_parts().1, "CAPTURE_ERROR");
    assert_eq!(err.category(), ErrorCategory::Server);
}

#[test]
fn test_macros() {
    fn check(limit: u64) -> crate::error::Result<u64> {
        crate::ensure_config!(limit > 0, "limit 必须大于0, got {}", limit);
        Ok(limit)
    }

    assert!(check(1).is_ok());
    let err = check(0).unwrap_err();
    assert_eq!(err.to_string(), "配置错误: limit 必须大于0, got 0");
    assert_eq!(err.category(), ErrorCategory::Client);
}
