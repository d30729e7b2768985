//! # API 响应结构
//!
//! 定义了标准的 JSON API 响应格式：成功与失败两种信封。

use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::TraceError;

/// # 标准成功响应
#[derive(Debug, Serialize)]
pub struct SuccessResponse<T: Serialize> {
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<T>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    pub timestamp: DateTime<Utc>,
}

/// # 标准错误信息
#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorInfo {
    pub code: String,
    pub message: String,
}

/// # 标准错误响应
#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub success: bool,
    pub error: ErrorInfo,
    pub timestamp: DateTime<Utc>,
}

/// # API响应枚举
///
/// 统一所有API出口，方便转换为 `axum::response::Response`
#[derive(Debug)]
pub enum ApiResponse<T: Serialize> {
    Success(T),
    SuccessWithMessage(T, String),
    AppError(TraceError),
}

impl<T: Serialize> ApiResponse<T> {
    fn ok(data: T, message: String) -> Response {
        (
            StatusCode::OK,
            Json(SuccessResponse {
                success: true,
                data: Some(data),
                message: Some(message),
                timestamp: Utc::now(),
            }),
        )
            .into_response()
    }
}

fn error_envelope(status: StatusCode, code: String, message: String) -> Response {
    let error_response = ErrorResponse {
        success: false,
        error: ErrorInfo { code, message },
        timestamp: Utc::now(),
    };
    (status, Json(error_response)).into_response()
}

impl<T: Serialize> IntoResponse for ApiResponse<T> {
    fn into_response(self) -> Response {
        match self {
            Self::Success(data) => Self::ok(data, "操作成功".to_string()),
            Self::SuccessWithMessage(data, message) => Self::ok(data, message),
            Self::AppError(error) => {
                let (status, code) = error.to_http_response_parts();
                error_envelope(status, code.to_string(), error.to_string())
            }
        }
    }
}

/// # 便捷函数：成功响应
pub fn success<T: Serialize>(data: T) -> Response {
    ApiResponse::Success(data).into_response()
}

/// # 便捷函数：带消息的成功响应
pub fn success_with_message<T: Serialize>(data: T, message: &str) -> Response {
    ApiResponse::SuccessWithMessage(data, message.to_string()).into_response()
}

/// # 便捷函数：应用错误响应
pub fn app_error(error: TraceError) -> Response {
    ApiResponse::<()>::AppError(error).into_response()
}
