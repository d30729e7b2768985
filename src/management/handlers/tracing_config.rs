//! # 采集策略处理器

use axum::extract::{Extension, State};
use axum::response::Response;
use axum::Json;
use serde::Serialize;
use serde_json::Value;

use crate::logging::{LogComponent, LogStage, log_management_error};
use crate::management::middleware::RequestId;
use crate::management::response;
use crate::management::server::AppState;

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BodyToggleResponse {
    pub detailed_body_capture: bool,
}

#[derive(Debug, Serialize)]
pub struct SseToggleResponse {
    #[serde(rename = "detailedSSECapture")]
    pub detailed_sse_capture: bool,
}

/// 获取当前追踪配置
pub async fn get_config(State(state): State<AppState>) -> Response {
    response::success(state.policy.get())
}

/// 以 JSON 补丁更新追踪配置
///
/// 格式错误的字段被拒绝并在 `rejected` 中返回，其余字段照常生效。
pub async fn update_config(
    State(state): State<AppState>,
    Extension(request_id): Extension<RequestId>,
    Json(patch): Json<Value>,
) -> Response {
    match state.policy.update_json(&patch) {
        Ok(update) => {
            let message = if update.rejected.is_empty() {
                "追踪配置已更新"
            } else {
                "追踪配置已更新，部分字段被拒绝"
            };
            response::success_with_message(update, message)
        }
        Err(err) => {
            log_management_error(
                &request_id,
                LogStage::Configuration,
                LogComponent::Management,
                "update_tracing_config",
                "追踪配置更新失败",
                &err,
            );
            response::app_error(err)
        }
    }
}

/// 切换详细请求体采集
pub async fn toggle_body_capture(State(state): State<AppState>) -> Response {
    let detailed_body_capture = state.policy.toggle_detailed_body_capture();
    response::success(BodyToggleResponse {
        detailed_body_capture,
    })
}

/// 切换流式响应详细采集
pub async fn toggle_sse_capture(State(state): State<AppState>) -> Response {
    let detailed_sse_capture = state.policy.toggle_detailed_sse_capture();
    response::success(SseToggleResponse {
        detailed_sse_capture,
    })
}

/// 恢复默认配置
pub async fn reset_config(State(state): State<AppState>) -> Response {
    let update = state.policy.reset_to_defaults();
    response::success_with_message(update, "追踪配置已恢复默认值")
}
