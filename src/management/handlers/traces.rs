//! # 追踪记录处理器

use std::sync::Arc;

use axum::extract::{Extension, Path, Query, State};
use axum::response::Response;
use serde::{Deserialize, Serialize};

use crate::error::TraceError;
use crate::logging::{LogComponent, LogStage, log_management_error};
use crate::management::middleware::RequestId;
use crate::management::response;
use crate::management::server::AppState;
use crate::trace::{PaginationData, PaginationParams, TraceRecord};

/// 列表查询参数
#[derive(Debug, Default, Deserialize)]
pub struct TraceListQuery {
    pub page: Option<u64>,
    pub limit: Option<u64>,
}

#[derive(Debug, Serialize)]
pub struct TraceListResponse {
    pub traces: Vec<Arc<TraceRecord>>,
    pub pagination: PaginationData,
}

#[derive(Debug, Serialize)]
pub struct ClearResponse {
    pub removed: usize,
}

/// 分页获取追踪记录（最新在前）
pub async fn list_traces(
    State(state): State<AppState>,
    Query(query): Query<TraceListQuery>,
) -> Response {
    let params = PaginationParams::new(query.page, query.limit);
    let (traces, pagination) = state.traces.list(params);
    response::success(TraceListResponse { traces, pagination })
}

/// 获取单条追踪记录
pub async fn get_trace(
    State(state): State<AppState>,
    Extension(request_id): Extension<RequestId>,
    Path(id): Path<String>,
) -> Response {
    match state.traces.get(&id) {
        Some(record) => response::success(record),
        None => {
            let err = TraceError::not_found("trace", &id);
            log_management_error(
                &request_id,
                LogStage::Request,
                LogComponent::Management,
                "get_trace",
                "追踪记录不存在",
                &err,
            );
            response::app_error(err)
        }
    }
}

/// 清空追踪记录并通知观察者
pub async fn clear_traces(State(state): State<AppState>) -> Response {
    let removed = state.traces.clear();
    response::success_with_message(ClearResponse { removed }, "追踪记录已清空")
}
