//! # 路由配置
//!
//! 定义所有API路由和路由组织

use axum::Router;
use axum::routing::{get, post, put};

use super::handlers::{live, system, traces, tracing_config};
use super::middleware::request_id_middleware;
use crate::management::server::AppState;

/// 创建所有路由
pub fn create_routes(state: AppState) -> Router {
    Router::new()
        // 追踪记录
        .nest("/traces", trace_routes())
        // 采集策略
        .nest("/tracing", tracing_config_routes())
        // 宿主服务状态
        .nest("/system", system_routes())
        // 实时推送
        .route("/live", get(live::live_handler))
        .layer(axum::middleware::from_fn(request_id_middleware))
        .with_state(state)
}

/// 追踪记录路由
fn trace_routes() -> Router<AppState> {
    Router::new()
        .route("/", get(traces::list_traces).delete(traces::clear_traces))
        .route("/clear", post(traces::clear_traces))
        .route("/{id}", get(traces::get_trace))
}

/// 采集策略路由
fn tracing_config_routes() -> Router<AppState> {
    Router::new()
        .route(
            "/config",
            get(tracing_config::get_config).patch(tracing_config::update_config),
        )
        .route("/config/toggle-body", post(tracing_config::toggle_body_capture))
        .route("/config/toggle-sse", post(tracing_config::toggle_sse_capture))
        .route("/config/reset", post(tracing_config::reset_config))
}

/// 系统信息路由
fn system_routes() -> Router<AppState> {
    Router::new()
        .route("/info", get(system::get_system_info))
        .route("/servers", get(system::list_servers))
        .route("/servers/{server}", put(system::update_server_status))
}
