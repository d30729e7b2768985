//! # 系统信息处理器

use std::sync::OnceLock;
use std::time::Instant;

use axum::extract::{Path, State};
use axum::response::Response;
use axum::Json;
use serde::{Deserialize, Serialize};

use crate::management::response;
use crate::management::server::AppState;
use crate::trace::{HubStatsSnapshot, ServerRunState};

/// 全局启动时间
static START_TIME: OnceLock<Instant> = OnceLock::new();

/// 初始化启动时间
pub fn init_start_time() {
    START_TIME.get_or_init(Instant::now);
}

fn uptime_seconds() -> u64 {
    START_TIME.get().map_or(0, |start| start.elapsed().as_secs())
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct SystemInfo {
    name: &'static str,
    version: &'static str,
    uptime_seconds: u64,
    records: usize,
    max_records: usize,
    tracing_enabled: bool,
    live: HubStatsSnapshot,
}

/// 服务状态上报请求体
#[derive(Debug, Deserialize)]
pub struct ServerStatusBody {
    pub status: ServerRunState,
}

/// Ping
pub async fn ping_handler() -> &'static str {
    "pong"
}

/// 获取系统信息
pub async fn get_system_info(State(state): State<AppState>) -> Response {
    response::success(SystemInfo {
        name: env!("CARGO_PKG_NAME"),
        version: env!("CARGO_PKG_VERSION"),
        uptime_seconds: uptime_seconds(),
        records: state.traces.len(),
        max_records: state.config.get_config().gateway.store.max_records,
        tracing_enabled: state.policy.is_tracing_enabled(),
        live: state.traces.hub_stats(),
    })
}

/// 当前已知的服务状态
pub async fn list_servers(State(state): State<AppState>) -> Response {
    response::success(state.traces.server_statuses())
}

/// 宿主进程上报服务状态，转发给所有观察者
pub async fn update_server_status(
    State(state): State<AppState>,
    Path(server): Path<String>,
    Json(body): Json<ServerStatusBody>,
) -> Response {
    let status = state.traces.report_server_status(&server, body.status);
    response::success(status)
}
