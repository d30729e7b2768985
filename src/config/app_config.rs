//! # 应用配置结构定义

use serde::{Deserialize, Serialize};

use crate::trace::filter::StreamingHeuristics;
use crate::trace::hub::DEFAULT_OBSERVER_BUFFER;
use crate::trace::policy::TracingConfig;
use crate::trace::store::DEFAULT_MAX_RECORDS;

/// 应用主配置结构
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    /// 管理端服务配置
    pub server: ServerConfig,
    /// 追踪网关配置
    pub gateway: GatewayConfig,
}

/// 管理端服务配置
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    /// 监听地址
    pub host: String,
    /// 监听端口
    pub port: u16,
    /// API 路由前缀
    pub api_prefix: String,
    /// 是否启用 CORS
    pub enable_cors: bool,
    /// 允许的来源，为空时允许任意来源
    pub cors_origins: Vec<String>,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 3100,
            api_prefix: "/api".to_string(),
            enable_cors: true,
            cors_origins: Vec::new(),
        }
    }
}

impl ServerConfig {
    /// `host:port`
    #[must_use]
    pub fn bind_address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

/// 追踪网关配置（`[gateway]`）
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct GatewayConfig {
    /// 运行时可修改的采集策略
    pub tracing: TracingConfig,
    /// 流式响应识别规则
    pub streaming: StreamingHeuristics,
    /// 记录存储
    pub store: StoreConfig,
    /// 实时推送
    pub live: LiveConfig,
}

/// 记录存储配置
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct StoreConfig {
    /// 最多保留的记录数，超出后淘汰最旧记录
    #[serde(alias = "max_records")]
    pub max_records: usize,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            max_records: DEFAULT_MAX_RECORDS,
        }
    }
}

/// 实时推送配置
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct LiveConfig {
    /// 每个观察者的队列长度
    #[serde(alias = "observer_buffer")]
    pub observer_buffer: usize,
    /// 首页快照推送间隔（秒），0 表示关闭
    #[serde(alias = "snapshot_interval_secs")]
    pub snapshot_interval_secs: u64,
    /// 快照和初始列表的条数
    #[serde(alias = "snapshot_limit")]
    pub snapshot_limit: u64,
}

impl Default for LiveConfig {
    fn default() -> Self {
        Self {
            observer_buffer: DEFAULT_OBSERVER_BUFFER,
            snapshot_interval_secs: 30,
            snapshot_limit: 50,
        }
    }
}
