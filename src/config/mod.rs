//! # 配置管理模块
//!
//! 处理应用配置加载、验证和写回

mod app_config;
mod manager;

pub use app_config::{AppConfig, GatewayConfig, LiveConfig, ServerConfig, StoreConfig};
pub use manager::{CONFIG_PATH_ENV, ConfigManager, ENV_PREFIX};

use crate::ensure_config;
use crate::error::Result;

/// 验证配置有效性
pub fn validate_config(config: &AppConfig) -> Result<()> {
    ensure_config!(config.server.port != 0, "无效的服务器端口: {}", config.server.port);
    ensure_config!(!config.server.host.trim().is_empty(), "服务器地址不能为空");
    ensure_config!(
        config.server.api_prefix.len() > 1 && config.server.api_prefix.starts_with('/'),
        "API前缀必须以 / 开头且不能为根路径: {}",
        config.server.api_prefix
    );
    ensure_config!(
        config.gateway.store.max_records > 0,
        "记录存储容量必须大于0"
    );
    ensure_config!(
        config.gateway.live.observer_buffer > 0,
        "观察者队列长度必须大于0"
    );
    Ok(())
}
