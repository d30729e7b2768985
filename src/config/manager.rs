//! # 配置管理器
//!
//! 统一的配置读写接口：TOML 文件 + 环境变量覆盖，更新后写回文件（后写覆盖）。

use std::collections::HashMap;
use std::env;
use std::path::{Path, PathBuf};

use parking_lot::RwLock;

use super::{AppConfig, validate_config};
use crate::error::{Context, Result, TraceError};
use crate::logging::{LogComponent, LogStage};
use crate::trace::policy::{TracingConfig, TracingConfigBackend};
use crate::{ldebug, linfo, lwarn};

/// 环境变量覆盖前缀
pub const ENV_PREFIX: &str = "PROXY_TRACE_";
/// 指定配置文件路径的环境变量
pub const CONFIG_PATH_ENV: &str = "PROXY_TRACE_CONFIG_PATH";

/// 配置管理器
#[derive(Debug)]
pub struct ConfigManager {
    /// 配置文件路径，`None` 表示仅内存
    path: Option<PathBuf>,
    /// 当前配置
    config: RwLock<AppConfig>,
    /// 生效的环境变量覆盖数量
    env_overrides: usize,
}

impl ConfigManager {
    /// 创建配置管理器
    ///
    /// 优先使用 `PROXY_TRACE_CONFIG_PATH`，否则为 `config/config.{RUST_ENV}.toml`。
    pub fn new() -> Result<Self> {
        let config_file = if let Ok(path) = env::var(CONFIG_PATH_ENV) {
            path
        } else {
            let env = env::var("RUST_ENV").unwrap_or_else(|_| "dev".to_string());
            format!("config/config.{env}.toml")
        };

        Self::from_file(&config_file)
    }

    /// 从指定文件创建，应用进程环境变量覆盖
    pub fn from_file(config_path: impl AsRef<Path>) -> Result<Self> {
        Self::from_file_with_env(config_path, env::vars())
    }

    /// 从指定文件创建，覆盖项来自给定的变量集合
    pub fn from_file_with_env<I>(config_path: impl AsRef<Path>, vars: I) -> Result<Self>
    where
        I: IntoIterator<Item = (String, String)>,
    {
        let config_path = config_path.as_ref();
        let mut config = Self::load_config_file(config_path)?;

        let overrides = build_env_overrides(vars);
        for (path, value) in &overrides {
            apply_override_to_config(&mut config, path, value)?;
        }
        validate_config(&config)?;

        linfo!(
            "system",
            LogStage::Startup,
            LogComponent::Config,
            "config_loaded",
            "配置管理器初始化完成",
            path = config_path.display().to_string(),
            env_overrides = overrides.len()
        );

        Ok(Self {
            path: Some(config_path.to_path_buf()),
            config: RwLock::new(config),
            env_overrides: overrides.len(),
        })
    }

    /// 仅内存的配置管理器，更新不落盘
    #[must_use]
    pub fn in_memory(config: AppConfig) -> Self {
        Self {
            path: None,
            config: RwLock::new(config),
            env_overrides: 0,
        }
    }

    /// 获取当前配置
    #[must_use]
    pub fn get_config(&self) -> AppConfig {
        self.config.read().clone()
    }

    #[must_use]
    pub fn config_path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    #[must_use]
    pub const fn env_override_count(&self) -> usize {
        self.env_overrides
    }

    /// 修改配置并写回文件
    ///
    /// 校验失败时不做任何修改；写文件失败时内存中的配置已经生效，错误返回给调用方。
    pub fn update_config<F>(&self, mutate: F) -> Result<AppConfig>
    where
        F: FnOnce(&mut AppConfig),
    {
        let mut guard = self.config.write();
        let mut next = guard.clone();
        mutate(&mut next);
        validate_config(&next)?;
        (*guard).clone_from(&next);
        drop(guard);

        if let Some(path) = &self.path {
            Self::write_config_file(path, &next)?;
            ldebug!(
                "system",
                LogStage::Configuration,
                LogComponent::Config,
                "config_persisted",
                "配置已写回文件",
                path = path.display().to_string()
            );
        }
        Ok(next)
    }

    /// 加载配置文件；文件不存在时使用默认配置，首次写回时创建
    fn load_config_file(path: &Path) -> Result<AppConfig> {
        if !path.exists() {
            lwarn!(
                "system",
                LogStage::Startup,
                LogComponent::Config,
                "config_missing",
                "配置文件不存在，使用默认配置",
                path = path.display().to_string()
            );
            return Ok(AppConfig::default());
        }

        let content = std::fs::read_to_string(path).map_err(|e| {
            TraceError::config_with_source(format!("读取配置文件失败: {}", path.display()), e)
        })?;

        toml::from_str(&content).map_err(|e| {
            TraceError::config_with_source(
                format!("TOML解析失败 - 配置文件: {}, 详细错误: {e}", path.display()),
                e,
            )
        })
    }

    fn write_config_file(path: &Path, config: &AppConfig) -> Result<()> {
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("创建配置目录失败: {}", parent.display()))?;
        }
        let content = toml::to_string_pretty(config)?;
        std::fs::write(path, content)
            .with_context(|| format!("写入配置文件失败: {}", path.display()))
    }
}

impl TracingConfigBackend for ConfigManager {
    fn load_tracing(&self) -> TracingConfig {
        self.config.read().gateway.tracing.clone()
    }

    fn persist_tracing(&self, config: &TracingConfig) -> Result<()> {
        self.update_config(|app| app.gateway.tracing.clone_from(config))
            .map(|_| ())
    }
}

/// 构建环境变量覆盖映射
///
/// 例如: `PROXY_TRACE_SERVER_PORT` -> `server.port`
fn build_env_overrides<I>(vars: I) -> HashMap<String, String>
where
    I: IntoIterator<Item = (String, String)>,
{
    vars.into_iter()
        .filter_map(|(key, value)| {
            let config_key = key.strip_prefix(ENV_PREFIX)?;
            let config_path = config_key.to_lowercase().replace('_', ".");
            // 配置文件路径本身不是配置项
            (config_path != "config.path").then_some((config_path, value))
        })
        .collect()
}

fn parse_value<T>(path: &str, value: &str) -> Result<T>
where
    T: std::str::FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    value
        .trim()
        .parse()
        .map_err(|e| TraceError::config_with_source(format!("无效的配置值 {path}: {value}"), e))
}

/// 将环境变量覆盖应用到配置对象
fn apply_override_to_config(config: &mut AppConfig, path: &str, value: &str) -> Result<()> {
    let parts: Vec<&str> = path.split('.').collect();

    match parts.as_slice() {
        ["server", "host"] => config.server.host = value.to_string(),
        ["server", "port"] => config.server.port = parse_value(path, value)?,
        ["store", "maxrecords"] | ["store", "max", "records"] => {
            config.gateway.store.max_records = parse_value(path, value)?;
        }
        ["tracing", "enabled"] => config.gateway.tracing.enabled = parse_value(path, value)?,
        ["live", "observerbuffer"] | ["live", "observer", "buffer"] => {
            config.gateway.live.observer_buffer = parse_value(path, value)?;
        }
        _ => {
            lwarn!(
                "system",
                LogStage::Startup,
                LogComponent::Config,
                "unknown_override",
                "未知的配置路径，忽略环境变量覆盖",
                path = path
            );
        }
    }
    ldebug!(
        "system",
        LogStage::Startup,
        LogComponent::Config,
        "env_override",
        "应用环境变量覆盖",
        path = path
    );
    Ok(())
}
