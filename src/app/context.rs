//! 应用上下文
//!
//! 统一持有跨模块共享的服务实例，便于在测试中注入内存配置。

use std::sync::Arc;
use std::time::Duration;

use tokio::task::JoinHandle;

use crate::config::{self, ConfigManager};
use crate::error::Result;
use crate::logging::{LogComponent, LogStage};
use crate::trace::{CaptureService, PolicyStore, TraceSystem, TracingConfigBackend};
use crate::linfo;

#[derive(Debug, Clone)]
pub struct AppContext {
    pub config: Arc<ConfigManager>,
    pub policy: Arc<PolicyStore>,
    pub traces: Arc<TraceSystem>,
    pub capture: CaptureService,
}

impl AppContext {
    /// 根据已加载的配置构建追踪子系统
    pub fn build(config: Arc<ConfigManager>) -> Result<Self> {
        let app_config = config.get_config();
        config::validate_config(&app_config)?;

        let backend: Arc<dyn TracingConfigBackend> = config.clone();
        let policy = Arc::new(PolicyStore::new(backend, app_config.gateway.streaming.clone()));
        let traces = Arc::new(TraceSystem::new(
            app_config.gateway.store.max_records,
            app_config.gateway.live.observer_buffer,
        ));
        let capture = CaptureService::new(Arc::clone(&policy), Arc::clone(&traces));

        linfo!(
            "system",
            LogStage::Startup,
            LogComponent::Main,
            "context_built",
            "追踪子系统初始化完成",
            max_records = app_config.gateway.store.max_records,
            observer_buffer = app_config.gateway.live.observer_buffer
        );

        Ok(Self {
            config,
            policy,
            traces,
            capture,
        })
    }

    /// 启动周期性快照推送；间隔为 0 时不启动
    #[must_use]
    pub fn spawn_background_tasks(&self) -> Option<JoinHandle<()>> {
        let live = self.config.get_config().gateway.live;
        if live.snapshot_interval_secs == 0 {
            return None;
        }
        Some(
            self.traces
                .spawn_snapshot_task(Duration::from_secs(live.snapshot_interval_secs), live.snapshot_limit),
        )
    }

    /// 初始列表与快照使用的条数
    #[must_use]
    pub fn snapshot_limit(&self) -> u64 {
        self.config.get_config().gateway.live.snapshot_limit
    }
}
