//! # 采集策略存储
//!
//! 运行时可修改的追踪配置。读取返回完整快照（写时复制），更新串行执行，
//! 更新完成后按订阅顺序同步通知订阅者。

use std::fmt;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use parking_lot::{Mutex, RwLock};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::filter::{ExcludeMatcher, StreamingHeuristics};
use crate::error::{Result, TraceError};
use crate::logging::{LogComponent, LogStage};
use crate::{linfo, lwarn};

/// 请求体默认采集上限（100 KiB）
pub const DEFAULT_MAX_BODY_SIZE: u64 = 100 * 1024;
/// 响应体默认采集上限（100 KiB）
pub const DEFAULT_MAX_RESPONSE_SIZE: u64 = 100 * 1024;
/// 流式响应默认累计采集上限（1 MiB）
pub const DEFAULT_MAX_STREAM_SIZE: u64 = 1024 * 1024;

/// 追踪配置
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct TracingConfig {
    /// 总开关，关闭时任何路径都不追踪
    pub enabled: bool,
    /// 是否详细采集请求/响应体
    #[serde(rename = "detailedBodyCapture", alias = "detailed_body_capture")]
    pub detailed_body_capture: bool,
    /// 是否按分块采集流式响应
    #[serde(rename = "detailedSSECapture", alias = "detailed_sse_capture")]
    pub detailed_sse_capture: bool,
    /// 请求体上限（字节）
    #[serde(rename = "maxBodySize", alias = "max_body_size")]
    pub max_body_size: u64,
    /// 响应体上限（字节）
    #[serde(rename = "maxResponseSize", alias = "max_response_size")]
    pub max_response_size: u64,
    /// 流式响应累计上限（字节）
    #[serde(rename = "maxStreamSize", alias = "max_stream_size")]
    pub max_stream_size: u64,
    /// 附加排除路径（在包含列表之后生效）
    #[serde(rename = "excludePaths", alias = "exclude_paths")]
    pub exclude_paths: Vec<String>,
}

impl Default for TracingConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            detailed_body_capture: false,
            detailed_sse_capture: false,
            max_body_size: DEFAULT_MAX_BODY_SIZE,
            max_response_size: DEFAULT_MAX_RESPONSE_SIZE,
            max_stream_size: DEFAULT_MAX_STREAM_SIZE,
            // 包含列表已经限定了追踪范围，这里只是补充排除
            exclude_paths: Vec::new(),
        }
    }
}

/// 配置补丁：只有 `Some` 的字段会被合并
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TracingConfigPatch {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub enabled: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub detailed_body_capture: Option<bool>,
    #[serde(rename = "detailedSSECapture", skip_serializing_if = "Option::is_none")]
    pub detailed_sse_capture: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_body_size: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_response_size: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_stream_size: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub exclude_paths: Option<Vec<String>>,
}

/// 被拒绝的补丁字段（保留原值）
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RejectedField {
    pub field: String,
    pub reason: String,
}

impl RejectedField {
    fn new(field: &str, reason: impl Into<String>) -> Self {
        Self {
            field: field.to_string(),
            reason: reason.into(),
        }
    }
}

impl fmt::Display for RejectedField {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.field, self.reason)
    }
}

impl From<TracingConfig> for TracingConfigPatch {
    fn from(config: TracingConfig) -> Self {
        Self {
            enabled: Some(config.enabled),
            detailed_body_capture: Some(config.detailed_body_capture),
            detailed_sse_capture: Some(config.detailed_sse_capture),
            max_body_size: Some(config.max_body_size),
            max_response_size: Some(config.max_response_size),
            max_stream_size: Some(config.max_stream_size),
            exclude_paths: Some(config.exclude_paths),
        }
    }
}

impl TracingConfigPatch {
    /// 是否不包含任何字段
    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.enabled.is_none()
            && self.detailed_body_capture.is_none()
            && self.detailed_sse_capture.is_none()
            && self.max_body_size.is_none()
            && self.max_response_size.is_none()
            && self.max_stream_size.is_none()
            && self.exclude_paths.is_none()
    }

    /// 逐字段解析 JSON 补丁
    ///
    /// 单个字段格式错误只拒绝该字段，其余字段照常生效；
    /// 只有整体不是 JSON 对象时才返回错误。
    pub fn from_json(value: &Value) -> Result<(Self, Vec<RejectedField>)> {
        let Some(object) = value.as_object() else {
            return Err(TraceError::config("追踪配置补丁必须是 JSON 对象"));
        };

        let mut patch = Self::default();
        let mut rejected = Vec::new();
        for (key, value) in object {
            if let Err(rejection) = patch.set_field(key, value) {
                rejected.push(rejection);
            }
        }
        Ok((patch, rejected))
    }

    fn set_field(&mut self, key: &str, value: &Value) -> std::result::Result<(), RejectedField> {
        match key {
            "enabled" => self.enabled = Some(parse_bool(key, value)?),
            "detailedBodyCapture" | "detailed_body_capture" => {
                self.detailed_body_capture = Some(parse_bool(key, value)?);
            }
            "detailedSSECapture" | "detailedSseCapture" | "detailed_sse_capture" => {
                self.detailed_sse_capture = Some(parse_bool(key, value)?);
            }
            "maxBodySize" | "max_body_size" => self.max_body_size = Some(parse_size(key, value)?),
            "maxResponseSize" | "max_response_size" => {
                self.max_response_size = Some(parse_size(key, value)?);
            }
            "maxStreamSize" | "max_stream_size" => {
                self.max_stream_size = Some(parse_size(key, value)?);
            }
            "excludePaths" | "exclude_paths" => {
                self.exclude_paths = Some(parse_paths(key, value)?);
            }
            _ => return Err(RejectedField::new(key, "未知字段")),
        }
        Ok(())
    }

    fn apply_to(&self, config: &mut TracingConfig) {
        if let Some(enabled) = self.enabled {
            config.enabled = enabled;
        }
        if let Some(value) = self.detailed_body_capture {
            config.detailed_body_capture = value;
        }
        if let Some(value) = self.detailed_sse_capture {
            config.detailed_sse_capture = value;
        }
        if let Some(value) = self.max_body_size {
            config.max_body_size = value;
        }
        if let Some(value) = self.max_response_size {
            config.max_response_size = value;
        }
        if let Some(value) = self.max_stream_size {
            config.max_stream_size = value;
        }
        if let Some(paths) = &self.exclude_paths {
            config.exclude_paths.clone_from(paths);
        }
    }
}

fn parse_bool(field: &str, value: &Value) -> std::result::Result<bool, RejectedField> {
    value
        .as_bool()
        .ok_or_else(|| RejectedField::new(field, format!("需要布尔值, 实际为 {value}")))
}

fn parse_size(field: &str, value: &Value) -> std::result::Result<u64, RejectedField> {
    value
        .as_u64()
        .ok_or_else(|| RejectedField::new(field, format!("需要非负整数, 实际为 {value}")))
}

fn parse_paths(field: &str, value: &Value) -> std::result::Result<Vec<String>, RejectedField> {
    let Some(items) = value.as_array() else {
        return Err(RejectedField::new(field, format!("需要字符串数组, 实际为 {value}")));
    };
    items
        .iter()
        .map(|item| {
            item.as_str()
                .map(str::to_string)
                .ok_or_else(|| RejectedField::new(field, format!("数组元素必须是字符串: {item}")))
        })
        .collect()
}

/// 列出两份配置之间的差异（`字段: 旧 → 新`）
#[must_use]
pub fn describe_changes(old: &TracingConfig, new: &TracingConfig) -> Vec<String> {
    let mut changes = Vec::new();
    let mut push = |name: &str, before: String, after: String| {
        if before != after {
            changes.push(format!("{name}: {before} → {after}"));
        }
    };
    push("enabled", old.enabled.to_string(), new.enabled.to_string());
    push(
        "detailedBodyCapture",
        old.detailed_body_capture.to_string(),
        new.detailed_body_capture.to_string(),
    );
    push(
        "detailedSSECapture",
        old.detailed_sse_capture.to_string(),
        new.detailed_sse_capture.to_string(),
    );
    push("maxBodySize", old.max_body_size.to_string(), new.max_body_size.to_string());
    push(
        "maxResponseSize",
        old.max_response_size.to_string(),
        new.max_response_size.to_string(),
    );
    push("maxStreamSize", old.max_stream_size.to_string(), new.max_stream_size.to_string());
    push(
        "excludePaths",
        format!("{:?}", old.exclude_paths),
        format!("{:?}", new.exclude_paths),
    );
    changes
}

/// 不可变的策略快照，排除列表在更新时预编译
#[derive(Debug)]
pub struct PolicySnapshot {
    config: TracingConfig,
    excludes: ExcludeMatcher,
    heuristics: Arc<StreamingHeuristics>,
}

impl PolicySnapshot {
    #[must_use]
    pub fn compile(config: TracingConfig, heuristics: Arc<StreamingHeuristics>) -> Self {
        let excludes = ExcludeMatcher::new(&config.exclude_paths);
        Self {
            config,
            excludes,
            heuristics,
        }
    }

    #[must_use]
    pub const fn config(&self) -> &TracingConfig {
        &self.config
    }

    #[must_use]
    pub const fn excludes(&self) -> &ExcludeMatcher {
        &self.excludes
    }

    #[must_use]
    pub fn heuristics(&self) -> &StreamingHeuristics {
        &self.heuristics
    }
}

/// 配置持久化协作方
///
/// 由外部配置存储实现（见 `config::ConfigManager`），两个方法均为同步、后写覆盖。
pub trait TracingConfigBackend: Send + Sync {
    /// 读取持久化的追踪配置
    fn load_tracing(&self) -> TracingConfig;

    /// 持久化合并后的追踪配置
    fn persist_tracing(&self, config: &TracingConfig) -> Result<()>;
}

/// 一次更新的结果
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ConfigUpdate {
    pub config: TracingConfig,
    #[serde(skip)]
    pub previous: TracingConfig,
    pub changes: Vec<String>,
    pub rejected: Vec<RejectedField>,
    pub persisted: bool,
}

/// 订阅句柄
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SubscriptionId(u64);

type ConfigListener = Arc<dyn Fn(&TracingConfig, &TracingConfig) + Send + Sync>;

/// 采集策略存储
///
/// 进程内唯一实例，由 `AppContext` 构建后以 `Arc` 共享。
pub struct PolicyStore {
    current: RwLock<Arc<PolicySnapshot>>,
    update_lock: Mutex<()>,
    listeners: RwLock<Vec<(SubscriptionId, ConfigListener)>>,
    next_subscription: AtomicU64,
    heuristics: Arc<StreamingHeuristics>,
    backend: Arc<dyn TracingConfigBackend>,
}

impl fmt::Debug for PolicyStore {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PolicyStore")
            .field("config", self.current.read().config())
            .field("listeners", &self.listeners.read().len())
            .finish_non_exhaustive()
    }
}

impl PolicyStore {
    /// 从持久化配置创建策略存储
    pub fn new(backend: Arc<dyn TracingConfigBackend>, heuristics: StreamingHeuristics) -> Self {
        let heuristics = Arc::new(heuristics);
        let config = backend.load_tracing();

        linfo!(
            "system",
            LogStage::Startup,
            LogComponent::Policy,
            "policy_initialized",
            "追踪策略初始化完成",
            enabled = config.enabled,
            detailed_body_capture = config.detailed_body_capture,
            detailed_sse_capture = config.detailed_sse_capture,
            exclude_paths = config.exclude_paths.len()
        );

        Self {
            current: RwLock::new(Arc::new(PolicySnapshot::compile(
                config,
                Arc::clone(&heuristics),
            ))),
            update_lock: Mutex::new(()),
            listeners: RwLock::new(Vec::new()),
            next_subscription: AtomicU64::new(1),
            heuristics,
            backend,
        }
    }

    /// 获取当前配置的副本
    #[must_use]
    pub fn get(&self) -> TracingConfig {
        self.snapshot().config().clone()
    }

    /// 获取当前快照（热路径使用）
    #[must_use]
    pub fn snapshot(&self) -> Arc<PolicySnapshot> {
        Arc::clone(&self.current.read())
    }

    /// 合并更新配置
    pub fn update(&self, patch: TracingConfigPatch) -> ConfigUpdate {
        let _guard = self.update_lock.lock();
        self.apply_locked(&patch, Vec::new())
    }

    /// 以 JSON 补丁更新配置，格式错误的字段被拒绝并保留原值
    pub fn update_json(&self, value: &Value) -> Result<ConfigUpdate> {
        let (patch, rejected) = TracingConfigPatch::from_json(value)?;
        let _guard = self.update_lock.lock();
        Ok(self.apply_locked(&patch, rejected))
    }

    /// 切换详细请求体采集，返回新值
    pub fn toggle_detailed_body_capture(&self) -> bool {
        let _guard = self.update_lock.lock();
        let value = !self.current.read().config().detailed_body_capture;
        self.apply_locked(
            &TracingConfigPatch {
                detailed_body_capture: Some(value),
                ..TracingConfigPatch::default()
            },
            Vec::new(),
        );
        linfo!(
            "system",
            LogStage::Configuration,
            LogComponent::Policy,
            "toggle_body_capture",
            if value { "详细请求体采集已开启" } else { "详细请求体采集已关闭" }
        );
        value
    }

    /// 切换流式响应详细采集，返回新值
    pub fn toggle_detailed_sse_capture(&self) -> bool {
        let _guard = self.update_lock.lock();
        let value = !self.current.read().config().detailed_sse_capture;
        self.apply_locked(
            &TracingConfigPatch {
                detailed_sse_capture: Some(value),
                ..TracingConfigPatch::default()
            },
            Vec::new(),
        );
        linfo!(
            "system",
            LogStage::Configuration,
            LogComponent::Policy,
            "toggle_sse_capture",
            if value { "流式响应详细采集已开启" } else { "流式响应详细采集已关闭" }
        );
        value
    }

    /// 恢复默认配置
    pub fn reset_to_defaults(&self) -> ConfigUpdate {
        let update = self.update(TracingConfig::default().into());
        linfo!(
            "system",
            LogStage::Configuration,
            LogComponent::Policy,
            "reset_to_defaults",
            "追踪配置已恢复默认值"
        );
        update
    }

    /// 注册配置变更监听，回调参数为 `(新配置, 旧配置)`
    ///
    /// 回调在更新锁内同步执行，不能再调用 `update`。
    pub fn subscribe<F>(&self, listener: F) -> SubscriptionId
    where
        F: Fn(&TracingConfig, &TracingConfig) + Send + Sync + 'static,
    {
        let id = SubscriptionId(self.next_subscription.fetch_add(1, Ordering::Relaxed));
        self.listeners.write().push((id, Arc::new(listener)));
        id
    }

    /// 取消监听
    pub fn unsubscribe(&self, id: SubscriptionId) -> bool {
        let mut listeners = self.listeners.write();
        let before = listeners.len();
        listeners.retain(|(existing, _)| *existing != id);
        listeners.len() != before
    }

    #[must_use]
    pub fn is_tracing_enabled(&self) -> bool {
        self.current.read().config().enabled
    }

    #[must_use]
    pub fn is_detailed_body_capture_enabled(&self) -> bool {
        self.current.read().config().detailed_body_capture
    }

    #[must_use]
    pub fn is_detailed_sse_capture_enabled(&self) -> bool {
        self.current.read().config().detailed_sse_capture
    }

    #[must_use]
    pub fn max_body_size(&self) -> u64 {
        self.current.read().config().max_body_size
    }

    #[must_use]
    pub fn max_response_size(&self) -> u64 {
        self.current.read().config().max_response_size
    }

    #[must_use]
    pub fn max_stream_size(&self) -> u64 {
        self.current.read().config().max_stream_size
    }

    /// 路径是否排除（基于当前快照）
    #[must_use]
    pub fn should_exclude_path(&self, path: &str) -> bool {
        self.snapshot().should_exclude_path(path)
    }

    // 调用方必须持有 update_lock
    fn apply_locked(&self, patch: &TracingConfigPatch, rejected: Vec<RejectedField>) -> ConfigUpdate {
        let previous = self.current.read().config().clone();
        let mut next = previous.clone();
        patch.apply_to(&mut next);

        *self.current.write() = Arc::new(PolicySnapshot::compile(
            next.clone(),
            Arc::clone(&self.heuristics),
        ));

        let persisted = match self.backend.persist_tracing(&next) {
            Ok(()) => true,
            Err(err) => {
                lwarn!(
                    "system",
                    LogStage::Configuration,
                    LogComponent::Policy,
                    "persist_failed",
                    "追踪配置持久化失败，内存中的配置已生效",
                    error = err.to_string()
                );
                false
            }
        };

        let changes = describe_changes(&previous, &next);
        if !changes.is_empty() {
            linfo!(
                "system",
                LogStage::Configuration,
                LogComponent::Policy,
                "config_updated",
                "追踪配置已更新",
                changes = changes
            );
        }
        if !rejected.is_empty() {
            lwarn!(
                "system",
                LogStage::Configuration,
                LogComponent::Policy,
                "patch_fields_rejected",
                "部分配置字段格式错误，已保留原值",
                rejected = rejected.iter().map(ToString::to_string).collect::<Vec<_>>()
            );
        }

        let listeners: Vec<ConfigListener> = self
            .listeners
            .read()
            .iter()
            .map(|(_, listener)| Arc::clone(listener))
            .collect();
        for listener in listeners {
            listener(&next, &previous);
        }

        ConfigUpdate {
            config: next,
            previous,
            changes,
            rejected,
            persisted,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use serde_json::json;
    use std::sync::atomic::AtomicUsize;
    use std::thread;

    #[derive(Default)]
    struct MemoryBackend {
        initial: TracingConfig,
        persisted: Mutex<Vec<TracingConfig>>,
        fail: bool,
    }

    impl TracingConfigBackend for MemoryBackend {
        fn load_tracing(&self) -> TracingConfig {
            self.initial.clone()
        }

        fn persist_tracing(&self, config: &TracingConfig) -> Result<()> {
            if self.fail {
                return Err(TraceError::config("disk full"));
            }
            self.persisted.lock().push(config.clone());
            Ok(())
        }
    }

    fn store_with(backend: Arc<MemoryBackend>) -> PolicyStore {
        PolicyStore::new(backend, StreamingHeuristics::default())
    }

    #[test]
    fn update_disable_round_trip() {
        let backend = Arc::new(MemoryBackend::default());
        let store = store_with(Arc::clone(&backend));

        let update = store.update(TracingConfigPatch {
            enabled: Some(false),
            ..TracingConfigPatch::default()
        });

        assert!(!store.get().enabled);
        assert!(update.persisted);
        assert_eq!(update.changes, vec!["enabled: true → false".to_string()]);
        assert_eq!(backend.persisted.lock().last().map(|c| c.enabled), Some(false));
        assert!(store.should_exclude_path("/proxy/openai/chat"));
    }

    #[test]
    fn reset_restores_documented_defaults() {
        let backend = Arc::new(MemoryBackend {
            initial: TracingConfig {
                enabled: false,
                detailed_body_capture: true,
                detailed_sse_capture: true,
                max_body_size: 1,
                max_response_size: 2,
                max_stream_size: 3,
                exclude_paths: vec!["/proxy/x".into()],
            },
            ..MemoryBackend::default()
        });
        let store = store_with(backend);

        store.reset_to_defaults();

        assert_eq!(
            store.get(),
            TracingConfig {
                enabled: true,
                detailed_body_capture: false,
                detailed_sse_capture: false,
                max_body_size: 102_400,
                max_response_size: 102_400,
                max_stream_size: 1_048_576,
                exclude_paths: vec![],
            }
        );
    }

    #[test]
    fn toggles_flip_and_return_new_value() {
        let store = store_with(Arc::new(MemoryBackend::default()));
        assert!(store.toggle_detailed_body_capture());
        assert!(store.is_detailed_body_capture_enabled());
        assert!(!store.toggle_detailed_body_capture());
        assert!(store.toggle_detailed_sse_capture());
        assert!(store.is_detailed_sse_capture_enabled());
    }

    #[test]
    fn get_returns_defensive_copy() {
        let store = store_with(Arc::new(MemoryBackend::default()));
        let mut copy = store.get();
        copy.enabled = false;
        copy.exclude_paths.push("/proxy".into());
        assert!(store.is_tracing_enabled());
        assert!(store.get().exclude_paths.is_empty());
    }

    #[test]
    fn listeners_receive_new_and_old_in_subscription_order() {
        let store = store_with(Arc::new(MemoryBackend::default()));
        let seen = Arc::new(Mutex::new(Vec::new()));

        let first = Arc::clone(&seen);
        store.subscribe(move |new, old| {
            first.lock().push(format!("first:{}->{}", old.max_body_size, new.max_body_size));
        });
        let second = Arc::clone(&seen);
        let id = store.subscribe(move |new, _| {
            second.lock().push(format!("second:{}", new.max_body_size));
        });

        store.update(TracingConfigPatch {
            max_body_size: Some(10),
            ..TracingConfigPatch::default()
        });
        assert!(store.unsubscribe(id));
        assert!(!store.unsubscribe(id));
        store.update(TracingConfigPatch {
            max_body_size: Some(20),
            ..TracingConfigPatch::default()
        });

        assert_eq!(
            *seen.lock(),
            vec![
                "first:102400->10".to_string(),
                "second:10".to_string(),
                "first:10->20".to_string(),
            ]
        );
    }

    #[test]
    fn json_patch_rejects_malformed_fields_only() {
        let store = store_with(Arc::new(MemoryBackend::default()));
        let update = store
            .update_json(&json!({
                "enabled": "yes",
                "maxBodySize": -1,
                "maxStreamSize": 2048,
                "detailedSSECapture": true,
                "excludePaths": ["/proxy/health", 3],
                "bogus": 1
            }))
            .unwrap();

        let config = store.get();
        assert!(config.enabled);
        assert_eq!(config.max_body_size, DEFAULT_MAX_BODY_SIZE);
        assert_eq!(config.max_stream_size, 2048);
        assert!(config.detailed_sse_capture);
        assert!(config.exclude_paths.is_empty());

        let mut fields: Vec<_> = update.rejected.iter().map(|r| r.field.as_str()).collect();
        fields.sort_unstable();
        assert_eq!(fields, vec!["bogus", "enabled", "excludePaths", "maxBodySize"]);
    }

    #[test]
    fn json_patch_must_be_object() {
        let store = store_with(Arc::new(MemoryBackend::default()));
        let err = store.update_json(&json!([1, 2])).unwrap_err();
        assert!(matches!(err, TraceError::Config { .. }));
    }

    #[test]
    fn persist_failure_keeps_in_memory_update() {
        let store = store_with(Arc::new(MemoryBackend {
            fail: true,
            ..MemoryBackend::default()
        }));
        let update = store.update(TracingConfigPatch {
            detailed_body_capture: Some(true),
            ..TracingConfigPatch::default()
        });
        assert!(!update.persisted);
        assert!(store.is_detailed_body_capture_enabled());
    }

    #[test]
    fn readers_never_observe_torn_snapshots() {
        let store = Arc::new(store_with(Arc::new(MemoryBackend::default())));
        let torn = Arc::new(AtomicUsize::new(0));

        let writer = {
            let store = Arc::clone(&store);
            thread::spawn(move || {
                for i in 0..500_u64 {
                    store.update(TracingConfigPatch {
                        max_body_size: Some(i),
                        max_response_size: Some(i),
                        ..TracingConfigPatch::default()
                    });
                }
            })
        };
        let readers: Vec<_> = (0..4)
            .map(|_| {
                let store = Arc::clone(&store);
                let torn = Arc::clone(&torn);
                thread::spawn(move || {
                    for _ in 0..2_000 {
                        let config = store.get();
                        if config.max_body_size != config.max_response_size
                            && config.max_body_size != DEFAULT_MAX_BODY_SIZE
                        {
                            torn.fetch_add(1, Ordering::Relaxed);
                        }
                    }
                })
            })
            .collect();

        writer.join().unwrap();
        for reader in readers {
            reader.join().unwrap();
        }
        assert_eq!(torn.load(Ordering::Relaxed), 0);
        assert_eq!(store.max_body_size(), 499);
    }

    #[test]
    fn config_deserializes_original_and_snake_case_names() {
        let camel: TracingConfig = serde_json::from_value(json!({
            "enabled": true,
            "detailedSSECapture": true,
            "maxStreamSize": 10
        }))
        .unwrap();
        assert!(camel.detailed_sse_capture);
        assert_eq!(camel.max_stream_size, 10);
        assert_eq!(camel.max_body_size, DEFAULT_MAX_BODY_SIZE);

        let snake: TracingConfig = toml::from_str(
            "enabled = false\ndetailed_body_capture = true\nexclude_paths = [\"/proxy/a\"]\n",
        )
        .unwrap();
        assert!(!snake.enabled);
        assert!(snake.detailed_body_capture);
        assert_eq!(snake.exclude_paths, vec!["/proxy/a".to_string()]);
    }
}
