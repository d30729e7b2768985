//! # 请求追踪子系统
//!
//! 采集被代理交换的详细信息，保存最近的记录，并实时推送给仪表盘。
//!
//! - `policy`：运行时可修改的采集策略
//! - `filter`：路径与负载过滤决策
//! - `capture`：代理调用的采集钩子
//! - `store`：有界的最近记录存储
//! - `hub`：观察者实时分发
//! - `system`：存储与分发的组合

pub mod capture;
pub mod filter;
pub mod hub;
pub mod pagination;
pub mod policy;
pub mod record;
pub mod store;
pub mod system;

pub use capture::{CaptureService, ExchangeCapture, ExchangeStart, ExchangeState, ResponseTap};
pub use filter::{ExcludeMatcher, INCLUDE_PREFIXES, StreamingHeuristics};
pub use hub::{
    ConnectionStatus, DistributionHub, HubMessage, HubStatsSnapshot, Observer, ServerRunState,
    ServerStatus, TraceBatch,
};
pub use pagination::{PaginationData, PaginationParams};
pub use policy::{
    ConfigUpdate, PolicySnapshot, PolicyStore, RejectedField, SubscriptionId, TracingConfig,
    TracingConfigBackend, TracingConfigPatch,
};
pub use record::{CapturedPayload, PayloadEncoding, StreamChunk, TraceRecord};
pub use store::TraceStore;
pub use system::{Subscription, TraceSystem};
