//! # Proxy Trace
//!
//! 本地开发代理仪表盘的请求追踪子系统：采集策略、路径过滤、
//! 交换采集、最近记录存储与实时推送。

pub mod app;
pub mod config;
pub mod error;
pub mod logging;
pub mod management;
pub mod trace;

// Re-export commonly used types
pub use app::AppContext;
pub use config::{AppConfig, ConfigManager};
pub use error::{Result, TraceError};
