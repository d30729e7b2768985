//! # 管理API处理器

pub mod live;
pub mod system;
pub mod traces;
pub mod tracing_config;
