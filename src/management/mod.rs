//! # 管理API模块
//!
//! 提供追踪记录查询、采集策略管理和实时推送接口

pub mod handlers;
pub mod middleware;
pub mod response;
pub mod routes;
pub mod server;

pub use routes::create_routes;
pub use server::{AppState, ManagementServer};
