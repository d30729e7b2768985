//! # 错误处理
//!
//! 追踪子系统只有两类错误会真正向外传播：管理接口上的调用方错误
//! （配置补丁、未知记录）和启动阶段的错误。采集与分发失败都在内部消化，
//! 但同样先构造成 `TraceError`，保证日志和记录上的错误文本一致。

pub mod macros;
pub mod types;

pub use types::TraceError;

pub type Result<T> = std::result::Result<T, TraceError>;

/// 为失败结果附加操作说明，原错误作为 source 保留
pub trait Context<T> {
    #[track_caller]
    fn context<C>(self, context: C) -> Result<T>
    where
        C: std::fmt::Display;

    #[track_caller]
    fn with_context<C, F>(self, context: F) -> Result<T>
    where
        F: FnOnce() -> C,
        C: std::fmt::Display;
}

impl<T, E> Context<T> for std::result::Result<T, E>
where
    E: Into<TraceError>,
{
    fn context<C>(self, context: C) -> Result<T>
    where
        C: std::fmt::Display,
    {
        self.with_context(|| context)
    }

    fn with_context<C, F>(self, context: F) -> Result<T>
    where
        F: FnOnce() -> C,
        C: std::fmt::Display,
    {
        self.map_err(|error| {
            let error: TraceError = error.into();
            TraceError::Internal {
                message: format!("{}: {error}", context()),
                source: Some(anyhow::Error::new(error)),
            }
        })
    }
}

/// 日志里区分“调用方的问题”和“进程自身的问题”
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorCategory {
    /// 4xx：补丁格式、记录不存在
    Client,
    /// 5xx：采集、分发、IO、启动
    Server,
}

impl TraceError {
    #[must_use]
    pub fn category(&self) -> ErrorCategory {
        if self.to_http_response_parts().0.is_client_error() {
            ErrorCategory::Client
        } else {
            ErrorCategory::Server
        }
    }
}

#[cfg(test)]
mod tests;
