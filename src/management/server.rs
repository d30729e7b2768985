//! # 管理服务器
//!
//! Axum HTTP服务器，提供追踪查询、策略管理与实时推送接口

use std::net::SocketAddr;
use std::ops::Deref;
use std::sync::Arc;

use axum::Router;
use axum::http::{HeaderValue, Method, header};
use axum::routing::get;
use tokio::net::TcpListener;
use tower::ServiceBuilder;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use crate::app::AppContext;
use crate::config::ServerConfig;
use crate::error::{Result, TraceError};
use crate::logging::{LogComponent, LogStage};
use crate::{linfo, lwarn};

/// 管理服务器应用状态
#[derive(Clone)]
pub struct AppState {
    context: Arc<AppContext>,
}

impl AppState {
    #[must_use]
    pub const fn new(context: Arc<AppContext>) -> Self {
        Self { context }
    }

    #[must_use]
    pub const fn context_arc(&self) -> &Arc<AppContext> {
        &self.context
    }
}

impl Deref for AppState {
    type Target = AppContext;

    fn deref(&self) -> &Self::Target {
        &self.context
    }
}

/// 管理服务器
pub struct ManagementServer {
    config: ServerConfig,
    router: Router,
}

impl ManagementServer {
    /// 创建新的管理服务器
    #[must_use]
    pub fn new(config: ServerConfig, context: Arc<AppContext>) -> Self {
        let router = Self::create_router(AppState::new(context), &config);
        Self { config, router }
    }

    /// 完整路由（含中间件），测试中直接使用
    #[must_use]
    pub fn router(&self) -> Router {
        self.router.clone()
    }

    fn create_router(state: AppState, config: &ServerConfig) -> Router {
        let api_routes = super::routes::create_routes(state);

        let mut app = Router::new()
            .nest(&config.api_prefix, api_routes)
            .route("/ping", get(super::handlers::system::ping_handler));

        let service_builder = ServiceBuilder::new().layer(TraceLayer::new_for_http());
        if config.enable_cors {
            app = app.layer(service_builder.layer(Self::cors_layer(config)));
        } else {
            app = app.layer(service_builder);
        }
        app
    }

    fn cors_layer(config: &ServerConfig) -> CorsLayer {
        let cors_layer = CorsLayer::new()
            .allow_methods([
                Method::GET,
                Method::POST,
                Method::PUT,
                Method::DELETE,
                Method::PATCH,
                Method::OPTIONS,
            ])
            .allow_headers([header::CONTENT_TYPE, header::ACCEPT, header::ORIGIN]);

        if config.cors_origins.is_empty() || config.cors_origins.iter().any(|o| o == "*") {
            return cors_layer.allow_origin(Any);
        }

        let origins = config
            .cors_origins
            .iter()
            .map(|origin| origin.parse::<HeaderValue>())
            .collect::<std::result::Result<Vec<_>, _>>();
        match origins {
            Ok(origins) => cors_layer.allow_origin(origins),
            Err(e) => {
                lwarn!(
                    "system",
                    LogStage::Startup,
                    LogComponent::ServerSetup,
                    "cors_config_fail",
                    format!("Invalid CORS origin configuration: {e}, falling back to allow any")
                );
                cors_layer.allow_origin(Any)
            }
        }
    }

    /// 启动服务器，Ctrl-C 时优雅退出
    pub async fn serve(self) -> Result<()> {
        let addr = self.bind_address()?;

        linfo!(
            "system",
            LogStage::Startup,
            LogComponent::ServerSetup,
            "server_start",
            format!("Starting management server on {addr}")
        );

        let listener = TcpListener::bind(&addr)
            .await
            .map_err(|e| TraceError::server_init_with_source(format!("端口绑定失败: {addr}"), e))?;

        axum::serve(listener, self.router)
            .with_graceful_shutdown(shutdown_signal())
            .await
            .map_err(|e| TraceError::server_start_with_source("管理服务器运行失败", e))?;

        linfo!(
            "system",
            LogStage::Shutdown,
            LogComponent::ServerSetup,
            "server_stopped",
            "管理服务器已停止"
        );
        Ok(())
    }

    /// 获取绑定地址
    pub fn bind_address(&self) -> Result<SocketAddr> {
        let address = self.config.bind_address();
        address.parse().map_err(|e| {
            TraceError::config_with_source(format!("Invalid management bind address '{address}'"), e)
        })
    }
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        lwarn!(
            "system",
            LogStage::Shutdown,
            LogComponent::ServerSetup,
            "signal_error",
            "无法监听退出信号",
            error = e.to_string()
        );
        std::future::pending::<()>().await;
    }
    linfo!(
        "system",
        LogStage::Shutdown,
        LogComponent::ServerSetup,
        "shutdown_signal",
        "收到退出信号，正在关闭管理服务器"
    );
}
