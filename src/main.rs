//! # Proxy Trace 主程序
//!
//! 加载配置、构建追踪子系统并启动管理服务器

use std::path::PathBuf;
use std::sync::Arc;

use clap::Parser;
use proxy_trace::{
    AppContext, ConfigManager, Result, lerror, linfo,
    logging::{self, LogComponent, LogStage},
    management::{ManagementServer, handlers::system::init_start_time},
};

/// 命令行参数
#[derive(Debug, Parser)]
#[command(name = "proxy-trace", version, about = "Request tracing dashboard backend")]
struct Cli {
    /// 配置文件路径（默认读取 PROXY_TRACE_CONFIG_PATH 或 config/config.{RUST_ENV}.toml）
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// 日志级别（RUST_LOG 优先）
    #[arg(long)]
    log_level: Option<String>,

    /// 覆盖管理端口
    #[arg(short, long)]
    port: Option<u16>,

    /// 打印日志配置指南后退出
    #[arg(long)]
    logging_help: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    if cli.logging_help {
        logging::print_logging_help();
        return Ok(());
    }

    logging::init_optimized_logging(cli.log_level.as_deref());
    init_start_time();

    if let Err(e) = run(cli).await {
        lerror!(
            "system",
            LogStage::Startup,
            LogComponent::Main,
            "service_start_failed",
            format!("服务启动失败: {e}")
        );
        std::process::exit(1);
    }

    linfo!(
        "system",
        LogStage::Shutdown,
        LogComponent::Main,
        "service_shutdown",
        "服务正常关闭"
    );
    Ok(())
}

async fn run(cli: Cli) -> Result<()> {
    let manager = match &cli.config {
        Some(path) => ConfigManager::from_file(path)?,
        None => ConfigManager::new()?,
    };
    let config = Arc::new(manager);

    let context = Arc::new(AppContext::build(Arc::clone(&config))?);
    let snapshot_task = context.spawn_background_tasks();

    linfo!(
        "system",
        LogStage::Startup,
        LogComponent::Main,
        "service_starting",
        "服务启动"
    );
    // 命令行端口只影响本次运行，不写回配置文件
    let mut server_config = config.get_config().server;
    if let Some(port) = cli.port {
        server_config.port = port;
    }
    let server = ManagementServer::new(server_config, Arc::clone(&context));
    let result = server.serve().await;

    if let Some(task) = snapshot_task {
        task.abort();
    }
    result
}
