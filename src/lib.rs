//! Not a cPanel - 单机 Docker 容器管理面板
//!
//! 库入口：模块声明、日志初始化与 HTTP 服务启动

pub mod api;
pub mod config;
pub mod domain;
pub mod error;
pub mod infra;
pub mod middleware;
pub mod services;
pub mod state;

use anyhow::Context;
use std::net::SocketAddr;
use std::sync::Arc;

use crate::config::{EnvConfig, PanelConfig};
use crate::infra::ProcessExecutor;
use crate::state::AppState;

/// 初始化日志，`RUST_LOG` 覆盖默认过滤规则
pub fn init_tracing() {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "notacpanel=info,tower_http=info".into()),
        )
        .init();
}

/// 加载配置并运行 HTTP 服务，直到收到 Ctrl+C / SIGTERM
pub async fn run_server(config: EnvConfig) -> anyhow::Result<()> {
    let panel = PanelConfig::load(&config.config_path)
        .with_context(|| format!("Failed to load {}", config.config_path.display()))?;
    let addr = format!("{}:{}", config.bind, config.port);

    let state = Arc::new(AppState::new(config, panel, Arc::new(ProcessExecutor::new())));

    // 启动时同步一次清单；docker 不可用不阻止启动
    if let Err(outcome) = state.containers.inventory().refresh().await {
        tracing::warn!(
            exit_code = outcome.exit_code,
            "Initial container listing failed, starting with an empty inventory"
        );
    }

    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .with_context(|| format!("Failed to bind {}", addr))?;
    tracing::info!(
        addr = %addr,
        version = crate::config::env::constants::VERSION,
        "Not a cPanel listening"
    );

    axum::serve(
        listener,
        api::router(state).into_make_service_with_connect_info::<SocketAddr>(),
    )
    .with_graceful_shutdown(shutdown_signal())
    .await
    .context("HTTP server error")?;

    tracing::info!("Server stopped");
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!(error = %e, "Failed to install Ctrl+C handler");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                tracing::error!(error = %e, "Failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
    tracing::info!("Shutdown signal received");
}
