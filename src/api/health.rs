//! 健康检查 API
//!
//! 包含 /health 端点

use axum::{extract::State, response::IntoResponse, routing::get, Json, Router};
use chrono::Utc;
use serde::Serialize;
use std::sync::Arc;

use crate::config::env::constants::VERSION;
use crate::state::AppState;

/// 健康检查响应
#[derive(Debug, Serialize)]
struct HealthResponse {
    status: &'static str,
    service: &'static str,
    version: &'static str,
    timestamp: String,
    uptime_secs: i64,
    containers_cached: usize,
}

/// 创建健康检查路由
pub fn router() -> Router<Arc<AppState>> {
    Router::new().route("/health", get(health_check))
}

/// 健康检查
///
/// GET /health
/// 无需认证，不触发 docker 调用
async fn health_check(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    let now = Utc::now();
    Json(HealthResponse {
        status: "ok",
        service: "notacpanel",
        version: VERSION,
        timestamp: now.to_rfc3339(),
        uptime_secs: (now - state.started_at).num_seconds(),
        containers_cached: state.containers.inventory().len().await,
    })
}
