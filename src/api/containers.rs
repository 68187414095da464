//! 容器管理 API
//!
//! 包含 /api/containers/* 端点

use axum::{
    extract::{Path, Query, State},
    response::IntoResponse,
    routing::{delete, get, post},
    Json, Router,
};
use serde_json::Value;
use std::sync::Arc;

use crate::domain::container::{
    ContainerActionResponse, ContainersResponse, CreateContainerRequest, CreateContainerResponse,
    RemoveContainerQuery, DEFAULT_IMAGE,
};
use crate::error::{ApiError, ApiResult};
use crate::middleware::{ApiJson, RequireSession};
use crate::services::containers::{CreateContainerSpec, LifecycleAction};
use crate::state::AppState;

/// 创建容器管理路由
pub fn router() -> Router<Arc<AppState>> {
    Router::new()
        .route("/api/containers", get(list_containers).post(create_container))
        .route("/api/containers/:id", delete(remove_container))
        .route("/api/containers/:id/start", post(start_container))
        .route("/api/containers/:id/stop", post(stop_container))
        .route("/api/containers/:id/restart", post(restart_container))
}

/// 列出所有容器（先刷新清单）
///
/// GET /api/containers
async fn list_containers(
    _auth: RequireSession,
    State(state): State<Arc<AppState>>,
) -> ApiResult<impl IntoResponse> {
    let containers = state.containers.list().await?;
    Ok(Json(ContainersResponse {
        success: true,
        containers,
    }))
}

/// 创建并启动容器
///
/// POST /api/containers
async fn create_container(
    RequireSession(session): RequireSession,
    State(state): State<Arc<AppState>>,
    ApiJson(req): ApiJson<CreateContainerRequest>,
) -> ApiResult<impl IntoResponse> {
    let name = req.name.trim().to_string();
    if name.is_empty() {
        return Err(ApiError::validation("Container name is required"));
    }
    let port = match &req.port {
        Some(value) => parse_port(value)?,
        None => None,
    };
    let image = req
        .image
        .as_deref()
        .map(str::trim)
        .unwrap_or(DEFAULT_IMAGE)
        .to_string();

    tracing::info!(user = %session.username, container = %name, image = %image, "Creating container");

    let created = state
        .containers
        .create(CreateContainerSpec {
            name: name.clone(),
            image,
            port,
            volumes: req.volumes.unwrap_or_default(),
            environment: req.environment.unwrap_or_default(),
        })
        .await?;

    Ok(Json(CreateContainerResponse {
        success: true,
        message: format!("Container \"{}\" created successfully", name),
        container_id: created.container_id,
        warning: created.warning,
    }))
}

/// POST /api/containers/:id/start
async fn start_container(
    auth: RequireSession,
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> ApiResult<impl IntoResponse> {
    apply_action(auth, &state, LifecycleAction::Start, &id).await
}

/// POST /api/containers/:id/stop
async fn stop_container(
    auth: RequireSession,
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> ApiResult<impl IntoResponse> {
    apply_action(auth, &state, LifecycleAction::Stop, &id).await
}

/// POST /api/containers/:id/restart
async fn restart_container(
    auth: RequireSession,
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> ApiResult<impl IntoResponse> {
    apply_action(auth, &state, LifecycleAction::Restart, &id).await
}

async fn apply_action(
    RequireSession(session): RequireSession,
    state: &AppState,
    action: LifecycleAction,
    id: &str,
) -> ApiResult<Json<ContainerActionResponse>> {
    tracing::info!(user = %session.username, container = %id, action = action.verb(), "Container action");
    state.containers.apply(action, id).await?;

    Ok(Json(ContainerActionResponse {
        success: true,
        message: format!("Container \"{}\" {} successfully", id, action.past_tense()),
        warning: None,
    }))
}

/// 删除容器
///
/// DELETE /api/containers/:id?force=&remove_volumes=
async fn remove_container(
    RequireSession(session): RequireSession,
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
    Query(query): Query<RemoveContainerQuery>,
) -> ApiResult<impl IntoResponse> {
    let force = query.force();
    let remove_volumes = query.remove_volumes();
    tracing::info!(
        user = %session.username,
        container = %id,
        force,
        remove_volumes,
        "Removing container"
    );

    let warning = state.containers.remove(&id, force, remove_volumes).await?;

    let mut message = format!("Container \"{}\" removed successfully", id);
    if let Some(warning) = &warning {
        message.push_str(&format!(" (Warning: {})", warning));
    }
    Ok(Json(ContainerActionResponse {
        success: true,
        message,
        warning,
    }))
}

/// 端口可以是 JSON 数字或数字字符串；null 视为未指定
fn parse_port(value: &Value) -> ApiResult<Option<u16>> {
    let number = match value {
        Value::Null => return Ok(None),
        Value::Number(n) => n.as_i64(),
        Value::String(s) => s.trim().parse::<i64>().ok(),
        _ => None,
    };
    let number = number.ok_or_else(|| ApiError::validation("Port must be a valid number"))?;

    if !(1..=65535).contains(&number) {
        return Err(ApiError::validation("Port must be between 1 and 65535"));
    }
    Ok(Some(number as u16))
}
