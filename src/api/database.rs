//! PostgreSQL API
//!
//! 包含 /api/postgresql/execute 端点

use axum::{extract::State, response::IntoResponse, routing::post, Json, Router};
use std::sync::Arc;

use crate::domain::database::SqlExecuteRequest;
use crate::error::{ApiError, ApiResult};
use crate::middleware::{ApiJson, RequireSession};
use crate::state::AppState;

/// 创建数据库路由
pub fn router() -> Router<Arc<AppState>> {
    Router::new().route("/api/postgresql/execute", post(execute_sql))
}

/// 执行 SQL
///
/// POST /api/postgresql/execute
async fn execute_sql(
    RequireSession(session): RequireSession,
    State(state): State<Arc<AppState>>,
    ApiJson(req): ApiJson<SqlExecuteRequest>,
) -> ApiResult<impl IntoResponse> {
    let database = req.database.unwrap_or_default();
    let query = req.query.unwrap_or_default();
    if database.is_empty() || query.is_empty() {
        return Err(ApiError::validation("Database and query are required"));
    }

    tracing::info!(user = %session.username, database = %database, query_len = query.len(), "Executing SQL");
    let response = state.database.execute(&database, &query).await?;
    Ok(Json(response))
}
