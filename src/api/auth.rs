//! 登录与会话 API
//!
//! 包含 /api/login, /api/logout, /api/session 端点

use axum::{
    extract::State,
    http::{header::SET_COOKIE, HeaderMap},
    response::IntoResponse,
    routing::{get, post},
    Json, Router,
};
use std::sync::Arc;

use crate::domain::session::{LoginRequest, LoginResponse, MessageResponse, SessionInfoResponse};
use crate::error::{ApiError, ApiResult};
use crate::middleware::auth::{
    expired_session_cookie, session_cookie, session_reference, user_agent, SessionReference,
};
use crate::middleware::{ApiJson, ClientIp, RequireSession};
use crate::services::password::verify_password;
use crate::services::signing::constant_time_eq;
use crate::state::AppState;

/// 创建认证路由
pub fn router() -> Router<Arc<AppState>> {
    Router::new()
        .route("/api/login", post(login))
        .route("/api/logout", post(logout))
        .route("/api/session", get(session_info))
}

/// 登录
///
/// POST /api/login
/// 顺序：字段校验 -> 锁定检查 -> 凭据配置检查 -> 凭据校验
async fn login(
    State(state): State<Arc<AppState>>,
    ClientIp(ip): ClientIp,
    headers: HeaderMap,
    ApiJson(req): ApiJson<LoginRequest>,
) -> ApiResult<impl IntoResponse> {
    let username = req.username.unwrap_or_default();
    let password = req.password.unwrap_or_default();
    if username.is_empty() || password.is_empty() {
        return Err(ApiError::validation("Username and password required"));
    }

    if state.lockouts.is_locked_out(&ip).await {
        tracing::warn!(ip = %ip, "Login rejected, IP is locked out");
        state.delay_auth_failure().await;
        return Err(ApiError::LockedOut);
    }

    let Some(admin) = state.admin.as_ref() else {
        tracing::error!("Login attempted but no admin credential is configured");
        return Err(ApiError::Configuration(
            "Admin credentials are not configured".to_string(),
        ));
    };

    // 两项都校验，避免通过耗时区分是用户名还是密码错误
    let username_ok = constant_time_eq(username.as_bytes(), admin.username.as_bytes());
    let password_ok = verify_password(&password, &admin.password_hash);
    if !(username_ok && password_ok) {
        let failures = state.lockouts.record_failure(&ip).await;
        tracing::warn!(ip = %ip, failures, "Failed login attempt");
        state.delay_auth_failure().await;
        return Err(ApiError::InvalidCredentials);
    }

    state.lockouts.clear_failures(&ip).await;
    let session = state
        .sessions
        .create(&admin.username, &ip, user_agent(&headers))
        .await;

    let cookie = session_cookie(
        &state.config.secret_key,
        &session.token,
        state.config.cookie_secure,
    );
    Ok((
        [(SET_COOKIE, cookie)],
        Json(LoginResponse {
            success: true,
            message: "Login successful".to_string(),
            user: session.username,
            token: session.token,
            csrf_token: session.csrf_token,
        }),
    ))
}

/// 登出，无会话时同样返回成功
///
/// POST /api/logout
async fn logout(State(state): State<Arc<AppState>>, headers: HeaderMap) -> impl IntoResponse {
    if let Some(SessionReference::Token(token)) =
        session_reference(&headers, &state.config.secret_key)
    {
        if let Some(session) = state.sessions.remove(&token).await {
            tracing::info!(user = %session.username, ip = %session.ip, "Logged out");
        }
    }

    (
        [(SET_COOKIE, expired_session_cookie(state.config.cookie_secure))],
        Json(MessageResponse::ok("Logged out successfully")),
    )
}

/// 当前会话信息
///
/// GET /api/session
async fn session_info(RequireSession(session): RequireSession) -> impl IntoResponse {
    Json(SessionInfoResponse {
        success: true,
        user: session.username,
        login_time: session.login_time,
        last_activity: session.last_activity,
        csrf_token: session.csrf_token,
    })
}
