//! 会话认证中间件
//!
//! 提供 `RequireSession` extractor，替代每个 handler 中重复的会话校验逻辑

use axum::{
    async_trait,
    extract::{ConnectInfo, FromRequestParts},
    http::{
        header::{HeaderMap, AUTHORIZATION, COOKIE, USER_AGENT},
        request::Parts,
    },
};
use std::convert::Infallible;
use std::net::SocketAddr;
use std::sync::Arc;

use crate::config::env::constants::SESSION_COOKIE;
use crate::domain::session::Session;
use crate::error::ApiError;
use crate::services::signing;
use crate::state::AppState;

/// 会话认证 Extractor
///
/// 先读 `Authorization: Bearer <token>`，再读签名 cookie。
/// 通过后刷新会话的最后活动时间。
///
/// # Example
///
/// ```ignore
/// async fn protected_handler(
///     RequireSession(session): RequireSession,
///     State(state): State<Arc<AppState>>,
/// ) -> impl IntoResponse {
///     // handler 逻辑...
/// }
/// ```
#[derive(Debug, Clone)]
pub struct RequireSession(pub Session);

#[async_trait]
impl FromRequestParts<Arc<AppState>> for RequireSession {
    type Rejection = ApiError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &Arc<AppState>,
    ) -> Result<Self, Self::Rejection> {
        let token = match session_reference(&parts.headers, &state.config.secret_key) {
            None => return Err(ApiError::Unauthenticated),
            Some(SessionReference::Invalid) => {
                tracing::warn!("Session cookie signature mismatch");
                return Err(ApiError::SessionExpired);
            }
            Some(SessionReference::Token(token)) => token,
        };

        let session = state
            .sessions
            .validate(&token)
            .await
            .ok_or(ApiError::SessionExpired)?;
        state.sessions.touch(&token).await;

        Ok(RequireSession(session))
    }
}

/// 请求携带的会话引用
#[derive(Debug, Clone, PartialEq)]
pub enum SessionReference {
    Token(String),
    /// 有引用但格式或签名无效
    Invalid,
}

/// 从请求头提取会话引用，Bearer 优先于 cookie
pub fn session_reference(headers: &HeaderMap, secret_key: &[u8]) -> Option<SessionReference> {
    if let Some(value) = headers.get(AUTHORIZATION).and_then(|v| v.to_str().ok()) {
        if let Some(token) = value.strip_prefix("Bearer ") {
            let token = token.trim();
            return Some(if token.is_empty() {
                SessionReference::Invalid
            } else {
                SessionReference::Token(token.to_string())
            });
        }
    }

    let signed = cookie_value(headers, SESSION_COOKIE)?;
    Some(match signing::verify(secret_key, &signed) {
        Some(token) => SessionReference::Token(token),
        None => SessionReference::Invalid,
    })
}

/// 读取指定名称的 cookie 值
pub fn cookie_value(headers: &HeaderMap, name: &str) -> Option<String> {
    headers
        .get_all(COOKIE)
        .iter()
        .filter_map(|v| v.to_str().ok())
        .flat_map(|v| v.split(';'))
        .filter_map(|pair| pair.trim().split_once('='))
        .find(|(key, _)| *key == name)
        .map(|(_, value)| value.to_string())
}

/// 登录成功后下发的会话 cookie
pub fn session_cookie(secret_key: &[u8], token: &str, secure: bool) -> String {
    let mut cookie = format!(
        "{}={}; Path=/; HttpOnly; SameSite=Strict",
        SESSION_COOKIE,
        signing::sign(secret_key, token)
    );
    if secure {
        cookie.push_str("; Secure");
    }
    cookie
}

/// 登出时使 cookie 立即失效
pub fn expired_session_cookie(secure: bool) -> String {
    let mut cookie = format!(
        "{}=; Path=/; HttpOnly; SameSite=Strict; Max-Age=0",
        SESSION_COOKIE
    );
    if secure {
        cookie.push_str("; Secure");
    }
    cookie
}

/// 客户端 IP（锁定计数的键）
///
/// 只信任连接地址，不读取转发头
#[derive(Debug, Clone, PartialEq)]
pub struct ClientIp(pub String);

#[async_trait]
impl<S: Send + Sync> FromRequestParts<S> for ClientIp {
    type Rejection = Infallible;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let ip = parts
            .extensions
            .get::<ConnectInfo<SocketAddr>>()
            .map(|ConnectInfo(addr)| addr.ip().to_string())
            .unwrap_or_else(|| "unknown".to_string());
        Ok(ClientIp(ip))
    }
}

/// 请求的 user-agent，缺失时为空串
pub fn user_agent(headers: &HeaderMap) -> &str {
    headers
        .get(USER_AGENT)
        .and_then(|v| v.to_str().ok())
        .unwrap_or("")
}
