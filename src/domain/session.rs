//! 会话与登录相关领域模型

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// user-agent 最大保存长度（字符）
pub const MAX_USER_AGENT_LEN: usize = 200;

/// 已登录会话
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Session {
    #[serde(skip_serializing)]
    pub token: String,
    pub username: String,
    pub login_time: DateTime<Utc>,
    pub last_activity: DateTime<Utc>,
    pub ip: String,
    pub user_agent: String,
    #[serde(skip_serializing)]
    pub csrf_token: String,
}

/// 单个 IP 的登录失败计数
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LockoutCounter {
    pub failures: u32,
    pub last_failure: DateTime<Utc>,
}

/// 截断 user-agent（按字符，不会切断 UTF-8）
pub fn truncate_user_agent(user_agent: &str) -> String {
    user_agent.chars().take(MAX_USER_AGENT_LEN).collect()
}

/// 登录请求
#[derive(Debug, Default, Deserialize)]
pub struct LoginRequest {
    #[serde(default)]
    pub username: Option<String>,
    #[serde(default)]
    pub password: Option<String>,
}

/// 登录响应
#[derive(Debug, Serialize)]
pub struct LoginResponse {
    pub success: bool,
    pub message: String,
    pub user: String,
    pub token: String,
    pub csrf_token: String,
}

/// 当前会话信息
#[derive(Debug, Serialize)]
pub struct SessionInfoResponse {
    pub success: bool,
    pub user: String,
    pub login_time: DateTime<Utc>,
    pub last_activity: DateTime<Utc>,
    pub csrf_token: String,
}

/// 通用消息响应
#[derive(Debug, Serialize)]
pub struct MessageResponse {
    pub success: bool,
    pub message: String,
}

impl MessageResponse {
    pub fn ok(message: impl Into<String>) -> Self {
        Self {
            success: true,
            message: message.into(),
        }
    }
}
