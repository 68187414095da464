//! 统一错误处理
//!
//! 提供 `ApiError` 枚举实现 `IntoResponse`，服务层错误通过 `From` 转换

use axum::{
    extract::rejection::JsonRejection,
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;

use crate::services::{ContainerError, DatabaseError};

/// API 错误响应结构
#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub success: bool,
    pub error: String,
    pub kind: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub exit_code: Option<i32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub stderr: Option<String>,
}

impl ErrorResponse {
    pub fn new(kind: &'static str, error: impl Into<String>) -> Self {
        Self {
            success: false,
            error: error.into(),
            kind,
            exit_code: None,
            stderr: None,
        }
    }
}

/// 统一 API 错误类型
#[derive(Debug)]
pub enum ApiError {
    /// 401 - 没有会话引用
    Unauthenticated,
    /// 401 - 会话引用无效或已过期
    SessionExpired,
    /// 401 - 用户名或密码错误（不区分哪一项）
    InvalidCredentials,
    /// 400 - 请求无效
    Validation(String),
    /// 404 - 资源未找到
    NotFound(String),
    /// 429 - 登录失败次数过多
    LockedOut,
    /// 400 - 外部命令失败
    Execution {
        message: String,
        exit_code: i32,
        stderr: String,
    },
    /// 500 - 配置缺失
    Configuration(String),
    /// 500 - 内部错误
    Internal(String),
}

impl ApiError {
    /// 创建请求无效错误
    pub fn validation(message: impl Into<String>) -> Self {
        Self::Validation(message.into())
    }

    /// 创建内部错误
    pub fn internal(message: impl Into<String>) -> Self {
        Self::Internal(message.into())
    }

    pub fn status(&self) -> StatusCode {
        match self {
            ApiError::Unauthenticated | ApiError::SessionExpired | ApiError::InvalidCredentials => {
                StatusCode::UNAUTHORIZED
            }
            ApiError::Validation(_) | ApiError::Execution { .. } => StatusCode::BAD_REQUEST,
            ApiError::NotFound(_) => StatusCode::NOT_FOUND,
            ApiError::LockedOut => StatusCode::TOO_MANY_REQUESTS,
            ApiError::Configuration(_) | ApiError::Internal(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }

    pub fn kind(&self) -> &'static str {
        match self {
            ApiError::Unauthenticated => "unauthenticated",
            ApiError::SessionExpired => "session_expired",
            ApiError::InvalidCredentials => "invalid_credentials",
            ApiError::Validation(_) => "validation",
            ApiError::NotFound(_) => "not_found",
            ApiError::LockedOut => "locked_out",
            ApiError::Execution { .. } => "execution",
            ApiError::Configuration(_) => "configuration",
            ApiError::Internal(_) => "internal",
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        let mut body = ErrorResponse::new(self.kind(), self.to_string());
        if let ApiError::Execution {
            exit_code, stderr, ..
        } = self
        {
            body.exit_code = Some(exit_code);
            body.stderr = Some(stderr);
        }

        (status, Json(body)).into_response()
    }
}

impl std::fmt::Display for ApiError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ApiError::Unauthenticated => write!(f, "Authentication required"),
            ApiError::SessionExpired => write!(f, "Session expired"),
            ApiError::InvalidCredentials => write!(f, "Invalid credentials"),
            ApiError::Validation(m) => write!(f, "{}", m),
            ApiError::NotFound(m) => write!(f, "{}", m),
            ApiError::LockedOut => {
                write!(f, "Too many failed login attempts. Please try again later.")
            }
            ApiError::Execution { message, .. } => write!(f, "{}", message),
            ApiError::Configuration(m) => write!(f, "{}", m),
            ApiError::Internal(m) => write!(f, "{}", m),
        }
    }
}

impl std::error::Error for ApiError {}

impl From<ContainerError> for ApiError {
    fn from(err: ContainerError) -> Self {
        match err {
            ContainerError::Validation(m) => ApiError::Validation(m),
            ContainerError::NotFound(m) => ApiError::NotFound(m),
            ContainerError::Execution {
                message,
                exit_code,
                stderr,
            } => ApiError::Execution {
                message,
                exit_code,
                stderr,
            },
            ContainerError::Io(e) => ApiError::Internal(format!("IO error: {}", e)),
        }
    }
}

impl From<DatabaseError> for ApiError {
    fn from(err: DatabaseError) -> Self {
        match err {
            DatabaseError::Validation(m) => ApiError::Validation(m),
            DatabaseError::NotConfigured(m) => ApiError::Configuration(m),
            DatabaseError::Execution {
                message,
                exit_code,
                stderr,
            } => ApiError::Execution {
                message,
                exit_code,
                stderr,
            },
        }
    }
}

impl From<JsonRejection> for ApiError {
    fn from(rejection: JsonRejection) -> Self {
        tracing::debug!(status = %rejection.status(), "Rejected request body");
        ApiError::Validation(format!("Invalid request body: {}", rejection.body_text()))
    }
}

/// 便捷类型别名
pub type ApiResult<T> = Result<T, ApiError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_mapping() {
        assert_eq!(ApiError::Unauthenticated.status(), StatusCode::UNAUTHORIZED);
        assert_eq!(ApiError::SessionExpired.status(), StatusCode::UNAUTHORIZED);
        assert_eq!(ApiError::LockedOut.status(), StatusCode::TOO_MANY_REQUESTS);
        assert_eq!(
            ApiError::NotFound("gone".into()).status(),
            StatusCode::NOT_FOUND
        );
        assert_eq!(
            ApiError::Configuration("x".into()).status(),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }

    #[test]
    fn test_error_response_new() {
        let resp = ErrorResponse::new("validation", "Container name is required");
        assert!(!resp.success);
        assert_eq!(resp.kind, "validation");
        assert!(resp.exit_code.is_none());
    }

    #[test]
    fn test_execution_error_carries_details() {
        let err: ApiError = ContainerError::Execution {
            message: "No such image".to_string(),
            exit_code: 125,
            stderr: "No such image\n".to_string(),
        }
        .into();
        assert_eq!(err.status(), StatusCode::BAD_REQUEST);

        let body = serde_json::to_value(ErrorResponse {
            exit_code: Some(125),
            stderr: Some("No such image\n".to_string()),
            ..ErrorResponse::new(err.kind(), err.to_string())
        })
        .unwrap();
        assert_eq!(body["success"], false);
        assert_eq!(body["error"], "No such image");
        assert_eq!(body["kind"], "execution");
        assert_eq!(body["exit_code"], 125);
    }

    #[test]
    fn test_database_not_configured_is_server_error() {
        let err: ApiError = DatabaseError::NotConfigured("missing".into()).into();
        assert_eq!(err.kind(), "configuration");
        assert_eq!(err.status(), StatusCode::INTERNAL_SERVER_ERROR);
    }
}
