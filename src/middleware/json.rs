//! JSON 请求体 extractor

use axum::extract::FromRequest;

use crate::error::ApiError;

/// 与 `axum::Json` 相同，解析失败时返回统一的 `ApiError` 响应体
#[derive(Debug, FromRequest)]
#[from_request(via(axum::Json), rejection(ApiError))]
pub struct ApiJson<T>(pub T);
