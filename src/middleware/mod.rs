//! 中间件模块

pub mod auth;
pub mod json;

pub use auth::{ClientIp, RequireSession};
pub use json::ApiJson;
