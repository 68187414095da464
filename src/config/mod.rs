//! 配置模块
//!
//! 环境变量解析与 INI 配置文件管理

pub mod env;
pub mod panel;

pub use env::EnvConfig;
pub use panel::{AdminCredential, ConfigError, PanelConfig, SecuritySection};
