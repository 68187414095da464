//! 环境变量配置加载

use std::env;
use std::path::PathBuf;
use std::time::Duration;
use tracing::warn;

use crate::services::signing::generate_secret_key;

/// 环境配置
#[derive(Clone, Debug)]
pub struct EnvConfig {
    /// 监听地址
    pub bind: String,
    /// 服务监听端口
    pub port: u16,
    /// INI 配置文件路径
    pub config_path: PathBuf,
    /// 会话 cookie 签名密钥
    pub secret_key: Vec<u8>,
    /// Nginx 配置目录根
    pub nginx_config_root: PathBuf,
    /// 网站内容目录根
    pub web_content_root: PathBuf,
    /// docker 可执行文件
    pub docker_bin: String,
    /// psql 可执行文件
    pub psql_bin: String,
    /// 单条外部命令超时
    pub command_timeout: Duration,
    /// cookie 是否带 Secure 属性
    pub cookie_secure: bool,
}

impl EnvConfig {
    /// 从环境变量加载配置
    pub fn from_env() -> Self {
        let bind = env::var("NOTACPANEL_BIND").unwrap_or_else(|_| "127.0.0.1".to_string());

        let port = env::var("PORT")
            .ok()
            .and_then(|v| v.parse().ok())
            .unwrap_or(constants::DEFAULT_PORT);

        let config_path = config_path_from_env();

        // SECRET_KEY 未设置时每次启动随机生成，重启后所有会话失效
        let secret_key = match env::var("SECRET_KEY") {
            Ok(key) if !key.is_empty() => key.into_bytes(),
            _ => {
                warn!("SECRET_KEY not set, generated a per-process key; sessions will not survive restarts");
                generate_secret_key()
            }
        };

        let nginx_config_root = env::var("NGINX_CONFIG_ROOT")
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from("./nginx-configs"));
        let web_content_root = env::var("WEB_CONTENT_ROOT")
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from("./web-content"));

        let docker_bin = env::var("DOCKER_BIN").unwrap_or_else(|_| "docker".to_string());
        let psql_bin = env::var("PSQL_BIN").unwrap_or_else(|_| "psql".to_string());

        let command_timeout = env::var("COMMAND_TIMEOUT_SECS")
            .ok()
            .and_then(|v| v.parse().ok())
            .map(Duration::from_secs)
            .unwrap_or(Duration::from_secs(constants::COMMAND_TIMEOUT_SECS));

        let cookie_secure = env::var("COOKIE_SECURE")
            .ok()
            .map(|v| v == "1" || v.eq_ignore_ascii_case("true"))
            .unwrap_or(false);

        Self {
            bind,
            port,
            config_path,
            secret_key,
            nginx_config_root,
            web_content_root,
            docker_bin,
            psql_bin,
            command_timeout,
            cookie_secure,
        }
    }

    /// 测试用配置：目录指向 `root` 下，固定密钥
    #[cfg(test)]
    pub fn for_root(root: &std::path::Path) -> Self {
        Self {
            bind: "127.0.0.1".to_string(),
            port: constants::DEFAULT_PORT,
            config_path: root.join("config.ini"),
            secret_key: b"test-secret-key".to_vec(),
            nginx_config_root: root.join("nginx-configs"),
            web_content_root: root.join("web-content"),
            docker_bin: "docker".to_string(),
            psql_bin: "psql".to_string(),
            command_timeout: Duration::from_secs(constants::COMMAND_TIMEOUT_SECS),
            cookie_secure: false,
        }
    }
}

/// INI 配置文件路径（`NOTACPANEL_CONFIG`，默认 `config.ini`）
pub fn config_path_from_env() -> PathBuf {
    env::var("NOTACPANEL_CONFIG")
        .map(PathBuf::from)
        .unwrap_or_else(|_| PathBuf::from("config.ini"))
}

/// 常量
pub mod constants {
    /// 默认监听端口
    pub const DEFAULT_PORT: u16 = 5000;

    /// 容器操作超时（秒）
    pub const COMMAND_TIMEOUT_SECS: u64 = 30;

    /// 登录失败后的固定延迟（毫秒）
    pub const AUTH_FAILURE_DELAY_MS: u64 = 1000;

    /// 会话 cookie 名称
    pub const SESSION_COOKIE: &str = "notacpanel_session";

    /// 版本号
    pub const VERSION: &str = env!("CARGO_PKG_VERSION");
}
