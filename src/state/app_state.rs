//! 应用状态

use chrono::{DateTime, Utc};
use std::sync::Arc;
use std::time::Duration;

use crate::config::{
    env::{constants::AUTH_FAILURE_DELAY_MS, EnvConfig},
    AdminCredential, PanelConfig, SecuritySection,
};
use crate::infra::CommandExecutor;
use crate::services::{
    containers::{ContainerManager, ManagerSettings},
    nginx::SiteDirectories,
    postgres::PostgresRunner,
};

use super::session_store::{LockoutStore, SessionStore};

/// 应用状态
///
/// 进程级上下文，构造一次后以 `Arc` 共享给所有 handler
pub struct AppState {
    // ========== 核心配置 ==========
    /// 环境配置
    pub config: EnvConfig,
    /// 面板配置（INI 文件）
    pub panel: PanelConfig,
    /// 管理员凭据，未配置时登录被禁用
    pub admin: Option<AdminCredential>,
    /// 服务启动时间
    pub started_at: DateTime<Utc>,

    // ========== 认证 ==========
    /// 会话存储
    pub sessions: SessionStore,
    /// 登录失败锁定
    pub lockouts: LockoutStore,
    /// 认证失败响应前的固定延迟
    pub auth_failure_delay: Duration,

    // ========== 外部服务 ==========
    /// 容器生命周期管理
    pub containers: ContainerManager,
    /// PostgreSQL 透传
    pub database: PostgresRunner,
}

impl AppState {
    /// 创建新的应用状态
    pub fn new(config: EnvConfig, panel: PanelConfig, executor: Arc<dyn CommandExecutor>) -> Self {
        let admin = panel.admin_credential();
        let security = &panel.security;

        tracing::info!(
            bind = %config.bind,
            port = config.port,
            config_path = %config.config_path.display(),
            login_enabled = admin.is_some(),
            session_timeout_hours = security.session_timeout_hours,
            max_login_attempts = security.max_login_attempts,
            lockout_minutes = security.lockout_duration_minutes,
            "Loaded configuration"
        );
        if admin.is_none() {
            tracing::warn!("No admin password_hash configured, login is disabled");
        }

        let defaults = SecuritySection::default();
        let session_timeout = security.session_timeout().unwrap_or_else(|| {
            tracing::warn!(
                value = security.session_timeout_hours,
                fallback = defaults.session_timeout_hours,
                "session_timeout_hours out of range, using default"
            );
            chrono::Duration::hours(defaults.session_timeout_hours as i64)
        });
        let lockout_duration = security.lockout_duration().unwrap_or_else(|| {
            tracing::warn!(
                value = security.lockout_duration_minutes,
                fallback = defaults.lockout_duration_minutes,
                "lockout_duration_minutes out of range, using default"
            );
            chrono::Duration::minutes(defaults.lockout_duration_minutes as i64)
        });

        let sessions = SessionStore::new(session_timeout);
        let lockouts = LockoutStore::new(security.max_login_attempts.max(1), lockout_duration);

        let containers = ContainerManager::new(
            executor.clone(),
            SiteDirectories::new(&config.nginx_config_root, &config.web_content_root),
            ManagerSettings {
                docker_bin: config.docker_bin.clone(),
                timeout: config.command_timeout,
                server_ip: panel.server.ip.clone(),
            },
        );
        let database = PostgresRunner::new(
            executor,
            &config.psql_bin,
            config.command_timeout,
            panel.database.clone(),
        );

        Self {
            admin,
            started_at: Utc::now(),
            sessions,
            lockouts,
            auth_failure_delay: Duration::from_millis(AUTH_FAILURE_DELAY_MS),
            containers,
            database,
            panel,
            config,
        }
    }

    /// 覆盖认证失败延迟
    pub fn with_auth_failure_delay(mut self, delay: Duration) -> Self {
        self.auth_failure_delay = delay;
        self
    }

    /// 认证失败统一延迟，削弱基于时间的用户名探测
    pub async fn delay_auth_failure(&self) {
        if !self.auth_failure_delay.is_zero() {
            tokio::time::sleep(self.auth_failure_delay).await;
        }
    }
}
