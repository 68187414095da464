//! 面板持久化配置（INI 格式）
//!
//! 只做数据解析，从不执行配置文件内容

use std::collections::BTreeMap;
use std::fs;
use std::io::Write;
use std::path::Path;
use thiserror::Error;

/// 配置错误
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("line {line}: {message}")]
    Parse { line: usize, message: String },

    #[error("invalid value for [{section}] {key}: {value}")]
    Invalid {
        section: String,
        key: String,
        value: String,
    },
}

/// [server] 段
#[derive(Debug, Clone, PartialEq)]
pub struct ServerSection {
    pub ip: String,
    /// 管理员用户名（登录校验的唯一来源）
    pub username: String,
}

impl Default for ServerSection {
    fn default() -> Self {
        Self {
            ip: "localhost".to_string(),
            username: "admin".to_string(),
        }
    }
}

/// [admin] 段
#[derive(Debug, Clone, Default, PartialEq)]
pub struct AdminSection {
    pub password_hash: Option<String>,
}

/// [database] 段
#[derive(Debug, Clone, PartialEq)]
pub struct DatabaseSection {
    pub host: String,
    pub database: String,
    pub user: String,
    pub password: String,
    pub port: u16,
}

impl Default for DatabaseSection {
    fn default() -> Self {
        Self {
            host: "localhost".to_string(),
            database: "notacpanel".to_string(),
            user: "notacpanel".to_string(),
            password: String::new(),
            port: 5432,
        }
    }
}

/// [security] 段
#[derive(Debug, Clone, PartialEq)]
pub struct SecuritySection {
    pub session_timeout_hours: u64,
    pub max_login_attempts: u32,
    pub lockout_duration_minutes: u64,
}

impl SecuritySection {
    /// 会话超时上限（一年）
    pub const MAX_SESSION_TIMEOUT_HOURS: u64 = 24 * 365;
    /// 锁定时长上限（一年）
    pub const MAX_LOCKOUT_DURATION_MINUTES: u64 = 60 * 24 * 365;

    /// 会话空闲超时
    pub fn session_timeout(&self) -> Option<chrono::Duration> {
        bounded_duration(
            self.session_timeout_hours,
            Self::MAX_SESSION_TIMEOUT_HOURS,
            chrono::Duration::try_hours,
        )
    }

    /// 登录失败锁定时长
    pub fn lockout_duration(&self) -> Option<chrono::Duration> {
        bounded_duration(
            self.lockout_duration_minutes,
            Self::MAX_LOCKOUT_DURATION_MINUTES,
            chrono::Duration::try_minutes,
        )
    }
}

/// 取值须在 `1..=max` 内
fn bounded_duration(
    value: u64,
    max: u64,
    build: fn(i64) -> Option<chrono::Duration>,
) -> Option<chrono::Duration> {
    if value == 0 || value > max {
        return None;
    }
    i64::try_from(value).ok().and_then(build)
}

impl Default for SecuritySection {
    fn default() -> Self {
        Self {
            session_timeout_hours: 4,
            max_login_attempts: 5,
            lockout_duration_minutes: 15,
        }
    }
}

/// 管理员凭据
#[derive(Debug, Clone, PartialEq)]
pub struct AdminCredential {
    pub username: String,
    pub password_hash: String,
}

/// 面板配置
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PanelConfig {
    pub server: ServerSection,
    pub admin: AdminSection,
    pub database: DatabaseSection,
    pub security: SecuritySection,
}

type Sections = BTreeMap<String, BTreeMap<String, String>>;

impl PanelConfig {
    /// 从文件加载；文件不存在时返回默认配置（未配置管理员，登录被禁用）
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        match fs::read_to_string(path) {
            Ok(content) => Self::parse(&content),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                tracing::warn!(path = %path.display(), "Config file not found, login is disabled");
                Ok(Self::default())
            }
            Err(e) => Err(e.into()),
        }
    }

    /// 解析 INI 文本
    pub fn parse(content: &str) -> Result<Self, ConfigError> {
        let sections = parse_sections(content)?;
        let get = |section: &str, key: &str| -> Option<String> {
            sections.get(section).and_then(|s| s.get(key)).cloned()
        };

        let mut config = Self::default();

        if let Some(ip) = get("server", "ip").filter(|v| !v.is_empty()) {
            config.server.ip = ip;
        }
        if let Some(username) = get("server", "username").filter(|v| !v.is_empty()) {
            config.server.username = username;
        }

        config.admin.password_hash = get("admin", "password_hash").filter(|v| !v.is_empty());

        if let Some(host) = get("database", "host") {
            config.database.host = host;
        }
        if let Some(database) = get("database", "database") {
            config.database.database = database;
        }
        if let Some(user) = get("database", "user") {
            config.database.user = user;
        }
        if let Some(password) = get("database", "password") {
            config.database.password = password;
        }
        if let Some(port) = get("database", "port") {
            config.database.port = parse_number("database", "port", &port)?;
        }

        if let Some(v) = get("security", "session_timeout_hours") {
            config.security.session_timeout_hours = parse_in_range(
                "security",
                "session_timeout_hours",
                &v,
                1,
                SecuritySection::MAX_SESSION_TIMEOUT_HOURS,
            )?;
        }
        if let Some(v) = get("security", "max_login_attempts") {
            config.security.max_login_attempts =
                parse_in_range("security", "max_login_attempts", &v, 1, u32::MAX)?;
        }
        if let Some(v) = get("security", "lockout_duration_minutes") {
            config.security.lockout_duration_minutes = parse_in_range(
                "security",
                "lockout_duration_minutes",
                &v,
                1,
                SecuritySection::MAX_LOCKOUT_DURATION_MINUTES,
            )?;
        }

        Ok(config)
    }

    /// 已配置的管理员凭据；password_hash 缺失时返回 None
    pub fn admin_credential(&self) -> Option<AdminCredential> {
        self.admin
            .password_hash
            .as_ref()
            .map(|hash| AdminCredential {
                username: self.server.username.clone(),
                password_hash: hash.clone(),
            })
    }

    /// 序列化为 INI 文本
    pub fn to_ini(&self) -> String {
        let mut out = String::new();
        out.push_str("[server]\n");
        out.push_str(&format!("ip = {}\n", self.server.ip));
        out.push_str(&format!("username = {}\n\n", self.server.username));

        out.push_str("[admin]\n");
        out.push_str(&format!(
            "password_hash = {}\n\n",
            self.admin.password_hash.as_deref().unwrap_or("")
        ));

        out.push_str("[database]\n");
        out.push_str(&format!("host = {}\n", self.database.host));
        out.push_str(&format!("database = {}\n", self.database.database));
        out.push_str(&format!("user = {}\n", self.database.user));
        out.push_str(&format!("password = {}\n", self.database.password));
        out.push_str(&format!("port = {}\n\n", self.database.port));

        out.push_str("[security]\n");
        out.push_str(&format!(
            "session_timeout_hours = {}\n",
            self.security.session_timeout_hours
        ));
        out.push_str(&format!(
            "max_login_attempts = {}\n",
            self.security.max_login_attempts
        ));
        out.push_str(&format!(
            "lockout_duration_minutes = {}\n",
            self.security.lockout_duration_minutes
        ));
        out
    }

    /// 写入文件，权限为仅所有者可读写
    pub fn save(&self, path: &Path) -> Result<(), ConfigError> {
        let mut options = fs::OpenOptions::new();
        options.write(true).create(true).truncate(true);
        #[cfg(unix)]
        {
            use std::os::unix::fs::OpenOptionsExt;
            options.mode(0o600);
        }

        let mut file = options.open(path)?;
        file.write_all(self.to_ini().as_bytes())?;

        // mode 只对新建文件生效，已有文件需要显式收紧
        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            fs::set_permissions(path, fs::Permissions::from_mode(0o600))?;
        }

        Ok(())
    }
}

fn parse_sections(content: &str) -> Result<Sections, ConfigError> {
    let mut sections = Sections::new();
    let mut current: Option<String> = None;

    for (index, raw) in content.lines().enumerate() {
        let line_no = index + 1;
        let line = raw.trim();
        if line.is_empty() || line.starts_with('#') || line.starts_with(';') {
            continue;
        }

        if let Some(rest) = line.strip_prefix('[') {
            let name = rest.strip_suffix(']').ok_or_else(|| ConfigError::Parse {
                line: line_no,
                message: "unterminated section header".to_string(),
            })?;
            let name = name.trim().to_lowercase();
            sections.entry(name.clone()).or_default();
            current = Some(name);
            continue;
        }

        let section = current.as_ref().ok_or_else(|| ConfigError::Parse {
            line: line_no,
            message: "key outside of any section".to_string(),
        })?;

        // 以最先出现的 '=' 或 ':' 分隔，值中可以再含这两个字符
        let split_at = line.find(['=', ':']).ok_or_else(|| ConfigError::Parse {
            line: line_no,
            message: "expected 'key = value'".to_string(),
        })?;
        let key = line[..split_at].trim().to_lowercase();
        let value = line[split_at + 1..].trim().to_string();
        if key.is_empty() {
            return Err(ConfigError::Parse {
                line: line_no,
                message: "empty key".to_string(),
            });
        }

        sections
            .entry(section.clone())
            .or_default()
            .insert(key, value);
    }

    Ok(sections)
}

fn parse_number<T: std::str::FromStr>(section: &str, key: &str, value: &str) -> Result<T, ConfigError> {
    value.trim().parse().map_err(|_| ConfigError::Invalid {
        section: section.to_string(),
        key: key.to_string(),
        value: value.to_string(),
    })
}

fn parse_in_range<T: std::str::FromStr + PartialOrd>(
    section: &str,
    key: &str,
    value: &str,
    min: T,
    max: T,
) -> Result<T, ConfigError> {
    let parsed: T = parse_number(section, key, value)?;
    if parsed < min || parsed > max {
        return Err(ConfigError::Invalid {
            section: section.to_string(),
            key: key.to_string(),
            value: value.to_string(),
        });
    }
    Ok(parsed)
}
