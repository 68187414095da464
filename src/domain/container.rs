//! 容器相关领域模型

use regex::Regex;
use serde::{Deserialize, Serialize};
use std::sync::OnceLock;

/// 默认镜像
pub const DEFAULT_IMAGE: &str = "nginx:alpine";

/// 容器内部端口（Nginx 默认监听 80）
pub const CONTAINER_HTTP_PORT: u16 = 80;

/// 自动分配端口的起点
pub const DEFAULT_START_PORT: u16 = 8001;

/// 容器状态
///
/// 引擎状态只有 `running` 映射为 Running，其余（paused、restarting、exited、created…）
/// 一律视为 Stopped
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ContainerStatus {
    Running,
    Stopped,
}

impl ContainerStatus {
    pub fn from_engine_state(state: &str) -> Self {
        if state == "running" {
            ContainerStatus::Running
        } else {
            ContainerStatus::Stopped
        }
    }
}

/// 端口映射（解析自 `host_ip:host_port->container_port/protocol`）
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PortMapping {
    pub host_ip: String,
    pub host_port: u16,
    pub container_port: u16,
    pub protocol: String,
}

impl PortMapping {
    /// 解析单条映射；未发布的端口（如 `80/tcp`）或端口范围返回 None
    pub fn parse(mapping: &str) -> Option<Self> {
        let (external, internal) = mapping.trim().split_once("->")?;

        let (host_ip, host_port) = match external.rsplit_once(':') {
            Some((ip, port)) if !ip.is_empty() => (ip.to_string(), port),
            Some((_, port)) => ("0.0.0.0".to_string(), port),
            None => ("0.0.0.0".to_string(), external),
        };

        let (container_port, protocol) = match internal.split_once('/') {
            Some((port, proto)) if !proto.is_empty() => (port, proto.to_string()),
            Some((port, _)) => (port, "tcp".to_string()),
            None => (internal, "tcp".to_string()),
        };

        Some(Self {
            host_ip,
            host_port: host_port.trim().parse().ok()?,
            container_port: container_port.trim().parse().ok()?,
            protocol,
        })
    }

    /// 解析逗号分隔的端口字符串
    /// 例如: "0.0.0.0:8001->80/tcp, 0.0.0.0:8002->80/tcp"
    pub fn parse_list(ports: &str) -> Vec<Self> {
        ports
            .split(',')
            .filter(|s| !s.trim().is_empty())
            .filter_map(Self::parse)
            .collect()
    }
}

/// 容器记录（最近一次刷新时观察到的状态）
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ContainerRecord {
    pub id: String,
    pub name: String,
    pub image: String,
    pub status: ContainerStatus,
    /// 原始端口字符串
    pub ports: String,
    pub parsed_ports: Vec<PortMapping>,
    pub created: String,
    pub command: String,
    pub size: String,
    pub networks: String,
    pub mounts: String,
}

impl ContainerRecord {
    /// 按前缀匹配 ID 或精确匹配名称
    pub fn matches(&self, identifier: &str) -> bool {
        (!identifier.is_empty() && self.id.starts_with(identifier)) || self.name == identifier
    }

    pub fn is_running(&self) -> bool {
        self.status == ContainerStatus::Running
    }
}

/// `docker ps -a --format '{{json .}}'` 的单行输出
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct DockerPsLine {
    #[serde(rename = "ID")]
    id: String,
    #[serde(rename = "Names")]
    names: String,
    #[serde(rename = "Image")]
    image: String,
    #[serde(rename = "State")]
    state: String,
    #[serde(rename = "Ports")]
    ports: String,
    #[serde(rename = "CreatedAt")]
    created_at: String,
    #[serde(rename = "Command")]
    command: String,
    #[serde(rename = "Size")]
    size: String,
    #[serde(rename = "Networks")]
    networks: String,
    #[serde(rename = "Mounts")]
    mounts: String,
}

impl From<DockerPsLine> for ContainerRecord {
    fn from(line: DockerPsLine) -> Self {
        let parsed_ports = PortMapping::parse_list(&line.ports);
        Self {
            id: line.id,
            name: line.names,
            image: line.image,
            status: ContainerStatus::from_engine_state(&line.state),
            ports: line.ports,
            parsed_ports,
            created: line.created_at,
            command: line.command,
            size: line.size,
            networks: line.networks,
            mounts: line.mounts,
        }
    }
}

/// 解析 JSON-lines 格式的容器列表，无法解析的行直接跳过
pub fn parse_listing(output: &str) -> Vec<ContainerRecord> {
    output
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .filter_map(|line| match serde_json::from_str::<DockerPsLine>(line) {
            Ok(parsed) => Some(ContainerRecord::from(parsed)),
            Err(e) => {
                tracing::warn!(error = %e, "Skipping unparseable container line");
                None
            }
        })
        .collect()
}

fn identifier_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| {
        Regex::new(r"^[a-zA-Z0-9][a-zA-Z0-9_.-]{0,127}$").expect("identifier pattern is valid")
    })
}

/// 校验容器 ID/名称：字母数字开头，仅含字母数字与 `_.-`，最长 128
pub fn is_valid_identifier(identifier: &str) -> bool {
    identifier_pattern().is_match(identifier)
}

/// 创建容器请求
#[derive(Debug, Default, Deserialize)]
pub struct CreateContainerRequest {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub image: Option<String>,
    /// 数字或数字字符串
    #[serde(default)]
    pub port: Option<serde_json::Value>,
    #[serde(default)]
    pub volumes: Option<Vec<String>>,
    #[serde(default)]
    pub environment: Option<Vec<String>>,
}

/// 删除容器查询参数（`true` 不区分大小写）
#[derive(Debug, Default, Deserialize)]
pub struct RemoveContainerQuery {
    #[serde(default)]
    pub force: Option<String>,
    #[serde(default)]
    pub remove_volumes: Option<String>,
}

impl RemoveContainerQuery {
    pub fn force(&self) -> bool {
        is_true(self.force.as_deref())
    }

    pub fn remove_volumes(&self) -> bool {
        is_true(self.remove_volumes.as_deref())
    }
}

fn is_true(value: Option<&str>) -> bool {
    value.is_some_and(|v| v.eq_ignore_ascii_case("true"))
}

/// 容器列表响应
#[derive(Debug, Serialize)]
pub struct ContainersResponse {
    pub success: bool,
    pub containers: Vec<ContainerRecord>,
}

/// 创建容器响应
#[derive(Debug, Serialize)]
pub struct CreateContainerResponse {
    pub success: bool,
    pub message: String,
    pub container_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub warning: Option<String>,
}

/// 容器操作响应
#[derive(Debug, Serialize)]
pub struct ContainerActionResponse {
    pub success: bool,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub warning: Option<String>,
}
