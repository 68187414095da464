//! 容器生命周期管理
//!
//! 所有操作都通过 [`CommandExecutor`] 调用 docker CLI，成功后整体刷新清单；
//! 失败的操作不会触发刷新，引擎的错误输出原样返回给调用方。

use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tracing::{info, warn};

use crate::domain::container::{
    is_valid_identifier, ContainerRecord, CONTAINER_HTTP_PORT, DEFAULT_START_PORT,
};
use crate::infra::{CommandExecutor, CommandOutcome};
use crate::services::nginx::{SiteDirectories, SitePaths};
use crate::state::inventory::ContainerInventory;

/// 容器操作错误
#[derive(Debug, Error)]
pub enum ContainerError {
    /// 输入不合法（可由用户修正）
    #[error("{0}")]
    Validation(String),

    /// 引用的容器不存在
    #[error("{0}")]
    NotFound(String),

    /// 外部命令失败或超时
    #[error("{message}")]
    Execution {
        message: String,
        exit_code: i32,
        stderr: String,
    },

    /// 本地文件系统错误
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl ContainerError {
    fn execution(outcome: &CommandOutcome) -> Self {
        Self::execution_with_prefix(None, outcome)
    }

    fn execution_with_prefix(prefix: Option<&str>, outcome: &CommandOutcome) -> Self {
        let detail = match outcome.stderr.trim() {
            "" => format!("Command failed with exit code {}", outcome.exit_code),
            stderr => stderr.to_string(),
        };
        let message = match prefix {
            Some(prefix) => format!("{}: {}", prefix, detail),
            None => detail,
        };
        Self::Execution {
            message,
            exit_code: outcome.exit_code,
            stderr: outcome.stderr.clone(),
        }
    }
}

/// 创建参数
#[derive(Debug, Clone, Default)]
pub struct CreateContainerSpec {
    pub name: String,
    pub image: String,
    /// 未指定时从 8001 开始自动分配
    pub port: Option<u16>,
    /// 为空时自动创建并挂载 Nginx 目录
    pub volumes: Vec<String>,
    pub environment: Vec<String>,
}

/// 创建结果
#[derive(Debug, Clone, PartialEq)]
pub struct CreatedContainer {
    /// 截断为 12 位的容器 ID
    pub container_id: Option<String>,
    pub port: u16,
    pub warning: Option<String>,
}

/// 管理器设置
#[derive(Debug, Clone)]
pub struct ManagerSettings {
    pub docker_bin: String,
    pub timeout: Duration,
    /// 写入占位首页的控制面板地址
    pub server_ip: String,
}

/// 可执行的生命周期动作
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LifecycleAction {
    Start,
    Stop,
    Restart,
}

impl LifecycleAction {
    pub fn verb(&self) -> &'static str {
        match self {
            LifecycleAction::Start => "start",
            LifecycleAction::Stop => "stop",
            LifecycleAction::Restart => "restart",
        }
    }

    /// 过去式，用于响应消息
    pub fn past_tense(&self) -> &'static str {
        match self {
            LifecycleAction::Start => "started",
            LifecycleAction::Stop => "stopped",
            LifecycleAction::Restart => "restarted",
        }
    }
}

/// 容器生命周期管理器
pub struct ContainerManager {
    executor: Arc<dyn CommandExecutor>,
    inventory: ContainerInventory,
    sites: SiteDirectories,
    settings: ManagerSettings,
}

impl ContainerManager {
    pub fn new(
        executor: Arc<dyn CommandExecutor>,
        sites: SiteDirectories,
        settings: ManagerSettings,
    ) -> Self {
        let inventory =
            ContainerInventory::new(executor.clone(), &settings.docker_bin, settings.timeout);
        Self {
            executor,
            inventory,
            sites,
            settings,
        }
    }

    pub fn inventory(&self) -> &ContainerInventory {
        &self.inventory
    }

    /// 刷新并返回完整清单
    pub async fn list(&self) -> Result<Vec<ContainerRecord>, ContainerError> {
        self.inventory
            .refresh()
            .await
            .map_err(|outcome| ContainerError::execution(&outcome))
    }

    /// 创建并启动容器
    pub async fn create(
        &self,
        spec: CreateContainerSpec,
    ) -> Result<CreatedContainer, ContainerError> {
        let name = spec.name.as_str();
        if name.is_empty() {
            return Err(ContainerError::Validation(
                "Container name is required".to_string(),
            ));
        }
        if !is_valid_identifier(name) {
            return Err(ContainerError::Validation(format!(
                "Invalid container name \"{}\": use letters, digits, '_', '.', '-'",
                name
            )));
        }
        // 预检查只针对缓存，真正的冲突由引擎裁决
        if self.inventory.contains_name(name).await {
            return Err(ContainerError::Validation(format!(
                "Container with name \"{}\" already exists",
                name
            )));
        }
        validate_image(&spec.image)?;

        let port = match spec.port {
            Some(port) => port,
            None => self
                .inventory
                .available_port(DEFAULT_START_PORT)
                .await
                .ok_or_else(|| ContainerError::Validation("No available host port".to_string()))?,
        };

        let (provisioned, preexisting) = if spec.volumes.is_empty() {
            let preexisting = self.sites.exists(name).await;
            (Some(self.sites.provision(name).await?), preexisting)
        } else {
            (None, true)
        };

        let argv = self.run_argv(&spec, port, provisioned.as_ref());
        let outcome = self.executor.execute(&argv, self.settings.timeout).await;
        if !outcome.succeeded {
            warn!(container = %name, exit_code = outcome.exit_code, "docker run failed");
            // 只清理本次新建的目录
            if !preexisting {
                if let Err(e) = self.sites.remove(name).await {
                    warn!(container = %name, error = %e, "Failed to clean up site directories");
                }
            }
            return Err(ContainerError::execution(&outcome));
        }

        let mut warning = None;
        if let Some(paths) = &provisioned {
            if spec.image.to_lowercase().contains("nginx") {
                if let Err(e) = self
                    .sites
                    .write_defaults(paths, name, port, &self.settings.server_ip)
                    .await
                {
                    warn!(container = %name, error = %e, "Failed to write default Nginx files");
                    warning = Some(format!(
                        "Container created but failed to write default Nginx files: {}",
                        e
                    ));
                }
            }
        }

        self.refresh_after(name).await;

        let container_id = outcome
            .stdout
            .trim()
            .get(..12)
            .map(str::to_string)
            .or_else(|| Some(outcome.stdout.trim().to_string()).filter(|id| !id.is_empty()));

        info!(container = %name, image = %spec.image, port, "Container created");
        Ok(CreatedContainer {
            container_id,
            port,
            warning,
        })
    }

    fn run_argv(
        &self,
        spec: &CreateContainerSpec,
        port: u16,
        provisioned: Option<&SitePaths>,
    ) -> Vec<String> {
        let mut argv = vec![
            self.settings.docker_bin.clone(),
            "run".to_string(),
            "-d".to_string(),
            "--name".to_string(),
            spec.name.clone(),
            "-p".to_string(),
            format!("{}:{}", port, CONTAINER_HTTP_PORT),
        ];

        match provisioned {
            Some(paths) => {
                for mount in paths.bind_mounts() {
                    argv.push("-v".to_string());
                    argv.push(mount);
                }
            }
            None => {
                for volume in &spec.volumes {
                    argv.push("-v".to_string());
                    argv.push(volume.clone());
                }
            }
        }

        for env in &spec.environment {
            argv.push("-e".to_string());
            argv.push(env.clone());
        }

        argv.push("--restart".to_string());
        argv.push("unless-stopped".to_string());
        argv.push(spec.image.clone());
        argv
    }

    /// 启动 / 停止 / 重启
    pub async fn apply(&self, action: LifecycleAction, id: &str) -> Result<(), ContainerError> {
        validate_id(id)?;

        let outcome = self.docker(&[action.verb(), id]).await;
        if !outcome.succeeded {
            warn!(container = %id, action = action.verb(), exit_code = outcome.exit_code, "Container action failed");
            return Err(ContainerError::execution(&outcome));
        }

        info!(container = %id, action = action.verb(), "Container action succeeded");
        self.refresh_after(id).await;
        Ok(())
    }

    pub async fn start(&self, id: &str) -> Result<(), ContainerError> {
        self.apply(LifecycleAction::Start, id).await
    }

    pub async fn stop(&self, id: &str) -> Result<(), ContainerError> {
        self.apply(LifecycleAction::Stop, id).await
    }

    pub async fn restart(&self, id: &str) -> Result<(), ContainerError> {
        self.apply(LifecycleAction::Restart, id).await
    }

    /// 删除容器，返回清理目录时产生的警告
    ///
    /// 运行中的容器先停止；停止失败且未指定 `force` 时中止
    pub async fn remove(
        &self,
        id: &str,
        force: bool,
        remove_volumes: bool,
    ) -> Result<Option<String>, ContainerError> {
        validate_id(id)?;

        let record = self
            .inventory
            .find(id)
            .await
            .ok_or_else(|| ContainerError::NotFound("Container not found".to_string()))?;

        if record.is_running() {
            let stop = self.docker(&["stop", id]).await;
            if stop.succeeded {
                self.refresh_after(id).await;
            } else if !force {
                return Err(ContainerError::execution_with_prefix(
                    Some("Failed to stop container"),
                    &stop,
                ));
            } else {
                warn!(container = %id, "Stop failed, forcing removal");
            }
        }

        let outcome = if force {
            self.docker(&["rm", "-f", id]).await
        } else {
            self.docker(&["rm", id]).await
        };
        if !outcome.succeeded {
            return Err(ContainerError::execution(&outcome));
        }
        info!(container = %id, name = %record.name, force, "Container removed");

        let mut warning = None;
        if remove_volumes {
            let cleanup = if is_valid_identifier(&record.name) {
                self.sites.remove(&record.name).await
            } else {
                Err(std::io::Error::new(
                    std::io::ErrorKind::InvalidInput,
                    format!("refusing to delete directories for name \"{}\"", record.name),
                ))
            };
            if let Err(e) = cleanup {
                warn!(container = %record.name, error = %e, "Failed to clean up site directories");
                warning = Some(format!(
                    "Container removed but failed to clean up directories: {}",
                    e
                ));
            }
        }

        self.refresh_after(id).await;
        Ok(warning)
    }

    async fn docker(&self, args: &[&str]) -> CommandOutcome {
        let mut argv = Vec::with_capacity(args.len() + 1);
        argv.push(self.settings.docker_bin.clone());
        argv.extend(args.iter().map(|s| s.to_string()));
        self.executor.execute(&argv, self.settings.timeout).await
    }

    /// 操作成功后的刷新失败只记录日志，不影响操作结果
    async fn refresh_after(&self, container: &str) {
        if let Err(outcome) = self.inventory.refresh().await {
            warn!(container = %container, stderr = %outcome.stderr.trim(), "Inventory refresh after operation failed");
        }
    }
}

fn validate_id(id: &str) -> Result<(), ContainerError> {
    if is_valid_identifier(id) {
        Ok(())
    } else {
        Err(ContainerError::Validation(
            "Invalid container identifier".to_string(),
        ))
    }
}

/// 镜像名不能为空、不能以 '-' 开头（否则会被当作 docker 参数）、不能含空白
fn validate_image(image: &str) -> Result<(), ContainerError> {
    if image.is_empty() || image.starts_with('-') || image.chars().any(char::is_whitespace) {
        return Err(ContainerError::Validation(format!(
            "Invalid image reference \"{}\"",
            image
        )));
    }
    Ok(())
}
