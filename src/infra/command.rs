//! 命令执行器
//!
//! 以参数列表（而非 shell 字符串）启动外部进程，支持：
//! - 超时控制（超时后 kill 并回收子进程）
//! - stdout/stderr 分离
//! - 任何失败都转为结构化结果，不向上抛错

use async_trait::async_trait;
use serde::Serialize;
use std::process::Stdio;
use std::time::Duration;
use tokio::process::Command;
use tracing::{debug, error, warn};

/// 超时时写入 stderr 的固定文本
pub const TIMEOUT_MESSAGE: &str = "Command timed out";

/// 命令执行结果
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CommandOutcome {
    /// 退出码为 0
    pub succeeded: bool,
    pub stdout: String,
    pub stderr: String,
    /// 进程退出码；超时、启动失败或被信号终止时为 -1
    pub exit_code: i32,
}

impl CommandOutcome {
    /// 成功结果
    pub fn success(stdout: impl Into<String>) -> Self {
        Self {
            succeeded: true,
            stdout: stdout.into(),
            stderr: String::new(),
            exit_code: 0,
        }
    }

    /// 失败结果
    pub fn failure(exit_code: i32, stderr: impl Into<String>) -> Self {
        Self {
            succeeded: false,
            stdout: String::new(),
            stderr: stderr.into(),
            exit_code,
        }
    }

    /// 超时结果
    pub fn timed_out() -> Self {
        Self::failure(-1, TIMEOUT_MESSAGE)
    }
}

/// 外部命令执行接口
///
/// 生产环境使用 [`ProcessExecutor`]，测试中替换为脚本化的假实现
#[async_trait]
pub trait CommandExecutor: Send + Sync {
    /// 执行命令，`env` 中的变量仅注入子进程环境
    async fn execute_with_env(
        &self,
        argv: &[String],
        env: &[(String, String)],
        timeout: Duration,
    ) -> CommandOutcome;

    /// 执行命令
    async fn execute(&self, argv: &[String], timeout: Duration) -> CommandOutcome {
        self.execute_with_env(argv, &[], timeout).await
    }
}

/// 基于 tokio::process 的执行器
#[derive(Debug, Clone, Default)]
pub struct ProcessExecutor;

impl ProcessExecutor {
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl CommandExecutor for ProcessExecutor {
    async fn execute_with_env(
        &self,
        argv: &[String],
        env: &[(String, String)],
        timeout: Duration,
    ) -> CommandOutcome {
        let Some((program, args)) = argv.split_first() else {
            return CommandOutcome::failure(-1, "Empty command");
        };

        debug!(program = %program, args = args.len(), "Executing command");

        let mut command = Command::new(program);
        command
            .args(args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            // future 被丢弃（超时）时由 tokio 负责 kill 与回收
            .kill_on_drop(true);
        for (key, value) in env {
            command.env(key, value);
        }

        let child = match command.spawn() {
            Ok(child) => child,
            Err(e) => {
                warn!(program = %program, error = %e, "Failed to spawn command");
                return CommandOutcome::failure(-1, e.to_string());
            }
        };

        match tokio::time::timeout(timeout, child.wait_with_output()).await {
            Ok(Ok(output)) => {
                let exit_code = output.status.code().unwrap_or(-1);
                CommandOutcome {
                    succeeded: output.status.success(),
                    stdout: String::from_utf8_lossy(&output.stdout).into_owned(),
                    stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
                    exit_code,
                }
            }
            Ok(Err(e)) => {
                warn!(program = %program, error = %e, "Failed to wait for command");
                CommandOutcome::failure(-1, e.to_string())
            }
            Err(_) => {
                error!(program = %program, "Command timed out after {:?}", timeout);
                CommandOutcome::timed_out()
            }
        }
    }
}
