//! 测试用脚本化执行器
//!
//! 按 argv 前缀匹配预设结果，并记录每次调用

use async_trait::async_trait;
use std::sync::Mutex;
use std::time::Duration;

use super::command::{CommandExecutor, CommandOutcome};

/// 一次被记录的调用
#[derive(Debug, Clone)]
pub struct RecordedCall {
    pub argv: Vec<String>,
    pub env: Vec<(String, String)>,
}

/// 脚本化执行器
///
/// 规则按添加顺序匹配；未命中时返回成功且 stdout 为空
#[derive(Default)]
pub struct ScriptedExecutor {
    rules: Mutex<Vec<(Vec<String>, CommandOutcome)>>,
    calls: Mutex<Vec<RecordedCall>>,
}

impl ScriptedExecutor {
    pub fn new() -> Self {
        Self::default()
    }

    /// argv 以 `prefix` 开头时返回 `outcome`
    pub fn on(&self, prefix: &[&str], outcome: CommandOutcome) -> &Self {
        self.rules.lock().unwrap().push((
            prefix.iter().map(|s| s.to_string()).collect(),
            outcome,
        ));
        self
    }

    pub fn calls(&self) -> Vec<RecordedCall> {
        self.calls.lock().unwrap().clone()
    }

    /// 以 `prefix` 开头的调用次数
    pub fn count(&self, prefix: &[&str]) -> usize {
        self.calls()
            .iter()
            .filter(|c| starts_with(&c.argv, prefix))
            .count()
    }
}

fn starts_with<S: AsRef<str>>(argv: &[String], prefix: &[S]) -> bool {
    argv.len() >= prefix.len() && argv.iter().zip(prefix).all(|(a, p)| a == p.as_ref())
}

#[async_trait]
impl CommandExecutor for ScriptedExecutor {
    async fn execute_with_env(
        &self,
        argv: &[String],
        env: &[(String, String)],
        _timeout: Duration,
    ) -> CommandOutcome {
        self.calls.lock().unwrap().push(RecordedCall {
            argv: argv.to_vec(),
            env: env.to_vec(),
        });

        self.rules
            .lock()
            .unwrap()
            .iter()
            .find(|(prefix, _)| starts_with(argv, prefix))
            .map(|(_, outcome)| outcome.clone())
            .unwrap_or_else(|| CommandOutcome::success(""))
    }
}
