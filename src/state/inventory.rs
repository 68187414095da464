//! 容器清单缓存
//!
//! 每次刷新整体替换，从不增量修改；读者不会看到部分列表

use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::RwLock;

use crate::domain::container::{parse_listing, ContainerRecord};
use crate::infra::{CommandExecutor, CommandOutcome};

/// 容器清单
pub struct ContainerInventory {
    executor: Arc<dyn CommandExecutor>,
    docker_bin: String,
    timeout: Duration,
    records: RwLock<Vec<ContainerRecord>>,
}

impl ContainerInventory {
    pub fn new(executor: Arc<dyn CommandExecutor>, docker_bin: &str, timeout: Duration) -> Self {
        Self {
            executor,
            docker_bin: docker_bin.to_string(),
            timeout,
            records: RwLock::new(Vec::new()),
        }
    }

    /// 从引擎重新同步清单
    ///
    /// 命令失败时保留旧缓存并返回失败结果
    pub async fn refresh(&self) -> Result<Vec<ContainerRecord>, CommandOutcome> {
        let argv = vec![
            self.docker_bin.clone(),
            "ps".to_string(),
            "-a".to_string(),
            "--no-trunc".to_string(),
            "--format".to_string(),
            "{{json .}}".to_string(),
        ];
        let outcome = self.executor.execute(&argv, self.timeout).await;
        if !outcome.succeeded {
            tracing::error!(
                exit_code = outcome.exit_code,
                stderr = %outcome.stderr.trim(),
                "Failed to list containers"
            );
            return Err(outcome);
        }

        let records = parse_listing(&outcome.stdout);
        tracing::debug!(count = records.len(), "Container inventory refreshed");
        self.replace(records.clone()).await;
        Ok(records)
    }

    /// 整体替换缓存
    pub async fn replace(&self, records: Vec<ContainerRecord>) {
        *self.records.write().await = records;
    }

    /// 当前缓存副本
    #[cfg(test)]
    pub async fn snapshot(&self) -> Vec<ContainerRecord> {
        self.records.read().await.clone()
    }

    pub async fn len(&self) -> usize {
        self.records.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }

    /// 是否存在同名容器（大小写敏感）
    pub async fn contains_name(&self, name: &str) -> bool {
        self.records.read().await.iter().any(|r| r.name == name)
    }

    /// 按 ID 前缀或名称查找，多个匹配时取列表中第一个
    pub async fn find(&self, identifier: &str) -> Option<ContainerRecord> {
        self.records
            .read()
            .await
            .iter()
            .find(|r| r.matches(identifier))
            .cloned()
    }

    /// 返回不小于 `start` 且未被任何已缓存容器占用的最小主机端口
    ///
    /// 不做预留：两个并发创建可能拿到同一端口，由引擎拒绝其中一个
    pub async fn available_port(&self, start: u16) -> Option<u16> {
        let used: HashSet<u16> = self
            .records
            .read()
            .await
            .iter()
            .flat_map(|r| r.parsed_ports.iter().map(|p| p.host_port))
            .collect();

        (start..=u16::MAX).find(|port| !used.contains(port))
    }
}
