//! 会话与登录锁定存储
//!
//! 两张进程内表：令牌 -> 会话、IP -> 失败计数。
//! 过期会话与过期计数只在下一次访问时惰性清理，没有后台清扫。

use chrono::{DateTime, Duration, Utc};
use std::collections::HashMap;
use tokio::sync::RwLock;

use crate::domain::session::{truncate_user_agent, LockoutCounter, Session};
use crate::services::signing::generate_token;

/// 会话存储
pub struct SessionStore {
    sessions: RwLock<HashMap<String, Session>>,
    /// 滑动过期时长
    timeout: Duration,
}

impl SessionStore {
    pub fn new(timeout: Duration) -> Self {
        Self {
            sessions: RwLock::new(HashMap::new()),
            timeout,
        }
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    /// 创建会话，返回包含令牌的会话副本
    pub async fn create(&self, username: &str, ip: &str, user_agent: &str) -> Session {
        self.create_at(username, ip, user_agent, Utc::now()).await
    }

    pub async fn create_at(
        &self,
        username: &str,
        ip: &str,
        user_agent: &str,
        now: DateTime<Utc>,
    ) -> Session {
        let session = Session {
            token: generate_token(),
            username: username.to_string(),
            login_time: now,
            last_activity: now,
            ip: ip.to_string(),
            user_agent: truncate_user_agent(user_agent),
            csrf_token: generate_token(),
        };

        let mut sessions = self.sessions.write().await;
        sessions.insert(session.token.clone(), session.clone());
        tracing::info!(user = %username, ip = %ip, active = sessions.len(), "Session created");
        session
    }

    /// 校验会话：不存在或 `now - last_activity > timeout` 均视为无效，过期会话顺带删除
    pub async fn validate(&self, token: &str) -> Option<Session> {
        self.validate_at(token, Utc::now()).await
    }

    pub async fn validate_at(&self, token: &str, now: DateTime<Utc>) -> Option<Session> {
        let mut sessions = self.sessions.write().await;
        let session = sessions.get(token)?;

        if now - session.last_activity > self.timeout {
            let expired = sessions.remove(token);
            if let Some(expired) = expired {
                tracing::info!(user = %expired.username, ip = %expired.ip, "Session expired");
            }
            return None;
        }

        Some(session.clone())
    }

    /// 刷新最后活动时间，返回会话是否存在
    pub async fn touch(&self, token: &str) -> bool {
        self.touch_at(token, Utc::now()).await
    }

    pub async fn touch_at(&self, token: &str, now: DateTime<Utc>) -> bool {
        let mut sessions = self.sessions.write().await;
        match sessions.get_mut(token) {
            Some(session) => {
                session.last_activity = now;
                true
            }
            None => false,
        }
    }

    /// 删除会话（登出）
    pub async fn remove(&self, token: &str) -> Option<Session> {
        let mut sessions = self.sessions.write().await;
        sessions.remove(token)
    }

    /// 当前会话数（含尚未惰性清理的过期会话）
    pub async fn len(&self) -> usize {
        self.sessions.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }
}

/// 登录失败锁定存储
pub struct LockoutStore {
    counters: RwLock<HashMap<String, LockoutCounter>>,
    max_attempts: u32,
    lockout_duration: Duration,
}

impl LockoutStore {
    pub fn new(max_attempts: u32, lockout_duration: Duration) -> Self {
        Self {
            counters: RwLock::new(HashMap::new()),
            max_attempts,
            lockout_duration,
        }
    }

    /// 记录一次失败，返回累计次数
    pub async fn record_failure(&self, ip: &str) -> u32 {
        self.record_failure_at(ip, Utc::now()).await
    }

    pub async fn record_failure_at(&self, ip: &str, now: DateTime<Utc>) -> u32 {
        let mut counters = self.counters.write().await;
        let counter = counters.entry(ip.to_string()).or_insert(LockoutCounter {
            failures: 0,
            last_failure: now,
        });
        counter.failures += 1;
        counter.last_failure = now;

        if counter.failures >= self.max_attempts {
            tracing::warn!(ip = %ip, failures = counter.failures, "IP locked out after repeated login failures");
        }
        counter.failures
    }

    /// 失败次数达到上限且仍在锁定窗口内时返回 true；窗口已过则删除计数
    pub async fn is_locked_out(&self, ip: &str) -> bool {
        self.is_locked_out_at(ip, Utc::now()).await
    }

    pub async fn is_locked_out_at(&self, ip: &str, now: DateTime<Utc>) -> bool {
        let mut counters = self.counters.write().await;
        let Some(counter) = counters.get(ip).copied() else {
            return false;
        };

        let elapsed = now - counter.last_failure;
        if elapsed >= self.lockout_duration {
            counters.remove(ip);
            return false;
        }

        counter.failures >= self.max_attempts
    }

    /// 登录成功后清除计数
    pub async fn clear_failures(&self, ip: &str) {
        self.counters.write().await.remove(ip);
    }

    pub async fn failures(&self, ip: &str) -> Option<u32> {
        self.counters.read().await.get(ip).map(|c| c.failures)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn store() -> SessionStore {
        SessionStore::new(Duration::hours(4))
    }

    #[tokio::test]
    async fn test_create_and_validate() {
        let store = store();
        let session = store.create("admin", "10.0.0.1", "curl/8.0").await;

        let found = store.validate(&session.token).await.unwrap();
        assert_eq!(found.username, "admin");
        assert_eq!(found.ip, "10.0.0.1");
        assert_eq!(found.login_time, found.last_activity);
        assert_ne!(found.token, found.csrf_token);
    }

    #[tokio::test]
    async fn test_validate_unknown_token() {
        assert!(store().validate("nope").await.is_none());
    }

    #[tokio::test]
    async fn test_timeout_boundary_is_inclusive() {
        let store = store();
        let t0 = Utc::now();
        let session = store.create_at("admin", "ip", "ua", t0).await;

        assert!(store
            .validate_at(&session.token, t0 + Duration::hours(4))
            .await
            .is_some());

        assert!(store
            .validate_at(&session.token, t0 + Duration::hours(4) + Duration::milliseconds(1))
            .await
            .is_none());
        // 过期会话已被删除
        assert!(store.is_empty().await);
        assert!(store.validate_at(&session.token, t0).await.is_none());
    }

    #[tokio::test]
    async fn test_touch_extends_window() {
        let store = store();
        let t0 = Utc::now();
        let session = store.create_at("admin", "ip", "ua", t0).await;

        assert!(store.touch_at(&session.token, t0 + Duration::hours(3)).await);
        assert!(store
            .validate_at(&session.token, t0 + Duration::hours(6))
            .await
            .is_some());
        assert!(!store.touch("unknown").await);
    }

    #[tokio::test]
    async fn test_remove_session() {
        let store = store();
        let session = store.create("admin", "ip", "ua").await;
        assert!(store.remove(&session.token).await.is_some());
        assert!(store.validate(&session.token).await.is_none());
    }

    #[tokio::test]
    async fn test_lockout_after_max_failures() {
        let lockouts = LockoutStore::new(5, Duration::minutes(15));
        let t0 = Utc::now();

        for i in 0..4 {
            lockouts.record_failure_at("1.2.3.4", t0 + Duration::seconds(i)).await;
            assert!(!lockouts.is_locked_out_at("1.2.3.4", t0 + Duration::seconds(i)).await);
        }
        lockouts.record_failure_at("1.2.3.4", t0 + Duration::seconds(5)).await;

        assert!(lockouts.is_locked_out_at("1.2.3.4", t0 + Duration::seconds(6)).await);
        assert!(!lockouts.is_locked_out_at("5.6.7.8", t0).await);
    }

    #[tokio::test]
    async fn test_lockout_expires_and_resets() {
        let lockouts = LockoutStore::new(5, Duration::minutes(15));
        let t0 = Utc::now();
        for _ in 0..5 {
            lockouts.record_failure_at("1.2.3.4", t0).await;
        }

        let almost = t0 + Duration::minutes(15) - Duration::seconds(1);
        assert!(lockouts.is_locked_out_at("1.2.3.4", almost).await);

        let after = t0 + Duration::minutes(15);
        assert!(!lockouts.is_locked_out_at("1.2.3.4", after).await);
        assert_eq!(lockouts.failures("1.2.3.4").await, None);
    }

    #[tokio::test]
    async fn test_clear_failures() {
        let lockouts = LockoutStore::new(5, Duration::minutes(15));
        lockouts.record_failure("1.2.3.4").await;
        assert_eq!(lockouts.failures("1.2.3.4").await, Some(1));

        lockouts.clear_failures("1.2.3.4").await;
        assert_eq!(lockouts.failures("1.2.3.4").await, None);
    }
}
