//! 会话注册表
//!
//! 以会话 ID 管理多路并发会话。外层 RwLock 只用于取句柄；
//! 每个会话有自己的 Mutex，保证同一会话的回合严格串行，
//! 不同会话之间互不阻塞（没有横跨整个回合的全局锁）。

use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};

use tokio::sync::{Mutex, RwLock};

use crate::feedback::FeedbackReport;
use crate::scenario::{Persona, Scenario};
use crate::session::error::TrainingError;
use crate::session::state::{SessionId, SessionState};

/// 单个受训会话：状态 + 激活后不可变的情景/人设 + 生命周期附属
pub struct TrainingSession {
    pub state: SessionState,
    /// 激活时设置，之后只读
    pub scenario: Option<Scenario>,
    pub persona: Option<Persona>,
    /// 完成时恰好写入一次
    pub feedback: Option<FeedbackReport>,
    /// 暂停中：保留全部状态但拒绝回合
    pub paused: bool,
    pub last_active: Instant,
}

impl TrainingSession {
    pub fn new(state: SessionState) -> Self {
        Self {
            state,
            scenario: None,
            persona: None,
            feedback: None,
            paused: false,
            last_active: Instant::now(),
        }
    }

    pub fn touch(&mut self) {
        self.last_active = Instant::now();
    }

    pub fn is_expired(&self, timeout: Duration) -> bool {
        self.last_active.elapsed() > timeout
    }
}

/// 注册表：session_id → 会话句柄
pub struct SessionRegistry {
    sessions: RwLock<HashMap<SessionId, Arc<Mutex<TrainingSession>>>>,
    expiry: Duration,
}

impl SessionRegistry {
    pub fn new(expiry_secs: u64) -> Self {
        Self {
            sessions: RwLock::new(HashMap::new()),
            expiry: Duration::from_secs(expiry_secs),
        }
    }

    /// 注册新会话，返回其 ID
    pub async fn insert(&self, state: SessionState) -> SessionId {
        let id = state.id.clone();
        let session = Arc::new(Mutex::new(TrainingSession::new(state)));
        self.sessions.write().await.insert(id.clone(), session);
        id
    }

    /// 取会话句柄；外层锁立即释放，调用方再锁单个会话
    pub async fn get(&self, id: &str) -> Result<Arc<Mutex<TrainingSession>>, TrainingError> {
        self.sessions
            .read()
            .await
            .get(id)
            .cloned()
            .ok_or_else(|| TrainingError::SessionNotFound(id.to_string()))
    }

    /// 移除会话（完成后的清理由调用方决定时机）
    pub async fn remove(&self, id: &str) -> bool {
        self.sessions.write().await.remove(id).is_some()
    }

    /// 清理过期会话，返回清理数
    pub async fn cleanup_expired(&self) -> usize {
        let ids: Vec<SessionId> = {
            let sessions = self.sessions.read().await;
            let mut expired = Vec::new();
            for (id, handle) in sessions.iter() {
                if let Ok(session) = handle.try_lock() {
                    if session.is_expired(self.expiry) {
                        expired.push(id.clone());
                    }
                }
            }
            expired
        };

        let mut sessions = self.sessions.write().await;
        let mut removed = 0;
        for id in ids {
            if sessions.remove(&id).is_some() {
                removed += 1;
            }
        }
        removed
    }

    pub async fn active_count(&self) -> usize {
        self.sessions.read().await.len()
    }

    pub async fn session_ids(&self) -> Vec<SessionId> {
        self.sessions.read().await.keys().cloned().collect()
    }
}

impl Default for SessionRegistry {
    fn default() -> Self {
        Self::new(3600)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_insert_get_remove() {
        let registry = SessionRegistry::new(3600);
        let id = registry.insert(SessionState::new("user1".to_string())).await;
        assert_eq!(registry.active_count().await, 1);

        let handle = registry.get(&id).await.unwrap();
        assert_eq!(handle.lock().await.state.user_id, "user1");

        assert!(registry.remove(&id).await);
        assert!(matches!(
            registry.get(&id).await,
            Err(TrainingError::SessionNotFound(_))
        ));
    }

    #[tokio::test]
    async fn test_cleanup_expired() {
        let registry = SessionRegistry::new(0); // 立即过期
        let id = registry.insert(SessionState::new("user1".to_string())).await;
        {
            let handle = registry.get(&id).await.unwrap();
            let mut session = handle.lock().await;
            session.last_active = Instant::now() - Duration::from_secs(10);
        }
        let removed = registry.cleanup_expired().await;
        assert_eq!(removed, 1);
        assert_eq!(registry.active_count().await, 0);
    }

    #[tokio::test]
    async fn test_sessions_are_independent() {
        let registry = SessionRegistry::new(3600);
        let a = registry.insert(SessionState::new("user_a".to_string())).await;
        let b = registry.insert(SessionState::new("user_b".to_string())).await;

        // 锁住 a 不影响 b 的访问
        let handle_a = registry.get(&a).await.unwrap();
        let _guard_a = handle_a.lock().await;
        let handle_b = registry.get(&b).await.unwrap();
        let guard_b = handle_b.lock().await;
        assert_eq!(guard_b.state.user_id, "user_b");
    }
}
