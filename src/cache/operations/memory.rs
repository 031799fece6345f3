use std::collections::HashMap;
use std::time::Duration;

use async_trait::async_trait;
use parking_lot::RwLock;
use tokio::time::Instant;

use crate::cache::SessionStore;
use crate::cache::models::session::Session;
use crate::error::StoreError;

/// 进程内会话存储，用于测试和单节点开发。
/// 过期按 tokio 时钟判断：访问时惰性删除，每次 `create` 顺带清理全部过期条目。
#[derive(Default)]
pub struct MemorySessionStore {
    entries: RwLock<HashMap<String, (Session, Instant)>>,
}

impl MemorySessionStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// 会话剩余有效期，已失效时返回 `None`
    pub fn remaining_ttl(&self, session_id: &str) -> Option<Duration> {
        let now = Instant::now();
        self.entries
            .read()
            .get(session_id)
            .filter(|(_, expires_at)| *expires_at > now)
            .map(|(_, expires_at)| *expires_at - now)
    }

    pub fn len(&self) -> usize {
        let now = Instant::now();
        self.entries
            .read()
            .values()
            .filter(|(_, expires_at)| *expires_at > now)
            .count()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// 删除所有已过期的会话，返回删除数量
    pub fn purge_expired(&self) -> usize {
        let now = Instant::now();
        let mut entries = self.entries.write();
        let before = entries.len();
        entries.retain(|_, (_, expires_at)| *expires_at > now);
        before - entries.len()
    }
}

#[async_trait]
impl SessionStore for MemorySessionStore {
    async fn create(&self, session: &Session, ttl: Duration) -> Result<(), StoreError> {
        let now = Instant::now();
        let mut entries = self.entries.write();
        entries.retain(|_, (_, expires_at)| *expires_at > now);
        entries.insert(session.session_id.clone(), (session.clone(), now + ttl));
        Ok(())
    }

    async fn get(&self, session_id: &str) -> Result<Option<Session>, StoreError> {
        let now = Instant::now();
        let mut entries = self.entries.write();
        match entries.get(session_id) {
            Some((session, expires_at)) if *expires_at > now => Ok(Some(session.clone())),
            Some(_) => {
                entries.remove(session_id);
                Ok(None)
            }
            None => Ok(None),
        }
    }

    async fn refresh(&self, session_id: &str, ttl: Duration) -> Result<bool, StoreError> {
        let now = Instant::now();
        let mut entries = self.entries.write();
        match entries.get_mut(session_id) {
            Some((_, expires_at)) if *expires_at > now => {
                *expires_at = now + ttl;
                Ok(true)
            }
            Some(_) => {
                entries.remove(session_id);
                Ok(false)
            }
            None => Ok(false),
        }
    }

    async fn destroy(&self, session_id: &str) -> Result<(), StoreError> {
        self.entries.write().remove(session_id);
        Ok(())
    }
}
