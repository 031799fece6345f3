use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use redis::{AsyncCommands, Client as RedisClient};

use crate::cache::SessionStore;
use crate::cache::keys::session_key;
use crate::cache::models::session::Session;
use crate::error::StoreError;

/// 基于 Redis 的会话存储。内容以 JSON 存在 `session:{id}` 下，
/// 过期交给 Redis，续期只需一次 `EXPIRE`
#[derive(Clone)]
pub struct RedisSessionStore {
    redis: Arc<RedisClient>,
}

impl RedisSessionStore {
    pub fn new(redis: Arc<RedisClient>) -> Self {
        Self { redis }
    }
}

#[async_trait]
impl SessionStore for RedisSessionStore {
    async fn create(&self, session: &Session, ttl: Duration) -> Result<(), StoreError> {
        let mut conn = self.redis.get_multiplexed_async_connection().await?;

        let json = serde_json::to_string(session)?;
        let _: () = conn
            .set_ex(session_key(&session.session_id), json, ttl.as_secs())
            .await?;

        tracing::debug!("Stored session {} for user {}", session.session_id, session.user_id);
        Ok(())
    }

    async fn get(&self, session_id: &str) -> Result<Option<Session>, StoreError> {
        let mut conn = self.redis.get_multiplexed_async_connection().await?;

        let result: Option<String> = conn.get(session_key(session_id)).await?;
        match result {
            Some(json) => Ok(Some(serde_json::from_str(&json)?)),
            None => Ok(None),
        }
    }

    async fn refresh(&self, session_id: &str, ttl: Duration) -> Result<bool, StoreError> {
        let mut conn = self.redis.get_multiplexed_async_connection().await?;

        // key 已不存在时 EXPIRE 返回 0
        let refreshed: bool = conn
            .expire(session_key(session_id), ttl.as_secs() as i64)
            .await?;
        Ok(refreshed)
    }

    async fn destroy(&self, session_id: &str) -> Result<(), StoreError> {
        let mut conn = self.redis.get_multiplexed_async_connection().await?;

        let _: () = conn.del(session_key(session_id)).await?;
        Ok(())
    }
}
