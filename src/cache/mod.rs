// 会话缓存：认证中可吊销的部分。
// 只有会话 key 仍存在时令牌才有效。

use std::time::Duration;

use async_trait::async_trait;

use crate::error::StoreError;

pub mod keys;
pub mod models;
pub mod operations;

pub use models::session::Session;
pub use operations::{MemorySessionStore, RedisSessionStore};

/// 带过期时间的会话存储
#[async_trait]
pub trait SessionStore: Send + Sync {
    /// 保存 `session`，有效期 `ttl`，已存在则覆盖
    async fn create(&self, session: &Session, ttl: Duration) -> Result<(), StoreError>;

    /// 未命中返回 `Ok(None)`，不视为错误
    async fn get(&self, session_id: &str) -> Result<Option<Session>, StoreError>;

    /// 重置剩余有效期，不改动内容；会话已不存在时返回 `false`
    async fn refresh(&self, session_id: &str, ttl: Duration) -> Result<bool, StoreError>;

    /// 幂等删除
    async fn destroy(&self, session_id: &str) -> Result<(), StoreError>;
}
