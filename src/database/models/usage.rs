use serde::{Deserialize, Serialize};
use sqlx::FromRow;

/// 按租户、按资源的用量计数
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, FromRow)]
pub struct UsageCounter {
    pub current: i64,
    pub limit: i64,
}

impl UsageCounter {
    pub fn is_exhausted(&self) -> bool {
        self.current >= self.limit
    }
}
