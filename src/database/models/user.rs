use serde::{Deserialize, Serialize};
use sqlx::FromRow;

/// 用户记录，附带角色及该角色的权限名
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct UserRecord {
    pub id: String,
    pub email: String,
    pub tenant_id: String,
    pub is_active: bool,
    pub role: String,
    pub permissions: Vec<String>,
    #[serde(skip_serializing)]
    pub password_hash: Option<String>,
}
