use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// 服务端登录记录。令牌只携带 `session_id`，删除该记录即吊销所有指向它的令牌
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Session {
    pub session_id: String,
    pub user_id: String,
    pub tenant_id: String,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub device_info: Option<String>,
    pub created_at: DateTime<Utc>,
    pub last_active_at: DateTime<Utc>,
}

impl Session {
    pub fn new(user_id: &str, tenant_id: &str, device_info: Option<String>) -> Self {
        let now = Utc::now();
        Self {
            session_id: uuid::Uuid::new_v4().to_string(),
            user_id: user_id.to_string(),
            tenant_id: tenant_id.to_string(),
            device_info,
            created_at: now,
            last_active_at: now,
        }
    }
}
