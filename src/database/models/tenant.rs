use std::collections::HashMap;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct TenantRecord {
    pub id: String,
    pub name: String,
    pub is_active: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SubscriptionStatus {
    Active,
    Trial,
    Suspended,
    Cancelled,
}

impl FromStr for SubscriptionStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "active" => Ok(Self::Active),
            "trial" => Ok(Self::Trial),
            "suspended" => Ok(Self::Suspended),
            "cancelled" | "canceled" => Ok(Self::Cancelled),
            other => Err(format!("unknown subscription status: {other}")),
        }
    }
}

/// 租户当前订阅及其套餐权益
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SubscriptionRecord {
    pub tenant_id: String,
    pub plan: String,
    pub status: SubscriptionStatus,
    pub end_date: Option<DateTime<Utc>>,
    pub features: Vec<String>,
    pub limits: HashMap<String, i64>,
}
