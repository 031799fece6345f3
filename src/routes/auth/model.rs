use serde::{Deserialize, Serialize};

use crate::auth::AuthenticatedIdentity;

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LoginRequest {
    pub email: String,
    pub password: String,
    #[serde(default)]
    pub device_info: Option<String>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LoginResponse {
    pub token: String,
    pub expires_at: i64,
    pub session_id: String,
    pub user: AuthenticatedIdentity,
}

#[derive(Debug, Serialize)]
pub struct LogoutResponse {}

#[derive(Debug, Serialize)]
pub struct StatusResponse {
    pub authenticated: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub user: Option<AuthenticatedIdentity>,
}
