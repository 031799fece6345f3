use std::collections::BTreeSet;

use axum::extract::FromRequestParts;
use axum::http::request::Parts;
use serde::Serialize;

use crate::database::UserRecord;
use crate::error::AppError;

/// 当前请求的调用者，每次请求都从用户目录重新构建，不做持久化
#[derive(Debug, Clone, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct AuthenticatedIdentity {
    pub user_id: String,
    pub email: String,
    pub tenant_id: String,
    pub role: String,
    pub permissions: BTreeSet<String>,
}

impl AuthenticatedIdentity {
    pub fn has_permission(&self, permission: &str) -> bool {
        self.permissions.contains(permission)
    }

    pub fn has_any_role<S: AsRef<str>>(&self, roles: &[S]) -> bool {
        roles.iter().any(|r| r.as_ref() == self.role)
    }
}

impl From<UserRecord> for AuthenticatedIdentity {
    fn from(user: UserRecord) -> Self {
        Self {
            user_id: user.id,
            email: user.email,
            tenant_id: user.tenant_id,
            role: user.role,
            permissions: user.permissions.into_iter().collect(),
        }
    }
}

/// 当前请求认证所用的会话
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ActiveSession {
    pub session_id: String,
}

impl<S: Send + Sync> FromRequestParts<S> for AuthenticatedIdentity {
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        parts
            .extensions
            .get::<AuthenticatedIdentity>()
            .cloned()
            .ok_or(AppError::MissingCredentials)
    }
}

impl<S: Send + Sync> FromRequestParts<S> for ActiveSession {
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        parts
            .extensions
            .get::<ActiveSession>()
            .cloned()
            .ok_or(AppError::MissingCredentials)
    }
}

/// 可选认证成功时附带的身份
#[derive(Debug, Clone)]
pub struct MaybeIdentity(pub Option<AuthenticatedIdentity>);

impl<S: Send + Sync> FromRequestParts<S> for MaybeIdentity {
    type Rejection = std::convert::Infallible;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        Ok(MaybeIdentity(parts.extensions.get::<AuthenticatedIdentity>().cloned()))
    }
}

/// 缺少 `permission` 返回 403，未认证返回 401
pub fn require_permission(
    identity: Option<&AuthenticatedIdentity>,
    permission: &str,
) -> Result<(), AppError> {
    let identity = identity.ok_or(AppError::MissingCredentials)?;
    if identity.has_permission(permission) {
        Ok(())
    } else {
        Err(AppError::PermissionDenied(permission.to_string()))
    }
}

/// 角色不在 `roles` 中返回 403，未认证返回 401
pub fn require_role<S: AsRef<str>>(
    identity: Option<&AuthenticatedIdentity>,
    roles: &[S],
) -> Result<(), AppError> {
    let identity = identity.ok_or(AppError::MissingCredentials)?;
    if identity.has_any_role(roles) {
        Ok(())
    } else {
        Err(AppError::RoleNotAllowed(identity.role.clone()))
    }
}
