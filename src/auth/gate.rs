use std::sync::Arc;
use std::time::Duration;

use axum::http::HeaderMap;
use axum::http::header::AUTHORIZATION;

use super::identity::{ActiveSession, AuthenticatedIdentity};
use super::token::TokenVerifier;
use crate::cache::SessionStore;
use crate::database::{TenantDirectory, UserDirectory};
use crate::error::AppError;
use crate::utils::with_timeout;

/// 认证通过后的结果
#[derive(Debug, Clone)]
pub struct Authenticated {
    pub identity: AuthenticatedIdentity,
    pub session: ActiveSession,
}

/// 把 bearer token 换成身份：验签、确认会话仍存在、加载用户和租户，最后续期会话
#[derive(Clone)]
pub struct Authenticator {
    verifier: TokenVerifier,
    sessions: Arc<dyn SessionStore>,
    users: Arc<dyn UserDirectory>,
    tenants: Arc<dyn TenantDirectory>,
    session_ttl: Duration,
    store_timeout: Duration,
}

pub fn bearer_token(headers: &HeaderMap) -> Option<&str> {
    headers
        .get(AUTHORIZATION)
        .and_then(|h| h.to_str().ok())
        .and_then(|h| h.strip_prefix("Bearer "))
        .map(str::trim)
        .filter(|t| !t.is_empty())
}

impl Authenticator {
    pub fn new(
        verifier: TokenVerifier,
        sessions: Arc<dyn SessionStore>,
        users: Arc<dyn UserDirectory>,
        tenants: Arc<dyn TenantDirectory>,
        session_ttl: Duration,
        store_timeout: Duration,
    ) -> Self {
        Self {
            verifier,
            sessions,
            users,
            tenants,
            session_ttl,
            store_timeout,
        }
    }

    pub fn verifier(&self) -> &TokenVerifier {
        &self.verifier
    }

    pub async fn authenticate(&self, headers: &HeaderMap) -> Result<Authenticated, AppError> {
        let token = bearer_token(headers).ok_or(AppError::MissingCredentials)?;
        let claims = self.verifier.verify(token)?;

        let timeout = self.store_timeout;
        let session = with_timeout(timeout, self.sessions.get(&claims.session_id))
            .await?
            .ok_or_else(|| {
                tracing::debug!("Session {} not found, token revoked", claims.session_id);
                AppError::SessionInvalid
            })?;

        if session.user_id != claims.user_id {
            tracing::warn!(
                "Session {} belongs to {}, token claims {}",
                session.session_id,
                session.user_id,
                claims.user_id
            );
            return Err(AppError::SessionInvalid);
        }

        let user = with_timeout(timeout, self.users.find_user(&claims.user_id))
            .await?
            .filter(|u| u.is_active)
            .ok_or(AppError::UserInactive)?;

        let tenant = with_timeout(timeout, self.tenants.find_tenant(&user.tenant_id))
            .await?
            .filter(|t| t.is_active);
        if tenant.is_none() {
            tracing::warn!("Rejected user {}: tenant {} inactive", user.id, user.tenant_id);
            return Err(AppError::TenantInactive);
        }

        let refreshed = with_timeout(
            timeout,
            self.sessions.refresh(&claims.session_id, self.session_ttl),
        )
        .await?;
        if !refreshed {
            return Err(AppError::SessionInvalid);
        }

        tracing::debug!("Authenticated user {} on tenant {}", user.id, user.tenant_id);
        Ok(Authenticated {
            identity: user.into(),
            session: ActiveSession {
                session_id: claims.session_id,
            },
        })
    }
}
