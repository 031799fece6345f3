use axum::{
    body::Body,
    extract::State,
    http::Request,
    middleware::Next,
    response::{IntoResponse, Response},
};

use crate::AppState;
use crate::auth::{AuthenticatedIdentity, require_permission, require_role};
use crate::error::AppError;

/// 严格认证：请求必须带有有效会话
pub async fn auth_middleware(
    State(state): State<AppState>,
    mut req: Request<Body>,
    next: Next,
) -> Result<Response, AppError> {
    let authenticated = state.authenticator.authenticate(req.headers()).await?;

    req.extensions_mut().insert(authenticated.identity);
    req.extensions_mut().insert(authenticated.session);
    Ok(next.run(req).await)
}

/// 流程相同，但任何失败都只让请求以匿名身份继续
pub async fn optional_auth_middleware(
    State(state): State<AppState>,
    mut req: Request<Body>,
    next: Next,
) -> Response {
    match state.authenticator.authenticate(req.headers()).await {
        Ok(authenticated) => {
            req.extensions_mut().insert(authenticated.identity);
            req.extensions_mut().insert(authenticated.session);
        }
        Err(e) => tracing::debug!("Optional auth proceeding anonymously: {}", e),
    }
    next.run(req).await
}

#[derive(Debug, Clone, Copy)]
pub struct RequiredPermission(pub &'static str);

#[derive(Debug, Clone, Copy)]
pub struct AllowedRoles(pub &'static [&'static str]);

pub async fn permission_middleware(
    State(RequiredPermission(permission)): State<RequiredPermission>,
    req: Request<Body>,
    next: Next,
) -> Response {
    match require_permission(req.extensions().get::<AuthenticatedIdentity>(), permission) {
        Ok(()) => next.run(req).await,
        Err(e) => e.into_response(),
    }
}

pub async fn role_middleware(
    State(AllowedRoles(roles)): State<AllowedRoles>,
    req: Request<Body>,
    next: Next,
) -> Response {
    match require_role(req.extensions().get::<AuthenticatedIdentity>(), roles) {
        Ok(()) => next.run(req).await,
        Err(e) => e.into_response(),
    }
}
