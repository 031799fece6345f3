use axum::{
    body::Body,
    extract::State,
    http::Request,
    middleware::Next,
    response::{IntoResponse, Response},
};

use crate::AppState;
use crate::auth::AuthenticatedIdentity;
use crate::error::AppError;
use crate::tenant::{RequestContext, TenantScope};

/// 解析调用者所属租户并挂载租户数据句柄，须在 `auth_middleware` 之后执行
pub async fn tenant_middleware(
    State(state): State<AppState>,
    mut req: Request<Body>,
    next: Next,
) -> Result<Response, AppError> {
    let identity = req
        .extensions()
        .get::<AuthenticatedIdentity>()
        .cloned()
        .ok_or(AppError::MissingCredentials)?;

    let tenant = state.tenants.resolve(&identity.tenant_id).await?;
    let data = TenantScope::new(
        state.data.clone(),
        tenant.tenant_id.clone(),
        state.config.store_timeout(),
    );

    req.extensions_mut().insert(RequestContext {
        identity,
        tenant,
        data,
    });
    Ok(next.run(req).await)
}

#[derive(Debug, Clone, Copy)]
pub struct RequiredFeature(pub &'static str);

pub async fn feature_middleware(
    State(RequiredFeature(feature)): State<RequiredFeature>,
    req: Request<Body>,
    next: Next,
) -> Response {
    let Some(ctx) = req.extensions().get::<RequestContext>() else {
        return AppError::Internal("feature check before tenant resolution".into()).into_response();
    };
    match ctx.tenant.require_feature(feature) {
        Ok(()) => next.run(req).await,
        Err(e) => e.into_response(),
    }
}

#[derive(Clone)]
pub struct UsageLimit {
    pub state: AppState,
    pub resource: &'static str,
}

pub async fn usage_limit_middleware(
    State(limit): State<UsageLimit>,
    req: Request<Body>,
    next: Next,
) -> Response {
    let Some(tenant_id) = req
        .extensions()
        .get::<RequestContext>()
        .map(|ctx| ctx.tenant.tenant_id.clone())
    else {
        return AppError::Internal("usage check before tenant resolution".into()).into_response();
    };

    match limit
        .state
        .tenants
        .check_usage_limit(&tenant_id, limit.resource)
        .await
    {
        Ok(()) => next.run(req).await,
        Err(e) => e.into_response(),
    }
}
