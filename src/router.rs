use axum::{
    Router,
    middleware::from_fn_with_state,
    routing::{delete, get, post},
};

use crate::{
    AppState,
    middleware::{
        AllowedRoles, RequiredFeature, RequiredPermission, UsageLimit, auth_middleware,
        feature_middleware, optional_auth_middleware, permission_middleware, rate_limit,
        role_middleware, tenant_middleware, trace_requests, usage_limit_middleware,
    },
    routes,
};

// layer 自下而上包裹：最后一次 `.layer` 调用在最外层

/// 登录接口只经过严格的认证限流
fn public_routes(state: &AppState) -> Router<AppState> {
    Router::new()
        .route("/auth/login", post(routes::auth::login))
        .layer(from_fn_with_state(state.auth_limiter.clone(), rate_limit))
}

fn optional_routes(state: &AppState) -> Router<AppState> {
    Router::new()
        .route("/auth/status", get(routes::auth::status))
        .layer(from_fn_with_state(state.clone(), optional_auth_middleware))
}

fn session_routes(state: &AppState) -> Router<AppState> {
    Router::new()
        .route("/auth/logout", post(routes::auth::logout))
        .route("/auth/me", get(routes::auth::me))
        .layer(from_fn_with_state(state.clone(), auth_middleware))
}

/// 租户业务路由：认证 -> 租户解析 -> 各路由自己的校验
fn tenant_routes(state: &AppState) -> Router<AppState> {
    let create = post(routes::records::create_record)
        .layer(from_fn_with_state(
            UsageLimit {
                state: state.clone(),
                resource: "records",
            },
            usage_limit_middleware,
        ))
        .layer(from_fn_with_state(
            RequiredPermission("records:write"),
            permission_middleware,
        ));

    Router::new()
        .route(
            "/records/{collection}",
            get(routes::records::list_records).merge(create),
        )
        .route(
            "/records/{collection}/summary",
            get(routes::records::summarize_records).layer(from_fn_with_state(
                RequiredFeature("reports"),
                feature_middleware,
            )),
        )
        .route(
            "/records/{collection}/{id}",
            delete(routes::records::delete_record).layer(from_fn_with_state(
                AllowedRoles(&["owner", "admin"]),
                role_middleware,
            )),
        )
        .layer(from_fn_with_state(state.clone(), tenant_middleware))
        .layer(from_fn_with_state(state.clone(), auth_middleware))
}

pub fn create_router(state: AppState) -> Router {
    let api = Router::new()
        .merge(public_routes(&state))
        .merge(optional_routes(&state))
        .merge(session_routes(&state))
        .merge(tenant_routes(&state))
        .layer(from_fn_with_state(state.api_limiter.clone(), rate_limit));

    Router::new()
        .route("/health", get(routes::health))
        .nest(&state.config.api_base_uri, api)
        .layer(axum::middleware::from_fn(trace_requests))
        .with_state(state)
}
