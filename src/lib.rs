use std::sync::Arc;

use auth::{Authenticator, TokenVerifier};
use cache::SessionStore;
use config::Config;
use database::{DataStore, TenantDirectory, UsageCounters, UserDirectory};
use middleware::RateLimiter;
use tenant::TenantResolver;

pub mod auth;
pub mod cache;
pub mod config;
pub mod database;
pub mod error;
pub mod middleware;
pub mod result;
pub mod router;
pub mod routes;
pub mod tenant;
pub mod utils;

pub use router::create_router;

#[derive(Clone)]
pub struct AppState {
    pub config: Config,
    pub authenticator: Authenticator,
    pub tenants: TenantResolver,
    pub sessions: Arc<dyn SessionStore>,
    pub users: Arc<dyn UserDirectory>,
    pub tenant_directory: Arc<dyn TenantDirectory>,
    pub auth_limiter: Arc<RateLimiter>,
    pub api_limiter: Arc<RateLimiter>,
    // 未按租户隔离的数据访问，只能经 `tenant_middleware` 包装成 `TenantScope` 后交给处理器
    pub(crate) data: Arc<dyn DataStore>,
}

impl AppState {
    pub fn new(
        config: Config,
        sessions: Arc<dyn SessionStore>,
        users: Arc<dyn UserDirectory>,
        tenant_directory: Arc<dyn TenantDirectory>,
        usage: Arc<dyn UsageCounters>,
        data: Arc<dyn DataStore>,
    ) -> Self {
        let authenticator = Authenticator::new(
            TokenVerifier::from_config(&config),
            sessions.clone(),
            users.clone(),
            tenant_directory.clone(),
            config.session_ttl(),
            config.store_timeout(),
        );
        let tenants = TenantResolver::new(tenant_directory.clone(), usage, config.store_timeout());
        let auth_limiter = Arc::new(
            RateLimiter::for_auth(
                config.auth_rate_limit_window(),
                config.auth_rate_limit_requests,
            )
            .trust_proxy(config.trust_proxy),
        );
        let api_limiter = Arc::new(
            RateLimiter::for_api(
                config.api_rate_limit_window(),
                config.api_rate_limit_requests,
            )
            .trust_proxy(config.trust_proxy),
        );

        Self {
            config,
            authenticator,
            tenants,
            sessions,
            users,
            tenant_directory,
            auth_limiter,
            api_limiter,
            data,
        }
    }
}
