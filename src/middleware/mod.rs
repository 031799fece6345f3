mod auth;
mod error_handler;
mod rate_limit;
mod tenant;

pub use auth::{
    AllowedRoles, RequiredPermission, auth_middleware, optional_auth_middleware,
    permission_middleware, role_middleware,
};
pub use error_handler::trace_requests;
pub use rate_limit::{
    RateLimitConfig, RateLimitDecision, RateLimitEntry, RateLimiter, SweeperHandle, rate_limit,
};
pub use tenant::{
    RequiredFeature, UsageLimit, feature_middleware, tenant_middleware, usage_limit_middleware,
};
