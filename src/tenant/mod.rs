// 租户解析、权益校验以及绑定租户的数据句柄

use std::collections::{BTreeSet, HashMap};
use std::sync::Arc;
use std::time::Duration;

use axum::extract::FromRequestParts;
use axum::http::request::Parts;
use chrono::Utc;
use serde::Serialize;

use crate::auth::AuthenticatedIdentity;
use crate::database::{SubscriptionStatus, TenantDirectory, UsageCounters};
use crate::error::AppError;
use crate::utils::with_timeout;

pub mod scope;

pub use scope::TenantScope;

/// 当前请求已解析的租户状态
#[derive(Debug, Clone, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct TenantContext {
    pub tenant_id: String,
    pub name: String,
    pub is_active: bool,
    pub plan: String,
    pub features: BTreeSet<String>,
    /// 套餐中每种资源的上限，实时用量由 `UsageCounters` 提供
    pub limits: HashMap<String, i64>,
}

impl TenantContext {
    pub fn has_feature(&self, feature: &str) -> bool {
        self.features.contains(feature)
    }

    pub fn require_feature(&self, feature: &str) -> Result<(), AppError> {
        if self.has_feature(feature) {
            Ok(())
        } else {
            Err(AppError::FeatureNotAvailable(feature.to_string()))
        }
    }
}

#[derive(Clone)]
pub struct TenantResolver {
    tenants: Arc<dyn TenantDirectory>,
    usage: Arc<dyn UsageCounters>,
    store_timeout: Duration,
}

impl TenantResolver {
    pub fn new(
        tenants: Arc<dyn TenantDirectory>,
        usage: Arc<dyn UsageCounters>,
        store_timeout: Duration,
    ) -> Self {
        Self {
            tenants,
            usage,
            store_timeout,
        }
    }

    /// 加载租户及订阅。校验顺序固定：租户存在、租户启用、订阅有效、订阅未过期
    pub async fn resolve(&self, tenant_id: &str) -> Result<TenantContext, AppError> {
        let tenant = with_timeout(self.store_timeout, self.tenants.find_tenant(tenant_id))
            .await?
            .ok_or(AppError::TenantNotFound)?;
        if !tenant.is_active {
            return Err(AppError::TenantInactive);
        }

        let subscription =
            with_timeout(self.store_timeout, self.tenants.find_subscription(tenant_id))
                .await?
                .filter(|s| s.status == SubscriptionStatus::Active)
                .ok_or(AppError::SubscriptionInactive)?;

        if let Some(end_date) = subscription.end_date {
            if end_date < Utc::now() {
                tracing::warn!("Tenant {} subscription expired at {}", tenant_id, end_date);
                return Err(AppError::SubscriptionExpired);
            }
        }

        Ok(TenantContext {
            tenant_id: tenant.id,
            name: tenant.name,
            is_active: tenant.is_active,
            plan: subscription.plan,
            features: subscription.features.into_iter().collect(),
            limits: subscription.limits,
        })
    }

    /// `current >= limit` 时拒绝；查询出错或超时一律放行
    pub async fn check_usage_limit(&self, tenant_id: &str, resource: &str) -> Result<(), AppError> {
        match with_timeout(self.store_timeout, self.usage.usage(tenant_id, resource)).await {
            Ok(Some(counter)) if counter.is_exhausted() => Err(AppError::UsageLimitExceeded {
                resource: resource.to_string(),
                current: counter.current,
                limit: counter.limit,
            }),
            Ok(_) => Ok(()),
            Err(e) => {
                tracing::warn!(
                    "Usage lookup for {}/{} failed, allowing request: {}",
                    tenant_id,
                    resource,
                    e
                );
                Ok(())
            }
        }
    }
}

/// 认证和租户解析完成后业务处理器可用的全部上下文，请求期间不可变
#[derive(Clone)]
pub struct RequestContext {
    pub identity: AuthenticatedIdentity,
    pub tenant: TenantContext,
    pub data: TenantScope,
}

impl<S: Send + Sync> FromRequestParts<S> for RequestContext {
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        parts
            .extensions
            .get::<RequestContext>()
            .cloned()
            .ok_or_else(|| AppError::Internal("tenant context not resolved for route".into()))
    }
}

impl<S: Send + Sync> FromRequestParts<S> for TenantContext {
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        parts
            .extensions
            .get::<RequestContext>()
            .map(|ctx| ctx.tenant.clone())
            .ok_or_else(|| AppError::Internal("tenant context not resolved for route".into()))
    }
}
