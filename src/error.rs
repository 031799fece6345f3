use axum::Json;
use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde_json::json;
use thiserror::Error;

use crate::result::ApiResponse;

/// 外部存储的基础设施故障
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("store unavailable: {0}")]
    Unavailable(String),

    #[error("store call timed out")]
    Timeout,

    #[error("corrupt record: {0}")]
    Corrupt(String),
}

impl From<redis::RedisError> for StoreError {
    fn from(err: redis::RedisError) -> Self {
        StoreError::Unavailable(err.to_string())
    }
}

impl From<sqlx::Error> for StoreError {
    fn from(err: sqlx::Error) -> Self {
        StoreError::Unavailable(err.to_string())
    }
}

impl From<serde_json::Error> for StoreError {
    fn from(err: serde_json::Error) -> Self {
        StoreError::Corrupt(err.to_string())
    }
}

/// 认证、租户、限流环节拒绝请求的所有原因
#[derive(Debug, Error)]
pub enum AppError {
    #[error("missing bearer token")]
    MissingCredentials,

    #[error("token expired")]
    TokenExpired,

    #[error("token invalid")]
    TokenInvalid,

    #[error("session invalid or revoked")]
    SessionInvalid,

    #[error("user missing or inactive")]
    UserInactive,

    #[error("invalid login credentials")]
    InvalidCredentials,

    #[error("tenant not found")]
    TenantNotFound,

    #[error("tenant inactive")]
    TenantInactive,

    #[error("subscription inactive")]
    SubscriptionInactive,

    #[error("subscription expired")]
    SubscriptionExpired,

    #[error("feature not available: {0}")]
    FeatureNotAvailable(String),

    #[error("usage limit exceeded for {resource}: {current}/{limit}")]
    UsageLimitExceeded {
        resource: String,
        current: i64,
        limit: i64,
    },

    #[error("missing permission: {0}")]
    PermissionDenied(String),

    #[error("role not allowed: {0}")]
    RoleNotAllowed(String),

    #[error("validation failed: {0}")]
    Validation(String),

    #[error("rate limited, retry after {retry_after}s")]
    RateLimited { retry_after: u64 },

    #[error(transparent)]
    StoreUnavailable(#[from] StoreError),

    #[error("internal error: {0}")]
    Internal(String),
}

impl AppError {
    pub fn status(&self) -> StatusCode {
        match self {
            AppError::MissingCredentials
            | AppError::TokenExpired
            | AppError::TokenInvalid
            | AppError::SessionInvalid
            | AppError::UserInactive
            | AppError::InvalidCredentials => StatusCode::UNAUTHORIZED,
            AppError::TenantNotFound => StatusCode::NOT_FOUND,
            AppError::TenantInactive
            | AppError::SubscriptionInactive
            | AppError::SubscriptionExpired
            | AppError::FeatureNotAvailable(_)
            | AppError::PermissionDenied(_)
            | AppError::RoleNotAllowed(_) => StatusCode::FORBIDDEN,
            AppError::Validation(_) => StatusCode::BAD_REQUEST,
            AppError::UsageLimitExceeded { .. } | AppError::RateLimited { .. } => {
                StatusCode::TOO_MANY_REQUESTS
            }
            AppError::StoreUnavailable(_) => StatusCode::SERVICE_UNAVAILABLE,
            AppError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// 稳定的机器可读错误码。普通 401 不带错误码，与 `TOKEN_EXPIRED` 区分
    pub fn code(&self) -> Option<&'static str> {
        match self {
            AppError::TokenExpired => Some("TOKEN_EXPIRED"),
            AppError::TenantNotFound => Some("TENANT_NOT_FOUND"),
            AppError::TenantInactive => Some("TENANT_INACTIVE"),
            AppError::SubscriptionInactive => Some("SUBSCRIPTION_INACTIVE"),
            AppError::SubscriptionExpired => Some("SUBSCRIPTION_EXPIRED"),
            AppError::FeatureNotAvailable(_) => Some("FEATURE_NOT_AVAILABLE"),
            AppError::UsageLimitExceeded { .. } => Some("USAGE_LIMIT_EXCEEDED"),
            AppError::PermissionDenied(_) | AppError::RoleNotAllowed(_) => Some("FORBIDDEN"),
            AppError::StoreUnavailable(_) => Some("SERVICE_UNAVAILABLE"),
            AppError::Validation(_) => Some("VALIDATION_ERROR"),
            AppError::MissingCredentials
            | AppError::TokenInvalid
            | AppError::SessionInvalid
            | AppError::UserInactive
            | AppError::InvalidCredentials
            | AppError::RateLimited { .. }
            | AppError::Internal(_) => None,
        }
    }

    fn message(&self) -> &'static str {
        match self {
            AppError::MissingCredentials => "غير مصرح، يرجى تسجيل الدخول",
            AppError::TokenExpired => "انتهت صلاحية الجلسة، يرجى تسجيل الدخول مجدداً",
            AppError::TokenInvalid => "رمز الدخول غير صالح",
            AppError::SessionInvalid => "الجلسة غير صالحة أو تم إنهاؤها",
            AppError::UserInactive => "المستخدم غير موجود أو غير نشط",
            AppError::InvalidCredentials => "البريد الإلكتروني أو كلمة المرور غير صحيحة",
            AppError::TenantNotFound => "المنشأة غير موجودة",
            AppError::TenantInactive => "حساب المنشأة غير نشط",
            AppError::SubscriptionInactive => "الاشتراك غير نشط",
            AppError::SubscriptionExpired => "انتهت صلاحية الاشتراك، يرجى التجديد",
            AppError::FeatureNotAvailable(_) => "هذه الميزة غير متاحة في باقتك الحالية",
            AppError::UsageLimitExceeded { .. } => "تم الوصول إلى الحد الأقصى المسموح به في باقتك",
            AppError::PermissionDenied(_) => "ليس لديك صلاحية للقيام بهذا الإجراء",
            AppError::RoleNotAllowed(_) => "دورك الحالي لا يسمح بهذا الإجراء",
            AppError::Validation(_) => "البيانات المرسلة غير صالحة",
            AppError::RateLimited { .. } => "عدد كبير من الطلبات، يرجى المحاولة لاحقاً",
            AppError::StoreUnavailable(_) => "الخدمة غير متاحة حالياً، يرجى المحاولة لاحقاً",
            AppError::Internal(_) => "حدث خطأ داخلي في الخادم",
        }
    }

    pub fn to_body(&self) -> ApiResponse<()> {
        let body = ApiResponse::error(self.message(), self.code());
        let body = match self {
            AppError::FeatureNotAvailable(feature) => {
                body.with_extra("requiredFeature", feature.as_str())
            }
            AppError::UsageLimitExceeded {
                resource,
                current,
                limit,
            } => body
                .with_extra("resource", resource.as_str())
                .with_extra("current", *current)
                .with_extra("limit", *limit),
            AppError::RateLimited { retry_after } => body
                .with_extra("error", "TOO_MANY_REQUESTS")
                .with_extra("retryAfter", *retry_after),
            AppError::Validation(detail) => body.with_errors(json!([detail])),
            _ => body,
        };

        // 基础设施错误详情只在 debug 构建中返回
        match self {
            AppError::StoreUnavailable(_) | AppError::Internal(_) if cfg!(debug_assertions) => {
                body.with_errors(json!([self.to_string()]))
            }
            _ => body,
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        (self.status(), Json(self.to_body())).into_response()
    }
}
