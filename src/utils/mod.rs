use std::future::Future;
use std::net::SocketAddr;
use std::time::Duration;

use axum::extract::ConnectInfo;
use axum::http::Request;
use bcrypt::verify;
use chrono::{DateTime, Utc};

use crate::error::StoreError;

pub fn verify_password(password: &str, hash: &str) -> Result<bool, bcrypt::BcryptError> {
    verify(password.as_bytes(), hash)
}

/// 给存储调用加上时限，超时返回 `StoreError::Timeout`
pub async fn with_timeout<T, F>(limit: Duration, fut: F) -> Result<T, StoreError>
where
    F: Future<Output = Result<T, StoreError>>,
{
    match tokio::time::timeout(limit, fut).await {
        Ok(result) => result,
        Err(_) => Err(StoreError::Timeout),
    }
}

/// 客户端地址。默认只信任 socket 对端；`trust_proxy` 打开时才依次读取
/// `X-Real-IP` 和 `X-Forwarded-For` 第一跳（仅限部署在可信反向代理之后）。
pub fn client_ip<B>(req: &Request<B>, trust_proxy: bool) -> String {
    let remote_ip = req
        .extensions()
        .get::<ConnectInfo<SocketAddr>>()
        .map(|ci| ci.0.ip().to_string());

    let forwarded = || {
        req.headers()
            .get("x-real-ip")
            .and_then(|h| h.to_str().ok())
            .or_else(|| {
                req.headers()
                    .get("x-forwarded-for")
                    .and_then(|h| h.to_str().ok())
                    .and_then(|s| s.split(',').find(|ip| !ip.trim().is_empty()))
            })
            .map(str::trim)
            .filter(|ip| !ip.is_empty())
            .map(str::to_string)
    };

    trust_proxy
        .then(forwarded)
        .flatten()
        .or(remote_ip)
        .unwrap_or_else(|| "unknown".to_string())
}

/// RFC 7231 IMF-fixdate 格式，例如 `Sun, 06 Nov 1994 08:49:37 GMT`
pub fn http_date(at: DateTime<Utc>) -> String {
    at.format("%a, %d %b %Y %H:%M:%S GMT").to_string()
}
