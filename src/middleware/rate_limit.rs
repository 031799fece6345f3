use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use axum::{
    body::Body,
    extract::State,
    http::{HeaderMap, HeaderValue, Request},
    middleware::Next,
    response::{IntoResponse, Response},
};
use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use tokio::task::JoinHandle;

use crate::error::AppError;
use crate::utils::{client_ip, http_date};

#[derive(Debug, Clone)]
pub struct RateLimitConfig {
    pub name: &'static str,
    pub window: Duration,
    pub max: u32,
    /// 是否信任反向代理写入的 `X-Real-IP` / `X-Forwarded-For`
    pub trust_proxy: bool,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RateLimitEntry {
    pub count: u32,
    pub window_reset_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RateLimitDecision {
    pub allowed: bool,
    pub limit: u32,
    pub remaining: u32,
    pub reset_at: DateTime<Utc>,
    /// 距窗口重置的秒数（向上取整）
    pub retry_after: u64,
}

impl RateLimitDecision {
    fn apply_headers(&self, headers: &mut HeaderMap) {
        let reset_http = http_date(self.reset_at);
        let reset_unix = self.reset_at.timestamp().to_string();
        let pairs = [
            ("ratelimit-limit", self.limit.to_string()),
            ("ratelimit-remaining", self.remaining.to_string()),
            ("ratelimit-reset", reset_http),
            ("x-ratelimit-limit", self.limit.to_string()),
            ("x-ratelimit-remaining", self.remaining.to_string()),
            ("x-ratelimit-reset", reset_unix),
        ];
        // 内层限流器已写入的头部保持不变
        for (name, value) in pairs {
            if let Ok(value) = HeaderValue::from_str(&value) {
                headers.entry(name).or_insert(value);
            }
        }
    }
}

/// 按 key 计数的固定窗口限流器，状态保存在进程内存中。
///
/// 检查与计数在同一把锁内完成，同一 key 的并发请求不会少计。
/// 多实例部署时各实例独立计数。
pub struct RateLimiter {
    config: RateLimitConfig,
    entries: Mutex<HashMap<String, RateLimitEntry>>,
}

impl RateLimiter {
    pub fn new(config: RateLimitConfig) -> Self {
        Self {
            config,
            entries: Mutex::new(HashMap::new()),
        }
    }

    pub fn for_auth(window: Duration, max: u32) -> Self {
        Self::new(RateLimitConfig {
            name: "auth",
            window,
            max,
            trust_proxy: false,
        })
    }

    pub fn for_api(window: Duration, max: u32) -> Self {
        Self::new(RateLimitConfig {
            name: "api",
            window,
            max,
            trust_proxy: false,
        })
    }

    pub fn trust_proxy(mut self, trust: bool) -> Self {
        self.config.trust_proxy = trust;
        self
    }

    pub fn config(&self) -> &RateLimitConfig {
        &self.config
    }

    pub fn check(&self, key: &str) -> RateLimitDecision {
        self.check_at(key, Utc::now())
    }

    pub fn check_at(&self, key: &str, now: DateTime<Utc>) -> RateLimitDecision {
        let window = chrono::Duration::milliseconds(self.config.window.as_millis() as i64);

        let entry = {
            let mut entries = self.entries.lock();
            let entry = entries
                .entry(key.to_string())
                .and_modify(|e| {
                    if now >= e.window_reset_at {
                        e.count = 1;
                        e.window_reset_at = now + window;
                    } else {
                        e.count = e.count.saturating_add(1);
                    }
                })
                .or_insert_with(|| RateLimitEntry {
                    count: 1,
                    window_reset_at: now + window,
                });
            entry.clone()
        };

        let millis_left = (entry.window_reset_at - now).num_milliseconds().max(0) as u64;
        RateLimitDecision {
            allowed: entry.count <= self.config.max,
            limit: self.config.max,
            remaining: self.config.max.saturating_sub(entry.count),
            reset_at: entry.window_reset_at,
            retry_after: millis_left.div_ceil(1000),
        }
    }

    /// 清理所有窗口已结束的条目
    pub fn sweep_at(&self, now: DateTime<Utc>) -> usize {
        let mut entries = self.entries.lock();
        let before = entries.len();
        entries.retain(|_, e| e.window_reset_at > now);
        before - entries.len()
    }

    pub fn len(&self) -> usize {
        self.entries.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// 启动定期清理任务，handle 被 stop 或 drop 时任务结束
    pub fn start_sweeper(self: &Arc<Self>, interval: Duration) -> SweeperHandle {
        let limiter = Arc::downgrade(self);
        let name = self.config.name;
        let task = tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            ticker.tick().await;
            loop {
                ticker.tick().await;
                let Some(limiter) = limiter.upgrade() else {
                    break;
                };
                let removed = limiter.sweep_at(Utc::now());
                if removed > 0 {
                    tracing::debug!("Rate limiter {} swept {} expired entries", name, removed);
                }
            }
        });
        SweeperHandle { task: Some(task) }
    }

    fn key_for(&self, req: &Request<Body>) -> String {
        format!("{}:{}", self.config.name, client_ip(req, self.config.trust_proxy))
    }
}

pub struct SweeperHandle {
    task: Option<JoinHandle<()>>,
}

impl SweeperHandle {
    pub fn stop(mut self) {
        if let Some(task) = self.task.take() {
            task.abort();
        }
    }
}

impl Drop for SweeperHandle {
    fn drop(&mut self) {
        if let Some(task) = self.task.take() {
            task.abort();
        }
    }
}

pub async fn rate_limit(
    State(limiter): State<Arc<RateLimiter>>,
    req: Request<Body>,
    next: Next,
) -> Response {
    let key = limiter.key_for(&req);
    let decision = limiter.check(&key);

    let mut response = if decision.allowed {
        next.run(req).await
    } else {
        tracing::warn!("Rate limit {} exceeded for {}", limiter.config.name, key);
        AppError::RateLimited {
            retry_after: decision.retry_after,
        }
        .into_response()
    };

    decision.apply_headers(response.headers_mut());
    response
}
