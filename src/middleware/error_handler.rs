use std::time::Instant;

use axum::{
    body::{Body, to_bytes},
    http::Request,
    middleware::Next,
    response::Response,
};
use serde_json::Value;
use tracing::{debug, error};

/// 超过该大小的 5xx 响应体不再解析，只记录状态码
const MAX_INSPECTED_BODY: usize = 64 * 1024;

/// 请求日志：方法、路径、状态码及耗时。
/// 5xx 时额外从响应包装中取出 `code` 和 `message`，响应体原样返回
pub async fn trace_requests(req: Request<Body>, next: Next) -> Response {
    let started = Instant::now();
    let method = req.method().clone();
    let path = req.uri().path().to_owned();

    let response = next.run(req).await;
    let status = response.status().as_u16();
    let elapsed_ms = started.elapsed().as_millis() as u64;

    if !response.status().is_server_error() {
        debug!(%method, %path, status, elapsed_ms, "Request completed");
        return response;
    }

    let (parts, body) = response.into_parts();
    let bytes = match to_bytes(body, MAX_INSPECTED_BODY).await {
        Ok(bytes) => bytes,
        Err(e) => {
            error!(%method, %path, status, elapsed_ms, "Request failed, body unreadable: {}", e);
            return Response::from_parts(parts, Body::empty());
        }
    };

    let envelope = serde_json::from_slice::<Value>(&bytes).ok();
    let field = |name: &str| {
        envelope
            .as_ref()
            .and_then(|v| v.get(name))
            .and_then(Value::as_str)
            .unwrap_or("-")
            .to_owned()
    };
    error!(
        %method,
        %path,
        status,
        elapsed_ms,
        code = %field("code"),
        message = %field("message"),
        "Request failed"
    );

    Response::from_parts(parts, Body::from(bytes))
}
