#![allow(dead_code)]

use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::Arc;

use axum::{
    Router,
    body::{Body, to_bytes},
    extract::ConnectInfo,
    http::{HeaderMap, Method, Request, StatusCode, header},
};
use chrono::{Duration, Utc};
use serde_json::Value;
use tower::ServiceExt;

use tenant_gate::{
    AppState,
    cache::{MemorySessionStore, Session, SessionStore},
    config::Config,
    create_router,
    database::{
        MemoryDataStore, MemoryDirectory, SubscriptionRecord, SubscriptionStatus, TenantRecord,
        UsageCounters, UserRecord,
    },
};

pub const PASSWORD: &str = "correct-horse-battery";

/// `TestApp::send` 使用的客户端地址
pub const CLIENT_IP: &str = "198.51.100.10";

pub struct TestApp {
    pub router: Router,
    pub state: AppState,
    pub sessions: Arc<MemorySessionStore>,
    pub directory: Arc<MemoryDirectory>,
    pub data: Arc<MemoryDataStore>,
}

pub struct Response {
    pub status: StatusCode,
    pub headers: HeaderMap,
    pub body: Value,
}

fn user(id: &str, tenant: &str, role: &str, permissions: &[&str]) -> UserRecord {
    UserRecord {
        id: id.into(),
        email: format!("{id}@example.com"),
        tenant_id: tenant.into(),
        is_active: true,
        role: role.into(),
        permissions: permissions.iter().map(|p| p.to_string()).collect(),
        password_hash: Some(bcrypt::hash(PASSWORD, 4).unwrap()),
    }
}

pub fn subscription(tenant: &str, status: SubscriptionStatus, days_left: i64) -> SubscriptionRecord {
    SubscriptionRecord {
        tenant_id: tenant.into(),
        plan: "business".into(),
        status,
        end_date: Some(Utc::now() + Duration::days(days_left)),
        features: if tenant == "tenant-a" {
            vec!["reports".into()]
        } else {
            vec![]
        },
        limits: HashMap::from([("records".to_string(), 1000)]),
    }
}

/// 两个有效租户：
/// - tenant-a: alice (owner, 读写), carol (viewer, 无权限)，套餐包含 `reports`
/// - tenant-b: bob (admin, 读写)，不含 `reports`
pub fn directory() -> Arc<MemoryDirectory> {
    let dir = Arc::new(MemoryDirectory::new());
    for (id, name) in [("tenant-a", "Alpha Trading"), ("tenant-b", "Beta Contracting")] {
        dir.insert_tenant(TenantRecord {
            id: id.into(),
            name: name.into(),
            is_active: true,
        });
        dir.insert_subscription(subscription(id, SubscriptionStatus::Active, 30));
    }
    dir.insert_user(user("alice", "tenant-a", "owner", &["records:read", "records:write"]));
    dir.insert_user(user("carol", "tenant-a", "viewer", &[]));
    dir.insert_user(user("bob", "tenant-b", "admin", &["records:read", "records:write"]));
    dir
}

pub fn spawn_app() -> TestApp {
    spawn_app_with(directory(), None)
}

/// 模拟部署在可信反向代理之后
pub fn spawn_app_behind_proxy() -> TestApp {
    build(
        Config {
            trust_proxy: true,
            ..Config::default()
        },
        directory(),
        None,
    )
}

pub fn spawn_app_with(
    directory: Arc<MemoryDirectory>,
    usage: Option<Arc<dyn UsageCounters>>,
) -> TestApp {
    build(Config::default(), directory, usage)
}

fn build(
    config: Config,
    directory: Arc<MemoryDirectory>,
    usage: Option<Arc<dyn UsageCounters>>,
) -> TestApp {
    let sessions = Arc::new(MemorySessionStore::new());
    let data = Arc::new(MemoryDataStore::new());
    let usage = usage.unwrap_or_else(|| directory.clone());

    let state = AppState::new(
        config,
        sessions.clone(),
        directory.clone(),
        directory.clone(),
        usage,
        data.clone(),
    );

    TestApp {
        router: create_router(state.clone()),
        state,
        sessions,
        directory,
        data,
    }
}

/// socket 对端地址，等同于 `into_make_service_with_connect_info` 注入的值
pub fn peer(ip: &str) -> ConnectInfo<SocketAddr> {
    ConnectInfo(SocketAddr::new(ip.parse().unwrap(), 40000))
}

impl TestApp {
    /// 直接为 `user_id` 创建会话并签发对应的 token
    pub async fn token_for(&self, user_id: &str) -> (String, String) {
        let tenant = match user_id {
            "bob" => "tenant-b",
            _ => "tenant-a",
        };
        let session = Session::new(user_id, tenant, None);
        self.sessions
            .create(&session, self.state.config.session_ttl())
            .await
            .unwrap();
        let (token, _) = self
            .state
            .authenticator
            .verifier()
            .issue(user_id, &format!("{user_id}@example.com"), tenant, &session.session_id)
            .unwrap();
        (token, session.session_id)
    }

    pub async fn send(
        &self,
        method: Method,
        uri: &str,
        token: Option<&str>,
        body: Option<Value>,
    ) -> Response {
        let mut builder = Request::builder()
            .method(method)
            .uri(uri)
            .extension(peer(CLIENT_IP));
        if let Some(token) = token {
            builder = builder.header(header::AUTHORIZATION, format!("Bearer {token}"));
        }
        let request = match body {
            Some(body) => builder
                .header(header::CONTENT_TYPE, "application/json")
                .body(Body::from(body.to_string()))
                .unwrap(),
            None => builder.body(Body::empty()).unwrap(),
        };
        self.dispatch(request).await
    }

    pub async fn dispatch(&self, request: Request<Body>) -> Response {
        let response = self.router.clone().oneshot(request).await.unwrap();
        let status = response.status();
        let headers = response.headers().clone();
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let body = if bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&bytes).unwrap()
        };
        Response {
            status,
            headers,
            body,
        }
    }
}
