mod common;

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use axum::http::{Method, StatusCode};
use serde_json::json;

use common::{directory, spawn_app, spawn_app_with, subscription};
use tenant_gate::{
    database::{SubscriptionStatus, UsageCounter, UsageCounters},
    error::StoreError,
};

#[tokio::test]
async fn records_never_cross_tenants() {
    let app = spawn_app();
    let (alice, _) = app.token_for("alice").await;
    let (bob, _) = app.token_for("bob").await;

    // 请求体中伪造的 tenantId 会被覆盖
    let created = app
        .send(
            Method::POST,
            "/api/records/invoices",
            Some(&alice),
            Some(json!({ "total": 120, "tenantId": "tenant-b" })),
        )
        .await;
    assert_eq!(created.status, StatusCode::CREATED);
    assert_eq!(created.body["data"]["tenantId"], "tenant-a");
    let id = created.body["data"]["id"].as_str().unwrap().to_string();

    let bob_list = app
        .send(Method::GET, "/api/records/invoices", Some(&bob), None)
        .await;
    assert_eq!(bob_list.status, StatusCode::OK);
    assert_eq!(bob_list.body["data"]["total"], 0);

    // 显式查询其他租户同样无效
    let spoofed = app
        .send(
            Method::GET,
            "/api/records/invoices?tenantId=tenant-a",
            Some(&bob),
            None,
        )
        .await;
    assert_eq!(spoofed.body["data"]["total"], 0);

    let bob_delete = app
        .send(
            Method::DELETE,
            &format!("/api/records/invoices/{id}"),
            Some(&bob),
            None,
        )
        .await;
    assert_eq!(bob_delete.status, StatusCode::OK);
    assert_eq!(bob_delete.body["data"]["deleted"], false);

    let alice_list = app
        .send(Method::GET, "/api/records/invoices", Some(&alice), None)
        .await;
    assert_eq!(alice_list.body["data"]["total"], 1);
    assert_eq!(app.data.snapshot("invoices").len(), 1);
}

#[tokio::test]
async fn bulk_create_stamps_every_record() {
    let app = spawn_app();
    let (alice, _) = app.token_for("alice").await;

    let res = app
        .send(
            Method::POST,
            "/api/records/tasks",
            Some(&alice),
            Some(json!([{ "title": "a" }, { "title": "b", "tenantId": "tenant-b" }])),
        )
        .await;
    assert_eq!(res.status, StatusCode::CREATED);
    assert_eq!(res.body["data"]["inserted"], 2);
    assert!(
        app.data
            .snapshot("tasks")
            .iter()
            .all(|r| r["tenantId"] == "tenant-a")
    );
}

#[tokio::test]
async fn invalid_bodies_are_rejected() {
    let app = spawn_app();
    let (alice, _) = app.token_for("alice").await;

    let res = app
        .send(Method::POST, "/api/records/tasks", Some(&alice), Some(json!(42)))
        .await;
    assert_eq!(res.status, StatusCode::BAD_REQUEST);
    assert_eq!(res.body["code"], "VALIDATION_ERROR");
}

#[tokio::test]
async fn expired_subscription_blocks_tenant_routes() {
    let dir = directory();
    dir.insert_subscription(subscription("tenant-a", SubscriptionStatus::Active, -1));
    let app = spawn_app_with(dir, None);
    let (alice, _) = app.token_for("alice").await;

    let res = app
        .send(Method::GET, "/api/records/invoices", Some(&alice), None)
        .await;
    assert_eq!(res.status, StatusCode::FORBIDDEN);
    assert_eq!(res.body["code"], "SUBSCRIPTION_EXPIRED");

    // 仅认证的接口仍然可用
    let me = app.send(Method::GET, "/api/auth/me", Some(&alice), None).await;
    assert_eq!(me.status, StatusCode::OK);
}

#[tokio::test]
async fn suspended_subscription_is_inactive() {
    let dir = directory();
    dir.insert_subscription(subscription("tenant-a", SubscriptionStatus::Suspended, 30));
    let app = spawn_app_with(dir, None);
    let (alice, _) = app.token_for("alice").await;

    let res = app
        .send(Method::GET, "/api/records/invoices", Some(&alice), None)
        .await;
    assert_eq!(res.status, StatusCode::FORBIDDEN);
    assert_eq!(res.body["code"], "SUBSCRIPTION_INACTIVE");
}

#[tokio::test]
async fn reports_require_the_feature() {
    let app = spawn_app();
    let (alice, _) = app.token_for("alice").await;
    let (bob, _) = app.token_for("bob").await;

    for total in [10, 30] {
        app.send(
            Method::POST,
            "/api/records/invoices",
            Some(&alice),
            Some(json!({ "total": total })),
        )
        .await;
    }

    let allowed = app
        .send(
            Method::GET,
            "/api/records/invoices/summary?field=total",
            Some(&alice),
            None,
        )
        .await;
    assert_eq!(allowed.status, StatusCode::OK);
    assert_eq!(allowed.body["data"]["count"], 2);
    assert_eq!(allowed.body["data"]["sum"], 40.0);
    assert_eq!(allowed.body["data"]["max"], 30.0);

    let denied = app
        .send(
            Method::GET,
            "/api/records/invoices/summary?field=total",
            Some(&bob),
            None,
        )
        .await;
    assert_eq!(denied.status, StatusCode::FORBIDDEN);
    assert_eq!(denied.body["code"], "FEATURE_NOT_AVAILABLE");
    assert_eq!(denied.body["requiredFeature"], "reports");
}

#[tokio::test]
async fn exhausted_usage_blocks_creation() {
    let app = spawn_app();
    app.directory
        .set_usage("tenant-a", "records", UsageCounter { current: 10, limit: 10 });
    let (alice, _) = app.token_for("alice").await;

    let res = app
        .send(
            Method::POST,
            "/api/records/invoices",
            Some(&alice),
            Some(json!({ "total": 1 })),
        )
        .await;
    assert_eq!(res.status, StatusCode::TOO_MANY_REQUESTS);
    assert_eq!(res.body["code"], "USAGE_LIMIT_EXCEEDED");
    assert_eq!(res.body["resource"], "records");
    assert_eq!(res.body["current"], 10);
    assert_eq!(res.body["limit"], 10);
    assert!(app.data.snapshot("invoices").is_empty());

    // 读取不计入用量
    let list = app
        .send(Method::GET, "/api/records/invoices", Some(&alice), None)
        .await;
    assert_eq!(list.status, StatusCode::OK);
}

struct BrokenCounters;

#[async_trait]
impl UsageCounters for BrokenCounters {
    async fn usage(&self, _: &str, _: &str) -> Result<Option<UsageCounter>, StoreError> {
        Err(StoreError::Unavailable("usage table offline".into()))
    }
}

#[tokio::test]
async fn usage_lookup_failure_fails_open() {
    let app = spawn_app_with(directory(), Some(Arc::new(BrokenCounters)));
    let (alice, _) = app.token_for("alice").await;

    let res = app
        .send(
            Method::POST,
            "/api/records/invoices",
            Some(&alice),
            Some(json!({ "total": 1 })),
        )
        .await;
    assert_eq!(res.status, StatusCode::CREATED);
}

#[tokio::test]
async fn missing_permission_is_forbidden() {
    let app = spawn_app();
    let (carol, _) = app.token_for("carol").await;

    let res = app
        .send(
            Method::POST,
            "/api/records/invoices",
            Some(&carol),
            Some(json!({ "total": 1 })),
        )
        .await;
    assert_eq!(res.status, StatusCode::FORBIDDEN);
    assert_eq!(res.body["code"], "FORBIDDEN");

    let read = app
        .send(Method::GET, "/api/records/invoices", Some(&carol), None)
        .await;
    assert_eq!(read.status, StatusCode::OK);
}

#[tokio::test]
async fn delete_requires_an_allowed_role() {
    let app = spawn_app();
    let (alice, _) = app.token_for("alice").await;
    let (carol, _) = app.token_for("carol").await;

    let created = app
        .send(
            Method::POST,
            "/api/records/invoices",
            Some(&alice),
            Some(json!({ "total": 5 })),
        )
        .await;
    let uri = format!(
        "/api/records/invoices/{}",
        created.body["data"]["id"].as_str().unwrap()
    );

    let denied = app.send(Method::DELETE, &uri, Some(&carol), None).await;
    assert_eq!(denied.status, StatusCode::FORBIDDEN);
    assert_eq!(denied.body["code"], "FORBIDDEN");

    let deleted = app.send(Method::DELETE, &uri, Some(&alice), None).await;
    assert_eq!(deleted.status, StatusCode::OK);
    assert_eq!(deleted.body["data"]["deleted"], true);
    assert!(app.data.snapshot("invoices").is_empty());
}

#[tokio::test]
async fn tenant_routes_require_authentication() {
    let app = spawn_app();
    let res = app.send(Method::GET, "/api/records/invoices", None, None).await;
    assert_eq!(res.status, StatusCode::UNAUTHORIZED);
}

#[tokio::test(start_paused = true)]
async fn stalled_data_store_times_out_as_unavailable() {
    let app = spawn_app();
    let (alice, _) = app.token_for("alice").await;
    app.data.set_latency(Some(Duration::from_secs(30)));

    let res = app
        .send(Method::GET, "/api/records/invoices", Some(&alice), None)
        .await;
    assert_eq!(res.status, StatusCode::SERVICE_UNAVAILABLE);
    assert_eq!(res.body["code"], "SERVICE_UNAVAILABLE");
}
