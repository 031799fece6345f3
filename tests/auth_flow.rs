mod common;

use std::time::Duration;

use axum::http::{Method, StatusCode};
use chrono::Utc;
use serde_json::json;

use common::{PASSWORD, spawn_app};
use tenant_gate::{auth::AccessClaims, cache::SessionStore, database::{TenantRecord, UserRecord}};

#[tokio::test]
async fn login_then_me_then_logout_revokes_the_token() {
    let app = spawn_app();

    let login = app
        .send(
            Method::POST,
            "/api/auth/login",
            None,
            Some(json!({ "email": "alice@example.com", "password": PASSWORD })),
        )
        .await;
    assert_eq!(login.status, StatusCode::OK);
    assert_eq!(login.body["success"], true);
    let token = login.body["data"]["token"].as_str().unwrap().to_string();
    let session_id = login.body["data"]["sessionId"].as_str().unwrap().to_string();
    assert_eq!(login.body["data"]["user"]["tenantId"], "tenant-a");

    let me = app.send(Method::GET, "/api/auth/me", Some(&token), None).await;
    assert_eq!(me.status, StatusCode::OK);
    assert_eq!(me.body["data"]["userId"], "alice");
    assert_eq!(me.body["data"]["role"], "owner");

    let logout = app.send(Method::POST, "/api/auth/logout", Some(&token), None).await;
    assert_eq!(logout.status, StatusCode::OK);
    assert!(app.sessions.get(&session_id).await.unwrap().is_none());

    // 签名和有效期都没问题，但会话已被删除
    let after = app.send(Method::GET, "/api/auth/me", Some(&token), None).await;
    assert_eq!(after.status, StatusCode::UNAUTHORIZED);
    assert_eq!(after.body["success"], false);
    assert!(after.body.get("code").is_none());
}

#[tokio::test]
async fn destroyed_session_rejects_an_otherwise_valid_token() {
    let app = spawn_app();
    let (token, session_id) = app.token_for("alice").await;

    app.sessions.destroy(&session_id).await.unwrap();

    let res = app.send(Method::GET, "/api/auth/me", Some(&token), None).await;
    assert_eq!(res.status, StatusCode::UNAUTHORIZED);
    assert!(res.body.get("code").is_none());
}

#[tokio::test]
async fn wrong_password_is_unauthorized() {
    let app = spawn_app();
    let res = app
        .send(
            Method::POST,
            "/api/auth/login",
            None,
            Some(json!({ "email": "alice@example.com", "password": "nope" })),
        )
        .await;
    assert_eq!(res.status, StatusCode::UNAUTHORIZED);
    assert!(app.sessions.is_empty());
}

#[tokio::test]
async fn missing_and_malformed_credentials_are_unauthorized() {
    let app = spawn_app();

    let missing = app.send(Method::GET, "/api/auth/me", None, None).await;
    assert_eq!(missing.status, StatusCode::UNAUTHORIZED);
    assert!(missing.body.get("code").is_none());

    let garbage = app.send(Method::GET, "/api/auth/me", Some("not.a.jwt"), None).await;
    assert_eq!(garbage.status, StatusCode::UNAUTHORIZED);
    assert!(garbage.body.get("code").is_none());
}

#[tokio::test]
async fn expired_token_carries_its_own_code() {
    let app = spawn_app();
    let (_, session_id) = app.token_for("alice").await;
    let now = Utc::now().timestamp();
    let token = app
        .state
        .authenticator
        .verifier()
        .sign(&AccessClaims {
            user_id: "alice".into(),
            email: "alice@example.com".into(),
            tenant_id: "tenant-a".into(),
            session_id,
            issued_at: now - 7200,
            expires_at: now - 3600,
        })
        .unwrap();

    let res = app.send(Method::GET, "/api/auth/me", Some(&token), None).await;
    assert_eq!(res.status, StatusCode::UNAUTHORIZED);
    assert_eq!(res.body["code"], "TOKEN_EXPIRED");
}

#[tokio::test]
async fn deactivated_user_is_rejected_mid_session() {
    let app = spawn_app();
    let (token, _) = app.token_for("carol").await;

    app.directory.insert_user(UserRecord {
        id: "carol".into(),
        email: "carol@example.com".into(),
        tenant_id: "tenant-a".into(),
        is_active: false,
        role: "viewer".into(),
        permissions: vec![],
        password_hash: None,
    });

    let res = app.send(Method::GET, "/api/auth/me", Some(&token), None).await;
    assert_eq!(res.status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn inactive_tenant_is_forbidden_with_code() {
    let app = spawn_app();
    let (token, _) = app.token_for("alice").await;
    app.directory.insert_tenant(TenantRecord {
        id: "tenant-a".into(),
        name: "Alpha Trading".into(),
        is_active: false,
    });

    let res = app.send(Method::GET, "/api/auth/me", Some(&token), None).await;
    assert_eq!(res.status, StatusCode::FORBIDDEN);
    assert_eq!(res.body["code"], "TENANT_INACTIVE");

    let login = app
        .send(
            Method::POST,
            "/api/auth/login",
            None,
            Some(json!({ "email": "alice@example.com", "password": PASSWORD })),
        )
        .await;
    assert_eq!(login.status, StatusCode::FORBIDDEN);
    assert_eq!(login.body["code"], "TENANT_INACTIVE");
}

#[tokio::test]
async fn status_never_rejects() {
    let app = spawn_app();

    let anonymous = app.send(Method::GET, "/api/auth/status", None, None).await;
    assert_eq!(anonymous.status, StatusCode::OK);
    assert_eq!(anonymous.body["data"]["authenticated"], false);

    let garbage = app
        .send(Method::GET, "/api/auth/status", Some("garbage"), None)
        .await;
    assert_eq!(garbage.status, StatusCode::OK);
    assert_eq!(garbage.body["data"]["authenticated"], false);

    let (token, _) = app.token_for("alice").await;
    let known = app.send(Method::GET, "/api/auth/status", Some(&token), None).await;
    assert_eq!(known.status, StatusCode::OK);
    assert_eq!(known.body["data"]["authenticated"], true);
    assert_eq!(known.body["data"]["user"]["userId"], "alice");
}

#[tokio::test(start_paused = true)]
async fn each_request_slides_the_session_ttl() {
    let app = spawn_app();
    let (token, session_id) = app.token_for("alice").await;
    let ttl = app.state.config.session_ttl();

    tokio::time::advance(Duration::from_secs(20 * 3600)).await;
    let before = app.sessions.remaining_ttl(&session_id).unwrap();
    assert!(before <= Duration::from_secs(4 * 3600));

    let res = app.send(Method::GET, "/api/auth/me", Some(&token), None).await;
    assert_eq!(res.status, StatusCode::OK);
    assert_eq!(app.sessions.remaining_ttl(&session_id), Some(ttl));
}

#[tokio::test]
async fn unavailable_directory_fails_closed() {
    let app = spawn_app();
    let (token, _) = app.token_for("alice").await;
    app.directory.set_unavailable(true);

    let res = app.send(Method::GET, "/api/auth/me", Some(&token), None).await;
    assert_eq!(res.status, StatusCode::SERVICE_UNAVAILABLE);
    assert_eq!(res.body["code"], "SERVICE_UNAVAILABLE");
}

#[tokio::test(start_paused = true)]
async fn slow_directory_times_out_as_unavailable() {
    let app = spawn_app();
    let (token, _) = app.token_for("alice").await;
    app.directory.set_latency(Some(Duration::from_secs(30)));

    let res = app.send(Method::GET, "/api/auth/me", Some(&token), None).await;
    assert_eq!(res.status, StatusCode::SERVICE_UNAVAILABLE);
}

#[tokio::test]
async fn health_is_public() {
    let app = spawn_app();
    let res = app.send(Method::GET, "/health", None, None).await;
    assert_eq!(res.status, StatusCode::OK);
    assert!(res.headers.get("ratelimit-limit").is_none());
}
