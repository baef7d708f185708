//! HTTP API tests driving the router with `tower::ServiceExt::oneshot`

#![cfg(feature = "http-server")]

use axum::http::{header, Method, StatusCode};
use pretty_assertions::assert_eq;
use rstest::*;
use serde_json::json;
use std::time::Duration;

mod common;
use common::{json_body, test_policy, TestApp, TEST_PIN, WRONG_PIN};

#[fixture]
fn app() -> TestApp {
    TestApp::new(test_policy(3))
}

#[rstest]
#[tokio::test]
async fn test_health(app: TestApp) {
    let response = app.request(Method::GET, "/health", None, None).await;
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(json_body(response).await["status"], "ok");
}

#[rstest]
#[tokio::test]
async fn test_failed_logins_then_locked(app: TestApp) {
    let wrong = json!({ "pin": WRONG_PIN });

    let first = app
        .request(Method::POST, "/admin/login", None, Some(wrong.clone()))
        .await;
    assert_eq!(first.status(), StatusCode::UNAUTHORIZED);
    let body = json_body(first).await;
    assert_eq!(body["status"], "failure");
    assert_eq!(body["remaining_attempts"], 2);

    app.request(Method::POST, "/admin/login", None, Some(wrong.clone()))
        .await;
    let third = app
        .request(Method::POST, "/admin/login", None, Some(wrong))
        .await;
    assert_eq!(third.status(), StatusCode::LOCKED);
    assert!(third.headers().contains_key(header::RETRY_AFTER));
    let body = json_body(third).await;
    assert_eq!(body["status"], "locked_out");
    assert!(body["unlock_at"].is_string());

    let status = json_body(app.request(Method::GET, "/admin/session", None, None).await).await;
    assert_eq!(status["phase"], "locked_out");
    assert_eq!(status["authenticated"], false);
}

#[rstest]
#[tokio::test]
async fn test_retry_after_tracks_lockout_clock(app: TestApp) {
    let wrong = json!({ "pin": WRONG_PIN });
    let mut last = None;
    for _ in 0..3 {
        last = Some(
            app.request(Method::POST, "/admin/login", None, Some(wrong.clone()))
                .await,
        );
    }
    let locked = last.unwrap();
    assert_eq!(locked.headers()[header::RETRY_AFTER], "900");
    let unlock_at = json_body(locked).await["unlock_at"].clone();

    app.clock.advance(Duration::from_secs(10 * 60));
    let later = app
        .request(Method::POST, "/admin/login", None, Some(json!({ "pin": TEST_PIN })))
        .await;
    assert_eq!(later.status(), StatusCode::LOCKED);
    assert_eq!(later.headers()[header::RETRY_AFTER], "300");
    assert_eq!(json_body(later).await["unlock_at"], unlock_at);
}

#[rstest]
#[tokio::test]
async fn test_login_with_store_down_is_unavailable(app: TestApp) {
    app.store.set_unavailable(true);
    let response = app
        .request(Method::POST, "/admin/login", None, Some(json!({ "pin": TEST_PIN })))
        .await;
    assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);
    assert_eq!(json_body(response).await["status"], "unavailable");

    let status = json_body(app.request(Method::GET, "/admin/session", None, None).await).await;
    assert_eq!(status["authenticated"], false);
}

#[rstest]
#[tokio::test]
async fn test_admin_api_requires_session(app: TestApp) {
    let response = app
        .request(Method::GET, "/admin/api/projects", None, None)
        .await;
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    let body = json_body(response).await;
    assert!(body["error"]["message"]
        .as_str()
        .unwrap()
        .contains("please reauthenticate"));

    let response = app
        .request(Method::GET, "/admin/api/projects", Some("not-a-token"), None)
        .await;
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
}

#[rstest]
#[tokio::test]
async fn test_content_management_round_trip(app: TestApp) {
    let token = app.login().await;

    let created = app
        .request(
            Method::POST,
            "/admin/api/projects",
            Some(&token),
            Some(json!({
                "title": "Logistics Dashboard",
                "description": "Fleet tracking for a regional carrier",
                "technologies": ["Rust", "Postgres"],
            })),
        )
        .await;
    assert_eq!(created.status(), StatusCode::CREATED);
    let project = json_body(created).await;
    let id = project["id"].as_str().unwrap().to_string();
    assert_eq!(project["slug"], "logistics-dashboard");

    // Drafts stay off the public API
    let hidden = app
        .request(Method::GET, "/api/projects/logistics-dashboard", None, None)
        .await;
    assert_eq!(hidden.status(), StatusCode::NOT_FOUND);

    let toggled = app
        .request(
            Method::POST,
            &format!("/admin/api/projects/{id}/toggle/published"),
            Some(&token),
            None,
        )
        .await;
    assert_eq!(toggled.status(), StatusCode::OK);

    let listed = json_body(app.request(Method::GET, "/api/projects", None, None).await).await;
    assert_eq!(listed.as_array().unwrap().len(), 1);

    let patched = app
        .request(
            Method::PATCH,
            &format!("/admin/api/projects/{id}"),
            Some(&token),
            Some(json!({ "featured": true })),
        )
        .await;
    assert_eq!(json_body(patched).await["featured"], true);

    let deleted = app
        .request(
            Method::DELETE,
            &format!("/admin/api/projects/{id}"),
            Some(&token),
            None,
        )
        .await;
    assert_eq!(deleted.status(), StatusCode::NO_CONTENT);

    let gone = app
        .request(
            Method::GET,
            &format!("/admin/api/projects/{id}"),
            Some(&token),
            None,
        )
        .await;
    assert_eq!(gone.status(), StatusCode::NOT_FOUND);
}

#[rstest]
#[tokio::test]
async fn test_backend_outage_returns_retryable_503(app: TestApp) {
    app.backend.set_unavailable(true);

    let response = app.request(Method::GET, "/api/blog", None, None).await;
    assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);
    let body = json_body(response).await;
    assert_eq!(body["error"]["retryable"], true);
}

#[rstest]
#[tokio::test]
async fn test_unknown_kind_is_not_found(app: TestApp) {
    let response = app.request(Method::GET, "/api/invoices", None, None).await;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

#[rstest]
#[tokio::test]
async fn test_session_warning_and_extend(app: TestApp) {
    let token = app.login().await;

    app.clock.advance(Duration::from_secs(26 * 60));
    let status = json_body(
        app.request(Method::GET, "/admin/session", Some(&token), None)
            .await,
    )
    .await;
    assert_eq!(status["phase"], "authenticated");
    assert_eq!(status["expiring_soon"], true);
    assert_eq!(status["remaining_seconds"], 4 * 60);

    let extended = app
        .request(Method::POST, "/admin/session/extend", Some(&token), None)
        .await;
    assert_eq!(extended.status(), StatusCode::OK);

    let status = json_body(
        app.request(Method::GET, "/admin/session", Some(&token), None)
            .await,
    )
    .await;
    assert_eq!(status["expiring_soon"], false);
    assert_eq!(status["remaining_seconds"], 30 * 60);
}

#[rstest]
#[tokio::test]
async fn test_expired_session_rejected(app: TestApp) {
    let token = app.login().await;
    app.clock.advance(Duration::from_secs(30 * 60));

    let response = app
        .request(Method::GET, "/admin/api/reviews", Some(&token), None)
        .await;
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
}

#[rstest]
#[tokio::test]
async fn test_logout_is_idempotent(app: TestApp) {
    let token = app.login().await;

    for _ in 0..2 {
        let response = app
            .request(Method::POST, "/admin/logout", Some(&token), None)
            .await;
        assert_eq!(response.status(), StatusCode::NO_CONTENT);
    }

    let response = app
        .request(Method::GET, "/admin/api/partners", Some(&token), None)
        .await;
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
}
