mod common;

use axum::{
    body::Body,
    http::{header, Request, StatusCode},
};
use common::{cookie_value, TestApp};
use serde_json::json;
use tower::ServiceExt;

async fn refresh_with(app: &TestApp, refresh_token: &str) -> (StatusCode, Vec<String>) {
    let response = app.router.clone().oneshot(
        Request::builder()
            .method("POST")
            .uri("/api/v1/auth/refresh")
            .header(header::COOKIE, format!("refresh_token={}", refresh_token))
            .body(Body::empty())
            .unwrap()
    ).await.unwrap();

    let cookies = response.headers()
        .get_all(header::SET_COOKIE)
        .iter()
        .map(|h| h.to_str().unwrap().to_string())
        .collect();
    (response.status(), cookies)
}

#[tokio::test]
async fn test_signup_login_and_me() {
    let app = TestApp::new().await;
    let auth = app.signup("sam").await;

    let (status, me) = app.send("GET", "/api/v1/auth/me", Some(&auth), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(me["username"], "sam");
    assert_eq!(me["role"], "student");
    assert!(me.get("password_hash").is_none());

    let again = app.login("sam", "correct-horse").await;
    assert_eq!(again.user_id, auth.user_id);
}

#[tokio::test]
async fn test_signup_rejects_duplicates_and_weak_passwords() {
    let app = TestApp::new().await;
    app.signup("sam").await;

    let dup = json!({ "username": "sam", "password": "another-pass", "full_name": "Sam Two", "email": "sam2@campus.test" });
    let (status, body) = app.send("POST", "/api/v1/auth/signup", None, Some(dup)).await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(body["code"], "CONFLICT");

    let weak = json!({ "username": "tim", "password": "short", "full_name": "Tim", "email": "tim@campus.test" });
    let (status, body) = app.send("POST", "/api/v1/auth/signup", None, Some(weak)).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["code"], "VALIDATION");
    assert!(body["error"].is_string());
}

#[tokio::test]
async fn test_wrong_password_is_unauthorized() {
    let app = TestApp::new().await;
    app.signup("sam").await;

    let (status, body) = app.send("POST", "/api/v1/auth/login", None, Some(json!({ "username": "sam", "password": "nope-nope" }))).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["code"], "UNAUTHENTICATED");

    let (status, _) = app.send("POST", "/api/v1/auth/login", None, Some(json!({ "username": "ghost", "password": "nope-nope" }))).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_mutation_without_csrf_is_forbidden() {
    let app = TestApp::new().await;
    let auth = app.signup("sam").await;

    let response = app.router.clone().oneshot(
        Request::builder()
            .method("POST")
            .uri("/api/v1/events/whatever/registrations")
            .header(header::COOKIE, format!("access_token={}", auth.access_token))
            .body(Body::empty())
            .unwrap()
    ).await.unwrap();
    assert_eq!(response.status(), StatusCode::FORBIDDEN);

    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX).await.unwrap();
    let body: serde_json::Value = serde_json::from_slice(&bytes).unwrap();
    assert_eq!(body["code"], "FORBIDDEN");
}

#[tokio::test]
async fn test_refresh_rotates_and_burns_old_token() {
    let app = TestApp::new().await;
    let auth = app.signup("sam").await;

    let (status, cookies) = refresh_with(&app, &auth.refresh_token).await;
    assert_eq!(status, StatusCode::OK);
    let rotated = cookie_value(&cookies, "refresh_token");
    assert_ne!(rotated, auth.refresh_token);

    let (status, _) = refresh_with(&app, &auth.refresh_token).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    let (status, _) = refresh_with(&app, &rotated).await;
    assert_eq!(status, StatusCode::OK);
}

#[tokio::test]
async fn test_logout_revokes_refresh_token() {
    let app = TestApp::new().await;
    let auth = app.signup("sam").await;

    let response = app.router.clone().oneshot(
        Request::builder()
            .method("POST")
            .uri("/api/v1/auth/logout")
            .header(header::COOKIE, format!("refresh_token={}", auth.refresh_token))
            .body(Body::empty())
            .unwrap()
    ).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let (status, _) = refresh_with(&app, &auth.refresh_token).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_garbage_access_token_is_unauthenticated() {
    let app = TestApp::new().await;

    let response = app.router.clone().oneshot(
        Request::builder()
            .method("GET")
            .uri("/api/v1/auth/me")
            .header(header::COOKIE, "access_token=not-a-jwt")
            .body(Body::empty())
            .unwrap()
    ).await.unwrap();
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
}
