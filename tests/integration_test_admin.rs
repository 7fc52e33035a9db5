mod common;

use axum::http::StatusCode;
use campus_events::domain::models::user::Role;
use common::{event_payload, TestApp};
use serde_json::json;

#[tokio::test]
async fn test_admin_endpoints_require_admin() {
    let app = TestApp::new().await;
    let organizer = app.user_with_role("olga", Role::Organizer).await;

    for uri in ["/api/v1/admin/users", "/api/v1/admin/events", "/api/v1/admin/stats"] {
        let (status, body) = app.send("GET", uri, Some(&organizer), None).await;
        assert_eq!(status, StatusCode::FORBIDDEN, "{}", uri);
        assert_eq!(body["code"], "UNAUTHORIZED");
    }

    let (status, _) = app.send("GET", "/api/v1/admin/users", None, None).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_assign_role_promotes_user() {
    let app = TestApp::new().await;
    let admin = app.user_with_role("ada", Role::Admin).await;
    let student = app.signup("sam").await;

    let uri = format!("/api/v1/admin/users/{}/role", student.user_id);
    let (status, body) = app.send("PUT", &uri, Some(&admin), Some(json!({ "role": "organizer" }))).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["role"], "organizer");

    // The new role applies to the session the user already holds.
    let (status, _) = app.send("POST", "/api/v1/events", Some(&student), Some(event_payload("Club Fair", None))).await;
    assert_eq!(status, StatusCode::CREATED);

    let (status, users) = app.send("GET", "/api/v1/admin/users", Some(&admin), None).await;
    assert_eq!(status, StatusCode::OK);
    let names: Vec<&str> = users.as_array().unwrap().iter().map(|u| u["username"].as_str().unwrap()).collect();
    assert_eq!(names, vec!["ada", "sam"]);
    assert!(users[0].get("password_hash").is_none());
}

#[tokio::test]
async fn test_demotion_applies_to_live_tokens() {
    let app = TestApp::new().await;
    let admin = app.user_with_role("ada", Role::Admin).await;
    let organizer = app.user_with_role("olga", Role::Organizer).await;
    let event_id = app.create_event(&organizer, None).await;

    let uri = format!("/api/v1/admin/users/{}/role", organizer.user_id);
    let (status, _) = app.send("PUT", &uri, Some(&admin), Some(json!({ "role": "student" }))).await;
    assert_eq!(status, StatusCode::OK);

    let (status, body) = app.send("POST", "/api/v1/events", Some(&organizer), Some(event_payload("Too Late", None))).await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    assert_eq!(body["code"], "UNAUTHORIZED");

    // Ownership still lets them manage what they already organize.
    let (status, _) = app.send("GET", &format!("/api/v1/events/{}/registrations", event_id), Some(&organizer), None).await;
    assert_eq!(status, StatusCode::OK);

    let (status, _) = app.send("GET", "/api/v1/admin/users", Some(&admin), None).await;
    assert_eq!(status, StatusCode::OK);
}

#[tokio::test]
async fn test_admin_event_list_includes_drafts_newest_first() {
    let app = TestApp::new().await;
    let admin = app.user_with_role("ada", Role::Admin).await;
    let organizer = app.user_with_role("olga", Role::Organizer).await;

    let (status, _) = app.send("POST", "/api/v1/events", Some(&organizer), Some(event_payload("Published Talk", None))).await;
    assert_eq!(status, StatusCode::CREATED);

    let mut draft = event_payload("Unannounced Gala", None);
    draft["status"] = json!("draft");
    let (status, _) = app.send("POST", "/api/v1/events", Some(&organizer), Some(draft)).await;
    assert_eq!(status, StatusCode::CREATED);

    let (_, public) = app.send("GET", "/api/v1/events", None, None).await;
    assert_eq!(public.as_array().unwrap().len(), 1);

    let (status, all) = app.send("GET", "/api/v1/admin/events", Some(&admin), None).await;
    assert_eq!(status, StatusCode::OK);
    let titles: Vec<&str> = all.as_array().unwrap().iter().map(|e| e["title"].as_str().unwrap()).collect();
    assert_eq!(titles, vec!["Unannounced Gala", "Published Talk"]);
    assert_eq!(all[0]["status"], "draft");
}

#[tokio::test]
async fn test_assign_role_rejections() {
    let app = TestApp::new().await;
    let admin = app.user_with_role("ada", Role::Admin).await;
    let student = app.signup("sam").await;

    let uri = format!("/api/v1/admin/users/{}/role", student.user_id);
    let (status, body) = app.send("PUT", &uri, Some(&admin), Some(json!({ "role": "superuser" }))).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["code"], "VALIDATION");

    let own = format!("/api/v1/admin/users/{}/role", admin.user_id);
    let (status, body) = app.send("PUT", &own, Some(&admin), Some(json!({ "role": "student" }))).await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(body["code"], "CONFLICT");

    let (status, _) = app.send("PUT", "/api/v1/admin/users/nobody/role", Some(&admin), Some(json!({ "role": "student" }))).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_stats_counts_everything() {
    let app = TestApp::new().await;
    let admin = app.user_with_role("ada", Role::Admin).await;
    let student = app.signup("sam").await;
    let event_id = app.create_event(&admin, Some(3)).await;
    app.register(&student, &event_id).await;

    let (status, body) = app.send("GET", "/api/v1/admin/stats", Some(&admin), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["users"], 2);
    assert_eq!(body["events"], 1);
    assert_eq!(body["registrations"], 1);
}

#[tokio::test]
async fn test_health() {
    let app = TestApp::new().await;
    let (status, body) = app.send("GET", "/health", None, None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "ok");
}
