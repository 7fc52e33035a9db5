use campus_events::{
    api::router::create_router,
    config::Config,
    domain::models::user::Role,
    infra::factory::sqlite_state,
    state::AppState,
};
use sqlx::{sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePoolOptions}, Pool, Sqlite};
use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;
use uuid::Uuid;
use axum::{
    body::Body,
    http::{Request, StatusCode, header},
    Router,
};
use chrono::Utc;
use tower::ServiceExt;
use serde_json::{json, Value};

pub struct AuthHeaders {
    pub user_id: String,
    pub access_token: String,
    pub refresh_token: String,
    pub csrf_token: String,
}

#[allow(dead_code)]
pub struct TestApp {
    pub router: Router,
    pub pool: Pool<Sqlite>,
    pub db_filename: String,
    pub state: Arc<AppState>,
}

#[allow(dead_code)]
impl TestApp {
    pub async fn new() -> Self {
        let db_filename = format!("test_{}.db", Uuid::new_v4());
        let db_url = format!("sqlite://{}?mode=rwc", db_filename);

        let connection_options = SqliteConnectOptions::from_str(&db_url)
            .unwrap()
            .create_if_missing(true)
            .journal_mode(SqliteJournalMode::Wal)
            .busy_timeout(Duration::from_secs(10));

        let pool = SqlitePoolOptions::new()
            .max_connections(5)
            .connect_with(connection_options)
            .await
            .expect("Failed to connect to test db");

        sqlx::migrate!("./migrations/sqlite")
            .run(&pool)
            .await
            .expect("Failed to migrate test db");

        let config = Config {
            database_url: db_url.clone(),
            port: 0,
            jwt_secret_key: include_str!("../tests/keys/test_private.pem").to_string(),
            jwt_public_key: include_str!("../tests/keys/test_public.pem").to_string(),
            auth_issuer: "test-issuer".to_string(),
            store_timeout: Duration::from_secs(10),
            bootstrap_admin: None,
        };

        let state = Arc::new(sqlite_state(pool.clone(), config));
        let router = create_router(state.clone());

        Self { router, pool, db_filename, state }
    }

    /// Sends a request and returns the status with the parsed JSON body
    /// (`Value::Null` for empty bodies).
    pub async fn send(&self, method: &str, uri: &str, auth: Option<&AuthHeaders>, body: Option<Value>) -> (StatusCode, Value) {
        let mut builder = Request::builder().method(method).uri(uri);
        if let Some(auth) = auth {
            builder = builder
                .header(header::COOKIE, format!("access_token={}", auth.access_token))
                .header("X-CSRF-Token", &auth.csrf_token);
        }
        let request = match body {
            Some(b) => builder.header(header::CONTENT_TYPE, "application/json").body(Body::from(b.to_string())),
            None => builder.body(Body::empty()),
        }.unwrap();

        let response = self.router.clone().oneshot(request).await.unwrap();
        let status = response.status();
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let value = if bytes.is_empty() { Value::Null } else { serde_json::from_slice(&bytes).unwrap_or(Value::Null) };
        (status, value)
    }

    pub async fn signup(&self, username: &str) -> AuthHeaders {
        let payload = json!({
            "username": username,
            "password": "correct-horse",
            "full_name": format!("{} Tester", username),
            "email": format!("{}@campus.test", username)
        });
        self.auth_request("/api/v1/auth/signup", payload).await
    }

    pub async fn login(&self, username: &str, password: &str) -> AuthHeaders {
        let payload = json!({ "username": username, "password": password });
        self.auth_request("/api/v1/auth/login", payload).await
    }

    /// Signs up a user and assigns `role` directly in the store. The role is
    /// resolved per request, so the signup session already carries it.
    pub async fn user_with_role(&self, username: &str, role: Role) -> AuthHeaders {
        let auth = self.signup(username).await;
        self.state.user_repo.update_role(&auth.user_id, role).await.unwrap();
        auth
    }

    pub async fn create_event(&self, auth: &AuthHeaders, capacity: Option<i64>) -> String {
        let (status, body) = self.send("POST", "/api/v1/events", Some(auth), Some(event_payload("Robotics Demo", capacity))).await;
        assert_eq!(status, StatusCode::CREATED, "create_event failed: {}", body);
        body["id"].as_str().unwrap().to_string()
    }

    pub async fn register(&self, auth: &AuthHeaders, event_id: &str) -> (StatusCode, Value) {
        self.send("POST", &format!("/api/v1/events/{}/registrations", event_id), Some(auth), None).await
    }

    pub async fn active_count(&self, event_id: &str) -> i64 {
        let (status, body) = self.send("GET", &format!("/api/v1/events/{}", event_id), None, None).await;
        assert_eq!(status, StatusCode::OK);
        body["active_count"].as_i64().unwrap()
    }

    async fn auth_request(&self, uri: &str, payload: Value) -> AuthHeaders {
        let response = self.router.clone().oneshot(
            Request::builder()
                .method("POST")
                .uri(uri)
                .header(header::CONTENT_TYPE, "application/json")
                .body(Body::from(payload.to_string()))
                .unwrap()
        ).await.unwrap();

        if !response.status().is_success() {
            panic!("Auth request to {} failed in test helper: status {}", uri, response.status());
        }

        let cookies: Vec<String> = response.headers()
            .get_all(header::SET_COOKIE)
            .iter()
            .map(|h| h.to_str().unwrap().to_string())
            .collect();

        let access_token = cookie_value(&cookies, "access_token");
        let refresh_token = cookie_value(&cookies, "refresh_token");

        let body_bytes = axum::body::to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let body_json: Value = serde_json::from_slice(&body_bytes).unwrap();

        AuthHeaders {
            user_id: body_json["user"]["id"].as_str().expect("No user id in body").to_string(),
            access_token,
            refresh_token,
            csrf_token: body_json["csrf_token"].as_str().expect("No csrf_token in body").to_string(),
        }
    }
}

pub fn cookie_value(cookies: &[String], name: &str) -> String {
    let prefix = format!("{}=", name);
    let cookie = cookies.iter()
        .find(|c| c.starts_with(&prefix))
        .unwrap_or_else(|| panic!("No {} cookie returned", name));
    let rest = &cookie[prefix.len()..];
    rest.split(';').next().unwrap().to_string()
}

pub fn event_payload(title: &str, capacity: Option<i64>) -> Value {
    let starts_at = Utc::now() + chrono::Duration::days(3);
    json!({
        "title": title,
        "description": "Hands-on demo of the robotics club's latest build",
        "category": "Tech",
        "location": "Engineering Hall",
        "starts_at": starts_at.to_rfc3339(),
        "ends_at": (starts_at + chrono::Duration::hours(2)).to_rfc3339(),
        "capacity": capacity
    })
}

impl Drop for TestApp {
    fn drop(&mut self) {
        let _ = std::fs::remove_file(&self.db_filename);
        let _ = std::fs::remove_file(format!("{}-wal", self.db_filename));
        let _ = std::fs::remove_file(format!("{}-shm", self.db_filename));
    }
}
