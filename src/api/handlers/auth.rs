use axum::{extract::State, response::IntoResponse, Json, http::StatusCode};
use crate::state::AppState;
use crate::error::AppError;
use crate::api::dtos::requests::{LoginRequest, SignupRequest};
use crate::api::extractors::auth::{AuthUser, ACCESS_COOKIE, REFRESH_COOKIE};
use crate::domain::models::{auth::{AuthResponse, UserProfile}, user::User};
use crate::domain::services::auth_service::{IssuedTokens, ACCESS_TOKEN_MINUTES, REFRESH_TOKEN_DAYS};
use std::sync::Arc;
use tower_cookies::{Cookies, Cookie};
use tower_cookies::cookie::SameSite;
use time::Duration;
use tracing::info;

const MIN_PASSWORD_LEN: usize = 8;

pub async fn signup(
    State(state): State<Arc<AppState>>,
    cookies: Cookies,
    Json(payload): Json<SignupRequest>,
) -> Result<impl IntoResponse, AppError> {
    let username = payload.username.trim();
    if username.is_empty() || payload.full_name.trim().is_empty() {
        return Err(AppError::Validation("Username and full name are required".into()));
    }
    if !payload.email.contains('@') {
        return Err(AppError::Validation("Invalid email address".into()));
    }
    if payload.password.len() < MIN_PASSWORD_LEN {
        return Err(AppError::Validation(format!("Password must be at least {} characters", MIN_PASSWORD_LEN)));
    }

    if state.user_repo.find_by_username(username).await?.is_some() {
        return Err(AppError::Conflict("Username already taken".into()));
    }

    let password_hash = state.auth_service.hash_password(&payload.password)?;
    let user = User::new(
        username.to_string(),
        payload.full_name.trim().to_string(),
        payload.email.trim().to_string(),
        password_hash,
    );

    // A concurrent signup for the same name surfaces as a unique violation.
    let user = state.user_repo.create(&user).await.map_err(|e| {
        if e.is_unique_violation() { AppError::Conflict("Username already taken".into()) } else { e }
    })?;

    let tokens = state.auth_service.login(&user).await?;
    set_cookies(&cookies, &tokens);

    info!(user_id = %user.id, "User signed up: {}", user.username);

    Ok((StatusCode::CREATED, Json(AuthResponse { csrf_token: tokens.csrf_token, user: UserProfile::from(user) })))
}

pub async fn login(
    State(state): State<Arc<AppState>>,
    cookies: Cookies,
    Json(payload): Json<LoginRequest>,
) -> Result<impl IntoResponse, AppError> {
    let user = state.auth_service.authenticate(&payload.username, &payload.password).await?;
    let tokens = state.auth_service.login(&user).await?;

    set_cookies(&cookies, &tokens);

    info!("User logged in: {}", user.id);

    Ok(Json(AuthResponse { csrf_token: tokens.csrf_token, user: UserProfile::from(user) }))
}

pub async fn refresh(
    State(state): State<Arc<AppState>>,
    cookies: Cookies,
) -> Result<impl IntoResponse, AppError> {
    let refresh_cookie = cookies.get(REFRESH_COOKIE).ok_or(AppError::Unauthorized)?;

    let (user, tokens) = state.auth_service.refresh(refresh_cookie.value()).await?;

    set_cookies(&cookies, &tokens);

    info!("Token refreshed for user: {}", user.id);

    Ok(Json(AuthResponse { csrf_token: tokens.csrf_token, user: UserProfile::from(user) }))
}

pub async fn logout(
    State(state): State<Arc<AppState>>,
    cookies: Cookies,
) -> Result<impl IntoResponse, AppError> {
    if let Some(cookie) = cookies.get(REFRESH_COOKIE) {
        state.auth_service.logout(cookie.value()).await?;
    }

    cookies.remove(Cookie::build((ACCESS_COOKIE, "")).path("/").into());
    cookies.remove(Cookie::build((REFRESH_COOKIE, "")).path("/").into());

    info!("User logged out");

    Ok(StatusCode::OK)
}

pub async fn me(
    State(state): State<Arc<AppState>>,
    AuthUser(actor): AuthUser,
) -> Result<impl IntoResponse, AppError> {
    let user = state.user_repo.find_by_id(&actor.id).await?
        .ok_or(AppError::Unauthorized)?;

    Ok(Json(UserProfile::from(user)))
}

fn set_cookies(cookies: &Cookies, tokens: &IssuedTokens) {
    let mut access_c = Cookie::new(ACCESS_COOKIE, tokens.access_token.clone());
    access_c.set_http_only(true);
    access_c.set_secure(true);
    access_c.set_same_site(SameSite::Strict);
    access_c.set_path("/");
    access_c.set_max_age(Duration::minutes(ACCESS_TOKEN_MINUTES));
    cookies.add(access_c);

    let mut refresh_c = Cookie::new(REFRESH_COOKIE, tokens.refresh_token.clone());
    refresh_c.set_http_only(true);
    refresh_c.set_secure(true);
    refresh_c.set_same_site(SameSite::Strict);
    refresh_c.set_path("/");
    refresh_c.set_max_age(Duration::days(REFRESH_TOKEN_DAYS));
    cookies.add(refresh_c);
}
