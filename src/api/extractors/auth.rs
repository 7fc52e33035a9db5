use axum::{
    extract::{FromRequestParts, FromRef},
    http::{request::Parts, Method},
};
use crate::state::AppState;
use crate::domain::models::user::Actor;
use crate::error::{AppError, LedgerError};
use std::sync::Arc;
use tower_cookies::Cookies;
use tracing::Span;

pub const ACCESS_COOKIE: &str = "access_token";
pub const REFRESH_COOKIE: &str = "refresh_token";
pub const CSRF_HEADER: &str = "X-CSRF-Token";

/// The authenticated caller, resolved from the access-token cookie.
pub struct AuthUser(pub Actor);

impl<S> FromRequestParts<S> for AuthUser
where
    S: Send + Sync,
    Arc<AppState>: FromRef<S>,
{
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let cookies = parts.extensions.get::<Cookies>()
            .ok_or(AppError::Internal)?;

        let access_token = cookies.get(ACCESS_COOKIE)
            .ok_or(LedgerError::Unauthenticated)?
            .value()
            .to_string();

        let app_state = <Arc<AppState> as FromRef<S>>::from_ref(state);

        let verified = app_state.auth_service.resolve_access_token(&access_token).await
            .map_err(|e| match e {
                AppError::Unauthorized => AppError::from(LedgerError::Unauthenticated),
                other => other,
            })?;

        if !is_safe_method(&parts.method) {
            let csrf_header_val = parts.headers.get(CSRF_HEADER)
                .ok_or_else(|| AppError::Forbidden("Missing CSRF token".into()))?
                .to_str()
                .map_err(|_| AppError::Forbidden("Malformed CSRF token".into()))?;

            if csrf_header_val != verified.csrf_token {
                return Err(AppError::Forbidden("CSRF token mismatch".into()));
            }
        }

        Span::current().record("user_id", verified.actor.id.as_str());

        Ok(AuthUser(verified.actor))
    }
}

fn is_safe_method(method: &Method) -> bool {
    matches!(*method, Method::GET | Method::HEAD | Method::OPTIONS)
}
