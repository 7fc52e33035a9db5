use axum::{
    extract::{FromRequestParts, FromRef},
    http::request::Parts,
};
use crate::state::AppState;
use crate::domain::models::user::Actor;
use std::convert::Infallible;
use std::sync::Arc;
use tower_cookies::Cookies;
use tracing::debug;

use super::auth::ACCESS_COOKIE;

/// Caller identity for public routes that show more to signed-in users.
/// A missing or invalid token makes the caller a guest.
pub struct MaybeAuthUser(pub Option<Actor>);

impl<S> FromRequestParts<S> for MaybeAuthUser
where
    S: Send + Sync,
    Arc<AppState>: FromRef<S>,
{
    type Rejection = Infallible;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let Some(cookies) = parts.extensions.get::<Cookies>() else {
            return Ok(MaybeAuthUser(None));
        };

        let Some(cookie) = cookies.get(ACCESS_COOKIE) else {
            return Ok(MaybeAuthUser(None));
        };

        let app_state = <Arc<AppState> as FromRef<S>>::from_ref(state);
        match app_state.auth_service.resolve_access_token(cookie.value()).await {
            Ok(verified) => Ok(MaybeAuthUser(Some(verified.actor))),
            Err(e) => {
                debug!("MaybeAuth: treating caller as guest: {}", e);
                Ok(MaybeAuthUser(None))
            }
        }
    }
}
