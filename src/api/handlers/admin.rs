use axum::{extract::{State, Path}, response::IntoResponse, Json};
use crate::state::AppState;
use crate::api::extractors::auth::AuthUser;
use crate::api::dtos::{requests::AssignRoleRequest, responses::StatsResponse};
use crate::domain::models::{auth::UserProfile, user::Role};
use crate::domain::services::access::{authorize, Capability};
use crate::error::AppError;
use std::sync::Arc;
use tracing::info;

pub async fn list_users(
    State(state): State<Arc<AppState>>,
    AuthUser(actor): AuthUser,
) -> Result<impl IntoResponse, AppError> {
    authorize(&actor, Capability::Administer)?;

    let users: Vec<UserProfile> = state.user_repo.list().await?
        .into_iter()
        .map(UserProfile::from)
        .collect();

    Ok(Json(users))
}

/// Every event on the platform, drafts included, newest first.
pub async fn list_events(
    State(state): State<Arc<AppState>>,
    AuthUser(actor): AuthUser,
) -> Result<impl IntoResponse, AppError> {
    authorize(&actor, Capability::Administer)?;
    let events = state.event_repo.list_all().await?;
    Ok(Json(events))
}

pub async fn assign_role(
    State(state): State<Arc<AppState>>,
    AuthUser(actor): AuthUser,
    Path(user_id): Path<String>,
    Json(payload): Json<AssignRoleRequest>,
) -> Result<impl IntoResponse, AppError> {
    authorize(&actor, Capability::Administer)?;

    let role: Role = payload.role.parse()
        .map_err(|e| AppError::Validation(format!("{}", e)))?;

    if user_id == actor.id {
        return Err(AppError::Conflict("Admins cannot change their own role".into()));
    }

    let user = state.user_repo.update_role(&user_id, role).await?
        .ok_or_else(|| AppError::NotFound("User not found".into()))?;

    info!(user_id = %user.id, role = %role, assigned_by = %actor.id, "Role assigned");

    Ok(Json(UserProfile::from(user)))
}

pub async fn stats(
    State(state): State<Arc<AppState>>,
    AuthUser(actor): AuthUser,
) -> Result<impl IntoResponse, AppError> {
    authorize(&actor, Capability::Administer)?;

    let (users, events, registrations) = tokio::try_join!(
        state.user_repo.count(),
        state.event_repo.count(),
        state.registration_repo.count(),
    )?;

    Ok(Json(StatsResponse { users, events, registrations }))
}
