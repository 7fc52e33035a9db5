use axum::{extract::{State, Path}, http::StatusCode, response::IntoResponse, Json};
use crate::state::AppState;
use crate::api::extractors::auth::AuthUser;
use crate::api::dtos::requests::CheckInByTokenRequest;
use crate::error::AppError;
use std::sync::Arc;

pub async fn register(
    State(state): State<Arc<AppState>>,
    AuthUser(actor): AuthUser,
    Path(event_id): Path<String>,
) -> Result<impl IntoResponse, AppError> {
    let registration = state.ledger.register(&actor, &event_id).await?;
    Ok((StatusCode::CREATED, Json(registration)))
}

pub async fn my_registration(
    State(state): State<Arc<AppState>>,
    AuthUser(actor): AuthUser,
    Path(event_id): Path<String>,
) -> Result<impl IntoResponse, AppError> {
    let registration = state.ledger.my_registration(&actor, &event_id).await?;
    Ok(Json(registration))
}

pub async fn list_registrations(
    State(state): State<Arc<AppState>>,
    AuthUser(actor): AuthUser,
    Path(event_id): Path<String>,
) -> Result<impl IntoResponse, AppError> {
    let attendees = state.ledger.list_for_event(&actor, &event_id).await?;
    Ok(Json(attendees))
}

pub async fn cancel_registration(
    State(state): State<Arc<AppState>>,
    AuthUser(actor): AuthUser,
    Path(registration_id): Path<String>,
) -> Result<impl IntoResponse, AppError> {
    let registration = state.ledger.cancel(&actor, &registration_id).await?;
    Ok(Json(registration))
}

pub async fn check_in(
    State(state): State<Arc<AppState>>,
    AuthUser(actor): AuthUser,
    Path(registration_id): Path<String>,
) -> Result<impl IntoResponse, AppError> {
    let registration = state.ledger.check_in(&actor, &registration_id).await?;
    Ok(Json(registration))
}

pub async fn check_in_by_token(
    State(state): State<Arc<AppState>>,
    AuthUser(actor): AuthUser,
    Path(event_id): Path<String>,
    Json(payload): Json<CheckInByTokenRequest>,
) -> Result<impl IntoResponse, AppError> {
    let registration = state.ledger.check_in_by_token(&actor, &event_id, payload.token.trim()).await?;
    Ok(Json(registration))
}

pub async fn list_my_registrations(
    State(state): State<Arc<AppState>>,
    AuthUser(actor): AuthUser,
) -> Result<impl IntoResponse, AppError> {
    let registrations = state.ledger.list_mine(&actor).await?;
    Ok(Json(registrations))
}
