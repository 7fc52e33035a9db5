use axum::{extract::{State, Path, Query}, http::StatusCode, response::IntoResponse, Json};
use crate::state::AppState;
use crate::api::extractors::{auth::AuthUser, maybe_auth::MaybeAuthUser};
use crate::api::dtos::{
    requests::{CreateEventRequest, UpdateEventRequest},
    responses::EventDetailResponse,
};
use crate::domain::models::event::{Event, EventFilter, EventStatus, CATEGORIES};
use crate::domain::services::access::{authorize, Capability};
use crate::error::{AppError, LedgerError};
use std::sync::Arc;
use uuid::Uuid;
use chrono::Utc;
use tracing::info;

pub async fn create_event(
    State(state): State<Arc<AppState>>,
    AuthUser(actor): AuthUser,
    Json(payload): Json<CreateEventRequest>,
) -> Result<impl IntoResponse, AppError> {
    authorize(&actor, Capability::CreateEvent)?;

    let status = payload.status.unwrap_or(EventStatus::Upcoming);
    if !matches!(status, EventStatus::Draft | EventStatus::Upcoming) {
        return Err(AppError::Validation("New events must be draft or upcoming".into()));
    }

    let event = Event {
        id: Uuid::new_v4().to_string(),
        title: payload.title.trim().to_string(),
        description: payload.description,
        short_description: payload.short_description,
        category: payload.category,
        location: payload.location,
        starts_at: payload.starts_at,
        ends_at: payload.ends_at,
        image_url: payload.image_url,
        capacity: payload.capacity,
        status,
        featured: payload.featured.unwrap_or(false),
        organizer_id: actor.id.clone(),
        created_at: Utc::now(),
    };
    validate_event(&event)?;

    let created = state.event_repo.create(&event).await?;
    info!(event_id = %created.id, organizer_id = %actor.id, "Event created: {}", created.title);

    Ok((StatusCode::CREATED, Json(EventDetailResponse::new(created, 0))))
}

pub async fn list_events(
    State(state): State<Arc<AppState>>,
    Query(filter): Query<EventFilter>,
) -> Result<impl IntoResponse, AppError> {
    let events = state.event_repo.list(&filter).await?;
    Ok(Json(events))
}

pub async fn get_event(
    State(state): State<Arc<AppState>>,
    MaybeAuthUser(actor): MaybeAuthUser,
    Path(event_id): Path<String>,
) -> Result<impl IntoResponse, AppError> {
    let event = state.event_repo.find_by_id(&event_id).await?
        .ok_or_else(|| LedgerError::NotFound("Event not found".into()))?;

    // Drafts exist only for the people who can manage them.
    if event.status == EventStatus::Draft {
        let visible = actor.as_ref()
            .is_some_and(|a| authorize(a, Capability::ManageEvent(&event)).is_ok());
        if !visible {
            return Err(LedgerError::NotFound("Event not found".into()).into());
        }
    }

    let active_count = state.ledger.count_active(&event.id).await?;
    Ok(Json(EventDetailResponse::new(event, active_count)))
}

pub async fn update_event(
    State(state): State<Arc<AppState>>,
    AuthUser(actor): AuthUser,
    Path(event_id): Path<String>,
    Json(payload): Json<UpdateEventRequest>,
) -> Result<impl IntoResponse, AppError> {
    let mut event = state.event_repo.find_by_id(&event_id).await?
        .ok_or_else(|| LedgerError::NotFound("Event not found".into()))?;

    authorize(&actor, Capability::ManageEvent(&event))?;

    let has_registrations = state.registration_repo.count_for_event(&event.id).await? > 0;
    let mut require_no_registrations = false;

    if let Some(capacity) = payload.capacity
        && capacity != event.capacity
    {
        if has_registrations {
            return Err(LedgerError::InvalidTransition("capacity cannot change once registrations exist".into()).into());
        }
        event.capacity = capacity;
        require_no_registrations = true;
    }

    if let Some(next) = payload.status {
        if !event.status.can_transition_to(next, has_registrations) {
            return Err(LedgerError::InvalidTransition(format!("event cannot move from {} to {}", event.status, next)).into());
        }
        require_no_registrations |= next == EventStatus::Draft && event.status != EventStatus::Draft;
        event.status = next;
    }

    if let Some(title) = payload.title { event.title = title.trim().to_string(); }
    if let Some(description) = payload.description { event.description = description; }
    if let Some(short_description) = payload.short_description { event.short_description = Some(short_description); }
    if let Some(category) = payload.category { event.category = category; }
    if let Some(location) = payload.location { event.location = location; }
    if let Some(starts_at) = payload.starts_at { event.starts_at = starts_at; }
    if let Some(ends_at) = payload.ends_at { event.ends_at = ends_at; }
    if let Some(image_url) = payload.image_url { event.image_url = Some(image_url); }
    if let Some(featured) = payload.featured { event.featured = featured; }

    validate_event(&event)?;

    // The registration check above is advisory; the store repeats it
    // atomically with the write.
    let updated = state.event_repo.update(&event, require_no_registrations).await?
        .ok_or_else(|| LedgerError::InvalidTransition("registrations arrived while the event was being edited".into()))?;
    info!(event_id = %updated.id, status = %updated.status, "Event updated");

    let active_count = state.ledger.count_active(&updated.id).await?;
    Ok(Json(EventDetailResponse::new(updated, active_count)))
}

pub async fn list_my_events(
    State(state): State<Arc<AppState>>,
    AuthUser(actor): AuthUser,
) -> Result<impl IntoResponse, AppError> {
    authorize(&actor, Capability::CreateEvent)?;
    let events = state.event_repo.list_by_organizer(&actor.id).await?;
    Ok(Json(events))
}

fn validate_event(event: &Event) -> Result<(), AppError> {
    if event.title.is_empty() {
        return Err(AppError::Validation("Title is required".into()));
    }
    if !CATEGORIES.contains(&event.category.as_str()) {
        return Err(AppError::Validation(format!("Unknown category: {}", event.category)));
    }
    if event.ends_at <= event.starts_at {
        return Err(AppError::Validation("End time must be after start time".into()));
    }
    if event.capacity.is_some_and(|c| c < 1) {
        return Err(AppError::Validation("Capacity must be at least 1".into()));
    }
    Ok(())
}
