use crate::domain::models::{
    user::{Role, User},
    event::{Event, EventFilter},
    registration::{Attendee, InsertOutcome, Registration, RegistrationStatus, RegistrationWithEvent},
    auth::RefreshTokenRecord,
};
use crate::error::AppError;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use uuid::Uuid;

#[async_trait]
pub trait UserRepository: Send + Sync {
    async fn create(&self, user: &User) -> Result<User, AppError>;
    async fn find_by_username(&self, username: &str) -> Result<Option<User>, AppError>;
    async fn find_by_id(&self, id: &str) -> Result<Option<User>, AppError>;
    async fn list(&self) -> Result<Vec<User>, AppError>;
    async fn update_role(&self, id: &str, role: Role) -> Result<Option<User>, AppError>;
    async fn count(&self) -> Result<i64, AppError>;
}

#[async_trait]
pub trait AuthRepository: Send + Sync {
    async fn create_refresh_token(&self, record: &RefreshTokenRecord) -> Result<(), AppError>;
    async fn find_refresh_token(&self, token_hash: &str) -> Result<Option<RefreshTokenRecord>, AppError>;
    /// Burns `old_hash` and stores `next` atomically. Returns `false` if the
    /// old token was already gone (replayed or raced).
    async fn rotate_refresh_token(&self, old_hash: &str, next: &RefreshTokenRecord) -> Result<bool, AppError>;
    async fn delete_refresh_token(&self, token_hash: &str) -> Result<(), AppError>;
    async fn delete_refresh_family(&self, family_id: Uuid) -> Result<(), AppError>;
}

#[async_trait]
pub trait EventRepository: Send + Sync {
    async fn create(&self, event: &Event) -> Result<Event, AppError>;
    async fn find_by_id(&self, id: &str) -> Result<Option<Event>, AppError>;
    async fn list(&self, filter: &EventFilter) -> Result<Vec<Event>, AppError>;
    async fn list_by_organizer(&self, organizer_id: &str) -> Result<Vec<Event>, AppError>;
    /// Every event, drafts included, newest first.
    async fn list_all(&self) -> Result<Vec<Event>, AppError>;
    /// Writes `event`. With `require_no_registrations` the write only lands if
    /// no registration row exists for the event at that moment; `None` otherwise.
    async fn update(&self, event: &Event, require_no_registrations: bool) -> Result<Option<Event>, AppError>;
    async fn count(&self) -> Result<i64, AppError>;
}

#[async_trait]
pub trait RegistrationRepository: Send + Sync {
    /// Inserts `registration` only if the event is open, the attendee has no
    /// active registration for it and fewer than the event's stored capacity
    /// are active. Status, capacity and count are read in the same atomic
    /// decision as the insert.
    async fn insert_within_capacity(&self, registration: &Registration) -> Result<InsertOutcome, AppError>;
    async fn find_by_id(&self, id: &str) -> Result<Option<Registration>, AppError>;
    async fn find_by_token(&self, token: &str) -> Result<Option<Registration>, AppError>;
    async fn find_active(&self, event_id: &str, user_id: &str) -> Result<Option<Registration>, AppError>;
    async fn list_by_event(&self, event_id: &str) -> Result<Vec<Attendee>, AppError>;
    async fn list_active_by_user(&self, user_id: &str) -> Result<Vec<RegistrationWithEvent>, AppError>;
    /// Compare-and-set status change. Returns `None` when the registration
    /// does not exist or is no longer in `from`.
    async fn transition(
        &self,
        id: &str,
        from: RegistrationStatus,
        to: RegistrationStatus,
        checked_in_at: Option<DateTime<Utc>>,
    ) -> Result<Option<Registration>, AppError>;
    async fn count_active(&self, event_id: &str) -> Result<i64, AppError>;
    async fn count_for_event(&self, event_id: &str) -> Result<i64, AppError>;
    async fn count(&self) -> Result<i64, AppError>;
}
