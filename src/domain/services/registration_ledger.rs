use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use chrono::Utc;
use tracing::{error, info, warn};

use crate::domain::{
    models::{
        event::Event,
        registration::{Attendee, InsertOutcome, Registration, RegistrationStatus, RegistrationWithEvent},
        user::Actor,
    },
    ports::{EventRepository, RegistrationRepository},
    services::access::{authorize, Capability},
};
use crate::error::{AppError, LedgerError};

/// Owns the registration lifecycle: register, cancel, check in, and the
/// capacity bound. Holds no state of its own; the store is the only source
/// of truth and every call waits for it to confirm.
pub struct RegistrationLedger {
    events: Arc<dyn EventRepository>,
    registrations: Arc<dyn RegistrationRepository>,
    store_timeout: Duration,
}

impl RegistrationLedger {
    pub fn new(
        events: Arc<dyn EventRepository>,
        registrations: Arc<dyn RegistrationRepository>,
        store_timeout: Duration,
    ) -> Self {
        Self { events, registrations, store_timeout }
    }

    pub async fn register(&self, actor: &Actor, event_id: &str) -> Result<Registration, LedgerError> {
        let event = self.load_event(event_id).await?;

        // Early reject only. The store re-reads status and capacity when it
        // decides, so an edit landing after this read still counts.
        if !event.status.accepts_registrations() {
            return Err(LedgerError::InvalidTransition(format!("event is {}", event.status)));
        }

        let registration = Registration::new(event.id.clone(), actor.id.clone());
        let outcome = self
            .store("insert_registration", self.registrations.insert_within_capacity(&registration))
            .await?;

        match outcome {
            InsertOutcome::Inserted(created) => {
                info!(registration_id = %created.id, event_id = %event.id, user_id = %actor.id, "Registration accepted");
                Ok(created)
            }
            InsertOutcome::Duplicate => Err(LedgerError::DuplicateRegistration),
            InsertOutcome::CapacityExceeded => {
                info!(event_id = %event.id, "Registration rejected: event full");
                Err(LedgerError::CapacityExceeded)
            }
            InsertOutcome::EventClosed(status) => {
                info!(event_id = %event.id, status = %status, "Registration rejected: event closed meanwhile");
                Err(LedgerError::InvalidTransition(format!("event is {status}")))
            }
        }
    }

    pub async fn cancel(&self, actor: &Actor, registration_id: &str) -> Result<Registration, LedgerError> {
        let registration = self.load_registration(registration_id).await?;
        // A cancelled registration is gone for everyone, owner or not.
        if !registration.status.is_active() {
            return Err(LedgerError::NotFound("Registration is already cancelled".into()));
        }
        authorize(actor, Capability::CancelRegistration(&registration))?;
        cancel_guard(registration.status)?;

        let updated = self
            .transition(&registration, RegistrationStatus::Cancelled, cancel_guard)
            .await?;
        info!(registration_id = %updated.id, event_id = %updated.event_id, "Registration cancelled");
        Ok(updated)
    }

    pub async fn check_in(&self, actor: &Actor, registration_id: &str) -> Result<Registration, LedgerError> {
        let registration = self.load_registration(registration_id).await?;
        let event = self.load_event(&registration.event_id).await?;
        self.check_in_loaded(actor, &event, registration).await
    }

    /// Scanner path: the organizer presents the attendee's token for an event.
    pub async fn check_in_by_token(&self, actor: &Actor, event_id: &str, token: &str) -> Result<Registration, LedgerError> {
        let event = self.load_event(event_id).await?;
        authorize(actor, Capability::ManageEvent(&event))?;

        let registration = self
            .store("find_registration_by_token", self.registrations.find_by_token(token))
            .await?
            .filter(|r| r.event_id == event.id)
            .ok_or_else(|| LedgerError::NotFound("No registration for this token at this event".into()))?;

        self.check_in_loaded(actor, &event, registration).await
    }

    async fn check_in_loaded(&self, actor: &Actor, event: &Event, registration: Registration) -> Result<Registration, LedgerError> {
        authorize(actor, Capability::ManageEvent(event))?;
        check_in_guard(registration.status)?;

        let updated = self
            .transition(&registration, RegistrationStatus::CheckedIn, check_in_guard)
            .await?;
        info!(registration_id = %updated.id, event_id = %event.id, checked_in_by = %actor.id, "Attendee checked in");
        Ok(updated)
    }

    /// Live count of registrations holding a slot (`registered` + `checked_in`).
    pub async fn count_active(&self, event_id: &str) -> Result<i64, LedgerError> {
        self.store("count_active", self.registrations.count_active(event_id)).await
    }

    pub async fn my_registration(&self, actor: &Actor, event_id: &str) -> Result<Option<Registration>, LedgerError> {
        self.store("find_active_registration", self.registrations.find_active(event_id, &actor.id)).await
    }

    pub async fn list_for_event(&self, actor: &Actor, event_id: &str) -> Result<Vec<Attendee>, LedgerError> {
        let event = self.load_event(event_id).await?;
        authorize(actor, Capability::ManageEvent(&event))?;
        self.store("list_registrations", self.registrations.list_by_event(&event.id)).await
    }

    pub async fn list_mine(&self, actor: &Actor) -> Result<Vec<RegistrationWithEvent>, LedgerError> {
        self.store("list_user_registrations", self.registrations.list_active_by_user(&actor.id)).await
    }

    /// Compare-and-set from `registered`. If another request changed the row
    /// first, re-read it and report why the transition no longer applies.
    async fn transition(
        &self,
        registration: &Registration,
        to: RegistrationStatus,
        guard: fn(RegistrationStatus) -> Result<(), LedgerError>,
    ) -> Result<Registration, LedgerError> {
        let checked_in_at = (to == RegistrationStatus::CheckedIn).then(Utc::now);
        let updated = self
            .store(
                "transition_registration",
                self.registrations.transition(&registration.id, RegistrationStatus::Registered, to, checked_in_at),
            )
            .await?;

        if let Some(updated) = updated {
            return Ok(updated);
        }

        let current = self.load_registration(&registration.id).await?;
        warn!(registration_id = %registration.id, status = %current.status, "Registration changed concurrently");
        guard(current.status)?;
        Err(LedgerError::InvalidTransition(format!("registration is {}", current.status)))
    }

    async fn load_event(&self, event_id: &str) -> Result<Event, LedgerError> {
        self.store("find_event", self.events.find_by_id(event_id))
            .await?
            .ok_or_else(|| LedgerError::NotFound("Event not found".into()))
    }

    async fn load_registration(&self, registration_id: &str) -> Result<Registration, LedgerError> {
        self.store("find_registration", self.registrations.find_by_id(registration_id))
            .await?
            .ok_or_else(|| LedgerError::NotFound("Registration not found".into()))
    }

    /// Bounds a store call by the configured timeout. Anything but a confirmed
    /// answer from the store is reported as `Unavailable`.
    async fn store<T, F>(&self, operation: &'static str, call: F) -> Result<T, LedgerError>
    where
        F: Future<Output = Result<T, AppError>>,
    {
        match tokio::time::timeout(self.store_timeout, call).await {
            Ok(Ok(value)) => Ok(value),
            Ok(Err(AppError::NotFound(msg))) => Err(LedgerError::NotFound(msg)),
            Ok(Err(AppError::Ledger(e))) => Err(e),
            Ok(Err(e)) => {
                error!(operation, "Event store call failed: {:?}", e);
                Err(LedgerError::Unavailable)
            }
            Err(_) => {
                warn!(operation, timeout_ms = self.store_timeout.as_millis() as u64, "Event store call timed out");
                Err(LedgerError::Unavailable)
            }
        }
    }
}

fn cancel_guard(status: RegistrationStatus) -> Result<(), LedgerError> {
    match status {
        RegistrationStatus::Registered => Ok(()),
        RegistrationStatus::Cancelled => Err(LedgerError::NotFound("Registration is already cancelled".into())),
        RegistrationStatus::CheckedIn => Err(LedgerError::InvalidTransition("cannot cancel after check-in".into())),
    }
}

fn check_in_guard(status: RegistrationStatus) -> Result<(), LedgerError> {
    match status {
        RegistrationStatus::Registered => Ok(()),
        other => Err(LedgerError::InvalidTransition(format!("registration is {other}"))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::models::{event::{EventFilter, EventStatus}, user::Role};
    use async_trait::async_trait;
    use chrono::DateTime;
    use std::sync::Mutex;

    // Store doubles for the paths the SQLite-backed integration tests cannot
    // reach: an unreachable store and a row changing under our feet.

    struct OneEvent(Event);

    #[async_trait]
    impl EventRepository for OneEvent {
        async fn create(&self, event: &Event) -> Result<Event, AppError> { Ok(event.clone()) }
        async fn find_by_id(&self, id: &str) -> Result<Option<Event>, AppError> {
            Ok((self.0.id == id).then(|| self.0.clone()))
        }
        async fn list(&self, _filter: &EventFilter) -> Result<Vec<Event>, AppError> { Ok(vec![self.0.clone()]) }
        async fn list_by_organizer(&self, _organizer_id: &str) -> Result<Vec<Event>, AppError> { Ok(vec![]) }
        async fn list_all(&self) -> Result<Vec<Event>, AppError> { Ok(vec![]) }
        async fn update(&self, event: &Event, _guarded: bool) -> Result<Option<Event>, AppError> { Ok(Some(event.clone())) }
        async fn count(&self) -> Result<i64, AppError> { Ok(1) }
    }

    struct HangingEvents;

    #[async_trait]
    impl EventRepository for HangingEvents {
        async fn create(&self, event: &Event) -> Result<Event, AppError> { Ok(event.clone()) }
        async fn find_by_id(&self, _id: &str) -> Result<Option<Event>, AppError> {
            std::future::pending().await
        }
        async fn list(&self, _filter: &EventFilter) -> Result<Vec<Event>, AppError> { Ok(vec![]) }
        async fn list_by_organizer(&self, _organizer_id: &str) -> Result<Vec<Event>, AppError> { Ok(vec![]) }
        async fn list_all(&self) -> Result<Vec<Event>, AppError> { Ok(vec![]) }
        async fn update(&self, event: &Event, _guarded: bool) -> Result<Option<Event>, AppError> { Ok(Some(event.clone())) }
        async fn count(&self) -> Result<i64, AppError> { Ok(0) }
    }

    /// Holds one registration; `transition` always loses the race to a
    /// concurrent cancel.
    struct RacingRegistrations {
        row: Mutex<Registration>,
        fail_inserts: bool,
    }

    #[async_trait]
    impl RegistrationRepository for RacingRegistrations {
        async fn insert_within_capacity(&self, _r: &Registration) -> Result<InsertOutcome, AppError> {
            if self.fail_inserts {
                Err(AppError::Database(sqlx::Error::PoolTimedOut))
            } else {
                Ok(InsertOutcome::EventClosed(EventStatus::Cancelled))
            }
        }
        async fn find_by_id(&self, id: &str) -> Result<Option<Registration>, AppError> {
            let row = self.row.lock().unwrap();
            Ok((row.id == id).then(|| row.clone()))
        }
        async fn find_by_token(&self, token: &str) -> Result<Option<Registration>, AppError> {
            let row = self.row.lock().unwrap();
            Ok((row.check_in_token == token).then(|| row.clone()))
        }
        async fn find_active(&self, _e: &str, _u: &str) -> Result<Option<Registration>, AppError> { Ok(None) }
        async fn list_by_event(&self, _e: &str) -> Result<Vec<Attendee>, AppError> { Ok(vec![]) }
        async fn list_active_by_user(&self, _u: &str) -> Result<Vec<RegistrationWithEvent>, AppError> { Ok(vec![]) }
        async fn transition(
            &self,
            _id: &str,
            _from: RegistrationStatus,
            _to: RegistrationStatus,
            _at: Option<DateTime<Utc>>,
        ) -> Result<Option<Registration>, AppError> {
            self.row.lock().unwrap().status = RegistrationStatus::Cancelled;
            Ok(None)
        }
        async fn count_active(&self, _e: &str) -> Result<i64, AppError> { Ok(0) }
        async fn count_for_event(&self, _e: &str) -> Result<i64, AppError> { Ok(1) }
        async fn count(&self) -> Result<i64, AppError> { Ok(1) }
    }

    fn event() -> Event {
        Event {
            id: "ev-1".into(),
            title: "Jazz Night".into(),
            description: "Live music".into(),
            short_description: None,
            category: "Music".into(),
            location: "Auditorium".into(),
            starts_at: Utc::now(),
            ends_at: Utc::now(),
            image_url: None,
            capacity: Some(1),
            status: EventStatus::Upcoming,
            featured: false,
            organizer_id: "organizer".into(),
            created_at: Utc::now(),
        }
    }

    fn ledger(fail_inserts: bool) -> (RegistrationLedger, Registration) {
        let registration = Registration::new("ev-1".into(), "student".into());
        let repo = RacingRegistrations { row: Mutex::new(registration.clone()), fail_inserts };
        let ledger = RegistrationLedger::new(Arc::new(OneEvent(event())), Arc::new(repo), Duration::from_secs(1));
        (ledger, registration)
    }

    #[tokio::test]
    async fn store_failure_is_reported_as_unavailable() {
        let (ledger, _) = ledger(true);
        let err = ledger.register(&Actor::new("student", Role::Student), "ev-1").await.unwrap_err();
        assert_eq!(err, LedgerError::Unavailable);
    }

    #[tokio::test]
    async fn store_timeout_is_reported_as_unavailable() {
        let ledger = RegistrationLedger::new(
            Arc::new(HangingEvents),
            Arc::new(RacingRegistrations { row: Mutex::new(Registration::new("ev-1".into(), "s".into())), fail_inserts: false }),
            Duration::from_millis(50),
        );
        let err = ledger.register(&Actor::new("student", Role::Student), "ev-1").await.unwrap_err();
        assert_eq!(err, LedgerError::Unavailable);
    }

    #[tokio::test]
    async fn event_closed_by_the_store_is_invalid_transition() {
        let (ledger, _) = ledger(false);
        let err = ledger.register(&Actor::new("student", Role::Student), "ev-1").await.unwrap_err();
        assert_eq!(err, LedgerError::InvalidTransition("event is cancelled".into()));
    }

    #[tokio::test]
    async fn cancelled_registration_is_not_found_even_for_strangers() {
        let (ledger, registration) = ledger(false);
        ledger.registrations.transition(&registration.id, RegistrationStatus::Registered, RegistrationStatus::Cancelled, None).await.unwrap();
        let err = ledger.cancel(&Actor::new("stranger", Role::Student), &registration.id).await.unwrap_err();
        assert!(matches!(err, LedgerError::NotFound(_)));
    }

    #[tokio::test]
    async fn check_in_losing_race_to_cancel_is_invalid_transition() {
        let (ledger, registration) = ledger(false);
        let err = ledger
            .check_in(&Actor::new("organizer", Role::Organizer), &registration.id)
            .await
            .unwrap_err();
        assert!(matches!(err, LedgerError::InvalidTransition(_)));
    }

    #[tokio::test]
    async fn token_for_unknown_event_is_not_found() {
        let (ledger, registration) = ledger(false);
        let err = ledger
            .check_in_by_token(&Actor::new("organizer", Role::Organizer), "ev-2", &registration.check_in_token)
            .await
            .unwrap_err();
        assert!(matches!(err, LedgerError::NotFound(_)));
    }

    #[test]
    fn guards_follow_the_lifecycle() {
        assert!(cancel_guard(RegistrationStatus::Registered).is_ok());
        assert!(matches!(cancel_guard(RegistrationStatus::Cancelled), Err(LedgerError::NotFound(_))));
        assert!(matches!(cancel_guard(RegistrationStatus::CheckedIn), Err(LedgerError::InvalidTransition(_))));
        assert!(check_in_guard(RegistrationStatus::Registered).is_ok());
        assert!(matches!(check_in_guard(RegistrationStatus::CheckedIn), Err(LedgerError::InvalidTransition(_))));
        assert!(matches!(check_in_guard(RegistrationStatus::Cancelled), Err(LedgerError::InvalidTransition(_))));
    }
}
