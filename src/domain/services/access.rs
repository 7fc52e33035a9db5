//! The one place that decides whether an actor may perform an action.
//! Every mutating operation goes through [`authorize`] before touching the
//! store, and every refusal comes back as `LedgerError::Unauthorized`.

use crate::domain::models::{event::Event, registration::Registration, user::{Actor, Role}};
use crate::error::LedgerError;

#[derive(Debug, Clone, Copy)]
pub enum Capability<'a> {
    CreateEvent,
    /// Edit the event, see its attendees, check people in.
    ManageEvent(&'a Event),
    CancelRegistration(&'a Registration),
    Administer,
}

pub fn authorize(actor: &Actor, capability: Capability<'_>) -> Result<(), LedgerError> {
    let allowed = match capability {
        Capability::CreateEvent => matches!(actor.role, Role::Organizer | Role::Admin),
        Capability::ManageEvent(event) => actor.is_admin() || event.organizer_id == actor.id,
        Capability::CancelRegistration(registration) => registration.user_id == actor.id,
        Capability::Administer => actor.is_admin(),
    };

    if allowed {
        Ok(())
    } else {
        Err(LedgerError::Unauthorized(describe(capability).to_string()))
    }
}

fn describe(capability: Capability<'_>) -> &'static str {
    match capability {
        Capability::CreateEvent => "only organizers and admins can create events",
        Capability::ManageEvent(_) => "only the event organizer or an admin can manage this event",
        Capability::CancelRegistration(_) => "only the registrant can cancel this registration",
        Capability::Administer => "admin role required",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::models::event::EventStatus;
    use chrono::Utc;

    fn event_owned_by(organizer_id: &str) -> Event {
        Event {
            id: "ev-1".into(),
            title: "Hackathon".into(),
            description: "24h".into(),
            short_description: None,
            category: "Tech".into(),
            location: "Main Hall".into(),
            starts_at: Utc::now(),
            ends_at: Utc::now(),
            image_url: None,
            capacity: Some(10),
            status: EventStatus::Upcoming,
            featured: false,
            organizer_id: organizer_id.into(),
            created_at: Utc::now(),
        }
    }

    #[test]
    fn students_cannot_create_events() {
        assert!(authorize(&Actor::new("s", Role::Student), Capability::CreateEvent).is_err());
        assert!(authorize(&Actor::new("o", Role::Organizer), Capability::CreateEvent).is_ok());
        assert!(authorize(&Actor::new("a", Role::Admin), Capability::CreateEvent).is_ok());
    }

    #[test]
    fn only_owner_or_admin_manage_event() {
        let event = event_owned_by("owner");
        assert!(authorize(&Actor::new("owner", Role::Organizer), Capability::ManageEvent(&event)).is_ok());
        assert!(authorize(&Actor::new("root", Role::Admin), Capability::ManageEvent(&event)).is_ok());

        let err = authorize(&Actor::new("other", Role::Organizer), Capability::ManageEvent(&event)).unwrap_err();
        assert!(matches!(err, LedgerError::Unauthorized(_)));
    }

    #[test]
    fn admins_cannot_cancel_for_others() {
        let registration = Registration::new("ev-1".into(), "student".into());
        assert!(authorize(&Actor::new("student", Role::Student), Capability::CancelRegistration(&registration)).is_ok());
        assert!(authorize(&Actor::new("root", Role::Admin), Capability::CancelRegistration(&registration)).is_err());
    }
}
