use serde::{Deserialize, Serialize};
use uuid::Uuid;
use chrono::{DateTime, Utc};
use sqlx::FromRow;
use rand::{distributions::Alphanumeric, Rng};
use std::fmt;
use std::str::FromStr;
use super::{event::EventStatus, UnknownVariant};

pub const CHECK_IN_TOKEN_LEN: usize = 48;

#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum RegistrationStatus {
    Registered,
    Cancelled,
    CheckedIn,
}

impl RegistrationStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            RegistrationStatus::Registered => "registered",
            RegistrationStatus::Cancelled => "cancelled",
            RegistrationStatus::CheckedIn => "checked_in",
        }
    }

    /// Active registrations hold a capacity slot.
    pub fn is_active(&self) -> bool {
        !matches!(self, RegistrationStatus::Cancelled)
    }
}

impl fmt::Display for RegistrationStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for RegistrationStatus {
    type Err = UnknownVariant;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "registered" => Ok(RegistrationStatus::Registered),
            "cancelled" => Ok(RegistrationStatus::Cancelled),
            "checked_in" => Ok(RegistrationStatus::CheckedIn),
            other => Err(UnknownVariant { kind: "registration status", value: other.to_string() }),
        }
    }
}

impl TryFrom<String> for RegistrationStatus {
    type Error = UnknownVariant;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

#[derive(Debug, Serialize, Deserialize, FromRow, Clone)]
pub struct Registration {
    pub id: String,
    pub event_id: String,
    pub user_id: String,
    #[sqlx(try_from = "String")]
    pub status: RegistrationStatus,
    pub check_in_token: String,
    pub created_at: DateTime<Utc>,
    pub checked_in_at: Option<DateTime<Utc>>,
}

impl Registration {
    pub fn new(event_id: String, user_id: String) -> Self {
        let token: String = rand::thread_rng()
            .sample_iter(&Alphanumeric)
            .take(CHECK_IN_TOKEN_LEN)
            .map(char::from)
            .collect();

        Self {
            id: Uuid::new_v4().to_string(),
            event_id,
            user_id,
            status: RegistrationStatus::Registered,
            check_in_token: token,
            created_at: Utc::now(),
            checked_in_at: None,
        }
    }
}

/// Result of the store's atomic capacity-checked insert. Capacity and status
/// are the values the store held when it decided.
#[derive(Debug, Clone)]
pub enum InsertOutcome {
    Inserted(Registration),
    Duplicate,
    CapacityExceeded,
    EventClosed(EventStatus),
}

/// Organizer view: a registration plus who holds it.
#[derive(Debug, Serialize, FromRow, Clone)]
pub struct Attendee {
    #[sqlx(flatten)]
    #[serde(flatten)]
    pub registration: Registration,
    pub full_name: String,
    pub email: String,
}

/// Dashboard view: a registration plus the event it belongs to.
#[derive(Debug, Serialize, FromRow, Clone)]
pub struct RegistrationWithEvent {
    #[sqlx(flatten)]
    #[serde(flatten)]
    pub registration: Registration,
    pub event_title: String,
    pub event_location: String,
    pub event_starts_at: DateTime<Utc>,
    pub event_ends_at: DateTime<Utc>,
    #[sqlx(try_from = "String")]
    pub event_status: EventStatus,
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn new_registration_is_registered_with_url_safe_token() {
        let reg = Registration::new("event".into(), "user".into());
        assert_eq!(reg.status, RegistrationStatus::Registered);
        assert!(reg.checked_in_at.is_none());
        assert_eq!(reg.check_in_token.len(), CHECK_IN_TOKEN_LEN);
        assert!(reg.check_in_token.chars().all(|c| c.is_ascii_alphanumeric()));
    }

    #[test]
    fn tokens_are_not_reused() {
        let tokens: HashSet<String> = (0..500)
            .map(|_| Registration::new("event".into(), "user".into()).check_in_token)
            .collect();
        assert_eq!(tokens.len(), 500);
    }

    #[test]
    fn status_round_trips_through_storage_text() {
        for status in [RegistrationStatus::Registered, RegistrationStatus::Cancelled, RegistrationStatus::CheckedIn] {
            assert_eq!(RegistrationStatus::try_from(status.as_str().to_string()).unwrap(), status);
        }
        assert!("attended".parse::<RegistrationStatus>().is_err());
    }
}
