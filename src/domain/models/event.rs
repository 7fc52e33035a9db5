use serde::{Deserialize, Serialize};
use chrono::{DateTime, Utc};
use sqlx::FromRow;
use std::fmt;
use std::str::FromStr;
use super::UnknownVariant;

pub const CATEGORIES: [&str; 6] = ["Tech", "Cultural", "Sports", "Workshop", "Music", "Academic"];

#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum EventStatus {
    Draft,
    Upcoming,
    Completed,
    Cancelled,
}

impl EventStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            EventStatus::Draft => "draft",
            EventStatus::Upcoming => "upcoming",
            EventStatus::Completed => "completed",
            EventStatus::Cancelled => "cancelled",
        }
    }

    pub fn accepts_registrations(&self) -> bool {
        !matches!(self, EventStatus::Completed | EventStatus::Cancelled)
    }

    /// Status changes an organizer may make. `has_registrations` blocks
    /// unpublishing an event people already signed up for.
    pub fn can_transition_to(&self, next: EventStatus, has_registrations: bool) -> bool {
        use EventStatus::*;
        match (*self, next) {
            (a, b) if a == b => true,
            (Draft, Upcoming) | (Draft, Cancelled) => true,
            (Upcoming, Completed) | (Upcoming, Cancelled) => true,
            (Upcoming, Draft) => !has_registrations,
            _ => false,
        }
    }
}

impl fmt::Display for EventStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for EventStatus {
    type Err = UnknownVariant;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "draft" => Ok(EventStatus::Draft),
            "upcoming" => Ok(EventStatus::Upcoming),
            "completed" => Ok(EventStatus::Completed),
            "cancelled" => Ok(EventStatus::Cancelled),
            other => Err(UnknownVariant { kind: "event status", value: other.to_string() }),
        }
    }
}

impl TryFrom<String> for EventStatus {
    type Error = UnknownVariant;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

#[derive(Debug, Serialize, Deserialize, FromRow, Clone)]
pub struct Event {
    pub id: String,
    pub title: String,
    pub description: String,
    pub short_description: Option<String>,
    pub category: String,
    pub location: String,
    pub starts_at: DateTime<Utc>,
    pub ends_at: DateTime<Utc>,
    pub image_url: Option<String>,
    pub capacity: Option<i64>,
    #[sqlx(try_from = "String")]
    pub status: EventStatus,
    pub featured: bool,
    pub organizer_id: String,
    pub created_at: DateTime<Utc>,
}

/// Public catalog query. Drafts are never listed.
#[derive(Debug, Default, Clone, Deserialize)]
pub struct EventFilter {
    pub category: Option<String>,
    pub search: Option<String>,
}

impl EventFilter {
    /// Lower-cased `%term%` pattern for the search, if any. LIKE wildcards in
    /// the term are escaped with `\`, matching `ESCAPE '\'` in the queries.
    pub fn search_pattern(&self) -> Option<String> {
        self.search
            .as_deref()
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(|s| {
                let escaped = s
                    .to_lowercase()
                    .replace('\\', "\\\\")
                    .replace('%', "\\%")
                    .replace('_', "\\_");
                format!("%{}%", escaped)
            })
    }

    pub fn category(&self) -> Option<&str> {
        self.category.as_deref().filter(|c| !c.is_empty() && *c != "All")
    }
}
