use chrono::{DateTime, Utc};
use serde::Deserialize;
use crate::domain::models::event::EventStatus;

#[derive(Deserialize)]
pub struct SignupRequest {
    pub username: String,
    pub password: String,
    pub full_name: String,
    pub email: String,
}

#[derive(Deserialize)]
pub struct LoginRequest {
    pub username: String,
    pub password: String,
}

#[derive(Deserialize)]
pub struct CreateEventRequest {
    pub title: String,
    pub description: String,
    pub short_description: Option<String>,
    pub category: String,
    pub location: String,
    pub starts_at: DateTime<Utc>,
    pub ends_at: DateTime<Utc>,
    pub image_url: Option<String>,
    pub capacity: Option<i64>,
    pub status: Option<EventStatus>,
    pub featured: Option<bool>,
}

/// Partial update; absent fields keep their value. `capacity: null` lifts
/// the limit, an absent `capacity` leaves it alone.
#[derive(Deserialize)]
pub struct UpdateEventRequest {
    pub title: Option<String>,
    pub description: Option<String>,
    pub short_description: Option<String>,
    pub category: Option<String>,
    pub location: Option<String>,
    pub starts_at: Option<DateTime<Utc>>,
    pub ends_at: Option<DateTime<Utc>>,
    pub image_url: Option<String>,
    #[serde(default, deserialize_with = "double_option")]
    pub capacity: Option<Option<i64>>,
    pub status: Option<EventStatus>,
    pub featured: Option<bool>,
}

#[derive(Deserialize)]
pub struct CheckInByTokenRequest {
    pub token: String,
}

#[derive(Deserialize)]
pub struct AssignRoleRequest {
    pub role: String,
}

fn double_option<'de, D, T>(deserializer: D) -> Result<Option<Option<T>>, D::Error>
where
    D: serde::Deserializer<'de>,
    T: Deserialize<'de>,
{
    Option::<T>::deserialize(deserializer).map(Some)
}
