use serde::Serialize;
use crate::domain::models::event::Event;

#[derive(Serialize)]
pub struct EventDetailResponse {
    #[serde(flatten)]
    pub event: Event,
    pub active_count: i64,
    pub spots_left: Option<i64>,
}

impl EventDetailResponse {
    pub fn new(event: Event, active_count: i64) -> Self {
        let spots_left = event.capacity.map(|c| (c - active_count).max(0));
        Self { event, active_count, spots_left }
    }
}

#[derive(Serialize)]
pub struct StatsResponse {
    pub users: i64,
    pub events: i64,
    pub registrations: i64,
}
