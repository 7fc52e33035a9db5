use crate::domain::{models::event::{Event, EventFilter}, ports::EventRepository};
use crate::error::AppError;
use async_trait::async_trait;
use sqlx::{SqlitePool, Row};

pub struct SqliteEventRepo {
    pool: SqlitePool,
}

impl SqliteEventRepo {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl EventRepository for SqliteEventRepo {
    async fn create(&self, event: &Event) -> Result<Event, AppError> {
        sqlx::query_as::<_, Event>(
            r#"INSERT INTO events (
                id, title, description, short_description, category, location,
                starts_at, ends_at, image_url, capacity, status, featured, organizer_id, created_at
            ) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
            RETURNING *"#
        )
            .bind(&event.id)
            .bind(&event.title)
            .bind(&event.description)
            .bind(&event.short_description)
            .bind(&event.category)
            .bind(&event.location)
            .bind(event.starts_at)
            .bind(event.ends_at)
            .bind(&event.image_url)
            .bind(event.capacity)
            .bind(event.status.as_str())
            .bind(event.featured)
            .bind(&event.organizer_id)
            .bind(event.created_at)
            .fetch_one(&self.pool)
            .await
            .map_err(AppError::Database)
    }

    async fn find_by_id(&self, id: &str) -> Result<Option<Event>, AppError> {
        sqlx::query_as::<_, Event>("SELECT * FROM events WHERE id = ?")
            .bind(id)
            .fetch_optional(&self.pool)
            .await
            .map_err(AppError::Database)
    }

    async fn list(&self, filter: &EventFilter) -> Result<Vec<Event>, AppError> {
        let category = filter.category();
        let pattern = filter.search_pattern();
        sqlx::query_as::<_, Event>(
            r#"SELECT * FROM events
               WHERE status <> 'draft'
                 AND (? IS NULL OR category = ?)
                 AND (? IS NULL OR LOWER(title) LIKE ? ESCAPE '\' OR LOWER(description) LIKE ? ESCAPE '\')
               ORDER BY starts_at ASC"#
        )
            .bind(category)
            .bind(category)
            .bind(&pattern)
            .bind(&pattern)
            .bind(&pattern)
            .fetch_all(&self.pool)
            .await
            .map_err(AppError::Database)
    }

    async fn list_by_organizer(&self, organizer_id: &str) -> Result<Vec<Event>, AppError> {
        sqlx::query_as::<_, Event>("SELECT * FROM events WHERE organizer_id = ? ORDER BY starts_at DESC")
            .bind(organizer_id)
            .fetch_all(&self.pool)
            .await
            .map_err(AppError::Database)
    }

    async fn list_all(&self) -> Result<Vec<Event>, AppError> {
        sqlx::query_as::<_, Event>("SELECT * FROM events ORDER BY created_at DESC")
            .fetch_all(&self.pool)
            .await
            .map_err(AppError::Database)
    }

    // One statement under SQLite's write lock, so the registration check and
    // the write cannot be split by a concurrent registration insert.
    async fn update(&self, event: &Event, require_no_registrations: bool) -> Result<Option<Event>, AppError> {
        sqlx::query_as::<_, Event>(
            r#"UPDATE events SET
                title=?, description=?, short_description=?, category=?, location=?,
                starts_at=?, ends_at=?, image_url=?, capacity=?, status=?, featured=?
               WHERE id=?
                 AND (? = 0 OR NOT EXISTS (SELECT 1 FROM registrations WHERE event_id = events.id))
               RETURNING *"#
        )
            .bind(&event.title)
            .bind(&event.description)
            .bind(&event.short_description)
            .bind(&event.category)
            .bind(&event.location)
            .bind(event.starts_at)
            .bind(event.ends_at)
            .bind(&event.image_url)
            .bind(event.capacity)
            .bind(event.status.as_str())
            .bind(event.featured)
            .bind(&event.id)
            .bind(require_no_registrations)
            .fetch_optional(&self.pool)
            .await
            .map_err(AppError::Database)
    }

    async fn count(&self) -> Result<i64, AppError> {
        let row = sqlx::query("SELECT COUNT(*) as count FROM events")
            .fetch_one(&self.pool)
            .await
            .map_err(AppError::Database)?;
        Ok(row.get::<i64, _>("count"))
    }
}
