use crate::domain::{models::event::{Event, EventFilter}, ports::EventRepository};
use crate::error::AppError;
use async_trait::async_trait;
use sqlx::{PgPool, Row};

pub struct PostgresEventRepo {
    pool: PgPool,
}

impl PostgresEventRepo {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl EventRepository for PostgresEventRepo {
    async fn create(&self, event: &Event) -> Result<Event, AppError> {
        sqlx::query_as::<_, Event>(
            r#"INSERT INTO events (
                id, title, description, short_description, category, location,
                starts_at, ends_at, image_url, capacity, status, featured, organizer_id, created_at
            ) VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14)
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
        sqlx::query_as::<_, Event>("SELECT * FROM events WHERE id = $1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await
            .map_err(AppError::Database)
    }

    async fn list(&self, filter: &EventFilter) -> Result<Vec<Event>, AppError> {
        sqlx::query_as::<_, Event>(
            r#"SELECT * FROM events
               WHERE status <> 'draft'
                 AND ($1::text IS NULL OR category = $1)
                 AND ($2::text IS NULL OR title ILIKE $2 ESCAPE '\' OR description ILIKE $2 ESCAPE '\')
               ORDER BY starts_at ASC"#
        )
            .bind(filter.category())
            .bind(filter.search_pattern())
            .fetch_all(&self.pool)
            .await
            .map_err(AppError::Database)
    }

    async fn list_by_organizer(&self, organizer_id: &str) -> Result<Vec<Event>, AppError> {
        sqlx::query_as::<_, Event>("SELECT * FROM events WHERE organizer_id = $1 ORDER BY starts_at DESC")
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

    async fn update(&self, event: &Event, require_no_registrations: bool) -> Result<Option<Event>, AppError> {
        let mut tx = self.pool.begin().await.map_err(AppError::Database)?;

        // Same row lock the registration insert takes; the count below then
        // sees every registration committed before we got the lock.
        sqlx::query("SELECT id FROM events WHERE id = $1 FOR UPDATE")
            .bind(&event.id)
            .fetch_optional(&mut *tx)
            .await
            .map_err(AppError::Database)?
            .ok_or_else(|| AppError::NotFound("Event not found".into()))?;

        if require_no_registrations {
            let registrations: i64 = sqlx::query("SELECT COUNT(*) as count FROM registrations WHERE event_id = $1")
                .bind(&event.id)
                .fetch_one(&mut *tx)
                .await
                .map_err(AppError::Database)?
                .get("count");
            if registrations > 0 {
                return Ok(None);
            }
        }

        let updated = sqlx::query_as::<_, Event>(
            r#"UPDATE events SET
                title=$1, description=$2, short_description=$3, category=$4, location=$5,
                starts_at=$6, ends_at=$7, image_url=$8, capacity=$9, status=$10, featured=$11
               WHERE id=$12 RETURNING *"#
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
            .fetch_one(&mut *tx)
            .await
            .map_err(AppError::Database)?;

        tx.commit().await.map_err(AppError::Database)?;
        Ok(Some(updated))
    }

    async fn count(&self) -> Result<i64, AppError> {
        let row = sqlx::query("SELECT COUNT(*) as count FROM events")
            .fetch_one(&self.pool)
            .await
            .map_err(AppError::Database)?;
        Ok(row.get::<i64, _>("count"))
    }
}
