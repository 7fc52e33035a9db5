use crate::domain::{
    models::event::EventStatus,
    models::registration::{Attendee, InsertOutcome, Registration, RegistrationStatus, RegistrationWithEvent},
    ports::RegistrationRepository,
};
use crate::error::AppError;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::{PgPool, Row};
use tracing::debug;

pub struct PostgresRegistrationRepo {
    pool: PgPool,
}

impl PostgresRegistrationRepo {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl RegistrationRepository for PostgresRegistrationRepo {
    async fn insert_within_capacity(&self, registration: &Registration) -> Result<InsertOutcome, AppError> {
        let mut tx = self.pool.begin().await.map_err(AppError::Database)?;

        // Row lock on the event serializes every registration attempt and
        // every guarded edit for it. Under READ COMMITTED each statement below
        // sees the latest commits, and the locked row carries the live
        // capacity and status.
        let event = sqlx::query("SELECT capacity, status FROM events WHERE id = $1 FOR UPDATE")
            .bind(&registration.event_id)
            .fetch_optional(&mut *tx)
            .await
            .map_err(AppError::Database)?
            .ok_or_else(|| AppError::NotFound("Event not found".into()))?;

        let capacity: Option<i64> = event.get("capacity");
        let status: EventStatus = event.get::<String, _>("status").parse().map_err(|_| AppError::Internal)?;
        if !status.accepts_registrations() {
            return Ok(InsertOutcome::EventClosed(status));
        }

        let existing = sqlx::query(
            "SELECT 1 FROM registrations WHERE event_id = $1 AND user_id = $2 AND status <> 'cancelled'"
        )
            .bind(&registration.event_id)
            .bind(&registration.user_id)
            .fetch_optional(&mut *tx)
            .await
            .map_err(AppError::Database)?;
        if existing.is_some() {
            return Ok(InsertOutcome::Duplicate);
        }

        if let Some(capacity) = capacity {
            let active: i64 = sqlx::query("SELECT COUNT(*) as count FROM registrations WHERE event_id = $1 AND status <> 'cancelled'")
                .bind(&registration.event_id)
                .fetch_one(&mut *tx)
                .await
                .map_err(AppError::Database)?
                .get("count");
            if active >= capacity {
                return Ok(InsertOutcome::CapacityExceeded);
            }
        }

        let inserted = sqlx::query_as::<_, Registration>(
            r#"INSERT INTO registrations (id, event_id, user_id, status, check_in_token, created_at, checked_in_at)
               VALUES ($1, $2, $3, $4, $5, $6, NULL)
               RETURNING *"#
        )
            .bind(&registration.id)
            .bind(&registration.event_id)
            .bind(&registration.user_id)
            .bind(registration.status.as_str())
            .bind(&registration.check_in_token)
            .bind(registration.created_at)
            .fetch_one(&mut *tx)
            .await;

        let created = match inserted {
            Ok(created) => created,
            Err(e) if crate::error::is_unique_violation(&e) => {
                debug!("Registration insert hit the active-registration index");
                return Ok(InsertOutcome::Duplicate);
            }
            Err(e) => return Err(AppError::Database(e)),
        };

        tx.commit().await.map_err(AppError::Database)?;
        Ok(InsertOutcome::Inserted(created))
    }

    async fn find_by_id(&self, id: &str) -> Result<Option<Registration>, AppError> {
        sqlx::query_as::<_, Registration>("SELECT * FROM registrations WHERE id = $1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await
            .map_err(AppError::Database)
    }

    async fn find_by_token(&self, token: &str) -> Result<Option<Registration>, AppError> {
        sqlx::query_as::<_, Registration>("SELECT * FROM registrations WHERE check_in_token = $1")
            .bind(token)
            .fetch_optional(&self.pool)
            .await
            .map_err(AppError::Database)
    }

    async fn find_active(&self, event_id: &str, user_id: &str) -> Result<Option<Registration>, AppError> {
        sqlx::query_as::<_, Registration>(
            "SELECT * FROM registrations WHERE event_id = $1 AND user_id = $2 AND status <> 'cancelled'"
        )
            .bind(event_id)
            .bind(user_id)
            .fetch_optional(&self.pool)
            .await
            .map_err(AppError::Database)
    }

    async fn list_by_event(&self, event_id: &str) -> Result<Vec<Attendee>, AppError> {
        sqlx::query_as::<_, Attendee>(
            r#"SELECT r.*, u.full_name, u.email
               FROM registrations r
               JOIN users u ON u.id = r.user_id
               WHERE r.event_id = $1
               ORDER BY r.created_at ASC"#
        )
            .bind(event_id)
            .fetch_all(&self.pool)
            .await
            .map_err(AppError::Database)
    }

    async fn list_active_by_user(&self, user_id: &str) -> Result<Vec<RegistrationWithEvent>, AppError> {
        sqlx::query_as::<_, RegistrationWithEvent>(
            r#"SELECT r.*,
                      e.title AS event_title,
                      e.location AS event_location,
                      e.starts_at AS event_starts_at,
                      e.ends_at AS event_ends_at,
                      e.status AS event_status
               FROM registrations r
               JOIN events e ON e.id = r.event_id
               WHERE r.user_id = $1 AND r.status <> 'cancelled'
               ORDER BY r.created_at DESC"#
        )
            .bind(user_id)
            .fetch_all(&self.pool)
            .await
            .map_err(AppError::Database)
    }

    async fn transition(
        &self,
        id: &str,
        from: RegistrationStatus,
        to: RegistrationStatus,
        checked_in_at: Option<DateTime<Utc>>,
    ) -> Result<Option<Registration>, AppError> {
        sqlx::query_as::<_, Registration>(
            r#"UPDATE registrations
               SET status = $1, checked_in_at = COALESCE($2, checked_in_at)
               WHERE id = $3 AND status = $4
               RETURNING *"#
        )
            .bind(to.as_str())
            .bind(checked_in_at)
            .bind(id)
            .bind(from.as_str())
            .fetch_optional(&self.pool)
            .await
            .map_err(AppError::Database)
    }

    async fn count_active(&self, event_id: &str) -> Result<i64, AppError> {
        let row = sqlx::query("SELECT COUNT(*) as count FROM registrations WHERE event_id = $1 AND status <> 'cancelled'")
            .bind(event_id)
            .fetch_one(&self.pool)
            .await
            .map_err(AppError::Database)?;
        Ok(row.get::<i64, _>("count"))
    }

    async fn count_for_event(&self, event_id: &str) -> Result<i64, AppError> {
        let row = sqlx::query("SELECT COUNT(*) as count FROM registrations WHERE event_id = $1")
            .bind(event_id)
            .fetch_one(&self.pool)
            .await
            .map_err(AppError::Database)?;
        Ok(row.get::<i64, _>("count"))
    }

    async fn count(&self) -> Result<i64, AppError> {
        let row = sqlx::query("SELECT COUNT(*) as count FROM registrations")
            .fetch_one(&self.pool)
            .await
            .map_err(AppError::Database)?;
        Ok(row.get::<i64, _>("count"))
    }
}
