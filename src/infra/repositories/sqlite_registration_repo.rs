use crate::domain::{
    models::event::EventStatus,
    models::registration::{Attendee, InsertOutcome, Registration, RegistrationStatus, RegistrationWithEvent},
    ports::RegistrationRepository,
};
use crate::error::AppError;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::{SqlitePool, Row};
use tracing::debug;

pub struct SqliteRegistrationRepo {
    pool: SqlitePool,
}

impl SqliteRegistrationRepo {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// The guard rejected the row; work out which condition failed.
    async fn classify_rejection(&self, registration: &Registration) -> Result<InsertOutcome, AppError> {
        let row = sqlx::query("SELECT status FROM events WHERE id = ?")
            .bind(&registration.event_id)
            .fetch_optional(&self.pool)
            .await
            .map_err(AppError::Database)?
            .ok_or_else(|| AppError::NotFound("Event not found".into()))?;

        let status: EventStatus = row.get::<String, _>("status").parse().map_err(|_| AppError::Internal)?;
        if !status.accepts_registrations() {
            return Ok(InsertOutcome::EventClosed(status));
        }

        if self.find_active(&registration.event_id, &registration.user_id).await?.is_some() {
            Ok(InsertOutcome::Duplicate)
        } else {
            Ok(InsertOutcome::CapacityExceeded)
        }
    }
}

#[async_trait]
impl RegistrationRepository for SqliteRegistrationRepo {
    // SQLite serializes writers, so the guarded INSERT ... SELECT reads the
    // event row and the active count under the write lock. Nothing can slip
    // in between the check and the insert, including a capacity or status edit.
    async fn insert_within_capacity(&self, registration: &Registration) -> Result<InsertOutcome, AppError> {
        let inserted = sqlx::query_as::<_, Registration>(
            r#"INSERT INTO registrations (id, event_id, user_id, status, check_in_token, created_at, checked_in_at)
               SELECT ?, e.id, ?, ?, ?, ?, NULL
               FROM events e
               WHERE e.id = ?
                 AND e.status NOT IN ('completed', 'cancelled')
                 AND NOT EXISTS (
                       SELECT 1 FROM registrations
                       WHERE event_id = e.id AND user_id = ? AND status <> 'cancelled')
                 AND (e.capacity IS NULL OR (
                       SELECT COUNT(*) FROM registrations
                       WHERE event_id = e.id AND status <> 'cancelled') < e.capacity)
               RETURNING *"#
        )
            .bind(&registration.id)
            .bind(&registration.user_id)
            .bind(registration.status.as_str())
            .bind(&registration.check_in_token)
            .bind(registration.created_at)
            .bind(&registration.event_id)
            .bind(&registration.user_id)
            .fetch_optional(&self.pool)
            .await;

        match inserted {
            Ok(Some(created)) => Ok(InsertOutcome::Inserted(created)),
            Ok(None) => self.classify_rejection(registration).await,
            Err(e) => {
                let err = AppError::Database(e);
                if err.is_unique_violation() {
                    debug!("Registration insert hit the active-registration index");
                    Ok(InsertOutcome::Duplicate)
                } else {
                    Err(err)
                }
            }
        }
    }

    async fn find_by_id(&self, id: &str) -> Result<Option<Registration>, AppError> {
        sqlx::query_as::<_, Registration>("SELECT * FROM registrations WHERE id = ?")
            .bind(id)
            .fetch_optional(&self.pool)
            .await
            .map_err(AppError::Database)
    }

    async fn find_by_token(&self, token: &str) -> Result<Option<Registration>, AppError> {
        sqlx::query_as::<_, Registration>("SELECT * FROM registrations WHERE check_in_token = ?")
            .bind(token)
            .fetch_optional(&self.pool)
            .await
            .map_err(AppError::Database)
    }

    async fn find_active(&self, event_id: &str, user_id: &str) -> Result<Option<Registration>, AppError> {
        sqlx::query_as::<_, Registration>(
            "SELECT * FROM registrations WHERE event_id = ? AND user_id = ? AND status <> 'cancelled'"
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
               WHERE r.event_id = ?
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
               WHERE r.user_id = ? AND r.status <> 'cancelled'
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
               SET status = ?, checked_in_at = COALESCE(?, checked_in_at)
               WHERE id = ? AND status = ?
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
        let row = sqlx::query("SELECT COUNT(*) as count FROM registrations WHERE event_id = ? AND status <> 'cancelled'")
            .bind(event_id)
            .fetch_one(&self.pool)
            .await
            .map_err(AppError::Database)?;
        Ok(row.get::<i64, _>("count"))
    }

    async fn count_for_event(&self, event_id: &str) -> Result<i64, AppError> {
        let row = sqlx::query("SELECT COUNT(*) as count FROM registrations WHERE event_id = ?")
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
