use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;
use sqlx::{postgres::{PgPoolOptions, PgConnectOptions}, sqlite::{SqlitePoolOptions, SqliteJournalMode, SqliteConnectOptions}};
use sqlx::{PgPool, SqlitePool, ConnectOptions};
use tracing::{info, warn};
use tracing::log::LevelFilter;

use crate::config::Config;
use crate::state::AppState;
use crate::domain::models::user::{Role, User};
use crate::error::AppError;
use crate::infra::repositories::{
    postgres_auth_repo::PostgresAuthRepo, postgres_event_repo::PostgresEventRepo,
    postgres_registration_repo::PostgresRegistrationRepo, postgres_user_repo::PostgresUserRepo,
    sqlite_auth_repo::SqliteAuthRepo, sqlite_event_repo::SqliteEventRepo,
    sqlite_registration_repo::SqliteRegistrationRepo, sqlite_user_repo::SqliteUserRepo,
};

pub async fn bootstrap_state(config: &Config) -> AppState {
    let database_url = &config.database_url;

    let state = if database_url.starts_with("postgres://") || database_url.starts_with("postgresql://") {
        info!("Initializing PostgreSQL connection...");

        let mut opts: PgConnectOptions = database_url.parse().expect("Invalid Postgres URL");
        opts = opts.log_statements(LevelFilter::Debug)
            .log_slow_statements(LevelFilter::Warn, Duration::from_millis(500));

        let pool = PgPoolOptions::new()
            .max_connections(10)
            .acquire_timeout(config.store_timeout)
            .connect_with(opts)
            .await
            .expect("Failed to connect to Postgres");

        run_postgres_migrations(&pool).await;
        postgres_state(pool, config.clone())
    } else {
        info!("Initializing SQLite connection with WAL Mode...");

        let opts = SqliteConnectOptions::from_str(database_url)
            .expect("Invalid SQLite connection string")
            .create_if_missing(true)
            .journal_mode(SqliteJournalMode::Wal)
            .busy_timeout(Duration::from_secs(5))
            .log_statements(LevelFilter::Debug)
            .log_slow_statements(LevelFilter::Warn, Duration::from_millis(500));

        let pool = SqlitePoolOptions::new()
            .max_connections(5)
            .acquire_timeout(config.store_timeout)
            .connect_with(opts)
            .await
            .expect("Failed to connect to SQLite");

        run_sqlite_migrations(&pool).await;
        sqlite_state(pool, config.clone())
    };

    if let Err(e) = seed_bootstrap_admin(&state).await {
        warn!("Could not seed bootstrap admin: {}", e);
    }

    state
}

pub fn sqlite_state(pool: SqlitePool, config: Config) -> AppState {
    AppState::new(
        config,
        Arc::new(SqliteUserRepo::new(pool.clone())),
        Arc::new(SqliteAuthRepo::new(pool.clone())),
        Arc::new(SqliteEventRepo::new(pool.clone())),
        Arc::new(SqliteRegistrationRepo::new(pool)),
    )
}

pub fn postgres_state(pool: PgPool, config: Config) -> AppState {
    AppState::new(
        config,
        Arc::new(PostgresUserRepo::new(pool.clone())),
        Arc::new(PostgresAuthRepo::new(pool.clone())),
        Arc::new(PostgresEventRepo::new(pool.clone())),
        Arc::new(PostgresRegistrationRepo::new(pool)),
    )
}

/// Creates the configured admin account on first start. An existing user
/// with that name is left alone.
pub async fn seed_bootstrap_admin(state: &AppState) -> Result<(), AppError> {
    let Some((username, password)) = &state.config.bootstrap_admin else {
        return Ok(());
    };

    if state.user_repo.find_by_username(username).await?.is_some() {
        return Ok(());
    }

    let password_hash = state.auth_service.hash_password(password)?;
    let mut admin = User::new(
        username.clone(),
        "Administrator".to_string(),
        format!("{}@campus-events.local", username),
        password_hash,
    );
    admin.role = Role::Admin;

    state.user_repo.create(&admin).await?;
    info!(user_id = %admin.id, "Bootstrap admin created: {}", username);
    Ok(())
}

pub async fn run_postgres_migrations(pool: &PgPool) {
    sqlx::migrate!("./migrations/postgres")
        .run(pool)
        .await
        .expect("Failed to run Postgres migrations");
}

pub async fn run_sqlite_migrations(pool: &SqlitePool) {
    sqlx::migrate!("./migrations/sqlite")
        .run(pool)
        .await
        .expect("Failed to run SQLite migrations");
}
