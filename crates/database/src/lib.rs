//! Roster Database Crate
//!
//! Connection management, embedded migrations, the attendee entity and its
//! repository, plus the seeding helpers used by the CLI.

use roster_config::DatabaseConfig;
use sqlx::SqlitePool;

pub mod connection;
pub mod entities;
pub mod migrations;
pub mod repos;
pub mod seed;
pub mod types;

pub use connection::prepare_database;
pub use entities::{Attendee, AttendeePatch, NewAttendee};
pub use migrations::run_migrations;
pub use repos::AttendeeRepository;
pub use seed::{generate_seed_rows, seed_attendees, DEFAULT_SEED_COUNT};
pub use types::{errors::DatabaseError, DatabaseResult};

/// Connect to the configured store and bring the schema up to date.
pub async fn initialize_database(config: &DatabaseConfig) -> DatabaseResult<SqlitePool> {
    let pool = prepare_database(config)
        .await
        .map_err(|e| DatabaseError::ConnectionError(format!("{e:#}")))?;

    run_migrations(&pool)
        .await
        .map_err(|e| DatabaseError::MigrationError(format!("{e:#}")))?;

    Ok(pool)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    async fn create_test_database() -> (SqlitePool, TempDir) {
        let temp_dir = TempDir::new().unwrap();
        let db_path = temp_dir.path().join("test.db");

        let config = DatabaseConfig {
            url: format!("sqlite:{}", db_path.display()),
            max_connections: 1,
        };

        let pool = initialize_database(&config).await.unwrap();
        (pool, temp_dir)
    }

    #[tokio::test]
    async fn test_database_initialization_creates_attendees_table() {
        let (pool, _temp_dir) = create_test_database().await;

        let (count,): (i64,) = sqlx::query_as("SELECT COUNT(*) FROM attendees")
            .fetch_one(&pool)
            .await
            .unwrap();

        assert_eq!(count, 0);
    }

    #[tokio::test]
    async fn test_foreign_keys_enabled() {
        let (pool, _temp_dir) = create_test_database().await;

        let result: (bool,) = sqlx::query_as("PRAGMA foreign_keys")
            .fetch_one(&pool)
            .await
            .unwrap();

        assert!(result.0);
    }

    #[tokio::test]
    async fn test_unreachable_path_reports_connection_error() {
        let temp_dir = TempDir::new().unwrap();
        let blocker = temp_dir.path().join("not-a-dir");
        std::fs::write(&blocker, b"file").unwrap();

        let config = DatabaseConfig {
            url: format!("sqlite://{}/nested/roster.db", blocker.display()),
            max_connections: 1,
        };

        let err = initialize_database(&config).await.unwrap_err();
        assert!(matches!(err, DatabaseError::ConnectionError(_)));
    }
}
