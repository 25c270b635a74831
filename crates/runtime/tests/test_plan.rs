use std::path::Path;

use anyhow::{Context, Result};
use roster_backend_runtime::BackendServices;
use roster_config::AppConfig;
use serde_json::json;
use tempfile::TempDir;
use tokio::net::TcpListener;

fn sqlite_url(path: &Path) -> String {
    format!("sqlite://{}", path.to_string_lossy())
}

fn build_config(database_url: String, max_connections: u32) -> AppConfig {
    let mut config = AppConfig::default();
    config.database.url = database_url;
    config.database.max_connections = max_connections;
    config.chat.api_key = Some("unit-test-key".into());
    config
}

async fn initialise(config: &AppConfig) -> Result<BackendServices> {
    BackendServices::initialise(config)
        .await
        .context("failed to initialise backend services")
}

#[tokio::test(flavor = "multi_thread")]
async fn initialise_runs_migrations_and_wires_tools() -> Result<()> {
    let temp_dir = TempDir::new()?;
    let db_path = temp_dir.path().join("runtime/init.db");
    let config = build_config(sqlite_url(&db_path), 4);

    let services = initialise(&config).await?;
    let table: String = sqlx::query_scalar(
        "SELECT name FROM sqlite_master WHERE type = 'table' AND name = 'attendees'",
    )
    .fetch_one(&services.db_pool)
    .await?;
    assert_eq!("attendees", table);
    assert!(db_path.parent().is_some_and(Path::exists));

    services
        .tools
        .call(
            "attendees_insert",
            &json!({"firstName": "Ava", "lastName": "Smith"}),
        )
        .await?;
    assert_eq!(services.attendees.count().await?, 1);
    assert!(services.redis.is_none());
    Ok(())
}

#[tokio::test(flavor = "multi_thread")]
async fn initialise_reports_database_failures_with_context() -> Result<()> {
    let temp_dir = TempDir::new()?;
    let blocker = temp_dir.path().join("file");
    std::fs::write(&blocker, b"not a directory")?;
    let config = build_config(sqlite_url(&blocker.join("nested/db.sqlite")), 1);

    let error = match BackendServices::initialise(&config).await {
        Ok(_) => panic!("expected database initialisation to fail"),
        Err(error) => error,
    };
    let message = format!("{error:?}");
    assert!(
        message.contains("failed to initialise database"),
        "expected database failure context, got {message}"
    );
    Ok(())
}

#[tokio::test(flavor = "multi_thread")]
async fn initialise_logs_and_ignores_redis_connection_failure() -> Result<()> {
    // Reserve a port and release it so nothing is listening there.
    let listener = TcpListener::bind("127.0.0.1:0").await?;
    let address = listener.local_addr()?;
    drop(listener);

    let temp_dir = TempDir::new()?;
    let mut config = build_config(sqlite_url(&temp_dir.path().join("redis.db")), 1);
    config.mcp.redis_url = Some(format!("redis://{address}"));

    let services = initialise(&config).await?;

    assert!(
        services.redis.is_none(),
        "redis connection errors should be tolerated"
    );
    Ok(())
}

#[tokio::test(flavor = "multi_thread")]
async fn invalid_redis_url_is_tolerated() -> Result<()> {
    let temp_dir = TempDir::new()?;
    let mut config = build_config(sqlite_url(&temp_dir.path().join("bad-redis.db")), 1);
    config.mcp.redis_url = Some("not-a-redis-url".into());

    let services = initialise(&config).await?;
    assert!(services.redis.is_none());
    Ok(())
}
