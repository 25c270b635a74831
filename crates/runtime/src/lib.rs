use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use redis::aio::ConnectionManager;
use roster_config::AppConfig;
use roster_database::{initialize_database, AttendeeRepository};
use roster_orchestrator::ChatRelay;
use roster_tools::ToolRegistry;
use sqlx::SqlitePool;
use tracing::{info, warn};

const CONNECT_TIMEOUT: Duration = Duration::from_secs(10);

pub mod telemetry {
    use anyhow::Result;
    use tracing::Level;
    use tracing_subscriber::{fmt::SubscriberBuilder, EnvFilter};

    pub fn init_tracing() -> Result<()> {
        let env_filter =
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

        let subscriber = SubscriberBuilder::default()
            .with_max_level(Level::DEBUG)
            .with_env_filter(env_filter)
            .finish();

        tracing::subscriber::set_global_default(subscriber)
            .map_err(|error| anyhow::anyhow!("failed to set tracing subscriber: {error}"))
    }
}

/// Redis handles used to fan tool-endpoint session messages across processes.
#[derive(Clone)]
pub struct RedisHandles {
    pub client: redis::Client,
    pub publisher: ConnectionManager,
}

#[derive(Clone)]
pub struct BackendServices {
    pub db_pool: SqlitePool,
    pub attendees: AttendeeRepository,
    pub tools: Arc<ToolRegistry>,
    pub relay: Arc<ChatRelay>,
    pub http: reqwest::Client,
    pub redis: Option<RedisHandles>,
}

impl BackendServices {
    pub async fn initialise(config: &AppConfig) -> Result<Self> {
        let db_pool = initialize_database(&config.database)
            .await
            .context("failed to initialise database")?;
        let attendees = AttendeeRepository::new(db_pool.clone());
        let tools = Arc::new(ToolRegistry::new(attendees.clone()));

        // Only connects are bounded here; the relay owns the chat deadline.
        let http = reqwest::Client::builder()
            .connect_timeout(CONNECT_TIMEOUT)
            .build()
            .context("failed to build http client")?;
        let relay = Arc::new(ChatRelay::from_config(http.clone(), &config.chat));

        if config.chat.api_key.is_none() {
            warn!("no chat api key configured; completion requests will be sent unauthenticated");
        }
        info!(model = %config.chat.model, max_steps = config.chat.max_steps, "chat relay ready");

        let redis = match config.mcp.redis_url.as_deref() {
            Some(url) => connect_redis(url).await,
            None => None,
        };

        Ok(Self {
            db_pool,
            attendees,
            tools,
            relay,
            http,
            redis,
        })
    }
}

async fn connect_redis(url: &str) -> Option<RedisHandles> {
    let client = match redis::Client::open(url) {
        Ok(client) => client,
        Err(e) => {
            warn!(
                "failed to create redis client, proceeding with in-process sessions: {}",
                e
            );
            return None;
        }
    };

    match ConnectionManager::new(client.clone()).await {
        Ok(publisher) => {
            info!("redis connection established");
            Some(RedisHandles { client, publisher })
        }
        Err(e) => {
            warn!(
                "failed to connect to redis, proceeding with in-process sessions: {}",
                e
            );
            None
        }
    }
}

pub async fn shutdown_signal() {
    if let Err(error) = tokio::signal::ctrl_c().await {
        warn!(?error, "failed to listen for shutdown signal");
    }
    info!("shutdown signal received");
}
