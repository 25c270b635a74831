use std::sync::Arc;

use anyhow::Context;
use clap::{Parser, Subcommand};
use roster_backend_api::{build_router, AppState, SessionBroker};
use roster_backend_runtime::{shutdown_signal, telemetry, BackendServices};
use roster_config::{load as load_config, AppConfig};
use roster_database::{generate_seed_rows, seed_attendees, Attendee, DEFAULT_SEED_COUNT};
use tokio::net::TcpListener;
use tracing::info;

#[derive(Parser)]
#[command(name = "roster")]
#[command(about = "Attendee roster with a streaming chat and a tool endpoint (serves by default)")]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Start the HTTP server
    Serve,
    /// Insert generated attendees
    Seed {
        #[arg(long, default_value_t = DEFAULT_SEED_COUNT)]
        count: usize,
    },
    /// Print the roster
    Dump,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    telemetry::init_tracing().context("failed to initialise tracing")?;

    let config = load_config().context("failed to load configuration")?;
    let services = BackendServices::initialise(&config)
        .await
        .context("failed to initialise backend services")?;

    match cli.command.unwrap_or(Commands::Serve) {
        Commands::Serve => run_server(config, services).await,
        Commands::Seed { count } => seed(&services, count).await,
        Commands::Dump => dump(&services).await,
    }
}

async fn run_server(config: AppConfig, services: BackendServices) -> anyhow::Result<()> {
    info!("starting roster server");

    let address = format!("{}:{}", config.http.address, config.http.port);
    let sessions = match services.redis.clone() {
        Some(redis) => SessionBroker::redis(redis.client, redis.publisher),
        None => SessionBroker::local(),
    };
    let state = AppState::new(
        Arc::new(config),
        services.attendees.clone(),
        services.tools.clone(),
        services.relay.clone(),
        services.http.clone(),
        sessions,
    );
    let app = build_router(state);

    let listener = TcpListener::bind(&address)
        .await
        .with_context(|| format!("failed to bind http listener on {address}"))?;

    info!(%address, "http server listening");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("http server error")?;

    info!("roster server shut down");
    Ok(())
}

async fn seed(services: &BackendServices, count: usize) -> anyhow::Result<()> {
    let rows = generate_seed_rows(&mut rand::thread_rng(), count);
    let inserted = seed_attendees(&services.attendees, rows)
        .await
        .context("failed to seed attendees")?;

    println!("Seeded {} attendees", inserted.len());
    Ok(())
}

async fn dump(services: &BackendServices) -> anyhow::Result<()> {
    let attendees = services
        .attendees
        .list()
        .await
        .context("failed to fetch attendees")?;

    print!("{}", render_table(&attendees));
    Ok(())
}

fn render_table(attendees: &[Attendee]) -> String {
    if attendees.is_empty() {
        return "No attendees found in database\n".to_string();
    }

    let mut out = format!("Found {} attendees:\n", attendees.len());
    out.push_str(&format!(
        "{:<6} {:<20} {:<20} {:<30}\n",
        "ID", "First name", "Last name", "Nickname"
    ));
    out.push_str(&"-".repeat(76));
    out.push('\n');
    for attendee in attendees {
        out.push_str(&format!(
            "{:<6} {:<20} {:<20} {:<30}\n",
            attendee.id,
            attendee.first_name,
            attendee.last_name,
            attendee.nickname.as_deref().unwrap_or("-")
        ));
    }
    out
}
