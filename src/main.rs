use anyhow::Result;
use clap::Parser;
use std::path::PathBuf;
use std::sync::Arc;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use gantry::config::Config;
use gantry::events::EventBus;
use gantry::github::{spawn_sweep_task, GitHubClient, TokenCache, TokenIssuer};
use gantry::store::CredentialStore;
use gantry::AppState;

#[derive(Parser, Debug)]
#[command(name = "gantry")]
#[command(author, version, about = "GitHub App integration service for the Gantry deploy pipeline", long_about = None)]
struct Cli {
    /// Path to configuration file
    #[arg(short, long, default_value = "gantry.toml")]
    config: PathBuf,

    /// Override log level
    #[arg(short, long)]
    log_level: Option<String>,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let config = Config::load(&cli.config)?;

    let log_level = cli
        .log_level
        .as_ref()
        .unwrap_or(&config.logging.level)
        .clone();

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(&log_level)),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    tracing::info!("Starting Gantry v{}", env!("CARGO_PKG_VERSION"));

    let store = Arc::new(CredentialStore::new(&config.server.data_dir)?);

    let cache = Arc::new(TokenCache::new());
    spawn_sweep_task(cache.clone(), config.cache.sweep_interval_secs);

    let issuer = Arc::new(TokenIssuer::new(
        store.clone(),
        cache,
        GitHubClient::new(&config.github.api_base),
    ));

    let bus = Arc::new(EventBus::default());

    let state = Arc::new(AppState::new(config.clone(), store, issuer, bus));
    let app = gantry::api::create_router(state);

    let addr = format!("{}:{}", config.server.host, config.server.port);
    let listener = tokio::net::TcpListener::bind(&addr).await?;

    tracing::info!("Listening on http://{}", addr);
    tracing::info!("Setup page: {}/setup", config.server.base_url());

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    tracing::info!("Server stopped");
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        tokio::signal::ctrl_c()
            .await
            .expect("Failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
            .expect("Failed to install signal handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }

    tracing::info!("Shutdown signal received");
}
