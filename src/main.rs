//! Lakeview - an operator dashboard server for ad-hoc log analytics.

use std::sync::Arc;

use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

use lakeview::cli::Cli;
use lakeview::config::Config;
use lakeview::error::Result;
use lakeview::lifecycle::QueryTracker;
use lakeview::schema::SchemaCatalog;
use lakeview::server::{self, AppState};
use lakeview::service;

fn main() {
    // Pick up LAKEVIEW_* variables from a local .env during development
    dotenvy::dotenv().ok();

    // Initialize logging
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    if let Err(e) = run() {
        error!("{}: {}", e.category(), e);
        std::process::exit(1);
    }
}

#[tokio::main]
async fn run() -> Result<()> {
    // Parse CLI arguments
    let cli = Cli::parse_args();

    // Load the config file, then layer environment and CLI overrides on top
    let config_path = cli.config_path();
    info!("Loading config from: {}", config_path.display());
    let mut config = Config::load_from_file(&config_path)?;
    config.service.apply_env_defaults();
    cli.apply_to(&mut config);

    let schema = config.schema.to_schema()?;
    info!("Serving table: {}", schema.table);

    let service = if cli.mock_service {
        info!("Using mock query service");
        service::connect_mock()
    } else {
        service::connect(&config.service.to_service_config()?)?
    };

    let catalog = Arc::new(SchemaCatalog::new(schema, Arc::clone(&service)));
    let (tracker, actor) = QueryTracker::spawn(
        Arc::clone(&catalog),
        Arc::clone(&service),
        config.service.poll_interval(),
    );
    let tracker_task = tokio::spawn(actor.run());

    let state = AppState::new(tracker.clone(), service, catalog);

    let shutdown = CancellationToken::new();
    tokio::spawn(shutdown_on_ctrl_c(shutdown.clone()));

    let served = server::serve(config.server.addr(), state, shutdown).await;

    if let Err(e) = tracker.close().await {
        warn!("Query tracker was already gone at shutdown: {e}");
    }
    let _ = tracker_task.await;

    served
}

/// Cancels the shutdown token on Ctrl-C.
async fn shutdown_on_ctrl_c(shutdown: CancellationToken) {
    if tokio::signal::ctrl_c().await.is_ok() {
        info!("Shutting down");
        shutdown.cancel();
    }
}
