//! # Roomcast Server
//!
//! Realtime fan-out relay for encrypted chat rooms.
//!
//! ## Usage
//!
//! ```bash
//! # Run with default settings
//! roomcast
//!
//! # Run with a specific config file
//! ROOMCAST_CONFIG=/path/to/roomcast.toml roomcast
//!
//! # Run with environment variables
//! ROOMCAST_PORT=8080 ROOMCAST_HOST=0.0.0.0 ROOMCAST_JWT_SECRET=... roomcast
//! ```

use anyhow::{Context, Result};
use roomcast_core::Hub;
use roomcast_server::{config::Config, handlers, metrics, AppState, JwtAuthenticator, SqliteStore};
use std::sync::Arc;
use std::time::Duration;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "roomcast=debug,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = Config::load()?;

    tracing::info!("Starting Roomcast server on {}:{}", config.host, config.port);
    if config.auth.jwt_secret == "public_secret" {
        tracing::warn!("Using the default JWT secret; set ROOMCAST_JWT_SECRET");
    }

    metrics::init_metrics();

    let store = SqliteStore::connect(
        &config.database.path,
        config.database.connect_retries,
        Duration::from_millis(config.database.connect_pause_ms),
    )
    .await
    .with_context(|| format!("Failed to open database {}", config.database.path))?;
    let store = Arc::new(metrics::InstrumentedStore::new(Arc::new(store)));

    let (hub, hub_task) = Hub::start(&config.hub_config(), store.clone(), store);
    if config.metrics.enabled {
        metrics::spawn_stats_reporter(hub.clone(), Duration::from_secs(5));
    }

    let auth = Arc::new(JwtAuthenticator::from_config(&config.auth));
    let state = Arc::new(AppState::new(config, hub, auth));

    handlers::run_server(state).await?;

    hub_task.abort();
    Ok(())
}
