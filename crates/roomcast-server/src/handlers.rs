//! HTTP routes and the WebSocket upgrade.

use crate::auth::{extract_credential, AuthError, Authenticator, Identity};
use crate::config::Config;
use crate::metrics::{self, ConnectionMetricsGuard};
use anyhow::{Context, Result};
use axum::{
    extract::{
        ws::{WebSocket, WebSocketUpgrade},
        State,
    },
    http::{HeaderMap, StatusCode},
    response::{IntoResponse, Response},
    routing::get,
    Json, Router,
};
use roomcast_core::{HubHandle, UserId};
use roomcast_transport::run_client;
use std::sync::Arc;
use tokio::net::TcpListener;
use tracing::{debug, error, info, warn};

/// Shared server state.
pub struct AppState {
    /// Handle to the hub task.
    pub hub: HubHandle,
    /// Server configuration.
    pub config: Config,
    /// Validates upgrade credentials.
    pub auth: Arc<dyn Authenticator>,
}

impl AppState {
    /// Create new app state.
    #[must_use]
    pub fn new(config: Config, hub: HubHandle, auth: Arc<dyn Authenticator>) -> Self {
        Self { hub, config, auth }
    }
}

/// Build the router: the WebSocket path and `/health`.
pub fn router(state: Arc<AppState>) -> Router {
    Router::new()
        .route(&state.config.transport.websocket_path, get(ws_handler))
        .route("/health", get(health_handler))
        .with_state(state)
}

/// Bind the configured address and serve until interrupted.
///
/// # Errors
///
/// Returns an error if the server fails to start.
pub async fn run_server(state: Arc<AppState>) -> Result<()> {
    let config = &state.config;

    if config.metrics.enabled {
        if let Err(e) = metrics::start_metrics_server(config.metrics.port) {
            error!("Failed to start metrics server: {:#}", e);
        }
    }

    let addr = config.bind_addr()?;
    let listener = TcpListener::bind(addr)
        .await
        .with_context(|| format!("Failed to bind {}", addr))?;

    info!("Roomcast server listening on {}", addr);
    info!(
        "WebSocket endpoint: ws://{}{}",
        addr, config.transport.websocket_path
    );

    serve(listener, state).await
}

/// Serve on an already bound listener.
///
/// # Errors
///
/// Returns an error if the server fails.
pub async fn serve(listener: TcpListener, state: Arc<AppState>) -> Result<()> {
    axum::serve(listener, router(state))
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("Server error")?;
    Ok(())
}

async fn shutdown_signal() {
    if tokio::signal::ctrl_c().await.is_ok() {
        info!("Shutdown requested");
    } else {
        // No signal handler available; run until the process is killed.
        std::future::pending::<()>().await;
    }
}

/// Health check handler.
async fn health_handler(State(state): State<Arc<AppState>>) -> Response {
    match state.hub.stats().await {
        Ok(stats) => Json(serde_json::json!({
            "status": "ok",
            "version": env!("CARGO_PKG_VERSION"),
            "clients": stats.client_count,
            "rooms": stats.room_count,
            "subscriptions": stats.total_subscriptions,
        }))
        .into_response(),
        Err(e) => {
            error!(error = %e, "Health check failed");
            (
                StatusCode::SERVICE_UNAVAILABLE,
                Json(serde_json::json!({ "status": "unavailable" })),
            )
                .into_response()
        }
    }
}

/// WebSocket upgrade handler.
///
/// The credential is checked before upgrading; a rejected request never
/// becomes a client.
async fn ws_handler(
    ws: WebSocketUpgrade,
    headers: HeaderMap,
    State(state): State<Arc<AppState>>,
) -> Response {
    let identity = match authenticate(&headers, &state) {
        Ok(identity) => identity,
        Err(e) => {
            warn!(error = %e, "Upgrade rejected");
            metrics::record_error(e.kind());
            return e.into_response();
        }
    };

    ws.on_upgrade(move |socket| handle_websocket(socket, identity.user_id, state))
}

fn authenticate(headers: &HeaderMap, state: &AppState) -> Result<Identity, AuthError> {
    let token = extract_credential(headers, &state.config.auth.cookie_name)
        .ok_or(AuthError::MissingCredential)?;
    state.auth.authenticate(&token)
}

/// Serve an upgraded WebSocket until it closes.
async fn handle_websocket(socket: WebSocket, user_id: UserId, state: Arc<AppState>) {
    let _metrics_guard = ConnectionMetricsGuard::new();
    let client_config = state.config.client_config();

    debug!(user = %user_id, "WebSocket connected");

    if let Err(e) = run_client(socket, user_id.clone(), state.hub.clone(), &client_config).await {
        metrics::record_error(e.kind());
        debug!(user = %user_id, error = %e, "WebSocket closed with error");
    }
}
