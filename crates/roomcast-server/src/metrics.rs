//! Metrics collection and export for Roomcast.
//!
//! Uses the `metrics` crate for instrumentation and exports
//! to Prometheus format.

use anyhow::{Context, Result};
use async_trait::async_trait;
use metrics::{counter, gauge, histogram};
use metrics_exporter_prometheus::PrometheusBuilder;
use roomcast_core::{
    HubHandle, HubStats, MembershipStore, MessageStore, NewMessage, RoomId, StoreError,
};
use roomcast_protocol::StoredMessage;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::task::JoinHandle;
use tracing::{debug, info};

/// Metric names.
pub mod names {
    pub const CONNECTIONS_TOTAL: &str = "roomcast_connections_total";
    pub const CONNECTIONS_ACTIVE: &str = "roomcast_connections_active";
    pub const CLIENTS_REGISTERED: &str = "roomcast_clients_registered";
    pub const ROOMS_ACTIVE: &str = "roomcast_rooms_active";
    pub const SUBSCRIPTIONS_ACTIVE: &str = "roomcast_subscriptions_active";
    pub const MESSAGES_RELAYED: &str = "roomcast_messages_relayed_total";
    pub const EVICTIONS_TOTAL: &str = "roomcast_slow_consumer_evictions_total";
    pub const STORE_LATENCY_SECONDS: &str = "roomcast_store_latency_seconds";
    pub const ERRORS_TOTAL: &str = "roomcast_errors_total";
}

/// Initialize the metrics system.
pub fn init_metrics() {
    metrics::describe_counter!(
        names::CONNECTIONS_TOTAL,
        "Total number of accepted WebSocket connections since server start"
    );
    metrics::describe_gauge!(
        names::CONNECTIONS_ACTIVE,
        "Current number of open WebSocket connections"
    );
    metrics::describe_gauge!(
        names::CLIENTS_REGISTERED,
        "Clients currently registered with the hub"
    );
    metrics::describe_gauge!(names::ROOMS_ACTIVE, "Rooms with at least one subscriber");
    metrics::describe_gauge!(
        names::SUBSCRIPTIONS_ACTIVE,
        "Total room subscriptions across all clients"
    );
    metrics::describe_counter!(
        names::MESSAGES_RELAYED,
        "Messages persisted and fanned out"
    );
    metrics::describe_counter!(
        names::EVICTIONS_TOTAL,
        "Clients dropped because their outbound queue was full"
    );
    metrics::describe_histogram!(
        names::STORE_LATENCY_SECONDS,
        "Store call latency in seconds"
    );
    metrics::describe_counter!(names::ERRORS_TOTAL, "Total number of errors by kind");

    info!("Metrics initialized");
}

/// Start the Prometheus metrics server.
///
/// # Errors
///
/// Returns an error if the exporter cannot be installed.
pub fn start_metrics_server(port: u16) -> Result<()> {
    let addr = SocketAddr::from(([0, 0, 0, 0], port));

    PrometheusBuilder::new()
        .with_http_listener(addr)
        .install()
        .context("Failed to install Prometheus exporter")?;

    info!("Metrics server listening on {}", addr);
    Ok(())
}

/// Record a new connection.
pub fn record_connection() {
    counter!(names::CONNECTIONS_TOTAL).increment(1);
    gauge!(names::CONNECTIONS_ACTIVE).increment(1.0);
}

/// Record a disconnection.
pub fn record_disconnection() {
    gauge!(names::CONNECTIONS_ACTIVE).decrement(1.0);
}

/// Record a store call.
pub fn record_store_latency(operation: &'static str, elapsed: Duration) {
    histogram!(names::STORE_LATENCY_SECONDS, "operation" => operation).record(elapsed.as_secs_f64());
}

/// Publish a hub statistics snapshot.
pub fn record_hub_stats(stats: &HubStats) {
    gauge!(names::CLIENTS_REGISTERED).set(stats.client_count as f64);
    gauge!(names::ROOMS_ACTIVE).set(stats.room_count as f64);
    gauge!(names::SUBSCRIPTIONS_ACTIVE).set(stats.total_subscriptions as f64);
    counter!(names::MESSAGES_RELAYED).absolute(stats.messages_relayed);
    counter!(names::EVICTIONS_TOTAL).absolute(stats.slow_consumers_evicted);
}

/// Record an error.
pub fn record_error(kind: &'static str) {
    counter!(names::ERRORS_TOTAL, "kind" => kind).increment(1);
}

/// Poll the hub every `every` and publish its statistics.
///
/// The task ends when the hub stops.
pub fn spawn_stats_reporter(hub: HubHandle, every: Duration) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(every);
        loop {
            ticker.tick().await;
            match hub.stats().await {
                Ok(stats) => record_hub_stats(&stats),
                Err(_) => {
                    debug!("Hub stopped, stats reporter exiting");
                    break;
                }
            }
        }
    })
}

/// Store wrapper that records latency and failures of every call.
pub struct InstrumentedStore<S> {
    inner: Arc<S>,
}

impl<S> InstrumentedStore<S> {
    /// Wrap `inner`.
    #[must_use]
    pub fn new(inner: Arc<S>) -> Self {
        Self { inner }
    }
}

#[async_trait]
impl<S: MembershipStore> MembershipStore for InstrumentedStore<S> {
    async fn chats_for_user(&self, user_id: &str) -> Result<Vec<RoomId>, StoreError> {
        let started = Instant::now();
        let result = self.inner.chats_for_user(user_id).await;
        record_store_latency("chats_for_user", started.elapsed());
        if result.is_err() {
            record_error("store_membership");
        }
        result
    }
}

#[async_trait]
impl<S: MessageStore> MessageStore for InstrumentedStore<S> {
    async fn create(&self, message: NewMessage) -> Result<StoredMessage, StoreError> {
        let started = Instant::now();
        let result = self.inner.create(message).await;
        record_store_latency("create", started.elapsed());
        if result.is_err() {
            record_error("store_create");
        }
        result
    }
}

/// Metrics guard that records disconnection on drop.
pub struct ConnectionMetricsGuard;

impl ConnectionMetricsGuard {
    /// Create a new metrics guard, recording a connection.
    #[must_use]
    pub fn new() -> Self {
        record_connection();
        Self
    }
}

impl Default for ConnectionMetricsGuard {
    fn default() -> Self {
        Self::new()
    }
}

impl Drop for ConnectionMetricsGuard {
    fn drop(&mut self) {
        record_disconnection();
    }
}
