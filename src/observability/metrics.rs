//! Metrics collection and exposition.
//!
//! # Metrics
//! - `ha_pool_backend_healthy` (gauge): 1=healthy, 0=failed, per backend
//! - `ha_pool_probe_duration_seconds` (histogram): probe latency
//! - `ha_pool_connections_total` (counter): connections bound, per backend
//! - `ha_pool_no_backend_total` (counter): acquisitions with no backend left
//! - `ha_pool_restarts_total` (counter): restarts by outcome
//! - `ha_pool_total_weight` (gauge): aggregate weight
//!
//! # Design Decisions
//! - Recording is a no-op until a recorder is installed
//! - Only the binary installs the Prometheus exporter

use metrics::{counter, gauge, histogram};
use metrics_exporter_prometheus::{BuildError, PrometheusBuilder};
use std::net::SocketAddr;
use std::time::Duration;

/// Install the Prometheus exporter listening on `addr`.
pub fn init_metrics(addr: SocketAddr) -> Result<(), BuildError> {
    PrometheusBuilder::new().with_http_listener(addr).install()?;
    tracing::info!(address = %addr, "Metrics exporter listening");
    Ok(())
}

pub fn record_backend_health(pool: &str, backend: &str, healthy: bool) {
    gauge!(
        "ha_pool_backend_healthy",
        "pool" => pool.to_string(),
        "backend" => backend.to_string()
    )
    .set(if healthy { 1.0 } else { 0.0 });
}

pub fn record_probe(pool: &str, backend: &str, elapsed: Duration) {
    histogram!(
        "ha_pool_probe_duration_seconds",
        "pool" => pool.to_string(),
        "backend" => backend.to_string()
    )
    .record(elapsed.as_secs_f64());
}

pub fn record_connection_acquired(pool: &str, backend: &str) {
    counter!(
        "ha_pool_connections_total",
        "pool" => pool.to_string(),
        "backend" => backend.to_string()
    )
    .increment(1);
}

pub fn record_no_available_backend(pool: &str) {
    counter!("ha_pool_no_backend_total", "pool" => pool.to_string()).increment(1);
}

pub fn record_restart(pool: &str, backend: &str, ok: bool) {
    counter!(
        "ha_pool_restarts_total",
        "pool" => pool.to_string(),
        "backend" => backend.to_string(),
        "outcome" => if ok { "ok" } else { "error" }
    )
    .increment(1);
}

pub fn record_total_weight(pool: &str, weight: u64) {
    gauge!("ha_pool_total_weight", "pool" => pool.to_string()).set(weight as f64);
}
