//! `ha-pool`: run an HA pool over TCP backends and report its health.
//!
//! Loads a TOML pool definition, starts failure detection, and logs a
//! stats snapshot on every report interval until Ctrl-C.

use clap::Parser;
use std::error::Error;
use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use ha_pool::backend::TcpDataSource;
use ha_pool::config::load_config;
use ha_pool::observability::{logging, metrics};
use ha_pool::{HaPool, PoolError};

#[derive(Parser)]
#[command(name = "ha-pool")]
#[command(about = "High-availability pool over TCP backends", long_about = None)]
struct Cli {
    /// Pool definition (TOML).
    #[arg(short, long)]
    config: PathBuf,

    /// Seconds between stats reports.
    #[arg(short, long, default_value_t = 10)]
    report_interval_secs: u64,

    /// Statement to run through a fresh connection on every report.
    #[arg(short, long)]
    probe: Option<String>,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn Error>> {
    let cli = Cli::parse();
    let config = load_config(&cli.config)?;

    logging::init_tracing(&config.observability.log_level);
    tracing::info!(config = %cli.config.display(), "ha-pool v{} starting", env!("CARGO_PKG_VERSION"));

    if config.observability.metrics_enabled {
        match config.observability.metrics_address.parse::<SocketAddr>() {
            Ok(addr) => metrics::init_metrics(addr)?,
            Err(_) => tracing::error!(
                metrics_address = %config.observability.metrics_address,
                "Failed to parse metrics address"
            ),
        }
    }

    let connect_timeout = config.health_check.probe_timeout();
    let mut builder = HaPool::builder().config(config.clone());
    for backend in &config.backends {
        let addr: SocketAddr = backend.address.parse()?;
        builder = builder.backend(
            backend.name.clone(),
            backend.weight,
            Arc::new(TcpDataSource::new(addr, connect_timeout)),
        );
    }
    let pool = builder.build()?;
    pool.init()?;

    let mut ticker = tokio::time::interval(Duration::from_secs(cli.report_interval_secs.max(1)));
    loop {
        tokio::select! {
            _ = ticker.tick() => report(&pool, cli.probe.as_deref()).await,
            _ = tokio::signal::ctrl_c() => {
                tracing::info!("Received Ctrl-C, closing pool");
                break;
            }
        }
    }

    if let Err(e) = pool.close().await {
        tracing::warn!(error = %e, "Pool closed with errors");
    }
    tracing::info!("Shutdown complete");
    Ok(())
}

async fn report(pool: &HaPool, probe: Option<&str>) {
    match serde_json::to_string(&pool.stats()) {
        Ok(json) => tracing::info!(stats = %json, "Pool stats"),
        Err(e) => tracing::warn!(error = %e, "Failed to serialize stats"),
    }

    let Some(statement) = probe else {
        return;
    };
    match pool.get_connection() {
        Ok(mut conn) => {
            match conn.execute(statement).await {
                Ok(result) => tracing::info!(
                    backend = %result.backend,
                    statement_id = result.statement_id,
                    reply = %String::from_utf8_lossy(&result.payload),
                    "Probe statement succeeded"
                ),
                Err(e) => tracing::warn!(error = %e, "Probe statement failed"),
            }
            let id = conn.id();
            if let Err(e) = conn.close().await {
                tracing::warn!(connection = id, error = %e, "Failed to close probe connection");
            }
        }
        Err(PoolError::NoAvailableBackend) => tracing::warn!("No available backend"),
        Err(e) => tracing::warn!(error = %e, "Failed to acquire connection"),
    }
}
