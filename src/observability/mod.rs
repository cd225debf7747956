//! Observability subsystem.
//!
//! # Data Flow
//! ```text
//! Detector, selection, lifecycle produce:
//!     → logging.rs (structured log events via tracing)
//!     → metrics.rs (counters, gauges, histograms)
//!
//! Consumers:
//!     → Log aggregation (stdout)
//!     → Metrics endpoint (Prometheus scrape)
//!     → stats::StatRegistry (pool snapshots)
//! ```

pub mod logging;
pub mod metrics;
