//! Configuration schema definitions.
//!
//! This module defines the complete configuration structure for a pool.
//! All types derive Serde traits for deserialization from config files.

use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Root configuration for an HA pool.
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
#[serde(default)]
pub struct PoolConfig {
    /// Pool name for logs and stats. Generated when absent.
    pub name: Option<String>,

    /// Failure detection settings.
    pub health_check: HealthCheckConfig,

    /// Background scheduler settings.
    pub scheduler: SchedulerConfig,

    /// Shutdown settings.
    pub shutdown: ShutdownConfig,

    /// Automatic remediation of failed backends.
    pub failover: FailoverConfig,

    /// Backend selection policy.
    pub strategy: StrategyKind,

    /// Backend definitions.
    pub backends: Vec<BackendConfig>,

    /// Observability settings.
    pub observability: ObservabilityConfig,
}

/// Backend definition.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct BackendConfig {
    /// Unique backend identifier.
    pub name: String,

    /// Backend address (e.g., "127.0.0.1:5432").
    pub address: String,

    /// Relative selection weight (default: 1).
    #[serde(default = "default_weight")]
    pub weight: u32,
}

fn default_weight() -> u32 {
    1
}

/// Failure detection configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct HealthCheckConfig {
    /// Probe period in milliseconds.
    pub period_ms: u64,

    /// Timeout for a single probe in milliseconds.
    pub probe_timeout_ms: u64,

    /// Statement run on each probe connection, if any.
    pub validation_statement: Option<String>,
}

impl HealthCheckConfig {
    pub fn period(&self) -> Duration {
        Duration::from_millis(self.period_ms)
    }

    pub fn probe_timeout(&self) -> Duration {
        Duration::from_millis(self.probe_timeout_ms)
    }
}

impl Default for HealthCheckConfig {
    fn default() -> Self {
        Self {
            period_ms: 3000,
            probe_timeout_ms: 1000,
            validation_statement: None,
        }
    }
}

/// Background scheduler configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct SchedulerConfig {
    /// Worker threads of the dedicated scheduler runtime.
    pub worker_threads: usize,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self { worker_threads: 3 }
    }
}

/// Shutdown configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ShutdownConfig {
    /// Upper bound for closing one backend, in milliseconds.
    pub close_timeout_ms: u64,
}

impl ShutdownConfig {
    pub fn close_timeout(&self) -> Duration {
        Duration::from_millis(self.close_timeout_ms)
    }
}

impl Default for ShutdownConfig {
    fn default() -> Self {
        Self {
            close_timeout_ms: 5000,
        }
    }
}

/// Automatic restart of backends rejected during selection.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct FailoverConfig {
    /// Schedule a restart when selection skips a failed backend.
    pub restart_on_failure: bool,

    /// Maximum restart attempts per scheduling.
    pub restart_max_attempts: u32,

    /// Base delay for exponential backoff in milliseconds.
    pub restart_base_delay_ms: u64,

    /// Maximum delay for exponential backoff in milliseconds.
    pub restart_max_delay_ms: u64,
}

impl Default for FailoverConfig {
    fn default() -> Self {
        Self {
            restart_on_failure: false,
            restart_max_attempts: 3,
            restart_base_delay_ms: 200,
            restart_max_delay_ms: 5000,
        }
    }
}

/// Bundled selection strategies.
#[derive(Debug, Clone, Copy, Deserialize, Serialize, Default, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum StrategyKind {
    RoundRobin,
    #[default]
    WeightedRandom,
    LeastActive,
}

/// Observability configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ObservabilityConfig {
    /// Log level (trace, debug, info, warn, error).
    pub log_level: String,

    /// Enable metrics endpoint.
    pub metrics_enabled: bool,

    /// Metrics endpoint bind address.
    pub metrics_address: String,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
            metrics_enabled: false,
            metrics_address: "0.0.0.0:9090".to_string(),
        }
    }
}
