//! Failure detector loop.
//!
//! # Responsibilities
//! - Periodically probe every registered backend
//! - Flip each handle's failed flag from the probe result
//!
//! # Design Decisions
//! - Passes run sequentially in one task; late ticks are skipped, so two
//!   passes never overlap
//! - Probes within a pass run concurrently, each bounded by a timeout
//! - A probe error, timeout or panic marks that backend failed and the
//!   pass moves on

use std::sync::Arc;
use std::time::Duration;
use tokio::time::{self, Instant, MissedTickBehavior};

use crate::backend::BackendHandle;
use crate::health::prober::HealthProber;
use crate::observability::metrics;
use crate::registry::BackendRegistry;

/// Outcome of one probing pass.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ProbeSummary {
    pub healthy: usize,
    pub failed: usize,
}

/// Background prober for one pool's registry.
pub struct FailureDetector {
    pool: String,
    registry: Arc<BackendRegistry>,
    prober: Arc<dyn HealthProber>,
    probe_timeout: Duration,
}

impl FailureDetector {
    pub fn new(
        pool: impl Into<String>,
        registry: Arc<BackendRegistry>,
        prober: Arc<dyn HealthProber>,
        probe_timeout: Duration,
    ) -> Self {
        Self {
            pool: pool.into(),
            registry,
            prober,
            probe_timeout,
        }
    }

    /// Probe forever, one pass per `period`, starting one period from now.
    ///
    /// Runs until the task is aborted.
    pub async fn run(self, period: Duration) {
        tracing::info!(
            pool = %self.pool,
            period_ms = period.as_millis() as u64,
            "Failure detector starting"
        );

        let mut ticker = time::interval_at(Instant::now() + period, period);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

        loop {
            ticker.tick().await;
            let summary = self.probe_once().await;
            tracing::trace!(
                pool = %self.pool,
                healthy = summary.healthy,
                failed = summary.failed,
                "Probe pass complete"
            );
        }
    }

    /// Run a single probing pass over every registered backend.
    pub async fn probe_once(&self) -> ProbeSummary {
        let handles = self.registry.list_all();

        let mut probes = Vec::with_capacity(handles.len());
        for handle in handles {
            let prober = self.prober.clone();
            let source = handle.source().clone();
            let probe_timeout = self.probe_timeout;
            let task = tokio::spawn(async move {
                let started = Instant::now();
                let outcome = time::timeout(probe_timeout, prober.is_healthy(source.as_ref())).await;
                (outcome, started.elapsed())
            });
            probes.push((handle, task));
        }

        let mut summary = ProbeSummary::default();
        for (handle, task) in probes {
            let healthy = match task.await {
                Ok((outcome, elapsed)) => {
                    metrics::record_probe(&self.pool, handle.name(), elapsed);
                    match outcome {
                        Ok(Ok(healthy)) => healthy,
                        Ok(Err(e)) => {
                            tracing::warn!(pool = %self.pool, backend = %handle.name(), error = %e, "Health probe failed");
                            false
                        }
                        Err(_) => {
                            tracing::warn!(
                                pool = %self.pool,
                                backend = %handle.name(),
                                timeout_ms = self.probe_timeout.as_millis() as u64,
                                "Health probe timed out"
                            );
                            false
                        }
                    }
                }
                Err(e) => {
                    tracing::warn!(pool = %self.pool, backend = %handle.name(), error = %e, "Health probe task aborted");
                    false
                }
            };

            self.apply(&handle, healthy);
            if healthy {
                summary.healthy += 1;
            } else {
                summary.failed += 1;
            }
        }
        summary
    }

    fn apply(&self, handle: &BackendHandle, healthy: bool) {
        if handle.set_failed(!healthy) {
            if healthy {
                tracing::info!(pool = %self.pool, backend = %handle.name(), "Backend recovered");
            } else {
                tracing::warn!(pool = %self.pool, backend = %handle.name(), "Backend marked failed");
            }
        }
        metrics::record_backend_health(&self.pool, handle.name(), healthy);
    }
}
