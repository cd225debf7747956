//! HA pool: lifecycle controller and connection entry point.
//!
//! # Data Flow
//! ```text
//! get_connection(hint)
//!     → init() (first caller starts the scheduler)
//!     → mint connection id
//!     → selection::select_available (non-failed backend or error)
//!     → HaConnection bound to the chosen backend
//!
//! Scheduler runtime (independent):
//!     FailureDetector ticks → flips failed flags → seen by next selection
//! ```

use parking_lot::Mutex;
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Weak};
use tokio::time;

use crate::backend::{BackendError, BackendHandle, DataSource};
use crate::config::{validate_config, PoolConfig};
use crate::connection::HaConnection;
use crate::error::{PoolError, Result, ShutdownError};
use crate::health::{ConnectProber, FailureDetector, HealthProber, ProbeSummary};
use crate::ids::IdGenerators;
use crate::lifecycle::{AtomicLifecycle, LifecycleState, RuntimeFactory, Scheduler};
use crate::observability::metrics;
use crate::registry::BackendRegistry;
use crate::resilience::RestartPolicy;
use crate::selection::{self, RouteHint, SelectionStrategy};
use crate::stats::{BackendStats, PoolStats, PoolTracker, StatRegistry, StatsSource};

/// Process-wide pool instance counter, used for ids and default names.
static POOL_IDS: AtomicU64 = AtomicU64::new(0);

/// A pool of interchangeable backends with background failure detection.
///
/// Cloning is cheap; clones share the same pool.
#[derive(Clone)]
pub struct HaPool {
    inner: Arc<PoolInner>,
}

pub(crate) struct PoolInner {
    id: u64,
    name: String,
    config: PoolConfig,
    registry: Arc<BackendRegistry>,
    prober: Arc<dyn HealthProber>,
    strategy: Arc<dyn SelectionStrategy>,
    tracker: Arc<dyn PoolTracker>,
    restart_policy: RestartPolicy,
    ids: IdGenerators,
    runtime_factory: RuntimeFactory,
    state: AtomicLifecycle,
    /// Guards the init/close transitions and owns the scheduler.
    scheduler: Mutex<Option<Scheduler>>,
}

/// Builder for [`HaPool`].
#[derive(Default)]
pub struct HaPoolBuilder {
    config: PoolConfig,
    name: Option<String>,
    prober: Option<Arc<dyn HealthProber>>,
    strategy: Option<Arc<dyn SelectionStrategy>>,
    tracker: Option<Arc<dyn PoolTracker>>,
    runtime_factory: Option<RuntimeFactory>,
    backends: Vec<BackendHandle>,
}

impl HaPoolBuilder {
    pub fn config(mut self, config: PoolConfig) -> Self {
        self.config = config;
        self
    }

    /// Overrides `config.name`.
    pub fn name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    /// Defaults to a [`ConnectProber`] using the configured validation statement.
    pub fn prober(mut self, prober: Arc<dyn HealthProber>) -> Self {
        self.prober = Some(prober);
        self
    }

    /// Defaults to the strategy named by `config.strategy`.
    pub fn strategy(mut self, strategy: Arc<dyn SelectionStrategy>) -> Self {
        self.strategy = Some(strategy);
        self
    }

    /// Defaults to [`StatRegistry::global`].
    pub fn tracker(mut self, tracker: Arc<dyn PoolTracker>) -> Self {
        self.tracker = Some(tracker);
        self
    }

    /// Defaults to [`Scheduler::build_runtime`].
    pub fn runtime_factory(mut self, factory: RuntimeFactory) -> Self {
        self.runtime_factory = Some(factory);
        self
    }

    pub fn backend(mut self, name: impl Into<String>, weight: u32, source: Arc<dyn DataSource>) -> Self {
        self.backends.push(BackendHandle::new(name, weight, source));
        self
    }

    /// Build the pool. The configuration must validate and backend names
    /// must be unique.
    pub fn build(self) -> Result<HaPool> {
        validate_config(&self.config).map_err(PoolError::InvalidConfig)?;

        let id = POOL_IDS.fetch_add(1, Ordering::Relaxed);
        let name = self
            .name
            .or_else(|| self.config.name.clone())
            .unwrap_or_else(|| format!("ha-pool-{}", id));

        let registry = Arc::new(BackendRegistry::new());
        for handle in self.backends {
            registry.try_insert(Arc::new(handle))?;
        }

        let prober = self.prober.unwrap_or_else(|| {
            let prober = match &self.config.health_check.validation_statement {
                Some(statement) => ConnectProber::with_validation_statement(statement.clone()),
                None => ConnectProber::new(),
            };
            Arc::new(prober)
        });
        let strategy = self
            .strategy
            .unwrap_or_else(|| selection::from_kind(self.config.strategy));
        let tracker = self
            .tracker
            .unwrap_or_else(|| StatRegistry::global() as Arc<dyn PoolTracker>);

        Ok(HaPool {
            inner: Arc::new(PoolInner {
                id,
                name,
                restart_policy: RestartPolicy::from_config(&self.config.failover),
                config: self.config,
                registry,
                prober,
                strategy,
                tracker,
                ids: IdGenerators::new(),
                runtime_factory: self.runtime_factory.unwrap_or(Scheduler::build_runtime),
                state: AtomicLifecycle::new(),
                scheduler: Mutex::new(None),
            }),
        })
    }
}

impl HaPool {
    pub fn builder() -> HaPoolBuilder {
        HaPoolBuilder::default()
    }

    pub fn id(&self) -> u64 {
        self.inner.id
    }

    pub fn name(&self) -> &str {
        &self.inner.name
    }

    pub fn config(&self) -> &PoolConfig {
        &self.inner.config
    }

    pub fn state(&self) -> LifecycleState {
        self.inner.state.load()
    }

    pub fn is_initialized(&self) -> bool {
        self.state() == LifecycleState::Initialized
    }

    /// Start background failure detection. Idempotent.
    ///
    /// Only the first caller starts the scheduler; concurrent callers wait
    /// on the lock and then return. Fails with `Closed` after `close()`.
    pub fn init(&self) -> Result<()> {
        match self.inner.state.load() {
            LifecycleState::Initialized => return Ok(()),
            LifecycleState::Closed => return Err(PoolError::Closed),
            LifecycleState::Uninitialized => {}
        }

        let mut scheduler = self.inner.scheduler.lock();
        match self.inner.state.load() {
            LifecycleState::Initialized => return Ok(()),
            LifecycleState::Closed => return Err(PoolError::Closed),
            LifecycleState::Uninitialized => {}
        }

        let health = &self.inner.config.health_check;
        let detector = FailureDetector::new(
            self.inner.name.clone(),
            self.inner.registry.clone(),
            self.inner.prober.clone(),
            health.probe_timeout(),
        );
        let runtime = (self.inner.runtime_factory)(
            &self.inner.name,
            self.inner.config.scheduler.worker_threads,
        )
        .map_err(PoolError::Init)?;

        *scheduler = Some(Scheduler::start(&self.inner.name, runtime, detector, health.period()));
        self.inner.state.store(LifecycleState::Initialized);

        let source: Arc<dyn StatsSource> = self.inner.clone();
        let weak: Weak<dyn StatsSource> = Arc::downgrade(&source);
        if let Err(e) = self.inner.tracker.add(weak) {
            tracing::warn!(pool = %self.inner.name, error = %e, "Failed to register pool with tracker");
        }
        metrics::record_total_weight(&self.inner.name, self.inner.registry.total_weight());

        tracing::info!(
            pool = %self.inner.name,
            backends = self.inner.registry.len(),
            period_ms = health.period_ms,
            "HA pool initialized"
        );
        Ok(())
    }

    /// Acquire a connection bound to a non-failed backend.
    pub fn get_connection(&self) -> Result<HaConnection> {
        self.get_connection_with_hint(None)
    }

    /// Acquire a connection, passing `hint` to the selection strategy.
    pub fn get_connection_with_hint(&self, hint: Option<RouteHint>) -> Result<HaConnection> {
        self.init()?;
        let id = self.inner.ids.connection.next();
        let handle = self.inner.select(hint.as_ref())?;
        tracing::trace!(pool = %self.inner.name, connection = id, backend = %handle.name(), "Connection bound");
        Ok(HaConnection::new(self.inner.clone(), id, handle, hint))
    }

    /// Stop failure detection and close every backend.
    ///
    /// Each backend close is bounded by `shutdown.close_timeout_ms`; failures
    /// are collected and returned once every backend was tried. Calling
    /// `close` again is a no-op.
    pub async fn close(&self) -> Result<()> {
        let (scheduler, previous) = {
            let mut guard = self.inner.scheduler.lock();
            let previous = self.inner.state.swap(LifecycleState::Closed);
            (guard.take(), previous)
        };
        if previous == LifecycleState::Closed {
            return Ok(());
        }

        if let Some(scheduler) = scheduler {
            scheduler.shutdown();
        }

        let close_timeout = self.inner.config.shutdown.close_timeout();
        let closes: Vec<_> = self
            .inner
            .registry
            .list_all()
            .into_iter()
            .map(|handle| {
                let name = handle.name().to_string();
                let task = tokio::spawn(async move { time::timeout(close_timeout, handle.close()).await });
                (name, task)
            })
            .collect();

        let mut errors = ShutdownError::default();
        for (name, task) in closes {
            let failure = match task.await {
                Ok(Ok(Ok(()))) => None,
                Ok(Ok(Err(e))) => Some(e),
                Ok(Err(_)) => Some(BackendError::Timeout),
                Err(e) => Some(BackendError::Other(format!("close task failed: {}", e))),
            };
            if let Some(e) = failure {
                tracing::warn!(pool = %self.inner.name, backend = %name, error = %e, "Failed to close backend");
                errors.push(name, e);
            }
        }

        if previous == LifecycleState::Initialized {
            if let Err(e) = self.inner.tracker.remove(self.inner.id) {
                tracing::warn!(pool = %self.inner.name, error = %e, "Failed to deregister pool from tracker");
            }
        }

        tracing::info!(pool = %self.inner.name, failures = errors.failures.len(), "HA pool closed");
        if errors.is_empty() {
            Ok(())
        } else {
            Err(errors.into())
        }
    }

    /// Register a backend, replacing any backend with the same name.
    ///
    /// Returns the replaced handle; closing it is up to the caller.
    pub fn add_backend(
        &self,
        name: impl Into<String>,
        weight: u32,
        source: Arc<dyn DataSource>,
    ) -> Option<Arc<BackendHandle>> {
        let previous = self
            .inner
            .registry
            .insert(Arc::new(BackendHandle::new(name, weight, source)));
        metrics::record_total_weight(&self.inner.name, self.inner.registry.total_weight());
        previous
    }

    pub fn backend(&self, name: &str) -> Option<Arc<BackendHandle>> {
        self.inner.registry.lookup(name)
    }

    /// Registered backend names, sorted.
    pub fn backend_names(&self) -> Vec<String> {
        let mut names = self.inner.registry.names();
        names.sort();
        names
    }

    pub fn registry(&self) -> &Arc<BackendRegistry> {
        &self.inner.registry
    }

    pub fn total_weight(&self) -> u64 {
        self.inner.registry.total_weight()
    }

    pub fn recompute_total_weight(&self) -> u64 {
        let total = self.inner.registry.recompute_total_weight();
        metrics::record_total_weight(&self.inner.name, total);
        total
    }

    /// Re-establish a backend's physical resource.
    ///
    /// The backend's failed flag is unchanged until the next probe. Fails
    /// with `Closed` once the pool is closed.
    pub async fn restart_backend(&self, name: &str) -> Result<()> {
        if self.inner.state.load() == LifecycleState::Closed {
            return Err(PoolError::Closed);
        }
        let handle = self
            .inner
            .registry
            .lookup(name)
            .ok_or_else(|| PoolError::UnknownBackend(name.to_string()))?;

        let outcome = handle.restart().await;
        metrics::record_restart(&self.inner.name, name, outcome.is_ok());
        outcome.map_err(|source| PoolError::Restart {
            backend: name.to_string(),
            source,
        })?;

        tracing::info!(pool = %self.inner.name, backend = %name, "Backend restarted");
        Ok(())
    }

    /// Run one probing pass right now, outside the periodic schedule.
    pub async fn probe_now(&self) -> ProbeSummary {
        FailureDetector::new(
            self.inner.name.clone(),
            self.inner.registry.clone(),
            self.inner.prober.clone(),
            self.inner.config.health_check.probe_timeout(),
        )
        .probe_once()
        .await
    }

    pub fn next_connection_id(&self) -> u64 {
        self.inner.ids.connection.next()
    }

    pub fn next_statement_id(&self) -> u64 {
        self.inner.ids.statement.next()
    }

    pub fn next_result_set_id(&self) -> u64 {
        self.inner.ids.result_set.next()
    }

    pub fn next_transaction_id(&self) -> u64 {
        self.inner.ids.transaction.next()
    }

    pub fn stats(&self) -> PoolStats {
        self.inner.stats()
    }
}

impl fmt::Debug for HaPool {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HaPool")
            .field("id", &self.inner.id)
            .field("name", &self.inner.name)
            .field("state", &self.inner.state.load())
            .field("backends", &self.inner.registry.len())
            .field("strategy", &self.inner.strategy)
            .finish()
    }
}

impl PoolInner {
    pub(crate) fn name(&self) -> &str {
        &self.name
    }

    pub(crate) fn ids(&self) -> &IdGenerators {
        &self.ids
    }

    /// Pick a non-failed backend, enforcing the selection contract.
    pub(crate) fn select(&self, hint: Option<&RouteHint>) -> Result<Arc<BackendHandle>> {
        if self.state.load() == LifecycleState::Closed {
            return Err(PoolError::Closed);
        }

        let selected = selection::select_available(&self.registry, self.strategy.as_ref(), hint, |handle| {
            self.on_not_available(handle)
        });

        match &selected {
            Ok(handle) => metrics::record_connection_acquired(&self.name, handle.name()),
            Err(_) => {
                tracing::debug!(pool = %self.name, backends = self.registry.len(), "No available backend");
                metrics::record_no_available_backend(&self.name);
            }
        }
        selected
    }

    fn on_not_available(&self, handle: &Arc<BackendHandle>) {
        self.strategy.handle_not_available(handle);
        if self.config.failover.restart_on_failure {
            self.schedule_restart(handle);
        }
    }

    /// Queue a restart of `handle` on the scheduler. Never blocks; skipped
    /// when the scheduler is busy starting or stopping, or a restart is
    /// already in flight.
    fn schedule_restart(&self, handle: &Arc<BackendHandle>) {
        let Some(runtime) = self
            .scheduler
            .try_lock()
            .and_then(|guard| guard.as_ref().and_then(Scheduler::handle))
        else {
            return;
        };
        if !handle.begin_restart() {
            return;
        }

        tracing::debug!(pool = %self.name, backend = %handle.name(), "Scheduling backend restart");
        runtime.spawn(restart_with_backoff(
            self.name.clone(),
            handle.clone(),
            self.restart_policy,
        ));
    }
}

async fn restart_with_backoff(pool: String, handle: Arc<BackendHandle>, policy: RestartPolicy) {
    for attempt in 0..policy.max_attempts {
        time::sleep(policy.delay_before(attempt)).await;
        if !handle.is_failed() {
            break;
        }

        match handle.restart().await {
            Ok(()) => {
                metrics::record_restart(&pool, handle.name(), true);
                tracing::info!(pool = %pool, backend = %handle.name(), attempt, "Backend restarted");
                break;
            }
            Err(e) => {
                metrics::record_restart(&pool, handle.name(), false);
                tracing::warn!(pool = %pool, backend = %handle.name(), attempt, error = %e, "Backend restart failed");
            }
        }
    }
    handle.end_restart();
}

impl StatsSource for PoolInner {
    fn id(&self) -> u64 {
        self.id
    }

    fn stats(&self) -> PoolStats {
        let mut backends: Vec<BackendStats> = self
            .registry
            .list_all()
            .iter()
            .map(|h| BackendStats {
                name: h.name().to_string(),
                source: h.source().describe(),
                weight: h.weight(),
                failed: h.is_failed(),
                active_connections: h.active_connections(),
            })
            .collect();
        backends.sort_by(|a, b| a.name.cmp(&b.name));

        PoolStats {
            id: self.id,
            name: self.name.clone(),
            state: self.state.load(),
            total_weight: self.registry.total_weight(),
            backends,
        }
    }
}

impl Drop for PoolInner {
    fn drop(&mut self) {
        if let Some(scheduler) = self.scheduler.get_mut().take() {
            scheduler.shutdown();
            if let Err(e) = self.tracker.remove(self.id) {
                tracing::warn!(pool = %self.name, error = %e, "Failed to deregister pool from tracker");
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::TcpDataSource;
    use std::io;
    use std::sync::atomic::AtomicBool;
    use std::time::Duration;
    use tokio::runtime::Runtime;

    static FAIL_NEXT_RUNTIME: AtomicBool = AtomicBool::new(true);

    fn flaky_runtime(pool: &str, worker_threads: usize) -> io::Result<Runtime> {
        if FAIL_NEXT_RUNTIME.swap(false, Ordering::SeqCst) {
            return Err(io::Error::new(io::ErrorKind::Other, "no threads left"));
        }
        Scheduler::build_runtime(pool, worker_threads)
    }

    fn pool(config: PoolConfig, tracker: Arc<StatRegistry>) -> Result<HaPool> {
        let addr = "127.0.0.1:1".parse().unwrap();
        HaPool::builder()
            .config(config)
            .tracker(tracker)
            .backend("a", 1, Arc::new(TcpDataSource::new(addr, Duration::from_millis(50))))
            .build()
    }

    #[test]
    fn test_failed_init_can_be_retried() {
        let tracker = Arc::new(StatRegistry::new());
        let addr = "127.0.0.1:1".parse().unwrap();
        let pool = HaPool::builder()
            .tracker(tracker.clone())
            .runtime_factory(flaky_runtime)
            .backend("a", 1, Arc::new(TcpDataSource::new(addr, Duration::from_millis(50))))
            .build()
            .unwrap();

        assert!(matches!(pool.init(), Err(PoolError::Init(_))));
        assert_eq!(pool.state(), LifecycleState::Uninitialized);
        assert!(!tracker.contains(pool.id()));

        pool.init().unwrap();
        assert_eq!(pool.state(), LifecycleState::Initialized);
        assert!(tracker.contains(pool.id()));
    }

    #[test]
    fn test_zero_period_rejected_at_build() {
        let mut config = PoolConfig::default();
        config.health_check.period_ms = 0;

        match pool(config, Arc::new(StatRegistry::new())) {
            Err(PoolError::InvalidConfig(errors)) => {
                assert_eq!(errors, vec![crate::config::ValidationError::ZeroPeriod]);
            }
            other => panic!("expected InvalidConfig, got {:?}", other),
        }
    }

    #[test]
    fn test_zero_probe_timeout_rejected_at_build() {
        let mut config = PoolConfig::default();
        config.health_check.probe_timeout_ms = 0;

        match pool(config, Arc::new(StatRegistry::new())) {
            Err(PoolError::InvalidConfig(errors)) => {
                assert_eq!(errors, vec![crate::config::ValidationError::ZeroProbeTimeout]);
            }
            other => panic!("expected InvalidConfig, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_restart_after_close_is_rejected() {
        let pool = pool(PoolConfig::default(), Arc::new(StatRegistry::new())).unwrap();
        pool.init().unwrap();
        pool.close().await.unwrap();

        assert!(matches!(pool.restart_backend("a").await, Err(PoolError::Closed)));
        let source = pool.backend("a").unwrap().source().clone();
        assert!(matches!(source.connect().await, Err(BackendError::Closed)));
    }
}
