//! Pool statistics and process-wide tracking.
//!
//! # Responsibilities
//! - Read-only snapshots of a pool (names, failed flags, weights)
//! - Track every initialized pool for external enumeration
//!
//! # Design Decisions
//! - The tracker is injected; `StatRegistry::global()` is only the default
//! - Trackers hold weak references so a dropped pool disappears on its own
//! - Tracker failures are logged by the pool and never affect it

use dashmap::DashMap;
use serde::Serialize;
use std::fmt::Debug;
use std::sync::{Arc, OnceLock, Weak};
use thiserror::Error;

use crate::lifecycle::LifecycleState;

/// Per-backend statistics.
#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct BackendStats {
    pub name: String,
    pub source: String,
    pub weight: u32,
    pub failed: bool,
    pub active_connections: usize,
}

/// Statistics for one pool.
#[derive(Debug, Clone, Serialize)]
pub struct PoolStats {
    pub id: u64,
    pub name: String,
    pub state: LifecycleState,
    pub total_weight: u64,
    /// Sorted by backend name.
    pub backends: Vec<BackendStats>,
}

impl PoolStats {
    pub fn failed_count(&self) -> usize {
        self.backends.iter().filter(|b| b.failed).count()
    }
}

/// Anything that can report pool statistics.
pub trait StatsSource: Send + Sync {
    fn id(&self) -> u64;
    fn stats(&self) -> PoolStats;
}

#[derive(Debug, Error)]
#[error("Tracker error: {0}")]
pub struct TrackerError(pub String);

/// Registry notified when pools start and stop.
pub trait PoolTracker: Send + Sync + Debug {
    fn add(&self, pool: Weak<dyn StatsSource>) -> Result<(), TrackerError>;
    fn remove(&self, id: u64) -> Result<(), TrackerError>;
}

/// In-memory tracker of live pools.
#[derive(Default)]
pub struct StatRegistry {
    pools: DashMap<u64, Weak<dyn StatsSource>>,
}

impl StatRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// The process-wide registry used when no tracker is injected.
    pub fn global() -> Arc<StatRegistry> {
        static GLOBAL: OnceLock<Arc<StatRegistry>> = OnceLock::new();
        GLOBAL.get_or_init(|| Arc::new(StatRegistry::new())).clone()
    }

    /// Number of tracked pools still alive.
    pub fn len(&self) -> usize {
        self.pools.iter().filter(|r| r.value().strong_count() > 0).count()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn contains(&self, id: u64) -> bool {
        self.pools
            .get(&id)
            .map(|r| r.value().strong_count() > 0)
            .unwrap_or(false)
    }

    /// Stats of every live tracked pool, sorted by id.
    pub fn snapshot(&self) -> Vec<PoolStats> {
        let mut stats: Vec<PoolStats> = self
            .pools
            .iter()
            .filter_map(|r| r.value().upgrade())
            .map(|pool| pool.stats())
            .collect();
        // Forget pools dropped without being closed
        self.pools.retain(|_, pool| pool.strong_count() > 0);
        stats.sort_by_key(|s| s.id);
        stats
    }
}

impl Debug for StatRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StatRegistry")
            .field("pools", &self.pools.len())
            .finish()
    }
}

impl PoolTracker for StatRegistry {
    fn add(&self, pool: Weak<dyn StatsSource>) -> Result<(), TrackerError> {
        let source = pool
            .upgrade()
            .ok_or_else(|| TrackerError("pool already dropped".into()))?;
        self.pools.insert(source.id(), pool);
        Ok(())
    }

    fn remove(&self, id: u64) -> Result<(), TrackerError> {
        self.pools
            .remove(&id)
            .map(|_| ())
            .ok_or_else(|| TrackerError(format!("pool {} is not tracked", id)))
    }
}
