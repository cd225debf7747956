//! Backend selection subsystem.
//!
//! # Data Flow
//! ```text
//! Connection request (optional RouteHint)
//!     → select_available (snapshot registry, drop failed handles)
//!     → SelectionStrategy::select (policy picks one candidate)
//!         - round_robin.rs (rotate through candidates)
//!         - weighted_random.rs (pick proportional to weight)
//!         - least_conn.rs (pick fewest active connections)
//!     → re-check failed flag at bind time
//!     → handle or NoAvailableBackend
//! ```
//!
//! # Design Decisions
//! - Strategies only see non-failed candidates; the contract is enforced
//!   here, not trusted to each policy
//! - Every rejected handle is reported through `handle_not_available`
//! - Never blocks: at most one strategy call per candidate

pub mod least_conn;
pub mod round_robin;
pub mod weighted_random;

use std::fmt::Debug;
use std::sync::Arc;

use crate::backend::BackendHandle;
use crate::config::StrategyKind;
use crate::error::{PoolError, Result};
use crate::registry::BackendRegistry;

pub use least_conn::LeastActive;
pub use round_robin::RoundRobin;
pub use weighted_random::WeightedRandom;

/// Routing information attached to a connection request.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RouteHint {
    /// Bind to this backend if it is available.
    pub preferred: Option<String>,
}

impl RouteHint {
    pub fn preferred(backend: impl Into<String>) -> Self {
        Self {
            preferred: Some(backend.into()),
        }
    }
}

/// A backend selection policy.
pub trait SelectionStrategy: Send + Sync + Debug {
    /// Choose one of `candidates`, or `None` to give up.
    ///
    /// `candidates` is never empty, holds no failed handle at snapshot
    /// time and is sorted by name.
    fn select(
        &self,
        candidates: &[Arc<BackendHandle>],
        hint: Option<&RouteHint>,
    ) -> Option<Arc<BackendHandle>>;

    /// Called for every handle a selection attempt rejects.
    ///
    /// Must not block.
    fn handle_not_available(&self, _handle: &BackendHandle) {}
}

/// Build one of the bundled strategies.
pub fn from_kind(kind: StrategyKind) -> Arc<dyn SelectionStrategy> {
    match kind {
        StrategyKind::RoundRobin => Arc::new(RoundRobin::new()),
        StrategyKind::WeightedRandom => Arc::new(WeightedRandom::new()),
        StrategyKind::LeastActive => Arc::new(LeastActive::new()),
    }
}

/// Pick a non-failed backend from `registry` using `strategy`.
///
/// `on_rejected` runs for each handle excluded because it is failed.
pub fn select_available(
    registry: &BackendRegistry,
    strategy: &dyn SelectionStrategy,
    hint: Option<&RouteHint>,
    mut on_rejected: impl FnMut(&Arc<BackendHandle>),
) -> Result<Arc<BackendHandle>> {
    let mut candidates = Vec::with_capacity(registry.len());
    for handle in registry.list_all() {
        if handle.is_failed() {
            on_rejected(&handle);
        } else {
            candidates.push(handle);
        }
    }
    candidates.sort_by(|a, b| a.name().cmp(b.name()));

    if let Some(preferred) = hint.and_then(|h| h.preferred.as_deref()) {
        if let Some(handle) = candidates.iter().find(|c| c.name() == preferred) {
            if !handle.is_failed() {
                return Ok(handle.clone());
            }
        }
    }

    let attempts = candidates.len();
    for _ in 0..attempts {
        if candidates.is_empty() {
            break;
        }
        let Some(chosen) = strategy.select(&candidates, hint) else {
            break;
        };

        match candidates.iter().position(|c| Arc::ptr_eq(c, &chosen)) {
            Some(_) if !chosen.is_failed() => return Ok(chosen),
            Some(index) => {
                // Went down between snapshot and bind
                on_rejected(&chosen);
                candidates.remove(index);
            }
            None => {
                tracing::warn!(backend = %chosen.name(), "Strategy chose a backend outside the candidate set");
                on_rejected(&chosen);
            }
        }
    }

    Err(PoolError::NoAvailableBackend)
}

#[cfg(test)]
pub(crate) mod test_support {
    use super::*;
    use crate::backend::TcpDataSource;
    use std::time::Duration;

    pub fn handle(name: &str, weight: u32) -> Arc<BackendHandle> {
        let source = TcpDataSource::new("127.0.0.1:1".parse().unwrap(), Duration::from_millis(50));
        Arc::new(BackendHandle::new(name, weight, Arc::new(source)))
    }
}

#[cfg(test)]
mod tests {
    use super::test_support::handle;
    use super::*;
    use std::collections::HashSet;
    use std::sync::Mutex;

    /// Always returns the first candidate, records rejections.
    #[derive(Debug, Default)]
    struct First {
        rejected: Mutex<Vec<String>>,
    }

    impl SelectionStrategy for First {
        fn select(&self, candidates: &[Arc<BackendHandle>], _hint: Option<&RouteHint>) -> Option<Arc<BackendHandle>> {
            candidates.first().cloned()
        }

        fn handle_not_available(&self, handle: &BackendHandle) {
            self.rejected.lock().unwrap().push(handle.name().to_string());
        }
    }

    /// Returns a handle that is not a candidate.
    #[derive(Debug)]
    struct Rogue(Arc<BackendHandle>);

    impl SelectionStrategy for Rogue {
        fn select(&self, _candidates: &[Arc<BackendHandle>], _hint: Option<&RouteHint>) -> Option<Arc<BackendHandle>> {
            Some(self.0.clone())
        }
    }

    fn select(registry: &BackendRegistry, strategy: &First, hint: Option<&RouteHint>) -> Result<Arc<BackendHandle>> {
        select_available(registry, strategy, hint, |h| strategy.handle_not_available(h))
    }

    #[test]
    fn test_failed_handles_are_skipped_and_reported() {
        let registry = BackendRegistry::new();
        let a = handle("a", 1);
        registry.insert(a.clone());
        registry.insert(handle("b", 1));
        a.set_failed(true);

        let strategy = First::default();
        let chosen = select(&registry, &strategy, None).unwrap();
        assert_eq!(chosen.name(), "b");
        assert_eq!(*strategy.rejected.lock().unwrap(), vec!["a".to_string()]);
    }

    #[test]
    fn test_all_failed_is_no_available_backend() {
        let registry = BackendRegistry::new();
        for name in ["a", "b", "c"] {
            let h = handle(name, 1);
            h.set_failed(true);
            registry.insert(h);
        }

        let strategy = First::default();
        let err = select(&registry, &strategy, None).unwrap_err();
        assert!(matches!(err, PoolError::NoAvailableBackend));

        let rejected: HashSet<_> = strategy.rejected.lock().unwrap().iter().cloned().collect();
        assert_eq!(rejected.len(), 3);
    }

    #[test]
    fn test_empty_registry_is_no_available_backend() {
        let registry = BackendRegistry::new();
        let err = select(&registry, &First::default(), None).unwrap_err();
        assert!(matches!(err, PoolError::NoAvailableBackend));
    }

    #[test]
    fn test_preferred_backend_wins_when_available() {
        let registry = BackendRegistry::new();
        registry.insert(handle("a", 1));
        let b = handle("b", 1);
        registry.insert(b.clone());

        let hint = RouteHint::preferred("b");
        assert_eq!(select(&registry, &First::default(), Some(&hint)).unwrap().name(), "b");

        b.set_failed(true);
        assert_eq!(select(&registry, &First::default(), Some(&hint)).unwrap().name(), "a");
    }

    /// Records the hint of every call, picks the last candidate.
    #[derive(Debug, Default)]
    struct Recording {
        hints: Mutex<Vec<Option<RouteHint>>>,
    }

    impl SelectionStrategy for Recording {
        fn select(&self, candidates: &[Arc<BackendHandle>], hint: Option<&RouteHint>) -> Option<Arc<BackendHandle>> {
            self.hints.lock().unwrap().push(hint.cloned());
            candidates.last().cloned()
        }
    }

    #[test]
    fn test_unmatched_preferred_falls_back_to_strategy() {
        let registry = BackendRegistry::new();
        registry.insert(handle("a", 1));
        registry.insert(handle("b", 1));

        let strategy = Recording::default();
        let hint = RouteHint::preferred("gone");
        let chosen = select_available(&registry, &strategy, Some(&hint), |_| {}).unwrap();
        assert_eq!(chosen.name(), "b");

        let chosen = select_available(&registry, &strategy, None, |_| {}).unwrap();
        assert_eq!(chosen.name(), "b");
        assert_eq!(*strategy.hints.lock().unwrap(), vec![Some(hint), None]);
    }

    #[test]
    fn test_foreign_handle_is_rejected() {
        let registry = BackendRegistry::new();
        registry.insert(handle("a", 1));
        let rogue = Rogue(handle("outsider", 1));

        let mut rejected = Vec::new();
        let err = select_available(&registry, &rogue, None, |h| rejected.push(h.name().to_string())).unwrap_err();
        assert!(matches!(err, PoolError::NoAvailableBackend));
        assert_eq!(rejected, vec!["outsider".to_string()]);
    }

    #[test]
    fn test_from_kind() {
        let registry = BackendRegistry::new();
        registry.insert(handle("only", 1));
        for kind in [StrategyKind::RoundRobin, StrategyKind::WeightedRandom, StrategyKind::LeastActive] {
            let strategy = from_kind(kind);
            let chosen = select_available(&registry, strategy.as_ref(), None, |_| {}).unwrap();
            assert_eq!(chosen.name(), "only");
        }
    }
}
