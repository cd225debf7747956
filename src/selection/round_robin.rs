//! Round-robin selection strategy.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use crate::backend::BackendHandle;
use crate::selection::{RouteHint, SelectionStrategy};

/// Round-robin selector.
/// Stores an internal counter to rotate through candidates.
#[derive(Debug, Default)]
pub struct RoundRobin {
    counter: AtomicUsize,
}

impl RoundRobin {
    pub fn new() -> Self {
        Self::default()
    }
}

impl SelectionStrategy for RoundRobin {
    fn select(&self, candidates: &[Arc<BackendHandle>], _hint: Option<&RouteHint>) -> Option<Arc<BackendHandle>> {
        if candidates.is_empty() {
            return None;
        }

        // Skip handles that failed after the snapshot; bounded by one lap
        let start = self.counter.fetch_add(1, Ordering::Relaxed);
        let len = candidates.len();

        for i in 0..len {
            let handle = &candidates[(start + i) % len];
            if !handle.is_failed() {
                return Some(handle.clone());
            }
        }
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::selection::test_support::handle;

    #[test]
    fn test_round_robin() {
        let rr = RoundRobin::new();
        let candidates = vec![handle("a", 1), handle("b", 1)];

        assert_eq!(rr.select(&candidates, None).unwrap().name(), "a");
        assert_eq!(rr.select(&candidates, None).unwrap().name(), "b");
        assert_eq!(rr.select(&candidates, None).unwrap().name(), "a");
    }

    #[test]
    fn test_round_robin_skips_failed() {
        let rr = RoundRobin::new();
        let candidates = vec![handle("a", 1), handle("b", 1), handle("c", 1)];
        candidates[1].set_failed(true);

        for _ in 0..6 {
            assert_ne!(rr.select(&candidates, None).unwrap().name(), "b");
        }

        candidates[0].set_failed(true);
        candidates[2].set_failed(true);
        assert!(rr.select(&candidates, None).is_none());
    }
}
