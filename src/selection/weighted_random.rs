//! Weighted random selection strategy.

use rand::Rng;
use std::sync::Arc;

use crate::backend::BackendHandle;
use crate::selection::{RouteHint, SelectionStrategy};

/// Picks a candidate with probability proportional to its weight.
///
/// Zero-weight candidates are only chosen when every candidate has
/// weight zero, in which case the pick is uniform.
#[derive(Debug, Default)]
pub struct WeightedRandom;

impl WeightedRandom {
    pub fn new() -> Self {
        Self
    }

    fn pick(candidates: &[Arc<BackendHandle>], point: u64) -> Option<Arc<BackendHandle>> {
        let mut cursor = point;
        for handle in candidates {
            let weight = u64::from(handle.weight());
            if cursor < weight {
                return Some(handle.clone());
            }
            cursor -= weight;
        }
        None
    }
}

impl SelectionStrategy for WeightedRandom {
    fn select(&self, candidates: &[Arc<BackendHandle>], _hint: Option<&RouteHint>) -> Option<Arc<BackendHandle>> {
        if candidates.is_empty() {
            return None;
        }

        let total: u64 = candidates.iter().map(|h| u64::from(h.weight())).sum();
        let mut rng = rand::thread_rng();
        if total == 0 {
            return Some(candidates[rng.gen_range(0..candidates.len())].clone());
        }
        Self::pick(candidates, rng.gen_range(0..total))
    }
}
