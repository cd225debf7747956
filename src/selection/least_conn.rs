//! Least active connections selection strategy.

use std::sync::Arc;

use crate::backend::BackendHandle;
use crate::selection::{RouteHint, SelectionStrategy};

/// Least active selector.
/// Selects the backend with the fewest open pool connections.
#[derive(Debug, Default)]
pub struct LeastActive;

impl LeastActive {
    pub fn new() -> Self {
        Self
    }
}

impl SelectionStrategy for LeastActive {
    fn select(&self, candidates: &[Arc<BackendHandle>], _hint: Option<&RouteHint>) -> Option<Arc<BackendHandle>> {
        // Ties go to the first candidate (stability)
        candidates
            .iter()
            .filter(|h| !h.is_failed())
            .min_by_key(|h| h.active_connections())
            .cloned()
    }
}
