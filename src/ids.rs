//! Monotonic identifier generators.
//!
//! Every connection, statement, result set and transaction created through
//! a pool is tagged with an id from its own counter. Counters are
//! independent of each other and start at zero.

use std::sync::atomic::{AtomicU64, Ordering};

/// A single monotonic counter.
#[derive(Debug, Default)]
pub struct IdSeed(AtomicU64);

impl IdSeed {
    pub fn new() -> Self {
        Self::default()
    }

    /// Return the next id. Never returns the same value twice.
    pub fn next(&self) -> u64 {
        self.0.fetch_add(1, Ordering::Relaxed)
    }
}

/// The four per-pool id counters.
#[derive(Debug, Default)]
pub struct IdGenerators {
    pub connection: IdSeed,
    pub statement: IdSeed,
    pub result_set: IdSeed,
    pub transaction: IdSeed,
}

impl IdGenerators {
    pub fn new() -> Self {
        Self::default()
    }
}
