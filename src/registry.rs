//! Backend registry.
//!
//! # Responsibilities
//! - Map backend names to handles
//! - Maintain the aggregate weight of all handles
//! - Hand out lock-free snapshots for probing and selection
//!
//! # Design Decisions
//! - `DashMap` for concurrent reads and inserts
//! - Weight mutations serialize on one writer lock; readers never lock
//! - The incremental total is authoritative, `recompute_total_weight`
//!   re-sums under the same lock and can only confirm it

use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use parking_lot::Mutex;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use crate::backend::BackendHandle;
use crate::error::{PoolError, Result};

/// Concurrent map of named backend handles.
#[derive(Debug, Default)]
pub struct BackendRegistry {
    handles: DashMap<String, Arc<BackendHandle>>,
    total_weight: AtomicU64,
    /// Serializes every change to the map's weights.
    writer: Mutex<()>,
}

impl BackendRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert a handle, replacing any handle with the same name.
    ///
    /// Returns the replaced handle so the caller can close it.
    pub fn insert(&self, handle: Arc<BackendHandle>) -> Option<Arc<BackendHandle>> {
        let _writer = self.writer.lock();
        let weight = u64::from(handle.weight());
        let previous = self.handles.insert(handle.name().to_string(), handle);
        if let Some(prev) = &previous {
            self.total_weight
                .fetch_sub(u64::from(prev.weight()), Ordering::AcqRel);
        }
        self.total_weight.fetch_add(weight, Ordering::AcqRel);
        previous
    }

    /// Insert a handle, rejecting names that are already registered.
    pub fn try_insert(&self, handle: Arc<BackendHandle>) -> Result<()> {
        let _writer = self.writer.lock();
        match self.handles.entry(handle.name().to_string()) {
            Entry::Occupied(entry) => Err(PoolError::DuplicateBackend(entry.key().clone())),
            Entry::Vacant(entry) => {
                self.total_weight
                    .fetch_add(u64::from(handle.weight()), Ordering::AcqRel);
                entry.insert(handle);
                Ok(())
            }
        }
    }

    pub fn lookup(&self, name: &str) -> Option<Arc<BackendHandle>> {
        self.handles.get(name).map(|r| r.value().clone())
    }

    /// Snapshot of every handle. Iteration order is unspecified.
    pub fn list_all(&self) -> Vec<Arc<BackendHandle>> {
        self.handles.iter().map(|r| r.value().clone()).collect()
    }

    pub fn names(&self) -> Vec<String> {
        self.handles.iter().map(|r| r.key().clone()).collect()
    }

    pub fn len(&self) -> usize {
        self.handles.len()
    }

    pub fn is_empty(&self) -> bool {
        self.handles.is_empty()
    }

    pub fn total_weight(&self) -> u64 {
        self.total_weight.load(Ordering::Acquire)
    }

    /// Fully re-sum the weights of all handles.
    pub fn recompute_total_weight(&self) -> u64 {
        let _writer = self.writer.lock();
        let total: u64 = self
            .handles
            .iter()
            .map(|r| u64::from(r.value().weight()))
            .sum();
        self.total_weight.store(total, Ordering::Release);
        total
    }
}
