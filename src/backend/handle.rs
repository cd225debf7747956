//! Backend handle.
//!
//! # Responsibilities
//! - Represent a single named backend with its selection weight
//! - Track the failed flag written by the failure detector
//! - Track active connections (for least-active selection)
//! - Delegate restart and close to the physical data source

use std::fmt;
use std::ops::Deref;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;

use crate::backend::source::{BackendError, DataSource};

/// A single backend in the pool.
pub struct BackendHandle {
    name: String,
    weight: u32,
    /// Set by the failure detector only.
    failed: AtomicBool,
    /// Number of open connections bound to this backend.
    active_connections: AtomicUsize,
    /// Set while an automatic restart is scheduled or running.
    restarting: AtomicBool,
    source: Arc<dyn DataSource>,
}

impl BackendHandle {
    /// Create a new, not failed, backend handle.
    pub fn new(name: impl Into<String>, weight: u32, source: Arc<dyn DataSource>) -> Self {
        Self {
            name: name.into(),
            weight,
            failed: AtomicBool::new(false),
            active_connections: AtomicUsize::new(0),
            restarting: AtomicBool::new(false),
            source,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn weight(&self) -> u32 {
        self.weight
    }

    pub fn source(&self) -> &Arc<dyn DataSource> {
        &self.source
    }

    pub fn is_failed(&self) -> bool {
        self.failed.load(Ordering::Acquire)
    }

    /// Update the failed flag. Returns true if the value changed.
    pub(crate) fn set_failed(&self, failed: bool) -> bool {
        self.failed.swap(failed, Ordering::AcqRel) != failed
    }

    /// Get the current number of active connections.
    pub fn active_connections(&self) -> usize {
        self.active_connections.load(Ordering::Relaxed)
    }

    /// Count a connection against this backend until the guard drops.
    pub fn acquire(self: &Arc<Self>) -> ActiveGuard {
        self.active_connections.fetch_add(1, Ordering::Relaxed);
        ActiveGuard {
            handle: self.clone(),
        }
    }

    /// Re-establish the physical resource.
    ///
    /// The failed flag is left alone: only the next successful probe
    /// clears it.
    pub async fn restart(&self) -> Result<(), BackendError> {
        self.source.restart().await
    }

    pub(crate) async fn close(&self) -> Result<(), BackendError> {
        self.source.close().await
    }

    /// Claim the right to run an automatic restart. Returns false if one
    /// is already in flight.
    pub(crate) fn begin_restart(&self) -> bool {
        self.restarting
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_ok()
    }

    pub(crate) fn end_restart(&self) {
        self.restarting.store(false, Ordering::Release);
    }
}

impl fmt::Debug for BackendHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BackendHandle")
            .field("name", &self.name)
            .field("weight", &self.weight)
            .field("failed", &self.is_failed())
            .field("active_connections", &self.active_connections())
            .field("source", &self.source.describe())
            .finish()
    }
}

/// A RAII guard that manages the active connection count.
#[derive(Debug)]
pub struct ActiveGuard {
    handle: Arc<BackendHandle>,
}

impl Deref for ActiveGuard {
    type Target = BackendHandle;
    fn deref(&self) -> &Self::Target {
        &self.handle
    }
}

impl Drop for ActiveGuard {
    fn drop(&mut self) {
        self.handle.active_connections.fetch_sub(1, Ordering::Relaxed);
    }
}
