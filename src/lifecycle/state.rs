//! Pool lifecycle state.
//!
//! # State Transitions
//! ```text
//! Uninitialized → Initialized: first successful init()
//! Uninitialized → Closed:      close() before init()
//! Initialized   → Closed:      close()
//! ```
//!
//! Closed is terminal.

use serde::Serialize;
use std::sync::atomic::{AtomicU8, Ordering};

/// Lifecycle state of a pool.
#[repr(u8)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum LifecycleState {
    Uninitialized = 0,
    Initialized = 1,
    Closed = 2,
}

impl From<u8> for LifecycleState {
    fn from(val: u8) -> Self {
        match val {
            1 => LifecycleState::Initialized,
            2 => LifecycleState::Closed,
            _ => LifecycleState::Uninitialized,
        }
    }
}

/// Lock-free cell holding a [`LifecycleState`].
#[derive(Debug)]
pub struct AtomicLifecycle(AtomicU8);

impl AtomicLifecycle {
    pub fn new() -> Self {
        Self(AtomicU8::new(LifecycleState::Uninitialized as u8))
    }

    pub fn load(&self) -> LifecycleState {
        self.0.load(Ordering::Acquire).into()
    }

    pub fn store(&self, state: LifecycleState) {
        self.0.store(state as u8, Ordering::Release);
    }

    /// Store `state` and return the previous one.
    pub fn swap(&self, state: LifecycleState) -> LifecycleState {
        self.0.swap(state as u8, Ordering::AcqRel).into()
    }
}

impl Default for AtomicLifecycle {
    fn default() -> Self {
        Self::new()
    }
}
