//! Lifecycle management subsystem.
//!
//! # Data Flow
//! ```text
//! Startup (pool.rs, first init() or get_connection()):
//!     check state → lock → re-check → start scheduler.rs → Initialized
//!     → register with the stats tracker
//!
//! Shutdown (pool.rs, close()):
//!     lock → Closed → abort scheduler → close every backend (bounded)
//!     → deregister from the stats tracker
//! ```
//!
//! # Design Decisions
//! - Double-checked init: the lock guards the transition, not every call
//! - Closed is terminal; init() after close() is an error
//! - Shutdown has timeout: each backend close is bounded

pub mod scheduler;
pub mod state;

pub use scheduler::{RuntimeFactory, Scheduler};
pub use state::{AtomicLifecycle, LifecycleState};
