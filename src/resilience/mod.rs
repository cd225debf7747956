//! Resilience subsystem.
//!
//! # Data Flow
//! ```text
//! Selection rejects a failed backend (restart_on_failure enabled)
//!     → pool schedules a restart task on the scheduler runtime
//!     → backoff.rs (jittered exponential delay between attempts)
//!     → BackendHandle::restart
//!     → next probe decides whether the backend is back
//! ```

pub mod backoff;

pub use backoff::{calculate_backoff, RestartPolicy};
