//! Health checking subsystem.
//!
//! # Data Flow
//! ```text
//! Scheduler runtime
//!     → detector.rs (one pass per period)
//!     → prober.rs (probe each backend's data source)
//!     → BackendHandle failed flag
//!     → observed by the next selection
//! ```
//!
//! # Design Decisions
//! - Health state is per-backend, flipped on every probe (no hysteresis)
//! - Selection only reads flags; it never waits on the detector
//! - Staleness is bounded by the probe period

pub mod detector;
pub mod prober;

pub use detector::{FailureDetector, ProbeSummary};
pub use prober::{ConnectProber, HealthProber};
