//! High-availability pool over interchangeable backend stores.
//!
//! # Architecture Overview
//!
//! ```text
//!   caller                 ┌──────────────────────────────────────────────┐
//!   ──get_connection()────▶│ pool (HaPool)                                │
//!                          │   init once → lifecycle::Scheduler           │
//!                          │   mint id   → ids                            │
//!                          │   select    → selection ──reads──▶ registry  │
//!   ◀──HaConnection────────│                                   ▲          │
//!                          │                                   │ flips    │
//!                          │   scheduler runtime: health::FailureDetector │
//!                          │       └─ HealthProber per backend ┘          │
//!                          └──────────────────────────────────────────────┘
//!                                      │ connect / restart / close
//!                                      ▼
//!                              backend::DataSource (one per backend)
//! ```

pub mod backend;
pub mod config;
pub mod connection;
pub mod error;
pub mod health;
pub mod ids;
pub mod lifecycle;
pub mod observability;
pub mod pool;
pub mod registry;
pub mod resilience;
pub mod selection;
pub mod stats;

pub use backend::{BackendError, BackendHandle, DataSource, PhysicalConnection};
pub use config::PoolConfig;
pub use connection::{HaConnection, StatementResult};
pub use error::{PoolError, Result};
pub use health::HealthProber;
pub use lifecycle::LifecycleState;
pub use pool::{HaPool, HaPoolBuilder};
pub use selection::{RouteHint, SelectionStrategy};
pub use stats::{PoolStats, PoolTracker, StatRegistry};
