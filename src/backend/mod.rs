//! Backend subsystem.
//!
//! # Data Flow
//! ```text
//! Configuration (name, weight, address)
//!     → source.rs (DataSource opens physical connections)
//!     → handle.rs (BackendHandle: weight + failed flag + source)
//!     → registry (named handles)
//! ```
//!
//! # Design Decisions
//! - The pool never speaks a wire protocol; data sources are injected
//! - Failed flag lives on the handle, written only by the failure detector
//! - Restart is an administrative trigger, not a health assertion

pub mod handle;
pub mod source;
pub mod tcp;

pub use handle::{ActiveGuard, BackendHandle};
pub use source::{BackendError, DataSource, PhysicalConnection};
pub use tcp::TcpDataSource;
