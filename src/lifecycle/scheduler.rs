//! Background scheduler.
//!
//! # Responsibilities
//! - Own a dedicated multi-thread runtime for background work
//! - Run the failure detector on it
//! - Host administrative tasks (automatic restarts)
//!
//! # Design Decisions
//! - Dedicated runtime: probes never compete with callers' executors
//! - Shutdown is non-graceful: in-flight probes are dropped, not awaited
//! - Safe to drop from inside an async context

use std::io;
use std::time::Duration;
use tokio::runtime::{Builder, Handle, Runtime};
use tokio::task::JoinHandle;

use crate::health::FailureDetector;

/// A running background scheduler.
#[derive(Debug)]
pub struct Scheduler {
    runtime: Option<Runtime>,
    detector: Option<JoinHandle<()>>,
}

/// Builds the runtime a scheduler runs on, given the pool name and worker count.
pub type RuntimeFactory = fn(&str, usize) -> io::Result<Runtime>;

impl Scheduler {
    /// Default [`RuntimeFactory`]: a multi-thread runtime named after the pool.
    pub fn build_runtime(pool: &str, worker_threads: usize) -> io::Result<Runtime> {
        Builder::new_multi_thread()
            .worker_threads(worker_threads.max(1))
            .thread_name(format!("{}-scheduler", pool))
            .enable_all()
            .build()
    }

    /// Start `detector` with the given period on `runtime`.
    pub fn start(pool: &str, runtime: Runtime, detector: FailureDetector, period: Duration) -> Self {
        let detector = runtime.spawn(detector.run(period));

        tracing::debug!(pool = %pool, "Scheduler started");
        Self {
            runtime: Some(runtime),
            detector: Some(detector),
        }
    }

    /// Handle for spawning administrative tasks.
    pub fn handle(&self) -> Option<Handle> {
        self.runtime.as_ref().map(|rt| rt.handle().clone())
    }

    /// Cancel the detector and every other task without waiting.
    pub fn shutdown(mut self) {
        self.stop();
    }

    fn stop(&mut self) {
        if let Some(detector) = self.detector.take() {
            detector.abort();
        }
        if let Some(runtime) = self.runtime.take() {
            runtime.shutdown_background();
        }
    }
}

impl Drop for Scheduler {
    fn drop(&mut self) {
        self.stop();
    }
}
