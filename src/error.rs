//! Pool error types.

use std::io;
use thiserror::Error;

use crate::backend::source::BackendError;
use crate::config::ValidationError;

/// Errors surfaced by the pool to its callers.
#[derive(Debug, Error)]
pub enum PoolError {
    /// Startup failed; the pool stays uninitialized and `init` may be retried.
    #[error("Failed to initialize pool: {0}")]
    Init(#[source] io::Error),

    #[error("Invalid pool configuration: {}", join(.0))]
    InvalidConfig(Vec<ValidationError>),

    /// The pool has been closed. Closed is terminal.
    #[error("Pool is closed")]
    Closed,

    /// Every registered backend is failed (or none is registered).
    #[error("No available backend")]
    NoAvailableBackend,

    #[error("Unknown backend: {0}")]
    UnknownBackend(String),

    #[error("Backend already registered: {0}")]
    DuplicateBackend(String),

    /// Re-establishing a backend's physical resource failed.
    #[error("Failed to restart backend '{backend}': {source}")]
    Restart {
        backend: String,
        #[source]
        source: BackendError,
    },

    /// A physical operation against a bound backend failed.
    #[error("Backend '{backend}' error: {source}")]
    Backend {
        backend: String,
        #[source]
        source: BackendError,
    },

    /// The bound backend went down while a transaction was open.
    #[error("Backend '{backend}' failed during an open transaction")]
    BackendFailed { backend: String },

    #[error(transparent)]
    Shutdown(#[from] ShutdownError),
}

/// Result type for pool operations.
pub type Result<T> = std::result::Result<T, PoolError>;

fn join<T: ToString>(items: &[T]) -> String {
    items
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join(", ")
}

fn join_failures(failures: &[(String, BackendError)]) -> String {
    failures
        .iter()
        .map(|(name, err)| format!("{}: {}", name, err))
        .collect::<Vec<_>>()
        .join(", ")
}

/// Per-backend close failures collected during shutdown.
#[derive(Debug, Default, Error)]
#[error("Failed to close {} backend(s): {}", .failures.len(), join_failures(.failures))]
pub struct ShutdownError {
    pub failures: Vec<(String, BackendError)>,
}

impl ShutdownError {
    pub fn is_empty(&self) -> bool {
        self.failures.is_empty()
    }

    pub fn push(&mut self, backend: impl Into<String>, error: BackendError) {
        self.failures.push((backend.into(), error));
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        assert_eq!(PoolError::NoAvailableBackend.to_string(), "No available backend");
        assert_eq!(
            PoolError::UnknownBackend("db1".into()).to_string(),
            "Unknown backend: db1"
        );

        let err = PoolError::Restart {
            backend: "db2".into(),
            source: BackendError::Timeout,
        };
        assert!(err.to_string().contains("db2"));
    }

    #[test]
    fn test_shutdown_error_lists_every_failure() {
        let mut err = ShutdownError::default();
        assert!(err.is_empty());

        err.push("a", BackendError::Timeout);
        err.push("b", BackendError::Other("disk on fire".into()));

        let msg = PoolError::from(err).to_string();
        assert!(msg.starts_with("Failed to close 2 backend(s)"));
        assert!(msg.contains("a: "));
        assert!(msg.contains("disk on fire"));
    }

    #[test]
    fn test_invalid_config_lists_every_problem() {
        let err = PoolError::InvalidConfig(vec![
            ValidationError::ZeroPeriod,
            ValidationError::ZeroProbeTimeout,
        ]);
        let msg = err.to_string();
        assert!(msg.starts_with("Invalid pool configuration"));
        assert!(msg.contains("period_ms"));
        assert!(msg.contains("probe_timeout_ms"));
    }
}
