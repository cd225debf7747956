//! Configuration validation.
//!
//! # Responsibilities
//! - Semantic validation (serde handles syntactic)
//! - Check backend names are present and unique
//! - Validate value ranges (period > 0, workers > 0, addresses parse)
//!
//! # Design Decisions
//! - Returns all validation errors, not just first
//! - Validation is pure function: PoolConfig → Result<(), Vec<ValidationError>>

use std::collections::HashSet;
use std::net::SocketAddr;
use thiserror::Error;

use crate::config::schema::PoolConfig;

/// A single semantic problem in a configuration.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("backend #{0} has an empty name")]
    EmptyBackendName(usize),

    #[error("backend '{0}' is defined more than once")]
    DuplicateBackend(String),

    #[error("backend '{name}' has an invalid address '{address}'")]
    InvalidAddress { name: String, address: String },

    #[error("health_check.period_ms must be greater than zero")]
    ZeroPeriod,

    #[error("health_check.probe_timeout_ms must be greater than zero")]
    ZeroProbeTimeout,

    #[error("scheduler.worker_threads must be greater than zero")]
    ZeroWorkers,
}

/// Check a parsed configuration, collecting every error.
pub fn validate_config(config: &PoolConfig) -> Result<(), Vec<ValidationError>> {
    let mut errors = Vec::new();

    if config.health_check.period_ms == 0 {
        errors.push(ValidationError::ZeroPeriod);
    }
    if config.health_check.probe_timeout_ms == 0 {
        errors.push(ValidationError::ZeroProbeTimeout);
    }
    if config.scheduler.worker_threads == 0 {
        errors.push(ValidationError::ZeroWorkers);
    }

    let mut seen = HashSet::new();
    for (i, backend) in config.backends.iter().enumerate() {
        if backend.name.trim().is_empty() {
            errors.push(ValidationError::EmptyBackendName(i));
        } else if !seen.insert(backend.name.as_str()) {
            errors.push(ValidationError::DuplicateBackend(backend.name.clone()));
        }
        if backend.address.parse::<SocketAddr>().is_err() {
            errors.push(ValidationError::InvalidAddress {
                name: backend.name.clone(),
                address: backend.address.clone(),
            });
        }
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}
