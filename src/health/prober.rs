//! Health probers.
//!
//! # Responsibilities
//! - Answer "is this backend usable" for one data source
//!
//! # Design Decisions
//! - Probers are injected; the pool ships a connect-based default
//! - An `Err` is treated as unhealthy by the detector, never propagated

use async_trait::async_trait;

use crate::backend::{BackendError, DataSource};

/// Decides whether a physical backend is usable.
#[async_trait]
pub trait HealthProber: Send + Sync {
    /// Return `Ok(true)` if the backend is healthy. `Ok(false)` and `Err`
    /// both mark the backend failed.
    async fn is_healthy(&self, source: &dyn DataSource) -> Result<bool, BackendError>;
}

/// Opens a physical connection and optionally runs a validation statement.
#[derive(Debug, Clone, Default)]
pub struct ConnectProber {
    validation_statement: Option<String>,
}

impl ConnectProber {
    pub fn new() -> Self {
        Self::default()
    }

    /// Run `statement` on the probe connection; any error fails the probe.
    pub fn with_validation_statement(statement: impl Into<String>) -> Self {
        Self {
            validation_statement: Some(statement.into()),
        }
    }
}

#[async_trait]
impl HealthProber for ConnectProber {
    async fn is_healthy(&self, source: &dyn DataSource) -> Result<bool, BackendError> {
        let mut conn = source.connect().await?;
        let result = match &self.validation_statement {
            Some(statement) => conn.execute(statement).await.map(|_| true),
            None => Ok(true),
        };
        if let Err(e) = conn.close().await {
            tracing::debug!(source = %source.describe(), error = %e, "Failed to close probe connection");
        }
        result
    }
}
