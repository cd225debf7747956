//! Physical backend boundary.
//!
//! The pool never speaks a wire protocol itself. A [`DataSource`] opens
//! physical connections to one backend store and knows how to restart and
//! close itself; a [`PhysicalConnection`] runs statements.

use async_trait::async_trait;
use std::fmt::Debug;
use std::io;
use thiserror::Error;

/// Errors raised by physical backends.
#[derive(Debug, Error)]
pub enum BackendError {
    #[error("IO error: {0}")]
    Io(#[from] io::Error),

    #[error("Operation timed out")]
    Timeout,

    #[error("Backend is closed")]
    Closed,

    #[error("{0}")]
    Other(String),
}

/// One physical backend store.
#[async_trait]
pub trait DataSource: Send + Sync + Debug {
    /// Open a live, ready-to-use physical connection.
    async fn connect(&self) -> Result<Box<dyn PhysicalConnection>, BackendError>;

    /// Re-establish the underlying resource in place.
    async fn restart(&self) -> Result<(), BackendError>;

    /// Release the underlying resource.
    async fn close(&self) -> Result<(), BackendError>;

    /// Human readable location (address, URL) for logs and stats.
    fn describe(&self) -> String;
}

/// A connection opened by a [`DataSource`].
#[async_trait]
pub trait PhysicalConnection: Send + Debug {
    /// Run one statement and return the raw reply.
    async fn execute(&mut self, statement: &str) -> Result<Vec<u8>, BackendError>;

    async fn close(&mut self) -> Result<(), BackendError>;
}
