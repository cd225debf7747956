//! Connection facade returned to callers.
//!
//! # Responsibilities
//! - Carry a connection id minted by the pool
//! - Stay bound to one selected backend, opening the physical connection
//!   lazily on first use
//! - Tag statements, result sets and transactions with pool ids
//!
//! # Failover
//! Before every operation the facade checks its backend's failed flag.
//! Outside a transaction a failed backend is replaced transparently by a
//! fresh selection (the connection id is kept). Inside a transaction the
//! operation fails with `BackendFailed` and the transaction is abandoned.
//! Errors from the physical connection itself are returned as-is, without
//! retry.

use std::fmt;
use std::sync::Arc;

use crate::backend::{ActiveGuard, BackendHandle, PhysicalConnection};
use crate::error::{PoolError, Result};
use crate::pool::PoolInner;
use crate::selection::RouteHint;

/// Reply to one statement.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StatementResult {
    pub statement_id: u64,
    pub result_set_id: u64,
    /// Backend that ran the statement.
    pub backend: String,
    pub payload: Vec<u8>,
}

/// A pool connection bound to one backend at a time.
pub struct HaConnection {
    pool: Arc<PoolInner>,
    id: u64,
    hint: Option<RouteHint>,
    bound: ActiveGuard,
    physical: Option<Box<dyn PhysicalConnection>>,
    transaction: Option<u64>,
    closed: bool,
}

impl HaConnection {
    pub(crate) fn new(
        pool: Arc<PoolInner>,
        id: u64,
        handle: Arc<BackendHandle>,
        hint: Option<RouteHint>,
    ) -> Self {
        Self {
            pool,
            id,
            hint,
            bound: handle.acquire(),
            physical: None,
            transaction: None,
            closed: false,
        }
    }

    pub fn id(&self) -> u64 {
        self.id
    }

    /// Name of the currently bound backend.
    pub fn backend(&self) -> &str {
        self.bound.name()
    }

    /// Id of the open transaction, if any.
    pub fn transaction_id(&self) -> Option<u64> {
        self.transaction
    }

    pub fn is_closed(&self) -> bool {
        self.closed
    }

    /// Run one statement on the bound backend.
    pub async fn execute(&mut self, statement: &str) -> Result<StatementResult> {
        self.prepare().await?;
        let statement_id = self.pool.ids().statement.next();

        let payload = self.run(statement).await?;

        Ok(StatementResult {
            statement_id,
            result_set_id: self.pool.ids().result_set.next(),
            backend: self.backend().to_string(),
            payload,
        })
    }

    /// Open a transaction, pinning the connection to its backend until
    /// `commit` or `rollback`. Returns the existing id if one is open.
    pub async fn begin(&mut self) -> Result<u64> {
        self.prepare().await?;
        if let Some(id) = self.transaction {
            return Ok(id);
        }

        self.run("BEGIN").await?;
        let id = self.pool.ids().transaction.next();
        self.transaction = Some(id);
        tracing::trace!(connection = self.id, transaction = id, backend = %self.backend(), "Transaction started");
        Ok(id)
    }

    pub async fn commit(&mut self) -> Result<()> {
        self.finish("COMMIT").await
    }

    pub async fn rollback(&mut self) -> Result<()> {
        self.finish("ROLLBACK").await
    }

    /// Close the physical connection. Further operations fail with `Closed`.
    pub async fn close(&mut self) -> Result<()> {
        if self.closed {
            return Ok(());
        }
        self.closed = true;
        self.transaction = None;
        if let Some(mut conn) = self.physical.take() {
            conn.close().await.map_err(|source| PoolError::Backend {
                backend: self.backend().to_string(),
                source,
            })?;
        }
        Ok(())
    }

    async fn finish(&mut self, statement: &'static str) -> Result<()> {
        self.prepare().await?;
        if self.transaction.is_none() {
            return Ok(());
        }
        let outcome = self.run(statement).await;
        self.transaction = None;
        outcome.map(|_| ())
    }

    /// Reject closed connections and fail over away from a failed backend.
    async fn prepare(&mut self) -> Result<()> {
        if self.closed {
            return Err(PoolError::Closed);
        }
        if !self.bound.is_failed() {
            return Ok(());
        }

        let failed = self.backend().to_string();
        self.drop_physical().await;

        if let Some(transaction) = self.transaction.take() {
            tracing::warn!(
                connection = self.id,
                transaction,
                backend = %failed,
                "Backend failed during transaction"
            );
            return Err(PoolError::BackendFailed { backend: failed });
        }

        let handle = self.pool.select(self.hint.as_ref())?;
        self.bound = handle.acquire();
        tracing::info!(
            pool = %self.pool.name(),
            connection = self.id,
            from = %failed,
            to = %self.backend(),
            "Connection failed over"
        );
        Ok(())
    }

    /// Run `statement` on the physical connection, opening it first if
    /// needed. A failed statement discards the physical connection.
    async fn run(&mut self, statement: &str) -> Result<Vec<u8>> {
        let backend = self.backend().to_string();
        if self.physical.is_none() {
            let conn = self
                .bound
                .source()
                .connect()
                .await
                .map_err(|source| PoolError::Backend {
                    backend: backend.clone(),
                    source,
                })?;
            self.physical = Some(conn);
        }

        let outcome = match self.physical.as_mut() {
            Some(conn) => conn.execute(statement).await,
            None => return Err(PoolError::Closed),
        };
        match outcome {
            Ok(payload) => Ok(payload),
            Err(source) => {
                self.drop_physical().await;
                Err(PoolError::Backend { backend, source })
            }
        }
    }

    async fn drop_physical(&mut self) {
        if let Some(mut conn) = self.physical.take() {
            if let Err(e) = conn.close().await {
                tracing::debug!(connection = self.id, backend = %self.backend(), error = %e, "Failed to close physical connection");
            }
        }
    }
}

impl fmt::Debug for HaConnection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HaConnection")
            .field("id", &self.id)
            .field("backend", &self.backend())
            .field("connected", &self.physical.is_some())
            .field("transaction", &self.transaction)
            .field("closed", &self.closed)
            .finish()
    }
}
