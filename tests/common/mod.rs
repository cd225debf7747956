//! Shared utilities for integration tests.

#![allow(dead_code)]

use async_trait::async_trait;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, Weak};
use std::time::Duration;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::net::TcpListener;

use ha_pool::backend::{BackendError, DataSource, PhysicalConnection};
use ha_pool::config::PoolConfig;
use ha_pool::health::{ConnectProber, HealthProber};
use ha_pool::stats::{PoolTracker, StatsSource, TrackerError};

/// How a [`MemorySource`] behaves when closed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CloseBehavior {
    Ok,
    Fail,
    Hang,
}

/// In-memory backend whose reachability is toggled by the test.
#[derive(Debug)]
pub struct MemorySource {
    name: String,
    up: AtomicBool,
    restart_ok: AtomicBool,
    restarts: AtomicUsize,
    closed: AtomicBool,
    close_behavior: Mutex<CloseBehavior>,
}

impl MemorySource {
    pub fn new(name: &str) -> Arc<Self> {
        Arc::new(Self {
            name: name.to_string(),
            up: AtomicBool::new(true),
            restart_ok: AtomicBool::new(true),
            restarts: AtomicUsize::new(0),
            closed: AtomicBool::new(false),
            close_behavior: Mutex::new(CloseBehavior::Ok),
        })
    }

    pub fn set_up(&self, up: bool) {
        self.up.store(up, Ordering::SeqCst);
    }

    pub fn set_restart_ok(&self, ok: bool) {
        self.restart_ok.store(ok, Ordering::SeqCst);
    }

    pub fn set_close_behavior(&self, behavior: CloseBehavior) {
        *self.close_behavior.lock().unwrap() = behavior;
    }

    pub fn restarts(&self) -> usize {
        self.restarts.load(Ordering::SeqCst)
    }

    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl DataSource for MemorySource {
    async fn connect(&self) -> Result<Box<dyn PhysicalConnection>, BackendError> {
        if self.closed.load(Ordering::SeqCst) {
            return Err(BackendError::Closed);
        }
        if !self.up.load(Ordering::SeqCst) {
            return Err(BackendError::Other(format!("{} is down", self.name)));
        }
        Ok(Box::new(MemoryConnection {
            name: self.name.clone(),
        }))
    }

    async fn restart(&self) -> Result<(), BackendError> {
        if !self.restart_ok.load(Ordering::SeqCst) {
            return Err(BackendError::Other("restart refused".into()));
        }
        self.restarts.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    async fn close(&self) -> Result<(), BackendError> {
        let behavior = *self.close_behavior.lock().unwrap();
        match behavior {
            CloseBehavior::Ok => {
                self.closed.store(true, Ordering::SeqCst);
                Ok(())
            }
            CloseBehavior::Fail => Err(BackendError::Other("close refused".into())),
            CloseBehavior::Hang => {
                tokio::time::sleep(Duration::from_secs(3600)).await;
                Ok(())
            }
        }
    }

    fn describe(&self) -> String {
        format!("mem://{}", self.name)
    }
}

/// Replies `<backend>:<statement>`.
#[derive(Debug)]
pub struct MemoryConnection {
    name: String,
}

#[async_trait]
impl PhysicalConnection for MemoryConnection {
    async fn execute(&mut self, statement: &str) -> Result<Vec<u8>, BackendError> {
        Ok(format!("{}:{}", self.name, statement).into_bytes())
    }

    async fn close(&mut self) -> Result<(), BackendError> {
        Ok(())
    }
}

/// Connect prober that counts its calls.
#[derive(Debug, Default)]
pub struct CountingProber {
    inner: ConnectProber,
    pub calls: AtomicUsize,
}

impl CountingProber {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl HealthProber for CountingProber {
    async fn is_healthy(&self, source: &dyn DataSource) -> Result<bool, BackendError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.inner.is_healthy(source).await
    }
}

/// Tracker that counts registrations.
#[derive(Debug, Default)]
pub struct CountingTracker {
    pub added: AtomicUsize,
    pub removed: AtomicUsize,
    pub fail: AtomicBool,
    pools: Mutex<Vec<Weak<dyn StatsSource>>>,
}

impl CountingTracker {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn added(&self) -> usize {
        self.added.load(Ordering::SeqCst)
    }

    pub fn removed(&self) -> usize {
        self.removed.load(Ordering::SeqCst)
    }
}

impl PoolTracker for CountingTracker {
    fn add(&self, pool: Weak<dyn StatsSource>) -> Result<(), TrackerError> {
        self.added.fetch_add(1, Ordering::SeqCst);
        if self.fail.load(Ordering::SeqCst) {
            return Err(TrackerError("tracker offline".into()));
        }
        self.pools.lock().unwrap().push(pool);
        Ok(())
    }

    fn remove(&self, _id: u64) -> Result<(), TrackerError> {
        self.removed.fetch_add(1, Ordering::SeqCst);
        if self.fail.load(Ordering::SeqCst) {
            return Err(TrackerError("tracker offline".into()));
        }
        Ok(())
    }
}

/// Pool config with a fast probe period for tests.
pub fn fast_config(period_ms: u64) -> PoolConfig {
    let mut config = PoolConfig::default();
    config.health_check.period_ms = period_ms;
    config.health_check.probe_timeout_ms = 200;
    config.scheduler.worker_threads = 2;
    config.shutdown.close_timeout_ms = 200;
    config
}

/// Start a mock line-protocol backend on an ephemeral port.
/// Each request line is answered with `<tag>:<line>`.
pub async fn start_mock_backend(tag: &'static str) -> SocketAddr {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();

    tokio::spawn(async move {
        loop {
            match listener.accept().await {
                Ok((socket, _)) => {
                    tokio::spawn(async move {
                        let (read, mut write) = socket.into_split();
                        let mut lines = BufReader::new(read).lines();
                        while let Ok(Some(line)) = lines.next_line().await {
                            let reply = format!("{}:{}\n", tag, line);
                            if write.write_all(reply.as_bytes()).await.is_err() {
                                break;
                            }
                        }
                    });
                }
                Err(_) => break,
            }
        }
    });
    addr
}
