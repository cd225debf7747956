//! TCP data source.
//!
//! Speaks a minimal line protocol: each statement is written as one
//! newline-terminated line and the reply is the next line read back.

use async_trait::async_trait;
use std::io;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::time::Duration;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::net::TcpStream;
use tokio::time::timeout;

use crate::backend::source::{BackendError, DataSource, PhysicalConnection};

/// A backend reachable over TCP.
#[derive(Debug)]
pub struct TcpDataSource {
    addr: SocketAddr,
    connect_timeout: Duration,
    closed: AtomicBool,
    restarts: AtomicU64,
}

impl TcpDataSource {
    pub fn new(addr: SocketAddr, connect_timeout: Duration) -> Self {
        Self {
            addr,
            connect_timeout,
            closed: AtomicBool::new(false),
            restarts: AtomicU64::new(0),
        }
    }

    /// Number of successful restarts.
    pub fn restarts(&self) -> u64 {
        self.restarts.load(Ordering::Relaxed)
    }

    async fn open_stream(&self) -> Result<TcpStream, BackendError> {
        match timeout(self.connect_timeout, TcpStream::connect(self.addr)).await {
            Ok(Ok(stream)) => Ok(stream),
            Ok(Err(e)) => Err(BackendError::Io(e)),
            Err(_) => Err(BackendError::Timeout),
        }
    }
}

#[async_trait]
impl DataSource for TcpDataSource {
    async fn connect(&self) -> Result<Box<dyn PhysicalConnection>, BackendError> {
        if self.closed.load(Ordering::Acquire) {
            return Err(BackendError::Closed);
        }
        let stream = self.open_stream().await?;
        stream.set_nodelay(true)?;
        Ok(Box::new(TcpConnection {
            addr: self.addr,
            stream: Some(BufReader::new(stream)),
        }))
    }

    async fn restart(&self) -> Result<(), BackendError> {
        // A restarted source must be reachable before it accepts connects again.
        let stream = self.open_stream().await?;
        drop(stream);
        self.closed.store(false, Ordering::Release);
        self.restarts.fetch_add(1, Ordering::Relaxed);
        tracing::debug!(addr = %self.addr, "TCP data source restarted");
        Ok(())
    }

    async fn close(&self) -> Result<(), BackendError> {
        self.closed.store(true, Ordering::Release);
        Ok(())
    }

    fn describe(&self) -> String {
        format!("tcp://{}", self.addr)
    }
}

/// One open TCP connection.
#[derive(Debug)]
pub struct TcpConnection {
    addr: SocketAddr,
    stream: Option<BufReader<TcpStream>>,
}

#[async_trait]
impl PhysicalConnection for TcpConnection {
    async fn execute(&mut self, statement: &str) -> Result<Vec<u8>, BackendError> {
        let stream = self.stream.as_mut().ok_or(BackendError::Closed)?;

        let mut line = String::with_capacity(statement.len() + 1);
        line.push_str(statement.trim_end_matches('\n'));
        line.push('\n');
        stream.get_mut().write_all(line.as_bytes()).await?;

        let mut reply = String::new();
        let read = stream.read_line(&mut reply).await?;
        if read == 0 {
            return Err(BackendError::Io(io::Error::new(
                io::ErrorKind::UnexpectedEof,
                format!("{} closed the connection", self.addr),
            )));
        }
        let reply = reply.trim_end_matches(['\r', '\n']);
        Ok(reply.as_bytes().to_vec())
    }

    async fn close(&mut self) -> Result<(), BackendError> {
        if let Some(mut stream) = self.stream.take() {
            stream.get_mut().shutdown().await?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::net::TcpListener;

    async fn start_echo() -> SocketAddr {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            while let Ok((socket, _)) = listener.accept().await {
                tokio::spawn(async move {
                    let (read, mut write) = socket.into_split();
                    let mut lines = BufReader::new(read).lines();
                    while let Ok(Some(line)) = lines.next_line().await {
                        let reply = format!("echo:{}\n", line);
                        if write.write_all(reply.as_bytes()).await.is_err() {
                            break;
                        }
                    }
                });
            }
        });
        addr
    }

    #[tokio::test]
    async fn test_execute_round_trip() {
        let addr = start_echo().await;
        let source = TcpDataSource::new(addr, Duration::from_secs(1));

        let mut conn = source.connect().await.unwrap();
        assert_eq!(conn.execute("select 1").await.unwrap(), b"echo:select 1");
        assert_eq!(conn.execute("select 2\n").await.unwrap(), b"echo:select 2");

        conn.close().await.unwrap();
        assert!(matches!(conn.execute("x").await, Err(BackendError::Closed)));
    }

    #[tokio::test]
    async fn test_closed_source_refuses_connect_until_restart() {
        let addr = start_echo().await;
        let source = TcpDataSource::new(addr, Duration::from_secs(1));

        source.close().await.unwrap();
        assert!(matches!(source.connect().await, Err(BackendError::Closed)));

        source.restart().await.unwrap();
        assert_eq!(source.restarts(), 1);
        assert!(source.connect().await.is_ok());
    }

    #[tokio::test]
    async fn test_unreachable_backend() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        drop(listener);

        let source = TcpDataSource::new(addr, Duration::from_millis(200));
        assert!(source.connect().await.is_err());
        assert!(source.restart().await.is_err());
        assert_eq!(source.restarts(), 0);
        assert_eq!(source.describe(), format!("tcp://{}", addr));
    }
}
