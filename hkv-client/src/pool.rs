//! # Connection Pool
//!
//! Purpose: Bound and reuse TCP connections to the store, and enforce the
//! closed-state contract once the owner shuts the pool down.
//!
//! ## Design Principles
//! 1. **Object Pool Pattern**: Keep a bounded set of reusable connections.
//! 2. **Semaphore Admission**: `max_total` permits bound concurrent connections;
//!    waiters suspend instead of failing, and closing the semaphore wakes them.
//! 3. **Minimal Locking**: Hold the mutex only while moving idle connections.
//! 4. **Guaranteed Release**: The RAII guard returns (or discards) its
//!    connection on every exit path, including future cancellation.
//!
//! ## Lifecycle
//!
//! ```text
//! open ──close()──> closed
//!   acquire: permit -> idle pop | connect     acquire: Err(PoolClosed)
//!   release: idle push (<= max_idle)          release: connection dropped
//! ```

use std::collections::VecDeque;
use std::future::Future;
use std::io;
use std::sync::Arc;
use std::time::Duration;

use bytes::BytesMut;
use parking_lot::Mutex;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpStream;
use tokio::sync::{OwnedSemaphorePermit, Semaphore};
use tracing::{debug, trace, warn};

use hkv_common::{CacheError, CacheResult};

use crate::resp::{encode_command, parse_response, RespValue};

/// Pool configuration for the async client.
#[derive(Debug, Clone)]
pub struct PoolConfig {
    /// Server address, e.g. "127.0.0.1:6379" or "localhost:6379".
    pub addr: String,
    /// Logical database selected on every new connection.
    pub db: u32,
    /// Optional password sent with AUTH on every new connection.
    pub password: Option<String>,
    /// Maximum number of idle connections to keep.
    pub max_idle: usize,
    /// Maximum total connections (idle + in-use).
    pub max_total: usize,
    /// Optional TCP connect timeout.
    pub connect_timeout: Option<Duration>,
    /// Optional timeout for a single command round-trip.
    pub command_timeout: Option<Duration>,
}

/// Point-in-time view of the pool.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PoolStats {
    /// Connections parked in the idle set.
    pub idle: usize,
    /// Slots currently held by callers.
    pub in_use: usize,
    /// Whether `close()` has run.
    pub closed: bool,
}

struct PoolState {
    idle: VecDeque<Connection>,
    closed: bool,
}

struct PoolInner {
    config: PoolConfig,
    state: Mutex<PoolState>,
    permits: Arc<Semaphore>,
}

/// Connection pool handle.
#[derive(Clone)]
pub struct ConnectionPool {
    inner: Arc<PoolInner>,
}

impl ConnectionPool {
    /// Creates a new connection pool. No connection is opened until the first
    /// `acquire`.
    pub fn new(config: PoolConfig) -> CacheResult<Self> {
        if config.max_total == 0 {
            return Err(CacheError::InvalidArgument("max_total must be at least 1"));
        }
        if config.max_total > Semaphore::MAX_PERMITS {
            return Err(CacheError::InvalidArgument("max_total exceeds the permit limit"));
        }
        if config.addr.is_empty() {
            return Err(CacheError::InvalidAddress(config.addr));
        }
        let state = PoolState {
            idle: VecDeque::with_capacity(config.max_idle),
            closed: false,
        };
        let permits = Arc::new(Semaphore::new(config.max_total));
        Ok(ConnectionPool {
            inner: Arc::new(PoolInner {
                config,
                state: Mutex::new(state),
                permits,
            }),
        })
    }

    /// Acquires a connection, suspending while all `max_total` slots are taken.
    ///
    /// Fails with `PoolClosed` once the pool is closed, including for callers
    /// that were already waiting. Dropping the returned future before it
    /// resolves never leaks a slot.
    pub async fn acquire(&self) -> CacheResult<PooledConnection> {
        let permit = self
            .inner
            .permits
            .clone()
            .acquire_owned()
            .await
            .map_err(|_| CacheError::PoolClosed)?;

        if let Some(conn) = self.pop_idle()? {
            return Ok(PooledConnection::new(self.inner.clone(), conn, permit));
        }

        let conn = Connection::connect(&self.inner.config).await?;
        if self.inner.state.lock().closed {
            // Lost the race with close(); the fresh connection never enters the pool.
            return Err(CacheError::PoolClosed);
        }
        Ok(PooledConnection::new(self.inner.clone(), conn, permit))
    }

    /// Closes the pool.
    ///
    /// Pending and future `acquire` calls fail with `PoolClosed`. Idle
    /// connections are shut down here; in-flight ones finish their command and
    /// are dropped when released. Calling this again is a no-op.
    pub async fn close(&self) -> CacheResult<()> {
        let idle = {
            let mut state = self.inner.state.lock();
            if state.closed {
                return Ok(());
            }
            state.closed = true;
            std::mem::take(&mut state.idle)
        };
        self.inner.permits.close();

        debug!(addr = %self.inner.config.addr, idle = idle.len(), "closing connection pool");
        for mut conn in idle {
            if let Err(err) = conn.shutdown().await {
                debug!(error = %err, "idle connection shutdown failed");
            }
        }
        Ok(())
    }

    /// Returns true once `close()` has run.
    pub fn is_closed(&self) -> bool {
        self.inner.state.lock().closed
    }

    /// Returns a snapshot of idle/in-use counts.
    pub fn stats(&self) -> PoolStats {
        let state = self.inner.state.lock();
        let available = self.inner.permits.available_permits();
        PoolStats {
            idle: state.idle.len(),
            in_use: self.inner.config.max_total.saturating_sub(available),
            closed: state.closed,
        }
    }

    /// Returns the configuration the pool was built with.
    pub fn config(&self) -> &PoolConfig {
        &self.inner.config
    }

    fn pop_idle(&self) -> CacheResult<Option<Connection>> {
        let mut state = self.inner.state.lock();
        if state.closed {
            return Err(CacheError::PoolClosed);
        }
        Ok(state.idle.pop_front())
    }
}

impl PoolInner {
    fn return_connection(&self, conn: Connection) {
        let mut state = self.state.lock();
        if !state.closed && state.idle.len() < self.config.max_idle {
            state.idle.push_back(conn);
        }
    }
}

/// RAII wrapper returning a connection to the pool on drop.
///
/// The semaphore permit lives as long as the guard, so the slot is released
/// on every exit path.
pub struct PooledConnection {
    pool: Arc<PoolInner>,
    conn: Option<Connection>,
    valid: bool,
    _permit: OwnedSemaphorePermit,
}

impl PooledConnection {
    fn new(pool: Arc<PoolInner>, conn: Connection, permit: OwnedSemaphorePermit) -> Self {
        PooledConnection {
            pool,
            conn: Some(conn),
            valid: true,
            _permit: permit,
        }
    }

    /// Executes a RESP command and returns the parsed reply.
    ///
    /// A transport failure, timeout or cancellation mid-command leaves the
    /// stream in an unknown state, so the connection is discarded on release.
    pub async fn exec(&mut self, args: &[&[u8]]) -> CacheResult<RespValue> {
        let conn = match self.conn.as_mut() {
            Some(conn) => conn,
            None => return Err(CacheError::PoolClosed),
        };
        self.valid = false;
        let response = with_timeout(self.pool.config.command_timeout, conn.exec(args)).await?;
        self.valid = true;
        Ok(response)
    }
}

impl Drop for PooledConnection {
    fn drop(&mut self) {
        let conn = match self.conn.take() {
            Some(conn) => conn,
            None => return,
        };

        if self.valid {
            self.pool.return_connection(conn);
        } else {
            warn!(addr = %self.pool.config.addr, "discarding broken connection");
        }
    }
}

/// Single TCP connection with reusable buffers.
pub struct Connection {
    stream: TcpStream,
    read_buf: BytesMut,
    write_buf: BytesMut,
}

impl Connection {
    async fn connect(config: &PoolConfig) -> CacheResult<Self> {
        let stream = with_timeout(config.connect_timeout, async {
            TcpStream::connect(config.addr.as_str())
                .await
                .map_err(CacheError::from)
        })
        .await
        .inspect_err(|err| warn!(addr = %config.addr, error = %err, "connect failed"))?;
        // Disable Nagle to keep request latency low for small payloads.
        stream.set_nodelay(true)?;

        let mut conn = Connection {
            stream,
            read_buf: BytesMut::with_capacity(4 * 1024),
            write_buf: BytesMut::with_capacity(256),
        };

        if let Some(password) = &config.password {
            conn.handshake(&[b"AUTH", password.as_bytes()], "AUTH").await?;
        }
        if config.db != 0 {
            let db = config.db.to_string();
            conn.handshake(&[b"SELECT", db.as_bytes()], "SELECT").await?;
        }

        debug!(addr = %config.addr, db = config.db, "connection established");
        Ok(conn)
    }

    async fn handshake(&mut self, args: &[&[u8]], command: &'static str) -> CacheResult<()> {
        match self.exec(args).await? {
            RespValue::Simple(_) => Ok(()),
            RespValue::Error(message) => Err(CacheError::Server { message }),
            _ => Err(CacheError::UnexpectedResponse { command }),
        }
    }

    async fn exec(&mut self, args: &[&[u8]]) -> CacheResult<RespValue> {
        if let Some(name) = args.first() {
            trace!(command = %String::from_utf8_lossy(name), argc = args.len(), "exec");
        }
        self.write_buf.clear();
        encode_command(args, &mut self.write_buf);
        self.stream.write_all(&self.write_buf).await?;

        loop {
            if let Some(response) = parse_response(&mut self.read_buf)? {
                return Ok(response);
            }
            if self.stream.read_buf(&mut self.read_buf).await? == 0 {
                return Err(CacheError::Io(io::Error::new(
                    io::ErrorKind::UnexpectedEof,
                    "connection closed by server",
                )));
            }
        }
    }

    async fn shutdown(&mut self) -> io::Result<()> {
        self.stream.shutdown().await
    }
}

async fn with_timeout<T, F>(limit: Option<Duration>, fut: F) -> CacheResult<T>
where
    F: Future<Output = CacheResult<T>>,
{
    match limit {
        Some(limit) => tokio::time::timeout(limit, fut)
            .await
            .map_err(|_| CacheError::Timeout(limit))?,
        None => fut.await,
    }
}
