//! # Async Client API
//!
//! Purpose: Expose a compact async API for issuing Redis-compatible commands
//! over RESP2, one pooled connection per call.
//!
//! ## Design Principles
//! 1. **Facade Pattern**: `KVClient` hides pooling and protocol details.
//! 2. **Borrow-Friendly API**: Accept `&[u8]` to avoid unnecessary copies.
//! 3. **Fail Fast**: Protocol violations surface immediately as errors.
//! 4. **Bytes In, Bytes Out**: Encoding decisions belong to the caller.

use std::time::Duration;

use hkv_common::{CacheError, CacheResult};

use crate::pool::{ConnectionPool, PoolConfig, PoolStats};
use crate::resp::RespValue;

/// Configuration for the async client and its pool.
#[derive(Debug, Clone)]
pub struct ClientConfig {
    /// Server address, e.g. "127.0.0.1:6379".
    pub addr: String,
    /// Logical database index.
    pub db: u32,
    /// Optional AUTH password.
    pub password: Option<String>,
    /// Maximum idle connections kept in the pool.
    pub max_idle: usize,
    /// Maximum total connections (idle + in-use).
    pub max_total: usize,
    /// Optional TCP connect timeout.
    pub connect_timeout: Option<Duration>,
    /// Optional per-command timeout.
    pub command_timeout: Option<Duration>,
}

impl Default for ClientConfig {
    fn default() -> Self {
        ClientConfig {
            addr: "127.0.0.1:6379".to_string(),
            db: 0,
            password: None,
            max_idle: 8,
            max_total: 16,
            connect_timeout: None,
            command_timeout: None,
        }
    }
}

/// Async client with connection pooling.
///
/// Each call acquires a connection, executes one command, and returns the
/// connection to the pool. Cloning is cheap and shares the pool.
#[derive(Clone)]
pub struct KVClient {
    pool: ConnectionPool,
}

impl KVClient {
    /// Creates a client with default configuration.
    pub fn connect(addr: impl Into<String>) -> CacheResult<Self> {
        let config = ClientConfig {
            addr: addr.into(),
            ..ClientConfig::default()
        };
        Self::with_config(config)
    }

    /// Creates a client with a custom configuration. Connections are opened
    /// lazily.
    pub fn with_config(config: ClientConfig) -> CacheResult<Self> {
        let pool = ConnectionPool::new(PoolConfig {
            addr: config.addr,
            db: config.db,
            password: config.password,
            max_idle: config.max_idle,
            max_total: config.max_total,
            connect_timeout: config.connect_timeout,
            command_timeout: config.command_timeout,
        })?;
        Ok(KVClient { pool })
    }

    /// Fetches a value by key.
    ///
    /// Returns `Ok(None)` when the key is missing.
    pub async fn get(&self, key: &[u8]) -> CacheResult<Option<Vec<u8>>> {
        let mut conn = self.pool.acquire().await?;
        match conn.exec(&[b"GET", key]).await? {
            RespValue::Bulk(data) => Ok(data),
            RespValue::Error(message) => Err(CacheError::Server { message }),
            _ => Err(CacheError::UnexpectedResponse { command: "GET" }),
        }
    }

    /// Sets a value for a key without expiration.
    pub async fn set(&self, key: &[u8], value: &[u8]) -> CacheResult<()> {
        let mut conn = self.pool.acquire().await?;
        match conn.exec(&[b"SET", key, value]).await? {
            RespValue::Simple(_) => Ok(()),
            RespValue::Error(message) => Err(CacheError::Server { message }),
            _ => Err(CacheError::UnexpectedResponse { command: "SET" }),
        }
    }

    /// Sets a value only if the key does not exist. Returns true when written.
    ///
    /// The check and the write happen in one store command, so concurrent
    /// callers racing on the same key see exactly one `true`.
    pub async fn set_nx(&self, key: &[u8], value: &[u8]) -> CacheResult<bool> {
        let mut conn = self.pool.acquire().await?;
        match conn.exec(&[b"SET", key, value, b"NX"]).await? {
            RespValue::Simple(_) => Ok(true),
            RespValue::Bulk(None) => Ok(false),
            RespValue::Error(message) => Err(CacheError::Server { message }),
            _ => Err(CacheError::UnexpectedResponse { command: "SET NX" }),
        }
    }

    /// Sets a value and attaches an expiration in whole seconds.
    pub async fn set_with_ttl(&self, key: &[u8], value: &[u8], ttl: Duration) -> CacheResult<()> {
        let (seconds, len) = encode_u64(ttl.as_secs());
        let mut conn = self.pool.acquire().await?;
        match conn.exec(&[b"SET", key, value, b"EX", &seconds[..len]]).await? {
            RespValue::Simple(_) => Ok(()),
            RespValue::Error(message) => Err(CacheError::Server { message }),
            _ => Err(CacheError::UnexpectedResponse { command: "SET EX" }),
        }
    }

    /// Deletes a key. Returns true when a key was removed.
    pub async fn delete(&self, key: &[u8]) -> CacheResult<bool> {
        let mut conn = self.pool.acquire().await?;
        match conn.exec(&[b"DEL", key]).await? {
            RespValue::Integer(count) => Ok(count > 0),
            RespValue::Error(message) => Err(CacheError::Server { message }),
            _ => Err(CacheError::UnexpectedResponse { command: "DEL" }),
        }
    }

    /// Counts how many of `keys` exist. A key listed twice counts twice.
    pub async fn exists(&self, keys: &[&[u8]]) -> CacheResult<u64> {
        let mut args: Vec<&[u8]> = Vec::with_capacity(keys.len() + 1);
        args.push(b"EXISTS");
        args.extend_from_slice(keys);

        let mut conn = self.pool.acquire().await?;
        match conn.exec(&args).await? {
            RespValue::Integer(count) if count >= 0 => Ok(count as u64),
            RespValue::Error(message) => Err(CacheError::Server { message }),
            _ => Err(CacheError::UnexpectedResponse { command: "EXISTS" }),
        }
    }

    /// Removes every key in the selected database.
    pub async fn flush_db(&self) -> CacheResult<()> {
        let mut conn = self.pool.acquire().await?;
        match conn.exec(&[b"FLUSHDB"]).await? {
            RespValue::Simple(_) => Ok(()),
            RespValue::Error(message) => Err(CacheError::Server { message }),
            _ => Err(CacheError::UnexpectedResponse { command: "FLUSHDB" }),
        }
    }

    /// Pings the server. Returns the raw response payload.
    pub async fn ping(&self, payload: Option<&[u8]>) -> CacheResult<Vec<u8>> {
        let mut conn = self.pool.acquire().await?;
        let response = match payload {
            Some(data) => conn.exec(&[b"PING", data]).await?,
            None => conn.exec(&[b"PING"]).await?,
        };
        match response {
            RespValue::Simple(text) => Ok(text),
            RespValue::Bulk(Some(data)) => Ok(data),
            RespValue::Error(message) => Err(CacheError::Server { message }),
            _ => Err(CacheError::UnexpectedResponse { command: "PING" }),
        }
    }

    /// Closes the underlying pool. Every later command fails with
    /// `PoolClosed`.
    pub async fn close(&self) -> CacheResult<()> {
        self.pool.close().await
    }

    /// Returns true once `close()` has run.
    pub fn is_closed(&self) -> bool {
        self.pool.is_closed()
    }

    /// Returns pool occupancy.
    pub fn stats(&self) -> PoolStats {
        self.pool.stats()
    }
}

fn encode_u64(mut value: u64) -> ([u8; 20], usize) {
    // Stack buffer keeps the conversion allocation-free.
    let mut buf = [0u8; 20];
    let mut len = 0;
    if value == 0 {
        buf[0] = b'0';
        return (buf, 1);
    }
    while value > 0 {
        buf[len] = b'0' + (value % 10) as u8;
        value /= 10;
        len += 1;
    }
    buf[..len].reverse();
    (buf, len)
}
