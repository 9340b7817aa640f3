//! # Redis Backend
//!
//! Purpose: Implement the backend contract on a remote Redis-compatible store
//! through the pooled RESP2 client.
//!
//! ## Command Mapping
//!
//! ```text
//! add          -> SET key value NX
//! get / get_*  -> GET key
//! set          -> SET key value
//! set_with_ttl -> SET key value EX secs
//! delete       -> DEL key
//! exists       -> EXISTS k1 k2 ...
//! flush        -> FLUSHDB          (scoped to the configured db)
//! close        -> pool shutdown    (no store command)
//! ```

use std::time::Duration;

use async_trait::async_trait;
use tracing::debug;

use hkv_client::{KVClient, PoolStats};
use hkv_common::{codec, CacheError, CacheResult, Encoding, Value};

use crate::backend::{validate_key, validate_keys, validate_ttl, CacheBackend};
use crate::config::CacheConfig;

/// Cache backend backed by a remote store.
#[derive(Clone)]
pub struct RedisBackend {
    client: KVClient,
    encoding: Encoding,
}

impl RedisBackend {
    /// Builds the backend. No connection is opened until the first operation.
    pub fn new(config: &CacheConfig) -> CacheResult<Self> {
        let client = KVClient::with_config(config.client_config())?;
        debug!(addr = %config.addr, db = config.db, "redis backend created");
        Ok(RedisBackend {
            client,
            encoding: config.encoding,
        })
    }

    /// Builds the backend from a `redis://` URL.
    pub fn from_url(url: &str) -> CacheResult<Self> {
        Self::new(&CacheConfig::from_url(url)?)
    }

    /// Returns pool occupancy.
    pub fn stats(&self) -> PoolStats {
        self.client.stats()
    }

    /// Fails with `PoolClosed` before any encoding work is done.
    fn ensure_open(&self) -> CacheResult<()> {
        if self.client.is_closed() {
            return Err(CacheError::PoolClosed);
        }
        Ok(())
    }
}

#[async_trait]
impl CacheBackend for RedisBackend {
    async fn add(&self, key: &str, value: Value) -> CacheResult<bool> {
        validate_key(key)?;
        self.ensure_open()?;
        let stored = codec::encode(&value, self.encoding)?;
        self.client.set_nx(key.as_bytes(), &stored).await
    }

    async fn get_with(&self, key: &str, encoding: Encoding) -> CacheResult<Option<Value>> {
        validate_key(key)?;
        match self.client.get(key.as_bytes()).await? {
            Some(bytes) => codec::decode(bytes, encoding).map(Some),
            None => Ok(None),
        }
    }

    async fn set(&self, key: &str, value: Value) -> CacheResult<()> {
        validate_key(key)?;
        self.ensure_open()?;
        let stored = codec::encode(&value, self.encoding)?;
        self.client.set(key.as_bytes(), &stored).await
    }

    async fn set_with_ttl(&self, key: &str, value: Value, ttl: Duration) -> CacheResult<()> {
        validate_key(key)?;
        validate_ttl(ttl)?;
        self.ensure_open()?;
        let stored = codec::encode(&value, self.encoding)?;
        self.client.set_with_ttl(key.as_bytes(), &stored, ttl).await
    }

    async fn delete(&self, key: &str) -> CacheResult<()> {
        validate_key(key)?;
        self.client.delete(key.as_bytes()).await.map(|_| ())
    }

    async fn exists(&self, keys: &[&str]) -> CacheResult<u64> {
        validate_keys(keys)?;
        let keys: Vec<&[u8]> = keys.iter().map(|key| key.as_bytes()).collect();
        self.client.exists(&keys).await
    }

    async fn flush(&self) -> CacheResult<()> {
        self.client.flush_db().await
    }

    async fn ping(&self) -> CacheResult<()> {
        self.client.ping(None).await.map(|_| ())
    }

    async fn close(&self) -> CacheResult<()> {
        self.client.close().await
    }

    fn is_closed(&self) -> bool {
        self.client.is_closed()
    }

    fn encoding(&self) -> Encoding {
        self.encoding
    }
}
