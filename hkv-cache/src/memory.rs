//! # In-Memory Backend
//!
//! Purpose: Serve the backend contract from a process-local map, for tests
//! and single-process deployments.
//!
//! ## Design Principles
//! 1. **Single Lock**: One mutex guards entries and the closed flag, so `add`
//!    is atomic and nothing runs after `close()`.
//! 2. **Stored Form**: Values are kept encoded, exactly like a remote store,
//!    so `Encoding::Raw` reads behave the same on both backends.
//! 3. **TTL Fast Path**: Expiration is checked on access; there is no sweeper.

use std::collections::HashMap;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use parking_lot::Mutex;
use tracing::debug;

use hkv_common::{codec, CacheError, CacheResult, Encoding, Value};

use crate::backend::{validate_key, validate_keys, validate_ttl, CacheBackend};

#[derive(Debug)]
struct Entry {
    value: Vec<u8>,
    expires_at: Option<Instant>,
}

impl Entry {
    fn is_expired(&self, now: Instant) -> bool {
        match self.expires_at {
            Some(deadline) => now >= deadline,
            None => false,
        }
    }
}

#[derive(Debug, Default)]
struct MemoryState {
    entries: HashMap<String, Entry>,
    closed: bool,
}

impl MemoryState {
    /// Returns the live entry for `key`, dropping it if it has expired.
    fn live(&mut self, key: &str, now: Instant) -> Option<&Entry> {
        if self.entries.get(key).is_some_and(|entry| entry.is_expired(now)) {
            self.entries.remove(key);
        }
        self.entries.get(key)
    }
}

/// Process-local cache backend.
#[derive(Debug)]
pub struct MemoryBackend {
    state: Mutex<MemoryState>,
    encoding: Encoding,
}

impl Default for MemoryBackend {
    fn default() -> Self {
        Self::new(Encoding::default())
    }
}

impl MemoryBackend {
    /// Creates an empty backend writing text with `encoding`.
    pub fn new(encoding: Encoding) -> Self {
        MemoryBackend {
            state: Mutex::new(MemoryState::default()),
            encoding,
        }
    }

    /// Number of stored entries, expired ones included until next access.
    pub fn len(&self) -> usize {
        self.state.lock().entries.len()
    }

    /// Returns true when nothing is stored.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Runs `f` against the open state, or fails with `PoolClosed`.
    fn with_open<T>(&self, f: impl FnOnce(&mut MemoryState) -> T) -> CacheResult<T> {
        let mut state = self.state.lock();
        if state.closed {
            return Err(CacheError::PoolClosed);
        }
        Ok(f(&mut state))
    }

    /// Fails with `PoolClosed` before any encoding work is done.
    fn ensure_open(&self) -> CacheResult<()> {
        if self.is_closed() {
            return Err(CacheError::PoolClosed);
        }
        Ok(())
    }

    fn write(&self, key: &str, value: &Value, ttl: Option<Duration>) -> CacheResult<()> {
        validate_key(key)?;
        self.ensure_open()?;
        let stored = codec::encode(value, self.encoding)?.into_owned();
        let expires_at = ttl
            .map(|ttl| {
                Instant::now()
                    .checked_add(ttl)
                    .ok_or(CacheError::InvalidArgument("ttl exceeds the maximum"))
            })
            .transpose()?;
        self.with_open(|state| {
            state.entries.insert(key.to_owned(), Entry { value: stored, expires_at });
        })
    }
}

#[async_trait]
impl CacheBackend for MemoryBackend {
    async fn add(&self, key: &str, value: Value) -> CacheResult<bool> {
        validate_key(key)?;
        self.ensure_open()?;
        let stored = codec::encode(&value, self.encoding)?.into_owned();
        self.with_open(|state| {
            if state.live(key, Instant::now()).is_some() {
                return false;
            }
            state.entries.insert(key.to_owned(), Entry { value: stored, expires_at: None });
            true
        })
    }

    async fn get_with(&self, key: &str, encoding: Encoding) -> CacheResult<Option<Value>> {
        validate_key(key)?;
        let stored = self.with_open(|state| state.live(key, Instant::now()).map(|entry| entry.value.clone()))?;
        stored.map(|bytes| codec::decode(bytes, encoding)).transpose()
    }

    async fn set(&self, key: &str, value: Value) -> CacheResult<()> {
        self.write(key, &value, None)
    }

    async fn set_with_ttl(&self, key: &str, value: Value, ttl: Duration) -> CacheResult<()> {
        validate_ttl(ttl)?;
        self.write(key, &value, Some(ttl))
    }

    async fn delete(&self, key: &str) -> CacheResult<()> {
        validate_key(key)?;
        self.with_open(|state| {
            state.entries.remove(key);
        })
    }

    async fn exists(&self, keys: &[&str]) -> CacheResult<u64> {
        validate_keys(keys)?;
        self.with_open(|state| {
            let now = Instant::now();
            keys.iter().filter(|key| state.live(key, now).is_some()).count() as u64
        })
    }

    async fn flush(&self) -> CacheResult<()> {
        self.with_open(|state| state.entries.clear())
    }

    async fn ping(&self) -> CacheResult<()> {
        self.with_open(|_| ())
    }

    async fn close(&self) -> CacheResult<()> {
        let mut state = self.state.lock();
        if !state.closed {
            state.closed = true;
            state.entries.clear();
            debug!("memory backend closed");
        }
        Ok(())
    }

    fn is_closed(&self) -> bool {
        self.state.lock().closed
    }

    fn encoding(&self) -> Encoding {
        self.encoding
    }
}
