//! # HybridKV Cache Backends
//!
//! Purpose: Give application code a small async cache contract (add / get /
//! set / delete / exists / flush / close) with explicit atomicity and
//! encoding guarantees, served by a pluggable store.
//!
//! ## Usage
//!
//! - Use `connect(&CacheConfig::from_url("redis://localhost/0")?)` to get an
//!   `Arc<dyn CacheBackend>` for the configured store.
//! - Use `RedisBackend` or `MemoryBackend` directly when the store is fixed.
//! - Call `close()` when done; the backend never closes itself.
//!
//! ## Structure Overview
//!
//! ```text
//! CacheBackend (trait)
//!   ├── RedisBackend  -> KVClient -> ConnectionPool -> TCP/RESP2
//!   └── MemoryBackend -> Mutex<HashMap>
//! ```

mod backend;
mod config;
mod memory;
mod redis;

use std::sync::Arc;

pub use backend::{CacheBackend, MAX_TTL};
pub use config::{BackendKind, CacheConfig, DEFAULT_PORT};
pub use hkv_client::PoolStats;
pub use hkv_common::{CacheError, CacheResult, Encoding, ErrorKind, Value};
pub use memory::MemoryBackend;
pub use redis::RedisBackend;

/// Builds the backend variant selected by `config.kind`.
///
/// Construction performs no I/O; connection problems surface on first use.
pub fn connect(config: &CacheConfig) -> CacheResult<Arc<dyn CacheBackend>> {
    let backend: Arc<dyn CacheBackend> = match config.kind {
        BackendKind::Redis => Arc::new(RedisBackend::new(config)?),
        BackendKind::Memory => Arc::new(MemoryBackend::new(config.encoding)),
    };
    Ok(backend)
}
