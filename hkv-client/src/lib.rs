//! # HybridKV Async Client
//!
//! Purpose: Provide a lightweight async Redis-compatible client with
//! connection pooling to minimize TCP handshake overhead.
//!
//! ## Design Principles
//! 1. **Object Pool Pattern**: Reuse TCP connections to avoid repeated connects.
//! 2. **Explicit Lifecycle**: A closed pool rejects every later command.
//! 3. **Minimal Allocation**: Reuse buffers for RESP framing and parsing.
//! 4. **Protocol Clarity**: Encode/parse RESP2 explicitly for correctness.

mod client;
mod pool;
mod resp;

pub use client::{ClientConfig, KVClient};
pub use pool::{ConnectionPool, PoolConfig, PoolStats, PooledConnection};
pub use resp::{encode_command, parse_response, RespValue};
