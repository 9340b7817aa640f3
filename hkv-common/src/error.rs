//! # Error Taxonomy
//!
//! Purpose: Give every cache layer a single error type whose coarse kind is
//! stable for callers, while the variants keep enough detail for logs.
//!
//! ## Design Principles
//! 1. **Closed Taxonomy**: Every failure maps onto one of four `ErrorKind`s.
//! 2. **Absence Is Not Failure**: Missing keys are `Ok(None)`, never an error.
//! 3. **No Hidden Retries**: Errors surface to the immediate caller unchanged.

use std::io;
use std::time::Duration;

use thiserror::Error;

use crate::codec::Encoding;

/// Result type shared by the client and backend crates.
pub type CacheResult<T> = Result<T, CacheError>;

/// Coarse classification of a [`CacheError`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// The pool (and therefore the backend) has been closed.
    PoolClosed,
    /// Network or store unavailability while acquiring or executing.
    ConnectionFailure,
    /// Stored bytes cannot be decoded under the requested encoding.
    EncodingMismatch,
    /// Malformed input rejected before any network I/O.
    InvalidArgument,
}

/// Errors surfaced by the cache client and backends.
#[derive(Debug, Error)]
pub enum CacheError {
    /// Operation attempted after `close()`.
    #[error("connection pool is closed")]
    PoolClosed,
    /// Network or IO failure while connecting, reading or writing.
    #[error("io error: {0}")]
    Io(#[from] io::Error),
    /// Connect or command did not finish in time.
    #[error("operation timed out after {0:?}")]
    Timeout(Duration),
    /// RESP2 framing or parse error.
    #[error("protocol error: {0}")]
    Protocol(&'static str),
    /// Store returned an error reply.
    #[error("server error: {}", String::from_utf8_lossy(.message))]
    Server { message: Vec<u8> },
    /// Reply type did not match the command that was sent.
    #[error("unexpected response to {command}")]
    UnexpectedResponse { command: &'static str },
    /// Bytes could not be decoded (or text encoded) with `encoding`.
    #[error("value is not valid {encoding}")]
    EncodingMismatch { encoding: Encoding },
    /// Caller input rejected before touching the network.
    #[error("invalid argument: {0}")]
    InvalidArgument(&'static str),
    /// Store address or URL could not be parsed.
    #[error("invalid address: {0}")]
    InvalidAddress(String),
}

impl CacheError {
    /// Maps the error onto its coarse kind.
    pub fn kind(&self) -> ErrorKind {
        match self {
            CacheError::PoolClosed => ErrorKind::PoolClosed,
            CacheError::Io(_)
            | CacheError::Timeout(_)
            | CacheError::Protocol(_)
            | CacheError::Server { .. }
            | CacheError::UnexpectedResponse { .. } => ErrorKind::ConnectionFailure,
            CacheError::EncodingMismatch { .. } => ErrorKind::EncodingMismatch,
            CacheError::InvalidArgument(_) | CacheError::InvalidAddress(_) => {
                ErrorKind::InvalidArgument
            }
        }
    }

    /// Returns true when the error means the backend has been closed.
    pub fn is_pool_closed(&self) -> bool {
        self.kind() == ErrorKind::PoolClosed
    }
}
