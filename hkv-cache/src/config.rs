//! # Backend Configuration
//!
//! Purpose: Describe which store a backend talks to and how its pool is
//! sized, either from a `redis://` / `memory://` URL or from any serde source.
//!
//! ## URL Forms
//!
//! ```text
//! redis://localhost                 -> localhost:6379, db 0
//! redis://:secret@10.0.0.5:6380/2   -> AUTH secret, SELECT 2
//! redis://[::1]:6379/1              -> IPv6 literal
//! memory://                         -> in-process backend
//! ```

use std::time::Duration;

use serde::Deserialize;

use hkv_client::ClientConfig;
use hkv_common::{CacheError, CacheResult, Encoding};

/// Default Redis port used when a URL omits one.
pub const DEFAULT_PORT: u16 = 6379;

/// Which store backs the cache.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BackendKind {
    /// Remote Redis-compatible store over RESP2.
    #[default]
    Redis,
    /// In-process map, nothing shared across processes.
    Memory,
}

/// Construction parameters for a cache backend.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct CacheConfig {
    /// Backing store variant.
    pub kind: BackendKind,
    /// Store address as `host:port`.
    pub addr: String,
    /// Logical database, the backend's namespace for `flush`.
    pub db: u32,
    /// Optional AUTH password.
    pub password: Option<String>,
    /// Encoding for text writes and default reads.
    pub encoding: Encoding,
    /// Maximum idle connections retained.
    pub max_idle: usize,
    /// Maximum concurrent connections.
    pub max_total: usize,
    /// Connect timeout in milliseconds.
    pub connect_timeout_ms: Option<u64>,
    /// Per-command timeout in milliseconds.
    pub command_timeout_ms: Option<u64>,
}

impl Default for CacheConfig {
    fn default() -> Self {
        let client = ClientConfig::default();
        CacheConfig {
            kind: BackendKind::Redis,
            addr: client.addr,
            db: client.db,
            password: client.password,
            encoding: Encoding::default(),
            max_idle: client.max_idle,
            max_total: client.max_total,
            connect_timeout_ms: None,
            command_timeout_ms: None,
        }
    }
}

impl CacheConfig {
    /// Parses a `redis://[:password@]host[:port][/db]` or `memory://` URL.
    pub fn from_url(url: &str) -> CacheResult<Self> {
        let invalid = || CacheError::InvalidAddress(url.to_string());
        let (scheme, rest) = url.split_once("://").ok_or_else(invalid)?;

        match scheme {
            "memory" => Ok(CacheConfig {
                kind: BackendKind::Memory,
                ..CacheConfig::default()
            }),
            "redis" => {
                let (authority, path) = rest.split_once('/').unwrap_or((rest, ""));
                let (userinfo, host_port) = match authority.rsplit_once('@') {
                    Some((userinfo, host_port)) => (Some(userinfo), host_port),
                    None => (None, authority),
                };
                let password = userinfo
                    .and_then(|info| info.split_once(':'))
                    .map(|(_, password)| password)
                    .filter(|password| !password.is_empty())
                    .map(str::to_owned);
                let addr = parse_host_port(host_port).ok_or_else(invalid)?;
                let db = match path.trim_end_matches('/') {
                    "" => 0,
                    db => db.parse().map_err(|_| invalid())?,
                };

                Ok(CacheConfig {
                    kind: BackendKind::Redis,
                    addr,
                    db,
                    password,
                    ..CacheConfig::default()
                })
            }
            _ => Err(invalid()),
        }
    }

    /// Client settings derived from this configuration.
    pub fn client_config(&self) -> ClientConfig {
        ClientConfig {
            addr: self.addr.clone(),
            db: self.db,
            password: self.password.clone(),
            max_idle: self.max_idle,
            max_total: self.max_total,
            connect_timeout: self.connect_timeout_ms.map(Duration::from_millis),
            command_timeout: self.command_timeout_ms.map(Duration::from_millis),
        }
    }
}

fn parse_host_port(input: &str) -> Option<String> {
    let (host, port) = if let Some(bracketed) = input.strip_prefix('[') {
        let (host, tail) = bracketed.split_once(']')?;
        let port = match tail {
            "" => None,
            tail => Some(tail.strip_prefix(':')?),
        };
        (format!("[{host}]"), port)
    } else {
        match input.rsplit_once(':') {
            Some((host, port)) => (host.to_string(), Some(port)),
            None => (input.to_string(), None),
        }
    };

    if host.is_empty() || host == "[]" {
        return None;
    }
    let port = match port {
        Some(port) => port.parse::<u16>().ok()?,
        None => DEFAULT_PORT,
    };
    Some(format!("{host}:{port}"))
}
