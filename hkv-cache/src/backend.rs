//! # Backend Contract
//!
//! Purpose: Define the one interface every cache backend implements, so the
//! store behind it can be chosen at construction time.
//!
//! ## Design Principles
//! 1. **Strategy Pattern**: Callers hold `Arc<dyn CacheBackend>` and never see
//!    which store serves them.
//! 2. **Absence Is a Value**: Missing keys are `Ok(None)` / the caller's default.
//! 3. **Explicit Lifecycle**: After `close()` every operation returns
//!    `CacheError::PoolClosed`; a second `close()` is a no-op.
//!
//! ## State Machine
//!
//! ```text
//! constructed --first op--> active --close()--> closed
//!                                                 └─ every op: Err(PoolClosed)
//! ```

use std::time::Duration;

use async_trait::async_trait;

use hkv_common::{CacheError, CacheResult, Encoding, Value};

/// Cache operations shared by every backing store.
#[async_trait]
pub trait CacheBackend: Send + Sync {
    /// Writes `value` only if `key` is absent. Returns true when written.
    ///
    /// Atomic per key: of N concurrent calls for a fresh key exactly one
    /// returns true.
    async fn add(&self, key: &str, value: Value) -> CacheResult<bool>;

    /// Reads `key`, decoding per `encoding`. `Encoding::Raw` returns the
    /// stored bytes unchanged.
    async fn get_with(&self, key: &str, encoding: Encoding) -> CacheResult<Option<Value>>;

    /// Unconditionally writes `value` under `key`.
    async fn set(&self, key: &str, value: Value) -> CacheResult<()>;

    /// Writes `value` and lets the store expire it after `ttl`.
    async fn set_with_ttl(&self, key: &str, value: Value, ttl: Duration) -> CacheResult<()>;

    /// Removes `key`. Absent keys are not an error.
    async fn delete(&self, key: &str) -> CacheResult<()>;

    /// Counts the argument positions whose key exists; duplicates count
    /// once per occurrence.
    async fn exists(&self, keys: &[&str]) -> CacheResult<u64>;

    /// Removes every key in this backend's namespace.
    async fn flush(&self) -> CacheResult<()>;

    /// Round-trips to the store to check it is reachable.
    async fn ping(&self) -> CacheResult<()>;

    /// Releases every resource and moves the backend to the closed state.
    async fn close(&self) -> CacheResult<()>;

    /// Returns true once `close()` has run.
    fn is_closed(&self) -> bool;

    /// Encoding used for writes and for `get`.
    fn encoding(&self) -> Encoding;

    /// Reads `key` with the backend's default encoding.
    async fn get(&self, key: &str) -> CacheResult<Option<Value>> {
        self.get_with(key, self.encoding()).await
    }

    /// Reads `key`, returning `default` untouched when it is absent.
    async fn get_or(&self, key: &str, default: Value, encoding: Encoding) -> CacheResult<Value> {
        Ok(self.get_with(key, encoding).await?.unwrap_or(default))
    }
}

/// Rejects keys the store cannot address.
pub(crate) fn validate_key(key: &str) -> CacheResult<()> {
    if key.is_empty() {
        return Err(CacheError::InvalidArgument("key must not be empty"));
    }
    Ok(())
}

pub(crate) fn validate_keys(keys: &[&str]) -> CacheResult<()> {
    if keys.is_empty() {
        return Err(CacheError::InvalidArgument("exists needs at least one key"));
    }
    keys.iter().try_for_each(|key| validate_key(key))
}

/// Longest TTL either backend accepts (ten years).
pub const MAX_TTL: Duration = Duration::from_secs(10 * 365 * 24 * 60 * 60);

/// Stores expire in whole seconds, so a TTL must be a whole number of
/// seconds between one second and [`MAX_TTL`].
pub(crate) fn validate_ttl(ttl: Duration) -> CacheResult<()> {
    if ttl.as_secs() == 0 {
        return Err(CacheError::InvalidArgument("ttl must be at least one second"));
    }
    if ttl.subsec_nanos() != 0 {
        return Err(CacheError::InvalidArgument("ttl must be a whole number of seconds"));
    }
    if ttl > MAX_TTL {
        return Err(CacheError::InvalidArgument("ttl exceeds the maximum"));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_keys_are_rejected() {
        assert!(validate_key("k").is_ok());
        assert!(matches!(validate_key(""), Err(CacheError::InvalidArgument(_))));
        assert!(matches!(validate_keys(&[]), Err(CacheError::InvalidArgument(_))));
        assert!(matches!(validate_keys(&["a", ""]), Err(CacheError::InvalidArgument(_))));
    }

    #[test]
    fn sub_second_ttl_is_rejected() {
        assert!(validate_ttl(Duration::from_secs(1)).is_ok());
        assert!(validate_ttl(Duration::from_millis(999)).is_err());
    }

    #[test]
    fn fractional_ttl_is_rejected() {
        assert!(matches!(
            validate_ttl(Duration::from_millis(1_500)),
            Err(CacheError::InvalidArgument(_))
        ));
    }

    #[test]
    fn ttl_upper_bound_is_enforced() {
        assert!(validate_ttl(MAX_TTL).is_ok());
        assert!(validate_ttl(MAX_TTL + Duration::from_secs(1)).is_err());
        assert!(validate_ttl(Duration::from_secs(u64::MAX)).is_err());
    }
}
