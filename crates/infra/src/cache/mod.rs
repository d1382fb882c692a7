//! Read-path cache.
//!
//! Values are JSON documents with a TTL. Cache failures never fail a request:
//! the typed helpers log them and behave like a miss.

pub mod keys;
pub mod memory;
#[cfg(feature = "redis")]
pub mod redis;

use std::time::Duration;

use serde::Serialize;
use serde::de::DeserializeOwned;
use serde_json::Value;
use tracing::warn;

pub use memory::InMemoryCache;
#[cfg(feature = "redis")]
pub use self::redis::RedisCache;

#[derive(Debug, Clone, thiserror::Error)]
pub enum CacheError {
    #[error("cache connection error: {0}")]
    Connection(String),
    #[error("cache command error: {0}")]
    Command(String),
    #[error("cache serialization error: {0}")]
    Serialization(String),
}

pub trait Cache: Send + Sync {
    fn get(&self, key: &str) -> Result<Option<Value>, CacheError>;

    fn set(&self, key: &str, value: &Value, ttl: Duration) -> Result<(), CacheError>;

    /// Drop every entry whose key starts with `prefix`; returns how many went.
    fn invalidate_prefix(&self, prefix: &str) -> Result<usize, CacheError>;
}

/// Typed read; errors and undecodable entries count as misses.
pub fn get_json<T: DeserializeOwned>(cache: &dyn Cache, key: &str) -> Option<T> {
    match cache.get(key) {
        Ok(Some(value)) => match serde_json::from_value(value) {
            Ok(v) => Some(v),
            Err(e) => {
                warn!(key, error = %e, "discarding undecodable cache entry");
                None
            }
        },
        Ok(None) => None,
        Err(e) => {
            warn!(key, error = %e, "cache read failed");
            None
        }
    }
}

pub fn set_json<T: Serialize>(cache: &dyn Cache, key: &str, value: &T, ttl: Duration) {
    let result = serde_json::to_value(value)
        .map_err(|e| CacheError::Serialization(e.to_string()))
        .and_then(|v| cache.set(key, &v, ttl));
    if let Err(e) = result {
        warn!(key, error = %e, "cache write failed");
    }
}

pub fn invalidate(cache: &dyn Cache, prefix: &str) {
    if let Err(e) = cache.invalidate_prefix(prefix) {
        warn!(prefix, error = %e, "cache invalidation failed");
    }
}
