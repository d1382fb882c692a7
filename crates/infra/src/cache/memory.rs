use std::collections::HashMap;
use std::sync::{Mutex, PoisonError};
use std::time::{Duration, Instant};

use serde_json::Value;

use super::{Cache, CacheError};

/// Process-local TTL map.
#[derive(Debug, Default)]
pub struct InMemoryCache {
    entries: Mutex<HashMap<String, (Value, Instant)>>,
}

impl InMemoryCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.entries.lock().map(|e| e.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

fn poisoned<T>(_: PoisonError<T>) -> CacheError {
    CacheError::Connection("cache lock poisoned".to_string())
}

impl Cache for InMemoryCache {
    fn get(&self, key: &str) -> Result<Option<Value>, CacheError> {
        let mut entries = self.entries.lock().map_err(poisoned)?;
        match entries.get(key) {
            Some((value, expires)) if *expires > Instant::now() => Ok(Some(value.clone())),
            Some(_) => {
                entries.remove(key);
                Ok(None)
            }
            None => Ok(None),
        }
    }

    fn set(&self, key: &str, value: &Value, ttl: Duration) -> Result<(), CacheError> {
        let mut entries = self.entries.lock().map_err(poisoned)?;
        let now = Instant::now();
        entries.retain(|_, (_, expires)| *expires > now);
        entries.insert(key.to_string(), (value.clone(), now + ttl));
        Ok(())
    }

    fn invalidate_prefix(&self, prefix: &str) -> Result<usize, CacheError> {
        let mut entries = self.entries.lock().map_err(poisoned)?;
        let before = entries.len();
        entries.retain(|k, _| !k.starts_with(prefix));
        Ok(before - entries.len())
    }
}
