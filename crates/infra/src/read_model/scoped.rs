use std::collections::HashMap;
use std::hash::Hash;
use std::sync::{Arc, RwLock};

use serde::Serialize;
use serde_json::Value;

use storerec_core::StoreId;

#[derive(Debug, Clone, thiserror::Error)]
pub enum StoreError {
    #[error("storage unavailable: {0}")]
    Unavailable(String),
    #[error("storage query failed: {0}")]
    Query(String),
    #[error("stored record could not be decoded: {0}")]
    Decode(String),
}

/// Store-isolated key/value storage.
///
/// Every operation except `scan_all` is scoped to one store; a key written
/// under one store is invisible to every other.
pub trait ScopedStore<K, V>: Send + Sync {
    fn get(&self, store_id: StoreId, key: &K) -> Result<Option<V>, StoreError>;
    fn upsert(&self, store_id: StoreId, key: K, value: V) -> Result<(), StoreError>;
    /// Returns whether a record was removed.
    fn remove(&self, store_id: StoreId, key: &K) -> Result<bool, StoreError>;
    fn list(&self, store_id: StoreId) -> Result<Vec<V>, StoreError>;
    fn clear_store(&self, store_id: StoreId) -> Result<(), StoreError>;
    /// Records of `store_id` whose top-level string `field` equals `value`.
    fn find_by(&self, store_id: StoreId, field: &str, value: &str) -> Result<Vec<V>, StoreError>;
    /// `find_by` across every store; for credential and domain lookups.
    fn find_all_by(&self, field: &str, value: &str) -> Result<Vec<V>, StoreError>;
    /// Records of every store. Only for store-level administration and
    /// scheduling, never for request handling.
    fn scan_all(&self) -> Result<Vec<V>, StoreError>;
}

impl<K, V, S> ScopedStore<K, V> for Arc<S>
where
    S: ScopedStore<K, V> + ?Sized,
{
    fn get(&self, store_id: StoreId, key: &K) -> Result<Option<V>, StoreError> {
        (**self).get(store_id, key)
    }

    fn upsert(&self, store_id: StoreId, key: K, value: V) -> Result<(), StoreError> {
        (**self).upsert(store_id, key, value)
    }

    fn remove(&self, store_id: StoreId, key: &K) -> Result<bool, StoreError> {
        (**self).remove(store_id, key)
    }

    fn list(&self, store_id: StoreId) -> Result<Vec<V>, StoreError> {
        (**self).list(store_id)
    }

    fn clear_store(&self, store_id: StoreId) -> Result<(), StoreError> {
        (**self).clear_store(store_id)
    }

    fn find_by(&self, store_id: StoreId, field: &str, value: &str) -> Result<Vec<V>, StoreError> {
        (**self).find_by(store_id, field, value)
    }

    fn find_all_by(&self, field: &str, value: &str) -> Result<Vec<V>, StoreError> {
        (**self).find_all_by(field, value)
    }

    fn scan_all(&self) -> Result<Vec<V>, StoreError> {
        (**self).scan_all()
    }
}

/// In-memory store for tests/dev.
#[derive(Debug)]
pub struct InMemoryScopedStore<K, V> {
    inner: RwLock<HashMap<(StoreId, K), V>>,
}

impl<K, V> InMemoryScopedStore<K, V> {
    pub fn new() -> Self {
        Self {
            inner: RwLock::new(HashMap::new()),
        }
    }
}

impl<K, V> Default for InMemoryScopedStore<K, V> {
    fn default() -> Self {
        Self::new()
    }
}

fn poisoned<T>(_: T) -> StoreError {
    StoreError::Unavailable("lock poisoned".to_string())
}

fn field_equals<V: Serialize>(record: &V, field: &str, value: &str) -> bool {
    match serde_json::to_value(record) {
        Ok(Value::Object(map)) => map.get(field).and_then(Value::as_str) == Some(value),
        _ => false,
    }
}

impl<K, V> ScopedStore<K, V> for InMemoryScopedStore<K, V>
where
    K: Clone + Eq + Hash + Send + Sync + 'static,
    V: Clone + Serialize + Send + Sync + 'static,
{
    fn get(&self, store_id: StoreId, key: &K) -> Result<Option<V>, StoreError> {
        let map = self.inner.read().map_err(poisoned)?;
        Ok(map.get(&(store_id, key.clone())).cloned())
    }

    fn upsert(&self, store_id: StoreId, key: K, value: V) -> Result<(), StoreError> {
        let mut map = self.inner.write().map_err(poisoned)?;
        map.insert((store_id, key), value);
        Ok(())
    }

    fn remove(&self, store_id: StoreId, key: &K) -> Result<bool, StoreError> {
        let mut map = self.inner.write().map_err(poisoned)?;
        Ok(map.remove(&(store_id, key.clone())).is_some())
    }

    fn list(&self, store_id: StoreId) -> Result<Vec<V>, StoreError> {
        let map = self.inner.read().map_err(poisoned)?;
        Ok(map
            .iter()
            .filter_map(|((s, _k), v)| (*s == store_id).then(|| v.clone()))
            .collect())
    }

    fn clear_store(&self, store_id: StoreId) -> Result<(), StoreError> {
        let mut map = self.inner.write().map_err(poisoned)?;
        map.retain(|(s, _k), _v| *s != store_id);
        Ok(())
    }

    fn find_by(&self, store_id: StoreId, field: &str, value: &str) -> Result<Vec<V>, StoreError> {
        let map = self.inner.read().map_err(poisoned)?;
        Ok(map
            .iter()
            .filter(|((s, _k), v)| *s == store_id && field_equals(*v, field, value))
            .map(|(_, v)| v.clone())
            .collect())
    }

    fn find_all_by(&self, field: &str, value: &str) -> Result<Vec<V>, StoreError> {
        let map = self.inner.read().map_err(poisoned)?;
        Ok(map.values().filter(|v| field_equals(*v, field, value)).cloned().collect())
    }

    fn scan_all(&self) -> Result<Vec<V>, StoreError> {
        let map = self.inner.read().map_err(poisoned)?;
        Ok(map.values().cloned().collect())
    }
}
