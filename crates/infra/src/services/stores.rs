//! Store provisioning, authentication and API key management.

use serde::Serialize;
use serde_json::Value;
use tracing::{info, warn};

use storerec_core::{DomainError, RecordId, StoreId};
use storerec_tenancy::{KeyResolution, NewStore, Store, StoreApiKey, StorePatch, resolve_api_key};

use super::{AppServices, RecordRepo, ServiceResult};

/// The store's primary key after regeneration.
#[derive(Debug, Clone, Serialize)]
pub struct StoreKeys {
    pub api_key: String,
}

impl AppServices {
    /// Create a store; domains are unique across the service.
    pub fn provision_store(&self, input: NewStore) -> ServiceResult<Store> {
        let store = Store::provision(input, self.now())?;
        let _guard = self.guards.provisioning();
        if !self.repos.stores.find_all_by("domain", &store.domain)?.is_empty() {
            return Err(DomainError::conflict(format!("store with domain '{}' already exists", store.domain)).into());
        }
        self.repos.stores.save(store.id, &store)?;
        info!(store = %store.id, domain = %store.domain, "store provisioned");
        Ok(store)
    }

    /// Every store, newest first.
    pub fn list_stores(&self) -> ServiceResult<Vec<Store>> {
        let mut stores = self.repos.stores.scan_all()?;
        stores.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(stores)
    }

    pub fn get_store(&self, store_id: StoreId) -> ServiceResult<Store> {
        self.repos.stores.require(store_id, &store_id, "store")
    }

    /// Resolve a presented API key to an active store.
    ///
    /// A matching secondary key gets its `last_used` refreshed.
    pub fn authenticate(&self, presented: &str) -> ServiceResult<Option<Store>> {
        if presented.is_empty() {
            return Ok(None);
        }
        let mut stores = self.repos.stores.find_all_by("api_key", presented)?;
        let keys = self.repos.api_keys.find_all_by("key", presented)?;
        for key in &keys {
            if stores.iter().all(|s| s.id != key.store_id) {
                if let Some(owner) = self.repos.stores.get(key.store_id, &key.store_id)? {
                    stores.push(owner);
                }
            }
        }
        let Some(resolution) = resolve_api_key(presented, &stores, &keys) else {
            return Ok(None);
        };

        if let KeyResolution::Secondary { store_id, key_id } = resolution {
            if let Some(mut key) = keys.into_iter().find(|k| k.id == key_id) {
                key.touch(self.now());
                if let Err(e) = self.repos.api_keys.save(store_id, &key) {
                    warn!(store = %store_id, key = %key_id, error = %e, "failed to record api key use");
                }
            }
        }

        let store_id = resolution.store_id();
        Ok(stores.into_iter().find(|s| s.id == store_id))
    }

    /// Rename, (de)activate or verify a store. Inactive stores stop authenticating.
    pub fn update_store(&self, store_id: StoreId, patch: StorePatch) -> ServiceResult<Store> {
        let mut store = self.get_store(store_id)?;
        store.apply_patch(patch, self.now())?;
        self.repos.stores.save(store_id, &store)?;
        info!(store = %store_id, active = store.is_active, "store updated");
        Ok(store)
    }

    pub fn update_store_config(&self, store_id: StoreId, patch: Value) -> ServiceResult<Store> {
        let mut store = self.get_store(store_id)?;
        store.update_config(patch, self.now())?;
        self.repos.stores.save(store_id, &store)?;
        Ok(store)
    }

    pub fn regenerate_store_key(&self, store_id: StoreId) -> ServiceResult<StoreKeys> {
        let mut store = self.get_store(store_id)?;
        let api_key = store.regenerate_api_key(self.now()).to_string();
        self.repos.stores.save(store_id, &store)?;
        info!(store = %store_id, "primary api key regenerated");
        Ok(StoreKeys { api_key })
    }

    pub fn list_api_keys(&self, store_id: StoreId) -> ServiceResult<Vec<StoreApiKey>> {
        let mut keys = self.repos.api_keys.list(store_id)?;
        keys.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(keys)
    }

    pub fn create_api_key(&self, store_id: StoreId, name: &str) -> ServiceResult<StoreApiKey> {
        let key = StoreApiKey::create(store_id, name, self.now())?;
        self.repos.api_keys.save(store_id, &key)?;
        Ok(key)
    }

    pub fn regenerate_api_key(&self, store_id: StoreId, key_id: RecordId) -> ServiceResult<StoreApiKey> {
        let mut key = self.repos.api_keys.require(store_id, &key_id, "api key")?;
        key.regenerate();
        self.repos.api_keys.save(store_id, &key)?;
        Ok(key)
    }

    pub fn deactivate_api_key(&self, store_id: StoreId, key_id: RecordId) -> ServiceResult<StoreApiKey> {
        let mut key = self.repos.api_keys.require(store_id, &key_id, "api key")?;
        key.deactivate();
        self.repos.api_keys.save(store_id, &key)?;
        Ok(key)
    }
}
