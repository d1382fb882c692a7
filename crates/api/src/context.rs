use storerec_core::StoreId;
use storerec_tenancy::Store;

/// Store (tenant) context for a request, resolved from its API key.
///
/// This is immutable and must be present for all store routes.
#[derive(Debug, Clone, PartialEq)]
pub struct StoreContext {
    store: Store,
}

impl StoreContext {
    pub fn new(store: Store) -> Self {
        Self { store }
    }

    pub fn store_id(&self) -> StoreId {
        self.store.id
    }

    pub fn store(&self) -> &Store {
        &self.store
    }
}
