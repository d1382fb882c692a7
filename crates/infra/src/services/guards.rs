//! Serialises check-then-write sequences inside this process.
//!
//! Lookups by natural key (user id, session key, SKU, domain) followed by an
//! insert must not interleave, or two requests create the same record twice.

use std::sync::{Mutex, MutexGuard, PoisonError};

use storerec_core::StoreId;

const STRIPES: usize = 64;

pub(crate) struct WriteGuards {
    stripes: Vec<Mutex<()>>,
    provisioning: Mutex<()>,
}

impl WriteGuards {
    pub(crate) fn new() -> Self {
        Self {
            stripes: (0..STRIPES).map(|_| Mutex::new(())).collect(),
            provisioning: Mutex::new(()),
        }
    }

    /// Held while a store-scoped uniqueness check and its write run. Not
    /// reentrant.
    pub(crate) fn store(&self, store_id: StoreId) -> MutexGuard<'_, ()> {
        let stripe = (store_id.as_uuid().as_u128() % STRIPES as u128) as usize;
        self.stripes[stripe].lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Held while a store domain is checked and claimed.
    pub(crate) fn provisioning(&self) -> MutexGuard<'_, ()> {
        self.provisioning.lock().unwrap_or_else(PoisonError::into_inner)
    }
}
