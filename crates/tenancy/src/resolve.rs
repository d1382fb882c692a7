//! Resolving a presented `X-API-Key` to a store.

use storerec_core::{RecordId, StoreId};

use crate::{Store, StoreApiKey};

/// Outcome of a successful key lookup.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KeyResolution {
    /// The store's primary key matched.
    Primary(StoreId),
    /// A secondary key matched; its `last_used` should be refreshed.
    Secondary { store_id: StoreId, key_id: RecordId },
}

impl KeyResolution {
    pub fn store_id(&self) -> StoreId {
        match self {
            KeyResolution::Primary(id) => *id,
            KeyResolution::Secondary { store_id, .. } => *store_id,
        }
    }
}

/// Match `presented` against active stores and their active secondary keys.
///
/// Inactive stores never resolve, even through a still-active secondary key.
pub fn resolve_api_key<'a>(
    presented: &str,
    stores: impl IntoIterator<Item = &'a Store>,
    keys: impl IntoIterator<Item = &'a StoreApiKey>,
) -> Option<KeyResolution> {
    if presented.is_empty() {
        return None;
    }

    let active: Vec<&Store> = stores.into_iter().filter(|s| s.is_active).collect();

    if let Some(store) = active.iter().find(|s| constant_time_eq(&s.api_key, presented)) {
        return Some(KeyResolution::Primary(store.id));
    }

    keys.into_iter()
        .filter(|k| k.is_active && constant_time_eq(&k.key, presented))
        .find(|k| active.iter().any(|s| s.id == k.store_id))
        .map(|k| KeyResolution::Secondary {
            store_id: k.store_id,
            key_id: k.id,
        })
}

fn constant_time_eq(a: &str, b: &str) -> bool {
    let (a, b) = (a.as_bytes(), b.as_bytes());
    if a.len() != b.len() {
        return false;
    }
    a.iter().zip(b).fold(0u8, |acc, (x, y)| acc | (x ^ y)) == 0
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{NewStore, Platform};
    use chrono::Utc;

    fn store(name: &str) -> Store {
        Store::provision(
            NewStore {
                name: name.into(),
                domain: format!("{name}.example"),
                platform: Platform::Custom,
                config: None,
            },
            Utc::now(),
        )
        .unwrap()
    }

    #[test]
    fn resolves_primary_key_of_active_store() {
        let a = store("a");
        let b = store("b");
        let found = resolve_api_key(&b.api_key, [&a, &b], []).unwrap();
        assert_eq!(found, KeyResolution::Primary(b.id));
    }

    #[test]
    fn inactive_store_does_not_resolve() {
        let mut a = store("a");
        a.is_active = false;
        assert!(resolve_api_key(&a.api_key, [&a], []).is_none());

        let key = StoreApiKey::create(a.id, "pos", Utc::now()).unwrap();
        assert!(resolve_api_key(&key.key, [&a], [&key]).is_none());
    }

    #[test]
    fn resolves_active_secondary_key_only() {
        let a = store("a");
        let mut key = StoreApiKey::create(a.id, "pos", Utc::now()).unwrap();
        let found = resolve_api_key(&key.key, [&a], [&key]).unwrap();
        assert_eq!(found.store_id(), a.id);
        assert!(matches!(found, KeyResolution::Secondary { .. }));

        key.deactivate();
        assert!(resolve_api_key(&key.key, [&a], [&key]).is_none());
    }

    #[test]
    fn unknown_or_empty_key_does_not_resolve() {
        let a = store("a");
        assert!(resolve_api_key("sk_nope", [&a], []).is_none());
        assert!(resolve_api_key("", [&a], []).is_none());
    }
}
