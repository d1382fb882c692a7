//! API key generation and secondary store keys.

use base64::Engine;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use chrono::{DateTime, Utc};
use rand::RngCore;
use serde::{Deserialize, Serialize};

use storerec_core::{DomainError, DomainResult, Entity, RecordId, StoreId};

pub const API_KEY_PREFIX: &str = "sk_";
pub const WEBHOOK_SECRET_PREFIX: &str = "wh_";

fn random_token(len: usize) -> String {
    let mut bytes = vec![0u8; len];
    rand::thread_rng().fill_bytes(&mut bytes);
    URL_SAFE_NO_PAD.encode(bytes)
}

/// `sk_` followed by 32 random bytes, URL-safe base64.
pub fn generate_api_key() -> String {
    format!("{API_KEY_PREFIX}{}", random_token(32))
}

/// `wh_` followed by 16 random bytes, URL-safe base64.
pub fn generate_webhook_secret() -> String {
    format!("{WEBHOOK_SECRET_PREFIX}{}", random_token(16))
}

/// An additional named key for a store (e.g. one per integration).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StoreApiKey {
    pub id: RecordId,
    pub store_id: StoreId,
    pub name: String,
    pub key: String,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
    pub last_used: Option<DateTime<Utc>>,
}

impl StoreApiKey {
    pub fn create(store_id: StoreId, name: &str, now: DateTime<Utc>) -> DomainResult<Self> {
        let name = name.trim();
        if name.is_empty() {
            return Err(DomainError::validation("api key name cannot be empty"));
        }
        Ok(Self {
            id: RecordId::new(),
            store_id,
            name: name.to_string(),
            key: generate_api_key(),
            is_active: true,
            created_at: now,
            last_used: None,
        })
    }

    /// Replace the key material; returns the new key.
    pub fn regenerate(&mut self) -> &str {
        self.key = generate_api_key();
        &self.key
    }

    pub fn deactivate(&mut self) {
        self.is_active = false;
    }

    pub fn touch(&mut self, now: DateTime<Utc>) {
        self.last_used = Some(now);
    }
}

impl Entity for StoreApiKey {
    type Id = RecordId;

    fn id(&self) -> &Self::Id {
        &self.id
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn generated_keys_have_prefix_and_length() {
        let key = generate_api_key();
        assert!(key.starts_with("sk_"));
        // 32 bytes -> 43 base64 chars without padding
        assert_eq!(key.len(), 3 + 43);

        let secret = generate_webhook_secret();
        assert!(secret.starts_with("wh_"));
        assert_eq!(secret.len(), 3 + 22);
    }

    #[test]
    fn generated_keys_are_url_safe_and_unique() {
        let a = generate_api_key();
        let b = generate_api_key();
        assert_ne!(a, b);
        assert!(
            a[3..]
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_')
        );
    }

    #[test]
    fn create_rejects_blank_name() {
        let err = StoreApiKey::create(StoreId::new(), "   ", Utc::now()).unwrap_err();
        assert!(matches!(err, DomainError::Validation(_)));
    }

    #[test]
    fn regenerate_replaces_key() {
        let mut key = StoreApiKey::create(StoreId::new(), "checkout", Utc::now()).unwrap();
        let old = key.key.clone();
        let new = key.regenerate().to_string();
        assert_ne!(old, new);
        assert_eq!(key.key, new);
    }
}
