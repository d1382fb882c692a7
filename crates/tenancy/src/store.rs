//! The store record: one tenant of the recommendation service.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use storerec_core::{DomainError, DomainResult, Entity, StoreId};

use crate::api_key::{generate_api_key, generate_webhook_secret};

/// E-commerce platform a store runs on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum Platform {
    Shopify,
    Woocommerce,
    Bigcommerce,
    #[default]
    Custom,
}

impl Platform {
    pub fn as_str(&self) -> &'static str {
        match self {
            Platform::Shopify => "shopify",
            Platform::Woocommerce => "woocommerce",
            Platform::Bigcommerce => "bigcommerce",
            Platform::Custom => "custom",
        }
    }
}

impl core::str::FromStr for Platform {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "shopify" => Ok(Platform::Shopify),
            "woocommerce" => Ok(Platform::Woocommerce),
            "bigcommerce" => Ok(Platform::Bigcommerce),
            "custom" => Ok(Platform::Custom),
            other => Err(DomainError::validation(format!("unknown platform '{other}'"))),
        }
    }
}

/// Input for provisioning a store.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct NewStore {
    pub name: String,
    pub domain: String,
    #[serde(default)]
    pub platform: Platform,
    #[serde(default)]
    pub config: Option<Value>,
}

/// Partial update of mutable store fields.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct StorePatch {
    pub name: Option<String>,
    pub is_active: Option<bool>,
    pub is_verified: Option<bool>,
}

/// A tenant store.
///
/// # Invariants
/// - `domain` is trimmed, lower-cased and non-empty (uniqueness is enforced by storage).
/// - `config` is always a JSON object.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Store {
    pub id: StoreId,
    pub name: String,
    pub domain: String,
    pub platform: Platform,
    pub api_key: String,
    pub webhook_secret: String,
    pub config: Value,
    pub is_active: bool,
    pub is_verified: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub last_sync_at: Option<DateTime<Utc>>,
}

impl Store {
    pub fn provision(input: NewStore, now: DateTime<Utc>) -> DomainResult<Self> {
        let name = input.name.trim();
        if name.is_empty() {
            return Err(DomainError::validation("store name cannot be empty"));
        }
        let domain = normalize_domain(&input.domain)?;
        let config = match input.config {
            None | Some(Value::Null) => Value::Object(Map::new()),
            Some(v @ Value::Object(_)) => v,
            Some(_) => return Err(DomainError::validation("store config must be an object")),
        };

        Ok(Self {
            id: StoreId::new(),
            name: name.to_string(),
            domain,
            platform: input.platform,
            api_key: generate_api_key(),
            webhook_secret: generate_webhook_secret(),
            config,
            is_active: true,
            is_verified: false,
            created_at: now,
            updated_at: now,
            last_sync_at: None,
        })
    }

    /// Replace the primary API key; returns the new key.
    pub fn regenerate_api_key(&mut self, now: DateTime<Utc>) -> &str {
        self.api_key = generate_api_key();
        self.updated_at = now;
        &self.api_key
    }

    /// Shallow-merge `patch` into the store config.
    pub fn update_config(&mut self, patch: Value, now: DateTime<Utc>) -> DomainResult<()> {
        let Value::Object(patch) = patch else {
            return Err(DomainError::validation("config patch must be an object"));
        };
        let config = match &mut self.config {
            Value::Object(map) => map,
            other => {
                *other = Value::Object(Map::new());
                other
                    .as_object_mut()
                    .ok_or_else(|| DomainError::invariant("store config is not an object"))?
            }
        };
        for (k, v) in patch {
            config.insert(k, v);
        }
        self.updated_at = now;
        Ok(())
    }

    pub fn apply_patch(&mut self, patch: StorePatch, now: DateTime<Utc>) -> DomainResult<()> {
        if let Some(name) = patch.name {
            let name = name.trim();
            if name.is_empty() {
                return Err(DomainError::validation("store name cannot be empty"));
            }
            self.name = name.to_string();
        }
        if let Some(active) = patch.is_active {
            self.is_active = active;
        }
        if let Some(verified) = patch.is_verified {
            self.is_verified = verified;
        }
        self.updated_at = now;
        Ok(())
    }

    pub fn mark_synced(&mut self, now: DateTime<Utc>) {
        self.last_sync_at = Some(now);
        self.updated_at = now;
    }
}

impl Entity for Store {
    type Id = StoreId;

    fn id(&self) -> &Self::Id {
        &self.id
    }
}

fn normalize_domain(raw: &str) -> DomainResult<String> {
    let domain = raw.trim().trim_end_matches('/').to_ascii_lowercase();
    let domain = domain
        .strip_prefix("https://")
        .or_else(|| domain.strip_prefix("http://"))
        .unwrap_or(&domain)
        .to_string();
    if domain.is_empty() || domain.contains(char::is_whitespace) {
        return Err(DomainError::validation("store domain is invalid"));
    }
    Ok(domain)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn new_store() -> NewStore {
        NewStore {
            name: "Acme".into(),
            domain: "https://Shop.Acme.com/".into(),
            platform: Platform::Shopify,
            config: None,
        }
    }

    #[test]
    fn provision_normalizes_domain_and_generates_credentials() {
        let store = Store::provision(new_store(), Utc::now()).unwrap();
        assert_eq!(store.domain, "shop.acme.com");
        assert!(store.api_key.starts_with("sk_"));
        assert!(store.webhook_secret.starts_with("wh_"));
        assert!(store.is_active);
        assert!(!store.is_verified);
        assert_eq!(store.config, json!({}));
    }

    #[test]
    fn provision_rejects_blank_name_and_non_object_config() {
        let mut input = new_store();
        input.name = " ".into();
        assert!(Store::provision(input, Utc::now()).is_err());

        let mut input = new_store();
        input.config = Some(json!([1, 2]));
        assert!(Store::provision(input, Utc::now()).is_err());
    }

    #[test]
    fn regenerate_changes_primary_key() {
        let mut store = Store::provision(new_store(), Utc::now()).unwrap();
        let before = store.api_key.clone();
        store.regenerate_api_key(Utc::now());
        assert_ne!(store.api_key, before);
    }

    #[test]
    fn update_config_merges_shallowly() {
        let mut store = Store::provision(new_store(), Utc::now()).unwrap();
        store
            .update_config(json!({"currency": "EUR", "filters": {"in_stock_only": true}}), Utc::now())
            .unwrap();
        store.update_config(json!({"currency": "USD"}), Utc::now()).unwrap();
        assert_eq!(
            store.config,
            json!({"currency": "USD", "filters": {"in_stock_only": true}})
        );
        assert!(store.update_config(json!("nope"), Utc::now()).is_err());
    }

    #[test]
    fn platform_parses_known_names() {
        assert_eq!("woocommerce".parse::<Platform>().unwrap(), Platform::Woocommerce);
        assert!("magento".parse::<Platform>().is_err());
    }
}
