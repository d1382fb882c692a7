//! `storerec-tenancy`: stores (tenants) and their API credentials.
//!
//! This crate is intentionally decoupled from HTTP and storage: it owns the
//! store record, key generation and the rules for resolving a presented key to
//! a store.

pub mod api_key;
pub mod resolve;
pub mod store;

pub use api_key::{StoreApiKey, generate_api_key, generate_webhook_secret};
pub use resolve::{KeyResolution, resolve_api_key};
pub use store::{NewStore, Platform, Store, StorePatch};
