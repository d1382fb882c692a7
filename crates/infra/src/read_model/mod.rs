//! Store-partitioned record storage.

pub mod postgres;
pub mod scoped;

pub use postgres::{Document, PostgresScopedStore, ensure_schema};
pub use scoped::{InMemoryScopedStore, ScopedStore, StoreError};
