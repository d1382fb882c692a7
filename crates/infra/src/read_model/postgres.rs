//! Postgres-backed scoped store.
//!
//! Records are kept as JSONB documents in a single `documents` table keyed by
//! (collection, store_id, key). Every query carries the store id, so one
//! store's documents are never visible to another.
//!
//! The `ScopedStore` trait is synchronous; calls bridge onto the runtime the
//! store was created on. Use it from a multi-threaded runtime or from plain
//! worker threads.

use std::fmt::Display;
use std::future::Future;
use std::marker::PhantomData;

use serde::Serialize;
use serde::de::DeserializeOwned;
use sqlx::{PgPool, Row};
use tokio::runtime::Handle;

use storerec_core::StoreId;

use super::{ScopedStore, StoreError};

/// Schema applied by [`ensure_schema`].
pub const SCHEMA: &str = include_str!("../../migrations/0001_documents.sql");

/// A record type stored as a document.
pub trait Document: Serialize + DeserializeOwned + Clone + Send + Sync + 'static {
    const COLLECTION: &'static str;
}

pub struct PostgresScopedStore<K, V> {
    pool: PgPool,
    handle: Handle,
    _marker: PhantomData<fn(K) -> V>,
}

impl<K, V> PostgresScopedStore<K, V> {
    /// Must be called inside a Tokio runtime; the store keeps its handle.
    pub fn new(pool: PgPool) -> Result<Self, StoreError> {
        let handle = Handle::try_current().map_err(|e| StoreError::Unavailable(e.to_string()))?;
        Ok(Self {
            pool,
            handle,
            _marker: PhantomData,
        })
    }

    fn block_on<F: Future>(&self, fut: F) -> F::Output {
        tokio::task::block_in_place(|| self.handle.block_on(fut))
    }
}

/// Create the documents table if missing.
pub async fn ensure_schema(pool: &PgPool) -> Result<(), StoreError> {
    sqlx::raw_sql(SCHEMA)
        .execute(pool)
        .await
        .map_err(|e| StoreError::Query(e.to_string()))?;
    Ok(())
}

fn decode<V: DeserializeOwned>(row: &sqlx::postgres::PgRow) -> Result<V, StoreError> {
    let body: serde_json::Value = row.try_get("body").map_err(|e| StoreError::Decode(e.to_string()))?;
    serde_json::from_value(body).map_err(|e| StoreError::Decode(e.to_string()))
}

impl<K, V> ScopedStore<K, V> for PostgresScopedStore<K, V>
where
    K: Display + Send + Sync,
    V: Document,
{
    fn get(&self, store_id: StoreId, key: &K) -> Result<Option<V>, StoreError> {
        let row = self.block_on(
            sqlx::query("SELECT body FROM documents WHERE collection = $1 AND store_id = $2 AND doc_key = $3")
                .bind(V::COLLECTION)
                .bind(store_id.as_uuid())
                .bind(key.to_string())
                .fetch_optional(&self.pool),
        )
        .map_err(|e| StoreError::Query(e.to_string()))?;
        row.as_ref().map(decode).transpose()
    }

    fn upsert(&self, store_id: StoreId, key: K, value: V) -> Result<(), StoreError> {
        let body = serde_json::to_value(&value).map_err(|e| StoreError::Decode(e.to_string()))?;
        self.block_on(
            sqlx::query(
                r#"
                INSERT INTO documents (collection, store_id, doc_key, body)
                VALUES ($1, $2, $3, $4)
                ON CONFLICT (collection, store_id, doc_key)
                DO UPDATE SET body = EXCLUDED.body, updated_at = NOW()
                "#,
            )
            .bind(V::COLLECTION)
            .bind(store_id.as_uuid())
            .bind(key.to_string())
            .bind(body)
            .execute(&self.pool),
        )
        .map_err(|e| StoreError::Query(e.to_string()))?;
        Ok(())
    }

    fn remove(&self, store_id: StoreId, key: &K) -> Result<bool, StoreError> {
        let done = self
            .block_on(
                sqlx::query("DELETE FROM documents WHERE collection = $1 AND store_id = $2 AND doc_key = $3")
                    .bind(V::COLLECTION)
                    .bind(store_id.as_uuid())
                    .bind(key.to_string())
                    .execute(&self.pool),
            )
            .map_err(|e| StoreError::Query(e.to_string()))?;
        Ok(done.rows_affected() > 0)
    }

    fn list(&self, store_id: StoreId) -> Result<Vec<V>, StoreError> {
        let rows = self
            .block_on(
                sqlx::query("SELECT body FROM documents WHERE collection = $1 AND store_id = $2")
                    .bind(V::COLLECTION)
                    .bind(store_id.as_uuid())
                    .fetch_all(&self.pool),
            )
            .map_err(|e| StoreError::Query(e.to_string()))?;
        rows.iter().map(decode).collect()
    }

    fn clear_store(&self, store_id: StoreId) -> Result<(), StoreError> {
        self.block_on(
            sqlx::query("DELETE FROM documents WHERE collection = $1 AND store_id = $2")
                .bind(V::COLLECTION)
                .bind(store_id.as_uuid())
                .execute(&self.pool),
        )
        .map_err(|e| StoreError::Query(e.to_string()))?;
        Ok(())
    }

    fn find_by(&self, store_id: StoreId, field: &str, value: &str) -> Result<Vec<V>, StoreError> {
        let rows = self
            .block_on(
                sqlx::query(
                    "SELECT body FROM documents \
                     WHERE collection = $1 AND store_id = $2 AND body @> jsonb_build_object($3::text, $4::text)",
                )
                .bind(V::COLLECTION)
                .bind(store_id.as_uuid())
                .bind(field)
                .bind(value)
                .fetch_all(&self.pool),
            )
            .map_err(|e| StoreError::Query(e.to_string()))?;
        rows.iter().map(decode).collect()
    }

    fn find_all_by(&self, field: &str, value: &str) -> Result<Vec<V>, StoreError> {
        let rows = self
            .block_on(
                sqlx::query(
                    "SELECT body FROM documents \
                     WHERE collection = $1 AND body @> jsonb_build_object($2::text, $3::text)",
                )
                .bind(V::COLLECTION)
                .bind(field)
                .bind(value)
                .fetch_all(&self.pool),
            )
            .map_err(|e| StoreError::Query(e.to_string()))?;
        rows.iter().map(decode).collect()
    }

    fn scan_all(&self) -> Result<Vec<V>, StoreError> {
        let rows = self
            .block_on(
                sqlx::query("SELECT body FROM documents WHERE collection = $1")
                    .bind(V::COLLECTION)
                    .fetch_all(&self.pool),
            )
            .map_err(|e| StoreError::Query(e.to_string()))?;
        rows.iter().map(decode).collect()
    }
}
