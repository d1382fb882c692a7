//! Product catalog: CRUD, bulk sync, cached facets and search.

use std::collections::HashSet;
use std::time::Duration;

use serde::Serialize;
use tracing::info;

use storerec_catalog::{CatalogStats, NewProduct, Product, ProductFilter, ProductPatch};
use storerec_core::{DomainError, ProductId, StoreId};

use super::{AppServices, RecordRepo, ServiceResult};
use crate::cache::{self, keys};

const FACET_TTL: Duration = Duration::from_secs(3600);
const STATS_TTL: Duration = Duration::from_secs(300);

/// Result of a bulk catalog sync.
#[derive(Debug, Clone, Serialize)]
pub struct BulkProducts {
    pub products_created: usize,
    pub products: Vec<Product>,
}

impl AppServices {
    pub fn list_products(&self, store_id: StoreId, filter: &ProductFilter) -> ServiceResult<Vec<Product>> {
        Ok(filter.apply(self.repos.products.list(store_id)?))
    }

    pub fn get_product(&self, store_id: StoreId, id: ProductId) -> ServiceResult<Product> {
        self.repos.products.require(store_id, &id, "product")
    }

    /// Look up a product by the store's own product id.
    pub fn find_product(&self, store_id: StoreId, store_product_id: &str) -> ServiceResult<Option<Product>> {
        Ok(self
            .repos
            .products
            .find_by(store_id, "store_product_id", store_product_id)?
            .into_iter()
            .next())
    }

    pub fn create_product(&self, store_id: StoreId, input: NewProduct) -> ServiceResult<Product> {
        let product = Product::create(store_id, input, self.now())?;
        let _guard = self.guards.store(store_id);
        if self.find_product(store_id, &product.store_product_id)?.is_some() {
            return Err(DomainError::conflict(format!(
                "product '{}' already exists",
                product.store_product_id
            ))
            .into());
        }
        self.repos.products.save(store_id, &product)?;
        self.catalog_changed(store_id);
        Ok(product)
    }

    /// Create every product or none.
    pub fn bulk_create_products(&self, store_id: StoreId, inputs: Vec<NewProduct>) -> ServiceResult<BulkProducts> {
        let now = self.now();
        let _guard = self.guards.store(store_id);
        let mut seen: HashSet<String> = self
            .repos
            .products
            .list(store_id)?
            .into_iter()
            .map(|p| p.store_product_id)
            .collect();

        let mut products = Vec::with_capacity(inputs.len());
        for (index, input) in inputs.into_iter().enumerate() {
            let product = Product::create(store_id, input, now)
                .map_err(|e| DomainError::validation(format!("item {index}: {e}")))?;
            if !seen.insert(product.store_product_id.clone()) {
                return Err(DomainError::validation(format!(
                    "item {index}: duplicate store_product_id '{}'",
                    product.store_product_id
                ))
                .into());
            }
            products.push(product);
        }

        for product in &products {
            self.repos.products.save(store_id, product)?;
        }
        self.catalog_changed(store_id);
        info!(store = %store_id, count = products.len(), "bulk products created");
        Ok(BulkProducts {
            products_created: products.len(),
            products,
        })
    }

    pub fn update_product(&self, store_id: StoreId, id: ProductId, patch: ProductPatch) -> ServiceResult<Product> {
        let mut product = self.get_product(store_id, id)?;
        product.apply_patch(patch, self.now())?;
        self.repos.products.save(store_id, &product)?;
        self.catalog_changed(store_id);
        Ok(product)
    }

    pub fn delete_product(&self, store_id: StoreId, id: ProductId) -> ServiceResult<()> {
        if !self.repos.products.remove(store_id, &id)? {
            return Err(DomainError::not_found("product").into());
        }
        self.catalog_changed(store_id);
        Ok(())
    }

    pub fn product_categories(&self, store_id: StoreId) -> ServiceResult<Vec<String>> {
        let key = keys::categories(store_id);
        if let Some(hit) = cache::get_json(self.cache.as_ref(), &key) {
            return Ok(hit);
        }
        let categories = storerec_catalog::categories(&self.repos.products.list(store_id)?);
        cache::set_json(self.cache.as_ref(), &key, &categories, FACET_TTL);
        Ok(categories)
    }

    pub fn product_brands(&self, store_id: StoreId) -> ServiceResult<Vec<String>> {
        let key = keys::brands(store_id);
        if let Some(hit) = cache::get_json(self.cache.as_ref(), &key) {
            return Ok(hit);
        }
        let brands = storerec_catalog::brands(&self.repos.products.list(store_id)?);
        cache::set_json(self.cache.as_ref(), &key, &brands, FACET_TTL);
        Ok(brands)
    }

    pub fn catalog_stats(&self, store_id: StoreId) -> ServiceResult<CatalogStats> {
        let key = keys::catalog_stats(store_id);
        if let Some(hit) = cache::get_json(self.cache.as_ref(), &key) {
            return Ok(hit);
        }
        let stats = storerec_catalog::catalog_stats(&self.repos.products.list(store_id)?);
        cache::set_json(self.cache.as_ref(), &key, &stats, STATS_TTL);
        Ok(stats)
    }

    pub fn search_products(&self, store_id: StoreId, query: &str) -> ServiceResult<Vec<Product>> {
        let products = self.repos.products.list(store_id)?;
        Ok(storerec_catalog::search(&products, query).into_iter().cloned().collect())
    }

    fn catalog_changed(&self, store_id: StoreId) {
        cache::invalidate(self.cache.as_ref(), &keys::catalog_prefix(store_id));
        if let Ok(mut store) = self.get_store(store_id) {
            store.mark_synced(self.now());
            let _ = self.repos.stores.save(store_id, &store);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::services::ServiceError;
    use crate::services::test_support::{services, store};

    fn new_product(id: &str, category: &str, price_cents: u64) -> NewProduct {
        NewProduct {
            store_product_id: id.to_string(),
            title: format!("Product {id}"),
            category: Some(category.to_string()),
            price_cents: Some(price_cents),
            ..NewProduct::default()
        }
    }

    #[test]
    fn duplicate_store_product_ids_conflict() {
        let services = services();
        let store = store(&services);
        services.create_product(store.id, new_product("sku-1", "shoes", 1000)).unwrap();
        let err = services
            .create_product(store.id, new_product("sku-1", "shoes", 1000))
            .unwrap_err();
        assert!(matches!(err, ServiceError::Domain(DomainError::Conflict(_))));

        // Another store may reuse the id.
        let other = crate::services::test_support::store(&services);
        services.create_product(other.id, new_product("sku-1", "shoes", 1000)).unwrap();
    }

    #[test]
    fn bulk_create_is_all_or_nothing() {
        let services = services();
        let store = store(&services);
        let err = services
            .bulk_create_products(
                store.id,
                vec![new_product("a", "shoes", 100), new_product("a", "shoes", 200)],
            )
            .unwrap_err();
        assert!(matches!(err, ServiceError::Domain(DomainError::Validation(_))));
        assert!(services.list_products(store.id, &ProductFilter::default()).unwrap().is_empty());

        let created = services
            .bulk_create_products(store.id, vec![new_product("a", "shoes", 100), new_product("b", "hats", 200)])
            .unwrap();
        assert_eq!(created.products_created, 2);
    }

    #[test]
    fn cached_facets_are_invalidated_by_writes() {
        let services = services();
        let store = store(&services);
        services.create_product(store.id, new_product("a", "shoes", 100)).unwrap();
        assert_eq!(services.product_categories(store.id).unwrap(), vec!["shoes".to_string()]);
        assert_eq!(services.catalog_stats(store.id).unwrap().total_products, 1);

        let hat = services.create_product(store.id, new_product("b", "hats", 100)).unwrap();
        assert_eq!(services.product_categories(store.id).unwrap(), vec!["hats", "shoes"]);
        assert_eq!(services.catalog_stats(store.id).unwrap().total_products, 2);

        services.delete_product(store.id, hat.id).unwrap();
        assert_eq!(services.catalog_stats(store.id).unwrap().total_products, 1);
        assert!(services.get_store(store.id).unwrap().last_sync_at.is_some());
    }

    #[test]
    fn empty_search_returns_nothing() {
        let services = services();
        let store = store(&services);
        services.create_product(store.id, new_product("a", "shoes", 100)).unwrap();
        assert!(services.search_products(store.id, "  ").unwrap().is_empty());
        assert_eq!(services.search_products(store.id, "SHOES").unwrap().len(), 1);
    }

    #[test]
    fn concurrent_creates_of_one_sku_store_it_once() {
        let services = services();
        let store = store(&services);
        let barrier = std::sync::Barrier::new(6);
        std::thread::scope(|scope| {
            for _ in 0..6 {
                scope.spawn(|| {
                    barrier.wait();
                    let _ = services.create_product(store.id, new_product("sku-race", "shoes", 500));
                });
            }
        });
        let filter = ProductFilter::default();
        let stored = services.list_products(store.id, &filter).unwrap();
        assert_eq!(stored.iter().filter(|p| p.store_product_id == "sku-race").count(), 1);
    }
}
