//! Catalog-wide aggregates and shopper-facing search.

use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};

use crate::Product;

/// Maximum number of results returned by [`search`].
pub const SEARCH_LIMIT: usize = 50;

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CatalogStats {
    pub total_products: usize,
    pub active_products: usize,
    pub in_stock_products: usize,
    pub published_products: usize,
    pub categories_count: usize,
    pub brands_count: usize,
    pub on_sale_products: usize,
}

/// Distinct categories of active products, sorted.
pub fn categories(products: &[Product]) -> Vec<String> {
    distinct(products, |p| p.category.as_deref())
}

/// Distinct brands of active products, sorted.
pub fn brands(products: &[Product]) -> Vec<String> {
    distinct(products, |p| p.brand.as_deref())
}

fn distinct<'a>(products: &'a [Product], field: impl Fn(&'a Product) -> Option<&'a str>) -> Vec<String> {
    products
        .iter()
        .filter(|p| p.is_active)
        .filter_map(field)
        .filter(|v| !v.is_empty())
        .map(str::to_string)
        .collect::<BTreeSet<_>>()
        .into_iter()
        .collect()
}

pub fn catalog_stats(products: &[Product]) -> CatalogStats {
    CatalogStats {
        total_products: products.len(),
        active_products: products.iter().filter(|p| p.is_active).count(),
        in_stock_products: products.iter().filter(|p| p.in_stock).count(),
        published_products: products.iter().filter(|p| p.is_published).count(),
        categories_count: products
            .iter()
            .filter_map(|p| p.category.as_deref())
            .collect::<BTreeSet<_>>()
            .len(),
        brands_count: products
            .iter()
            .filter_map(|p| p.brand.as_deref())
            .collect::<BTreeSet<_>>()
            .len(),
        on_sale_products: products
            .iter()
            .filter(|p| p.compare_at_price_cents.is_some_and(|c| c > 0))
            .count(),
    }
}

/// Shopper search over active, published products.
///
/// Matches title, description, category, brand or an exact tag. An empty query
/// returns nothing.
pub fn search<'a>(products: &'a [Product], query: &str) -> Vec<&'a Product> {
    let q = query.trim().to_lowercase();
    if q.is_empty() {
        return Vec::new();
    }
    products
        .iter()
        .filter(|p| p.is_active && p.is_published)
        .filter(|p| p.matches_text(&q) || p.has_tag(&q))
        .take(SEARCH_LIMIT)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::NewProduct;
    use chrono::Utc;
    use storerec_core::StoreId;

    fn product(id: &str, category: Option<&str>, brand: Option<&str>) -> Product {
        Product::create(
            StoreId::new(),
            NewProduct {
                store_product_id: id.into(),
                title: format!("Item {id}"),
                category: category.map(Into::into),
                brand: brand.map(Into::into),
                tags: vec!["summer".into()],
                ..Default::default()
            },
            Utc::now(),
        )
        .unwrap()
    }

    #[test]
    fn categories_skip_inactive_and_dedupe() {
        let mut inactive = product("3", Some("Bags"), None);
        inactive.is_active = false;
        let products = vec![
            product("1", Some("Shoes"), Some("Peak")),
            product("2", Some("Shoes"), Some("Alp")),
            inactive,
        ];
        assert_eq!(categories(&products), vec!["Shoes".to_string()]);
        assert_eq!(brands(&products), vec!["Alp".to_string(), "Peak".to_string()]);
    }

    #[test]
    fn stats_count_each_dimension() {
        let mut p = product("1", Some("Shoes"), None);
        p.compare_at_price_cents = Some(100);
        p.in_stock = false;
        let stats = catalog_stats(&[p, product("2", Some("Hats"), Some("Peak"))]);
        assert_eq!(stats.total_products, 2);
        assert_eq!(stats.in_stock_products, 1);
        assert_eq!(stats.categories_count, 2);
        assert_eq!(stats.brands_count, 1);
        assert_eq!(stats.on_sale_products, 1);
    }

    #[test]
    fn search_requires_query_and_visibility() {
        let mut hidden = product("2", Some("Shoes"), None);
        hidden.is_published = false;
        let products = vec![product("1", Some("Shoes"), None), hidden];
        assert!(search(&products, "").is_empty());
        assert_eq!(search(&products, "shoes").len(), 1);
        assert_eq!(search(&products, "SUMMER").len(), 1);
    }
}
