//! Listing filters for products.

use serde::Deserialize;

use crate::Product;

/// Query-string filters accepted by the product listing.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ProductFilter {
    pub search: Option<String>,
    pub category: Option<String>,
    pub brand: Option<String>,
    pub min_price: Option<u64>,
    pub max_price: Option<u64>,
    pub is_active: Option<bool>,
    pub in_stock: Option<bool>,
    pub is_published: Option<bool>,
}

impl ProductFilter {
    pub fn matches(&self, product: &Product) -> bool {
        if let Some(search) = self.search.as_deref().map(str::trim).filter(|s| !s.is_empty()) {
            if !product.matches_text(&search.to_lowercase()) {
                return false;
            }
        }
        if let Some(category) = &self.category {
            if !eq_ignore_case(product.category.as_deref(), category) {
                return false;
            }
        }
        if let Some(brand) = &self.brand {
            if !eq_ignore_case(product.brand.as_deref(), brand) {
                return false;
            }
        }
        if let Some(min) = self.min_price {
            if product.price_cents.is_none_or(|p| p < min) {
                return false;
            }
        }
        if let Some(max) = self.max_price {
            if product.price_cents.is_none_or(|p| p > max) {
                return false;
            }
        }
        if self.is_active.is_some_and(|v| v != product.is_active)
            || self.in_stock.is_some_and(|v| v != product.in_stock)
            || self.is_published.is_some_and(|v| v != product.is_published)
        {
            return false;
        }
        true
    }

    /// Filter and order newest first.
    pub fn apply(&self, products: Vec<Product>) -> Vec<Product> {
        let mut out: Vec<Product> = products.into_iter().filter(|p| self.matches(p)).collect();
        out.sort_by(|a, b| b.created_at.cmp(&a.created_at).then(b.id.cmp(&a.id)));
        out
    }
}

fn eq_ignore_case(value: Option<&str>, expected: &str) -> bool {
    value.is_some_and(|v| v.eq_ignore_ascii_case(expected))
}
