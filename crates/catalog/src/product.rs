use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use storerec_core::{DomainError, DomainResult, Entity, ProductId, StoreId};

/// Image attached to a product; displayed in `position` order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProductImage {
    pub url: String,
    #[serde(default)]
    pub alt_text: String,
    #[serde(default)]
    pub position: u32,
}

/// Input for creating (syncing) a product.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct NewProduct {
    pub store_product_id: String,
    #[serde(default)]
    pub variant_id: Option<String>,
    pub title: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub handle: Option<String>,
    #[serde(default)]
    pub category: Option<String>,
    #[serde(default)]
    pub brand: Option<String>,
    #[serde(default)]
    pub price_cents: Option<u64>,
    #[serde(default)]
    pub compare_at_price_cents: Option<u64>,
    #[serde(default)]
    pub image_url: Option<String>,
    #[serde(default)]
    pub product_url: Option<String>,
    #[serde(default)]
    pub tags: Vec<String>,
    #[serde(default)]
    pub options: Option<Value>,
    #[serde(default)]
    pub metadata: Option<Value>,
    #[serde(default)]
    pub images: Vec<ProductImage>,
    #[serde(default)]
    pub is_active: Option<bool>,
    #[serde(default)]
    pub in_stock: Option<bool>,
    #[serde(default)]
    pub is_published: Option<bool>,
}

/// Partial update. `None` leaves a field untouched.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ProductPatch {
    pub variant_id: Option<String>,
    pub title: Option<String>,
    pub description: Option<String>,
    pub handle: Option<String>,
    pub category: Option<String>,
    pub brand: Option<String>,
    pub price_cents: Option<u64>,
    pub compare_at_price_cents: Option<u64>,
    pub image_url: Option<String>,
    pub product_url: Option<String>,
    pub tags: Option<Vec<String>>,
    pub options: Option<Value>,
    pub metadata: Option<Value>,
    pub images: Option<Vec<ProductImage>>,
    pub is_active: Option<bool>,
    pub in_stock: Option<bool>,
    pub is_published: Option<bool>,
}

/// A catalog product.
///
/// # Invariants
/// - `store_product_id` and `title` are non-empty.
/// - `images` are kept sorted by `position`.
/// - (`store_id`, `store_product_id`) is unique; enforced by the service layer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Product {
    pub id: ProductId,
    pub store_id: StoreId,
    pub store_product_id: String,
    pub variant_id: Option<String>,
    pub title: String,
    pub description: String,
    pub handle: Option<String>,
    pub category: Option<String>,
    pub brand: Option<String>,
    pub price_cents: Option<u64>,
    pub compare_at_price_cents: Option<u64>,
    pub image_url: Option<String>,
    pub product_url: Option<String>,
    pub tags: Vec<String>,
    pub options: Value,
    pub metadata: Value,
    pub images: Vec<ProductImage>,
    pub is_active: bool,
    pub in_stock: bool,
    pub is_published: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Product {
    pub fn create(store_id: StoreId, input: NewProduct, now: DateTime<Utc>) -> DomainResult<Self> {
        let store_product_id = required(&input.store_product_id, "store_product_id")?;
        let title = required(&input.title, "title")?;

        let mut images = input.images;
        images.sort_by_key(|i| i.position);

        Ok(Self {
            id: ProductId::new(),
            store_id,
            store_product_id,
            variant_id: input.variant_id,
            title,
            description: input.description,
            handle: input.handle,
            category: non_blank(input.category),
            brand: non_blank(input.brand),
            price_cents: input.price_cents,
            compare_at_price_cents: input.compare_at_price_cents,
            image_url: input.image_url,
            product_url: input.product_url,
            tags: clean_tags(input.tags),
            options: input.options.unwrap_or_else(|| Value::Object(Default::default())),
            metadata: input.metadata.unwrap_or_else(|| Value::Object(Default::default())),
            images,
            is_active: input.is_active.unwrap_or(true),
            in_stock: input.in_stock.unwrap_or(true),
            is_published: input.is_published.unwrap_or(true),
            created_at: now,
            updated_at: now,
        })
    }

    pub fn apply_patch(&mut self, patch: ProductPatch, now: DateTime<Utc>) -> DomainResult<()> {
        if let Some(title) = patch.title {
            self.title = required(&title, "title")?;
        }
        if let Some(v) = patch.variant_id {
            self.variant_id = Some(v);
        }
        if let Some(v) = patch.description {
            self.description = v;
        }
        if let Some(v) = patch.handle {
            self.handle = Some(v);
        }
        if let Some(v) = patch.category {
            self.category = non_blank(Some(v));
        }
        if let Some(v) = patch.brand {
            self.brand = non_blank(Some(v));
        }
        if let Some(v) = patch.price_cents {
            self.price_cents = Some(v);
        }
        if let Some(v) = patch.compare_at_price_cents {
            self.compare_at_price_cents = Some(v);
        }
        if let Some(v) = patch.image_url {
            self.image_url = Some(v);
        }
        if let Some(v) = patch.product_url {
            self.product_url = Some(v);
        }
        if let Some(v) = patch.tags {
            self.tags = clean_tags(v);
        }
        if let Some(v) = patch.options {
            self.options = v;
        }
        if let Some(v) = patch.metadata {
            self.metadata = v;
        }
        if let Some(mut v) = patch.images {
            v.sort_by_key(|i| i.position);
            self.images = v;
        }
        if let Some(v) = patch.is_active {
            self.is_active = v;
        }
        if let Some(v) = patch.in_stock {
            self.in_stock = v;
        }
        if let Some(v) = patch.is_published {
            self.is_published = v;
        }
        self.updated_at = now;
        Ok(())
    }

    /// True when a compare-at price exists and the current price undercuts it.
    pub fn is_on_sale(&self) -> bool {
        matches!(
            (self.price_cents, self.compare_at_price_cents),
            (Some(price), Some(compare)) if price < compare
        )
    }

    /// Whole-percent discount relative to the compare-at price (floored).
    pub fn discount_percentage(&self) -> u32 {
        match (self.price_cents, self.compare_at_price_cents) {
            (Some(price), Some(compare)) if price < compare => {
                ((compare - price) * 100 / compare) as u32
            }
            _ => 0,
        }
    }

    /// Case-insensitive match over title, description, category and brand.
    pub fn matches_text(&self, needle_lower: &str) -> bool {
        let contains = |s: &str| s.to_lowercase().contains(needle_lower);
        contains(&self.title)
            || contains(&self.description)
            || self.category.as_deref().is_some_and(contains)
            || self.brand.as_deref().is_some_and(contains)
    }

    pub fn has_tag(&self, tag_lower: &str) -> bool {
        self.tags.iter().any(|t| t.to_lowercase() == tag_lower)
    }
}

impl Entity for Product {
    type Id = ProductId;

    fn id(&self) -> &Self::Id {
        &self.id
    }
}

fn required(value: &str, field: &str) -> DomainResult<String> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return Err(DomainError::validation(format!("{field} cannot be empty")));
    }
    Ok(trimmed.to_string())
}

fn non_blank(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

fn clean_tags(tags: Vec<String>) -> Vec<String> {
    let mut out: Vec<String> = Vec::with_capacity(tags.len());
    for tag in tags {
        let tag = tag.trim().to_string();
        if !tag.is_empty() && !out.contains(&tag) {
            out.push(tag);
        }
    }
    out
}
