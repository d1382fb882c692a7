use std::collections::HashMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use storerec_catalog::Product;
use storerec_core::{CustomerId, ProductId, SessionId, StoreId};
use storerec_tracking::{Interaction, InteractionType};

use crate::result::EngineError;

/// Catalog facts an engine needs about a product.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProductFacts {
    pub id: ProductId,
    pub title: String,
    pub category: Option<String>,
    pub brand: Option<String>,
    pub price_cents: Option<u64>,
    pub is_active: bool,
    pub in_stock: bool,
}

impl From<&Product> for ProductFacts {
    fn from(p: &Product) -> Self {
        Self {
            id: p.id,
            title: p.title.clone(),
            category: p.category.clone(),
            brand: p.brand.clone(),
            price_cents: p.price_cents,
            is_active: p.is_active,
            in_stock: p.in_stock,
        }
    }
}

/// Behavioural facts an engine needs about an interaction.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InteractionFacts {
    pub customer_id: Option<CustomerId>,
    pub session_id: Option<SessionId>,
    pub product_id: Option<ProductId>,
    pub kind: InteractionType,
    pub category: Option<String>,
    pub at: DateTime<Utc>,
}

impl InteractionFacts {
    pub fn is_purchase(&self) -> bool {
        self.kind == InteractionType::Purchase
    }
}

impl From<&Interaction> for InteractionFacts {
    fn from(i: &Interaction) -> Self {
        Self {
            customer_id: i.customer_id,
            session_id: i.session_id,
            product_id: i.product_id,
            kind: i.interaction_type,
            category: i.product_category.clone(),
            at: i.created_at,
        }
    }
}

/// Immutable, store-scoped input for every engine.
#[derive(Debug, Clone)]
pub struct StoreSnapshot {
    pub store_id: StoreId,
    pub now: DateTime<Utc>,
    pub products: Vec<ProductFacts>,
    pub interactions: Vec<InteractionFacts>,
    index: HashMap<ProductId, usize>,
}

impl StoreSnapshot {
    pub fn new(
        store_id: StoreId,
        now: DateTime<Utc>,
        products: Vec<ProductFacts>,
        interactions: Vec<InteractionFacts>,
    ) -> Self {
        let index = products.iter().enumerate().map(|(i, p)| (p.id, i)).collect();
        Self {
            store_id,
            now,
            products,
            interactions,
            index,
        }
    }

    pub fn from_records(
        store_id: StoreId,
        now: DateTime<Utc>,
        products: &[Product],
        interactions: &[Interaction],
    ) -> Self {
        Self::new(
            store_id,
            now,
            products.iter().map(ProductFacts::from).collect(),
            interactions.iter().map(InteractionFacts::from).collect(),
        )
    }

    pub fn product(&self, id: &ProductId) -> Option<&ProductFacts> {
        self.index.get(id).map(|i| &self.products[*i])
    }

    /// Category of an interaction, falling back to the current catalog.
    pub fn category_of<'a>(&'a self, i: &'a InteractionFacts) -> Option<&'a str> {
        i.category
            .as_deref()
            .or_else(|| i.product_id.and_then(|p| self.product(&p)?.category.as_deref()))
    }

    pub fn interactions_since(&self, since: DateTime<Utc>) -> impl Iterator<Item = &InteractionFacts> {
        self.interactions.iter().filter(move |i| i.at >= since)
    }

    pub fn interactions_of(&self, customer: CustomerId) -> impl Iterator<Item = &InteractionFacts> {
        self.interactions
            .iter()
            .filter(move |i| i.customer_id == Some(customer))
    }

    /// Same snapshot without the interactions rejected by `keep`.
    pub fn retain_interactions(&self, keep: impl Fn(&InteractionFacts) -> bool) -> Self {
        Self {
            store_id: self.store_id,
            now: self.now,
            products: self.products.clone(),
            interactions: self.interactions.iter().filter(|i| keep(i)).cloned().collect(),
            index: self.index.clone(),
        }
    }
}

/// Read access to store data, implemented by infra.
pub trait SnapshotReader: Send + Sync + 'static {
    fn snapshot(&self, store_id: StoreId) -> Result<StoreSnapshot, EngineError>;
}
