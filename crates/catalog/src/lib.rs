//! `storerec-catalog`: the store's product catalog as seen by the recommender.
//!
//! Products are synced from the store's platform; the catalog never owns
//! inventory or pricing decisions, it only mirrors them for scoring and
//! filtering.

pub mod filter;
pub mod product;
pub mod stats;

pub use filter::ProductFilter;
pub use product::{NewProduct, Product, ProductImage, ProductPatch};
pub use stats::{CatalogStats, brands, catalog_stats, categories, search};
