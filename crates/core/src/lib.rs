//! `storerec-core`: ids, the domain error and money helpers shared by every
//! other crate. No I/O lives here.

pub mod entity;
pub mod error;
pub mod id;
pub mod measure;

pub use entity::Entity;
pub use error::{DomainError, DomainResult};
pub use id::{CustomerId, InteractionId, ProductId, RecommendationId, RecordId, SessionId, StoreId};
pub use measure::{cents_to_units, percent, units_to_cents};
