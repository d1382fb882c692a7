//! Errors raised by the domain crates.

use thiserror::Error;

pub type DomainResult<T> = Result<T, DomainError>;

/// A rule of the recommendation domain was broken.
///
/// Storage and transport failures have their own error types in the crates
/// that own them.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum DomainError {
    /// Bad caller input: a missing title, an unknown interaction type.
    #[error("validation failed: {0}")]
    Validation(String),

    /// The record is in a state that forbids the change.
    #[error("invariant violated: {0}")]
    InvariantViolation(String),

    #[error("invalid identifier: {0}")]
    InvalidId(String),

    /// Names the missing record kind, e.g. `product`.
    #[error("{0} not found")]
    NotFound(String),

    /// Duplicate store domain, product id or similar.
    #[error("conflict: {0}")]
    Conflict(String),
}

impl DomainError {
    pub fn validation(msg: impl Into<String>) -> Self {
        Self::Validation(msg.into())
    }

    pub fn invariant(msg: impl Into<String>) -> Self {
        Self::InvariantViolation(msg.into())
    }

    pub fn invalid_id(msg: impl Into<String>) -> Self {
        Self::InvalidId(msg.into())
    }

    pub fn not_found(what: impl Into<String>) -> Self {
        Self::NotFound(what.into())
    }

    pub fn conflict(msg: impl Into<String>) -> Self {
        Self::Conflict(msg.into())
    }
}
