//! Domain error model.

use thiserror::Error;

/// Result type used across the domain and store layers.
pub type DomainResult<T> = Result<T, DomainError>;

/// Inventory error.
///
/// The first five variants are deterministic business failures and are safe to
/// show to callers. `Storage` wraps infrastructure failures; its detail is for logs.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum DomainError {
    /// Malformed or contradictory input (non-positive quantity, max <= min, ...).
    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    /// An identifier was invalid (e.g. parse failure).
    #[error("invalid identifier: {0}")]
    InvalidId(String),

    /// A referenced branch, stock row, movement or batch does not exist.
    #[error("not found: {0}")]
    NotFound(String),

    /// A unique constraint would be violated (e.g. branch code).
    #[error("duplicate resource: {0}")]
    DuplicateResource(String),

    /// EXIT/TRANSFER asked for more units than are on hand.
    #[error("insufficient stock: {0}")]
    InsufficientStock(String),

    /// The backing store failed.
    #[error("storage failure: {0}")]
    Storage(String),
}

impl DomainError {
    pub fn invalid_argument(msg: impl Into<String>) -> Self {
        Self::InvalidArgument(msg.into())
    }

    pub fn invalid_id(msg: impl Into<String>) -> Self {
        Self::InvalidId(msg.into())
    }

    pub fn not_found(msg: impl Into<String>) -> Self {
        Self::NotFound(msg.into())
    }

    pub fn duplicate(msg: impl Into<String>) -> Self {
        Self::DuplicateResource(msg.into())
    }

    pub fn insufficient_stock(msg: impl Into<String>) -> Self {
        Self::InsufficientStock(msg.into())
    }

    pub fn storage(msg: impl Into<String>) -> Self {
        Self::Storage(msg.into())
    }

    /// True for failures caused by the caller's input or the current domain state.
    pub fn is_client_error(&self) -> bool {
        !matches!(self, Self::Storage(_))
    }
}
