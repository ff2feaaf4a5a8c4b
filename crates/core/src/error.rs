//! Error model shared by every inventory operation.

use rust_decimal::Decimal;
use thiserror::Error;

/// Result type used across the inventory core.
pub type InventoryResult<T> = Result<T, InventoryError>;

/// Inventory-level error.
///
/// All failures are synchronous and returned from the call that caused them.
/// A failure inside a unit of work aborts the whole unit; nothing it touched is
/// committed.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum InventoryError {
    /// An item, warehouse, batch, serial, transaction or ledger row is absent.
    #[error("{entity} not found: {id}")]
    NotFound { entity: &'static str, id: String },

    /// The requested quantity exceeds what stock (or policy) allows.
    #[error("insufficient stock for {subject}: requested {requested}, available {available}")]
    InsufficientStock {
        subject: String,
        requested: Decimal,
        available: Decimal,
    },

    /// A natural key (SKU, batch number, serial number, transaction number) collided.
    #[error("duplicate {entity}: {key}")]
    DuplicateKey { entity: &'static str, key: String },

    /// The operation is not legal in the entity's current state.
    #[error("invalid state: {0}")]
    InvalidState(String),

    /// The request itself is malformed.
    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    /// Optimistic concurrency check failed (stale version).
    #[error("conflict: {0}")]
    Conflict(String),

    /// The persistence backend failed.
    #[error("storage failure: {0}")]
    Storage(String),
}

/// Copyable discriminant of [`InventoryError`], for callers that map errors to
/// responses without inspecting messages.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    NotFound,
    InsufficientStock,
    DuplicateKey,
    InvalidState,
    InvalidArgument,
    Conflict,
    Storage,
}

impl InventoryError {
    pub fn not_found(entity: &'static str, id: impl ToString) -> Self {
        Self::NotFound {
            entity,
            id: id.to_string(),
        }
    }

    pub fn insufficient(subject: impl Into<String>, requested: Decimal, available: Decimal) -> Self {
        Self::InsufficientStock {
            subject: subject.into(),
            requested,
            available,
        }
    }

    pub fn duplicate(entity: &'static str, key: impl ToString) -> Self {
        Self::DuplicateKey {
            entity,
            key: key.to_string(),
        }
    }

    pub fn invalid_state(msg: impl Into<String>) -> Self {
        Self::InvalidState(msg.into())
    }

    pub fn invalid_argument(msg: impl Into<String>) -> Self {
        Self::InvalidArgument(msg.into())
    }

    pub fn conflict(msg: impl Into<String>) -> Self {
        Self::Conflict(msg.into())
    }

    pub fn storage(msg: impl Into<String>) -> Self {
        Self::Storage(msg.into())
    }

    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::NotFound { .. } => ErrorKind::NotFound,
            Self::InsufficientStock { .. } => ErrorKind::InsufficientStock,
            Self::DuplicateKey { .. } => ErrorKind::DuplicateKey,
            Self::InvalidState(_) => ErrorKind::InvalidState,
            Self::InvalidArgument(_) => ErrorKind::InvalidArgument,
            Self::Conflict(_) => ErrorKind::Conflict,
            Self::Storage(_) => ErrorKind::Storage,
        }
    }

    /// Whether retrying the whole unit of work may succeed.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Conflict(_))
    }
}
