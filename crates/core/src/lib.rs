//! `stockledger-core` — shared building blocks for the stock-tracking domain.
//!
//! This crate contains **pure** primitives (no infrastructure concerns): the
//! error taxonomy, strongly-typed identifiers, entity/version traits and the
//! injectable clock.

pub mod clock;
pub mod entity;
pub mod error;
pub mod id;
pub mod version;

pub use clock::{Clock, FixedClock, SystemClock};
pub use entity::Entity;
pub use error::{ErrorKind, InventoryError, InventoryResult};
pub use id::{CustomerId, ProductId, UserId, VariantId, WarehouseId};
pub use version::{ExpectedVersion, Versioned};
