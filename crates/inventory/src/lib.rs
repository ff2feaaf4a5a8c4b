//! Inventory domain.
//!
//! Stock bookkeeping rules for items, batches, serial units, transactions and
//! the daily ledger, implemented as deterministic domain logic (no IO, no
//! storage, no wall clock). Orchestration lives in `stockledger-infra`.

pub mod allocation;
pub mod arithmetic;
pub mod batch;
pub mod events;
pub mod ids;
pub mod item;
pub mod ledger;
pub mod reference;
pub mod serial;
pub mod strategy;
pub mod transaction;

pub use allocation::{AllocationMode, BatchAllocation, allocate, plan_allocation};
pub use batch::{BatchUpdate, InventoryBatch, NewBatch};
pub use events::{
    BatchExpired, BatchExpiring, InventoryEvent, LowStock, OutOfStock, StockUpdated,
};
pub use ids::{BatchId, InventoryItemId, LedgerId, SerialId, TransactionId};
pub use item::{InventoryItem, NewInventoryItem, TrackingFlags};
pub use ledger::InventoryLedger;
pub use reference::DocumentRef;
pub use serial::{InventorySerial, NewSerial, SaleDetails, SerialStatus, SerialUpdate};
pub use strategy::ConsumptionStrategy;
pub use transaction::{InventoryTransaction, NewTransaction, TransactionType};
