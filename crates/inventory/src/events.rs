//! Facts published after a stock unit of work commits.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use stockledger_core::WarehouseId;
use stockledger_events::Event;

use crate::ids::{BatchId, InventoryItemId, TransactionId};
use crate::transaction::TransactionType;

/// Event: an item row's current stock changed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StockUpdated {
    pub item_id: InventoryItemId,
    pub warehouse_id: WarehouseId,
    pub sku: String,
    pub transaction_id: TransactionId,
    pub transaction_type: TransactionType,
    pub previous_stock: Decimal,
    pub new_stock: Decimal,
    pub change: Decimal,
    pub reason: String,
    pub occurred_at: DateTime<Utc>,
}

/// Event: stock fell to or below the reorder level.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LowStock {
    pub item_id: InventoryItemId,
    pub warehouse_id: WarehouseId,
    pub sku: String,
    pub current_stock: Decimal,
    pub reorder_level: Decimal,
    pub occurred_at: DateTime<Utc>,
}

/// Event: stock reached zero (or below, when negative stock is allowed).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OutOfStock {
    pub item_id: InventoryItemId,
    pub warehouse_id: WarehouseId,
    pub sku: String,
    pub current_stock: Decimal,
    pub occurred_at: DateTime<Utc>,
}

/// Event: a batch will expire within the alert window.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BatchExpiring {
    pub batch_id: BatchId,
    pub batch_number: String,
    pub item_id: InventoryItemId,
    pub warehouse_id: WarehouseId,
    pub expiry_date: DateTime<Utc>,
    pub available_quantity: Decimal,
    pub occurred_at: DateTime<Utc>,
}

/// Event: a batch was flagged expired by the sweep.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BatchExpired {
    pub batch_id: BatchId,
    pub batch_number: String,
    pub item_id: InventoryItemId,
    pub warehouse_id: WarehouseId,
    pub remaining_quantity: Decimal,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum InventoryEvent {
    StockUpdated(StockUpdated),
    LowStock(LowStock),
    OutOfStock(OutOfStock),
    BatchExpiring(BatchExpiring),
    BatchExpired(BatchExpired),
}

impl Event for InventoryEvent {
    fn event_type(&self) -> &'static str {
        match self {
            InventoryEvent::StockUpdated(_) => "inventory.stock.updated",
            InventoryEvent::LowStock(_) => "inventory.stock.low",
            InventoryEvent::OutOfStock(_) => "inventory.stock.out",
            InventoryEvent::BatchExpiring(_) => "inventory.batch.expiring",
            InventoryEvent::BatchExpired(_) => "inventory.batch.expired",
        }
    }

    fn version(&self) -> u32 {
        1
    }

    fn occurred_at(&self) -> DateTime<Utc> {
        match self {
            InventoryEvent::StockUpdated(e) => e.occurred_at,
            InventoryEvent::LowStock(e) => e.occurred_at,
            InventoryEvent::OutOfStock(e) => e.occurred_at,
            InventoryEvent::BatchExpiring(e) => e.occurred_at,
            InventoryEvent::BatchExpired(e) => e.occurred_at,
        }
    }
}
