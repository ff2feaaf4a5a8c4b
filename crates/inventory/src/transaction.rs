use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use stockledger_core::{Entity, UserId, WarehouseId};

use crate::allocation::BatchAllocation;
use crate::ids::{InventoryItemId, TransactionId};
use crate::reference::DocumentRef;

#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TransactionType {
    StockIn,
    StockOut,
    Transfer,
    Adjustment,
    Count,
}

impl TransactionType {
    pub fn as_str(&self) -> &'static str {
        match self {
            TransactionType::StockIn => "STOCK_IN",
            TransactionType::StockOut => "STOCK_OUT",
            TransactionType::Transfer => "TRANSFER",
            TransactionType::Adjustment => "ADJUSTMENT",
            TransactionType::Count => "COUNT",
        }
    }

    /// Adjustments and counts record a signed delta; everything else a positive quantity.
    pub fn is_signed(&self) -> bool {
        matches!(self, TransactionType::Adjustment | TransactionType::Count)
    }
}

impl core::fmt::Display for TransactionType {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(self.as_str())
    }
}

const NUMBER_PREFIX: &str = "TXN-";

/// `TXN-YYYYMMDD-NNNN`; the sequence widens past four digits rather than wrapping.
pub fn transaction_number(day: NaiveDate, sequence: u32) -> String {
    format!("{NUMBER_PREFIX}{}-{sequence:04}", day.format("%Y%m%d"))
}

/// Sequence part of a number issued for `day`, if it is one.
pub fn parse_sequence(number: &str, day: NaiveDate) -> Option<u32> {
    let prefix = format!("{NUMBER_PREFIX}{}-", day.format("%Y%m%d"));
    number.strip_prefix(&prefix)?.parse().ok()
}

/// Everything a service supplies when recording a movement.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewTransaction {
    pub transaction_type: TransactionType,
    pub reason: String,
    pub item_id: InventoryItemId,
    /// Warehouse whose stock this row changed.
    pub warehouse_id: WarehouseId,
    pub from_warehouse_id: Option<WarehouseId>,
    pub to_warehouse_id: Option<WarehouseId>,
    pub quantity: Decimal,
    pub balance_after: Decimal,
    pub unit_cost: Decimal,
    pub batch_allocations: Vec<BatchAllocation>,
    pub serial_numbers: Vec<String>,
    pub reference: Option<DocumentRef>,
    pub transaction_date: DateTime<Utc>,
    pub notes: Option<String>,
    pub performed_by: Option<UserId>,
}

impl NewTransaction {
    pub fn new(
        transaction_type: TransactionType,
        item_id: InventoryItemId,
        warehouse_id: WarehouseId,
        quantity: Decimal,
        balance_after: Decimal,
        transaction_date: DateTime<Utc>,
    ) -> Self {
        Self {
            transaction_type,
            reason: String::new(),
            item_id,
            warehouse_id,
            from_warehouse_id: None,
            to_warehouse_id: None,
            quantity,
            balance_after,
            unit_cost: Decimal::ZERO,
            batch_allocations: Vec::new(),
            serial_numbers: Vec::new(),
            reference: None,
            transaction_date,
            notes: None,
            performed_by: None,
        }
    }
}

/// Append-only audit record of one stock movement.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InventoryTransaction {
    pub id: TransactionId,
    pub transaction_number: String,
    pub transaction_type: TransactionType,
    pub reason: String,
    pub item_id: InventoryItemId,
    pub warehouse_id: WarehouseId,
    pub from_warehouse_id: Option<WarehouseId>,
    pub to_warehouse_id: Option<WarehouseId>,
    pub quantity: Decimal,
    pub balance_after: Decimal,
    pub unit_cost: Decimal,
    pub total_cost: Decimal,
    pub batch_allocations: Vec<BatchAllocation>,
    pub serial_numbers: Vec<String>,
    pub reference: Option<DocumentRef>,
    pub transaction_date: DateTime<Utc>,
    pub notes: Option<String>,
    pub performed_by: Option<UserId>,
    pub created_at: DateTime<Utc>,
}

impl InventoryTransaction {
    pub fn record(transaction_number: String, new: NewTransaction, now: DateTime<Utc>) -> Self {
        let total_cost = new.unit_cost * new.quantity.abs();
        Self {
            id: TransactionId::new(),
            transaction_number,
            transaction_type: new.transaction_type,
            reason: new.reason,
            item_id: new.item_id,
            warehouse_id: new.warehouse_id,
            from_warehouse_id: new.from_warehouse_id,
            to_warehouse_id: new.to_warehouse_id,
            quantity: new.quantity,
            balance_after: new.balance_after,
            unit_cost: new.unit_cost,
            total_cost,
            batch_allocations: new.batch_allocations,
            serial_numbers: new.serial_numbers,
            reference: new.reference,
            transaction_date: new.transaction_date,
            notes: new.notes,
            performed_by: new.performed_by,
            created_at: now,
        }
    }

    /// UTC calendar day the movement belongs to.
    pub fn day(&self) -> NaiveDate {
        self.transaction_date.date_naive()
    }

    pub fn is_transfer_into(&self, warehouse_id: WarehouseId) -> bool {
        self.transaction_type == TransactionType::Transfer
            && self.to_warehouse_id == Some(warehouse_id)
    }

    pub fn is_transfer_out_of(&self, warehouse_id: WarehouseId) -> bool {
        self.transaction_type == TransactionType::Transfer
            && self.from_warehouse_id == Some(warehouse_id)
    }
}

impl Entity for InventoryTransaction {
    type Id = TransactionId;

    fn id(&self) -> Self::Id {
        self.id
    }

    fn entity_name() -> &'static str {
        "inventory transaction"
    }
}
