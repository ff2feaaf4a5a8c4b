use chrono::{DateTime, Duration, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use stockledger_core::{Entity, InventoryError, InventoryResult, Versioned, WarehouseId};

use crate::ids::{BatchId, InventoryItemId};
use crate::item::ensure_positive;

/// Request to receive a new batch.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewBatch {
    pub item_id: InventoryItemId,
    pub warehouse_id: WarehouseId,
    pub batch_number: String,
    pub lot_number: Option<String>,
    pub quantity: Decimal,
    pub manufacturing_date: Option<DateTime<Utc>>,
    pub expiry_date: Option<DateTime<Utc>>,
    /// Defaults to the creation time.
    pub received_date: Option<DateTime<Utc>>,
    pub supplier_id: Option<String>,
    pub supplier_name: Option<String>,
    pub purchase_order_number: Option<String>,
    pub cost_per_unit: Decimal,
}

impl NewBatch {
    pub fn new(
        item_id: InventoryItemId,
        warehouse_id: WarehouseId,
        batch_number: impl Into<String>,
        quantity: Decimal,
    ) -> Self {
        Self {
            item_id,
            warehouse_id,
            batch_number: batch_number.into(),
            lot_number: None,
            quantity,
            manufacturing_date: None,
            expiry_date: None,
            received_date: None,
            supplier_id: None,
            supplier_name: None,
            purchase_order_number: None,
            cost_per_unit: Decimal::ZERO,
        }
    }
}

/// Full replacement of a batch's descriptive fields. Quantities are not part of it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BatchUpdate {
    pub lot_number: Option<String>,
    pub manufacturing_date: Option<DateTime<Utc>>,
    pub expiry_date: Option<DateTime<Utc>>,
    pub supplier_id: Option<String>,
    pub supplier_name: Option<String>,
    pub purchase_order_number: Option<String>,
    pub cost_per_unit: Decimal,
    pub is_active: bool,
}

/// A received lot of one item in one warehouse.
///
/// Invariant: `available + reserved <= total`. Quantity leaves only through
/// [`consume`](Self::consume); [`release_reserved`](Self::release_reserved)
/// moves it back from reserved to available.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InventoryBatch {
    pub id: BatchId,
    pub batch_number: String,
    pub lot_number: Option<String>,
    pub item_id: InventoryItemId,
    pub warehouse_id: WarehouseId,
    total_quantity: Decimal,
    available_quantity: Decimal,
    reserved_quantity: Decimal,
    pub manufacturing_date: Option<DateTime<Utc>>,
    pub expiry_date: Option<DateTime<Utc>>,
    pub received_date: DateTime<Utc>,
    pub supplier_id: Option<String>,
    pub supplier_name: Option<String>,
    pub purchase_order_number: Option<String>,
    pub cost_per_unit: Decimal,
    pub is_active: bool,
    pub is_expired: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    version: u64,
}

impl InventoryBatch {
    pub fn create(new: NewBatch, now: DateTime<Utc>) -> InventoryResult<Self> {
        if new.batch_number.trim().is_empty() {
            return Err(InventoryError::invalid_argument("batch number cannot be empty"));
        }
        ensure_positive("batch quantity", new.quantity)?;
        if new.cost_per_unit < Decimal::ZERO {
            return Err(InventoryError::invalid_argument("cost per unit cannot be negative"));
        }
        validate_dates(new.manufacturing_date, new.expiry_date)?;

        let mut batch = Self {
            id: BatchId::new(),
            batch_number: new.batch_number.trim().to_string(),
            lot_number: new.lot_number,
            item_id: new.item_id,
            warehouse_id: new.warehouse_id,
            total_quantity: new.quantity,
            available_quantity: new.quantity,
            reserved_quantity: Decimal::ZERO,
            manufacturing_date: new.manufacturing_date,
            expiry_date: new.expiry_date,
            received_date: new.received_date.unwrap_or(now),
            supplier_id: new.supplier_id,
            supplier_name: new.supplier_name,
            purchase_order_number: new.purchase_order_number,
            cost_per_unit: new.cost_per_unit,
            is_active: true,
            is_expired: false,
            created_at: now,
            updated_at: now,
            version: 0,
        };
        batch.is_expired = batch.has_expired(now);
        Ok(batch)
    }

    pub fn total_quantity(&self) -> Decimal {
        self.total_quantity
    }

    pub fn available_quantity(&self) -> Decimal {
        self.available_quantity
    }

    pub fn reserved_quantity(&self) -> Decimal {
        self.reserved_quantity
    }

    /// `total - available - reserved`.
    pub fn consumed_quantity(&self) -> Decimal {
        self.total_quantity - self.available_quantity - self.reserved_quantity
    }

    /// Pure date comparison: expired once `now` reaches the expiry date.
    pub fn has_expired(&self, now: DateTime<Utc>) -> bool {
        self.expiry_date.is_some_and(|expiry| now >= expiry)
    }

    pub fn is_expiring_soon(&self, now: DateTime<Utc>, days: u32) -> bool {
        let threshold = now + Duration::days(i64::from(days));
        self.expiry_date
            .is_some_and(|expiry| expiry < threshold && !self.has_expired(now))
    }

    /// Eligible as an allocation candidate.
    pub fn has_available_stock(&self) -> bool {
        self.is_active && !self.is_expired && self.available_quantity > Decimal::ZERO
    }

    /// Move `quantity` from available to reserved.
    pub fn reserve(&mut self, quantity: Decimal) -> InventoryResult<()> {
        ensure_positive("reserve quantity", quantity)?;
        if self.available_quantity < quantity {
            return Err(self.insufficient(quantity));
        }
        self.available_quantity -= quantity;
        self.reserved_quantity += quantity;
        Ok(())
    }

    /// Move up to `quantity` from reserved back to available; returns the amount moved.
    pub fn release_reserved(&mut self, quantity: Decimal) -> Decimal {
        let released = quantity.max(Decimal::ZERO).min(self.reserved_quantity);
        self.reserved_quantity -= released;
        self.available_quantity += released;
        released
    }

    /// Take `quantity` out of available stock for good.
    pub fn consume(&mut self, quantity: Decimal) -> InventoryResult<()> {
        ensure_positive("consume quantity", quantity)?;
        if self.available_quantity < quantity {
            return Err(self.insufficient(quantity));
        }
        self.available_quantity -= quantity;
        Ok(())
    }

    pub fn add_stock(&mut self, quantity: Decimal, now: DateTime<Utc>) -> InventoryResult<()> {
        ensure_positive("added quantity", quantity)?;
        self.total_quantity += quantity;
        self.available_quantity += quantity;
        self.updated_at = now;
        Ok(())
    }

    /// Flag the batch expired if its date has passed. Returns whether the flag changed.
    pub fn mark_expired(&mut self, now: DateTime<Utc>) -> bool {
        if self.is_expired || !self.has_expired(now) {
            return false;
        }
        self.is_expired = true;
        self.updated_at = now;
        true
    }

    pub fn apply_update(&mut self, update: BatchUpdate, now: DateTime<Utc>) -> InventoryResult<()> {
        if update.cost_per_unit < Decimal::ZERO {
            return Err(InventoryError::invalid_argument("cost per unit cannot be negative"));
        }
        validate_dates(update.manufacturing_date, update.expiry_date)?;

        self.lot_number = update.lot_number;
        self.manufacturing_date = update.manufacturing_date;
        self.expiry_date = update.expiry_date;
        self.supplier_id = update.supplier_id;
        self.supplier_name = update.supplier_name;
        self.purchase_order_number = update.purchase_order_number;
        self.cost_per_unit = update.cost_per_unit;
        self.is_active = update.is_active;
        self.is_expired = self.has_expired(now);
        self.updated_at = now;
        Ok(())
    }

    /// Soft delete. Only empty batches can go.
    pub fn deactivate(&mut self, now: DateTime<Utc>) -> InventoryResult<()> {
        if !self.available_quantity.is_zero() || !self.reserved_quantity.is_zero() {
            return Err(InventoryError::invalid_state(format!(
                "batch {} still holds stock (available: {}, reserved: {})",
                self.batch_number, self.available_quantity, self.reserved_quantity
            )));
        }
        self.is_active = false;
        self.updated_at = now;
        Ok(())
    }

    pub fn touch(&mut self, now: DateTime<Utc>) {
        self.updated_at = now;
    }

    fn insufficient(&self, requested: Decimal) -> InventoryError {
        InventoryError::insufficient(
            format!("batch {}", self.batch_number),
            requested,
            self.available_quantity,
        )
    }
}

fn validate_dates(
    manufacturing: Option<DateTime<Utc>>,
    expiry: Option<DateTime<Utc>>,
) -> InventoryResult<()> {
    if let (Some(made), Some(expires)) = (manufacturing, expiry) {
        if expires < made {
            return Err(InventoryError::invalid_argument(
                "expiry date cannot precede manufacturing date",
            ));
        }
    }
    Ok(())
}

impl Entity for InventoryBatch {
    type Id = BatchId;

    fn id(&self) -> Self::Id {
        self.id
    }

    fn entity_name() -> &'static str {
        "inventory batch"
    }
}

impl Versioned for InventoryBatch {
    fn version(&self) -> u64 {
        self.version
    }

    fn set_version(&mut self, version: u64) {
        self.version = version;
    }
}
