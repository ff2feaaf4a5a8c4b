use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use stockledger_core::{
    Entity, InventoryError, InventoryResult, ProductId, VariantId, Versioned, WarehouseId,
};

use crate::ids::InventoryItemId;

/// Which kinds of tracking an item opts into.
#[derive(Debug, Copy, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TrackingFlags {
    pub batch: bool,
    pub serial: bool,
    pub expiry: bool,
}

/// Request to create an item row in a warehouse.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewInventoryItem {
    pub sku: String,
    pub name: String,
    pub warehouse_id: WarehouseId,
    pub product_id: Option<ProductId>,
    pub variant_id: Option<VariantId>,
    pub opening_stock: Decimal,
    pub reorder_level: Decimal,
    pub max_stock_level: Decimal,
    pub cost_price: Decimal,
    pub selling_price: Decimal,
    pub tracking: TrackingFlags,
}

impl NewInventoryItem {
    /// Minimal request: everything else zero / untracked.
    pub fn new(sku: impl Into<String>, name: impl Into<String>, warehouse_id: WarehouseId) -> Self {
        Self {
            sku: sku.into(),
            name: name.into(),
            warehouse_id,
            product_id: None,
            variant_id: None,
            opening_stock: Decimal::ZERO,
            reorder_level: Decimal::ZERO,
            max_stock_level: Decimal::ZERO,
            cost_price: Decimal::ZERO,
            selling_price: Decimal::ZERO,
            tracking: TrackingFlags::default(),
        }
    }
}

/// Stock position of one item in one warehouse.
///
/// `current_stock` and `reserved_stock` are only changed through the methods
/// below; `available_stock` is always derived from them and never stored.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InventoryItem {
    pub id: InventoryItemId,
    pub sku: String,
    pub name: String,
    pub warehouse_id: WarehouseId,
    pub product_id: Option<ProductId>,
    pub variant_id: Option<VariantId>,
    current_stock: Decimal,
    reserved_stock: Decimal,
    pub reorder_level: Decimal,
    pub max_stock_level: Decimal,
    pub cost_price: Decimal,
    pub selling_price: Decimal,
    pub tracking: TrackingFlags,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    version: u64,
}

impl InventoryItem {
    pub fn create(new: NewInventoryItem, now: DateTime<Utc>) -> InventoryResult<Self> {
        if new.sku.trim().is_empty() {
            return Err(InventoryError::invalid_argument("sku cannot be empty"));
        }
        if new.name.trim().is_empty() {
            return Err(InventoryError::invalid_argument("name cannot be empty"));
        }
        for (field, value) in [
            ("opening_stock", new.opening_stock),
            ("reorder_level", new.reorder_level),
            ("max_stock_level", new.max_stock_level),
            ("cost_price", new.cost_price),
            ("selling_price", new.selling_price),
        ] {
            if value.is_sign_negative() && !value.is_zero() {
                return Err(InventoryError::invalid_argument(format!(
                    "{field} cannot be negative"
                )));
            }
        }

        Ok(Self {
            id: InventoryItemId::new(),
            sku: new.sku.trim().to_string(),
            name: new.name,
            warehouse_id: new.warehouse_id,
            product_id: new.product_id,
            variant_id: new.variant_id,
            current_stock: new.opening_stock,
            reserved_stock: Decimal::ZERO,
            reorder_level: new.reorder_level,
            max_stock_level: new.max_stock_level,
            cost_price: new.cost_price,
            selling_price: new.selling_price,
            tracking: new.tracking,
            is_active: true,
            created_at: now,
            updated_at: now,
            version: 0,
        })
    }

    pub fn current_stock(&self) -> Decimal {
        self.current_stock
    }

    pub fn reserved_stock(&self) -> Decimal {
        self.reserved_stock
    }

    /// `current - reserved`, floored at zero (negative stock never shows as available).
    pub fn available_stock(&self) -> Decimal {
        (self.current_stock - self.reserved_stock).max(Decimal::ZERO)
    }

    /// Earmark `quantity` units. Fails before mutating if not enough is available.
    pub fn reserve(&mut self, quantity: Decimal) -> InventoryResult<()> {
        ensure_positive("reserve quantity", quantity)?;
        let available = self.available_stock();
        if available < quantity {
            return Err(InventoryError::insufficient(&self.sku, quantity, available));
        }
        self.reserved_stock += quantity;
        Ok(())
    }

    /// Return reserved units to available.
    ///
    /// Releasing more than is reserved clamps to zero; the returned value is the
    /// excess that was ignored so callers can report it.
    pub fn release_reserved(&mut self, quantity: Decimal) -> InventoryResult<Decimal> {
        ensure_positive("release quantity", quantity)?;
        let released = quantity.min(self.reserved_stock);
        self.reserved_stock -= released;
        Ok(quantity - released)
    }

    /// Single assignment primitive for stock movements.
    pub fn update_stock_quantities(
        &mut self,
        new_current: Decimal,
        new_reserved: Decimal,
    ) -> InventoryResult<()> {
        if new_reserved.is_sign_negative() && !new_reserved.is_zero() {
            return Err(InventoryError::invalid_argument(
                "reserved stock cannot be negative",
            ));
        }
        self.current_stock = new_current;
        self.reserved_stock = new_reserved;
        Ok(())
    }

    pub fn set_current_stock(&mut self, new_current: Decimal) -> InventoryResult<()> {
        self.update_stock_quantities(new_current, self.reserved_stock)
    }

    pub fn deactivate(&mut self, now: DateTime<Utc>) {
        self.is_active = false;
        self.updated_at = now;
    }

    pub fn touch(&mut self, now: DateTime<Utc>) {
        self.updated_at = now;
    }

    pub fn is_low_stock(&self) -> bool {
        self.reorder_level > Decimal::ZERO && self.current_stock <= self.reorder_level
    }

    pub fn is_out_of_stock(&self) -> bool {
        self.current_stock <= Decimal::ZERO
    }

    pub fn is_over_stock(&self) -> bool {
        self.max_stock_level > Decimal::ZERO && self.current_stock > self.max_stock_level
    }

    /// Whether `other` is the same product/variant held in another warehouse.
    ///
    /// Rows without a product link have no counterparts.
    pub fn is_counterpart_of(&self, other: &InventoryItem) -> bool {
        self.product_id.is_some()
            && self.product_id == other.product_id
            && self.variant_id == other.variant_id
    }
}

impl Entity for InventoryItem {
    type Id = InventoryItemId;

    fn id(&self) -> Self::Id {
        self.id
    }

    fn entity_name() -> &'static str {
        "inventory item"
    }
}

impl Versioned for InventoryItem {
    fn version(&self) -> u64 {
        self.version
    }

    fn set_version(&mut self, version: u64) {
        self.version = version;
    }
}

pub(crate) fn ensure_positive(what: &str, quantity: Decimal) -> InventoryResult<()> {
    if quantity <= Decimal::ZERO {
        return Err(InventoryError::invalid_argument(format!(
            "{what} must be positive, got {quantity}"
        )));
    }
    Ok(())
}
