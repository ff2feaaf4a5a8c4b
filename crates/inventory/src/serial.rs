//! Serialised units and their lifecycle.
//!
//! ```text
//! AVAILABLE --reserve--> RESERVED --release--> AVAILABLE
//! AVAILABLE | RESERVED --sell--> SOLD --return--> RETURNED --make_available--> AVAILABLE
//! any --damage--> DAMAGED --make_available(repaired)--> AVAILABLE
//! ```

use chrono::{DateTime, Duration, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use stockledger_core::{
    CustomerId, Entity, InventoryError, InventoryResult, Versioned, WarehouseId,
};

use crate::ids::{BatchId, InventoryItemId, SerialId};
use crate::reference::DocumentRef;

#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum SerialStatus {
    Available,
    Reserved,
    Sold,
    Returned,
    Damaged,
}

impl SerialStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            SerialStatus::Available => "AVAILABLE",
            SerialStatus::Reserved => "RESERVED",
            SerialStatus::Sold => "SOLD",
            SerialStatus::Returned => "RETURNED",
            SerialStatus::Damaged => "DAMAGED",
        }
    }
}

impl core::fmt::Display for SerialStatus {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewSerial {
    pub serial_number: String,
    pub item_id: InventoryItemId,
    pub warehouse_id: WarehouseId,
    pub batch_id: Option<BatchId>,
    /// Defaults to the creation time.
    pub received_date: Option<DateTime<Utc>>,
    pub warranty_expiry_date: Option<DateTime<Utc>>,
    pub cost_price: Decimal,
    pub selling_price: Decimal,
    pub notes: Option<String>,
}

impl NewSerial {
    pub fn new(
        serial_number: impl Into<String>,
        item_id: InventoryItemId,
        warehouse_id: WarehouseId,
    ) -> Self {
        Self {
            serial_number: serial_number.into(),
            item_id,
            warehouse_id,
            batch_id: None,
            received_date: None,
            warranty_expiry_date: None,
            cost_price: Decimal::ZERO,
            selling_price: Decimal::ZERO,
            notes: None,
        }
    }
}

/// Full replacement of a serial's descriptive fields. Status is not part of it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SerialUpdate {
    pub batch_id: Option<BatchId>,
    pub warranty_expiry_date: Option<DateTime<Utc>>,
    pub cost_price: Decimal,
    pub selling_price: Decimal,
    pub notes: Option<String>,
}

/// Who bought a unit and on which document.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SaleDetails {
    pub reference: DocumentRef,
    pub customer_id: Option<CustomerId>,
    pub customer_name: Option<String>,
}

impl SaleDetails {
    pub fn new(reference: DocumentRef) -> Self {
        Self {
            reference,
            customer_id: None,
            customer_name: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InventorySerial {
    pub id: SerialId,
    pub serial_number: String,
    pub item_id: InventoryItemId,
    pub warehouse_id: WarehouseId,
    pub batch_id: Option<BatchId>,
    status: SerialStatus,
    pub received_date: DateTime<Utc>,
    pub sold_date: Option<DateTime<Utc>>,
    pub warranty_expiry_date: Option<DateTime<Utc>>,
    pub returned_date: Option<DateTime<Utc>>,
    pub sold_reference: Option<DocumentRef>,
    pub return_reference: Option<DocumentRef>,
    pub customer_id: Option<CustomerId>,
    pub customer_name: Option<String>,
    pub cost_price: Decimal,
    pub selling_price: Decimal,
    pub notes: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    version: u64,
}

impl InventorySerial {
    pub fn create(new: NewSerial, now: DateTime<Utc>) -> InventoryResult<Self> {
        let serial_number = new.serial_number.trim().to_string();
        if serial_number.is_empty() {
            return Err(InventoryError::invalid_argument("serial number cannot be empty"));
        }
        Ok(Self {
            id: SerialId::new(),
            serial_number,
            item_id: new.item_id,
            warehouse_id: new.warehouse_id,
            batch_id: new.batch_id,
            status: SerialStatus::Available,
            received_date: new.received_date.unwrap_or(now),
            sold_date: None,
            warranty_expiry_date: new.warranty_expiry_date,
            returned_date: None,
            sold_reference: None,
            return_reference: None,
            customer_id: None,
            customer_name: None,
            cost_price: new.cost_price,
            selling_price: new.selling_price,
            notes: new.notes,
            created_at: now,
            updated_at: now,
            version: 0,
        })
    }

    pub fn status(&self) -> SerialStatus {
        self.status
    }

    pub fn is_available(&self) -> bool {
        self.status == SerialStatus::Available
    }

    pub fn reserve(&mut self, now: DateTime<Utc>) -> InventoryResult<()> {
        self.require(&[SerialStatus::Available], "reserve")?;
        self.transition(SerialStatus::Reserved, now);
        Ok(())
    }

    pub fn release_reservation(&mut self, now: DateTime<Utc>) -> InventoryResult<()> {
        self.require(&[SerialStatus::Reserved], "release reservation for")?;
        self.transition(SerialStatus::Available, now);
        Ok(())
    }

    pub fn mark_as_sold(&mut self, sale: &SaleDetails, now: DateTime<Utc>) -> InventoryResult<()> {
        self.require(&[SerialStatus::Available, SerialStatus::Reserved], "sell")?;
        self.sold_date = Some(now);
        self.sold_reference = Some(sale.reference.clone());
        self.customer_id = sale.customer_id;
        self.customer_name = sale.customer_name.clone();
        self.transition(SerialStatus::Sold, now);
        Ok(())
    }

    pub fn mark_as_returned(
        &mut self,
        reference: DocumentRef,
        notes: Option<String>,
        now: DateTime<Utc>,
    ) -> InventoryResult<()> {
        self.require(&[SerialStatus::Sold], "return")?;
        self.returned_date = Some(now);
        self.return_reference = Some(reference);
        self.notes = notes;
        self.transition(SerialStatus::Returned, now);
        Ok(())
    }

    /// Always allowed.
    pub fn mark_as_damaged(&mut self, notes: Option<String>, now: DateTime<Utc>) {
        self.notes = notes;
        self.transition(SerialStatus::Damaged, now);
    }

    /// Put the unit back on the shelf.
    ///
    /// Sold units must go through a return first; damaged units need
    /// `repaired` to be acknowledged.
    pub fn make_available(&mut self, repaired: bool, now: DateTime<Utc>) -> InventoryResult<()> {
        match self.status {
            SerialStatus::Sold => Err(InventoryError::invalid_state(format!(
                "cannot make sold serial {} available; return it first",
                self.serial_number
            ))),
            SerialStatus::Damaged if !repaired => Err(InventoryError::invalid_state(format!(
                "serial {} is damaged and has not been marked repaired",
                self.serial_number
            ))),
            _ => {
                self.transition(SerialStatus::Available, now);
                Ok(())
            }
        }
    }

    pub fn move_to_warehouse(&mut self, warehouse_id: WarehouseId, now: DateTime<Utc>) {
        self.warehouse_id = warehouse_id;
        self.updated_at = now;
    }

    pub fn apply_update(&mut self, update: SerialUpdate, now: DateTime<Utc>) {
        self.batch_id = update.batch_id;
        self.warranty_expiry_date = update.warranty_expiry_date;
        self.cost_price = update.cost_price;
        self.selling_price = update.selling_price;
        self.notes = update.notes;
        self.updated_at = now;
    }

    /// Only units that never left the shelf may be deleted.
    pub fn ensure_deletable(&self) -> InventoryResult<()> {
        self.require(&[SerialStatus::Available], "delete")
    }

    pub fn has_warranty_expired(&self, now: DateTime<Utc>) -> bool {
        self.warranty_expiry_date.is_some_and(|expiry| now > expiry)
    }

    pub fn is_warranty_expiring_soon(&self, now: DateTime<Utc>, days: u32) -> bool {
        let threshold = now + Duration::days(i64::from(days));
        self.warranty_expiry_date
            .is_some_and(|expiry| expiry < threshold && !self.has_warranty_expired(now))
    }

    fn require(&self, allowed: &[SerialStatus], action: &str) -> InventoryResult<()> {
        if allowed.contains(&self.status) {
            return Ok(());
        }
        Err(InventoryError::invalid_state(format!(
            "cannot {action} serial {}: status is {}",
            self.serial_number, self.status
        )))
    }

    fn transition(&mut self, to: SerialStatus, now: DateTime<Utc>) {
        self.status = to;
        self.updated_at = now;
    }
}

impl Entity for InventorySerial {
    type Id = SerialId;

    fn id(&self) -> Self::Id {
        self.id
    }

    fn entity_name() -> &'static str {
        "inventory serial"
    }
}

impl Versioned for InventorySerial {
    fn version(&self) -> u64 {
        self.version
    }

    fn set_version(&mut self, version: u64) {
        self.version = version;
    }
}
