//! Serial-number lifecycle: creation, allocation, and status transitions.

use std::collections::HashSet;

use chrono::{DateTime, Utc};
use tracing::instrument;

use stockledger_core::{CustomerId, Entity, InventoryError, InventoryResult, WarehouseId};
use stockledger_events::EventBus;
use stockledger_inventory::{
    BatchId, DocumentRef, InventoryEvent, InventoryItemId, InventorySerial, NewSerial,
    SaleDetails, SerialId, SerialStatus, SerialUpdate,
};

use crate::services::InventoryContext;
use crate::services::batches::load_batch;
use crate::services::items::{find_counterpart, load_item};
use crate::store::{InventoryStore, InventoryTx, SerialQuery};

/// Per-status serial counts for one item row.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SerialStatusSummary {
    pub available: usize,
    pub reserved: usize,
    pub sold: usize,
    pub returned: usize,
    pub damaged: usize,
}

impl SerialStatusSummary {
    fn count(&mut self, status: SerialStatus) {
        let slot = match status {
            SerialStatus::Available => &mut self.available,
            SerialStatus::Reserved => &mut self.reserved,
            SerialStatus::Sold => &mut self.sold,
            SerialStatus::Returned => &mut self.returned,
            SerialStatus::Damaged => &mut self.damaged,
        };
        *slot += 1;
    }

    pub fn total(&self) -> usize {
        self.available + self.reserved + self.sold + self.returned + self.damaged
    }
}

fn load_by_number(tx: &dyn InventoryTx, number: &str) -> InventoryResult<InventorySerial> {
    tx.find_serial_by_number(number)?
        .ok_or_else(|| InventoryError::not_found(InventorySerial::entity_name(), number))
}

/// Every serial named in `numbers`; `NotFound` lists all missing ones.
pub(crate) fn load_by_numbers(
    tx: &dyn InventoryTx,
    numbers: &[String],
) -> InventoryResult<Vec<InventorySerial>> {
    let mut found = Vec::with_capacity(numbers.len());
    let mut missing = Vec::new();
    for number in numbers {
        match tx.find_serial_by_number(number)? {
            Some(serial) => found.push(serial),
            None => missing.push(number.as_str()),
        }
    }
    if !missing.is_empty() {
        return Err(InventoryError::not_found(InventorySerial::entity_name(), missing.join(", ")));
    }
    Ok(found)
}

/// A linked batch must exist on the same item row as the serial.
fn ensure_batch_link(
    tx: &dyn InventoryTx,
    batch_id: Option<BatchId>,
    item_id: InventoryItemId,
    warehouse_id: WarehouseId,
) -> InventoryResult<()> {
    let Some(batch_id) = batch_id else {
        return Ok(());
    };
    let batch = load_batch(tx, batch_id)?;
    if batch.item_id != item_id || batch.warehouse_id != warehouse_id {
        return Err(InventoryError::invalid_argument(format!(
            "batch {} belongs to a different item row",
            batch.batch_number
        )));
    }
    Ok(())
}

/// Create all serials or none. Numbers already stored, or repeated within
/// `serials`, are reported together as one `DuplicateKey`. Every serial must
/// name its item's own warehouse.
pub(crate) fn create_bulk_in_tx(
    tx: &mut dyn InventoryTx,
    serials: Vec<NewSerial>,
    now: DateTime<Utc>,
) -> InventoryResult<Vec<InventorySerial>> {
    for new in &serials {
        let item = load_item(tx, new.item_id)?;
        if new.warehouse_id != item.warehouse_id {
            return Err(InventoryError::invalid_argument(format!(
                "serial {} names warehouse {} but item {} is stocked in {}",
                new.serial_number.trim(),
                new.warehouse_id,
                item.sku,
                item.warehouse_id
            )));
        }
        ensure_batch_link(tx, new.batch_id, item.id, item.warehouse_id)?;
    }

    let mut seen = HashSet::new();
    let mut clashes = Vec::new();
    for new in &serials {
        let number = new.serial_number.trim().to_string();
        if tx.find_serial_by_number(&number)?.is_some() || !seen.insert(number.clone()) {
            clashes.push(number);
        }
    }
    if !clashes.is_empty() {
        return Err(InventoryError::duplicate("serial number", clashes.join(", ")));
    }

    serials
        .into_iter()
        .map(|new| tx.save_serial(InventorySerial::create(new, now)?))
        .collect()
}

/// Reassign a serial to the counterpart item row in `warehouse_id`. A batch
/// link follows to the destination batch of the same number, if there is one.
pub(crate) fn move_in_tx(
    tx: &mut dyn InventoryTx,
    mut serial: InventorySerial,
    warehouse_id: WarehouseId,
    now: DateTime<Utc>,
) -> InventoryResult<InventorySerial> {
    let destination = find_counterpart(tx, serial.item_id, warehouse_id)?;
    if let Some(batch_id) = serial.batch_id {
        let origin = load_batch(tx, batch_id)?;
        serial.batch_id = tx
            .find_batch_by_number(destination.id, warehouse_id, &origin.batch_number)?
            .map(|b| b.id);
    }
    serial.item_id = destination.id;
    serial.move_to_warehouse(warehouse_id, now);
    tx.save_serial(serial)
}

pub struct SerialLifecycle<S, B> {
    ctx: InventoryContext<S, B>,
}

impl<S, B> SerialLifecycle<S, B>
where
    S: InventoryStore,
    B: EventBus<InventoryEvent>,
{
    pub fn new(ctx: InventoryContext<S, B>) -> Self {
        Self { ctx }
    }

    #[instrument(skip(self, new), fields(serial_number = %new.serial_number))]
    pub fn create_serial(&self, new: NewSerial) -> InventoryResult<InventorySerial> {
        let mut created = self.create_bulk_serials(vec![new])?;
        created
            .pop()
            .ok_or_else(|| InventoryError::storage("bulk serial creation returned no rows"))
    }

    #[instrument(skip(self, serials), fields(count = serials.len()))]
    pub fn create_bulk_serials(&self, serials: Vec<NewSerial>) -> InventoryResult<Vec<InventorySerial>> {
        let now = self.ctx.now();
        let created = self.ctx.unit_of_work("create_bulk_serials", |tx| {
            create_bulk_in_tx(tx, serials.clone(), now)
        })?;
        tracing::info!(count = created.len(), "serials created");
        Ok(created)
    }

    pub fn get_serial(&self, id: SerialId) -> InventoryResult<InventorySerial> {
        self.ctx.read(|tx| {
            tx.get_serial(id)?
                .ok_or_else(|| InventoryError::not_found(InventorySerial::entity_name(), id))
        })
    }

    pub fn find_by_number(&self, serial_number: &str) -> InventoryResult<InventorySerial> {
        self.ctx.read(|tx| load_by_number(tx, serial_number))
    }

    pub fn serials_for_item(
        &self,
        item_id: InventoryItemId,
        warehouse_id: Option<WarehouseId>,
    ) -> InventoryResult<Vec<InventorySerial>> {
        self.query(SerialQuery {
            item_id: Some(item_id),
            warehouse_id,
            ..SerialQuery::default()
        })
    }

    /// AVAILABLE units of the item row, oldest received first.
    pub fn available_serials(
        &self,
        item_id: InventoryItemId,
        warehouse_id: WarehouseId,
    ) -> InventoryResult<Vec<InventorySerial>> {
        self.query(SerialQuery {
            item_id: Some(item_id),
            warehouse_id: Some(warehouse_id),
            status: Some(SerialStatus::Available),
            ..SerialQuery::default()
        })
    }

    pub fn serials_by_customer(&self, customer_id: CustomerId) -> InventoryResult<Vec<InventorySerial>> {
        self.query(SerialQuery {
            customer_id: Some(customer_id),
            ..SerialQuery::default()
        })
    }

    fn query(&self, query: SerialQuery) -> InventoryResult<Vec<InventorySerial>> {
        self.ctx.read(|tx| tx.serials(&query))
    }

    #[instrument(skip(self, update))]
    pub fn update_serial(&self, id: SerialId, update: SerialUpdate) -> InventoryResult<InventorySerial> {
        let now = self.ctx.now();
        self.ctx.unit_of_work("update_serial", |tx| {
            let mut serial = tx
                .get_serial(id)?
                .ok_or_else(|| InventoryError::not_found(InventorySerial::entity_name(), id))?;
            ensure_batch_link(tx, update.batch_id, serial.item_id, serial.warehouse_id)?;
            serial.apply_update(update.clone(), now);
            tx.save_serial(serial)
        })
    }

    /// Only AVAILABLE units may be deleted.
    #[instrument(skip(self))]
    pub fn delete_serial(&self, id: SerialId) -> InventoryResult<()> {
        self.ctx.unit_of_work("delete_serial", |tx| {
            let serial = tx
                .get_serial(id)?
                .ok_or_else(|| InventoryError::not_found(InventorySerial::entity_name(), id))?;
            serial.ensure_deletable()?;
            tx.delete_serial(id)
        })
    }

    /// First `quantity` AVAILABLE units by received date. Nothing is mutated.
    pub fn allocate_serials(
        &self,
        item_id: InventoryItemId,
        warehouse_id: WarehouseId,
        quantity: usize,
    ) -> InventoryResult<Vec<InventorySerial>> {
        let mut available = self.available_serials(item_id, warehouse_id)?;
        if available.len() < quantity {
            tracing::warn!(
                item_id = %item_id,
                requested = quantity,
                available = available.len(),
                "not enough available serials"
            );
            return Err(InventoryError::insufficient(
                format!("serials of item {item_id}"),
                quantity.into(),
                available.len().into(),
            ));
        }
        available.truncate(quantity);
        Ok(available)
    }

    /// Reserve every named serial or none.
    #[instrument(skip(self))]
    pub fn reserve_serials(&self, numbers: &[String]) -> InventoryResult<Vec<InventorySerial>> {
        let now = self.ctx.now();
        self.ctx.unit_of_work("reserve_serials", |tx| {
            let serials = load_by_numbers(tx, numbers)?;
            serials
                .into_iter()
                .map(|mut serial| {
                    serial.reserve(now)?;
                    tx.save_serial(serial)
                })
                .collect()
        })
    }

    /// Release the named serials that are RESERVED; others are left alone.
    /// Returns how many were released.
    #[instrument(skip(self))]
    pub fn release_serial_reservations(&self, numbers: &[String]) -> InventoryResult<usize> {
        let now = self.ctx.now();
        self.ctx.unit_of_work("release_serial_reservations", |tx| {
            let mut released = 0;
            for number in numbers {
                let Some(mut serial) = tx.find_serial_by_number(number)? else {
                    continue;
                };
                if serial.status() == SerialStatus::Reserved {
                    serial.release_reservation(now)?;
                    tx.save_serial(serial)?;
                    released += 1;
                }
            }
            Ok(released)
        })
    }

    /// Sell every named serial or none.
    #[instrument(skip(self, sale))]
    pub fn mark_serials_as_sold(
        &self,
        numbers: &[String],
        sale: &SaleDetails,
    ) -> InventoryResult<Vec<InventorySerial>> {
        let now = self.ctx.now();
        let sold = self.ctx.unit_of_work("mark_serials_as_sold", |tx| {
            let serials = load_by_numbers(tx, numbers)?;
            serials
                .into_iter()
                .map(|mut serial| {
                    serial.mark_as_sold(sale, now)?;
                    tx.save_serial(serial)
                })
                .collect::<InventoryResult<Vec<_>>>()
        })?;
        tracing::info!(count = sold.len(), reference = %sale.reference.reference_id, "serials sold");
        Ok(sold)
    }

    #[instrument(skip(self, reference, notes))]
    pub fn mark_as_returned(
        &self,
        serial_number: &str,
        reference: DocumentRef,
        notes: Option<String>,
    ) -> InventoryResult<InventorySerial> {
        let now = self.ctx.now();
        self.ctx.unit_of_work("mark_serial_returned", |tx| {
            let mut serial = load_by_number(tx, serial_number)?;
            serial.mark_as_returned(reference.clone(), notes.clone(), now)?;
            tx.save_serial(serial)
        })
    }

    #[instrument(skip(self, notes))]
    pub fn mark_as_damaged(
        &self,
        serial_number: &str,
        notes: Option<String>,
    ) -> InventoryResult<InventorySerial> {
        let now = self.ctx.now();
        self.ctx.unit_of_work("mark_serial_damaged", |tx| {
            let mut serial = load_by_number(tx, serial_number)?;
            serial.mark_as_damaged(notes.clone(), now);
            tx.save_serial(serial)
        })
    }

    /// Put a unit back on the shelf. Damaged units need `repaired`.
    #[instrument(skip(self))]
    pub fn make_available(
        &self,
        serial_number: &str,
        repaired: bool,
    ) -> InventoryResult<InventorySerial> {
        let now = self.ctx.now();
        self.ctx.unit_of_work("make_serial_available", |tx| {
            let mut serial = load_by_number(tx, serial_number)?;
            serial.make_available(repaired, now)?;
            tx.save_serial(serial)
        })
    }

    /// Move a unit to the item's counterpart row in another warehouse.
    #[instrument(skip(self))]
    pub fn move_to_warehouse(
        &self,
        serial_number: &str,
        warehouse_id: WarehouseId,
    ) -> InventoryResult<InventorySerial> {
        self.ctx.warehouses.require(warehouse_id)?;
        let now = self.ctx.now();
        self.ctx.unit_of_work("move_serial", |tx| {
            let serial = load_by_number(tx, serial_number)?;
            move_in_tx(tx, serial, warehouse_id, now)
        })
    }

    pub fn serials_with_expiring_warranty(
        &self,
        now: DateTime<Utc>,
        days: u32,
    ) -> InventoryResult<Vec<InventorySerial>> {
        let serials = self.query(SerialQuery::default())?;
        Ok(serials
            .into_iter()
            .filter(|s| s.is_warranty_expiring_soon(now, days))
            .collect())
    }

    /// Units sold to `customer_id` whose warranty has not run out.
    pub fn customer_serials_with_active_warranty(
        &self,
        customer_id: CustomerId,
        now: DateTime<Utc>,
    ) -> InventoryResult<Vec<InventorySerial>> {
        let serials = self.serials_by_customer(customer_id)?;
        Ok(serials
            .into_iter()
            .filter(|s| s.warranty_expiry_date.is_some() && !s.has_warranty_expired(now))
            .collect())
    }

    pub fn status_summary(
        &self,
        item_id: InventoryItemId,
        warehouse_id: WarehouseId,
    ) -> InventoryResult<SerialStatusSummary> {
        let serials = self.serials_for_item(item_id, Some(warehouse_id))?;
        let mut summary = SerialStatusSummary::default();
        for serial in &serials {
            summary.count(serial.status());
        }
        Ok(summary)
    }

    pub fn count_available(
        &self,
        item_id: InventoryItemId,
        warehouse_id: WarehouseId,
    ) -> InventoryResult<usize> {
        Ok(self.available_serials(item_id, warehouse_id)?.len())
    }
}
