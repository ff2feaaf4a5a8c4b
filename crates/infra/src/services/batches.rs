//! Batch creation, strategy-driven allocation, and the expiry sweep.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use tracing::instrument;

use stockledger_core::{Entity, InventoryError, InventoryResult, WarehouseId};
use stockledger_events::EventBus;
use stockledger_inventory::{
    AllocationMode, BatchAllocation, BatchExpired, BatchId, BatchUpdate, ConsumptionStrategy,
    InventoryBatch, InventoryEvent, InventoryItemId, NewBatch, allocate,
};

use crate::collaborators::WarehouseDirectory;
use crate::services::InventoryContext;
use crate::services::items::load_item;
use crate::store::{BatchQuery, InventoryStore, InventoryTx};

pub(crate) fn load_batch(tx: &dyn InventoryTx, id: BatchId) -> InventoryResult<InventoryBatch> {
    tx.get_batch(id)?
        .ok_or_else(|| InventoryError::not_found(InventoryBatch::entity_name(), id))
}

pub(crate) fn create_batch_in_tx(
    tx: &mut dyn InventoryTx,
    warehouses: &dyn WarehouseDirectory,
    new: NewBatch,
    now: DateTime<Utc>,
) -> InventoryResult<InventoryBatch> {
    let item = load_item(tx, new.item_id)?;
    warehouses.require(new.warehouse_id)?;
    if item.warehouse_id != new.warehouse_id {
        return Err(InventoryError::invalid_argument(format!(
            "item {} is not stocked in warehouse {}",
            item.sku, new.warehouse_id
        )));
    }
    let number = new.batch_number.trim();
    if tx
        .find_batch_by_number(new.item_id, new.warehouse_id, number)?
        .is_some()
    {
        return Err(InventoryError::duplicate("batch number", number));
    }
    tx.save_batch(InventoryBatch::create(new, now)?)
}

/// Allocate from the item's candidate batches and persist the touched ones.
///
/// Candidates are active, unexpired batches with available stock. Nothing is
/// saved when the candidates cannot cover `quantity`.
pub(crate) fn allocate_in_tx(
    tx: &mut dyn InventoryTx,
    item_id: InventoryItemId,
    warehouse_id: WarehouseId,
    quantity: Decimal,
    strategy: ConsumptionStrategy,
    mode: AllocationMode,
    now: DateTime<Utc>,
) -> InventoryResult<Vec<BatchAllocation>> {
    let item = load_item(tx, item_id)?;
    let mut candidates: Vec<InventoryBatch> = tx
        .batches(&BatchQuery {
            item_id: Some(item_id),
            warehouse_id: Some(warehouse_id),
            active_only: true,
        })?
        .into_iter()
        .filter(|b| b.has_available_stock() && !b.has_expired(now))
        .collect();

    let plan = allocate(&mut candidates, quantity, strategy, mode, &item.sku).inspect_err(|err| {
        tracing::warn!(
            item_id = %item_id,
            strategy = %strategy,
            requested = %quantity,
            error = %err,
            "batch allocation failed"
        );
    })?;

    for entry in &plan {
        if let Some(batch) = candidates.iter_mut().find(|b| b.id == entry.batch_id) {
            batch.touch(now);
            tx.save_batch(batch.clone())?;
        }
    }
    tracing::debug!(item_id = %item_id, batches = plan.len(), ?mode, "batches allocated");
    Ok(plan)
}

pub(crate) fn consume_batch_in_tx(
    tx: &mut dyn InventoryTx,
    mut batch: InventoryBatch,
    quantity: Decimal,
    now: DateTime<Utc>,
) -> InventoryResult<BatchAllocation> {
    if !batch.is_active || batch.is_expired || batch.has_expired(now) {
        return Err(InventoryError::invalid_state(format!(
            "batch {} is inactive or expired",
            batch.batch_number
        )));
    }
    batch.consume(quantity)?;
    batch.touch(now);
    let batch = tx.save_batch(batch)?;
    Ok(BatchAllocation {
        batch_id: batch.id,
        batch_number: batch.batch_number,
        quantity,
    })
}

pub struct BatchAllocator<S, B> {
    ctx: InventoryContext<S, B>,
}

impl<S, B> BatchAllocator<S, B>
where
    S: InventoryStore,
    B: EventBus<InventoryEvent>,
{
    pub fn new(ctx: InventoryContext<S, B>) -> Self {
        Self { ctx }
    }

    #[instrument(skip(self, new), fields(batch_number = %new.batch_number))]
    pub fn create_batch(&self, new: NewBatch) -> InventoryResult<InventoryBatch> {
        let now = self.ctx.now();
        let warehouses = self.ctx.warehouses.clone();
        let batch = self.ctx.unit_of_work("create_batch", |tx| {
            create_batch_in_tx(tx, warehouses.as_ref(), new.clone(), now)
        })?;
        tracing::info!(batch_id = %batch.id, quantity = %batch.total_quantity(), "batch created");
        Ok(batch)
    }

    pub fn get_batch(&self, id: BatchId) -> InventoryResult<InventoryBatch> {
        self.ctx.read(|tx| load_batch(tx, id))
    }

    pub fn find_by_number(
        &self,
        item_id: InventoryItemId,
        warehouse_id: WarehouseId,
        batch_number: &str,
    ) -> InventoryResult<InventoryBatch> {
        self.ctx.read(|tx| {
            tx.find_batch_by_number(item_id, warehouse_id, batch_number)?
                .ok_or_else(|| InventoryError::not_found(InventoryBatch::entity_name(), batch_number))
        })
    }

    pub fn batches_for_item(
        &self,
        item_id: InventoryItemId,
        warehouse_id: Option<WarehouseId>,
    ) -> InventoryResult<Vec<InventoryBatch>> {
        self.ctx.read(|tx| {
            tx.batches(&BatchQuery {
                item_id: Some(item_id),
                warehouse_id,
                active_only: false,
            })
        })
    }

    /// Active, not yet expired batches whose expiry falls within `days` of `now`.
    pub fn expiring_batches(
        &self,
        now: DateTime<Utc>,
        days: u32,
    ) -> InventoryResult<Vec<InventoryBatch>> {
        let batches = self.ctx.read(|tx| {
            tx.batches(&BatchQuery {
                active_only: true,
                ..BatchQuery::default()
            })
        })?;
        let mut expiring: Vec<_> = batches
            .into_iter()
            .filter(|b| !b.is_expired && b.is_expiring_soon(now, days))
            .collect();
        expiring.sort_by_key(|b| b.expiry_date);
        Ok(expiring)
    }

    #[instrument(skip(self))]
    pub fn add_stock(&self, id: BatchId, quantity: Decimal) -> InventoryResult<InventoryBatch> {
        let now = self.ctx.now();
        self.ctx.unit_of_work("add_batch_stock", |tx| {
            let mut batch = load_batch(tx, id)?;
            batch.add_stock(quantity, now)?;
            tx.save_batch(batch)
        })
    }

    #[instrument(skip(self, update))]
    pub fn update_batch(&self, id: BatchId, update: BatchUpdate) -> InventoryResult<InventoryBatch> {
        let now = self.ctx.now();
        self.ctx.unit_of_work("update_batch", |tx| {
            let mut batch = load_batch(tx, id)?;
            batch.apply_update(update.clone(), now)?;
            tx.save_batch(batch)
        })
    }

    /// Soft delete; only batches with nothing available or reserved.
    #[instrument(skip(self))]
    pub fn delete_batch(&self, id: BatchId) -> InventoryResult<InventoryBatch> {
        let now = self.ctx.now();
        self.ctx.unit_of_work("delete_batch", |tx| {
            let mut batch = load_batch(tx, id)?;
            batch.deactivate(now)?;
            tx.save_batch(batch)
        })
    }

    fn strategy_or_default(&self, strategy: Option<ConsumptionStrategy>) -> ConsumptionStrategy {
        strategy.unwrap_or_else(|| self.ctx.config.consumption_strategy())
    }

    /// Consume `quantity` across the item's batches, all or nothing.
    #[instrument(skip(self))]
    pub fn allocate_batches(
        &self,
        item_id: InventoryItemId,
        quantity: Decimal,
        strategy: Option<ConsumptionStrategy>,
    ) -> InventoryResult<Vec<BatchAllocation>> {
        self.run_allocation(item_id, quantity, strategy, AllocationMode::Consume)
    }

    /// Reserve `quantity` across the item's batches, all or nothing.
    #[instrument(skip(self))]
    pub fn reserve_batches(
        &self,
        item_id: InventoryItemId,
        quantity: Decimal,
        strategy: Option<ConsumptionStrategy>,
    ) -> InventoryResult<Vec<BatchAllocation>> {
        self.run_allocation(item_id, quantity, strategy, AllocationMode::Reserve)
    }

    fn run_allocation(
        &self,
        item_id: InventoryItemId,
        quantity: Decimal,
        strategy: Option<ConsumptionStrategy>,
        mode: AllocationMode,
    ) -> InventoryResult<Vec<BatchAllocation>> {
        let strategy = self.strategy_or_default(strategy);
        let now = self.ctx.now();
        self.ctx.unit_of_work("allocate_batches", |tx| {
            let item = load_item(tx, item_id)?;
            allocate_in_tx(tx, item_id, item.warehouse_id, quantity, strategy, mode, now)
        })
    }

    /// Return reserved quantities to available, one entry at a time.
    ///
    /// Each entry is its own unit of work; the result for entry `i` is the
    /// quantity actually released on that batch.
    pub fn release_reservations(
        &self,
        allocations: &[BatchAllocation],
    ) -> Vec<InventoryResult<Decimal>> {
        let now = self.ctx.now();
        allocations
            .iter()
            .map(|entry| {
                self.ctx.unit_of_work("release_batch_reservation", |tx| {
                    let mut batch = load_batch(tx, entry.batch_id)?;
                    let released = batch.release_reserved(entry.quantity);
                    if released < entry.quantity {
                        tracing::warn!(
                            batch_id = %entry.batch_id,
                            requested = %entry.quantity,
                            released = %released,
                            "batch release clamped to reserved quantity"
                        );
                    }
                    batch.touch(now);
                    tx.save_batch(batch)?;
                    Ok(released)
                })
            })
            .collect()
    }

    /// Consume from one named batch (explicit-batch stock-outs).
    #[instrument(skip(self))]
    pub fn consume_from_batch(
        &self,
        id: BatchId,
        quantity: Decimal,
    ) -> InventoryResult<BatchAllocation> {
        let now = self.ctx.now();
        self.ctx.unit_of_work("consume_from_batch", |tx| {
            let batch = load_batch(tx, id)?;
            consume_batch_in_tx(tx, batch, quantity, now)
        })
    }

    /// Flag every batch whose expiry date has passed. Quantities are untouched.
    #[instrument(skip(self))]
    pub fn mark_expired_batches(&self, now: DateTime<Utc>) -> InventoryResult<Vec<InventoryBatch>> {
        let expired = self.ctx.unit_of_work("mark_expired_batches", |tx| {
            let candidates = tx.batches(&BatchQuery {
                active_only: true,
                ..BatchQuery::default()
            })?;
            let mut flagged = Vec::new();
            for mut batch in candidates {
                if batch.mark_expired(now) {
                    flagged.push(tx.save_batch(batch)?);
                }
            }
            Ok(flagged)
        })?;

        tracing::info!(count = expired.len(), "expired batches flagged");
        self.ctx.publish(
            expired
                .iter()
                .map(|b| {
                    InventoryEvent::BatchExpired(BatchExpired {
                        batch_id: b.id,
                        batch_number: b.batch_number.clone(),
                        item_id: b.item_id,
                        warehouse_id: b.warehouse_id,
                        remaining_quantity: b.available_quantity() + b.reserved_quantity(),
                        occurred_at: now,
                    })
                })
                .collect(),
        );
        Ok(expired)
    }
}
