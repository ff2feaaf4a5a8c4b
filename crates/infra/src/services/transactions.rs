//! Stock movements: stock-in, stock-out, transfer, adjustment, physical count.
//!
//! Each movement is one unit of work that mutates the item balance (plus any
//! batches and serials involved), captures the resulting balance, and appends
//! an [`InventoryTransaction`]. Events go out only after the unit commits.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use tracing::instrument;

use stockledger_core::{CustomerId, Entity, InventoryError, InventoryResult, UserId, WarehouseId};
use stockledger_events::EventBus;
use stockledger_inventory::transaction::transaction_number;
use stockledger_inventory::{
    AllocationMode, BatchAllocation, DocumentRef, InventoryBatch, InventoryEvent, InventoryItem,
    InventoryItemId, InventorySerial, InventoryTransaction, LowStock, NewBatch, NewSerial,
    NewTransaction, OutOfStock, SaleDetails, StockUpdated, TransactionId,
    TransactionType,
};

use crate::services::InventoryContext;
use crate::services::batches::{allocate_in_tx, consume_batch_in_tx, create_batch_in_tx, load_batch};
use crate::services::items::{find_counterpart, load_item};
use crate::services::serials::{create_bulk_in_tx, load_by_numbers, move_in_tx};
use crate::store::{InventoryStore, InventoryTx, TransactionQuery};

const TRANSFER_REASON: &str = "TRANSFER";
const COUNT_REASON: &str = "COUNT_ADJUSTMENT";

/// Audit fields shared by every movement request.
#[derive(Debug, Clone, Default)]
pub struct MovementDetails {
    pub reason: Option<String>,
    pub reference: Option<DocumentRef>,
    pub notes: Option<String>,
    pub performed_by: Option<UserId>,
    /// Business date of the movement; defaults to now.
    pub transaction_date: Option<DateTime<Utc>>,
}

/// Batch data for a stock-in. An existing batch with the same number is topped up.
#[derive(Debug, Clone, Default)]
pub struct BatchReceipt {
    pub batch_number: String,
    pub lot_number: Option<String>,
    pub manufacturing_date: Option<DateTime<Utc>>,
    pub expiry_date: Option<DateTime<Utc>>,
    pub supplier_id: Option<String>,
    pub supplier_name: Option<String>,
    pub purchase_order_number: Option<String>,
}

impl BatchReceipt {
    pub fn new(batch_number: impl Into<String>) -> Self {
        Self {
            batch_number: batch_number.into(),
            ..Self::default()
        }
    }
}

#[derive(Debug, Clone)]
pub struct StockInRequest {
    pub item_id: InventoryItemId,
    pub quantity: Decimal,
    pub unit_cost: Decimal,
    pub batch: Option<BatchReceipt>,
    pub serial_numbers: Vec<String>,
    pub warranty_expiry_date: Option<DateTime<Utc>>,
    pub details: MovementDetails,
}

impl StockInRequest {
    pub fn new(item_id: InventoryItemId, quantity: Decimal, unit_cost: Decimal) -> Self {
        Self {
            item_id,
            quantity,
            unit_cost,
            batch: None,
            serial_numbers: Vec::new(),
            warranty_expiry_date: None,
            details: MovementDetails::default(),
        }
    }
}

#[derive(Debug, Clone)]
pub struct StockOutRequest {
    pub item_id: InventoryItemId,
    pub quantity: Decimal,
    /// Draw from this batch instead of allocating by strategy.
    pub batch_number: Option<String>,
    pub serial_numbers: Vec<String>,
    pub customer_id: Option<CustomerId>,
    pub customer_name: Option<String>,
    pub details: MovementDetails,
}

impl StockOutRequest {
    pub fn new(item_id: InventoryItemId, quantity: Decimal) -> Self {
        Self {
            item_id,
            quantity,
            batch_number: None,
            serial_numbers: Vec::new(),
            customer_id: None,
            customer_name: None,
            details: MovementDetails::default(),
        }
    }
}

/// Move stock of `item_id`'s product between its rows in two warehouses.
#[derive(Debug, Clone)]
pub struct TransferRequest {
    pub item_id: InventoryItemId,
    pub from_warehouse_id: WarehouseId,
    pub to_warehouse_id: WarehouseId,
    pub quantity: Decimal,
    pub serial_numbers: Vec<String>,
    pub details: MovementDetails,
}

impl TransferRequest {
    pub fn new(
        item_id: InventoryItemId,
        from_warehouse_id: WarehouseId,
        to_warehouse_id: WarehouseId,
        quantity: Decimal,
    ) -> Self {
        Self {
            item_id,
            from_warehouse_id,
            to_warehouse_id,
            quantity,
            serial_numbers: Vec::new(),
            details: MovementDetails::default(),
        }
    }
}

/// Signed correction. A reason is mandatory.
#[derive(Debug, Clone)]
pub struct AdjustmentRequest {
    pub item_id: InventoryItemId,
    pub delta: Decimal,
    pub details: MovementDetails,
}

#[derive(Debug, Clone)]
pub struct PhysicalCountRequest {
    pub item_id: InventoryItemId,
    pub counted_quantity: Decimal,
    pub details: MovementDetails,
}

/// Both legs of a committed transfer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransferOutcome {
    pub outbound: InventoryTransaction,
    pub inbound: InventoryTransaction,
}

/// A committed balance change, kept for logging and event publication.
struct StockChange {
    item: InventoryItem,
    previous_stock: Decimal,
    transaction: InventoryTransaction,
}

fn ensure_positive(what: &str, quantity: Decimal) -> InventoryResult<()> {
    if quantity <= Decimal::ZERO {
        return Err(InventoryError::invalid_argument(format!(
            "{what} must be positive, got {quantity}"
        )));
    }
    Ok(())
}

fn append_notes(base: String, extra: Option<&str>) -> String {
    match extra.map(str::trim).filter(|n| !n.is_empty()) {
        Some(extra) => format!("{base}. {extra}"),
        None => base,
    }
}

/// Skeleton transaction carrying the request's audit fields.
fn movement(
    transaction_type: TransactionType,
    item: &InventoryItem,
    quantity: Decimal,
    details: &MovementDetails,
    default_reason: &str,
    now: DateTime<Utc>,
) -> NewTransaction {
    let mut new = NewTransaction::new(
        transaction_type,
        item.id,
        item.warehouse_id,
        quantity,
        item.current_stock(),
        details.transaction_date.unwrap_or(now),
    );
    new.reason = details
        .reason
        .clone()
        .filter(|r| !r.trim().is_empty())
        .unwrap_or_else(|| default_reason.to_string());
    new.reference = details.reference.clone();
    new.notes = details.notes.clone();
    new.performed_by = details.performed_by;
    new
}

/// Set the item's stock, save it, and append the transaction.
fn commit_change(
    tx: &mut dyn InventoryTx,
    mut item: InventoryItem,
    new_stock: Decimal,
    mut new: NewTransaction,
    now: DateTime<Utc>,
) -> InventoryResult<StockChange> {
    let previous_stock = item.current_stock();
    item.set_current_stock(new_stock)?;
    item.touch(now);
    let item = tx.save_item(item)?;

    new.balance_after = item.current_stock();
    let day = now.date_naive();
    let sequence = tx.next_transaction_sequence(day)?;
    let number = transaction_number(day, sequence);
    tracing::debug!(transaction_number = %number, "transaction number issued");

    let transaction = InventoryTransaction::record(number, new, now);
    tx.insert_transaction(transaction.clone())?;
    Ok(StockChange {
        item,
        previous_stock,
        transaction,
    })
}

fn ensure_available(
    item: &InventoryItem,
    quantity: Decimal,
    allow_negative: bool,
) -> InventoryResult<()> {
    let available = item.available_stock();
    if !allow_negative && available < quantity {
        return Err(InventoryError::insufficient(&item.sku, quantity, available));
    }
    Ok(())
}

/// Load the named serials, failing unless every one sits on `item`'s row.
fn owned_serials(
    tx: &dyn InventoryTx,
    numbers: &[String],
    item: &InventoryItem,
) -> InventoryResult<Vec<InventorySerial>> {
    let serials = load_by_numbers(tx, numbers)?;
    if let Some(stray) = serials
        .iter()
        .find(|s| s.item_id != item.id || s.warehouse_id != item.warehouse_id)
    {
        return Err(InventoryError::invalid_argument(format!(
            "serial {} does not belong to item {} in warehouse {}",
            stray.serial_number, item.sku, item.warehouse_id
        )));
    }
    Ok(serials)
}

pub struct TransactionProcessor<S, B> {
    ctx: InventoryContext<S, B>,
}

impl<S, B> TransactionProcessor<S, B>
where
    S: InventoryStore,
    B: EventBus<InventoryEvent>,
{
    pub fn new(ctx: InventoryContext<S, B>) -> Self {
        Self { ctx }
    }

    /// Receive stock. Batch-tracked items need a batch; serial-tracked items
    /// need exactly one serial number per unit.
    #[instrument(skip(self, request), fields(item_id = %request.item_id, quantity = %request.quantity))]
    pub fn stock_in(&self, request: StockInRequest) -> InventoryResult<InventoryTransaction> {
        ensure_positive("stock-in quantity", request.quantity)?;
        if request.unit_cost < Decimal::ZERO {
            return Err(InventoryError::invalid_argument("unit cost cannot be negative"));
        }
        let now = self.ctx.now();
        let warehouses = self.ctx.warehouses.as_ref();

        let change = self.ctx.unit_of_work("stock_in", |tx| {
            let item = load_item(tx, request.item_id)?;
            let mut new = movement(
                TransactionType::StockIn,
                &item,
                request.quantity,
                &request.details,
                TransactionType::StockIn.as_str(),
                now,
            );
            let received = new.transaction_date;

            let batch = match (&request.batch, item.tracking.batch) {
                (Some(receipt), _) => {
                    let batch = match tx.find_batch_by_number(
                        item.id,
                        item.warehouse_id,
                        receipt.batch_number.trim(),
                    )? {
                        Some(mut existing) => {
                            existing.add_stock(request.quantity, now)?;
                            tx.save_batch(existing)?
                        }
                        None => {
                            let mut batch = NewBatch::new(
                                item.id,
                                item.warehouse_id,
                                receipt.batch_number.clone(),
                                request.quantity,
                            );
                            batch.lot_number = receipt.lot_number.clone();
                            batch.manufacturing_date = receipt.manufacturing_date;
                            batch.expiry_date = receipt.expiry_date;
                            batch.received_date = Some(received);
                            batch.supplier_id = receipt.supplier_id.clone();
                            batch.supplier_name = receipt.supplier_name.clone();
                            batch.purchase_order_number = receipt.purchase_order_number.clone();
                            batch.cost_per_unit = request.unit_cost;
                            create_batch_in_tx(tx, warehouses, batch, now)?
                        }
                    };
                    new.batch_allocations = vec![BatchAllocation {
                        batch_id: batch.id,
                        batch_number: batch.batch_number.clone(),
                        quantity: request.quantity,
                    }];
                    Some(batch.id)
                }
                (None, true) => {
                    return Err(InventoryError::invalid_argument(format!(
                        "item {} is batch-tracked; a batch number is required",
                        item.sku
                    )));
                }
                (None, false) => None,
            };

            if item.tracking.serial
                && Decimal::from(request.serial_numbers.len()) != request.quantity
            {
                return Err(InventoryError::invalid_argument(format!(
                    "item {} is serial-tracked; expected {} serial numbers, got {}",
                    item.sku,
                    request.quantity,
                    request.serial_numbers.len()
                )));
            }
            if !request.serial_numbers.is_empty() {
                let serials = request
                    .serial_numbers
                    .iter()
                    .map(|number| {
                        let mut serial = NewSerial::new(number.clone(), item.id, item.warehouse_id);
                        serial.batch_id = batch;
                        serial.received_date = Some(received);
                        serial.warranty_expiry_date = request.warranty_expiry_date;
                        serial.cost_price = request.unit_cost;
                        serial.selling_price = item.selling_price;
                        serial
                    })
                    .collect();
                create_bulk_in_tx(tx, serials, now)?;
            }

            new.unit_cost = request.unit_cost;
            new.serial_numbers = request.serial_numbers.clone();
            let new_stock = item.current_stock() + request.quantity;
            commit_change(tx, item, new_stock, new, now)
        })?;

        self.announce([&change]);
        Ok(change.transaction)
    }

    /// Issue stock. Without negative stock, `quantity` must not exceed the
    /// available (unreserved) stock. Reserved stock is left as it is.
    #[instrument(skip(self, request), fields(item_id = %request.item_id, quantity = %request.quantity))]
    pub fn stock_out(&self, request: StockOutRequest) -> InventoryResult<InventoryTransaction> {
        ensure_positive("stock-out quantity", request.quantity)?;
        let allow_negative = self.ctx.config.allow_negative_stock();
        let strategy = self.ctx.config.consumption_strategy();
        let now = self.ctx.now();

        let change = self
            .ctx
            .unit_of_work("stock_out", |tx| {
                let item = load_item(tx, request.item_id)?;
                ensure_available(&item, request.quantity, allow_negative)?;

                let mut new = movement(
                    TransactionType::StockOut,
                    &item,
                    request.quantity,
                    &request.details,
                    TransactionType::StockOut.as_str(),
                    now,
                );

                new.batch_allocations = match &request.batch_number {
                    Some(number) => {
                        let batch = tx
                            .find_batch_by_number(item.id, item.warehouse_id, number)?
                            .ok_or_else(|| InventoryError::not_found(InventoryBatch::entity_name(), number))?;
                        vec![consume_batch_in_tx(tx, batch, request.quantity, now)?]
                    }
                    None if item.tracking.batch => allocate_in_tx(
                        tx,
                        item.id,
                        item.warehouse_id,
                        request.quantity,
                        strategy,
                        AllocationMode::Consume,
                        now,
                    )?,
                    None => Vec::new(),
                };

                if !request.serial_numbers.is_empty() {
                    let sold = owned_serials(tx, &request.serial_numbers, &item)?;
                    if let Some(reference) = &request.details.reference {
                        let sale = SaleDetails {
                            reference: reference.clone(),
                            customer_id: request.customer_id,
                            customer_name: request.customer_name.clone(),
                        };
                        for mut serial in sold {
                            serial.mark_as_sold(&sale, now)?;
                            tx.save_serial(serial)?;
                        }
                    }
                }

                new.unit_cost = item.cost_price;
                new.serial_numbers = request.serial_numbers.clone();
                let new_stock = item.current_stock() - request.quantity;
                commit_change(tx, item, new_stock, new, now)
            })
            .inspect_err(|err| {
                tracing::warn!(item_id = %request.item_id, error = %err, "stock-out rejected");
            })?;

        self.announce([&change]);
        Ok(change.transaction)
    }

    /// Move stock between the item's rows in two warehouses.
    ///
    /// Both rows must already exist. Writes an outbound and an inbound
    /// transaction; batches are re-created at the destination and serials
    /// follow the stock.
    #[instrument(skip(self, request), fields(item_id = %request.item_id, quantity = %request.quantity))]
    pub fn transfer(&self, request: TransferRequest) -> InventoryResult<TransferOutcome> {
        ensure_positive("transfer quantity", request.quantity)?;
        if request.from_warehouse_id == request.to_warehouse_id {
            return Err(InventoryError::invalid_state(format!(
                "cannot transfer within warehouse {}",
                request.from_warehouse_id
            )));
        }
        let from = self.ctx.warehouses.require(request.from_warehouse_id)?;
        let to = self.ctx.warehouses.require(request.to_warehouse_id)?;
        let allow_negative = self.ctx.config.allow_negative_stock();
        let strategy = self.ctx.config.consumption_strategy();
        let warehouses = self.ctx.warehouses.as_ref();
        let now = self.ctx.now();

        let changes = self.ctx.unit_of_work("transfer", |tx| {
            let source = find_counterpart(tx, request.item_id, from.id)?;
            let destination = find_counterpart(tx, request.item_id, to.id)?;
            ensure_available(&source, request.quantity, allow_negative)?;

            let mut outbound = movement(
                TransactionType::Transfer,
                &source,
                request.quantity,
                &request.details,
                TRANSFER_REASON,
                now,
            );
            let mut inbound = movement(
                TransactionType::Transfer,
                &destination,
                request.quantity,
                &request.details,
                TRANSFER_REASON,
                now,
            );

            if source.tracking.batch {
                outbound.batch_allocations = allocate_in_tx(
                    tx,
                    source.id,
                    from.id,
                    request.quantity,
                    strategy,
                    AllocationMode::Consume,
                    now,
                )?;
                for allocation in &outbound.batch_allocations {
                    let origin = load_batch(tx, allocation.batch_id)?;
                    let received = match tx.find_batch_by_number(
                        destination.id,
                        to.id,
                        &allocation.batch_number,
                    )? {
                        Some(mut existing) => {
                            existing.add_stock(allocation.quantity, now)?;
                            tx.save_batch(existing)?
                        }
                        None => {
                            let mut batch = NewBatch::new(
                                destination.id,
                                to.id,
                                origin.batch_number.clone(),
                                allocation.quantity,
                            );
                            batch.lot_number = origin.lot_number.clone();
                            batch.manufacturing_date = origin.manufacturing_date;
                            batch.expiry_date = origin.expiry_date;
                            batch.received_date = Some(origin.received_date);
                            batch.supplier_id = origin.supplier_id.clone();
                            batch.supplier_name = origin.supplier_name.clone();
                            batch.purchase_order_number = origin.purchase_order_number.clone();
                            batch.cost_per_unit = origin.cost_per_unit;
                            create_batch_in_tx(tx, warehouses, batch, now)?
                        }
                    };
                    inbound.batch_allocations.push(BatchAllocation {
                        batch_id: received.id,
                        batch_number: received.batch_number,
                        quantity: allocation.quantity,
                    });
                }
            }

            if !request.serial_numbers.is_empty() {
                let moving = owned_serials(tx, &request.serial_numbers, &source)?;
                // Sold or held units stay where their paperwork says they are.
                if let Some(held) = moving.iter().find(|s| !s.is_available()) {
                    return Err(InventoryError::invalid_state(format!(
                        "serial {} is {} and cannot be transferred",
                        held.serial_number,
                        held.status()
                    )));
                }
                for serial in moving {
                    move_in_tx(tx, serial, to.id, now)?;
                }
            }

            for (leg, notes) in [
                (&mut outbound, format!("Transfer to {}", to.name)),
                (&mut inbound, format!("Transfer from {}", from.name)),
            ] {
                leg.from_warehouse_id = Some(from.id);
                leg.to_warehouse_id = Some(to.id);
                leg.unit_cost = source.cost_price;
                leg.serial_numbers = request.serial_numbers.clone();
                leg.notes = Some(append_notes(notes, request.details.notes.as_deref()));
            }

            let source_stock = source.current_stock() - request.quantity;
            let destination_stock = destination.current_stock() + request.quantity;
            let out = commit_change(tx, source, source_stock, outbound, now)?;
            let into = commit_change(tx, destination, destination_stock, inbound, now)?;
            Ok((out, into))
        })?;

        self.announce([&changes.0, &changes.1]);
        Ok(TransferOutcome {
            outbound: changes.0.transaction,
            inbound: changes.1.transaction,
        })
    }

    /// Apply a signed correction. Positive deltas are costed at the item's cost price.
    #[instrument(skip(self, request), fields(item_id = %request.item_id, delta = %request.delta))]
    pub fn adjust(&self, request: AdjustmentRequest) -> InventoryResult<InventoryTransaction> {
        if request.delta.is_zero() {
            return Err(InventoryError::invalid_argument("adjustment delta cannot be zero"));
        }
        let reason = request
            .details
            .reason
            .as_deref()
            .map(str::trim)
            .filter(|r| !r.is_empty())
            .ok_or_else(|| InventoryError::invalid_argument("an adjustment needs a reason"))?;
        let allow_negative = self.ctx.config.allow_negative_stock();
        let now = self.ctx.now();

        let change = self.ctx.unit_of_work("adjust", |tx| {
            let item = load_item(tx, request.item_id)?;
            let new_stock = item.current_stock() + request.delta;
            if !allow_negative && new_stock < Decimal::ZERO {
                return Err(InventoryError::insufficient(
                    &item.sku,
                    request.delta.abs(),
                    item.current_stock(),
                ));
            }
            let mut new = movement(
                TransactionType::Adjustment,
                &item,
                request.delta,
                &request.details,
                reason,
                now,
            );
            new.unit_cost = if request.delta > Decimal::ZERO {
                item.cost_price
            } else {
                Decimal::ZERO
            };
            commit_change(tx, item, new_stock, new, now)
        })?;

        self.announce([&change]);
        Ok(change.transaction)
    }

    /// Overwrite the system stock with a counted quantity and record the difference.
    #[instrument(skip(self, request), fields(item_id = %request.item_id, counted = %request.counted_quantity))]
    pub fn physical_count(&self, request: PhysicalCountRequest) -> InventoryResult<InventoryTransaction> {
        let counted = request.counted_quantity;
        if counted < Decimal::ZERO {
            return Err(InventoryError::invalid_argument("counted quantity cannot be negative"));
        }
        let now = self.ctx.now();

        let change = self.ctx.unit_of_work("physical_count", |tx| {
            let item = load_item(tx, request.item_id)?;
            let system = item.current_stock();
            let difference = counted - system;

            let mut new = movement(
                TransactionType::Count,
                &item,
                difference,
                &request.details,
                COUNT_REASON,
                now,
            );
            new.unit_cost = if difference > Decimal::ZERO {
                item.cost_price
            } else {
                Decimal::ZERO
            };
            new.notes = Some(append_notes(
                format!(
                    "Physical count reconciliation. System: {system}, Counted: {counted}, Difference: {difference}"
                ),
                request.details.notes.as_deref(),
            ));
            commit_change(tx, item, counted, new, now)
        })?;

        self.announce([&change]);
        Ok(change.transaction)
    }

    /// Log committed changes and publish their events.
    fn announce<'a>(&self, changes: impl IntoIterator<Item = &'a StockChange>) {
        let mut events = Vec::new();
        for StockChange {
            item,
            previous_stock,
            transaction,
        } in changes
        {
            let previous_stock = *previous_stock;
            tracing::info!(
                transaction_number = %transaction.transaction_number,
                transaction_type = %transaction.transaction_type,
                item_id = %item.id,
                warehouse_id = %item.warehouse_id,
                quantity = %transaction.quantity,
                balance_after = %transaction.balance_after,
                "stock transaction committed"
            );

            let new_stock = item.current_stock();
            if new_stock != previous_stock {
                events.push(InventoryEvent::StockUpdated(StockUpdated {
                    item_id: item.id,
                    warehouse_id: item.warehouse_id,
                    sku: item.sku.clone(),
                    transaction_id: transaction.id,
                    transaction_type: transaction.transaction_type,
                    previous_stock,
                    new_stock,
                    change: new_stock - previous_stock,
                    reason: transaction.reason.clone(),
                    occurred_at: transaction.created_at,
                }));
            }
            if self.ctx.settings.low_stock_alerts && item.is_low_stock() {
                events.push(InventoryEvent::LowStock(LowStock {
                    item_id: item.id,
                    warehouse_id: item.warehouse_id,
                    sku: item.sku.clone(),
                    current_stock: new_stock,
                    reorder_level: item.reorder_level,
                    occurred_at: transaction.created_at,
                }));
            }
            if item.is_out_of_stock() {
                events.push(InventoryEvent::OutOfStock(OutOfStock {
                    item_id: item.id,
                    warehouse_id: item.warehouse_id,
                    sku: item.sku.clone(),
                    current_stock: new_stock,
                    occurred_at: transaction.created_at,
                }));
            }
        }
        self.ctx.publish(events);
    }

    pub fn get_transaction(&self, id: TransactionId) -> InventoryResult<InventoryTransaction> {
        self.ctx.read(|tx| {
            tx.get_transaction(id)?
                .ok_or_else(|| InventoryError::not_found(InventoryTransaction::entity_name(), id))
        })
    }

    pub fn get_by_number(&self, number: &str) -> InventoryResult<InventoryTransaction> {
        self.ctx.read(|tx| {
            tx.find_transaction_by_number(number)?
                .ok_or_else(|| InventoryError::not_found(InventoryTransaction::entity_name(), number))
        })
    }

    /// Oldest first.
    pub fn transactions_for_item(
        &self,
        item_id: InventoryItemId,
    ) -> InventoryResult<Vec<InventoryTransaction>> {
        self.query(TransactionQuery {
            item_id: Some(item_id),
            ..TransactionQuery::default()
        })
    }

    /// Newest first.
    pub fn transactions_for_warehouse(
        &self,
        warehouse_id: WarehouseId,
    ) -> InventoryResult<Vec<InventoryTransaction>> {
        let mut rows = self.query(TransactionQuery {
            warehouse_id: Some(warehouse_id),
            ..TransactionQuery::default()
        })?;
        rows.reverse();
        Ok(rows)
    }

    pub fn transactions_by_reference(
        &self,
        reference_type: &str,
        reference_id: &str,
    ) -> InventoryResult<Vec<InventoryTransaction>> {
        self.query(TransactionQuery {
            reference: Some((reference_type.to_string(), reference_id.to_string())),
            ..TransactionQuery::default()
        })
    }

    /// Transactions of the item dated within `[from, to]`.
    pub fn transactions_for_item_between(
        &self,
        item_id: InventoryItemId,
        from: DateTime<Utc>,
        to: DateTime<Utc>,
    ) -> InventoryResult<Vec<InventoryTransaction>> {
        if from > to {
            return Err(InventoryError::invalid_argument(format!(
                "range start {from} is after its end {to}"
            )));
        }
        self.query(TransactionQuery {
            item_id: Some(item_id),
            from: Some(from),
            to: Some(to),
            ..TransactionQuery::default()
        })
    }

    fn query(&self, query: TransactionQuery) -> InventoryResult<Vec<InventoryTransaction>> {
        self.ctx.read(|tx| tx.transactions(&query))
    }
}
