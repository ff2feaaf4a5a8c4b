//! Authoritative current/reserved stock per item row.

use rust_decimal::Decimal;
use tracing::instrument;

use stockledger_core::{Entity, InventoryError, InventoryResult, ProductId, WarehouseId};
use stockledger_events::EventBus;
use stockledger_inventory::{InventoryEvent, InventoryItem, InventoryItemId, NewInventoryItem};

use crate::services::InventoryContext;
use crate::store::{InventoryStore, InventoryTx, ItemQuery};

pub(crate) fn load_item(tx: &dyn InventoryTx, id: InventoryItemId) -> InventoryResult<InventoryItem> {
    tx.get_item(id)?
        .ok_or_else(|| InventoryError::not_found(InventoryItem::entity_name(), id))
}

/// The row holding the same product/variant as `item_id` in `warehouse_id`.
///
/// Returns the row itself when it already lives there. Rows without a product
/// link only match their own warehouse.
pub(crate) fn find_counterpart(
    tx: &dyn InventoryTx,
    item_id: InventoryItemId,
    warehouse_id: WarehouseId,
) -> InventoryResult<InventoryItem> {
    let item = load_item(tx, item_id)?;
    if item.warehouse_id == warehouse_id {
        return Ok(item);
    }

    let query = ItemQuery {
        warehouse_id: Some(warehouse_id),
        product_id: item.product_id,
        active_only: true,
    };
    let counterpart = match item.product_id {
        Some(_) => tx
            .items(&query)?
            .into_iter()
            .find(|candidate| candidate.is_counterpart_of(&item)),
        None => None,
    };
    counterpart.ok_or_else(|| {
        InventoryError::not_found(
            InventoryItem::entity_name(),
            format!("{} in warehouse {warehouse_id}", item.sku),
        )
    })
}

pub struct InventoryItemStore<S, B> {
    ctx: InventoryContext<S, B>,
}

impl<S, B> InventoryItemStore<S, B>
where
    S: InventoryStore,
    B: EventBus<InventoryEvent>,
{
    pub fn new(ctx: InventoryContext<S, B>) -> Self {
        Self { ctx }
    }

    /// Create an item row. The warehouse must exist and be active; SKUs are unique.
    #[instrument(skip(self, new), fields(sku = %new.sku))]
    pub fn create_item(&self, new: NewInventoryItem) -> InventoryResult<InventoryItem> {
        self.ctx.warehouses.require_active(new.warehouse_id)?;
        let now = self.ctx.now();

        let item = self.ctx.unit_of_work("create_item", |tx| {
            if tx.find_item_by_sku(new.sku.trim())?.is_some() {
                return Err(InventoryError::duplicate("sku", new.sku.trim()));
            }
            tx.save_item(InventoryItem::create(new.clone(), now)?)
        })?;

        tracing::info!(item_id = %item.id, warehouse_id = %item.warehouse_id, "inventory item created");
        Ok(item)
    }

    pub fn get_item(&self, id: InventoryItemId) -> InventoryResult<InventoryItem> {
        self.ctx.read(|tx| load_item(tx, id))
    }

    pub fn find_by_sku(&self, sku: &str) -> InventoryResult<InventoryItem> {
        self.ctx.read(|tx| {
            tx.find_item_by_sku(sku)?
                .ok_or_else(|| InventoryError::not_found(InventoryItem::entity_name(), sku))
        })
    }

    pub fn find_in_warehouse(
        &self,
        item_id: InventoryItemId,
        warehouse_id: WarehouseId,
    ) -> InventoryResult<InventoryItem> {
        self.ctx.read(|tx| find_counterpart(tx, item_id, warehouse_id))
    }

    pub fn list_by_warehouse(
        &self,
        warehouse_id: WarehouseId,
        active_only: bool,
    ) -> InventoryResult<Vec<InventoryItem>> {
        self.ctx.read(|tx| {
            tx.items(&ItemQuery {
                warehouse_id: Some(warehouse_id),
                active_only,
                ..ItemQuery::default()
            })
        })
    }

    pub fn list_by_product(&self, product_id: ProductId) -> InventoryResult<Vec<InventoryItem>> {
        self.ctx.read(|tx| {
            tx.items(&ItemQuery {
                product_id: Some(product_id),
                ..ItemQuery::default()
            })
        })
    }

    /// Soft delete; the row and its history stay.
    #[instrument(skip(self))]
    pub fn deactivate_item(&self, id: InventoryItemId) -> InventoryResult<InventoryItem> {
        let now = self.ctx.now();
        self.ctx.unit_of_work("deactivate_item", |tx| {
            let mut item = load_item(tx, id)?;
            item.deactivate(now);
            tx.save_item(item)
        })
    }

    #[instrument(skip(self))]
    pub fn reserve_stock(
        &self,
        id: InventoryItemId,
        quantity: Decimal,
    ) -> InventoryResult<InventoryItem> {
        let now = self.ctx.now();
        self.ctx
            .unit_of_work("reserve_stock", |tx| {
                let mut item = load_item(tx, id)?;
                item.reserve(quantity)?;
                item.touch(now);
                tx.save_item(item)
            })
            .inspect_err(|err| {
                tracing::warn!(item_id = %id, quantity = %quantity, error = %err, "reservation rejected");
            })
    }

    /// Release reserved units, clamping at zero.
    #[instrument(skip(self))]
    pub fn release_reserved_stock(
        &self,
        id: InventoryItemId,
        quantity: Decimal,
    ) -> InventoryResult<InventoryItem> {
        let now = self.ctx.now();
        let (item, excess) = self.ctx.unit_of_work("release_reserved_stock", |tx| {
            let mut item = load_item(tx, id)?;
            let excess = item.release_reserved(quantity)?;
            item.touch(now);
            Ok((tx.save_item(item)?, excess))
        })?;

        if excess > Decimal::ZERO {
            tracing::warn!(
                item_id = %id,
                requested = %quantity,
                excess = %excess,
                "release exceeded reserved stock; clamped to zero"
            );
        }
        Ok(item)
    }

    /// Assign both quantities at once; `available` follows from them.
    #[instrument(skip(self))]
    pub fn update_stock_quantities(
        &self,
        id: InventoryItemId,
        current: Decimal,
        reserved: Decimal,
    ) -> InventoryResult<InventoryItem> {
        let now = self.ctx.now();
        self.ctx.unit_of_work("update_stock_quantities", |tx| {
            let mut item = load_item(tx, id)?;
            item.update_stock_quantities(current, reserved)?;
            item.touch(now);
            tx.save_item(item)
        })
    }

    pub fn low_stock_items(
        &self,
        warehouse_id: Option<WarehouseId>,
    ) -> InventoryResult<Vec<InventoryItem>> {
        self.filtered(warehouse_id, InventoryItem::is_low_stock)
    }

    pub fn out_of_stock_items(&self) -> InventoryResult<Vec<InventoryItem>> {
        self.filtered(None, InventoryItem::is_out_of_stock)
    }

    pub fn overstock_items(&self) -> InventoryResult<Vec<InventoryItem>> {
        self.filtered(None, InventoryItem::is_over_stock)
    }

    pub fn count_low_stock_items(&self) -> InventoryResult<usize> {
        Ok(self.low_stock_items(None)?.len())
    }

    fn filtered(
        &self,
        warehouse_id: Option<WarehouseId>,
        predicate: fn(&InventoryItem) -> bool,
    ) -> InventoryResult<Vec<InventoryItem>> {
        let query = ItemQuery {
            warehouse_id,
            active_only: true,
            ..ItemQuery::default()
        };
        let items = self.ctx.read(|tx| tx.items(&query))?;
        Ok(items.into_iter().filter(|i| predicate(i)).collect())
    }
}
