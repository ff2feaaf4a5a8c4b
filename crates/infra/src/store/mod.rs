//! Persistence abstraction for the inventory core.
//!
//! Each entity has a repository trait with the query shapes the services need.
//! [`InventoryStore`] hands out a transaction view implementing all of them;
//! everything done inside one [`InventoryStore::write`] call commits together
//! or not at all.

use std::sync::Arc;

use chrono::{DateTime, NaiveDate, Utc};

use stockledger_core::{CustomerId, InventoryResult, ProductId, WarehouseId};
use stockledger_inventory::{
    BatchId, InventoryBatch, InventoryItem, InventoryItemId, InventoryLedger, InventorySerial,
    InventoryTransaction, SerialId, SerialStatus, TransactionId,
};

pub mod in_memory;

pub use in_memory::InMemoryInventoryStore;

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ItemQuery {
    pub warehouse_id: Option<WarehouseId>,
    pub product_id: Option<ProductId>,
    pub active_only: bool,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BatchQuery {
    pub item_id: Option<InventoryItemId>,
    pub warehouse_id: Option<WarehouseId>,
    pub active_only: bool,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SerialQuery {
    pub item_id: Option<InventoryItemId>,
    pub warehouse_id: Option<WarehouseId>,
    pub status: Option<SerialStatus>,
    pub customer_id: Option<CustomerId>,
}

/// Transactions matching every set field. `from`/`to` bound `transaction_date`
/// inclusively.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TransactionQuery {
    pub item_id: Option<InventoryItemId>,
    pub warehouse_id: Option<WarehouseId>,
    pub from: Option<DateTime<Utc>>,
    pub to: Option<DateTime<Utc>>,
    pub reference: Option<(String, String)>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LedgerQuery {
    pub item_id: Option<InventoryItemId>,
    pub warehouse_id: Option<WarehouseId>,
    pub from: Option<NaiveDate>,
    pub to: Option<NaiveDate>,
}

/// Saves of mutable rows are optimistic: the row's version must match the
/// stored one, and the returned row carries the bumped version.
pub trait ItemRepository {
    fn get_item(&self, id: InventoryItemId) -> InventoryResult<Option<InventoryItem>>;

    fn find_item_by_sku(&self, sku: &str) -> InventoryResult<Option<InventoryItem>>;

    fn items(&self, query: &ItemQuery) -> InventoryResult<Vec<InventoryItem>>;

    /// Rejects a SKU already used by another row with `DuplicateKey`.
    fn save_item(&mut self, item: InventoryItem) -> InventoryResult<InventoryItem>;
}

pub trait BatchRepository {
    fn get_batch(&self, id: BatchId) -> InventoryResult<Option<InventoryBatch>>;

    fn find_batch_by_number(
        &self,
        item_id: InventoryItemId,
        warehouse_id: WarehouseId,
        batch_number: &str,
    ) -> InventoryResult<Option<InventoryBatch>>;

    fn batches(&self, query: &BatchQuery) -> InventoryResult<Vec<InventoryBatch>>;

    /// Batch numbers are unique per (item, warehouse).
    fn save_batch(&mut self, batch: InventoryBatch) -> InventoryResult<InventoryBatch>;
}

pub trait SerialRepository {
    fn get_serial(&self, id: SerialId) -> InventoryResult<Option<InventorySerial>>;

    fn find_serial_by_number(&self, serial_number: &str)
    -> InventoryResult<Option<InventorySerial>>;

    fn serials(&self, query: &SerialQuery) -> InventoryResult<Vec<InventorySerial>>;

    /// Serial numbers are globally unique.
    fn save_serial(&mut self, serial: InventorySerial) -> InventoryResult<InventorySerial>;

    fn delete_serial(&mut self, id: SerialId) -> InventoryResult<()>;
}

pub trait TransactionRepository {
    fn get_transaction(&self, id: TransactionId) -> InventoryResult<Option<InventoryTransaction>>;

    fn find_transaction_by_number(&self, number: &str)
    -> InventoryResult<Option<InventoryTransaction>>;

    /// Matching transactions ordered by `transaction_date`, oldest first.
    fn transactions(&self, query: &TransactionQuery) -> InventoryResult<Vec<InventoryTransaction>>;

    /// Next free sequence number for transactions created on `day`.
    ///
    /// The counter is seeded from the rows already created that day and skips
    /// numbers that are taken.
    fn next_transaction_sequence(&mut self, day: NaiveDate) -> InventoryResult<u32>;

    /// Append-only; a reused id or number is `DuplicateKey`.
    fn insert_transaction(&mut self, transaction: InventoryTransaction) -> InventoryResult<()>;
}

pub trait LedgerRepository {
    fn get_ledger(
        &self,
        item_id: InventoryItemId,
        warehouse_id: WarehouseId,
        date: NaiveDate,
    ) -> InventoryResult<Option<InventoryLedger>>;

    /// Most recent row strictly before `date`.
    fn latest_ledger_before(
        &self,
        item_id: InventoryItemId,
        warehouse_id: WarehouseId,
        date: NaiveDate,
    ) -> InventoryResult<Option<InventoryLedger>>;

    /// Matching rows ordered by date.
    fn ledgers(&self, query: &LedgerQuery) -> InventoryResult<Vec<InventoryLedger>>;

    /// Upsert by (item, warehouse, date).
    fn save_ledger(&mut self, ledger: InventoryLedger) -> InventoryResult<InventoryLedger>;
}

/// Transaction view over every repository.
pub trait InventoryTx:
    ItemRepository + BatchRepository + SerialRepository + TransactionRepository + LedgerRepository
{
}

impl<T> InventoryTx for T where
    T: ItemRepository + BatchRepository + SerialRepository + TransactionRepository + LedgerRepository
{
}

/// Unit-of-work boundary.
pub trait InventoryStore: Send + Sync {
    /// Run `f` against a consistent snapshot.
    fn read<T>(&self, f: impl FnOnce(&dyn InventoryTx) -> InventoryResult<T>) -> InventoryResult<T>;

    /// Run `f` atomically: its writes are committed only if it returns `Ok`.
    fn write<T>(
        &self,
        f: impl FnOnce(&mut dyn InventoryTx) -> InventoryResult<T>,
    ) -> InventoryResult<T>;
}

impl<S> InventoryStore for Arc<S>
where
    S: InventoryStore,
{
    fn read<T>(&self, f: impl FnOnce(&dyn InventoryTx) -> InventoryResult<T>) -> InventoryResult<T> {
        (**self).read(f)
    }

    fn write<T>(
        &self,
        f: impl FnOnce(&mut dyn InventoryTx) -> InventoryResult<T>,
    ) -> InventoryResult<T> {
        (**self).write(f)
    }
}
