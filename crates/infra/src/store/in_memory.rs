use std::collections::{BTreeMap, HashMap};
use std::sync::RwLock;

use chrono::NaiveDate;

use stockledger_core::{
    Entity, ExpectedVersion, InventoryError, InventoryResult, Versioned, WarehouseId,
};
use stockledger_inventory::transaction::{parse_sequence, transaction_number};
use stockledger_inventory::{
    BatchId, InventoryBatch, InventoryItem, InventoryItemId, InventoryLedger, InventorySerial,
    InventoryTransaction, SerialId, TransactionId,
};

use super::{
    BatchQuery, BatchRepository, InventoryStore, InventoryTx, ItemQuery, ItemRepository,
    LedgerQuery, LedgerRepository, SerialQuery, SerialRepository, TransactionQuery,
    TransactionRepository,
};

type LedgerKey = (InventoryItemId, WarehouseId, NaiveDate);

#[derive(Debug, Clone, Default)]
struct State {
    items: HashMap<InventoryItemId, InventoryItem>,
    batches: HashMap<BatchId, InventoryBatch>,
    serials: HashMap<SerialId, InventorySerial>,
    transactions: HashMap<TransactionId, InventoryTransaction>,
    transaction_numbers: HashMap<String, TransactionId>,
    day_counters: HashMap<NaiveDate, u32>,
    ledgers: BTreeMap<LedgerKey, InventoryLedger>,
}

/// In-memory inventory store.
///
/// Intended for tests/dev. Writers are serialised by the lock and run against
/// a private copy of the state that replaces the shared one only on success,
/// so a failed unit of work leaves nothing behind.
#[derive(Debug, Default)]
pub struct InMemoryInventoryStore {
    state: RwLock<State>,
}

impl InMemoryInventoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl InventoryStore for InMemoryInventoryStore {
    fn read<T>(&self, f: impl FnOnce(&dyn InventoryTx) -> InventoryResult<T>) -> InventoryResult<T> {
        let state = self
            .state
            .read()
            .map_err(|_| InventoryError::storage("lock poisoned"))?;
        f(&*state)
    }

    fn write<T>(
        &self,
        f: impl FnOnce(&mut dyn InventoryTx) -> InventoryResult<T>,
    ) -> InventoryResult<T> {
        let mut state = self
            .state
            .write()
            .map_err(|_| InventoryError::storage("lock poisoned"))?;
        let mut draft = state.clone();
        let out = f(&mut draft)?;
        *state = draft;
        Ok(out)
    }
}

/// Optimistic save shared by every mutable row type.
fn save_versioned<E>(rows: &mut HashMap<E::Id, E>, mut row: E) -> InventoryResult<E>
where
    E: Entity + Versioned + Clone,
{
    let stored = rows.get(&row.id()).map(|r| r.version()).unwrap_or(0);
    ExpectedVersion::Exact(row.version()).check(stored)?;
    row.set_version(stored + 1);
    rows.insert(row.id(), row.clone());
    Ok(row)
}

fn sorted<T, K: Ord>(mut rows: Vec<T>, key: impl Fn(&T) -> K) -> Vec<T> {
    rows.sort_by_key(|r| key(r));
    rows
}

impl ItemRepository for State {
    fn get_item(&self, id: InventoryItemId) -> InventoryResult<Option<InventoryItem>> {
        Ok(self.items.get(&id).cloned())
    }

    fn find_item_by_sku(&self, sku: &str) -> InventoryResult<Option<InventoryItem>> {
        Ok(self.items.values().find(|i| i.sku == sku).cloned())
    }

    fn items(&self, query: &ItemQuery) -> InventoryResult<Vec<InventoryItem>> {
        let rows = self
            .items
            .values()
            .filter(|i| query.warehouse_id.is_none_or(|w| i.warehouse_id == w))
            .filter(|i| query.product_id.is_none_or(|p| i.product_id == Some(p)))
            .filter(|i| !query.active_only || i.is_active)
            .cloned()
            .collect();
        Ok(sorted(rows, |i| i.sku.clone()))
    }

    fn save_item(&mut self, item: InventoryItem) -> InventoryResult<InventoryItem> {
        if self.items.values().any(|i| i.sku == item.sku && i.id != item.id) {
            return Err(InventoryError::duplicate("sku", &item.sku));
        }
        save_versioned(&mut self.items, item)
    }
}

impl BatchRepository for State {
    fn get_batch(&self, id: BatchId) -> InventoryResult<Option<InventoryBatch>> {
        Ok(self.batches.get(&id).cloned())
    }

    fn find_batch_by_number(
        &self,
        item_id: InventoryItemId,
        warehouse_id: WarehouseId,
        batch_number: &str,
    ) -> InventoryResult<Option<InventoryBatch>> {
        Ok(self
            .batches
            .values()
            .find(|b| {
                b.item_id == item_id && b.warehouse_id == warehouse_id && b.batch_number == batch_number
            })
            .cloned())
    }

    fn batches(&self, query: &BatchQuery) -> InventoryResult<Vec<InventoryBatch>> {
        let rows = self
            .batches
            .values()
            .filter(|b| query.item_id.is_none_or(|i| b.item_id == i))
            .filter(|b| query.warehouse_id.is_none_or(|w| b.warehouse_id == w))
            .filter(|b| !query.active_only || b.is_active)
            .cloned()
            .collect();
        Ok(sorted(rows, |b| (b.received_date, b.created_at, b.batch_number.clone())))
    }

    fn save_batch(&mut self, batch: InventoryBatch) -> InventoryResult<InventoryBatch> {
        let clash = self.batches.values().any(|b| {
            b.id != batch.id
                && b.item_id == batch.item_id
                && b.warehouse_id == batch.warehouse_id
                && b.batch_number == batch.batch_number
        });
        if clash {
            return Err(InventoryError::duplicate("batch number", &batch.batch_number));
        }
        save_versioned(&mut self.batches, batch)
    }
}

impl SerialRepository for State {
    fn get_serial(&self, id: SerialId) -> InventoryResult<Option<InventorySerial>> {
        Ok(self.serials.get(&id).cloned())
    }

    fn find_serial_by_number(
        &self,
        serial_number: &str,
    ) -> InventoryResult<Option<InventorySerial>> {
        Ok(self
            .serials
            .values()
            .find(|s| s.serial_number == serial_number)
            .cloned())
    }

    fn serials(&self, query: &SerialQuery) -> InventoryResult<Vec<InventorySerial>> {
        let rows = self
            .serials
            .values()
            .filter(|s| query.item_id.is_none_or(|i| s.item_id == i))
            .filter(|s| query.warehouse_id.is_none_or(|w| s.warehouse_id == w))
            .filter(|s| query.status.is_none_or(|st| s.status() == st))
            .filter(|s| query.customer_id.is_none_or(|c| s.customer_id == Some(c)))
            .cloned()
            .collect();
        Ok(sorted(rows, |s| (s.received_date, s.created_at, s.serial_number.clone())))
    }

    fn save_serial(&mut self, serial: InventorySerial) -> InventoryResult<InventorySerial> {
        let clash = self
            .serials
            .values()
            .any(|s| s.id != serial.id && s.serial_number == serial.serial_number);
        if clash {
            return Err(InventoryError::duplicate("serial number", &serial.serial_number));
        }
        save_versioned(&mut self.serials, serial)
    }

    fn delete_serial(&mut self, id: SerialId) -> InventoryResult<()> {
        self.serials
            .remove(&id)
            .map(|_| ())
            .ok_or_else(|| InventoryError::not_found(InventorySerial::entity_name(), id))
    }
}

impl TransactionRepository for State {
    fn get_transaction(&self, id: TransactionId) -> InventoryResult<Option<InventoryTransaction>> {
        Ok(self.transactions.get(&id).cloned())
    }

    fn find_transaction_by_number(
        &self,
        number: &str,
    ) -> InventoryResult<Option<InventoryTransaction>> {
        Ok(self
            .transaction_numbers
            .get(number)
            .and_then(|id| self.transactions.get(id))
            .cloned())
    }

    fn transactions(&self, query: &TransactionQuery) -> InventoryResult<Vec<InventoryTransaction>> {
        let rows = self
            .transactions
            .values()
            .filter(|t| query.item_id.is_none_or(|i| t.item_id == i))
            .filter(|t| query.warehouse_id.is_none_or(|w| t.warehouse_id == w))
            .filter(|t| query.from.is_none_or(|from| t.transaction_date >= from))
            .filter(|t| query.to.is_none_or(|to| t.transaction_date <= to))
            .filter(|t| {
                query.reference.as_ref().is_none_or(|(kind, id)| {
                    t.reference.as_ref().is_some_and(|r| r.matches(kind, id))
                })
            })
            .cloned()
            .collect();
        Ok(sorted(rows, |t| (t.transaction_date, t.transaction_number.clone())))
    }

    fn next_transaction_sequence(&mut self, day: NaiveDate) -> InventoryResult<u32> {
        let transactions = &self.transactions;
        let counter = self.day_counters.entry(day).or_insert_with(|| {
            let issued = transactions
                .values()
                .filter(|t| t.created_at.date_naive() == day)
                .count();
            u32::try_from(issued).unwrap_or(u32::MAX)
        });
        loop {
            *counter = counter.checked_add(1).ok_or_else(|| {
                InventoryError::storage(format!("transaction sequence exhausted for {day}"))
            })?;
            if !self.transaction_numbers.contains_key(&transaction_number(day, *counter)) {
                return Ok(*counter);
            }
        }
    }

    fn insert_transaction(&mut self, transaction: InventoryTransaction) -> InventoryResult<()> {
        if self.transactions.contains_key(&transaction.id)
            || self.transaction_numbers.contains_key(&transaction.transaction_number)
        {
            return Err(InventoryError::duplicate(
                "transaction number",
                &transaction.transaction_number,
            ));
        }
        // Keep the counter ahead of numbers inserted from outside the sequence.
        let day = transaction.created_at.date_naive();
        if let Some(seq) = parse_sequence(&transaction.transaction_number, day) {
            let counter = self.day_counters.entry(day).or_insert(0);
            *counter = (*counter).max(seq);
        }
        self.transaction_numbers
            .insert(transaction.transaction_number.clone(), transaction.id);
        self.transactions.insert(transaction.id, transaction);
        Ok(())
    }
}

impl LedgerRepository for State {
    fn get_ledger(
        &self,
        item_id: InventoryItemId,
        warehouse_id: WarehouseId,
        date: NaiveDate,
    ) -> InventoryResult<Option<InventoryLedger>> {
        Ok(self.ledgers.get(&(item_id, warehouse_id, date)).cloned())
    }

    fn latest_ledger_before(
        &self,
        item_id: InventoryItemId,
        warehouse_id: WarehouseId,
        date: NaiveDate,
    ) -> InventoryResult<Option<InventoryLedger>> {
        Ok(self
            .ledgers
            .range((item_id, warehouse_id, NaiveDate::MIN)..(item_id, warehouse_id, date))
            .next_back()
            .map(|(_, row)| row.clone()))
    }

    fn ledgers(&self, query: &LedgerQuery) -> InventoryResult<Vec<InventoryLedger>> {
        let rows = self
            .ledgers
            .values()
            .filter(|l| query.item_id.is_none_or(|i| l.item_id == i))
            .filter(|l| query.warehouse_id.is_none_or(|w| l.warehouse_id == w))
            .filter(|l| query.from.is_none_or(|from| l.ledger_date >= from))
            .filter(|l| query.to.is_none_or(|to| l.ledger_date <= to))
            .cloned()
            .collect();
        Ok(sorted(rows, |l| (l.ledger_date, l.item_id, l.warehouse_id)))
    }

    fn save_ledger(&mut self, mut ledger: InventoryLedger) -> InventoryResult<InventoryLedger> {
        let key = (ledger.item_id, ledger.warehouse_id, ledger.ledger_date);
        let stored = match self.ledgers.get(&key) {
            Some(existing) if existing.id != ledger.id => {
                return Err(InventoryError::duplicate(
                    "inventory ledger",
                    format!("{}/{}/{}", key.0, key.1, key.2),
                ));
            }
            Some(existing) => existing.version(),
            None => 0,
        };
        ExpectedVersion::Exact(ledger.version()).check(stored)?;
        ledger.set_version(stored + 1);
        self.ledgers.insert(key, ledger.clone());
        Ok(ledger)
    }
}
