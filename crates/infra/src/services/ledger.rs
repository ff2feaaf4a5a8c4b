//! Daily ledger generation and the queries over it.

use std::collections::BTreeMap;

use chrono::{DateTime, Days, NaiveDate, NaiveTime, Utc};
use rust_decimal::Decimal;
use tracing::instrument;

use stockledger_core::{Entity, InventoryError, InventoryResult, WarehouseId};
use stockledger_events::EventBus;
use stockledger_inventory::{
    InventoryEvent, InventoryItemId, InventoryLedger, InventoryTransaction,
};

use crate::services::InventoryContext;
use crate::services::items::load_item;
use crate::store::{InventoryStore, InventoryTx, LedgerQuery, TransactionQuery};

/// Write the ledger row for one (item, warehouse, day).
///
/// An existing row keeps its opening balance; a new one opens with the closing
/// balance of the latest earlier row, or zero.
pub(crate) fn generate_entry_in_tx(
    tx: &mut dyn InventoryTx,
    item_id: InventoryItemId,
    warehouse_id: WarehouseId,
    date: NaiveDate,
    transactions: &[InventoryTransaction],
    now: DateTime<Utc>,
) -> InventoryResult<InventoryLedger> {
    let item = load_item(tx, item_id)?;
    let mut ledger = match tx.get_ledger(item_id, warehouse_id, date)? {
        Some(existing) => existing,
        None => {
            let opening = tx
                .latest_ledger_before(item_id, warehouse_id, date)?
                .map_or(Decimal::ZERO, |previous| previous.closing_stock);
            InventoryLedger::open(item_id, warehouse_id, date, opening, now)
        }
    };
    ledger.rebuild(transactions, item.cost_price, now);
    tx.save_ledger(ledger)
}

fn day_bounds(date: NaiveDate) -> TransactionQuery {
    let start = date.and_time(NaiveTime::MIN).and_utc();
    let end = date
        .and_hms_nano_opt(23, 59, 59, 999_999_999)
        .map(|end| end.and_utc())
        .unwrap_or(start);
    TransactionQuery {
        from: Some(start),
        to: Some(end),
        ..TransactionQuery::default()
    }
}

pub struct LedgerGenerator<S, B> {
    ctx: InventoryContext<S, B>,
}

impl<S, B> LedgerGenerator<S, B>
where
    S: InventoryStore,
    B: EventBus<InventoryEvent>,
{
    pub fn new(ctx: InventoryContext<S, B>) -> Self {
        Self { ctx }
    }

    /// Rebuild one row from the given day's transactions. Rerunning with the
    /// same transactions rewrites the same row.
    #[instrument(skip(self, transactions), fields(count = transactions.len()))]
    pub fn generate_ledger_entry(
        &self,
        item_id: InventoryItemId,
        warehouse_id: WarehouseId,
        date: NaiveDate,
        transactions: &[InventoryTransaction],
    ) -> InventoryResult<InventoryLedger> {
        let now = self.ctx.now();
        self.ctx.unit_of_work("generate_ledger_entry", |tx| {
            generate_entry_in_tx(tx, item_id, warehouse_id, date, transactions, now)
        })
    }

    /// One row per (item, warehouse) that moved on `date`. Returns the rows written.
    #[instrument(skip(self))]
    pub fn generate_daily_ledger_for_date(&self, date: NaiveDate) -> InventoryResult<usize> {
        let now = self.ctx.now();
        let query = day_bounds(date);
        let written = self.ctx.unit_of_work("generate_daily_ledger", |tx| {
            let mut groups: BTreeMap<(InventoryItemId, WarehouseId), Vec<InventoryTransaction>> =
                BTreeMap::new();
            for txn in tx.transactions(&query)? {
                groups
                    .entry((txn.item_id, txn.warehouse_id))
                    .or_default()
                    .push(txn);
            }
            for ((item_id, warehouse_id), transactions) in &groups {
                generate_entry_in_tx(tx, *item_id, *warehouse_id, date, transactions, now)?;
            }
            Ok(groups.len())
        })?;
        tracing::info!(%date, rows = written, "daily ledger generated");
        Ok(written)
    }

    /// Day-by-day backfill, oldest first, so each day opens from its predecessor.
    #[instrument(skip(self))]
    pub fn generate_ledger_for_date_range(
        &self,
        start: NaiveDate,
        end: NaiveDate,
    ) -> InventoryResult<usize> {
        if start > end {
            return Err(InventoryError::invalid_argument(format!(
                "ledger range start {start} is after its end {end}"
            )));
        }
        let mut written = 0;
        for date in start.iter_days().take_while(|d| *d <= end) {
            written += self.generate_daily_ledger_for_date(date)?;
        }
        tracing::info!(%start, %end, rows = written, "ledger backfill finished");
        Ok(written)
    }

    /// Ledger for yesterday according to the injected clock.
    pub fn generate_for_previous_day(&self) -> InventoryResult<usize> {
        let today = self.ctx.clock.today();
        let yesterday = today
            .checked_sub_days(Days::new(1))
            .ok_or_else(|| InventoryError::invalid_argument(format!("no day before {today}")))?;
        self.generate_daily_ledger_for_date(yesterday)
    }

    pub fn get_ledger(
        &self,
        item_id: InventoryItemId,
        warehouse_id: WarehouseId,
        date: NaiveDate,
    ) -> InventoryResult<InventoryLedger> {
        self.ctx.read(|tx| {
            tx.get_ledger(item_id, warehouse_id, date)?.ok_or_else(|| {
                InventoryError::not_found(
                    InventoryLedger::entity_name(),
                    format!("{item_id}/{warehouse_id}/{date}"),
                )
            })
        })
    }

    pub fn ledgers_between(
        &self,
        item_id: InventoryItemId,
        warehouse_id: WarehouseId,
        from: NaiveDate,
        to: NaiveDate,
    ) -> InventoryResult<Vec<InventoryLedger>> {
        self.query(LedgerQuery {
            item_id: Some(item_id),
            warehouse_id: Some(warehouse_id),
            from: Some(from),
            to: Some(to),
        })
    }

    pub fn warehouse_ledger(
        &self,
        warehouse_id: WarehouseId,
        date: NaiveDate,
    ) -> InventoryResult<Vec<InventoryLedger>> {
        self.query(LedgerQuery {
            warehouse_id: Some(warehouse_id),
            from: Some(date),
            to: Some(date),
            ..LedgerQuery::default()
        })
    }

    pub fn daily_ledger(&self, date: NaiveDate) -> InventoryResult<Vec<InventoryLedger>> {
        self.query(LedgerQuery {
            from: Some(date),
            to: Some(date),
            ..LedgerQuery::default()
        })
    }

    /// Rows for `date` with any in or out movement.
    pub fn items_with_movement(&self, date: NaiveDate) -> InventoryResult<Vec<InventoryLedger>> {
        let rows = self.daily_ledger(date)?;
        Ok(rows
            .into_iter()
            .filter(|l| !l.total_inflows().is_zero() || !l.total_outflows().is_zero())
            .collect())
    }

    pub fn warehouse_stock_value(
        &self,
        warehouse_id: WarehouseId,
        date: NaiveDate,
    ) -> InventoryResult<Decimal> {
        let rows = self.warehouse_ledger(warehouse_id, date)?;
        Ok(rows.iter().map(|l| l.closing_value).sum())
    }

    pub fn warehouse_stock_quantity(
        &self,
        warehouse_id: WarehouseId,
        date: NaiveDate,
    ) -> InventoryResult<Decimal> {
        let rows = self.warehouse_ledger(warehouse_id, date)?;
        Ok(rows.iter().map(|l| l.closing_stock).sum())
    }

    fn query(&self, query: LedgerQuery) -> InventoryResult<Vec<InventoryLedger>> {
        self.ctx.read(|tx| tx.ledgers(&query))
    }
}
