//! Daily per-item, per-warehouse balance reconciliation.

use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use stockledger_core::{Entity, Versioned, WarehouseId};

use crate::arithmetic::{closing_balance, weighted_average_cost};
use crate::ids::{InventoryItemId, LedgerId};
use crate::transaction::{InventoryTransaction, TransactionType};

/// One row per (item, warehouse, day).
///
/// `closing_stock = opening_stock + inflows - outflows` after every
/// [`rebuild`](Self::rebuild).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InventoryLedger {
    pub id: LedgerId,
    pub ledger_date: NaiveDate,
    pub item_id: InventoryItemId,
    pub warehouse_id: WarehouseId,
    pub opening_stock: Decimal,
    pub stock_in: Decimal,
    pub transfer_in: Decimal,
    pub adjustment_in: Decimal,
    pub stock_out: Decimal,
    pub transfer_out: Decimal,
    pub adjustment_out: Decimal,
    pub closing_stock: Decimal,
    pub average_cost: Decimal,
    pub closing_value: Decimal,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    version: u64,
}

impl InventoryLedger {
    pub fn open(
        item_id: InventoryItemId,
        warehouse_id: WarehouseId,
        ledger_date: NaiveDate,
        opening_stock: Decimal,
        now: DateTime<Utc>,
    ) -> Self {
        Self {
            id: LedgerId::new(),
            ledger_date,
            item_id,
            warehouse_id,
            opening_stock,
            stock_in: Decimal::ZERO,
            transfer_in: Decimal::ZERO,
            adjustment_in: Decimal::ZERO,
            stock_out: Decimal::ZERO,
            transfer_out: Decimal::ZERO,
            adjustment_out: Decimal::ZERO,
            closing_stock: opening_stock,
            average_cost: Decimal::ZERO,
            closing_value: Decimal::ZERO,
            created_at: now,
            updated_at: now,
            version: 0,
        }
    }

    /// Recompute every movement bucket from scratch.
    ///
    /// Buckets are reset before folding, so rebuilding with the same
    /// transactions always yields the same row.
    pub fn rebuild<'a, I>(&mut self, transactions: I, fallback_cost: Decimal, now: DateTime<Utc>)
    where
        I: IntoIterator<Item = &'a InventoryTransaction> + Clone,
    {
        self.reset_movements();
        for txn in transactions.clone() {
            self.fold(txn);
        }
        self.average_cost = weighted_average_cost(transactions, fallback_cost);
        self.recalculate();
        self.updated_at = now;
    }

    fn reset_movements(&mut self) {
        self.stock_in = Decimal::ZERO;
        self.transfer_in = Decimal::ZERO;
        self.adjustment_in = Decimal::ZERO;
        self.stock_out = Decimal::ZERO;
        self.transfer_out = Decimal::ZERO;
        self.adjustment_out = Decimal::ZERO;
    }

    fn fold(&mut self, txn: &InventoryTransaction) {
        match txn.transaction_type {
            TransactionType::StockIn => self.stock_in += txn.quantity,
            TransactionType::StockOut => self.stock_out += txn.quantity,
            TransactionType::Transfer => {
                if txn.is_transfer_into(self.warehouse_id) {
                    self.transfer_in += txn.quantity;
                } else if txn.is_transfer_out_of(self.warehouse_id) {
                    self.transfer_out += txn.quantity;
                }
            }
            TransactionType::Adjustment | TransactionType::Count => {
                if txn.quantity > Decimal::ZERO {
                    self.adjustment_in += txn.quantity;
                } else {
                    self.adjustment_out += txn.quantity.abs();
                }
            }
        }
    }

    fn recalculate(&mut self) {
        self.closing_stock =
            closing_balance(self.opening_stock, self.total_inflows(), self.total_outflows());
        self.closing_value = self.closing_stock * self.average_cost;
    }

    pub fn total_inflows(&self) -> Decimal {
        self.stock_in + self.transfer_in + self.adjustment_in
    }

    pub fn total_outflows(&self) -> Decimal {
        self.stock_out + self.transfer_out + self.adjustment_out
    }

    pub fn net_movement(&self) -> Decimal {
        self.total_inflows() - self.total_outflows()
    }
}

impl Entity for InventoryLedger {
    type Id = LedgerId;

    fn id(&self) -> Self::Id {
        self.id
    }

    fn entity_name() -> &'static str {
        "inventory ledger"
    }
}

impl Versioned for InventoryLedger {
    fn version(&self) -> u64 {
        self.version
    }

    fn set_version(&mut self, version: u64) {
        self.version = version;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::transaction::NewTransaction;
    use proptest::prelude::*;
    use rust_decimal_macros::dec;

    fn day() -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 4, 2).unwrap()
    }

    fn txn(
        kind: TransactionType,
        warehouse: WarehouseId,
        quantity: Decimal,
        unit_cost: Decimal,
    ) -> InventoryTransaction {
        let mut new = NewTransaction::new(
            kind,
            InventoryItemId::new(),
            warehouse,
            quantity,
            Decimal::ZERO,
            Utc::now(),
        );
        new.unit_cost = unit_cost;
        InventoryTransaction::record("TXN".into(), new, Utc::now())
    }

    #[test]
    fn folds_every_transaction_type_into_its_bucket() {
        let here = WarehouseId::new();
        let there = WarehouseId::new();
        let mut inbound = txn(TransactionType::Transfer, here, dec!(4), Decimal::ZERO);
        inbound.from_warehouse_id = Some(there);
        inbound.to_warehouse_id = Some(here);
        let mut outbound = txn(TransactionType::Transfer, here, dec!(3), Decimal::ZERO);
        outbound.from_warehouse_id = Some(here);
        outbound.to_warehouse_id = Some(there);

        let txns = vec![
            txn(TransactionType::StockIn, here, dec!(10), dec!(5)),
            txn(TransactionType::StockOut, here, dec!(2), dec!(5)),
            inbound,
            outbound,
            txn(TransactionType::Adjustment, here, dec!(1), Decimal::ZERO),
            txn(TransactionType::Count, here, dec!(-6), Decimal::ZERO),
        ];

        let mut row = InventoryLedger::open(InventoryItemId::new(), here, day(), dec!(20), Utc::now());
        row.rebuild(&txns, dec!(9), Utc::now());

        assert_eq!(row.stock_in, dec!(10));
        assert_eq!(row.stock_out, dec!(2));
        assert_eq!(row.transfer_in, dec!(4));
        assert_eq!(row.transfer_out, dec!(3));
        assert_eq!(row.adjustment_in, dec!(1));
        assert_eq!(row.adjustment_out, dec!(6));
        assert_eq!(row.closing_stock, dec!(24));
        assert_eq!(row.net_movement(), dec!(4));
        assert_eq!(row.average_cost, dec!(5.00));
        assert_eq!(row.closing_value, dec!(120.00));
    }

    #[test]
    fn empty_day_carries_opening_balance() {
        let mut row =
            InventoryLedger::open(InventoryItemId::new(), WarehouseId::new(), day(), dec!(15), Utc::now());
        row.rebuild(&Vec::<InventoryTransaction>::new(), dec!(3.25), Utc::now());

        assert_eq!(row.closing_stock, row.opening_stock);
        assert_eq!(row.closing_value, row.opening_stock * row.average_cost);
        assert_eq!(row.closing_value, dec!(48.75));
    }

    proptest! {
        #![proptest_config(ProptestConfig {
            cases: 64,
            ..ProptestConfig::default()
        })]

        #[test]
        fn rebuilding_twice_never_double_counts(
            opening in 0i64..500,
            moves in prop::collection::vec((0usize..4, 1i64..50), 0..20),
        ) {
            let here = WarehouseId::new();
            let txns: Vec<_> = moves
                .into_iter()
                .map(|(kind, qty)| {
                    let qty = Decimal::from(qty);
                    match kind {
                        0 => txn(TransactionType::StockIn, here, qty, dec!(2)),
                        1 => txn(TransactionType::StockOut, here, qty, Decimal::ZERO),
                        2 => txn(TransactionType::Adjustment, here, qty, Decimal::ZERO),
                        _ => txn(TransactionType::Count, here, -qty, Decimal::ZERO),
                    }
                })
                .collect();

            let mut row = InventoryLedger::open(
                InventoryItemId::new(), here, day(), Decimal::from(opening), Utc::now(),
            );
            let now = Utc::now();
            row.rebuild(&txns, dec!(1), now);
            let first = row.clone();
            row.rebuild(&txns, dec!(1), now);

            prop_assert_eq!(&row, &first);
            prop_assert_eq!(
                row.closing_stock,
                row.opening_stock + row.total_inflows() - row.total_outflows()
            );
        }
    }
}
