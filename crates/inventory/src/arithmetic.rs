//! Balance and costing math shared by the ledger and the services.

use rust_decimal::{Decimal, RoundingStrategy};

use crate::transaction::{InventoryTransaction, TransactionType};

/// Money scale used for ledger costs.
pub const COST_SCALE: u32 = 2;

/// Round to two decimals, halves away from zero.
pub fn round_cost(value: Decimal) -> Decimal {
    value.round_dp_with_strategy(COST_SCALE, RoundingStrategy::MidpointAwayFromZero)
}

pub fn closing_balance(opening: Decimal, inflows: Decimal, outflows: Decimal) -> Decimal {
    opening + inflows - outflows
}

/// Weighted average unit cost over the costed receipts in `transactions`.
///
/// Only STOCK_IN rows with a positive unit cost count. Without any, the
/// `fallback` (the item's current cost price) is used.
pub fn weighted_average_cost<'a, I>(transactions: I, fallback: Decimal) -> Decimal
where
    I: IntoIterator<Item = &'a InventoryTransaction>,
{
    let (value, quantity) = transactions
        .into_iter()
        .filter(|t| t.transaction_type == TransactionType::StockIn && t.unit_cost > Decimal::ZERO)
        .fold((Decimal::ZERO, Decimal::ZERO), |(value, quantity), t| {
            (value + t.total_cost, quantity + t.quantity)
        });

    if quantity > Decimal::ZERO {
        round_cost(value / quantity)
    } else {
        round_cost(fallback)
    }
}
