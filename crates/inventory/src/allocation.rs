//! Strategy-driven batch allocation.
//!
//! Allocation runs in two passes: a dry-run plan over the ordered candidates,
//! then application of the plan. A shortfall is detected in the first pass, so
//! a failed allocation never leaves a batch partially drawn.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use stockledger_core::{Entity, InventoryError, InventoryResult};

use crate::batch::InventoryBatch;
use crate::ids::BatchId;
use crate::item::ensure_positive;
use crate::strategy::ConsumptionStrategy;

/// Quantity drawn from one batch.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BatchAllocation {
    pub batch_id: BatchId,
    pub batch_number: String,
    pub quantity: Decimal,
}

/// What an allocation does to the chosen batches.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum AllocationMode {
    /// available -> gone
    Consume,
    /// available -> reserved
    Reserve,
}

/// Greedy plan over batches already in allocation order.
///
/// Batches that are not candidates (inactive, expired, empty) are skipped.
pub fn plan_allocation(
    ordered: &[InventoryBatch],
    requested: Decimal,
    subject: &str,
) -> InventoryResult<Vec<BatchAllocation>> {
    ensure_positive("allocation quantity", requested)?;

    let mut remaining = requested;
    let mut plan = Vec::new();
    for batch in ordered.iter().filter(|b| b.has_available_stock()) {
        if remaining.is_zero() {
            break;
        }
        let take = remaining.min(batch.available_quantity());
        plan.push(BatchAllocation {
            batch_id: batch.id,
            batch_number: batch.batch_number.clone(),
            quantity: take,
        });
        remaining -= take;
    }

    if remaining > Decimal::ZERO {
        return Err(InventoryError::insufficient(
            subject,
            requested,
            requested - remaining,
        ));
    }
    Ok(plan)
}

/// Order `candidates` by `strategy`, plan, and apply the plan.
///
/// On error no batch has been modified. On success only the batches named in
/// the returned allocations have changed.
pub fn allocate(
    candidates: &mut [InventoryBatch],
    requested: Decimal,
    strategy: ConsumptionStrategy,
    mode: AllocationMode,
    subject: &str,
) -> InventoryResult<Vec<BatchAllocation>> {
    strategy.sort(candidates);
    let plan = plan_allocation(candidates, requested, subject)?;

    for entry in &plan {
        let batch = candidates
            .iter_mut()
            .find(|b| b.id == entry.batch_id)
            .ok_or_else(|| InventoryError::not_found(InventoryBatch::entity_name(), entry.batch_id))?;
        match mode {
            AllocationMode::Consume => batch.consume(entry.quantity)?,
            AllocationMode::Reserve => batch.reserve(entry.quantity)?,
        }
    }
    Ok(plan)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::batch::NewBatch;
    use crate::ids::InventoryItemId;
    use chrono::{DateTime, TimeZone, Utc};
    use proptest::prelude::*;
    use rust_decimal_macros::dec;
    use stockledger_core::{ErrorKind, WarehouseId};

    fn day(d: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 1, d, 0, 0, 0).unwrap()
    }

    fn batches(quantities: &[u32]) -> Vec<InventoryBatch> {
        let item = InventoryItemId::new();
        let warehouse = WarehouseId::new();
        quantities
            .iter()
            .enumerate()
            .map(|(i, q)| {
                let mut new = NewBatch::new(item, warehouse, format!("B-{i}"), Decimal::from(*q));
                new.received_date = Some(day(i as u32 + 1));
                InventoryBatch::create(new, day(1)).unwrap()
            })
            .collect()
    }

    #[test]
    fn fifo_consumes_oldest_first_and_splits_across_batches() {
        let mut list = batches(&[5, 10, 10]);
        let plan = allocate(&mut list, dec!(12), ConsumptionStrategy::Fifo, AllocationMode::Consume, "SKU")
            .unwrap();

        let drawn: Vec<_> = plan.iter().map(|a| (a.batch_number.as_str(), a.quantity)).collect();
        assert_eq!(drawn, [("B-0", dec!(5)), ("B-1", dec!(7))]);
        assert_eq!(list[0].available_quantity(), Decimal::ZERO);
        assert_eq!(list[1].available_quantity(), dec!(3));
        assert_eq!(list[2].available_quantity(), dec!(10));
    }

    #[test]
    fn reserve_mode_moves_quantity_to_reserved() {
        let mut list = batches(&[4, 4]);
        allocate(&mut list, dec!(6), ConsumptionStrategy::Lifo, AllocationMode::Reserve, "SKU").unwrap();

        // LIFO: B-1 (newest) first.
        assert_eq!(list[0].batch_number, "B-1");
        assert_eq!(list[0].reserved_quantity(), dec!(4));
        assert_eq!(list[1].reserved_quantity(), dec!(2));
        assert_eq!(list[1].available_quantity(), dec!(2));
    }

    #[test]
    fn expired_and_inactive_batches_are_skipped() {
        let mut list = batches(&[5, 5, 5]);
        list[0].is_expired = true;
        list[1].is_active = false;
        let plan = allocate(&mut list, dec!(5), ConsumptionStrategy::Fifo, AllocationMode::Consume, "SKU")
            .unwrap();
        assert_eq!(plan.len(), 1);
        assert_eq!(plan[0].batch_number, "B-2");
    }

    #[test]
    fn shortfall_reports_satisfied_quantity() {
        let mut list = batches(&[3, 4]);
        let err = allocate(&mut list, dec!(10), ConsumptionStrategy::Fifo, AllocationMode::Consume, "SKU")
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InsufficientStock);
        assert_eq!(err, InventoryError::insufficient("SKU", dec!(10), dec!(7)));
    }

    proptest! {
        #![proptest_config(ProptestConfig {
            cases: 128,
            ..ProptestConfig::default()
        })]

        #[test]
        fn failed_allocation_leaves_batches_untouched(
            quantities in prop::collection::vec(1u32..50, 1..6),
            extra in 1u32..20,
        ) {
            let mut list = batches(&quantities);
            let before: Vec<_> = list.iter().map(|b| (b.id, b.available_quantity())).collect();
            let total: u32 = quantities.iter().sum();

            let result = allocate(
                &mut list,
                Decimal::from(total + extra),
                ConsumptionStrategy::Fefo,
                AllocationMode::Consume,
                "SKU",
            );
            prop_assert!(result.is_err());
            for (id, available) in before {
                let batch = list.iter().find(|b| b.id == id).unwrap();
                prop_assert_eq!(batch.available_quantity(), available);
            }
        }

        #[test]
        fn successful_allocation_draws_exactly_the_request(
            quantities in prop::collection::vec(1u32..50, 1..6),
            pick in 1u32..50,
        ) {
            let total: u32 = quantities.iter().sum();
            prop_assume!(pick <= total);
            let mut list = batches(&quantities);

            let plan = allocate(
                &mut list,
                Decimal::from(pick),
                ConsumptionStrategy::Fifo,
                AllocationMode::Consume,
                "SKU",
            ).unwrap();
            let drawn: Decimal = plan.iter().map(|a| a.quantity).sum();
            prop_assert_eq!(drawn, Decimal::from(pick));

            let left: Decimal = list.iter().map(|b| b.available_quantity()).sum();
            prop_assert_eq!(left, Decimal::from(total - pick));
        }
    }
}
