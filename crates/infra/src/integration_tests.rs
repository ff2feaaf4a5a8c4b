//! Integration tests for the inventory services.
//!
//! Tests: request → unit of work → store → committed events
//!
//! Verifies:
//! - Balances, batches and serials move together or not at all
//! - Transaction rows and ledger rows agree with the balances
//! - Events are published only for committed work

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use chrono::{DateTime, Duration, NaiveDate, TimeZone, Utc};
    use rust_decimal::Decimal;
    use rust_decimal_macros::dec;

    use stockledger_core::{ErrorKind, FixedClock, InventoryError, ProductId};
    use stockledger_events::{Event, EventBus, InMemoryEventBus, Subscription};
    use stockledger_inventory::{
        BatchId, ConsumptionStrategy, DocumentRef, InventoryEvent, InventoryItem, NewBatch,
        NewInventoryItem, NewSerial, SerialStatus, TrackingFlags, TransactionType,
    };

    use crate::collaborators::{InMemoryWarehouseDirectory, Warehouse};
    use crate::config::InventorySettings;
    use crate::jobs::InventoryJobs;
    use crate::services::{
        AdjustmentRequest, BatchAllocator, BatchReceipt, InventoryContext, InventoryItemStore,
        LedgerGenerator, MovementDetails, PhysicalCountRequest, SerialLifecycle, StockInRequest,
        StockOutRequest, TransactionProcessor, TransferRequest,
    };
    use crate::store::InMemoryInventoryStore;

    type Store = Arc<InMemoryInventoryStore>;
    type Bus = Arc<InMemoryEventBus<InventoryEvent>>;

    struct Harness {
        ctx: InventoryContext<Store, Bus>,
        clock: Arc<FixedClock>,
        main: Warehouse,
        overflow: Warehouse,
        items: InventoryItemStore<Store, Bus>,
        batches: BatchAllocator<Store, Bus>,
        serials: SerialLifecycle<Store, Bus>,
        processor: TransactionProcessor<Store, Bus>,
        ledger: LedgerGenerator<Store, Bus>,
        events: Subscription<InventoryEvent>,
    }

    fn start() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 3, 10, 9, 0, 0).unwrap()
    }

    fn day(d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 3, d).unwrap()
    }

    fn harness() -> Harness {
        harness_with(InventorySettings::default())
    }

    fn harness_with(settings: InventorySettings) -> Harness {
        let clock = Arc::new(FixedClock::new(start()));
        let directory = InMemoryWarehouseDirectory::new();
        let main = Warehouse::new("MAIN", "Main warehouse");
        let overflow = Warehouse::new("OVF", "Overflow warehouse");
        directory.upsert(main.clone());
        directory.upsert(overflow.clone());

        let bus: Bus = Arc::new(InMemoryEventBus::new());
        let events = bus.subscribe();
        let ctx = InventoryContext::new(
            Arc::new(InMemoryInventoryStore::new()),
            bus,
            clock.clone(),
            Arc::new(directory),
            Arc::new(settings.clone()),
            settings,
        );

        Harness {
            items: InventoryItemStore::new(ctx.clone()),
            batches: BatchAllocator::new(ctx.clone()),
            serials: SerialLifecycle::new(ctx.clone()),
            processor: TransactionProcessor::new(ctx.clone()),
            ledger: LedgerGenerator::new(ctx.clone()),
            ctx,
            clock,
            main,
            overflow,
            events,
        }
    }

    impl Harness {
        fn item(&self, sku: &str, warehouse: &Warehouse, opening: Decimal) -> InventoryItem {
            self.item_with(sku, warehouse, opening, |_| {})
        }

        fn item_with(
            &self,
            sku: &str,
            warehouse: &Warehouse,
            opening: Decimal,
            customise: impl FnOnce(&mut NewInventoryItem),
        ) -> InventoryItem {
            let mut new = NewInventoryItem::new(sku, format!("Item {sku}"), warehouse.id);
            new.opening_stock = opening;
            new.cost_price = dec!(10);
            customise(&mut new);
            self.items.create_item(new).unwrap()
        }

        fn stock(&self, item: &InventoryItem) -> (Decimal, Decimal, Decimal) {
            let item = self.items.get_item(item.id).unwrap();
            (item.current_stock(), item.reserved_stock(), item.available_stock())
        }

        fn event_types(&self) -> Vec<&'static str> {
            self.events.drain().iter().map(|e| e.event_type()).collect()
        }
    }

    fn serials(numbers: &[&str]) -> Vec<String> {
        numbers.iter().map(|n| n.to_string()).collect()
    }

    #[test]
    fn stock_in_reserve_and_stock_out_round_trip() {
        let h = harness();
        let item = h.item("SKU-1", &h.main, Decimal::ZERO);

        h.processor
            .stock_in(StockInRequest::new(item.id, dec!(100), dec!(10)))
            .unwrap();
        assert_eq!(h.stock(&item).0, dec!(100));

        h.items.reserve_stock(item.id, dec!(30)).unwrap();
        assert_eq!(h.stock(&item).2, dec!(70));

        h.processor
            .stock_out(StockOutRequest::new(item.id, dec!(20)))
            .unwrap();
        assert_eq!(h.stock(&item), (dec!(80), dec!(30), dec!(50)));

        let err = h
            .processor
            .stock_out(StockOutRequest::new(item.id, dec!(60)))
            .unwrap_err();
        match err {
            InventoryError::InsufficientStock {
                requested,
                available,
                ..
            } => {
                assert_eq!(requested, dec!(60));
                assert_eq!(available, dec!(50));
            }
            other => panic!("unexpected error: {other}"),
        }
        assert_eq!(h.stock(&item), (dec!(80), dec!(30), dec!(50)));
        assert_eq!(h.processor.transactions_for_item(item.id).unwrap().len(), 2);
    }

    #[test]
    fn negative_stock_is_allowed_when_configured() {
        let h = harness_with(InventorySettings {
            allow_negative_stock: true,
            ..InventorySettings::default()
        });
        let item = h.item("SKU-NEG", &h.main, dec!(5));

        let txn = h
            .processor
            .stock_out(StockOutRequest::new(item.id, dec!(8)))
            .unwrap();
        assert_eq!(txn.balance_after, dec!(-3));
        assert_eq!(h.stock(&item), (dec!(-3), dec!(0), dec!(0)));
    }

    #[test]
    fn transfer_moves_stock_between_warehouse_rows() {
        let h = harness();
        let product = ProductId::new();
        let source = h.item_with("SKU-A", &h.main, dec!(50), |n| n.product_id = Some(product));
        let destination =
            h.item_with("SKU-B", &h.overflow, dec!(10), |n| n.product_id = Some(product));

        let outcome = h
            .processor
            .transfer(TransferRequest::new(source.id, h.main.id, h.overflow.id, dec!(20)))
            .unwrap();

        assert_eq!(h.stock(&source).0, dec!(30));
        assert_eq!(h.stock(&destination).0, dec!(30));

        let (out, into) = (&outcome.outbound, &outcome.inbound);
        assert_eq!(out.transaction_type, TransactionType::Transfer);
        assert_eq!(into.transaction_type, TransactionType::Transfer);
        assert_eq!(out.quantity, into.quantity);
        assert_eq!(out.warehouse_id, h.main.id);
        assert_eq!(into.warehouse_id, h.overflow.id);
        assert_eq!(out.item_id, source.id);
        assert_eq!(into.item_id, destination.id);
        for leg in [out, into] {
            assert_eq!(leg.from_warehouse_id, Some(h.main.id));
            assert_eq!(leg.to_warehouse_id, Some(h.overflow.id));
            assert_eq!(leg.reason, "TRANSFER");
        }
        assert_eq!(out.notes.as_deref(), Some("Transfer to Overflow warehouse"));
        assert_eq!(into.notes.as_deref(), Some("Transfer from Main warehouse"));

        assert_eq!(h.processor.transactions_for_item(source.id).unwrap().len(), 1);
        assert_eq!(h.processor.transactions_for_item(destination.id).unwrap().len(), 1);
    }

    #[test]
    fn invalid_transfers_change_nothing() {
        let h = harness();
        let product = ProductId::new();
        let source = h.item_with("SKU-A", &h.main, dec!(5), |n| n.product_id = Some(product));
        let destination =
            h.item_with("SKU-B", &h.overflow, dec!(1), |n| n.product_id = Some(product));
        let unlinked = h.item("SKU-C", &h.main, dec!(5));

        let same = h
            .processor
            .transfer(TransferRequest::new(source.id, h.main.id, h.main.id, dec!(1)))
            .unwrap_err();
        assert_eq!(same.kind(), ErrorKind::InvalidState);

        let missing_row = h
            .processor
            .transfer(TransferRequest::new(unlinked.id, h.main.id, h.overflow.id, dec!(1)))
            .unwrap_err();
        assert_eq!(missing_row.kind(), ErrorKind::NotFound);

        let too_much = h
            .processor
            .transfer(TransferRequest::new(source.id, h.main.id, h.overflow.id, dec!(6)))
            .unwrap_err();
        assert_eq!(too_much.kind(), ErrorKind::InsufficientStock);

        assert_eq!(h.stock(&source).0, dec!(5));
        assert_eq!(h.stock(&destination).0, dec!(1));
        assert!(h.processor.transactions_for_warehouse(h.main.id).unwrap().is_empty());
    }

    #[test]
    fn failed_batch_allocation_leaves_every_batch_untouched() {
        let h = harness();
        let item = h.item_with("SKU-BATCH", &h.main, Decimal::ZERO, |n| {
            n.tracking = TrackingFlags {
                batch: true,
                ..TrackingFlags::default()
            }
        });
        for (number, quantity, received) in [("B-1", dec!(5), 1), ("B-2", dec!(3), 2)] {
            let mut new = NewBatch::new(item.id, h.main.id, number, quantity);
            new.received_date = Some(start() - Duration::days(10 - received));
            h.batches.create_batch(new).unwrap();
        }

        let err = h.batches.allocate_batches(item.id, dec!(10), None).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InsufficientStock);
        let available: Vec<_> = h
            .batches
            .batches_for_item(item.id, None)
            .unwrap()
            .iter()
            .map(|b| b.available_quantity())
            .collect();
        assert_eq!(available, vec![dec!(5), dec!(3)]);

        let plan = h.batches.allocate_batches(item.id, dec!(6), None).unwrap();
        let drawn: Vec<_> = plan
            .iter()
            .map(|a| (a.batch_number.as_str(), a.quantity))
            .collect();
        assert_eq!(drawn, vec![("B-1", dec!(5)), ("B-2", dec!(1))]);
    }

    #[test]
    fn reservations_and_releases_on_batches() {
        let h = harness();
        let item = h.item("SKU-RES", &h.main, Decimal::ZERO);
        let batch = h
            .batches
            .create_batch(NewBatch::new(item.id, h.main.id, "R-1", dec!(10)))
            .unwrap();

        let plan = h.batches.reserve_batches(item.id, dec!(4), None).unwrap();
        let reserved = h.batches.get_batch(batch.id).unwrap();
        assert_eq!(reserved.available_quantity(), dec!(6));
        assert_eq!(reserved.reserved_quantity(), dec!(4));

        let released = h.batches.release_reservations(&plan);
        assert_eq!(released.len(), 1);
        assert_eq!(*released[0].as_ref().unwrap(), dec!(4));

        // a second release finds nothing reserved
        let again = h.batches.release_reservations(&plan);
        assert_eq!(*again[0].as_ref().unwrap(), dec!(0));
        assert_eq!(h.batches.get_batch(batch.id).unwrap().available_quantity(), dec!(10));
    }

    #[test]
    fn duplicate_batch_numbers_are_rejected_per_item_and_warehouse() {
        let h = harness();
        let item = h.item("SKU-DUP", &h.main, Decimal::ZERO);
        h.batches
            .create_batch(NewBatch::new(item.id, h.main.id, "LOT-7", dec!(1)))
            .unwrap();
        let err = h
            .batches
            .create_batch(NewBatch::new(item.id, h.main.id, "LOT-7", dec!(1)))
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::DuplicateKey);

        let elsewhere = h
            .batches
            .create_batch(NewBatch::new(item.id, h.overflow.id, "LOT-8", dec!(1)))
            .unwrap_err();
        assert_eq!(elsewhere.kind(), ErrorKind::InvalidArgument);
    }

    #[test]
    fn fefo_stock_out_draws_the_soonest_expiry_first() {
        let h = harness_with(InventorySettings {
            consumption_strategy: ConsumptionStrategy::Fefo,
            ..InventorySettings::default()
        });
        let item = h.item_with("SKU-MILK", &h.main, Decimal::ZERO, |n| {
            n.tracking = TrackingFlags {
                batch: true,
                expiry: true,
                ..TrackingFlags::default()
            }
        });

        for (number, days) in [("LOT-A", 60), ("LOT-B", 20)] {
            let mut request = StockInRequest::new(item.id, dec!(10), dec!(2));
            let mut receipt = BatchReceipt::new(number);
            receipt.expiry_date = Some(start() + Duration::days(days));
            request.batch = Some(receipt);
            h.processor.stock_in(request).unwrap();
        }

        let missing_batch = h
            .processor
            .stock_in(StockInRequest::new(item.id, dec!(1), dec!(2)))
            .unwrap_err();
        assert_eq!(missing_batch.kind(), ErrorKind::InvalidArgument);

        let txn = h
            .processor
            .stock_out(StockOutRequest::new(item.id, dec!(15)))
            .unwrap();
        let drawn: Vec<_> = txn
            .batch_allocations
            .iter()
            .map(|a| (a.batch_number.as_str(), a.quantity))
            .collect();
        assert_eq!(drawn, vec![("LOT-B", dec!(10)), ("LOT-A", dec!(5))]);
        assert_eq!(h.stock(&item).0, dec!(5));
    }

    #[test]
    fn batch_tracked_transfer_recreates_batches_at_the_destination() {
        let h = harness();
        let product = ProductId::new();
        let tracked = |n: &mut NewInventoryItem| {
            n.product_id = Some(product);
            n.tracking = TrackingFlags {
                batch: true,
                ..TrackingFlags::default()
            };
        };
        let source = h.item_with("SKU-T1", &h.main, Decimal::ZERO, tracked);
        let destination = h.item_with("SKU-T2", &h.overflow, Decimal::ZERO, tracked);

        let mut request = StockInRequest::new(source.id, dec!(8), dec!(4));
        let mut receipt = BatchReceipt::new("LOT-X");
        receipt.expiry_date = Some(start() + Duration::days(90));
        request.batch = Some(receipt);
        h.processor.stock_in(request).unwrap();

        let outcome = h
            .processor
            .transfer(TransferRequest::new(source.id, h.main.id, h.overflow.id, dec!(3)))
            .unwrap();
        assert_eq!(outcome.inbound.batch_allocations.len(), 1);

        let moved = h
            .batches
            .find_by_number(destination.id, h.overflow.id, "LOT-X")
            .unwrap();
        assert_eq!(moved.available_quantity(), dec!(3));
        assert_eq!(moved.cost_per_unit, dec!(4));
        assert_eq!(moved.expiry_date, Some(start() + Duration::days(90)));

        let origin = h.batches.find_by_number(source.id, h.main.id, "LOT-X").unwrap();
        assert_eq!(origin.available_quantity(), dec!(5));
    }

    #[test]
    fn bulk_serial_creation_is_all_or_nothing() {
        let h = harness();
        let item = h.item("SKU-SER", &h.main, Decimal::ZERO);
        h.serials
            .create_serial(NewSerial::new("SN-2", item.id, h.main.id))
            .unwrap();

        let err = h
            .serials
            .create_bulk_serials(
                ["SN-1", "SN-2", "SN-3"]
                    .into_iter()
                    .map(|n| NewSerial::new(n, item.id, h.main.id))
                    .collect(),
            )
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::DuplicateKey);
        assert_eq!(h.serials.find_by_number("SN-1").unwrap_err().kind(), ErrorKind::NotFound);
        assert_eq!(h.serials.find_by_number("SN-3").unwrap_err().kind(), ErrorKind::NotFound);
        assert_eq!(h.serials.count_available(item.id, h.main.id).unwrap(), 1);
    }

    #[test]
    fn serials_follow_stock_in_and_stock_out() {
        let h = harness();
        let item = h.item_with("SKU-PHONE", &h.main, Decimal::ZERO, |n| {
            n.tracking = TrackingFlags {
                serial: true,
                ..TrackingFlags::default()
            }
        });

        let mut short = StockInRequest::new(item.id, dec!(2), dec!(300));
        short.serial_numbers = serials(&["IMEI-1"]);
        assert_eq!(
            h.processor.stock_in(short).unwrap_err().kind(),
            ErrorKind::InvalidArgument
        );

        let mut request = StockInRequest::new(item.id, dec!(2), dec!(300));
        request.serial_numbers = serials(&["IMEI-1", "IMEI-2"]);
        h.processor.stock_in(request).unwrap();
        let allocated = h.serials.allocate_serials(item.id, h.main.id, 2).unwrap();
        assert_eq!(allocated.len(), 2);
        assert!(allocated.iter().all(|s| s.cost_price == dec!(300)));
        assert_eq!(
            h.serials.allocate_serials(item.id, h.main.id, 3).unwrap_err().kind(),
            ErrorKind::InsufficientStock
        );

        let mut sale = StockOutRequest::new(item.id, dec!(1));
        sale.serial_numbers = serials(&["IMEI-1"]);
        sale.details = MovementDetails {
            reference: Some(DocumentRef::new("SALES_ORDER", "SO-1")),
            ..MovementDetails::default()
        };
        h.processor.stock_out(sale).unwrap();

        let sold = h.serials.find_by_number("IMEI-1").unwrap();
        assert_eq!(sold.status(), SerialStatus::Sold);
        assert!(sold.sold_reference.as_ref().is_some_and(|r| r.matches("SALES_ORDER", "SO-1")));

        let summary = h.serials.status_summary(item.id, h.main.id).unwrap();
        assert_eq!((summary.available, summary.sold, summary.total()), (1, 1, 2));
    }

    #[test]
    fn bulk_serial_transitions_do_not_partially_apply() {
        let h = harness();
        let item = h.item("SKU-SET", &h.main, Decimal::ZERO);
        h.serials
            .create_bulk_serials(
                ["S-1", "S-2"]
                    .into_iter()
                    .map(|n| NewSerial::new(n, item.id, h.main.id))
                    .collect(),
            )
            .unwrap();

        let err = h
            .serials
            .reserve_serials(&serials(&["S-1", "S-9"]))
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::NotFound);
        assert_eq!(h.serials.count_available(item.id, h.main.id).unwrap(), 2);

        h.serials.reserve_serials(&serials(&["S-1"])).unwrap();
        assert_eq!(
            h.serials
                .release_serial_reservations(&serials(&["S-1", "S-2"]))
                .unwrap(),
            1
        );

        h.serials.mark_as_damaged("S-2", Some("dropped".into())).unwrap();
        assert_eq!(
            h.serials.make_available("S-2", false).unwrap_err().kind(),
            ErrorKind::InvalidState
        );
        assert!(h.serials.make_available("S-2", true).unwrap().is_available());
    }

    #[test]
    fn transferred_serials_change_warehouse_and_item_row() {
        let h = harness();
        let product = ProductId::new();
        let source = h.item_with("SKU-S1", &h.main, Decimal::ZERO, |n| n.product_id = Some(product));
        let destination =
            h.item_with("SKU-S2", &h.overflow, Decimal::ZERO, |n| n.product_id = Some(product));

        let mut request = StockInRequest::new(source.id, dec!(2), dec!(50));
        request.serial_numbers = serials(&["U-1", "U-2"]);
        h.processor.stock_in(request).unwrap();

        let mut transfer = TransferRequest::new(source.id, h.main.id, h.overflow.id, dec!(1));
        transfer.serial_numbers = serials(&["U-2"]);
        h.processor.transfer(transfer).unwrap();

        let moved = h.serials.find_by_number("U-2").unwrap();
        assert_eq!(moved.warehouse_id, h.overflow.id);
        assert_eq!(moved.item_id, destination.id);
        assert_eq!(h.serials.count_available(source.id, h.main.id).unwrap(), 1);
    }

    #[test]
    fn serials_must_sit_on_their_items_row() {
        let h = harness();
        let item = h.item("SKU-OWN", &h.main, Decimal::ZERO);
        let other = h.item("SKU-OTHER", &h.main, Decimal::ZERO);
        let foreign_batch = h
            .batches
            .create_batch(NewBatch::new(other.id, h.main.id, "LOT-O", dec!(5)))
            .unwrap();

        let stray = NewSerial::new("W-2", item.id, h.overflow.id);
        let err = h
            .serials
            .create_bulk_serials(vec![NewSerial::new("W-1", item.id, h.main.id), stray])
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidArgument);
        assert_eq!(h.serials.find_by_number("W-1").unwrap_err().kind(), ErrorKind::NotFound);

        let mut wrong_batch = NewSerial::new("W-3", item.id, h.main.id);
        wrong_batch.batch_id = Some(foreign_batch.id);
        assert_eq!(
            h.serials.create_serial(wrong_batch).unwrap_err().kind(),
            ErrorKind::InvalidArgument
        );

        let mut missing_batch = NewSerial::new("W-4", item.id, h.main.id);
        missing_batch.batch_id = Some(BatchId::new());
        match h.serials.create_serial(missing_batch).unwrap_err() {
            InventoryError::NotFound { entity, .. } => assert_eq!(entity, "inventory batch"),
            other => panic!("unexpected error: {other}"),
        }

        assert!(h.serials.serials_for_item(item.id, None).unwrap().is_empty());
    }

    #[test]
    fn only_available_serials_can_be_transferred() {
        let h = harness();
        let product = ProductId::new();
        let source = h.item_with("SKU-H1", &h.main, Decimal::ZERO, |n| n.product_id = Some(product));
        h.item_with("SKU-H2", &h.overflow, Decimal::ZERO, |n| n.product_id = Some(product));

        let mut request = StockInRequest::new(source.id, dec!(2), dec!(50));
        request.serial_numbers = serials(&["H-1", "H-2"]);
        h.processor.stock_in(request).unwrap();
        h.serials.reserve_serials(&serials(&["H-1"])).unwrap();

        let mut transfer = TransferRequest::new(source.id, h.main.id, h.overflow.id, dec!(2));
        transfer.serial_numbers = serials(&["H-2", "H-1"]);
        assert_eq!(
            h.processor.transfer(transfer).unwrap_err().kind(),
            ErrorKind::InvalidState
        );

        assert_eq!(h.stock(&source).0, dec!(2));
        for number in ["H-1", "H-2"] {
            assert_eq!(h.serials.find_by_number(number).unwrap().warehouse_id, h.main.id);
        }
    }

    #[test]
    fn transferred_serials_follow_their_batch() {
        let h = harness();
        let product = ProductId::new();
        let tracked = |n: &mut NewInventoryItem| {
            n.product_id = Some(product);
            n.tracking = TrackingFlags {
                batch: true,
                serial: true,
                ..TrackingFlags::default()
            };
        };
        let source = h.item_with("SKU-BS1", &h.main, Decimal::ZERO, tracked);
        let destination = h.item_with("SKU-BS2", &h.overflow, Decimal::ZERO, tracked);

        let mut request = StockInRequest::new(source.id, dec!(2), dec!(20));
        request.batch = Some(BatchReceipt::new("LOT-S"));
        request.serial_numbers = serials(&["BS-1", "BS-2"]);
        h.processor.stock_in(request).unwrap();

        let mut transfer = TransferRequest::new(source.id, h.main.id, h.overflow.id, dec!(1));
        transfer.serial_numbers = serials(&["BS-1"]);
        h.processor.transfer(transfer).unwrap();

        let landed = h
            .batches
            .find_by_number(destination.id, h.overflow.id, "LOT-S")
            .unwrap();
        assert_eq!(h.serials.find_by_number("BS-1").unwrap().batch_id, Some(landed.id));
    }

    #[test]
    fn adjustments_and_counts_record_signed_deltas() {
        let h = harness();
        let item = h.item("SKU-ADJ", &h.main, dec!(50));

        let no_reason = h
            .processor
            .adjust(AdjustmentRequest {
                item_id: item.id,
                delta: dec!(-2),
                details: MovementDetails::default(),
            })
            .unwrap_err();
        assert_eq!(no_reason.kind(), ErrorKind::InvalidArgument);

        let adjusted = h
            .processor
            .adjust(AdjustmentRequest {
                item_id: item.id,
                delta: dec!(4),
                details: MovementDetails {
                    reason: Some("FOUND".into()),
                    ..MovementDetails::default()
                },
            })
            .unwrap();
        assert_eq!(adjusted.quantity, dec!(4));
        assert_eq!(adjusted.unit_cost, dec!(10));
        assert_eq!(adjusted.total_cost, dec!(40));

        let counted = h
            .processor
            .physical_count(PhysicalCountRequest {
                item_id: item.id,
                counted_quantity: dec!(47),
                details: MovementDetails::default(),
            })
            .unwrap();
        assert_eq!(counted.transaction_type, TransactionType::Count);
        assert_eq!(counted.quantity, dec!(-7));
        assert_eq!(counted.balance_after, dec!(47));
        assert_eq!(counted.unit_cost, Decimal::ZERO);
        assert_eq!(counted.reason, "COUNT_ADJUSTMENT");
        assert_eq!(
            counted.notes.as_deref(),
            Some("Physical count reconciliation. System: 54, Counted: 47, Difference: -7")
        );
        assert_eq!(h.stock(&item).0, dec!(47));
    }

    #[test]
    fn transaction_numbers_are_sequential_per_day() {
        let h = harness();
        let item = h.item("SKU-NUM", &h.main, Decimal::ZERO);

        let numbers: Vec<_> = (0..3)
            .map(|_| {
                h.processor
                    .stock_in(StockInRequest::new(item.id, dec!(1), dec!(1)))
                    .unwrap()
                    .transaction_number
            })
            .collect();
        assert_eq!(
            numbers,
            vec!["TXN-20240310-0001", "TXN-20240310-0002", "TXN-20240310-0003"]
        );

        h.clock.advance(Duration::days(1));
        let next = h
            .processor
            .stock_in(StockInRequest::new(item.id, dec!(1), dec!(1)))
            .unwrap();
        assert_eq!(next.transaction_number, "TXN-20240311-0001");
        assert_eq!(h.processor.get_by_number("TXN-20240310-0002").unwrap().quantity, dec!(1));
    }

    #[test]
    fn daily_ledger_reconciles_the_day_and_is_idempotent() {
        let h = harness();
        let item = h.item("SKU-LED", &h.main, Decimal::ZERO);
        h.processor
            .stock_in(StockInRequest::new(item.id, dec!(100), dec!(10)))
            .unwrap();
        h.processor
            .stock_out(StockOutRequest::new(item.id, dec!(20)))
            .unwrap();
        h.processor
            .adjust(AdjustmentRequest {
                item_id: item.id,
                delta: dec!(-5),
                details: MovementDetails {
                    reason: Some("DAMAGED".into()),
                    ..MovementDetails::default()
                },
            })
            .unwrap();

        h.clock.advance(Duration::days(1));
        assert_eq!(h.ledger.generate_for_previous_day().unwrap(), 1);
        let first = h.ledger.get_ledger(item.id, h.main.id, day(10)).unwrap();
        assert_eq!(first.opening_stock, Decimal::ZERO);
        assert_eq!(first.stock_in, dec!(100));
        assert_eq!(first.stock_out, dec!(20));
        assert_eq!(first.adjustment_out, dec!(5));
        assert_eq!(first.closing_stock, dec!(75));
        assert_eq!(first.average_cost, dec!(10.00));
        assert_eq!(first.closing_value, dec!(750));

        assert_eq!(h.ledger.generate_daily_ledger_for_date(day(10)).unwrap(), 1);
        let second = h.ledger.get_ledger(item.id, h.main.id, day(10)).unwrap();
        assert_eq!(
            (second.opening_stock, second.total_inflows(), second.total_outflows()),
            (first.opening_stock, first.total_inflows(), first.total_outflows())
        );
        assert_eq!(second.closing_stock, first.closing_stock);

        let quiet = h
            .ledger
            .generate_ledger_entry(item.id, h.main.id, day(11), &[])
            .unwrap();
        assert_eq!(quiet.opening_stock, dec!(75));
        assert_eq!(quiet.closing_stock, quiet.opening_stock);
        assert_eq!(quiet.closing_value, quiet.opening_stock * quiet.average_cost);

        assert_eq!(h.ledger.warehouse_stock_quantity(h.main.id, day(10)).unwrap(), dec!(75));
        assert_eq!(h.ledger.items_with_movement(day(11)).unwrap().len(), 0);
    }

    #[test]
    fn backfill_chains_opening_balances_across_days() {
        let h = harness();
        let item = h.item("SKU-FILL", &h.main, Decimal::ZERO);
        h.processor
            .stock_in(StockInRequest::new(item.id, dec!(10), dec!(3)))
            .unwrap();

        let mut later = StockOutRequest::new(item.id, dec!(4));
        later.details.transaction_date = Some(start() + Duration::days(2));
        h.processor.stock_out(later).unwrap();

        assert_eq!(
            h.ledger.generate_ledger_for_date_range(day(12), day(10)).unwrap_err().kind(),
            ErrorKind::InvalidArgument
        );
        assert_eq!(h.ledger.generate_ledger_for_date_range(day(10), day(12)).unwrap(), 2);

        let rows = h
            .ledger
            .ledgers_between(item.id, h.main.id, day(10), day(12))
            .unwrap();
        let balances: Vec<_> = rows
            .iter()
            .map(|l| (l.ledger_date, l.opening_stock, l.closing_stock))
            .collect();
        assert_eq!(
            balances,
            vec![(day(10), dec!(0), dec!(10)), (day(12), dec!(10), dec!(6))]
        );
    }

    #[test]
    fn events_are_published_after_commit_only() {
        let h = harness();
        let item = h.item_with("SKU-EVT", &h.main, Decimal::ZERO, |n| {
            n.reorder_level = dec!(5)
        });

        h.processor
            .stock_in(StockInRequest::new(item.id, dec!(10), dec!(1)))
            .unwrap();
        assert_eq!(h.event_types(), vec!["inventory.stock.updated"]);

        assert!(
            h.processor
                .stock_out(StockOutRequest::new(item.id, dec!(11)))
                .is_err()
        );
        assert!(h.event_types().is_empty());

        h.processor
            .stock_out(StockOutRequest::new(item.id, dec!(10)))
            .unwrap();
        assert_eq!(
            h.event_types(),
            vec![
                "inventory.stock.updated",
                "inventory.stock.low",
                "inventory.stock.out"
            ]
        );
    }

    #[test]
    fn daily_run_sweeps_expiry_and_writes_the_ledger() {
        let h = harness();
        let item = h.item("SKU-JOB", &h.main, Decimal::ZERO);
        for (number, days) in [("EXP-1", 10), ("EXP-2", 20)] {
            let mut new = NewBatch::new(item.id, h.main.id, number, dec!(4));
            new.expiry_date = Some(start() + Duration::days(days));
            h.batches.create_batch(new).unwrap();
        }
        h.processor
            .stock_in(StockInRequest::new(item.id, dec!(1), dec!(1)))
            .unwrap();
        h.events.drain();

        let jobs = InventoryJobs::new(h.ctx.clone());
        let report = jobs.run_daily(start() + Duration::days(1)).unwrap();
        assert_eq!(report.expired_batches, 0);
        assert_eq!(report.expiring_alerts, 2);
        assert_eq!(report.ledger_rows, 1);
        h.events.drain();

        let report = jobs.run_daily(start() + Duration::days(15)).unwrap();
        assert_eq!(report.expired_batches, 1);
        assert_eq!(report.expiring_alerts, 1);
        assert_eq!(
            h.event_types(),
            vec!["inventory.batch.expired", "inventory.batch.expiring"]
        );

        let expired = h.batches.find_by_number(item.id, h.main.id, "EXP-1").unwrap();
        assert!(expired.is_expired);
        assert_eq!(expired.available_quantity(), dec!(4));
    }

    #[test]
    fn concurrent_reservations_never_oversell() {
        let h = harness();
        let item = h.item("SKU-HOT", &h.main, dec!(100));

        let items = &h.items;
        let id = item.id;
        let successes = std::thread::scope(|scope| {
            let handles: Vec<_> = (0..12)
                .map(|_| scope.spawn(move || items.reserve_stock(id, dec!(10)).is_ok()))
                .collect();
            handles
                .into_iter()
                .map(|handle| handle.join().unwrap())
                .filter(|ok| *ok)
                .count()
        });

        assert_eq!(successes, 10);
        assert_eq!(h.stock(&item), (dec!(100), dec!(100), dec!(0)));
    }
}
