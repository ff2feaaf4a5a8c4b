//! Daily housekeeping: expiry sweep, expiry alerts, ledger generation.
//!
//! Nothing here schedules itself. The host process calls
//! [`InventoryJobs::run_daily`] once a day, after
//! [`InventorySettings::ledger_generation_hour`](crate::config::InventorySettings).

use chrono::{DateTime, Days, Utc};

use stockledger_core::{InventoryError, InventoryResult};
use stockledger_events::EventBus;
use stockledger_inventory::{BatchExpiring, InventoryBatch, InventoryEvent};

use crate::services::{BatchAllocator, InventoryContext, LedgerGenerator};
use crate::store::InventoryStore;

/// What one daily run did.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DailyRunReport {
    pub expired_batches: usize,
    pub expiring_alerts: usize,
    pub ledger_rows: usize,
}

pub struct InventoryJobs<S, B> {
    ctx: InventoryContext<S, B>,
    batches: BatchAllocator<S, B>,
    ledger: LedgerGenerator<S, B>,
}

impl<S, B> InventoryJobs<S, B>
where
    S: InventoryStore + Clone,
    B: EventBus<InventoryEvent> + Clone,
{
    pub fn new(ctx: InventoryContext<S, B>) -> Self {
        Self {
            batches: BatchAllocator::new(ctx.clone()),
            ledger: LedgerGenerator::new(ctx.clone()),
            ctx,
        }
    }

    pub fn run_daily(&self, now: DateTime<Utc>) -> InventoryResult<DailyRunReport> {
        let expired_batches = self.batches.mark_expired_batches(now)?.len();
        let expiring_alerts = self.expiry_alerts(now)?.len();

        let ledger_rows = if self.ctx.settings.auto_generate_daily_ledger {
            let yesterday = now
                .date_naive()
                .checked_sub_days(Days::new(1))
                .ok_or_else(|| InventoryError::invalid_argument(format!("no day before {now}")))?;
            self.ledger.generate_daily_ledger_for_date(yesterday)?
        } else {
            0
        };

        let report = DailyRunReport {
            expired_batches,
            expiring_alerts,
            ledger_rows,
        };
        tracing::info!(?report, "daily inventory run finished");
        Ok(report)
    }

    /// Batches expiring within the configured alert window; one
    /// `BatchExpiring` event is published per batch.
    pub fn expiry_alerts(&self, now: DateTime<Utc>) -> InventoryResult<Vec<InventoryBatch>> {
        let expiring = self
            .batches
            .expiring_batches(now, self.ctx.settings.expiry_alert_days)?;
        self.ctx.publish(
            expiring
                .iter()
                .filter_map(|b| {
                    b.expiry_date.map(|expiry_date| {
                        InventoryEvent::BatchExpiring(BatchExpiring {
                            batch_id: b.id,
                            batch_number: b.batch_number.clone(),
                            item_id: b.item_id,
                            warehouse_id: b.warehouse_id,
                            expiry_date,
                            available_quantity: b.available_quantity(),
                            occurred_at: now,
                        })
                    })
                })
                .collect(),
        );
        Ok(expiring)
    }
}
