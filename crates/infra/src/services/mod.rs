//! Inventory services.
//!
//! Every mutating call runs as one unit of work against the [`InventoryStore`]
//! and publishes its events only after that unit has committed. Units that hit
//! an optimistic-concurrency conflict are retried from scratch.

use std::sync::Arc;

use chrono::{DateTime, Utc};

use stockledger_core::{Clock, InventoryResult};
use stockledger_events::EventBus;
use stockledger_inventory::InventoryEvent;

use crate::collaborators::{InventoryConfigProvider, WarehouseDirectory};
use crate::config::InventorySettings;
use crate::store::{InventoryStore, InventoryTx};

pub mod batches;
pub mod items;
pub mod ledger;
pub mod serials;
pub mod transactions;

pub use batches::BatchAllocator;
pub use items::InventoryItemStore;
pub use ledger::LedgerGenerator;
pub use serials::{SerialLifecycle, SerialStatusSummary};
pub use transactions::{
    AdjustmentRequest, BatchReceipt, MovementDetails, PhysicalCountRequest, StockInRequest,
    StockOutRequest, TransactionProcessor, TransferOutcome, TransferRequest,
};

/// Everything a service needs: store, bus, time, and the collaborator ports.
pub struct InventoryContext<S, B> {
    pub store: S,
    pub bus: B,
    pub clock: Arc<dyn Clock>,
    pub warehouses: Arc<dyn WarehouseDirectory>,
    pub config: Arc<dyn InventoryConfigProvider>,
    pub settings: InventorySettings,
}

impl<S: Clone, B: Clone> Clone for InventoryContext<S, B> {
    fn clone(&self) -> Self {
        Self {
            store: self.store.clone(),
            bus: self.bus.clone(),
            clock: self.clock.clone(),
            warehouses: self.warehouses.clone(),
            config: self.config.clone(),
            settings: self.settings.clone(),
        }
    }
}

impl<S, B> InventoryContext<S, B> {
    pub fn new(
        store: S,
        bus: B,
        clock: Arc<dyn Clock>,
        warehouses: Arc<dyn WarehouseDirectory>,
        config: Arc<dyn InventoryConfigProvider>,
        settings: InventorySettings,
    ) -> Self {
        Self {
            store,
            bus,
            clock,
            warehouses,
            config,
            settings,
        }
    }

    pub(crate) fn now(&self) -> DateTime<Utc> {
        self.clock.now()
    }
}

impl<S, B> InventoryContext<S, B>
where
    S: InventoryStore,
    B: EventBus<InventoryEvent>,
{
    pub(crate) fn read<T>(
        &self,
        f: impl FnOnce(&dyn InventoryTx) -> InventoryResult<T>,
    ) -> InventoryResult<T> {
        self.store.read(f)
    }

    /// Run `f` as one unit of work, retrying on conflict.
    pub(crate) fn unit_of_work<T>(
        &self,
        operation: &'static str,
        mut f: impl FnMut(&mut dyn InventoryTx) -> InventoryResult<T>,
    ) -> InventoryResult<T> {
        let mut attempt = 0;
        loop {
            match self.store.write(&mut f) {
                Err(err) if err.is_retryable() && attempt < self.settings.max_conflict_retries => {
                    attempt += 1;
                    tracing::debug!(operation, attempt, error = %err, "retrying after conflict");
                }
                outcome => return outcome,
            }
        }
    }

    /// Publish committed facts. Failures are logged; the commit stands.
    pub(crate) fn publish(&self, events: Vec<InventoryEvent>) {
        for event in events {
            if let Err(err) = self.bus.publish(event) {
                tracing::warn!(error = ?err, "failed to publish inventory event after commit");
            }
        }
    }
}
