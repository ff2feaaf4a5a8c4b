//! Ports to data the inventory core does not own.

use std::collections::HashMap;
use std::sync::{Arc, RwLock};

use serde::{Deserialize, Serialize};

use stockledger_core::{InventoryError, InventoryResult, WarehouseId};
use stockledger_inventory::ConsumptionStrategy;

/// Warehouse master data as seen by the core.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Warehouse {
    pub id: WarehouseId,
    pub code: String,
    pub name: String,
    pub is_active: bool,
}

impl Warehouse {
    pub fn new(code: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            id: WarehouseId::new(),
            code: code.into(),
            name: name.into(),
            is_active: true,
        }
    }
}

/// Existence check for warehouses. Absence is a hard precondition failure.
pub trait WarehouseDirectory: Send + Sync {
    fn lookup(&self, id: WarehouseId) -> Option<Warehouse>;

    fn require(&self, id: WarehouseId) -> InventoryResult<Warehouse> {
        self.lookup(id)
            .ok_or_else(|| InventoryError::not_found("warehouse", id))
    }

    /// Like [`require`](Self::require), but inactive warehouses are rejected too.
    fn require_active(&self, id: WarehouseId) -> InventoryResult<Warehouse> {
        let warehouse = self.require(id)?;
        if !warehouse.is_active {
            return Err(InventoryError::invalid_state(format!(
                "warehouse {} is inactive",
                warehouse.code
            )));
        }
        Ok(warehouse)
    }
}

impl<W> WarehouseDirectory for Arc<W>
where
    W: WarehouseDirectory + ?Sized,
{
    fn lookup(&self, id: WarehouseId) -> Option<Warehouse> {
        (**self).lookup(id)
    }
}

/// Tenant-scoped stock policy.
pub trait InventoryConfigProvider: Send + Sync {
    fn consumption_strategy(&self) -> ConsumptionStrategy;

    fn allow_negative_stock(&self) -> bool;
}

impl<P> InventoryConfigProvider for Arc<P>
where
    P: InventoryConfigProvider + ?Sized,
{
    fn consumption_strategy(&self) -> ConsumptionStrategy {
        (**self).consumption_strategy()
    }

    fn allow_negative_stock(&self) -> bool {
        (**self).allow_negative_stock()
    }
}

/// In-memory warehouse directory for tests/dev.
#[derive(Debug, Default)]
pub struct InMemoryWarehouseDirectory {
    inner: RwLock<HashMap<WarehouseId, Warehouse>>,
}

impl InMemoryWarehouseDirectory {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn upsert(&self, warehouse: Warehouse) {
        if let Ok(mut map) = self.inner.write() {
            map.insert(warehouse.id, warehouse);
        }
    }
}

impl WarehouseDirectory for InMemoryWarehouseDirectory {
    fn lookup(&self, id: WarehouseId) -> Option<Warehouse> {
        let map = self.inner.read().ok()?;
        map.get(&id).cloned()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use stockledger_core::ErrorKind;

    #[test]
    fn inactive_warehouses_fail_the_active_check() {
        let directory = InMemoryWarehouseDirectory::new();
        let mut main = Warehouse::new("MAIN", "Main warehouse");
        main.is_active = false;
        let id = main.id;
        directory.upsert(main);

        assert!(directory.require(id).is_ok());
        assert_eq!(directory.require_active(id).unwrap_err().kind(), ErrorKind::InvalidState);
        assert_eq!(
            directory.require(WarehouseId::new()).unwrap_err().kind(),
            ErrorKind::NotFound
        );
    }
}
