//! Infrastructure layer: persistence, collaborator ports, configuration and
//! the inventory services built on top of them.

pub mod collaborators;
pub mod config;
pub mod jobs;
pub mod services;
pub mod store;

mod integration_tests;

pub use collaborators::{
    InMemoryWarehouseDirectory, InventoryConfigProvider, Warehouse, WarehouseDirectory,
};
pub use config::{InventorySettings, SettingsError};
pub use jobs::{DailyRunReport, InventoryJobs};
pub use services::InventoryContext;
pub use store::{InMemoryInventoryStore, InventoryStore, InventoryTx};
