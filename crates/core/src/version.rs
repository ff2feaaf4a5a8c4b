//! Optimistic versioning for rows mutated in place.

use crate::error::{InventoryError, InventoryResult};

/// A row that carries a monotonically increasing version.
///
/// Stores compare the version of the row being saved with the version they
/// hold and bump it on success; a mismatch means someone else wrote first.
pub trait Versioned {
    fn version(&self) -> u64;

    fn set_version(&mut self, version: u64);
}

/// Optimistic concurrency expectation for a save.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum ExpectedVersion {
    /// Skip version checking (first insert, imports).
    Any,
    /// Require the stored row to be at an exact version.
    Exact(u64),
}

impl ExpectedVersion {
    pub fn matches(self, actual: u64) -> bool {
        match self {
            ExpectedVersion::Any => true,
            ExpectedVersion::Exact(v) => v == actual,
        }
    }

    pub fn check(self, actual: u64) -> InventoryResult<()> {
        if self.matches(actual) {
            Ok(())
        } else {
            Err(InventoryError::conflict(format!(
                "optimistic concurrency check failed (expected: {self:?}, actual: {actual})"
            )))
        }
    }
}
