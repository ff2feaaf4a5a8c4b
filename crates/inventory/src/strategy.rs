use core::cmp::Ordering;
use core::convert::Infallible;
use core::str::FromStr;

use serde::{Deserialize, Deserializer, Serialize};

use crate::batch::InventoryBatch;

/// Order in which batches are drawn from.
#[derive(Debug, Copy, Clone, Default, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum ConsumptionStrategy {
    /// Oldest received first.
    #[default]
    Fifo,
    /// Soonest to expire first; batches without an expiry date go last.
    Fefo,
    /// Most recently received first.
    Lifo,
}

impl ConsumptionStrategy {
    pub fn as_str(&self) -> &'static str {
        match self {
            ConsumptionStrategy::Fifo => "FIFO",
            ConsumptionStrategy::Fefo => "FEFO",
            ConsumptionStrategy::Lifo => "LIFO",
        }
    }

    /// Total order over candidate batches.
    ///
    /// Equal keys fall back to creation time, then batch number, so the same
    /// candidate set always allocates in the same order.
    pub fn compare(&self, a: &InventoryBatch, b: &InventoryBatch) -> Ordering {
        let primary = match self {
            ConsumptionStrategy::Fifo => a.received_date.cmp(&b.received_date),
            ConsumptionStrategy::Lifo => b.received_date.cmp(&a.received_date),
            ConsumptionStrategy::Fefo => match (a.expiry_date, b.expiry_date) {
                (Some(x), Some(y)) => x.cmp(&y),
                (Some(_), None) => Ordering::Less,
                (None, Some(_)) => Ordering::Greater,
                (None, None) => Ordering::Equal,
            },
        };
        primary
            .then_with(|| a.created_at.cmp(&b.created_at))
            .then_with(|| a.batch_number.cmp(&b.batch_number))
    }

    pub fn sort(&self, batches: &mut [InventoryBatch]) {
        batches.sort_by(|a, b| self.compare(a, b));
    }
}

impl core::fmt::Display for ConsumptionStrategy {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Lenient parse: anything unrecognised is FIFO.
impl FromStr for ConsumptionStrategy {
    type Err = Infallible;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(match s.trim().to_ascii_uppercase().as_str() {
            "FEFO" => ConsumptionStrategy::Fefo,
            "LIFO" => ConsumptionStrategy::Lifo,
            _ => ConsumptionStrategy::Fifo,
        })
    }
}

/// Same leniency as [`FromStr`]; `null` is FIFO too.
impl<'de> Deserialize<'de> for ConsumptionStrategy {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = Option::<String>::deserialize(deserializer)?;
        Ok(raw
            .and_then(|raw| raw.parse().ok())
            .unwrap_or_default())
    }
}
