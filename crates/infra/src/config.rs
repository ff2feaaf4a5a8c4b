//! Settings for the inventory services.
//!
//! Loaded from `STOCKLEDGER_*` environment variables; anything missing or
//! unparsable falls back to the default with a warning.

use core::str::FromStr;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use stockledger_inventory::ConsumptionStrategy;

use crate::collaborators::InventoryConfigProvider;

const ENV_PREFIX: &str = "STOCKLEDGER_";

#[derive(Debug, Error)]
pub enum SettingsError {
    #[error("invalid settings document: {0}")]
    Parse(#[from] serde_json::Error),
    #[error("ledger_generation_hour must be 0..=23, got {0}")]
    InvalidHour(u32),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct InventorySettings {
    pub consumption_strategy: ConsumptionStrategy,
    pub allow_negative_stock: bool,
    /// Window for batch expiry alerts.
    pub expiry_alert_days: u32,
    pub low_stock_alerts: bool,
    pub auto_generate_daily_ledger: bool,
    /// UTC hour the scheduler is expected to run the daily job at.
    pub ledger_generation_hour: u32,
    /// Extra attempts for a unit of work that hit an optimistic-concurrency conflict.
    pub max_conflict_retries: u32,
}

impl Default for InventorySettings {
    fn default() -> Self {
        Self {
            consumption_strategy: ConsumptionStrategy::Fifo,
            allow_negative_stock: false,
            expiry_alert_days: 30,
            low_stock_alerts: true,
            auto_generate_daily_ledger: true,
            ledger_generation_hour: 1,
            max_conflict_retries: 3,
        }
    }
}

impl InventorySettings {
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build settings from an arbitrary key lookup (keys carry the `STOCKLEDGER_` prefix).
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let defaults = Self::default();
        let read = |name: &str| lookup(&format!("{ENV_PREFIX}{name}"));

        let mut settings = Self {
            consumption_strategy: read("CONSUMPTION_STRATEGY")
                .map(|raw| ConsumptionStrategy::from_str(&raw).unwrap_or_default())
                .unwrap_or(defaults.consumption_strategy),
            allow_negative_stock: parse_or(
                read("ALLOW_NEGATIVE_STOCK"),
                "ALLOW_NEGATIVE_STOCK",
                defaults.allow_negative_stock,
            ),
            expiry_alert_days: parse_or(
                read("EXPIRY_ALERT_DAYS"),
                "EXPIRY_ALERT_DAYS",
                defaults.expiry_alert_days,
            ),
            low_stock_alerts: parse_or(
                read("LOW_STOCK_ALERTS"),
                "LOW_STOCK_ALERTS",
                defaults.low_stock_alerts,
            ),
            auto_generate_daily_ledger: parse_or(
                read("AUTO_GENERATE_DAILY_LEDGER"),
                "AUTO_GENERATE_DAILY_LEDGER",
                defaults.auto_generate_daily_ledger,
            ),
            ledger_generation_hour: parse_or(
                read("LEDGER_GENERATION_HOUR"),
                "LEDGER_GENERATION_HOUR",
                defaults.ledger_generation_hour,
            ),
            max_conflict_retries: parse_or(
                read("MAX_CONFLICT_RETRIES"),
                "MAX_CONFLICT_RETRIES",
                defaults.max_conflict_retries,
            ),
        };

        if settings.ledger_generation_hour > 23 {
            tracing::warn!(
                value = settings.ledger_generation_hour,
                "{ENV_PREFIX}LEDGER_GENERATION_HOUR out of range; using default"
            );
            settings.ledger_generation_hour = defaults.ledger_generation_hour;
        }
        settings
    }

    /// Parse a JSON settings document; omitted fields take their defaults.
    pub fn from_json(raw: &str) -> Result<Self, SettingsError> {
        let settings: Self = serde_json::from_str(raw)?;
        if settings.ledger_generation_hour > 23 {
            return Err(SettingsError::InvalidHour(settings.ledger_generation_hour));
        }
        Ok(settings)
    }
}

fn parse_or<T: FromStr>(raw: Option<String>, name: &str, default: T) -> T {
    match raw {
        None => default,
        Some(raw) => raw.trim().parse().unwrap_or_else(|_| {
            tracing::warn!(value = %raw, "{ENV_PREFIX}{name} is not valid; using default");
            default
        }),
    }
}

impl InventoryConfigProvider for InventorySettings {
    fn consumption_strategy(&self) -> ConsumptionStrategy {
        self.consumption_strategy
    }

    fn allow_negative_stock(&self) -> bool {
        self.allow_negative_stock
    }
}
