//! Tarification context.
//!
//! Constructed once by the host (CLI, bindings, request handler) and passed
//! to the aggregator; nothing in the crate reads process-wide state.

use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::error::TarificationError;
use crate::tariff::VehicleProfile;
use crate::TarificationResult;

/// Default rate class: private passenger cars ("promenade et affaires").
pub const DEFAULT_VEHICLE_CATEGORY: &str = "401";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TarificationConfig {
    /// Category used when a caller supplies none
    pub default_vehicle_category: String,
    /// ISO currency code of every amount
    pub currency: String,
    /// How long a writer waits for another writer on the same quote
    pub lock_wait_ms: u64,
}

impl Default for TarificationConfig {
    fn default() -> Self {
        Self {
            default_vehicle_category: DEFAULT_VEHICLE_CATEGORY.to_string(),
            currency: "XOF".to_string(),
            lock_wait_ms: 2_000,
        }
    }
}

impl TarificationConfig {
    /// Build from `NOLI_*` environment variables over the defaults.
    ///
    /// Loading a `.env` file is left to the binary.
    pub fn from_env() -> TarificationResult<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> TarificationResult<Self> {
        let mut cfg = Self::default();

        if let Some(category) = lookup("NOLI_DEFAULT_CATEGORY") {
            let category = category.trim();
            if category.is_empty() {
                return Err(TarificationError::invalid_input(
                    "NOLI_DEFAULT_CATEGORY",
                    "must not be empty",
                ));
            }
            cfg.default_vehicle_category = category.to_string();
        }
        if let Some(currency) = lookup("NOLI_CURRENCY") {
            cfg.currency = currency.trim().to_uppercase();
        }
        if let Some(wait) = lookup("NOLI_LOCK_WAIT_MS") {
            cfg.lock_wait_ms = wait.trim().parse().map_err(|_| {
                TarificationError::invalid_input(
                    "NOLI_LOCK_WAIT_MS",
                    format!("expected milliseconds, got '{wait}'"),
                )
            })?;
        }

        Ok(cfg)
    }

    pub fn lock_wait(&self) -> Duration {
        Duration::from_millis(self.lock_wait_ms)
    }

    /// Resolve an optional caller-supplied category to a concrete one.
    pub fn category_or_default<'a>(&'a self, category: Option<&'a str>) -> &'a str {
        match category.map(str::trim) {
            Some(c) if !c.is_empty() => c,
            _ => &self.default_vehicle_category,
        }
    }

    /// Apply the default category to a profile that arrived without one.
    pub fn normalize_vehicle(&self, mut vehicle: VehicleProfile) -> VehicleProfile {
        if vehicle.category.trim().is_empty() {
            vehicle.category = self.default_vehicle_category.clone();
        } else {
            vehicle.category = vehicle.category.trim().to_string();
        }
        vehicle
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup_from(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn test_defaults_without_environment() {
        let cfg = TarificationConfig::from_lookup(lookup_from(&[])).unwrap();
        assert_eq!(cfg, TarificationConfig::default());
        assert_eq!(cfg.lock_wait(), Duration::from_secs(2));
    }

    #[test]
    fn test_environment_overrides() {
        let cfg = TarificationConfig::from_lookup(lookup_from(&[
            ("NOLI_DEFAULT_CATEGORY", "402"),
            ("NOLI_CURRENCY", "xof"),
            ("NOLI_LOCK_WAIT_MS", "250"),
        ]))
        .unwrap();
        assert_eq!(cfg.default_vehicle_category, "402");
        assert_eq!(cfg.currency, "XOF");
        assert_eq!(cfg.lock_wait(), Duration::from_millis(250));
    }

    #[test]
    fn test_bad_lock_wait_rejected() {
        let err = TarificationConfig::from_lookup(lookup_from(&[("NOLI_LOCK_WAIT_MS", "soon")]))
            .unwrap_err();
        assert!(matches!(err, TarificationError::InvalidInput { .. }));
    }

    #[test]
    fn test_category_or_default() {
        let cfg = TarificationConfig::default();
        assert_eq!(cfg.category_or_default(None), "401");
        assert_eq!(cfg.category_or_default(Some("  ")), "401");
        assert_eq!(cfg.category_or_default(Some("201")), "201");
    }
}
