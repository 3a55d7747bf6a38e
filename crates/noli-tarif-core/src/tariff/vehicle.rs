use serde::{Deserialize, Deserializer, Serialize};
use std::fmt;

use crate::types::Money;

/// Energy source as recorded on the carte grise.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FuelType {
    Essence,
    Diesel,
    Hybride,
    Electrique,
    Gpl,
}

impl fmt::Display for FuelType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            FuelType::Essence => "essence",
            FuelType::Diesel => "diesel",
            FuelType::Hybride => "hybride",
            FuelType::Electrique => "electrique",
            FuelType::Gpl => "gpl",
        };
        f.write_str(s)
    }
}

/// Vehicle attributes the tariff depends on. Supplied by the quote, not
/// owned by this crate.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct VehicleProfile {
    /// Rate class code, e.g. "401"
    #[serde(default, deserialize_with = "trimmed")]
    pub category: String,
    /// Puissance fiscale (CV)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub fiscal_power: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub fuel_type: Option<FuelType>,
    /// SI: currently declared value
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sum_insured: Option<Money>,
    /// VN: replacement value new
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub new_value: Option<Money>,
}

fn trimmed<'de, D: Deserializer<'de>>(deserializer: D) -> Result<String, D::Error> {
    let raw = String::deserialize(deserializer)?;
    Ok(raw.trim().to_string())
}

impl VehicleProfile {
    /// Copy with the category code stripped of surrounding whitespace.
    pub fn normalized(&self) -> VehicleProfile {
        VehicleProfile {
            category: self.category.trim().to_string(),
            ..self.clone()
        }
    }
}

/// The caller's per-coverage choices.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct CoverageSelection {
    /// Named formula for FORMULA_BASED coverages ("formule_2", "bronze", ...)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub formula_name: Option<String>,
    /// Commercial pack the coverage is bought in, if any
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pack: Option<String>,
}

impl CoverageSelection {
    pub fn formula(name: impl Into<String>) -> Self {
        Self {
            formula_name: Some(name.into()),
            pack: None,
        }
    }

    pub fn in_pack(mut self, pack: impl Into<String>) -> Self {
        self.pack = Some(pack.into());
        self
    }

    /// Formula name with blank values treated as absent.
    pub fn formula_name(&self) -> Option<&str> {
        self.formula_name
            .as_deref()
            .map(str::trim)
            .filter(|f| !f.is_empty())
    }

    pub fn pack(&self) -> Option<&str> {
        self.pack.as_deref().map(str::trim).filter(|p| !p.is_empty())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn test_vehicle_profile_deserialize() {
        let vehicle: VehicleProfile = serde_json::from_str(
            r#"{"category": "401", "fiscal_power": 7, "fuel_type": "diesel", "sum_insured": "4500000"}"#,
        )
        .unwrap();
        assert_eq!(vehicle.fuel_type, Some(FuelType::Diesel));
        assert_eq!(vehicle.sum_insured, Some(dec!(4500000)));
        assert_eq!(vehicle.new_value, None);
    }

    #[test]
    fn test_blank_selection_fields_are_absent() {
        let selection = CoverageSelection {
            formula_name: Some("  ".into()),
            pack: Some(String::new()),
        };
        assert_eq!(selection.formula_name(), None);
        assert_eq!(selection.pack(), None);

        let selection = CoverageSelection::formula(" formule_2 ").in_pack("PACK_SERENITE");
        assert_eq!(selection.formula_name(), Some("formule_2"));
        assert_eq!(selection.pack(), Some("PACK_SERENITE"));
    }

    #[test]
    fn test_category_trimmed_on_deserialize() {
        let vehicle: VehicleProfile =
            serde_json::from_str(r#"{"category": " 401 ", "fiscal_power": 5}"#).unwrap();
        assert_eq!(vehicle.category, "401");
    }

    #[test]
    fn test_normalized_trims_category() {
        let vehicle = VehicleProfile {
            category: "\t402 ".into(),
            ..Default::default()
        };
        assert_eq!(vehicle.normalized().category, "402");
        assert_eq!(vehicle.normalized().normalized(), vehicle.normalized());
    }
}
