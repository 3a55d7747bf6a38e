use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::error::TarificationError;

/// How a coverage's premium is derived.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum CalculationType {
    /// Flat amount from the rule, optionally replaced by a pack price
    FixedAmount,
    /// Percentage of the sum insured (declared value)
    PercentageSi,
    /// Percentage of the new (replacement) value
    PercentageVn,
    /// Exact lookup in the liability base-premium grid
    MtplTariff,
    /// One of several named flat-rate formulas
    FormulaBased,
    /// Always zero, informational coverage
    Free,
}

impl CalculationType {
    pub const ALL: [CalculationType; 6] = [
        CalculationType::FixedAmount,
        CalculationType::PercentageSi,
        CalculationType::PercentageVn,
        CalculationType::MtplTariff,
        CalculationType::FormulaBased,
        CalculationType::Free,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            CalculationType::FixedAmount => "FIXED_AMOUNT",
            CalculationType::PercentageSi => "PERCENTAGE_SI",
            CalculationType::PercentageVn => "PERCENTAGE_VN",
            CalculationType::MtplTariff => "MTPL_TARIFF",
            CalculationType::FormulaBased => "FORMULA_BASED",
            CalculationType::Free => "FREE",
        }
    }

    /// Whether a tariff rule must govern the premium.
    pub fn requires_rule(&self) -> bool {
        !matches!(self, CalculationType::Free)
    }

    pub fn requires_formula(&self) -> bool {
        matches!(self, CalculationType::FormulaBased)
    }
}

impl fmt::Display for CalculationType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for CalculationType {
    type Err = TarificationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let normalized = s.trim().to_ascii_uppercase();
        CalculationType::ALL
            .into_iter()
            .find(|t| t.as_str() == normalized)
            .ok_or_else(|| {
                TarificationError::invalid_input(
                    "calculation_type",
                    format!("unknown calculation type '{s}'"),
                )
            })
    }
}

fn default_active() -> bool {
    true
}

/// A purchasable guarantee (RC, vol, bris de glaces, ...).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Coverage {
    /// Stable identifier, e.g. "RC" or "IPT"
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub description: String,
    pub calculation_type: CalculationType,
    #[serde(default)]
    pub is_mandatory: bool,
    #[serde(default = "default_active")]
    pub is_active: bool,
    /// Sort key for presentation
    #[serde(default)]
    pub display_order: i32,
    /// Rate classes the coverage is sold for; empty means every class
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub vehicle_categories: Vec<String>,
}

impl Coverage {
    pub fn applies_to_category(&self, category: &str) -> bool {
        self.vehicle_categories.is_empty()
            || self.vehicle_categories.iter().any(|c| c == category)
    }

    /// Ordering key used wherever coverages are listed or recomputed.
    pub fn sort_key(&self) -> (i32, &str) {
        (self.display_order, self.id.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_calculation_type_wire_names() {
        let json = serde_json::to_string(&CalculationType::PercentageSi).unwrap();
        assert_eq!(json, "\"PERCENTAGE_SI\"");
        let parsed: CalculationType = serde_json::from_str("\"MTPL_TARIFF\"").unwrap();
        assert_eq!(parsed, CalculationType::MtplTariff);
        for t in CalculationType::ALL {
            let wire = serde_json::to_string(&t).unwrap();
            assert_eq!(wire, format!("\"{}\"", t.as_str()));
        }
    }

    #[test]
    fn test_calculation_type_from_str() {
        assert_eq!(
            "formula_based".parse::<CalculationType>().unwrap(),
            CalculationType::FormulaBased
        );
        assert!("PERCENT".parse::<CalculationType>().is_err());
    }

    #[test]
    fn test_coverage_defaults_and_applicability() {
        let coverage: Coverage = serde_json::from_str(
            r#"{"id": "VOL", "name": "Vol", "calculation_type": "PERCENTAGE_SI"}"#,
        )
        .unwrap();
        assert!(coverage.is_active);
        assert!(!coverage.is_mandatory);
        assert!(coverage.applies_to_category("401"));

        let restricted = Coverage {
            vehicle_categories: vec!["401".into(), "402".into()],
            ..coverage
        };
        assert!(restricted.applies_to_category("402"));
        assert!(!restricted.applies_to_category("201"));
    }
}
