use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::error::TarificationError;
use crate::tariff::vehicle::{CoverageSelection, FuelType, VehicleProfile};
use crate::types::{Money, Percent};
use crate::TarificationResult;

/// Price that replaces a rule's fixed amount when the coverage is bought
/// inside a named pack.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PackDiscount {
    pub pack: String,
    pub amount: Money,
}

/// Rule metadata. Only `pack_discount` takes part in pricing; everything
/// else is carried through untouched for the back office.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct RuleConditions {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pack_discount: Option<PackDiscount>,
    #[serde(flatten)]
    pub extra: BTreeMap<String, serde_json::Value>,
}

impl RuleConditions {
    pub fn is_empty(&self) -> bool {
        self.pack_discount.is_none() && self.extra.is_empty()
    }

    /// The pack price, if the selection was made inside that pack.
    pub fn pack_price_for(&self, selection: &CoverageSelection) -> Option<Money> {
        let discount = self.pack_discount.as_ref()?;
        (selection.pack() == Some(discount.pack.as_str())).then_some(discount.amount)
    }
}

fn default_active() -> bool {
    true
}

/// A conditional pricing entry for one coverage.
///
/// Every scoping predicate is optional; an absent predicate matches any
/// vehicle.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TariffRule {
    pub id: String,
    pub coverage_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub vehicle_category: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub min_fiscal_power: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_fiscal_power: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub fuel_type: Option<FuelType>,
    /// Bounds on the declared value (SI)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub min_vehicle_value: Option<Money>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_vehicle_value: Option<Money>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub formula_name: Option<String>,
    /// Percentage applied by PERCENTAGE_SI / PERCENTAGE_VN
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub base_rate: Option<Percent>,
    /// Amount used by FIXED_AMOUNT / FORMULA_BASED
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub fixed_amount: Option<Money>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub min_amount: Option<Money>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_amount: Option<Money>,
    #[serde(default, skip_serializing_if = "RuleConditions::is_empty")]
    pub conditions: RuleConditions,
    #[serde(default = "default_active")]
    pub is_active: bool,
}

impl TariffRule {
    /// Unscoped, active rule with no pricing fields set.
    pub fn new(id: impl Into<String>, coverage_id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            coverage_id: coverage_id.into(),
            vehicle_category: None,
            min_fiscal_power: None,
            max_fiscal_power: None,
            fuel_type: None,
            min_vehicle_value: None,
            max_vehicle_value: None,
            formula_name: None,
            base_rate: None,
            fixed_amount: None,
            min_amount: None,
            max_amount: None,
            conditions: RuleConditions::default(),
            is_active: true,
        }
    }

    pub fn has_fiscal_power_scope(&self) -> bool {
        self.min_fiscal_power.is_some() || self.max_fiscal_power.is_some()
    }

    pub fn has_value_scope(&self) -> bool {
        self.min_vehicle_value.is_some() || self.max_vehicle_value.is_some()
    }

    pub fn matches_category(&self, category: &str) -> bool {
        self.vehicle_category
            .as_deref()
            .map_or(true, |c| c == category)
    }

    /// Whether every present scoping predicate holds for the vehicle.
    ///
    /// A predicate on a field the vehicle does not carry cannot hold.
    pub fn scope_matches(&self, vehicle: &VehicleProfile) -> bool {
        if !self.matches_category(&vehicle.category) {
            return false;
        }

        if self.has_fiscal_power_scope() {
            let Some(power) = vehicle.fiscal_power else {
                return false;
            };
            if self.min_fiscal_power.is_some_and(|min| power < min)
                || self.max_fiscal_power.is_some_and(|max| power > max)
            {
                return false;
            }
        }

        if let Some(fuel) = self.fuel_type {
            if vehicle.fuel_type != Some(fuel) {
                return false;
            }
        }

        if self.has_value_scope() {
            let Some(value) = vehicle.sum_insured else {
                return false;
            };
            if self.min_vehicle_value.is_some_and(|min| value < min)
                || self.max_vehicle_value.is_some_and(|max| value > max)
            {
                return false;
            }
        }

        true
    }

    /// Clamp interval `[min_amount ?? 0, max_amount]`.
    pub fn clamp_bounds(&self) -> TarificationResult<(Money, Option<Money>)> {
        let floor = self.min_amount.unwrap_or(Money::ZERO).max(Money::ZERO);
        if let Some(ceiling) = self.max_amount {
            if floor > ceiling {
                return Err(TarificationError::InvalidClampBounds {
                    rule_id: self.id.clone(),
                    min_amount: floor,
                    max_amount: ceiling,
                });
            }
        }
        Ok((floor, self.max_amount))
    }

    /// Keep `amount` inside the rule's bounds. Returns the amount and
    /// whether a bound was applied.
    pub fn clamp(&self, amount: Money) -> TarificationResult<(Money, bool)> {
        let (floor, ceiling) = self.clamp_bounds()?;
        let mut clamped = amount.max(floor);
        if let Some(ceiling) = ceiling {
            clamped = clamped.min(ceiling);
        }
        Ok((clamped, clamped != amount))
    }

    /// Whether two rules are scoped identically (same coverage, formula and
    /// predicates), which makes them tie on every vehicle they match.
    pub fn same_scope(&self, other: &TariffRule) -> bool {
        self.coverage_id == other.coverage_id
            && self.formula_name == other.formula_name
            && self.vehicle_category == other.vehicle_category
            && self.min_fiscal_power == other.min_fiscal_power
            && self.max_fiscal_power == other.max_fiscal_power
            && self.fuel_type == other.fuel_type
            && self.min_vehicle_value == other.min_vehicle_value
            && self.max_vehicle_value == other.max_vehicle_value
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    fn vehicle_401() -> VehicleProfile {
        VehicleProfile {
            category: "401".into(),
            fiscal_power: Some(7),
            fuel_type: Some(FuelType::Essence),
            sum_insured: Some(dec!(4_000_000)),
            new_value: Some(dec!(9_000_000)),
        }
    }

    #[test]
    fn test_unscoped_rule_matches_anything() {
        let rule = TariffRule::new("r1", "DEFENSE_RECOURS");
        assert!(rule.scope_matches(&vehicle_401()));
        assert!(rule.scope_matches(&VehicleProfile::default()));
    }

    #[test]
    fn test_fiscal_power_range_inclusive() {
        let mut rule = TariffRule::new("r1", "TIERCE_COMPLETE");
        rule.min_fiscal_power = Some(7);
        rule.max_fiscal_power = Some(10);
        assert!(rule.scope_matches(&vehicle_401()));

        let mut vehicle = vehicle_401();
        vehicle.fiscal_power = Some(11);
        assert!(!rule.scope_matches(&vehicle));

        vehicle.fiscal_power = None;
        assert!(!rule.scope_matches(&vehicle));
    }

    #[test]
    fn test_fuel_and_value_predicates() {
        let mut rule = TariffRule::new("r1", "VOL");
        rule.fuel_type = Some(FuelType::Diesel);
        assert!(!rule.scope_matches(&vehicle_401()));

        let mut rule = TariffRule::new("r2", "VOL");
        rule.max_vehicle_value = Some(dec!(5_000_000));
        assert!(rule.scope_matches(&vehicle_401()));
        rule.max_vehicle_value = Some(dec!(3_000_000));
        assert!(!rule.scope_matches(&vehicle_401()));
    }

    #[test]
    fn test_clamp_applies_floor_and_ceiling() {
        let mut rule = TariffRule::new("r1", "BRIS_GLACES");
        rule.min_amount = Some(dec!(10000));
        rule.max_amount = Some(dec!(50000));
        assert_eq!(rule.clamp(dec!(5000)).unwrap(), (dec!(10000), true));
        assert_eq!(rule.clamp(dec!(60000)).unwrap(), (dec!(50000), true));
        assert_eq!(rule.clamp(dec!(20000)).unwrap(), (dec!(20000), false));
    }

    #[test]
    fn test_clamp_floor_defaults_to_zero() {
        let rule = TariffRule::new("r1", "X");
        assert_eq!(rule.clamp(dec!(-10)).unwrap(), (dec!(0), true));
    }

    #[test]
    fn test_inverted_bounds_rejected() {
        let mut rule = TariffRule::new("r1", "X");
        rule.min_amount = Some(dec!(50000));
        rule.max_amount = Some(dec!(10000));
        let err = rule.clamp_bounds().unwrap_err();
        assert!(matches!(err, TarificationError::InvalidClampBounds { .. }));
    }

    #[test]
    fn test_pack_price_requires_matching_pack() {
        let mut rule = TariffRule::new("r1", "DEFENSE_RECOURS");
        rule.conditions.pack_discount = Some(PackDiscount {
            pack: "PACK_SERENITE".into(),
            amount: dec!(6950),
        });
        assert_eq!(rule.conditions.pack_price_for(&CoverageSelection::default()), None);
        let in_pack = CoverageSelection::default().in_pack("PACK_SERENITE");
        assert_eq!(rule.conditions.pack_price_for(&in_pack), Some(dec!(6950)));
        let other_pack = CoverageSelection::default().in_pack("PACK_CONFORT");
        assert_eq!(rule.conditions.pack_price_for(&other_pack), None);
    }

    #[test]
    fn test_conditions_keep_extra_metadata() {
        let rule: TariffRule = serde_json::from_str(
            r#"{
                "id": "dr_std",
                "coverage_id": "DEFENSE_RECOURS",
                "fixed_amount": 7950,
                "conditions": {
                    "pack_discount": {"pack": "PACK_SERENITE", "amount": 6950},
                    "source": "grille 2024"
                }
            }"#,
        )
        .unwrap();
        assert!(rule.is_active);
        assert_eq!(rule.fixed_amount, Some(dec!(7950)));
        assert_eq!(
            rule.conditions.extra.get("source"),
            Some(&serde_json::json!("grille 2024"))
        );
    }
}
