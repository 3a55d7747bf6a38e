//! Tariff book: an immutable snapshot of coverages, rules and the RC grid.
//!
//! Loaded once per request from storage (or from a seed file) and only read
//! afterwards, so every price computed from one book is consistent.

use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use tracing::debug;

use crate::catalog::{CalculationType, Coverage};
use crate::error::TarificationError;
use crate::tariff::calculator::{calculate_premium, PremiumComputation, PremiumInputs};
use crate::tariff::mtpl::MtplGrid;
use crate::tariff::resolution::resolve_rule;
use crate::tariff::rule::TariffRule;
use crate::tariff::vehicle::{CoverageSelection, VehicleProfile};
use crate::types::Money;
use crate::TarificationResult;

const BUILTIN_SEED: &str = include_str!("../../data/seed.json");

/// Inputs captured when a premium is computed, enough to replay it against
/// the referenced rule.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CalculationParameters {
    pub calculation_type: CalculationType,
    pub vehicle: VehicleProfile,
    #[serde(default)]
    pub selection: CoverageSelection,
    /// RC grid row in force at computation time
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub mtpl_base_premium: Option<Money>,
}

/// A coverage priced for one vehicle.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PricedCoverage {
    pub coverage_id: String,
    pub calculation_type: CalculationType,
    /// None only for FREE coverages
    pub tariff_rule_id: Option<String>,
    pub computation: PremiumComputation,
    pub parameters: CalculationParameters,
}

impl PricedCoverage {
    pub fn amount(&self) -> Money {
        self.computation.amount
    }
}

/// A problem found by [`TariffBook::validate`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConfigurationIssue {
    /// Coverage or rule id the issue is about
    pub subject: String,
    pub message: String,
}

impl ConfigurationIssue {
    fn new(subject: &str, message: impl Into<String>) -> Self {
        Self {
            subject: subject.to_string(),
            message: message.into(),
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TariffBook {
    #[serde(default)]
    pub coverages: Vec<Coverage>,
    #[serde(default)]
    pub rules: Vec<TariffRule>,
    #[serde(default)]
    pub mtpl_grid: MtplGrid,
}

impl TariffBook {
    pub fn new(coverages: Vec<Coverage>, rules: Vec<TariffRule>, mtpl_grid: MtplGrid) -> Self {
        Self {
            coverages,
            rules,
            mtpl_grid,
        }
    }

    /// The NOLI tariff shipped with the crate.
    pub fn builtin() -> TarificationResult<Self> {
        Self::from_json(BUILTIN_SEED)
    }

    pub fn from_json(json: &str) -> TarificationResult<Self> {
        Ok(serde_json::from_str(json)?)
    }

    pub fn coverage(&self, coverage_id: &str) -> Option<&Coverage> {
        self.coverages.iter().find(|c| c.id == coverage_id)
    }

    /// Any rule by id, active or not; stored premiums may reference rules
    /// that have since been deactivated.
    pub fn rule(&self, rule_id: &str) -> Option<&TariffRule> {
        self.rules.iter().find(|r| r.id == rule_id)
    }

    /// Active rules of one coverage.
    pub fn active_rules_for<'a>(
        &'a self,
        coverage_id: &'a str,
    ) -> impl Iterator<Item = &'a TariffRule> + 'a {
        self.rules
            .iter()
            .filter(move |r| r.is_active && r.coverage_id == coverage_id)
    }

    /// Resolve the governing rule and compute the premium for one coverage.
    pub fn price_coverage(
        &self,
        coverage_id: &str,
        vehicle: &VehicleProfile,
        selection: &CoverageSelection,
    ) -> TarificationResult<PricedCoverage> {
        let coverage = self
            .coverage(coverage_id)
            .ok_or_else(|| TarificationError::CoverageNotFound(coverage_id.to_string()))?;
        if !coverage.is_active {
            return Err(TarificationError::invalid_input(
                "coverage_id",
                format!("coverage {coverage_id} is no longer offered"),
            ));
        }
        let vehicle = &vehicle.normalized();
        if !coverage.applies_to_category(&vehicle.category) {
            return Err(TarificationError::invalid_input(
                "vehicle.category",
                format!(
                    "coverage {coverage_id} is not offered for category {}",
                    vehicle.category
                ),
            ));
        }

        let rule = resolve_rule(coverage, &self.rules, vehicle, selection)?;
        let computation = calculate_premium(
            coverage,
            rule,
            PremiumInputs {
                vehicle,
                selection,
                mtpl_grid: &self.mtpl_grid,
            },
        )?;

        debug!(
            coverage = %coverage.id,
            rule = rule.map(|r| r.id.as_str()).unwrap_or("-"),
            amount = %computation.amount,
            "coverage priced"
        );

        Ok(PricedCoverage {
            coverage_id: coverage.id.clone(),
            calculation_type: coverage.calculation_type,
            tariff_rule_id: rule.map(|r| r.id.clone()),
            parameters: CalculationParameters {
                calculation_type: coverage.calculation_type,
                vehicle: vehicle.clone(),
                selection: selection.clone(),
                mtpl_base_premium: computation.mtpl_base_premium,
            },
            computation,
        })
    }

    /// Replay a stored calculation against the rule it references.
    ///
    /// Uses the captured RC grid row rather than the current grid, so the
    /// replay depends only on the stored parameters and the rule version.
    pub fn reproduce(
        &self,
        coverage_id: &str,
        tariff_rule_id: Option<&str>,
        parameters: &CalculationParameters,
    ) -> TarificationResult<Money> {
        let coverage = self
            .coverage(coverage_id)
            .ok_or_else(|| TarificationError::CoverageNotFound(coverage_id.to_string()))?;
        let rule = match tariff_rule_id {
            Some(id) => Some(self.rule(id).ok_or_else(|| TarificationError::NoMatchingRule {
                coverage_id: coverage_id.to_string(),
                reason: format!("referenced rule {id} no longer exists"),
            })?),
            None => None,
        };
        replay(coverage, rule, parameters)
    }

    /// Configuration problems an administrator should fix.
    pub fn validate(&self) -> Vec<ConfigurationIssue> {
        let mut issues = Vec::new();

        let mut coverage_ids = HashSet::new();
        for coverage in &self.coverages {
            if !coverage_ids.insert(coverage.id.as_str()) {
                issues.push(ConfigurationIssue::new(&coverage.id, "duplicate coverage id"));
            }
        }

        let mut rule_ids = HashSet::new();
        for rule in &self.rules {
            if !rule_ids.insert(rule.id.as_str()) {
                issues.push(ConfigurationIssue::new(&rule.id, "duplicate rule id"));
            }
            match self.coverage(&rule.coverage_id) {
                None => issues.push(ConfigurationIssue::new(
                    &rule.id,
                    format!("references unknown coverage {}", rule.coverage_id),
                )),
                Some(coverage) if rule.is_active => {
                    issues.extend(rule_shape_issues(coverage, rule));
                }
                Some(_) => {}
            }
            if let Err(e) = rule.clamp_bounds() {
                issues.push(ConfigurationIssue::new(&rule.id, e.to_string()));
            }
            if let (Some(min), Some(max)) = (rule.min_fiscal_power, rule.max_fiscal_power) {
                if min > max {
                    issues.push(ConfigurationIssue::new(
                        &rule.id,
                        format!("fiscal power range {min}..{max} is empty"),
                    ));
                }
            }
            if let (Some(min), Some(max)) = (rule.min_vehicle_value, rule.max_vehicle_value) {
                if min > max {
                    issues.push(ConfigurationIssue::new(
                        &rule.id,
                        format!("vehicle value range {min}..{max} is empty"),
                    ));
                }
            }
        }

        let active: Vec<&TariffRule> = self.rules.iter().filter(|r| r.is_active).collect();
        for (i, a) in active.iter().enumerate() {
            for b in &active[i + 1..] {
                if a.id != b.id && a.same_scope(b) {
                    issues.push(ConfigurationIssue::new(
                        &a.coverage_id,
                        format!("rules {} and {} have identical scope and would tie", a.id, b.id),
                    ));
                }
            }
        }

        issues
    }
}

/// Re-run the calculator from a stored parameter snapshot.
pub fn replay(
    coverage: &Coverage,
    rule: Option<&TariffRule>,
    parameters: &CalculationParameters,
) -> TarificationResult<Money> {
    if parameters.calculation_type != coverage.calculation_type {
        return Err(TarificationError::invalid_input(
            "calculation_parameters.calculation_type",
            format!(
                "stored as {}, coverage {} is now {}",
                parameters.calculation_type, coverage.id, coverage.calculation_type
            ),
        ));
    }

    let grid = match (
        parameters.mtpl_base_premium,
        parameters.vehicle.fiscal_power,
        parameters.vehicle.fuel_type,
    ) {
        (Some(base), Some(power), Some(fuel)) => {
            MtplGrid::single(&parameters.vehicle.category, power, fuel, base)
        }
        _ => MtplGrid::new(),
    };

    let computation = calculate_premium(
        coverage,
        rule,
        PremiumInputs {
            vehicle: &parameters.vehicle,
            selection: &parameters.selection,
            mtpl_grid: &grid,
        },
    )?;
    Ok(computation.amount)
}

fn rule_shape_issues(coverage: &Coverage, rule: &TariffRule) -> Vec<ConfigurationIssue> {
    let mut issues = Vec::new();
    match coverage.calculation_type {
        CalculationType::FixedAmount if rule.fixed_amount.is_none() => {
            issues.push(ConfigurationIssue::new(&rule.id, "FIXED_AMOUNT rule without fixed_amount"));
        }
        CalculationType::FormulaBased => {
            if rule.formula_name.is_none() {
                issues.push(ConfigurationIssue::new(&rule.id, "FORMULA_BASED rule without formula_name"));
            }
            if rule.fixed_amount.is_none() {
                issues.push(ConfigurationIssue::new(&rule.id, "FORMULA_BASED rule without fixed_amount"));
            }
        }
        CalculationType::PercentageSi | CalculationType::PercentageVn
            if rule.base_rate.is_none() =>
        {
            issues.push(ConfigurationIssue::new(
                &rule.id,
                format!("{} rule without base_rate", coverage.calculation_type),
            ));
        }
        CalculationType::Free => {
            issues.push(ConfigurationIssue::new(
                &rule.id,
                "rule attached to a FREE coverage is never used",
            ));
        }
        _ => {}
    }
    issues
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tariff::vehicle::FuelType;
    use rust_decimal_macros::dec;

    fn corolla() -> VehicleProfile {
        VehicleProfile {
            category: "401".into(),
            fiscal_power: Some(6),
            fuel_type: Some(FuelType::Essence),
            sum_insured: Some(dec!(5_000_000)),
            new_value: Some(dec!(11_000_000)),
        }
    }

    #[test]
    fn test_builtin_seed_loads_and_is_clean() {
        let book = TariffBook::builtin().unwrap();
        assert!(book.coverage("RC").is_some());
        assert!(book.coverage("IPT").is_some());
        assert!(!book.mtpl_grid.is_empty());
        assert_eq!(book.validate(), Vec::new());
    }

    #[test]
    fn test_price_defense_recours_seed() {
        let book = TariffBook::builtin().unwrap();
        let priced = book
            .price_coverage("DEFENSE_RECOURS", &corolla(), &CoverageSelection::default())
            .unwrap();
        assert_eq!(priced.amount(), dec!(7950));
        assert_eq!(priced.tariff_rule_id.as_deref(), Some("dr_standard"));
    }

    #[test]
    fn test_unknown_coverage() {
        let book = TariffBook::builtin().unwrap();
        let err = book
            .price_coverage("NOPE", &corolla(), &CoverageSelection::default())
            .unwrap_err();
        assert!(matches!(err, TarificationError::CoverageNotFound(_)));
    }

    #[test]
    fn test_coverage_outside_its_categories_is_rejected() {
        let book = TariffBook::builtin().unwrap();
        let moto = VehicleProfile {
            category: "201".into(),
            ..corolla()
        };
        let err = book
            .price_coverage("TIERCE_COMPLETE", &moto, &CoverageSelection::default())
            .unwrap_err();
        assert_eq!(err.kind(), crate::ErrorKind::InvalidInput);
    }

    #[test]
    fn test_padded_category_prices_like_trimmed() {
        let book = TariffBook::builtin().unwrap();
        let padded = VehicleProfile {
            category: " 401 ".into(),
            ..corolla()
        };
        for coverage_id in ["RC", "VOL"] {
            let expected = book
                .price_coverage(coverage_id, &corolla(), &CoverageSelection::default())
                .unwrap();
            let priced = book
                .price_coverage(coverage_id, &padded, &CoverageSelection::default())
                .unwrap();
            assert_eq!(priced.tariff_rule_id, expected.tariff_rule_id, "{coverage_id}");
            assert_eq!(priced.amount(), expected.amount(), "{coverage_id}");
            assert_eq!(priced.parameters.vehicle.category, "401");
        }
    }

    #[test]
    fn test_reproduce_matches_original() {
        let book = TariffBook::builtin().unwrap();
        for coverage_id in ["RC", "DEFENSE_RECOURS", "VOL", "BRIS_GLACES", "ASSISTANCE_BASE"] {
            let priced = book
                .price_coverage(coverage_id, &corolla(), &CoverageSelection::default())
                .unwrap();
            let replayed = book
                .reproduce(
                    coverage_id,
                    priced.tariff_rule_id.as_deref(),
                    &priced.parameters,
                )
                .unwrap();
            assert_eq!(replayed, priced.amount(), "{coverage_id}");
        }
    }

    #[test]
    fn test_reproduce_uses_captured_grid_row() {
        let mut book = TariffBook::builtin().unwrap();
        let priced = book
            .price_coverage("RC", &corolla(), &CoverageSelection::default())
            .unwrap();
        // A later grid revision must not change a stored premium's replay
        book.mtpl_grid = MtplGrid::new();
        let replayed = book
            .reproduce("RC", priced.tariff_rule_id.as_deref(), &priced.parameters)
            .unwrap();
        assert_eq!(replayed, priced.amount());
    }

    #[test]
    fn test_validate_reports_problems() {
        let mut book = TariffBook::builtin().unwrap();
        let mut orphan = TariffRule::new("orphan", "GHOST");
        orphan.fixed_amount = Some(dec!(1));
        let mut twin = book.rule("dr_standard").unwrap().clone();
        twin.id = "dr_twin".into();
        let mut inverted = TariffRule::new("vol_inverted", "VOL");
        inverted.base_rate = Some(dec!(1));
        inverted.vehicle_category = Some("999".into());
        inverted.min_amount = Some(dec!(10));
        inverted.max_amount = Some(dec!(5));
        book.rules.extend([orphan, twin, inverted]);

        let issues = book.validate();
        let subjects: Vec<&str> = issues.iter().map(|i| i.subject.as_str()).collect();
        assert!(subjects.contains(&"orphan"));
        assert!(subjects.contains(&"DEFENSE_RECOURS"));
        assert!(subjects.contains(&"vol_inverted"));
    }
}
