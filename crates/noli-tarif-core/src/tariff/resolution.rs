//! Tariff rule resolution.
//!
//! Picks the single rule governing a coverage for a concrete vehicle.
//! Candidates are ranked by [`Specificity`]; the most specific wins and an
//! exact tie is reported as a configuration error instead of being broken
//! arbitrarily.

use serde::{Deserialize, Serialize};
use std::cmp::{Ordering, Reverse};
use tracing::debug;

use crate::catalog::{CalculationType, Coverage};
use crate::error::TarificationError;
use crate::tariff::rule::TariffRule;
use crate::tariff::vehicle::{CoverageSelection, VehicleProfile};
use crate::TarificationResult;

/// How tightly a rule constrains fiscal power.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "scope", rename_all = "snake_case")]
pub enum FiscalScope {
    Wildcard,
    /// Only one bound set
    HalfOpen,
    /// Both bounds set; a smaller span is more specific
    Bounded { span: u32 },
}

impl FiscalScope {
    fn of(rule: &TariffRule) -> Self {
        match (rule.min_fiscal_power, rule.max_fiscal_power) {
            (Some(min), Some(max)) => FiscalScope::Bounded {
                span: max.saturating_sub(min),
            },
            (None, None) => FiscalScope::Wildcard,
            _ => FiscalScope::HalfOpen,
        }
    }

    fn rank(&self) -> (u8, Reverse<u32>) {
        match self {
            FiscalScope::Wildcard => (0, Reverse(u32::MAX)),
            FiscalScope::HalfOpen => (1, Reverse(u32::MAX)),
            FiscalScope::Bounded { span } => (2, Reverse(*span)),
        }
    }
}

impl Ord for FiscalScope {
    fn cmp(&self, other: &Self) -> Ordering {
        self.rank().cmp(&other.rank())
    }
}

impl PartialOrd for FiscalScope {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

/// Specificity of a matching rule. Greater is more specific.
///
/// Fields compare in declaration order: category, then fiscal power, then
/// fuel type, then vehicle value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Specificity {
    pub category: bool,
    pub fiscal_power: FiscalScope,
    pub fuel_type: bool,
    pub vehicle_value: bool,
}

impl Specificity {
    pub fn of(rule: &TariffRule) -> Self {
        Self {
            category: rule.vehicle_category.is_some(),
            fiscal_power: FiscalScope::of(rule),
            fuel_type: rule.fuel_type.is_some(),
            vehicle_value: rule.has_value_scope(),
        }
    }
}

/// A candidate that survived filtering, with its rank.
#[derive(Debug, Clone, Serialize)]
pub struct RankedRule<'a> {
    pub rule: &'a TariffRule,
    pub specificity: Specificity,
}

/// Active rules of the coverage that match the vehicle (and formula),
/// most specific first. Ties keep rule-id order.
///
/// FREE coverages never need a rule and yield an empty list.
pub fn rank_candidates<'a>(
    coverage: &Coverage,
    rules: &'a [TariffRule],
    vehicle: &VehicleProfile,
    selection: &CoverageSelection,
) -> TarificationResult<Vec<RankedRule<'a>>> {
    if !coverage.calculation_type.requires_rule() {
        return Ok(Vec::new());
    }

    let formula = if coverage.calculation_type.requires_formula() {
        Some(selection.formula_name().ok_or_else(|| {
            TarificationError::missing_input(
                &coverage.id,
                "formula_name",
                "a formula must be chosen explicitly for a formula-based coverage",
            )
        })?)
    } else {
        None
    };

    let mut ranked: Vec<RankedRule<'a>> = rules
        .iter()
        .filter(|r| r.is_active && r.coverage_id == coverage.id)
        .filter(|r| formula.map_or(true, |f| r.formula_name.as_deref() == Some(f)))
        .filter(|r| r.scope_matches(vehicle))
        .map(|rule| RankedRule {
            rule,
            specificity: Specificity::of(rule),
        })
        .collect();

    ranked.sort_by(|a, b| {
        b.specificity
            .cmp(&a.specificity)
            .then_with(|| a.rule.id.cmp(&b.rule.id))
    });
    Ok(ranked)
}

/// Resolve the rule governing `coverage` for `vehicle`.
///
/// Returns `Ok(None)` only for FREE coverages.
pub fn resolve_rule<'a>(
    coverage: &Coverage,
    rules: &'a [TariffRule],
    vehicle: &VehicleProfile,
    selection: &CoverageSelection,
) -> TarificationResult<Option<&'a TariffRule>> {
    if coverage.calculation_type == CalculationType::Free {
        return Ok(None);
    }

    let ranked = rank_candidates(coverage, rules, vehicle, selection)?;

    let Some(best) = ranked.first() else {
        return Err(TarificationError::NoMatchingRule {
            coverage_id: coverage.id.clone(),
            reason: no_match_reason(coverage, vehicle, selection),
        });
    };

    let tied: Vec<String> = ranked
        .iter()
        .take_while(|r| r.specificity == best.specificity)
        .map(|r| r.rule.id.clone())
        .collect();
    if tied.len() > 1 {
        return Err(TarificationError::ConfigurationAmbiguity {
            coverage_id: coverage.id.clone(),
            rule_ids: tied,
        });
    }

    best.rule.clamp_bounds()?;

    debug!(
        coverage = %coverage.id,
        rule = %best.rule.id,
        candidates = ranked.len(),
        "tariff rule resolved"
    );
    Ok(Some(best.rule))
}

fn no_match_reason(
    coverage: &Coverage,
    vehicle: &VehicleProfile,
    selection: &CoverageSelection,
) -> String {
    let mut reason = format!("no rule matches category {}", vehicle.category);
    if let Some(power) = vehicle.fiscal_power {
        reason.push_str(&format!(", {power} CV"));
    }
    if let Some(fuel) = vehicle.fuel_type {
        reason.push_str(&format!(", {fuel}"));
    }
    if coverage.calculation_type.requires_formula() {
        if let Some(formula) = selection.formula_name() {
            reason.push_str(&format!(", formula {formula}"));
        }
    }
    reason
}
