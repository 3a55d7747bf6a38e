use serde::{Deserialize, Serialize};

use crate::catalog::{CalculationType, Coverage};
use crate::error::TarificationError;
use crate::tariff::mtpl::MtplGrid;
use crate::tariff::rule::TariffRule;
use crate::tariff::vehicle::{CoverageSelection, VehicleProfile};
use crate::types::{apply_percent, round_premium, round_rate, Money};
use crate::TarificationResult;

/// Everything the calculator reads besides the coverage and its rule.
#[derive(Debug, Clone, Copy)]
pub struct PremiumInputs<'a> {
    pub vehicle: &'a VehicleProfile,
    pub selection: &'a CoverageSelection,
    pub mtpl_grid: &'a MtplGrid,
}

/// Result of pricing one coverage.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PremiumComputation {
    /// Final premium, whole XOF, never negative
    pub amount: Money,
    /// Amount before clamping (two decimals for percentage types)
    pub raw_amount: Money,
    /// A min/max bound changed the amount
    pub clamped: bool,
    pub pack_discount_applied: bool,
    /// RC grid row used, for MTPL_TARIFF coverages
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub mtpl_base_premium: Option<Money>,
}

impl PremiumComputation {
    fn free() -> Self {
        Self {
            amount: Money::ZERO,
            raw_amount: Money::ZERO,
            clamped: false,
            pack_discount_applied: false,
            mtpl_base_premium: None,
        }
    }
}

/// Price one coverage under its resolved rule.
///
/// Pure and deterministic: the same coverage, rule and inputs always give
/// the same amount. FREE coverages cost nothing whatever rule is passed.
pub fn calculate_premium(
    coverage: &Coverage,
    rule: Option<&TariffRule>,
    inputs: PremiumInputs<'_>,
) -> TarificationResult<PremiumComputation> {
    let rule = match (coverage.calculation_type, rule) {
        (CalculationType::Free, _) => return Ok(PremiumComputation::free()),
        (_, Some(rule)) => rule,
        (_, None) => {
            return Err(TarificationError::NoMatchingRule {
                coverage_id: coverage.id.clone(),
                reason: "no rule supplied to the calculator".into(),
            })
        }
    };

    if rule.coverage_id != coverage.id {
        return Err(TarificationError::invalid_input(
            "rule.coverage_id",
            format!(
                "rule {} belongs to coverage {}, not {}",
                rule.id, rule.coverage_id, coverage.id
            ),
        ));
    }

    let mut pack_discount_applied = false;
    let mut mtpl_base_premium = None;

    let raw_amount = match coverage.calculation_type {
        CalculationType::FixedAmount => {
            let base = required_fixed_amount(rule)?;
            match rule.conditions.pack_price_for(inputs.selection) {
                Some(pack_price) => {
                    pack_discount_applied = true;
                    pack_price
                }
                None => base,
            }
        }
        CalculationType::PercentageSi => {
            percentage_of(coverage, rule, inputs.vehicle.sum_insured, "sum_insured")?
        }
        CalculationType::PercentageVn => {
            percentage_of(coverage, rule, inputs.vehicle.new_value, "new_value")?
        }
        CalculationType::MtplTariff => {
            let base = mtpl_lookup(coverage, inputs)?;
            mtpl_base_premium = Some(base);
            base
        }
        CalculationType::FormulaBased => {
            let selected = inputs.selection.formula_name().ok_or_else(|| {
                TarificationError::missing_input(
                    &coverage.id,
                    "formula_name",
                    "a formula must be chosen explicitly for a formula-based coverage",
                )
            })?;
            if rule.formula_name.as_deref() != Some(selected) {
                return Err(TarificationError::invalid_input(
                    "rule.formula_name",
                    format!(
                        "rule {} prices formula {:?}, selection is {selected}",
                        rule.id, rule.formula_name
                    ),
                ));
            }
            required_fixed_amount(rule)?
        }
        CalculationType::Free => Money::ZERO,
    };

    let (amount, clamped) = rule.clamp(round_premium(raw_amount))?;

    Ok(PremiumComputation {
        amount,
        raw_amount: round_rate(raw_amount),
        clamped,
        pack_discount_applied,
        mtpl_base_premium,
    })
}

fn required_fixed_amount(rule: &TariffRule) -> TarificationResult<Money> {
    match rule.fixed_amount {
        Some(amount) if amount >= Money::ZERO => Ok(amount),
        Some(amount) => Err(TarificationError::invalid_input(
            "rule.fixed_amount",
            format!("rule {} has a negative fixed amount ({amount})", rule.id),
        )),
        None => Err(TarificationError::invalid_input(
            "rule.fixed_amount",
            format!("rule {} has no fixed amount", rule.id),
        )),
    }
}

fn percentage_of(
    coverage: &Coverage,
    rule: &TariffRule,
    base: Option<Money>,
    field: &str,
) -> TarificationResult<Money> {
    let base = match base {
        Some(value) if value > Money::ZERO => value,
        Some(value) => {
            return Err(TarificationError::missing_input(
                &coverage.id,
                field,
                format!("must be positive, got {value}"),
            ))
        }
        None => {
            return Err(TarificationError::missing_input(
                &coverage.id,
                field,
                format!("{} requires the vehicle's {field}", coverage.calculation_type),
            ))
        }
    };

    let rate = match rule.base_rate {
        Some(rate) if rate >= Money::ZERO => rate,
        Some(rate) => {
            return Err(TarificationError::invalid_input(
                "rule.base_rate",
                format!("rule {} has a negative rate ({rate})", rule.id),
            ))
        }
        None => {
            return Err(TarificationError::invalid_input(
                "rule.base_rate",
                format!("rule {} has no base rate", rule.id),
            ))
        }
    };

    Ok(apply_percent(base, rate))
}

fn mtpl_lookup(coverage: &Coverage, inputs: PremiumInputs<'_>) -> TarificationResult<Money> {
    let vehicle = inputs.vehicle;
    let power = vehicle.fiscal_power.ok_or_else(|| {
        TarificationError::missing_input(&coverage.id, "fiscal_power", "needed for the RC grid")
    })?;
    let fuel = vehicle.fuel_type.ok_or_else(|| {
        TarificationError::missing_input(&coverage.id, "fuel_type", "needed for the RC grid")
    })?;
    inputs
        .mtpl_grid
        .lookup(&vehicle.category, power, fuel)
        .ok_or_else(|| {
            TarificationError::missing_input(
                &coverage.id,
                "mtpl_base_premium",
                format!(
                    "no RC grid row for ({}, {power} CV, {fuel})",
                    vehicle.category
                ),
            )
        })
}
