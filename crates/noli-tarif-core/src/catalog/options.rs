use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

use crate::catalog::coverage::{CalculationType, Coverage};
use crate::error::TarificationError;
use crate::tariff::book::TariffBook;
use crate::tariff::rule::TariffRule;
use crate::types::Money;
use crate::TarificationResult;

/// A coverage offered for a vehicle category, with what can be said about
/// its price before the vehicle is fully known.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CoverageOption {
    #[serde(flatten)]
    pub coverage: Coverage,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub estimated_min: Option<Money>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub estimated_max: Option<Money>,
    /// Formula names on offer (FORMULA_BASED only), sorted
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub formulas: Vec<String>,
}

/// Active coverages sold for `vehicle_category`, in display order.
///
/// An unknown category is not an error: only unscoped coverages and rules
/// apply to it.
pub fn list_available_coverages(
    book: &TariffBook,
    vehicle_category: &str,
) -> TarificationResult<Vec<CoverageOption>> {
    let category = vehicle_category.trim();
    if category.is_empty() {
        return Err(TarificationError::invalid_input(
            "vehicle_category",
            "category code must not be empty",
        ));
    }

    let mut coverages: Vec<&Coverage> = book
        .coverages
        .iter()
        .filter(|c| c.is_active && c.applies_to_category(category))
        .collect();
    coverages.sort_by(|a, b| a.sort_key().cmp(&b.sort_key()));

    Ok(coverages
        .into_iter()
        .map(|coverage| {
            let rules: Vec<&TariffRule> = book
                .active_rules_for(&coverage.id)
                .filter(|r| r.matches_category(category))
                .collect();
            let (estimated_min, estimated_max) = estimate_range(book, coverage, category, &rules);
            let formulas = if coverage.calculation_type.requires_formula() {
                rules
                    .iter()
                    .filter_map(|r| r.formula_name.clone())
                    .collect::<BTreeSet<_>>()
                    .into_iter()
                    .collect()
            } else {
                Vec::new()
            };
            CoverageOption {
                coverage: coverage.clone(),
                estimated_min,
                estimated_max,
                formulas,
            }
        })
        .collect())
}

fn estimate_range(
    book: &TariffBook,
    coverage: &Coverage,
    category: &str,
    rules: &[&TariffRule],
) -> (Option<Money>, Option<Money>) {
    match coverage.calculation_type {
        CalculationType::Free => (Some(Money::ZERO), Some(Money::ZERO)),
        CalculationType::FixedAmount | CalculationType::FormulaBased => {
            let amounts = rules.iter().flat_map(|rule| {
                let base = rule.fixed_amount;
                let pack = rule.conditions.pack_discount.as_ref().map(|p| p.amount);
                [base, pack]
                    .into_iter()
                    .flatten()
                    .filter_map(move |amount| rule.clamp(amount).ok().map(|(a, _)| a))
            });
            min_max(amounts)
        }
        CalculationType::PercentageSi | CalculationType::PercentageVn => {
            if rules.is_empty() {
                return (None, None);
            }
            let floors: Option<Vec<Money>> = rules.iter().map(|r| r.min_amount).collect();
            let ceilings: Option<Vec<Money>> = rules.iter().map(|r| r.max_amount).collect();
            (
                floors.and_then(|f| f.into_iter().min()),
                ceilings.and_then(|c| c.into_iter().max()),
            )
        }
        CalculationType::MtplTariff => match book.mtpl_grid.range_for_category(category) {
            Some((lo, hi)) if !rules.is_empty() => (Some(lo), Some(hi)),
            _ => (None, None),
        },
    }
}

fn min_max(amounts: impl Iterator<Item = Money>) -> (Option<Money>, Option<Money>) {
    amounts.fold((None, None), |(lo, hi): (Option<Money>, Option<Money>), a| {
        (
            Some(lo.map_or(a, |l| l.min(a))),
            Some(hi.map_or(a, |h| h.max(a))),
        )
    })
}
