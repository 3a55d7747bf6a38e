use serde::{Deserialize, Serialize};
use std::time::Instant;

use crate::catalog::CalculationType;
use crate::error::{ErrorKind, TarificationError};
use crate::tariff::book::TariffBook;
use crate::tariff::vehicle::{CoverageSelection, VehicleProfile};
use crate::types::{with_metadata, ComputationOutput, Money};
use crate::TarificationResult;

fn default_included() -> bool {
    true
}

/// One coverage the customer picked.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SelectedCoverage {
    pub coverage_id: String,
    #[serde(flatten)]
    pub selection: CoverageSelection,
    #[serde(default = "default_included")]
    pub is_included: bool,
}

impl SelectedCoverage {
    pub fn new(coverage_id: impl Into<String>) -> Self {
        Self {
            coverage_id: coverage_id.into(),
            selection: CoverageSelection::default(),
            is_included: true,
        }
    }

    pub fn with_selection(mut self, selection: CoverageSelection) -> Self {
        self.selection = selection;
        self
    }

    pub fn excluded(mut self) -> Self {
        self.is_included = false;
        self
    }
}

/// Input for pricing a quote without persisting it.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QuotePricingInput {
    pub vehicle: VehicleProfile,
    pub selections: Vec<SelectedCoverage>,
    /// Add the category's mandatory coverages when they were not selected
    #[serde(default)]
    pub include_mandatory: bool,
}

/// A priced coverage line.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PricedLine {
    pub coverage_id: String,
    pub coverage_name: String,
    pub calculation_type: CalculationType,
    pub tariff_rule_id: Option<String>,
    pub premium_amount: Money,
    pub is_included: bool,
    pub clamped: bool,
    pub pack_discount_applied: bool,
}

/// A coverage that could not be priced. Never reported as a zero premium.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PricingFailure {
    pub coverage_id: String,
    pub kind: ErrorKind,
    pub message: String,
}

/// Output of quote pricing.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QuotePricingOutput {
    pub lines: Vec<PricedLine>,
    pub failures: Vec<PricingFailure>,
    /// Sum of included lines
    pub total_premium: Money,
    pub included_count: usize,
}

/// Price every selected coverage of a quote against one vehicle.
///
/// Coverages that cannot be priced are listed in `failures`; the others are
/// still priced. Lines come out in display order.
pub fn price_quote(
    book: &TariffBook,
    input: &QuotePricingInput,
) -> TarificationResult<ComputationOutput<QuotePricingOutput>> {
    let start = Instant::now();
    let mut warnings: Vec<String> = Vec::new();

    let vehicle = input.vehicle.normalized();
    if vehicle.category.is_empty() {
        return Err(TarificationError::invalid_input(
            "vehicle.category",
            "category code must not be empty",
        ));
    }
    let category = vehicle.category.as_str();

    // Later selections of the same coverage replace earlier ones
    let mut selections: Vec<SelectedCoverage> = Vec::new();
    for selected in &input.selections {
        if let Some(pos) = selections
            .iter()
            .position(|s| s.coverage_id == selected.coverage_id)
        {
            warnings.push(format!(
                "{} selected more than once; last selection kept",
                selected.coverage_id
            ));
            selections.remove(pos);
        }
        selections.push(selected.clone());
    }

    let mandatory: Vec<&str> = book
        .coverages
        .iter()
        .filter(|c| c.is_active && c.is_mandatory && c.applies_to_category(category))
        .map(|c| c.id.as_str())
        .collect();
    for id in mandatory {
        if selections.iter().any(|s| s.coverage_id == id && s.is_included) {
            continue;
        }
        if input.include_mandatory {
            match selections.iter_mut().find(|s| s.coverage_id == id) {
                Some(existing) => existing.is_included = true,
                None => selections.push(SelectedCoverage::new(id)),
            }
            warnings.push(format!("Mandatory coverage {id} added to the quote"));
        } else {
            warnings.push(format!("Mandatory coverage {id} is not included in the quote"));
        }
    }

    selections.sort_by(|a, b| {
        let key = |s: &SelectedCoverage| {
            book.coverage(&s.coverage_id)
                .map(|c| c.display_order)
                .unwrap_or(i32::MAX)
        };
        key(a)
            .cmp(&key(b))
            .then_with(|| a.coverage_id.cmp(&b.coverage_id))
    });

    let mut lines = Vec::new();
    let mut failures = Vec::new();
    for selected in &selections {
        match book.price_coverage(&selected.coverage_id, &vehicle, &selected.selection) {
            Ok(priced) => {
                if priced.computation.clamped {
                    warnings.push(format!(
                        "{} premium clamped from {} to {}",
                        priced.coverage_id, priced.computation.raw_amount, priced.computation.amount
                    ));
                }
                let coverage_name = book
                    .coverage(&priced.coverage_id)
                    .map(|c| c.name.clone())
                    .unwrap_or_default();
                lines.push(PricedLine {
                    coverage_name,
                    coverage_id: priced.coverage_id,
                    calculation_type: priced.calculation_type,
                    tariff_rule_id: priced.tariff_rule_id,
                    premium_amount: priced.computation.amount,
                    is_included: selected.is_included,
                    clamped: priced.computation.clamped,
                    pack_discount_applied: priced.computation.pack_discount_applied,
                });
            }
            Err(e) => failures.push(PricingFailure {
                coverage_id: selected.coverage_id.clone(),
                kind: e.kind(),
                message: e.to_string(),
            }),
        }
    }

    if !failures.is_empty() {
        warnings.push(format!(
            "{} coverage(s) could not be priced; total excludes them",
            failures.len()
        ));
    }

    let total_premium: Money = lines
        .iter()
        .filter(|l| l.is_included)
        .map(|l| l.premium_amount)
        .sum();
    let included_count = lines.iter().filter(|l| l.is_included).count();

    let output = QuotePricingOutput {
        lines,
        failures,
        total_premium,
        included_count,
    };

    let elapsed = start.elapsed().as_micros() as u64;

    Ok(with_metadata(
        "Coverage tarification: most-specific tariff rule per coverage, whole-XOF premiums",
        input,
        warnings,
        elapsed,
        output,
    ))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tariff::vehicle::FuelType;
    use rust_decimal_macros::dec;

    fn input(selections: Vec<SelectedCoverage>) -> QuotePricingInput {
        QuotePricingInput {
            vehicle: VehicleProfile {
                category: "401".into(),
                fiscal_power: Some(5),
                fuel_type: Some(FuelType::Essence),
                sum_insured: Some(dec!(3_000_000)),
                new_value: Some(dec!(7_500_000)),
            },
            selections,
            include_mandatory: false,
        }
    }

    #[test]
    fn test_total_counts_included_lines_only() {
        let book = TariffBook::builtin().unwrap();
        let out = price_quote(
            &book,
            &input(vec![
                SelectedCoverage::new("RC"),
                SelectedCoverage::new("DEFENSE_RECOURS"),
                SelectedCoverage::new("IPT")
                    .with_selection(CoverageSelection::formula("formule_2"))
                    .excluded(),
            ]),
        )
        .unwrap();
        let r = &out.result;
        // RC 5 CV essence = 78,200 ; DR = 7,950 ; IPT excluded
        assert_eq!(r.total_premium, dec!(86150));
        assert_eq!(r.included_count, 2);
        assert_eq!(r.lines.len(), 3);
        assert!(r.failures.is_empty());
    }

    #[test]
    fn test_partial_failure_reported() {
        let book = TariffBook::builtin().unwrap();
        let out = price_quote(
            &book,
            &input(vec![
                SelectedCoverage::new("DEFENSE_RECOURS"),
                SelectedCoverage::new("IPT"),
            ]),
        )
        .unwrap();
        let r = &out.result;
        assert_eq!(r.total_premium, dec!(7950));
        assert_eq!(r.failures.len(), 1);
        assert_eq!(r.failures[0].coverage_id, "IPT");
        assert_eq!(r.failures[0].kind, ErrorKind::MissingRequiredInput);
    }

    #[test]
    fn test_mandatory_coverage_warning_and_insertion() {
        let book = TariffBook::builtin().unwrap();
        let out = price_quote(&book, &input(vec![SelectedCoverage::new("DEFENSE_RECOURS")]))
            .unwrap();
        assert!(out.warnings.iter().any(|w| w.contains("Mandatory coverage RC")));
        assert_eq!(out.result.lines.len(), 1);

        let mut with_mandatory = input(vec![SelectedCoverage::new("DEFENSE_RECOURS")]);
        with_mandatory.include_mandatory = true;
        let out = price_quote(&book, &with_mandatory).unwrap();
        assert_eq!(out.result.lines[0].coverage_id, "RC");
        assert_eq!(out.result.total_premium, dec!(78200) + dec!(7950));
    }

    #[test]
    fn test_duplicate_selection_last_wins() {
        let book = TariffBook::builtin().unwrap();
        let out = price_quote(
            &book,
            &input(vec![
                SelectedCoverage::new("IPT").with_selection(CoverageSelection::formula("formule_1")),
                SelectedCoverage::new("IPT").with_selection(CoverageSelection::formula("formule_3")),
            ]),
        )
        .unwrap();
        assert_eq!(out.result.lines.len(), 1);
        assert_eq!(out.result.lines[0].premium_amount, dec!(15900));
        assert!(out.warnings.iter().any(|w| w.contains("more than once")));
    }

    #[test]
    fn test_clamped_line_flagged() {
        let book = TariffBook::builtin().unwrap();
        // 0.45% of 1,000,000 = 4,500, below the 10,000 floor
        let mut low_value = input(vec![SelectedCoverage::new("INCENDIE")]);
        low_value.vehicle.sum_insured = Some(dec!(1_000_000));
        let out = price_quote(&book, &low_value).unwrap();
        assert_eq!(out.result.lines[0].premium_amount, dec!(10000));
        assert!(out.result.lines[0].clamped);
        assert!(out.warnings.iter().any(|w| w.contains("clamped")));
    }

    #[test]
    fn test_forced_mandatory_keeps_caller_selection() {
        let mut book = TariffBook::builtin().unwrap();
        for coverage in book.coverages.iter_mut().filter(|c| c.id == "IPT") {
            coverage.is_mandatory = true;
        }
        let mut request = input(vec![SelectedCoverage::new("IPT")
            .with_selection(CoverageSelection::formula("formule_2"))
            .excluded()]);
        request.include_mandatory = true;

        let out = price_quote(&book, &request).unwrap();
        let ipt = out
            .result
            .lines
            .iter()
            .find(|l| l.coverage_id == "IPT")
            .unwrap();
        assert!(ipt.is_included);
        assert_eq!(ipt.premium_amount, dec!(8400));
        assert!(out.result.failures.is_empty());
    }

    #[test]
    fn test_padded_category_prices_like_trimmed() {
        let book = TariffBook::builtin().unwrap();
        let selections = vec![SelectedCoverage::new("RC"), SelectedCoverage::new("VOL")];
        let plain = price_quote(&book, &input(selections.clone())).unwrap();

        let mut padded = input(selections);
        padded.vehicle.category = " 401 ".into();
        let out = price_quote(&book, &padded).unwrap();

        assert!(out.result.failures.is_empty());
        assert_eq!(out.result.total_premium, plain.result.total_premium);
        let rules: Vec<_> = out.result.lines.iter().map(|l| l.tariff_rule_id.clone()).collect();
        let expected: Vec<_> = plain.result.lines.iter().map(|l| l.tariff_rule_id.clone()).collect();
        assert_eq!(rules, expected);
    }
}
