use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::tariff::book::{CalculationParameters, PricedCoverage};
use crate::types::Money;

/// A coverage attached to a quote, with the premium computed for it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QuoteCoveragePremium {
    pub id: Uuid,
    pub quote_id: Uuid,
    pub coverage_id: String,
    /// Rule that produced the premium; None for FREE coverages
    pub tariff_rule_id: Option<String>,
    pub calculation_parameters: CalculationParameters,
    pub premium_amount: Money,
    pub is_included: bool,
    pub computed_at: DateTime<Utc>,
}

impl QuoteCoveragePremium {
    pub fn new(quote_id: Uuid, priced: PricedCoverage, is_included: bool) -> Self {
        Self {
            id: Uuid::new_v4(),
            quote_id,
            premium_amount: priced.amount(),
            coverage_id: priced.coverage_id,
            tariff_rule_id: priced.tariff_rule_id,
            calculation_parameters: priced.parameters,
            is_included,
            computed_at: Utc::now(),
        }
    }

    /// Overwrite the computed state, keeping identity and inclusion.
    pub fn apply(&mut self, priced: PricedCoverage) {
        self.premium_amount = priced.amount();
        self.tariff_rule_id = priced.tariff_rule_id;
        self.calculation_parameters = priced.parameters;
        self.computed_at = Utc::now();
    }

    /// True when `priced` would change what is stored.
    pub fn differs_from(&self, priced: &PricedCoverage) -> bool {
        self.premium_amount != priced.amount()
            || self.tariff_rule_id != priced.tariff_rule_id
            || self.calculation_parameters != priced.parameters
    }
}

/// All rows of one quote at a given version.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QuoteSnapshot {
    pub quote_id: Uuid,
    /// Bumped by every committed write
    pub version: u64,
    pub rows: Vec<QuoteCoveragePremium>,
}

impl QuoteSnapshot {
    pub fn row(&self, premium_id: Uuid) -> Option<&QuoteCoveragePremium> {
        self.rows.iter().find(|r| r.id == premium_id)
    }

    pub fn row_for_coverage(&self, coverage_id: &str) -> Option<&QuoteCoveragePremium> {
        self.rows.iter().find(|r| r.coverage_id == coverage_id)
    }

    pub fn total_premium(&self) -> Money {
        total_premium(&self.rows)
    }
}

/// Sum of included premiums.
pub fn total_premium(rows: &[QuoteCoveragePremium]) -> Money {
    rows.iter()
        .filter(|r| r.is_included)
        .map(|r| r.premium_amount)
        .sum()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::CalculationType;
    use crate::tariff::{CoverageSelection, VehicleProfile};
    use rust_decimal_macros::dec;

    fn row(amount: Money, is_included: bool) -> QuoteCoveragePremium {
        QuoteCoveragePremium {
            id: Uuid::new_v4(),
            quote_id: Uuid::nil(),
            coverage_id: format!("C{amount}"),
            tariff_rule_id: None,
            calculation_parameters: CalculationParameters {
                calculation_type: CalculationType::FixedAmount,
                vehicle: VehicleProfile::default(),
                selection: CoverageSelection::default(),
                mtpl_base_premium: None,
            },
            premium_amount: amount,
            is_included,
            computed_at: Utc::now(),
        }
    }

    #[test]
    fn test_total_sums_included_rows() {
        let rows = vec![
            row(dec!(50000), true),
            row(dec!(7950), true),
            row(dec!(0), true),
            row(dec!(100000), false),
        ];
        assert_eq!(total_premium(&rows), dec!(57950));
    }

    #[test]
    fn test_empty_quote_totals_zero() {
        let snapshot = QuoteSnapshot {
            quote_id: Uuid::nil(),
            version: 0,
            rows: Vec::new(),
        };
        assert_eq!(snapshot.total_premium(), Money::ZERO);
    }
}
