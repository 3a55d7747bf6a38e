//! Tariff rules, rule resolution and premium calculation.

pub mod book;
pub mod calculator;
pub mod mtpl;
pub mod resolution;
pub mod rule;
pub mod vehicle;

pub use book::{CalculationParameters, ConfigurationIssue, PricedCoverage, TariffBook};
pub use calculator::{calculate_premium, PremiumComputation, PremiumInputs};
pub use mtpl::{MtplEntry, MtplGrid};
pub use resolution::{rank_candidates, resolve_rule, FiscalScope, RankedRule, Specificity};
pub use rule::{PackDiscount, RuleConditions, TariffRule};
pub use vehicle::{CoverageSelection, FuelType, VehicleProfile};
