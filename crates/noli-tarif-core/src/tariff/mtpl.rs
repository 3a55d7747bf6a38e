use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::error::TarificationError;
use crate::tariff::vehicle::FuelType;
use crate::types::Money;

/// One row of the liability (RC) base-premium grid.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MtplEntry {
    pub vehicle_category: String,
    pub fiscal_power: u32,
    pub fuel_type: FuelType,
    pub base_premium: Money,
}

type GridKey = (String, u32, FuelType);

/// Exact-match RC grid keyed by `(category, fiscal power, fuel type)`.
///
/// No interpolation between fiscal powers: a missing key is a miss.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "Vec<MtplEntry>", into = "Vec<MtplEntry>")]
pub struct MtplGrid {
    entries: BTreeMap<GridKey, Money>,
}

impl MtplGrid {
    pub fn new() -> Self {
        Self::default()
    }

    /// Grid holding a single row, used to replay a stored calculation.
    pub fn single(category: &str, fiscal_power: u32, fuel_type: FuelType, base: Money) -> Self {
        let mut grid = Self::new();
        grid.entries
            .insert((category.to_string(), fiscal_power, fuel_type), base);
        grid
    }

    pub fn from_entries(entries: Vec<MtplEntry>) -> Result<Self, TarificationError> {
        let mut grid = Self::new();
        for entry in entries {
            if entry.base_premium < Money::ZERO {
                return Err(TarificationError::invalid_input(
                    "mtpl_grid.base_premium",
                    format!(
                        "negative base premium for ({}, {} CV, {})",
                        entry.vehicle_category, entry.fiscal_power, entry.fuel_type
                    ),
                ));
            }
            let key = (entry.vehicle_category, entry.fiscal_power, entry.fuel_type);
            if grid.entries.contains_key(&key) {
                return Err(TarificationError::invalid_input(
                    "mtpl_grid",
                    format!("duplicate row for ({}, {} CV, {})", key.0, key.1, key.2),
                ));
            }
            grid.entries.insert(key, entry.base_premium);
        }
        Ok(grid)
    }

    pub fn lookup(&self, category: &str, fiscal_power: u32, fuel_type: FuelType) -> Option<Money> {
        self.entries
            .get(&(category.to_string(), fiscal_power, fuel_type))
            .copied()
    }

    /// Lowest and highest base premium published for a category.
    pub fn range_for_category(&self, category: &str) -> Option<(Money, Money)> {
        self.entries
            .iter()
            .filter(|((c, _, _), _)| c == category)
            .map(|(_, premium)| *premium)
            .fold(None, |acc, p| match acc {
                None => Some((p, p)),
                Some((lo, hi)) => Some((lo.min(p), hi.max(p))),
            })
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn entries(&self) -> Vec<MtplEntry> {
        self.entries
            .iter()
            .map(|((category, power, fuel), premium)| MtplEntry {
                vehicle_category: category.clone(),
                fiscal_power: *power,
                fuel_type: *fuel,
                base_premium: *premium,
            })
            .collect()
    }
}

impl TryFrom<Vec<MtplEntry>> for MtplGrid {
    type Error = TarificationError;

    fn try_from(entries: Vec<MtplEntry>) -> Result<Self, Self::Error> {
        MtplGrid::from_entries(entries)
    }
}

impl From<MtplGrid> for Vec<MtplEntry> {
    fn from(grid: MtplGrid) -> Self {
        grid.entries()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    fn entry(category: &str, power: u32, fuel: FuelType, premium: Money) -> MtplEntry {
        MtplEntry {
            vehicle_category: category.into(),
            fiscal_power: power,
            fuel_type: fuel,
            base_premium: premium,
        }
    }

    #[test]
    fn test_exact_match_only() {
        let grid = MtplGrid::from_entries(vec![
            entry("401", 4, FuelType::Essence, dec!(68_680)),
            entry("401", 6, FuelType::Essence, dec!(87_470)),
        ])
        .unwrap();
        assert_eq!(grid.lookup("401", 4, FuelType::Essence), Some(dec!(68_680)));
        // 5 CV sits between two rows: no interpolation
        assert_eq!(grid.lookup("401", 5, FuelType::Essence), None);
        assert_eq!(grid.lookup("401", 4, FuelType::Diesel), None);
        assert_eq!(grid.lookup("402", 4, FuelType::Essence), None);
    }

    #[test]
    fn test_duplicate_rows_rejected() {
        let err = MtplGrid::from_entries(vec![
            entry("401", 4, FuelType::Essence, dec!(1)),
            entry("401", 4, FuelType::Essence, dec!(2)),
        ])
        .unwrap_err();
        assert!(matches!(err, TarificationError::InvalidInput { .. }));
    }

    #[test]
    fn test_range_for_category() {
        let grid = MtplGrid::from_entries(vec![
            entry("401", 2, FuelType::Essence, dec!(51_630)),
            entry("401", 9, FuelType::Diesel, dec!(121_950)),
            entry("201", 5, FuelType::Diesel, dec!(250_000)),
        ])
        .unwrap();
        assert_eq!(
            grid.range_for_category("401"),
            Some((dec!(51_630), dec!(121_950)))
        );
        assert_eq!(grid.range_for_category("999"), None);
    }

    #[test]
    fn test_grid_serializes_as_rows() {
        let json = r#"[{"vehicle_category":"401","fiscal_power":3,"fuel_type":"essence","base_premium":"59150"}]"#;
        let grid: MtplGrid = serde_json::from_str(json).unwrap();
        assert_eq!(grid.len(), 1);
        let back = serde_json::to_value(&grid).unwrap();
        assert_eq!(back[0]["fiscal_power"], 3);
    }
}
