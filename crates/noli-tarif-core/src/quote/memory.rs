//! In-memory storage backend.

use async_trait::async_trait;
use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use tokio::sync::RwLock;
use uuid::Uuid;

use crate::catalog::Coverage;
use crate::error::TarificationError;
use crate::quote::premium::{QuoteCoveragePremium, QuoteSnapshot};
use crate::quote::store::{QuoteCommit, QuoteStore, TariffStore};
use crate::tariff::{MtplGrid, TariffBook, TariffRule, VehicleProfile};
use crate::TarificationResult;

#[derive(Debug, Clone)]
struct QuoteState {
    vehicle: VehicleProfile,
    version: u64,
    rows: Vec<QuoteCoveragePremium>,
}

/// Tariff data and quotes held in concurrent maps.
///
/// Each quote's rows live in one map entry, so a commit or snapshot sees
/// the quote whole.
pub struct InMemoryStore {
    coverages: DashMap<String, Coverage>,
    rules: DashMap<String, TariffRule>,
    mtpl_grid: RwLock<MtplGrid>,
    quotes: DashMap<Uuid, QuoteState>,
    /// premium id -> quote id
    premium_index: DashMap<Uuid, Uuid>,
}

impl Default for InMemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::from_book(TariffBook::default())
    }

    pub fn from_book(book: TariffBook) -> Self {
        let TariffBook {
            coverages,
            rules,
            mtpl_grid,
        } = book;
        Self {
            coverages: coverages.into_iter().map(|c| (c.id.clone(), c)).collect(),
            rules: rules.into_iter().map(|r| (r.id.clone(), r)).collect(),
            mtpl_grid: RwLock::new(mtpl_grid),
            quotes: DashMap::new(),
            premium_index: DashMap::new(),
        }
    }

    /// Register a quote and the vehicle it prices.
    pub fn insert_quote(&self, quote_id: Uuid, vehicle: VehicleProfile) -> TarificationResult<()> {
        match self.quotes.entry(quote_id) {
            Entry::Occupied(_) => Err(TarificationError::invalid_input(
                "quote_id",
                format!("quote {quote_id} already exists"),
            )),
            Entry::Vacant(slot) => {
                slot.insert(QuoteState {
                    vehicle,
                    version: 0,
                    rows: Vec::new(),
                });
                Ok(())
            }
        }
    }

    /// Replace the vehicle of a quote; premiums stay as they are until
    /// recomputed.
    pub fn update_vehicle(&self, quote_id: Uuid, vehicle: VehicleProfile) -> TarificationResult<()> {
        let mut state = self
            .quotes
            .get_mut(&quote_id)
            .ok_or(TarificationError::QuoteNotFound(quote_id))?;
        state.vehicle = vehicle;
        Ok(())
    }

    pub fn upsert_rule(&self, rule: TariffRule) {
        self.rules.insert(rule.id.clone(), rule);
    }

    pub fn deactivate_rule(&self, rule_id: &str) -> TarificationResult<()> {
        let mut rule = self.rules.get_mut(rule_id).ok_or_else(|| {
            TarificationError::invalid_input("rule_id", format!("unknown tariff rule {rule_id}"))
        })?;
        rule.is_active = false;
        Ok(())
    }

    pub async fn replace_mtpl_grid(&self, grid: MtplGrid) {
        *self.mtpl_grid.write().await = grid;
    }
}

#[async_trait]
impl TariffStore for InMemoryStore {
    async fn active_coverages(&self) -> TarificationResult<Vec<Coverage>> {
        Ok(self
            .coverages
            .iter()
            .filter(|c| c.is_active)
            .map(|c| c.value().clone())
            .collect())
    }

    async fn coverage(&self, coverage_id: &str) -> TarificationResult<Option<Coverage>> {
        Ok(self.coverages.get(coverage_id).map(|c| c.value().clone()))
    }

    async fn active_rules(&self, coverage_id: &str) -> TarificationResult<Vec<TariffRule>> {
        let mut rules: Vec<TariffRule> = self
            .rules
            .iter()
            .filter(|r| r.is_active && r.coverage_id == coverage_id)
            .map(|r| r.value().clone())
            .collect();
        rules.sort_by(|a, b| a.id.cmp(&b.id));
        Ok(rules)
    }

    async fn rule(&self, rule_id: &str) -> TarificationResult<Option<TariffRule>> {
        Ok(self.rules.get(rule_id).map(|r| r.value().clone()))
    }

    async fn mtpl_grid(&self) -> TarificationResult<MtplGrid> {
        Ok(self.mtpl_grid.read().await.clone())
    }
}

#[async_trait]
impl QuoteStore for InMemoryStore {
    async fn vehicle_profile(&self, quote_id: Uuid) -> TarificationResult<VehicleProfile> {
        self.quotes
            .get(&quote_id)
            .map(|q| q.vehicle.clone())
            .ok_or(TarificationError::QuoteNotFound(quote_id))
    }

    async fn quote_snapshot(&self, quote_id: Uuid) -> TarificationResult<QuoteSnapshot> {
        self.quotes
            .get(&quote_id)
            .map(|q| QuoteSnapshot {
                quote_id,
                version: q.version,
                rows: q.rows.clone(),
            })
            .ok_or(TarificationError::QuoteNotFound(quote_id))
    }

    async fn find_premium(
        &self,
        premium_id: Uuid,
    ) -> TarificationResult<Option<QuoteCoveragePremium>> {
        let Some(quote_id) = self.premium_index.get(&premium_id).map(|q| *q) else {
            return Ok(None);
        };
        Ok(self
            .quotes
            .get(&quote_id)
            .and_then(|q| q.rows.iter().find(|r| r.id == premium_id).cloned()))
    }

    async fn commit(&self, commit: QuoteCommit) -> TarificationResult<u64> {
        let QuoteCommit {
            quote_id,
            expected_version,
            upserts,
            removals,
        } = commit;

        let mut state = self
            .quotes
            .get_mut(&quote_id)
            .ok_or(TarificationError::QuoteNotFound(quote_id))?;
        if state.version != expected_version {
            return Err(TarificationError::ConcurrentModificationConflict {
                quote_id,
                reason: format!(
                    "expected version {expected_version}, quote is at {}",
                    state.version
                ),
            });
        }

        // Validate on a copy so a rejected commit leaves nothing behind
        let mut rows = state.rows.clone();
        rows.retain(|r| !removals.contains(&r.id));
        for row in &upserts {
            if row.quote_id != quote_id {
                return Err(TarificationError::invalid_input(
                    "quote_id",
                    format!("row {} belongs to quote {}", row.id, row.quote_id),
                ));
            }
            if rows
                .iter()
                .any(|r| r.coverage_id == row.coverage_id && r.id != row.id)
            {
                return Err(TarificationError::invalid_input(
                    "coverage_id",
                    format!("{} is already attached to quote {quote_id}", row.coverage_id),
                ));
            }
            match rows.iter_mut().find(|r| r.id == row.id) {
                Some(existing) => *existing = row.clone(),
                None => rows.push(row.clone()),
            }
        }

        state.rows = rows;
        state.version += 1;
        let version = state.version;
        drop(state);

        for id in &removals {
            self.premium_index.remove(id);
        }
        for row in &upserts {
            self.premium_index.insert(row.id, quote_id);
        }
        Ok(version)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tariff::CoverageSelection;
    use rust_decimal_macros::dec;

    fn store_with_quote() -> (InMemoryStore, Uuid) {
        let store = InMemoryStore::from_book(TariffBook::builtin().unwrap());
        let quote_id = Uuid::new_v4();
        store
            .insert_quote(
                quote_id,
                VehicleProfile {
                    category: "401".into(),
                    ..Default::default()
                },
            )
            .unwrap();
        (store, quote_id)
    }

    fn dr_row(store: &InMemoryStore, quote_id: Uuid) -> QuoteCoveragePremium {
        let book = TariffBook::builtin().unwrap();
        let vehicle = store.quotes.get(&quote_id).unwrap().vehicle.clone();
        let priced = book
            .price_coverage("DEFENSE_RECOURS", &vehicle, &CoverageSelection::default())
            .unwrap();
        QuoteCoveragePremium::new(quote_id, priced, true)
    }

    #[tokio::test]
    async fn test_duplicate_quote_insert_keeps_first_vehicle() {
        let (store, quote_id) = store_with_quote();
        let err = store
            .insert_quote(
                quote_id,
                VehicleProfile {
                    category: "201".into(),
                    ..Default::default()
                },
            )
            .unwrap_err();
        assert_eq!(err.kind(), crate::ErrorKind::InvalidInput);
        assert_eq!(store.vehicle_profile(quote_id).await.unwrap().category, "401");
    }

    #[test]
    fn test_concurrent_quote_inserts_admit_one() {
        let store = std::sync::Arc::new(InMemoryStore::new());
        let quote_id = Uuid::new_v4();
        let handles: Vec<_> = (0..8u32)
            .map(|power| {
                let store = std::sync::Arc::clone(&store);
                std::thread::spawn(move || {
                    store
                        .insert_quote(
                            quote_id,
                            VehicleProfile {
                                category: "401".into(),
                                fiscal_power: Some(power),
                                ..Default::default()
                            },
                        )
                        .is_ok()
                })
            })
            .collect();
        let admitted = handles
            .into_iter()
            .map(|h| h.join().unwrap())
            .filter(|ok| *ok)
            .count();
        assert_eq!(admitted, 1);
    }

    #[tokio::test]
    async fn test_commit_bumps_version_and_indexes_rows() {
        let (store, quote_id) = store_with_quote();
        let row = dr_row(&store, quote_id);
        let version = store
            .commit(QuoteCommit::new(quote_id, 0).upsert(row.clone()))
            .await
            .unwrap();
        assert_eq!(version, 1);
        let found = store.find_premium(row.id).await.unwrap().unwrap();
        assert_eq!(found.premium_amount, dec!(7950));
    }

    #[tokio::test]
    async fn test_stale_commit_rejected() {
        let (store, quote_id) = store_with_quote();
        let row = dr_row(&store, quote_id);
        store
            .commit(QuoteCommit::new(quote_id, 0).upsert(row.clone()))
            .await
            .unwrap();
        let err = store
            .commit(QuoteCommit::new(quote_id, 0).remove(row.id))
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            TarificationError::ConcurrentModificationConflict { .. }
        ));
        assert_eq!(store.quote_snapshot(quote_id).await.unwrap().rows.len(), 1);
    }

    #[tokio::test]
    async fn test_second_row_for_same_coverage_rejected() {
        let (store, quote_id) = store_with_quote();
        store
            .commit(QuoteCommit::new(quote_id, 0).upsert(dr_row(&store, quote_id)))
            .await
            .unwrap();
        let err = store
            .commit(QuoteCommit::new(quote_id, 1).upsert(dr_row(&store, quote_id)))
            .await
            .unwrap_err();
        assert!(matches!(err, TarificationError::InvalidInput { .. }));
        assert_eq!(store.quote_snapshot(quote_id).await.unwrap().version, 1);
    }

    #[tokio::test]
    async fn test_deactivated_rule_still_readable() {
        let (store, _) = store_with_quote();
        store.deactivate_rule("dr_standard").unwrap();
        assert!(store.active_rules("DEFENSE_RECOURS").await.unwrap().is_empty());
        let rule = store.rule("dr_standard").await.unwrap().unwrap();
        assert!(!rule.is_active);
    }

    #[tokio::test]
    async fn test_unknown_quote() {
        let store = InMemoryStore::new();
        let err = store.vehicle_profile(Uuid::new_v4()).await.unwrap_err();
        assert!(matches!(err, TarificationError::QuoteNotFound(_)));
    }
}
