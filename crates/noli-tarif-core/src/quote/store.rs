//! Persistence collaborators consumed by the aggregator.

use async_trait::async_trait;
use uuid::Uuid;

use crate::catalog::Coverage;
use crate::quote::premium::{QuoteCoveragePremium, QuoteSnapshot};
use crate::tariff::{MtplGrid, TariffBook, TariffRule, VehicleProfile};
use crate::TarificationResult;

/// Read access to tariff data.
#[async_trait]
pub trait TariffStore: Send + Sync {
    /// Active coverages, any category
    async fn active_coverages(&self) -> TarificationResult<Vec<Coverage>>;

    /// A coverage by id, active or not
    async fn coverage(&self, coverage_id: &str) -> TarificationResult<Option<Coverage>>;

    /// Active rules of one coverage
    async fn active_rules(&self, coverage_id: &str) -> TarificationResult<Vec<TariffRule>>;

    /// A rule by id, active or not
    async fn rule(&self, rule_id: &str) -> TarificationResult<Option<TariffRule>>;

    async fn mtpl_grid(&self) -> TarificationResult<MtplGrid>;

    /// Snapshot of everything currently sellable.
    async fn load_book(&self) -> TarificationResult<TariffBook> {
        let coverages = self.active_coverages().await?;
        let mut rules = Vec::new();
        for coverage in &coverages {
            rules.extend(self.active_rules(&coverage.id).await?);
        }
        let mtpl_grid = self.mtpl_grid().await?;
        Ok(TariffBook::new(coverages, rules, mtpl_grid))
    }
}

/// A set of row writes applied to one quote as a unit.
#[derive(Debug, Clone)]
pub struct QuoteCommit {
    pub quote_id: Uuid,
    /// Version the writer read; a mismatch rejects the whole commit
    pub expected_version: u64,
    /// Rows to insert or replace, matched by id
    pub upserts: Vec<QuoteCoveragePremium>,
    /// Row ids to delete
    pub removals: Vec<Uuid>,
}

impl QuoteCommit {
    pub fn new(quote_id: Uuid, expected_version: u64) -> Self {
        Self {
            quote_id,
            expected_version,
            upserts: Vec::new(),
            removals: Vec::new(),
        }
    }

    pub fn upsert(mut self, row: QuoteCoveragePremium) -> Self {
        self.upserts.push(row);
        self
    }

    pub fn remove(mut self, premium_id: Uuid) -> Self {
        self.removals.push(premium_id);
        self
    }

    pub fn is_empty(&self) -> bool {
        self.upserts.is_empty() && self.removals.is_empty()
    }
}

/// Quote context and coverage-premium rows.
#[async_trait]
pub trait QuoteStore: Send + Sync {
    /// Vehicle the quote is for; `QuoteNotFound` when the quote is unknown
    async fn vehicle_profile(&self, quote_id: Uuid) -> TarificationResult<VehicleProfile>;

    /// All rows of a quote, read atomically
    async fn quote_snapshot(&self, quote_id: Uuid) -> TarificationResult<QuoteSnapshot>;

    async fn find_premium(&self, premium_id: Uuid)
        -> TarificationResult<Option<QuoteCoveragePremium>>;

    /// Apply `commit` atomically and return the new version.
    ///
    /// Fails with `ConcurrentModificationConflict` when the quote moved past
    /// `expected_version`, and with `InvalidInput` when an upsert would give
    /// the quote two rows for the same coverage.
    async fn commit(&self, commit: QuoteCommit) -> TarificationResult<u64>;
}
