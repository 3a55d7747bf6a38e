//! Quote coverage aggregator.
//!
//! Owns the rows binding a quote to its coverages, keeps each premium in
//! line with the quote's vehicle and the coverage selection, and exposes the
//! total. Every write to a quote runs under that quote's lock and lands as a
//! single versioned commit.

use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{debug, info, instrument, warn};
use uuid::Uuid;

use crate::catalog::{self, CoverageOption};
use crate::config::TarificationConfig;
use crate::error::{ErrorKind, TarificationError};
use crate::quote::lock::QuoteLocks;
use crate::quote::premium::{total_premium, QuoteCoveragePremium};
use crate::quote::store::{QuoteCommit, QuoteStore, TariffStore};
use crate::tariff::book::replay;
use crate::tariff::{CoverageSelection, TariffBook};
use crate::types::Money;
use crate::TarificationResult;

/// A premium that moved during a recompute.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PremiumChange {
    pub premium_id: Uuid,
    pub coverage_id: String,
    pub previous_amount: Money,
    pub new_amount: Money,
    pub previous_rule_id: Option<String>,
    pub new_rule_id: Option<String>,
}

/// A row that could not be recomputed; it keeps its previous premium.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RecomputeFailure {
    pub premium_id: Uuid,
    pub coverage_id: String,
    pub kind: ErrorKind,
    pub message: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RecomputeReport {
    pub quote_id: Uuid,
    /// Rows examined, in display order
    pub recomputed: usize,
    pub changes: Vec<PremiumChange>,
    pub failures: Vec<RecomputeFailure>,
    pub total_premium: Money,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuditMismatch {
    pub premium_id: Uuid,
    pub coverage_id: String,
    pub stored_amount: Money,
    /// None when the replay itself failed
    pub reproduced_amount: Option<Money>,
    pub error: Option<String>,
}

/// Result of replaying every included row from its stored parameters.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QuoteAudit {
    pub quote_id: Uuid,
    pub version: u64,
    pub total_premium: Money,
    pub reproduced_total: Money,
    pub mismatches: Vec<AuditMismatch>,
}

impl QuoteAudit {
    pub fn is_consistent(&self) -> bool {
        self.mismatches.is_empty() && self.total_premium == self.reproduced_total
    }
}

pub struct QuoteCoverageAggregator<S> {
    store: Arc<S>,
    config: TarificationConfig,
    locks: QuoteLocks,
}

impl<S> QuoteCoverageAggregator<S>
where
    S: TariffStore + QuoteStore,
{
    pub fn new(store: Arc<S>, config: TarificationConfig) -> Self {
        let locks = QuoteLocks::new(config.lock_wait());
        Self {
            store,
            config,
            locks,
        }
    }

    pub fn store(&self) -> &Arc<S> {
        &self.store
    }

    pub fn config(&self) -> &TarificationConfig {
        &self.config
    }

    /// Coverages offered for a category; the configured default applies
    /// when none is given.
    #[instrument(skip(self))]
    pub async fn list_available_coverages(
        &self,
        vehicle_category: Option<&str>,
    ) -> TarificationResult<Vec<CoverageOption>> {
        let book = self.store.load_book().await?;
        let category = self.config.category_or_default(vehicle_category);
        catalog::list_available_coverages(&book, category)
    }

    /// Price a coverage for the quote and store it. Attaching a coverage the
    /// quote already has updates that row.
    #[instrument(skip(self, selection))]
    pub async fn attach_coverage(
        &self,
        quote_id: Uuid,
        coverage_id: &str,
        selection: CoverageSelection,
        is_included: bool,
    ) -> TarificationResult<QuoteCoveragePremium> {
        let _guard = self.locks.acquire(quote_id).await?;

        let vehicle = self
            .config
            .normalize_vehicle(self.store.vehicle_profile(quote_id).await?);
        let snapshot = self.store.quote_snapshot(quote_id).await?;
        let book = self.store.load_book().await?;
        let priced = book.price_coverage(coverage_id, &vehicle, &selection)?;

        let row = match snapshot.row_for_coverage(coverage_id) {
            Some(existing) => {
                let mut row = existing.clone();
                row.apply(priced);
                row.is_included = is_included;
                row
            }
            None => QuoteCoveragePremium::new(quote_id, priced, is_included),
        };

        self.store
            .commit(QuoteCommit::new(quote_id, snapshot.version).upsert(row.clone()))
            .await?;
        debug!(coverage = %row.coverage_id, amount = %row.premium_amount, "coverage attached");
        Ok(row)
    }

    /// Toggle whether a row counts toward the total, repricing it first when
    /// a new selection is given.
    #[instrument(skip(self, new_selection))]
    pub async fn set_inclusion(
        &self,
        premium_id: Uuid,
        is_included: bool,
        new_selection: Option<CoverageSelection>,
    ) -> TarificationResult<QuoteCoveragePremium> {
        let quote_id = self.quote_of(premium_id).await?;
        let _guard = self.locks.acquire(quote_id).await?;

        // Re-read under the lock; the row may have been detached meanwhile
        let snapshot = self.store.quote_snapshot(quote_id).await?;
        let mut row = snapshot
            .row(premium_id)
            .cloned()
            .ok_or(TarificationError::PremiumNotFound(premium_id))?;

        if let Some(selection) = new_selection {
            let vehicle = self
                .config
                .normalize_vehicle(self.store.vehicle_profile(quote_id).await?);
            let book = self.store.load_book().await?;
            let priced = book.price_coverage(&row.coverage_id, &vehicle, &selection)?;
            row.apply(priced);
        }
        row.is_included = is_included;

        self.store
            .commit(QuoteCommit::new(quote_id, snapshot.version).upsert(row.clone()))
            .await?;
        Ok(row)
    }

    /// Reprice every row of the quote against its current vehicle.
    ///
    /// Rows are processed in display order. A row that cannot be priced is
    /// reported and left as it was; the others are still updated.
    #[instrument(skip(self))]
    pub async fn recompute_all(&self, quote_id: Uuid) -> TarificationResult<RecomputeReport> {
        let _guard = self.locks.acquire(quote_id).await?;

        let vehicle = self
            .config
            .normalize_vehicle(self.store.vehicle_profile(quote_id).await?);
        let snapshot = self.store.quote_snapshot(quote_id).await?;
        let book = self.store.load_book().await?;

        let mut rows = snapshot.rows.clone();
        rows.sort_by(|a, b| {
            display_order(&book, &a.coverage_id)
                .cmp(&display_order(&book, &b.coverage_id))
                .then_with(|| a.coverage_id.cmp(&b.coverage_id))
        });

        let mut changes = Vec::new();
        let mut failures = Vec::new();
        let mut commit = QuoteCommit::new(quote_id, snapshot.version);

        for row in rows.iter_mut() {
            let selection = row.calculation_parameters.selection.clone();
            match book.price_coverage(&row.coverage_id, &vehicle, &selection) {
                Ok(priced) if row.differs_from(&priced) => {
                    let change = PremiumChange {
                        premium_id: row.id,
                        coverage_id: row.coverage_id.clone(),
                        previous_amount: row.premium_amount,
                        new_amount: priced.amount(),
                        previous_rule_id: row.tariff_rule_id.clone(),
                        new_rule_id: priced.tariff_rule_id.clone(),
                    };
                    info!(
                        coverage = %change.coverage_id,
                        from = %change.previous_amount,
                        to = %change.new_amount,
                        "premium changed"
                    );
                    row.apply(priced);
                    commit = commit.upsert(row.clone());
                    changes.push(change);
                }
                Ok(_) => {}
                Err(e) => {
                    warn!(coverage = %row.coverage_id, error = %e, "coverage could not be recomputed");
                    failures.push(RecomputeFailure {
                        premium_id: row.id,
                        coverage_id: row.coverage_id.clone(),
                        kind: e.kind(),
                        message: e.to_string(),
                    });
                }
            }
        }

        if !commit.is_empty() {
            self.store.commit(commit).await?;
        }

        Ok(RecomputeReport {
            quote_id,
            recomputed: rows.len(),
            total_premium: total_premium(&rows),
            changes,
            failures,
        })
    }

    /// Remove a row from its quote.
    #[instrument(skip(self))]
    pub async fn detach_coverage(&self, premium_id: Uuid) -> TarificationResult<()> {
        let quote_id = self.quote_of(premium_id).await?;
        let _guard = self.locks.acquire(quote_id).await?;

        let snapshot = self.store.quote_snapshot(quote_id).await?;
        if snapshot.row(premium_id).is_none() {
            return Err(TarificationError::PremiumNotFound(premium_id));
        }
        self.store
            .commit(QuoteCommit::new(quote_id, snapshot.version).remove(premium_id))
            .await?;
        Ok(())
    }

    /// Sum of included premiums, read from one consistent snapshot.
    pub async fn total_premium(&self, quote_id: Uuid) -> TarificationResult<Money> {
        Ok(self.store.quote_snapshot(quote_id).await?.total_premium())
    }

    /// Replay every included row from its stored parameters and the rule it
    /// references, deactivated or not.
    #[instrument(skip(self))]
    pub async fn audit_quote(&self, quote_id: Uuid) -> TarificationResult<QuoteAudit> {
        let snapshot = self.store.quote_snapshot(quote_id).await?;

        let mut mismatches = Vec::new();
        let mut reproduced_total = Money::ZERO;
        for row in snapshot.rows.iter().filter(|r| r.is_included) {
            match self.reproduce(row).await {
                Ok(amount) => {
                    reproduced_total += amount;
                    if amount != row.premium_amount {
                        mismatches.push(AuditMismatch {
                            premium_id: row.id,
                            coverage_id: row.coverage_id.clone(),
                            stored_amount: row.premium_amount,
                            reproduced_amount: Some(amount),
                            error: None,
                        });
                    }
                }
                Err(e) => mismatches.push(AuditMismatch {
                    premium_id: row.id,
                    coverage_id: row.coverage_id.clone(),
                    stored_amount: row.premium_amount,
                    reproduced_amount: None,
                    error: Some(e.to_string()),
                }),
            }
        }

        if !mismatches.is_empty() {
            warn!(count = mismatches.len(), "stored premiums do not replay");
        }

        Ok(QuoteAudit {
            quote_id,
            version: snapshot.version,
            total_premium: snapshot.total_premium(),
            reproduced_total,
            mismatches,
        })
    }

    async fn reproduce(&self, row: &QuoteCoveragePremium) -> TarificationResult<Money> {
        let coverage = self
            .store
            .coverage(&row.coverage_id)
            .await?
            .ok_or_else(|| TarificationError::CoverageNotFound(row.coverage_id.clone()))?;
        let rule = match &row.tariff_rule_id {
            Some(id) => Some(self.store.rule(id).await?.ok_or_else(|| {
                TarificationError::NoMatchingRule {
                    coverage_id: row.coverage_id.clone(),
                    reason: format!("referenced rule {id} no longer exists"),
                }
            })?),
            None => None,
        };
        replay(&coverage, rule.as_ref(), &row.calculation_parameters)
    }

    async fn quote_of(&self, premium_id: Uuid) -> TarificationResult<Uuid> {
        self.store
            .find_premium(premium_id)
            .await?
            .map(|row| row.quote_id)
            .ok_or(TarificationError::PremiumNotFound(premium_id))
    }
}

fn display_order(book: &TariffBook, coverage_id: &str) -> i32 {
    book.coverage(coverage_id)
        .map(|c| c.display_order)
        .unwrap_or(i32::MAX)
}
