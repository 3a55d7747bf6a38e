//! Quote coverage premiums: storage, per-quote locking and the aggregator.

pub mod aggregator;
pub mod lock;
pub mod memory;
pub mod premium;
pub mod store;

pub use aggregator::{
    AuditMismatch, PremiumChange, QuoteAudit, QuoteCoverageAggregator, RecomputeFailure,
    RecomputeReport,
};
pub use lock::QuoteLocks;
pub use memory::InMemoryStore;
pub use premium::{QuoteCoveragePremium, QuoteSnapshot};
pub use store::{QuoteCommit, QuoteStore, TariffStore};
