use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

#[derive(Debug, Error)]
pub enum TarificationError {
    #[error("Ambiguous tariff rules for coverage {coverage_id}: {rules} are equally specific", rules = .rule_ids.join(", "))]
    ConfigurationAmbiguity {
        coverage_id: String,
        rule_ids: Vec<String>,
    },

    #[error("No active tariff rule for coverage {coverage_id}: {reason}")]
    NoMatchingRule { coverage_id: String, reason: String },

    #[error("Missing required input for coverage {coverage_id}: {field} — {reason}")]
    MissingRequiredInput {
        coverage_id: String,
        field: String,
        reason: String,
    },

    #[error("Invalid clamp bounds on tariff rule {rule_id}: min_amount {min_amount} exceeds max_amount {max_amount}")]
    InvalidClampBounds {
        rule_id: String,
        min_amount: Decimal,
        max_amount: Decimal,
    },

    #[error("Concurrent modification of quote {quote_id}: {reason}")]
    ConcurrentModificationConflict { quote_id: Uuid, reason: String },

    #[error("Invalid input: {field} — {reason}")]
    InvalidInput { field: String, reason: String },

    #[error("Coverage not found: {0}")]
    CoverageNotFound(String),

    #[error("Quote not found: {0}")]
    QuoteNotFound(Uuid),

    #[error("Quote coverage premium not found: {0}")]
    PremiumNotFound(Uuid),

    #[error("Storage error: {0}")]
    Storage(String),

    #[error("Serialization error: {0}")]
    SerializationError(String),
}

/// Stable, serializable classification of a [`TarificationError`].
///
/// Callers use it to tell "premium not computable" apart from a legitimate
/// zero premium without parsing error messages.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    ConfigurationAmbiguity,
    NoMatchingRule,
    MissingRequiredInput,
    InvalidClampBounds,
    ConcurrentModificationConflict,
    InvalidInput,
    NotFound,
    Storage,
    Serialization,
}

impl TarificationError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::ConfigurationAmbiguity { .. } => ErrorKind::ConfigurationAmbiguity,
            Self::NoMatchingRule { .. } => ErrorKind::NoMatchingRule,
            Self::MissingRequiredInput { .. } => ErrorKind::MissingRequiredInput,
            Self::InvalidClampBounds { .. } => ErrorKind::InvalidClampBounds,
            Self::ConcurrentModificationConflict { .. } => {
                ErrorKind::ConcurrentModificationConflict
            }
            Self::InvalidInput { .. } => ErrorKind::InvalidInput,
            Self::CoverageNotFound(_) | Self::QuoteNotFound(_) | Self::PremiumNotFound(_) => {
                ErrorKind::NotFound
            }
            Self::Storage(_) => ErrorKind::Storage,
            Self::SerializationError(_) => ErrorKind::Serialization,
        }
    }

    pub(crate) fn missing_input(
        coverage_id: &str,
        field: &str,
        reason: impl Into<String>,
    ) -> Self {
        Self::MissingRequiredInput {
            coverage_id: coverage_id.to_string(),
            field: field.to_string(),
            reason: reason.into(),
        }
    }

    pub(crate) fn invalid_input(field: &str, reason: impl Into<String>) -> Self {
        Self::InvalidInput {
            field: field.to_string(),
            reason: reason.into(),
        }
    }
}

impl From<serde_json::Error> for TarificationError {
    fn from(e: serde_json::Error) -> Self {
        TarificationError::SerializationError(e.to_string())
    }
}
