pub mod catalog;
pub mod config;
pub mod error;
pub mod pricing;
pub mod tariff;
pub mod types;

#[cfg(feature = "quote")]
pub mod quote;

pub use config::TarificationConfig;
pub use error::{ErrorKind, TarificationError};
pub use types::*;

/// Standard result type for all tarification operations
pub type TarificationResult<T> = Result<T, TarificationError>;
