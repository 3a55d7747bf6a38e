pub mod coverage;
pub mod options;

pub use coverage::{CalculationType, Coverage};
pub use options::{list_available_coverages, CoverageOption};
