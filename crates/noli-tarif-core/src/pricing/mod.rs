pub mod preview;

pub use preview::{
    price_quote, PricedLine, PricingFailure, QuotePricingInput, QuotePricingOutput,
    SelectedCoverage,
};
