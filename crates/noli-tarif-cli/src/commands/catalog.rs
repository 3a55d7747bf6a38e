use clap::Args;
use serde_json::Value;

use noli_tarif_core::catalog;
use noli_tarif_core::TarificationConfig;

use crate::commands::load_book;

/// Arguments for the coverage listing
#[derive(Args)]
pub struct CoveragesArgs {
    /// Vehicle category code (defaults to NOLI_DEFAULT_CATEGORY, then 401)
    #[arg(long)]
    pub category: Option<String>,
}

pub fn run_coverages(
    args: CoveragesArgs,
    seed: Option<&str>,
    config: &TarificationConfig,
) -> Result<Value, Box<dyn std::error::Error>> {
    let book = load_book(seed)?;
    let category = config.category_or_default(args.category.as_deref());
    let options = catalog::list_available_coverages(&book, category)?;
    Ok(serde_json::to_value(options)?)
}
