pub mod catalog;
pub mod quote;
pub mod tariff;
pub mod validate;

use noli_tarif_core::tariff::TariffBook;
use tracing::debug;

use crate::input;

/// Tariff data from `--seed <file>` (JSON or YAML), or the built-in NOLI
/// tariff.
pub fn load_book(seed: Option<&str>) -> Result<TariffBook, Box<dyn std::error::Error>> {
    let book: TariffBook = match seed {
        Some(path) => input::file::read_structured(path)?,
        None => TariffBook::builtin()?,
    };
    debug!(
        seed = seed.unwrap_or("builtin"),
        coverages = book.coverages.len(),
        rules = book.rules.len(),
        "tariff loaded"
    );
    Ok(book)
}
