use serde_json::{json, Value};

use crate::commands::load_book;

/// Check tariff data for configuration problems.
pub fn run_validate(seed: Option<&str>) -> Result<Value, Box<dyn std::error::Error>> {
    let book = load_book(seed)?;
    let issues = book.validate();
    Ok(json!({
        "coverages": book.coverages.len(),
        "rules": book.rules.len(),
        "mtpl_rows": book.mtpl_grid.len(),
        "issue_count": issues.len(),
        "issues": issues,
    }))
}
