use napi::Result as NapiResult;
use napi_derive::napi;
use serde::Deserialize;

use noli_tarif_core::catalog;
use noli_tarif_core::pricing::{self, QuotePricingInput};
use noli_tarif_core::tariff::{
    resolve_rule, CalculationParameters, CoverageSelection, TariffBook, VehicleProfile,
};
use noli_tarif_core::TarificationError;

/// Convert any Display error into a napi::Error.
fn to_napi_error(e: impl std::fmt::Display) -> napi::Error {
    napi::Error::from_reason(e.to_string())
}

/// Tarification errors carry their kind so callers can tell "not
/// computable" from other failures without parsing the message.
fn tarification_error(e: TarificationError) -> napi::Error {
    let kind = serde_json::to_value(e.kind())
        .ok()
        .and_then(|v| v.as_str().map(str::to_string))
        .unwrap_or_default();
    napi::Error::from_reason(format!("{kind}: {e}"))
}

/// Tariff data passed by the caller, or the built-in NOLI tariff.
fn book_from(tariff_json: Option<String>) -> NapiResult<TariffBook> {
    match tariff_json {
        Some(json) => TariffBook::from_json(&json).map_err(tarification_error),
        None => TariffBook::builtin().map_err(tarification_error),
    }
}

#[derive(Deserialize)]
struct CoverageRequest {
    coverage_id: String,
    vehicle: VehicleProfile,
    #[serde(default)]
    selection: CoverageSelection,
}

#[derive(Deserialize)]
struct ReplayRequest {
    coverage_id: String,
    tariff_rule_id: Option<String>,
    calculation_parameters: CalculationParameters,
}

// ---------------------------------------------------------------------------
// Catalog
// ---------------------------------------------------------------------------

#[napi]
pub fn list_available_coverages(
    vehicle_category: String,
    tariff_json: Option<String>,
) -> NapiResult<String> {
    let book = book_from(tariff_json)?;
    let options =
        catalog::list_available_coverages(&book, &vehicle_category).map_err(tarification_error)?;
    serde_json::to_string(&options).map_err(to_napi_error)
}

// ---------------------------------------------------------------------------
// Tariff rules and premiums
// ---------------------------------------------------------------------------

#[napi]
pub fn resolve_tariff_rule(input_json: String, tariff_json: Option<String>) -> NapiResult<String> {
    let input: CoverageRequest = serde_json::from_str(&input_json).map_err(to_napi_error)?;
    let book = book_from(tariff_json)?;
    let coverage = book.coverage(&input.coverage_id).ok_or_else(|| {
        tarification_error(TarificationError::CoverageNotFound(
            input.coverage_id.clone(),
        ))
    })?;
    let rule = resolve_rule(coverage, &book.rules, &input.vehicle, &input.selection)
        .map_err(tarification_error)?;
    serde_json::to_string(&rule).map_err(to_napi_error)
}

#[napi]
pub fn calculate_premium(input_json: String, tariff_json: Option<String>) -> NapiResult<String> {
    let input: CoverageRequest = serde_json::from_str(&input_json).map_err(to_napi_error)?;
    let book = book_from(tariff_json)?;
    let priced = book
        .price_coverage(&input.coverage_id, &input.vehicle, &input.selection)
        .map_err(tarification_error)?;
    serde_json::to_string(&priced).map_err(to_napi_error)
}

/// Replay a stored quote row; returns the amount as a string.
#[napi]
pub fn reproduce_premium(input_json: String, tariff_json: Option<String>) -> NapiResult<String> {
    let input: ReplayRequest = serde_json::from_str(&input_json).map_err(to_napi_error)?;
    let book = book_from(tariff_json)?;
    let amount = book
        .reproduce(
            &input.coverage_id,
            input.tariff_rule_id.as_deref(),
            &input.calculation_parameters,
        )
        .map_err(tarification_error)?;
    Ok(amount.to_string())
}

// ---------------------------------------------------------------------------
// Quotes
// ---------------------------------------------------------------------------

#[napi]
pub fn price_quote(input_json: String, tariff_json: Option<String>) -> NapiResult<String> {
    let input: QuotePricingInput = serde_json::from_str(&input_json).map_err(to_napi_error)?;
    let book = book_from(tariff_json)?;
    let output = pricing::price_quote(&book, &input).map_err(tarification_error)?;
    serde_json::to_string(&output).map_err(to_napi_error)
}

// ---------------------------------------------------------------------------
// Administration
// ---------------------------------------------------------------------------

#[napi]
pub fn validate_tariff(tariff_json: Option<String>) -> NapiResult<String> {
    let book = book_from(tariff_json)?;
    serde_json::to_string(&book.validate()).map_err(to_napi_error)
}
