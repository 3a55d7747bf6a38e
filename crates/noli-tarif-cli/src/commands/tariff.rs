use clap::Args;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use noli_tarif_core::tariff::{
    rank_candidates, resolve_rule, CoverageSelection, Specificity, VehicleProfile,
};
use noli_tarif_core::{TarificationConfig, TarificationError};

use crate::commands::load_book;
use crate::input;

/// Arguments for rule resolution
#[derive(Args)]
pub struct ResolveArgs {
    /// Coverage id (overrides `coverage_id` in the input)
    #[arg(long)]
    pub coverage: Option<String>,
    /// Path to JSON/YAML input file
    #[arg(long)]
    pub input: Option<String>,
}

/// Arguments for premium calculation
#[derive(Args)]
pub struct PremiumArgs {
    /// Coverage id (overrides `coverage_id` in the input)
    #[arg(long)]
    pub coverage: Option<String>,
    /// Path to JSON/YAML input file
    #[arg(long)]
    pub input: Option<String>,
}

/// One coverage priced for one vehicle.
#[derive(Debug, Deserialize)]
pub struct PremiumRequest {
    #[serde(default)]
    pub coverage_id: Option<String>,
    pub vehicle: VehicleProfile,
    #[serde(default)]
    pub selection: CoverageSelection,
}

#[derive(Debug, Serialize)]
struct Candidate {
    rule_id: String,
    specificity: Specificity,
}

fn read_request(
    path: Option<&str>,
    coverage_flag: Option<String>,
    what: &str,
    config: &TarificationConfig,
) -> Result<(String, PremiumRequest), Box<dyn std::error::Error>> {
    let mut request: PremiumRequest = input::read_input(path, what)?;
    let coverage_id = coverage_flag
        .or_else(|| request.coverage_id.clone())
        .ok_or("--coverage <id> or `coverage_id` in the input is required")?;
    request.vehicle = config.normalize_vehicle(request.vehicle);
    Ok((coverage_id, request))
}

pub fn run_resolve(
    args: ResolveArgs,
    seed: Option<&str>,
    config: &TarificationConfig,
) -> Result<Value, Box<dyn std::error::Error>> {
    let (coverage_id, request) =
        read_request(args.input.as_deref(), args.coverage, "rule resolution", config)?;
    let book = load_book(seed)?;
    let coverage = book
        .coverage(&coverage_id)
        .ok_or_else(|| TarificationError::CoverageNotFound(coverage_id.clone()))?;

    let candidates: Vec<Candidate> =
        rank_candidates(coverage, &book.rules, &request.vehicle, &request.selection)?
            .into_iter()
            .map(|ranked| Candidate {
                rule_id: ranked.rule.id.clone(),
                specificity: ranked.specificity,
            })
            .collect();
    let selected = resolve_rule(coverage, &book.rules, &request.vehicle, &request.selection)?;

    Ok(serde_json::json!({
        "coverage_id": coverage.id,
        "calculation_type": coverage.calculation_type,
        "selected_rule": selected.map(|r| r.id.clone()),
        "candidates": candidates,
    }))
}

pub fn run_premium(
    args: PremiumArgs,
    seed: Option<&str>,
    config: &TarificationConfig,
) -> Result<Value, Box<dyn std::error::Error>> {
    let (coverage_id, request) =
        read_request(args.input.as_deref(), args.coverage, "premium calculation", config)?;
    let book = load_book(seed)?;
    let priced = book.price_coverage(&coverage_id, &request.vehicle, &request.selection)?;
    Ok(serde_json::to_value(priced)?)
}
