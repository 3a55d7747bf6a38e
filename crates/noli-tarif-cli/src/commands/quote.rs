use clap::Args;
use serde::Deserialize;
use serde_json::{json, Value};
use std::sync::Arc;
use uuid::Uuid;

use noli_tarif_core::pricing::{self, QuotePricingInput};
use noli_tarif_core::quote::{InMemoryStore, QuoteCoverageAggregator, QuoteStore};
use noli_tarif_core::tariff::{TariffBook, VehicleProfile};
use noli_tarif_core::TarificationConfig;

use crate::commands::load_book;
use crate::input;

/// Arguments for quote pricing
#[derive(Args)]
pub struct QuoteArgs {
    /// Path to JSON/YAML input file
    #[arg(long)]
    pub input: Option<String>,
    /// Run the selections through a quote (attach, recompute, audit)
    /// instead of a one-shot preview
    #[arg(long)]
    pub session: bool,
}

/// Quote input; `revised_vehicle` is only used with `--session`.
#[derive(Debug, Deserialize)]
pub struct QuoteRequest {
    #[serde(flatten)]
    pub pricing: QuotePricingInput,
    #[serde(default)]
    pub revised_vehicle: Option<VehicleProfile>,
}

pub fn run_quote(
    args: QuoteArgs,
    seed: Option<&str>,
    config: &TarificationConfig,
) -> Result<Value, Box<dyn std::error::Error>> {
    let mut request: QuoteRequest = input::read_input(args.input.as_deref(), "quote pricing")?;
    request.pricing.vehicle = config.normalize_vehicle(request.pricing.vehicle);
    let book = load_book(seed)?;

    if args.session {
        run_session(book, config.clone(), request)
    } else {
        let result = pricing::price_quote(&book, &request.pricing)?;
        Ok(serde_json::to_value(result)?)
    }
}

fn run_session(
    book: TariffBook,
    config: TarificationConfig,
    request: QuoteRequest,
) -> Result<Value, Box<dyn std::error::Error>> {
    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()?;

    runtime.block_on(async move {
        let store = Arc::new(InMemoryStore::from_book(book));
        let quote_id = Uuid::new_v4();
        store.insert_quote(quote_id, request.pricing.vehicle.clone())?;
        let aggregator = QuoteCoverageAggregator::new(Arc::clone(&store), config.clone());

        let mut failures = Vec::new();
        for selected in request.pricing.selections {
            if let Err(e) = aggregator
                .attach_coverage(
                    quote_id,
                    &selected.coverage_id,
                    selected.selection,
                    selected.is_included,
                )
                .await
            {
                failures.push(json!({
                    "coverage_id": selected.coverage_id,
                    "kind": e.kind(),
                    "message": e.to_string(),
                }));
            }
        }

        let recompute = match request.revised_vehicle {
            Some(vehicle) => {
                store.update_vehicle(quote_id, config.normalize_vehicle(vehicle))?;
                Some(aggregator.recompute_all(quote_id).await?)
            }
            None => None,
        };

        let snapshot = store.quote_snapshot(quote_id).await?;
        let audit = aggregator.audit_quote(quote_id).await?;

        Ok::<Value, Box<dyn std::error::Error>>(json!({
            "quote_id": quote_id,
            "version": snapshot.version,
            "total_premium": snapshot.total_premium(),
            "currency": config.currency,
            "rows": snapshot.rows,
            "failures": failures,
            "recompute": recompute,
            "audit_consistent": audit.is_consistent(),
        }))
    })
}
