mod commands;
mod input;
mod output;

use clap::{Parser, Subcommand, ValueEnum};
use colored::Colorize;
use std::process;
use tracing_subscriber::EnvFilter;

use commands::catalog::CoveragesArgs;
use commands::quote::QuoteArgs;
use commands::tariff::{PremiumArgs, ResolveArgs};
use noli_tarif_core::TarificationConfig;

/// Motor insurance tarification for the NOLI comparator
#[derive(Parser)]
#[command(
    name = "noli",
    version,
    about = "Motor insurance tarification: coverages, tariff rules, premiums and quotes",
    long_about = "A CLI over the NOLI tariff: lists the coverages sold for a vehicle category, \
                  shows which tariff rule governs a coverage, prices single coverages and whole \
                  quotes in whole CFA francs, and checks tariff data for configuration errors."
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Output format
    #[arg(long, default_value = "json", global = true)]
    output: OutputFormat,

    /// Tariff data file (JSON or YAML); the built-in NOLI tariff otherwise
    #[arg(long, global = true)]
    seed: Option<String>,
}

#[derive(Subcommand)]
enum Commands {
    /// List the coverages offered for a vehicle category
    Coverages(CoveragesArgs),
    /// Show the tariff rule governing a coverage for a vehicle
    Resolve(ResolveArgs),
    /// Price one coverage for a vehicle
    Premium(PremiumArgs),
    /// Price a set of selected coverages
    Quote(QuoteArgs),
    /// Check tariff data for configuration problems
    Validate,
    /// Print version information
    Version,
}

#[derive(Debug, Clone, ValueEnum)]
pub enum OutputFormat {
    Json,
    Table,
    Csv,
    Minimal,
}

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
}

fn fail(e: impl std::fmt::Display) -> ! {
    eprintln!("{}: {}", "error".red().bold(), e);
    process::exit(1);
}

fn main() {
    dotenvy::dotenv().ok();
    init_tracing();

    let cli = Cli::parse();
    let config = TarificationConfig::from_env().unwrap_or_else(|e| fail(e));
    let seed = cli.seed.as_deref();

    let result: Result<serde_json::Value, Box<dyn std::error::Error>> = match cli.command {
        Commands::Coverages(args) => commands::catalog::run_coverages(args, seed, &config),
        Commands::Resolve(args) => commands::tariff::run_resolve(args, seed, &config),
        Commands::Premium(args) => commands::tariff::run_premium(args, seed, &config),
        Commands::Quote(args) => commands::quote::run_quote(args, seed, &config),
        Commands::Validate => commands::validate::run_validate(seed),
        Commands::Version => {
            println!("noli {}", env!("CARGO_PKG_VERSION"));
            return;
        }
    };

    match result {
        Ok(value) => {
            output::format_output(&cli.output, &value);
            process::exit(0);
        }
        Err(e) => fail(e),
    }
}
