//! Fitflow CLI
//!
//! `fitflow flights` trains and evaluates the flight delay classifier;
//! `fitflow urchins` fits and compares the urchin growth models.

use anyhow::Result;
use clap::Parser;
use console::style;

use fitflow::cli::{run_flights, run_urchins, Cli, Commands};
use fitflow::{ErrorCategory, FitflowError};

fn main() {
    let cli = Cli::parse();

    let default_level = if cli.verbose { "debug" } else { "warn" };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(default_level))
        .format_timestamp(None)
        .init();

    if let Err(err) = run(&cli) {
        eprintln!();
        eprintln!(
            "    {} {}",
            style(failure_label(&err)).red().bold(),
            style(format!("{:#}", err)).red()
        );
        std::process::exit(1);
    }
}

fn run(cli: &Cli) -> Result<()> {
    match &cli.command {
        Commands::Flights(args) => run_flights(args, cli.infer_schema_length),
        Commands::Urchins(args) => run_urchins(args, cli.infer_schema_length),
    }
}

fn failure_label(err: &anyhow::Error) -> &'static str {
    match err.downcast_ref::<FitflowError>().map(|e| e.category()) {
        Some(ErrorCategory::Data) => "Data error:",
        Some(ErrorCategory::Fit) => "Fit error:",
        Some(ErrorCategory::Predict) => "Prediction error:",
        Some(ErrorCategory::External) | None => "Error:",
    }
}
