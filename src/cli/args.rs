//! Command-line argument definitions using clap

use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;

use crate::pipeline::{JoinPolicy, UnseenLevelHandling};

/// Published copy of the urchin growth data
pub const URCHINS_URL: &str = "https://tidymodels.org/start/models/urchins.csv";

/// Fitflow - reproducible model fitting pipelines
#[derive(Parser, Debug)]
#[command(name = "fitflow")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Number of rows to use for schema inference (CSV only).
    /// Use 0 for full table scan.
    #[arg(long, global = true, default_value = "10000")]
    pub infer_schema_length: usize,

    /// Show debug logging (RUST_LOG overrides)
    #[arg(short, long, global = true, default_value = "false")]
    pub verbose: bool,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Classify late flight arrivals with a recipe and logistic regression
    Flights(FlightsArgs),
    /// Model urchin growth with least squares and Bayesian regression
    Urchins(UrchinsArgs),
}

#[derive(Args, Debug, Clone)]
pub struct FlightsArgs {
    /// Flight records (CSV or Parquet path, or http(s) URL)
    #[arg(long)]
    pub flights: String,

    /// Hourly weather records keyed by origin and time_hour
    #[arg(long)]
    pub weather: String,

    /// Fraction of rows assigned to the training partition (0-1, exclusive)
    #[arg(long, default_value = "0.75", value_parser = validate_fraction)]
    pub prop: f64,

    /// Seed for the train/test split
    #[arg(long, default_value = "222")]
    pub seed: u64,

    /// Outcome level treated as the event
    #[arg(long, default_value = "late")]
    pub event_level: String,

    /// Arrival delay in minutes from which a flight counts as late
    #[arg(long, default_value = "30")]
    pub late_minutes: f64,

    /// Treatment of test rows whose categorical levels never appear in training.
    /// Options: "drop" (default), "zero" (all-zero dummies), "error"
    #[arg(long, default_value = "drop")]
    pub unseen_levels: UnseenLevelHandling,

    /// Duplicate weather keys: "keep-first" (default, with a warning) or "strict" (fail)
    #[arg(long, default_value = "keep-first")]
    pub join_policy: JoinPolicy,

    /// Write results as JSON to this path
    #[arg(long)]
    pub export: Option<PathBuf>,

    /// Skip terminal plots
    #[arg(long, default_value = "false")]
    pub no_plot: bool,
}

#[derive(Args, Debug, Clone)]
pub struct UrchinsArgs {
    /// Urchin records (CSV or Parquet path, or http(s) URL)
    #[arg(short, long, default_value = URCHINS_URL)]
    pub input: String,

    /// Base seed for the MCMC chains (chain c uses seed + c)
    #[arg(long, default_value = "123")]
    pub seed: u64,

    /// Number of MCMC chains
    #[arg(long, default_value = "4", value_parser = clap::value_parser!(u64).range(1..))]
    pub chains: u64,

    /// Iterations per chain, warm-up included
    #[arg(long, default_value = "2000")]
    pub iter: usize,

    /// Warm-up iterations discarded from each chain
    #[arg(long, default_value = "1000")]
    pub warmup: usize,

    /// Interval level for confidence and credible intervals (0-1, exclusive)
    #[arg(long, default_value = "0.95", value_parser = validate_fraction)]
    pub level: f64,

    /// Degrees of freedom of the Student-t priors
    #[arg(long, default_value = "1")]
    pub prior_df: f64,

    /// Scale of the Student-t priors before autoscaling
    #[arg(long, default_value = "2.5")]
    pub prior_scale: f64,

    /// Initial volume at which every food regime is predicted
    #[arg(long, default_value = "20")]
    pub initial_volume: f64,

    /// Write results as JSON to this path
    #[arg(long)]
    pub export: Option<PathBuf>,

    /// Skip terminal plots
    #[arg(long, default_value = "false")]
    pub no_plot: bool,
}

/// Validator for values that must lie strictly between 0 and 1
fn validate_fraction(s: &str) -> Result<f64, String> {
    let value: f64 = s
        .parse()
        .map_err(|_| format!("'{}' is not a valid number", s))?;

    if value > 0.0 && value < 1.0 {
        Ok(value)
    } else {
        Err(format!("value must be strictly between 0 and 1, got {}", value))
    }
}
