//! `fitflow urchins`: least squares and Bayesian fits of urchin growth

use std::time::Instant;

use anyhow::{Context, Result};
use polars::prelude::*;

use super::args::UrchinsArgs;
use super::flights::export_label;
use crate::error::Result as FitflowResult;
use crate::model::{
    augment, BayesFit, BayesSpec, Interval, OlsFit, OlsSpec, Prior, PRED, PRED_LOWER, PRED_UPPER,
};
use crate::pipeline::columns::{f64_values, string_values};
use crate::pipeline::{
    load_dataset_with_stats, prepare_urchin_data, summarize_by_group, DataSource, FormulaDesign,
    FOOD_REGIMES,
};
use crate::report::{
    coefficient_table, error_bar_plot, frame_table, posterior_table, prediction_table,
    print_section, print_table, scatter_with_fits, write_json, BayesExport, ErrorBar, GroupSeries,
    IntervalPrediction, OlsExport, RunMetadata, UrchinsExport, RHAT_WARNING,
};
use crate::utils::{
    create_sampling_bar, create_spinner, finish_with_success, finish_with_warning, print_banner,
    print_completion, print_config, print_info, print_step_header, print_step_time,
    print_success, print_warning, CHART, FOLDER, SAVE, SEED,
};

pub const URCHIN_FORMULA: &str = "width ~ initial_volume * food_regime";

/// `width ~ initial_volume * food_regime` with `Initial` as reference regime
pub fn urchin_design() -> FitflowResult<FormulaDesign> {
    Ok(FormulaDesign::parse(URCHIN_FORMULA)?.with_levels("food_regime", FOOD_REGIMES))
}

/// One row per food regime at a fixed initial volume
pub fn prediction_grid(initial_volume: f64) -> FitflowResult<DataFrame> {
    Ok(df! {
        "initial_volume" => vec![initial_volume; FOOD_REGIMES.len()],
        "food_regime" => FOOD_REGIMES.to_vec(),
    }?)
}

pub fn run_urchins(args: &UrchinsArgs, infer_schema_length: usize) -> Result<()> {
    let start_time = Instant::now();
    print_banner(env!("CARGO_PKG_VERSION"));
    print_config(
        "Urchins",
        &[
            (&FOLDER, "Input", args.input.clone()),
            (&CHART, "Formula", URCHIN_FORMULA.to_string()),
            (
                &SEED,
                "Sampler",
                format!(
                    "{} x {} (warm-up {}), seed {}",
                    args.chains, args.iter, args.warmup, args.seed
                ),
            ),
            (&SAVE, "Export", export_label(args.export.as_deref())),
        ],
    );

    // Step 1: Load
    print_step_header(1, "Loading Data");
    let step_start = Instant::now();
    let source = DataSource::parse(&args.input);
    let spinner = create_spinner("Loading urchin data...");
    let (raw, rows, cols, memory_mb) = load_dataset_with_stats(&source, infer_schema_length)
        .with_context(|| format!("Failed to load urchin data from {}", source))?;
    finish_with_success(&spinner, "Dataset loaded");
    print_info(&format!("{} rows x {} columns ({:.1} MB)", rows, cols, memory_mb));

    let data = prepare_urchin_data(&raw)?;
    let groups = summarize_by_group(&data, "food_regime", &["initial_volume", "width"])?;
    print_table(&frame_table(&groups));
    print_step_time(step_start.elapsed());

    let design = urchin_design()?;
    let grid = prediction_grid(args.initial_volume)?;

    // Step 2: Least squares
    print_step_header(2, "Least Squares Fit");
    let step_start = Instant::now();
    let ols = OlsSpec::new(design.clone()).fit(&data)?;
    print_table(&coefficient_table(&ols.coefficients(), "t"));
    print_info(&format!(
        "Residual standard error {:.5} on {} degrees of freedom",
        ols.sigma, ols.df_residual
    ));
    print_info(&format!(
        "R² {:.4}, adjusted R² {:.4}",
        ols.r_squared, ols.adj_r_squared
    ));

    let ols_predictions = augment(&grid, &ols.predict(&grid, Some(Interval::Confidence(args.level)))?)?;
    print_section("📋", "MEAN WIDTH PREDICTIONS (confidence interval)");
    print_table(&prediction_table(&ols_predictions, "food_regime")?);
    print_step_time(step_start.elapsed());

    // Step 3: Bayesian fit
    print_step_header(3, "Bayesian Fit (Student-t priors)");
    let step_start = Instant::now();
    let prior = Prior::StudentT {
        df: args.prior_df,
        location: 0.0,
        scale: args.prior_scale,
    };
    let spec = BayesSpec::new(design)
        .with_prior(prior)
        .with_prior_intercept(prior)
        .with_chains(args.chains as usize)
        .with_iterations(args.iter, args.warmup)
        .with_seed(args.seed);

    let bar = create_sampling_bar(spec.total_iterations(), spec.chains);
    let bayes = spec.fit_with_progress(&data, &bar)?;
    finish_with_success(&bar, "Sampling complete");

    for (term, prior) in bayes.prior_summary() {
        print_info(&format!("Prior for {}: {}", term, prior));
    }
    let summary = bayes.summary();
    print_table(&posterior_table(&summary));
    let unmixed: Vec<&str> = summary
        .iter()
        .filter(|s| !(s.rhat <= RHAT_WARNING))
        .map(|s| s.term.as_str())
        .collect();
    if !unmixed.is_empty() {
        print_warning(&format!(
            "R̂ above {} for {}; consider more iterations",
            RHAT_WARNING,
            unmixed.join(", ")
        ));
    }

    let bayes_predictions = augment(&grid, &bayes.predict(&grid, Some(args.level))?)?;
    print_section("📋", "MEAN WIDTH PREDICTIONS (credible interval)");
    print_table(&prediction_table(&bayes_predictions, "food_regime")?);
    print_step_time(step_start.elapsed());

    // Step 4: Plots
    if !args.no_plot {
        print_step_header(4, "Plots");
        print_section("📈", "WIDTH BY INITIAL VOLUME");
        scatter_with_fits(&group_series(&data, &ols)?, "initial_volume", "width");

        print_section("📈", "LEAST SQUARES PREDICTIONS");
        error_bar_plot(&error_bars(&ols_predictions)?, "width");

        print_section("📈", "BAYESIAN PREDICTIONS");
        error_bar_plot(&error_bars(&bayes_predictions)?, "width");
    }

    if let Some(path) = &args.export {
        let spinner = create_spinner("Writing results...");
        let export = build_export(args, &data, &ols, &bayes, &ols_predictions, &bayes_predictions)?;
        match write_json(&export, path) {
            Ok(()) => finish_with_success(&spinner, &format!("Results written to {}", path.display())),
            Err(e) => {
                finish_with_warning(&spinner, "Export failed");
                return Err(e);
            }
        }
    }

    print_success(&format!(
        "Total time: {:.2}s",
        start_time.elapsed().as_secs_f64()
    ));
    print_completion("Urchins");
    Ok(())
}

/// Observed points and the least-squares line for each regime
fn group_series(data: &DataFrame, ols: &OlsFit) -> FitflowResult<Vec<GroupSeries>> {
    let regimes = string_values(data, "food_regime")?;
    let volumes = f64_values(data, "initial_volume")?;
    let widths = f64_values(data, "width")?;

    let mut series = Vec::with_capacity(FOOD_REGIMES.len());
    for regime in FOOD_REGIMES {
        let points = regimes
            .iter()
            .zip(volumes.iter().zip(&widths))
            .filter(|(r, _)| r.as_deref() == Some(regime))
            .map(|(_, (&v, &w))| (v, w))
            .collect();

        // Intercept and slope read off predictions at volumes 0 and 1
        let probe = df! {
            "initial_volume" => [0.0f64, 1.0],
            "food_regime" => [regime, regime],
        }?;
        let fitted = f64_values(&ols.predict(&probe, None)?, PRED)?;
        series.push(GroupSeries {
            label: regime.to_string(),
            points,
            line: (fitted[0], fitted[1] - fitted[0]),
        });
    }
    Ok(series)
}

fn error_bars(predictions: &DataFrame) -> FitflowResult<Vec<ErrorBar>> {
    let labels = string_values(predictions, "food_regime")?;
    let pred = f64_values(predictions, PRED)?;
    let lower = f64_values(predictions, PRED_LOWER)?;
    let upper = f64_values(predictions, PRED_UPPER)?;
    Ok((0..pred.len())
        .map(|i| ErrorBar {
            label: labels[i].clone().unwrap_or_default(),
            estimate: pred[i],
            lower: lower[i],
            upper: upper[i],
        })
        .collect())
}

fn interval_predictions(predictions: &DataFrame) -> FitflowResult<Vec<IntervalPrediction>> {
    let volumes = f64_values(predictions, "initial_volume")?;
    Ok(error_bars(predictions)?
        .into_iter()
        .zip(volumes)
        .map(|(bar, initial_volume)| IntervalPrediction {
            food_regime: bar.label,
            initial_volume,
            pred: bar.estimate,
            lower: bar.lower,
            upper: bar.upper,
        })
        .collect())
}

fn build_export(
    args: &UrchinsArgs,
    data: &DataFrame,
    ols: &OlsFit,
    bayes: &BayesFit,
    ols_predictions: &DataFrame,
    bayes_predictions: &DataFrame,
) -> Result<UrchinsExport> {
    Ok(UrchinsExport {
        metadata: RunMetadata::new("urchins", vec![args.input.clone()], args.seed),
        formula: URCHIN_FORMULA.to_string(),
        level: args.level,
        observations: data.height(),
        ols: OlsExport {
            coefficients: ols.coefficients(),
            sigma: ols.sigma,
            r_squared: ols.r_squared,
            adj_r_squared: ols.adj_r_squared,
            predictions: interval_predictions(ols_predictions)?,
        },
        bayes: BayesExport {
            chains: bayes.n_chains(),
            iter: bayes.iter,
            warmup: bayes.warmup,
            priors: bayes
                .prior_summary()
                .into_iter()
                .map(|(term, prior)| (term, prior.to_string()))
                .collect(),
            summary: bayes.summary(),
            predictions: interval_predictions(bayes_predictions)?,
        },
    })
}
