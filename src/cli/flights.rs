//! `fitflow flights`: late-arrival classifier

use std::time::Instant;

use anyhow::{Context, Result};
use log::debug;
use polars::prelude::*;

use super::args::FlightsArgs;
use crate::evaluate::{auc_trapezoid, roc_auc, roc_curve, truth_and_scores, ConfusionMatrix};
use crate::model::{FittedWorkflow, LogisticSpec, Workflow, PRED_CLASS};
use crate::pipeline::{
    audit_unseen_levels, drop_unseen_rows, initial_split, load_dataset_with_stats,
    prepare_flight_data, select_columns, DataSource, DateFeature, FlightPrepOptions, Holiday,
    Recipe, Selector, SplitConfig, UnseenLevelHandling,
};
use crate::report::{
    coefficient_table, confusion_table, frame_table, join_table, metrics_table, print_section,
    print_table, roc_plot, write_json, FlightsExport, RunMetadata, SplitSummary,
};
use crate::utils::{
    create_spinner, finish_with_success, print_banner, print_completion, print_config, print_count,
    print_info, print_step_header, print_step_time, print_success, print_warning, FOLDER, SAVE,
    SEED, TARGET,
};

/// Outcome column after recoding
pub const OUTCOME: &str = "arr_delay";

/// Columns carried for identification only
pub const ID_COLUMNS: [&str; 2] = ["flight", "time_hour"];

/// Coefficient rows shown on the console
const TOP_TERMS: usize = 15;

/// The flight delay recipe: calendar features from `date`, US holiday
/// flags (dropping `date`), dummy variables for every nominal predictor and
/// a zero-variance filter.
pub fn build_flight_recipe(unseen: UnseenLevelHandling) -> Recipe {
    Recipe::new(OUTCOME)
        .with_ids(ID_COLUMNS)
        .with_unseen_levels(unseen)
        .step_date("date", &[DateFeature::Dow, DateFeature::Month])
        .step_holiday("date", Holiday::us_calendar(), false)
        .step_dummy(Selector::AllNominalPredictors)
        .step_zv(Selector::AllPredictors)
}

pub fn run_flights(args: &FlightsArgs, infer_schema_length: usize) -> Result<()> {
    let start_time = Instant::now();
    print_banner(env!("CARGO_PKG_VERSION"));
    print_config(
        "Flights",
        &[
            (&FOLDER, "Flights", args.flights.clone()),
            (&FOLDER, "Weather", args.weather.clone()),
            (&TARGET, "Event level", args.event_level.clone()),
            (&SEED, "Seed", args.seed.to_string()),
            (&SAVE, "Export", export_label(args.export.as_deref())),
        ],
    );

    // Step 1: Load
    print_step_header(1, "Loading Data");
    let step_start = Instant::now();
    let flights_source = DataSource::parse(&args.flights);
    let weather_source = DataSource::parse(&args.weather);

    let spinner = create_spinner("Loading flights and weather...");
    let (flights, rows, cols, memory_mb) = load_dataset_with_stats(&flights_source, infer_schema_length)
        .with_context(|| format!("Failed to load flights from {}", flights_source))?;
    let (weather, w_rows, w_cols, w_memory_mb) =
        load_dataset_with_stats(&weather_source, infer_schema_length)
            .with_context(|| format!("Failed to load weather from {}", weather_source))?;
    finish_with_success(&spinner, "Datasets loaded");
    print_info(&format!(
        "Flights: {} rows x {} columns ({:.1} MB)",
        rows, cols, memory_mb
    ));
    print_info(&format!(
        "Weather: {} rows x {} columns ({:.1} MB)",
        w_rows, w_cols, w_memory_mb
    ));
    print_step_time(step_start.elapsed());

    // Step 2: Join and clean
    print_step_header(2, "Joining Weather & Cleaning");
    let step_start = Instant::now();
    let options = FlightPrepOptions {
        late_minutes: args.late_minutes,
        join_policy: args.join_policy,
    };
    let (data, prep_report) = prepare_flight_data(&flights, &weather, &options)?;
    print_table(&join_table(&prep_report.join));
    print_count("rows with missing values removed", prep_report.rows_with_missing);
    print_success(&format!("{} rows ready for modelling", prep_report.final_rows));
    print_step_time(step_start.elapsed());

    // Step 3: Split
    print_step_header(3, "Train/Test Split");
    let step_start = Instant::now();
    let split = initial_split(
        &data,
        &SplitConfig {
            prop: args.prop,
            seed: args.seed,
            strata: None,
        },
    )?;
    print_info(&format!(
        "Training: {} rows, testing: {} rows (prop {}, seed {})",
        split.train.height(),
        split.test.height(),
        args.prop,
        args.seed
    ));

    let audited: Vec<&str> = data
        .get_columns()
        .iter()
        .filter(|c| matches!(c.dtype(), DataType::Categorical(_, _) | DataType::String))
        .map(|c| c.name().as_str())
        .filter(|name| *name != OUTCOME)
        .collect();
    let unseen = audit_unseen_levels(&split.train, &split.test, &audited)?;
    for entry in &unseen {
        print_warning(&format!(
            "{}: level(s) {:?} only in testing data ({} row(s))",
            entry.column, entry.levels, entry.rows
        ));
    }

    let (test, test_rows_dropped, recipe_handling) = match args.unseen_levels {
        UnseenLevelHandling::Drop => {
            let (test, removed) = drop_unseen_rows(&split.test, &unseen)?;
            if removed > 0 {
                print_count("testing rows dropped for unseen levels", removed);
            }
            (test, removed, UnseenLevelHandling::Error)
        }
        handling => (split.test.clone(), 0, handling),
    };
    print_step_time(step_start.elapsed());

    // Step 4: Recipe and model
    print_step_header(4, "Recipe & Logistic Regression");
    let step_start = Instant::now();
    let workflow = Workflow::new(
        build_flight_recipe(recipe_handling),
        LogisticSpec::default(),
        args.event_level.clone(),
    );
    let spinner = create_spinner("Preparing recipe and fitting model...");
    let fitted = workflow.fit(&split.train)?;
    finish_with_success(
        &spinner,
        &format!("Model fitted in {} IRLS iterations", fitted.fit().iterations),
    );
    for line in fitted.recipe().summary() {
        print_info(&line);
    }
    print_count("predictors after the recipe", fitted.recipe().predictors().len());
    print_coefficients(&fitted);
    print_step_time(step_start.elapsed());

    // Step 5: Evaluate
    print_step_header(5, "Evaluating on Test Data");
    let step_start = Instant::now();
    let augmented = fitted.augment(&test)?;
    let event_column = fitted.event_column();
    let (truth, scores) = truth_and_scores(&augmented, OUTCOME, &args.event_level, &event_column)?;

    let curve = roc_curve(&truth, &scores)?;
    let auc = roc_auc(&truth, &scores)?;
    debug!(
        "AUC {:.12} (trapezoid {:.12}) over {} curve points",
        auc,
        auc_trapezoid(&curve),
        curve.len()
    );
    let confusion = ConfusionMatrix::from_scores(&truth, &scores, crate::model::workflow::CLASS_THRESHOLD)?;
    let other_level = other_level_name(&augmented, &event_column, &args.event_level);

    let mut preview_columns: Vec<&str> = ID_COLUMNS.to_vec();
    preview_columns.extend([OUTCOME, PRED_CLASS, event_column.as_str()]);
    let preview = select_columns(&augmented, &preview_columns)?.head(Some(6));
    print_table(&frame_table(&preview));

    print_section("📋", "METRICS");
    print_table(&metrics_table(auc, &confusion));
    println!();
    print_table(&confusion_table(&confusion, &args.event_level, &other_level));
    print_step_time(step_start.elapsed());

    if !args.no_plot {
        print_section("📈", "ROC CURVE");
        roc_plot(&curve);
    }

    if let Some(path) = &args.export {
        let export = FlightsExport {
            metadata: RunMetadata::new(
                "flights",
                vec![args.flights.clone(), args.weather.clone()],
                args.seed,
            ),
            preparation: &prep_report,
            split: SplitSummary {
                prop: args.prop,
                train_rows: split.train.height(),
                test_rows: split.test.height(),
                test_rows_dropped,
            },
            recipe: fitted.recipe(),
            coefficients: fitted.coefficients(),
            deviance: fitted.fit().deviance,
            null_deviance: fitted.fit().null_deviance,
            aic: fitted.fit().aic,
            roc_auc: auc,
            confusion,
            roc_curve: &curve,
        };
        write_json(&export, path)?;
        print_success(&format!("Results written to {}", path.display()));
    }

    print_info(&format!(
        "Total time: {:.2}s",
        start_time.elapsed().as_secs_f64()
    ));
    print_completion("Flights");
    Ok(())
}

fn print_coefficients(fitted: &FittedWorkflow) {
    let mut coefficients = fitted.coefficients();
    let total = coefficients.len();
    coefficients.sort_by(|a, b| b.statistic.abs().total_cmp(&a.statistic.abs()));
    coefficients.truncate(TOP_TERMS);

    print_section("📋", "STRONGEST TERMS");
    print_table(&coefficient_table(&coefficients, "z"));
    if total > TOP_TERMS {
        print_info(&format!("Showing {} of {} terms by |z|", TOP_TERMS, total));
    }
}

/// The non-event class name, read off the probability columns
fn other_level_name(augmented: &DataFrame, event_column: &str, event_level: &str) -> String {
    augmented
        .get_column_names()
        .iter()
        .map(|n| n.as_str())
        .find(|n| n.starts_with(".pred_") && *n != event_column && *n != PRED_CLASS)
        .map(|n| n.trim_start_matches(".pred_").to_string())
        .unwrap_or_else(|| format!("not {}", event_level))
}

pub(crate) fn export_label(path: Option<&std::path::Path>) -> String {
    path.map(|p| p.display().to_string())
        .unwrap_or_else(|| "(none)".to_string())
}
