//! Tests for recipe prep/bake on flight data

#[path = "common/mod.rs"]
mod common;

use chrono::NaiveDate;
use fitflow::cli::flights::build_flight_recipe;
use fitflow::error::{FitflowError, PredictError};
use fitflow::pipeline::columns::f64_values;
use fitflow::pipeline::{
    audit_unseen_levels, drop_unseen_rows, initial_split, prepare_flight_data, DateFeature,
    FlightPrepOptions, Holiday, Recipe, Selector, SplitConfig, UnseenLevelHandling,
};
use polars::prelude::*;

use common::*;

fn prepared_flights() -> DataFrame {
    let flights = create_flights_dataframe(600, 21);
    let weather = create_weather_dataframe(&flights);
    prepare_flight_data(&flights, &weather, &FlightPrepOptions::default())
        .unwrap()
        .0
}

#[test]
fn test_baked_train_and_test_share_schema() {
    let data = prepared_flights();
    let split = initial_split(&data, &SplitConfig::default()).unwrap();
    let unseen = audit_unseen_levels(&split.train, &split.test, &["origin", "dest", "carrier"]).unwrap();
    let (test, _) = drop_unseen_rows(&split.test, &unseen).unwrap();

    let prepared = build_flight_recipe(UnseenLevelHandling::Error)
        .prep(&split.train)
        .unwrap();
    let baked_train = prepared.bake(&split.train).unwrap();
    let baked_test = prepared.bake(&test).unwrap();

    assert_eq!(
        schema_of(&baked_train),
        schema_of(&baked_test),
        "Baking must give identical column names and types for any input"
    );
    assert_eq!(baked_test.height(), test.height(), "Baking never drops rows");
}

#[test]
fn test_flight_recipe_output_columns() {
    let data = prepared_flights();
    let prepared = build_flight_recipe(UnseenLevelHandling::Error).prep(&data).unwrap();
    let baked = prepared.bake(&data).unwrap();

    assert_missing_columns(&baked, &["date", "origin", "dest", "carrier", "date_dow", "date_month"]);
    assert_has_columns(
        &baked,
        &["arr_delay", "flight", "time_hour", "dep_time", "date_dow_Mon", "dest_BOS"],
    );

    // The fixture avoids holidays, so every holiday flag has zero variance
    let holiday_columns: Vec<String> = baked
        .get_column_names()
        .iter()
        .filter(|n| n.starts_with("date_US"))
        .map(|n| n.to_string())
        .collect();
    assert!(holiday_columns.is_empty(), "Constant holiday flags survived: {:?}", holiday_columns);

    for name in prepared.predictors() {
        let dtype = baked.column(name).unwrap().dtype();
        assert!(dtype.is_primitive_numeric(), "Predictor {} is not numeric: {:?}", name, dtype);
    }
}

#[test]
fn test_prepared_recipe_is_not_refit_by_bake() {
    let data = prepared_flights();
    let split = initial_split(&data, &SplitConfig::default()).unwrap();
    let prepared = build_flight_recipe(UnseenLevelHandling::Zero).prep(&split.train).unwrap();

    // A single row still bakes to the full training predictor set
    let one_row = split.test.head(Some(1));
    let baked = prepared.bake(&one_row).unwrap();
    for name in prepared.predictors() {
        assert!(baked.column(name).is_ok(), "Predictor {} missing after bake", name);
    }
}

#[test]
fn test_holiday_indicators() {
    let dates = [
        NaiveDate::from_ymd_opt(2013, 7, 4).unwrap(),
        NaiveDate::from_ymd_opt(2013, 11, 28).unwrap(),
        NaiveDate::from_ymd_opt(2013, 3, 12).unwrap(),
    ];
    let df = df! {
        "y" => ["a", "b", "a"],
        "date" => dates,
    }
    .unwrap();

    let recipe = Recipe::new("y")
        .step_date("date", &[DateFeature::Dow, DateFeature::Month])
        .step_holiday(
            "date",
            vec![Holiday::USIndependenceDay, Holiday::USThanksgivingDay],
            false,
        );
    let baked = recipe.prep(&df).unwrap().bake(&df).unwrap();

    assert_missing_columns(&baked, &["date"]);
    assert_eq!(
        f64_values(&baked, "date_USIndependenceDay").unwrap(),
        vec![1.0, 0.0, 0.0]
    );
    assert_eq!(
        f64_values(&baked, "date_USThanksgivingDay").unwrap(),
        vec![0.0, 1.0, 0.0]
    );
    let dow: Vec<String> = baked
        .column("date_dow")
        .unwrap()
        .str()
        .unwrap()
        .into_no_null_iter()
        .map(|s| s.to_string())
        .collect();
    assert_eq!(dow, vec!["Thu", "Thu", "Tue"]);
}

#[test]
fn test_declared_levels_keep_absent_months() {
    let df = df! {
        "y" => ["a", "b"],
        "date" => [
            NaiveDate::from_ymd_opt(2013, 1, 7).unwrap(),
            NaiveDate::from_ymd_opt(2013, 1, 8).unwrap(),
        ],
    }
    .unwrap();

    let prepared = Recipe::new("y")
        .step_date("date", &[DateFeature::Month])
        .step_dummy(Selector::AllNominalPredictors)
        .prep(&df)
        .unwrap();
    let baked = prepared.bake(&df).unwrap();

    // Jan is the reference level; Feb..Dec each get an indicator
    assert_has_columns(&baked, &["date_month_Feb", "date_month_Dec"]);
    assert_missing_columns(&baked, &["date_month_Jan"]);
}

#[test]
fn test_unseen_level_errors_on_bake() {
    let train = df! {
        "y" => ["a", "b", "a"],
        "dest" => ["ATL", "BOS", "BOS"],
    }
    .unwrap();
    let test = df! {
        "y" => ["a"],
        "dest" => ["LEX"],
    }
    .unwrap();

    let prepared = Recipe::new("y")
        .step_dummy(Selector::AllNominalPredictors)
        .prep(&train)
        .unwrap();
    let err = prepared.bake(&test).unwrap_err();
    assert!(
        matches!(err, FitflowError::Predict(PredictError::UnseenLevel { ref column, .. }) if column == "dest"),
        "Expected an unseen level error, got {:?}",
        err
    );

    let zeroed = Recipe::new("y")
        .with_unseen_levels(UnseenLevelHandling::Zero)
        .step_dummy(Selector::AllNominalPredictors)
        .prep(&train)
        .unwrap()
        .bake(&test)
        .unwrap();
    assert_eq!(f64_values(&zeroed, "dest_BOS").unwrap(), vec![0.0]);
}

#[test]
fn test_bake_requires_training_predictors() {
    let train = df! {
        "y" => ["a", "b"],
        "x" => [1.0f64, 2.0],
        "z" => [3.0f64, 5.0],
    }
    .unwrap();
    let prepared = Recipe::new("y").prep(&train).unwrap();

    let err = prepared.bake(&train.drop("z").unwrap()).unwrap_err();
    assert!(matches!(err, FitflowError::Predict(PredictError::SchemaMismatch(ref c)) if c == "z"));

    // The outcome is optional at bake time
    assert!(prepared.bake(&train.drop("y").unwrap()).is_ok());
}

#[test]
fn test_normalize_uses_training_statistics() {
    let train = df! {
        "y" => ["a", "b", "a", "b"],
        "x" => [1.0f64, 2.0, 3.0, 4.0],
        "noise" => [9.0f64, 9.5, 8.5, 9.0],
    }
    .unwrap();
    let prepared = Recipe::new("y")
        .step_rm(["noise"])
        .step_normalize(Selector::AllNumericPredictors)
        .prep(&train)
        .unwrap();
    assert_eq!(prepared.predictors(), &["x".to_string()]);

    let baked = prepared.bake(&train).unwrap();
    assert_missing_columns(&baked, &["noise"]);
    let x = f64_values(&baked, "x").unwrap();
    assert!(x.iter().sum::<f64>().abs() < 1e-12, "Training column should be centred");

    // New data is scaled with the training mean and sd, not its own
    let new = df! { "x" => [2.5f64], "noise" => [0.0f64] }.unwrap();
    let scaled = f64_values(&prepared.bake(&new).unwrap(), "x").unwrap();
    assert!(scaled[0].abs() < 1e-12);
}
