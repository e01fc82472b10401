//! Shared test utilities and fixture generators
#![allow(dead_code)]

use std::collections::BTreeSet;
use std::path::PathBuf;

use chrono::{Duration, NaiveDate};
use fitflow::pipeline::Holiday;
use polars::prelude::*;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use tempfile::TempDir;

pub const ORIGINS: [&str; 3] = ["EWR", "JFK", "LGA"];
pub const DESTS: [&str; 4] = ["ATL", "BOS", "MIA", "ORD"];
pub const CARRIERS: [&str; 3] = ["AA", "DL", "UA"];

/// Create a flights table shaped like nycflights13::flights.
///
/// Dates avoid US holidays, every categorical level is common, and the
/// chance of a late arrival rises with departure time, so a logistic fit
/// converges and has signal. Every 50th arrival delay is missing.
pub fn create_flights_dataframe(rows: usize, seed: u64) -> DataFrame {
    let mut rng = StdRng::seed_from_u64(seed);
    let calendar = Holiday::us_calendar();
    let start = NaiveDate::from_ymd_opt(2013, 1, 1).unwrap();

    let mut dep_time = Vec::with_capacity(rows);
    let mut flight = Vec::with_capacity(rows);
    let mut origin = Vec::with_capacity(rows);
    let mut dest = Vec::with_capacity(rows);
    let mut carrier = Vec::with_capacity(rows);
    let mut air_time = Vec::with_capacity(rows);
    let mut distance = Vec::with_capacity(rows);
    let mut time_hour = Vec::with_capacity(rows);
    let mut arr_delay = Vec::with_capacity(rows);
    let mut year = Vec::with_capacity(rows);

    for i in 0..rows {
        let date = loop {
            let d = start + Duration::days(rng.gen_range(0..365));
            if !calendar.iter().any(|h| h.is_on(d)) {
                break d;
            }
        };
        let hour: u32 = rng.gen_range(5..23);
        let minute: i64 = rng.gen_range(0..60);
        let timestamp = date.and_hms_opt(hour, 0, 0).unwrap().and_utc().timestamp_millis();

        let dep = hour as i64 * 100 + minute;
        let p_late = 1.0 / (1.0 + (-(-2.5 + dep as f64 / 700.0)).exp());
        let late = rng.gen::<f64>() < p_late;
        let delay = if late {
            rng.gen_range(30.0..150.0)
        } else {
            rng.gen_range(-30.0..29.0)
        };

        let dest_idx = rng.gen_range(0..DESTS.len());
        dep_time.push(dep);
        flight.push(rng.gen_range(1..5000i64));
        origin.push(ORIGINS[rng.gen_range(0..ORIGINS.len())]);
        dest.push(DESTS[dest_idx]);
        carrier.push(CARRIERS[rng.gen_range(0..CARRIERS.len())]);
        distance.push(200.0 + 300.0 * dest_idx as f64 + rng.gen_range(0.0..50.0));
        air_time.push(40.0 + 40.0 * dest_idx as f64 + rng.gen_range(0.0..20.0));
        time_hour.push(timestamp);
        arr_delay.push(if i % 50 == 49 { None } else { Some(delay) });
        year.push(2013i32);
    }

    let time_hour = Column::new("time_hour".into(), time_hour)
        .cast(&DataType::Datetime(TimeUnit::Milliseconds, None))
        .unwrap();

    DataFrame::new(vec![
        Column::new("year".into(), year),
        Column::new("dep_time".into(), dep_time),
        Column::new("arr_delay".into(), arr_delay),
        Column::new("carrier".into(), carrier),
        Column::new("flight".into(), flight),
        Column::new("origin".into(), origin),
        Column::new("dest".into(), dest),
        Column::new("air_time".into(), air_time),
        Column::new("distance".into(), distance),
        time_hour,
    ])
    .unwrap()
}

/// Create one weather row per (origin, time_hour) seen in `flights`,
/// leaving out every 10th key so some flights have no weather
pub fn create_weather_dataframe(flights: &DataFrame) -> DataFrame {
    let origins = flights.column("origin").unwrap().str().unwrap().clone();
    let hours = flights
        .column("time_hour")
        .unwrap()
        .cast(&DataType::Int64)
        .unwrap();
    let hours = hours.i64().unwrap();

    let keys: BTreeSet<(String, i64)> = origins
        .iter()
        .zip(hours.iter())
        .filter_map(|(o, h)| Some((o?.to_string(), h?)))
        .collect();

    let mut origin = Vec::new();
    let mut time_hour = Vec::new();
    let mut temp = Vec::new();
    for (i, (o, h)) in keys.into_iter().enumerate() {
        if i % 10 == 9 {
            continue;
        }
        origin.push(o);
        time_hour.push(h);
        temp.push(30.0 + (i % 50) as f64);
    }

    let time_hour = Column::new("time_hour".into(), time_hour)
        .cast(&DataType::Datetime(TimeUnit::Milliseconds, None))
        .unwrap();
    DataFrame::new(vec![
        Column::new("origin".into(), origin),
        time_hour,
        Column::new("temp".into(), temp),
    ])
    .unwrap()
}

/// Create urchin records with the published headers (`TREAT`, `IV`, `SUTW`).
///
/// Widths follow a separate straight line per regime plus noise.
pub fn create_urchin_dataframe(seed: u64) -> DataFrame {
    let mut rng = StdRng::seed_from_u64(seed);
    let lines = [("Initial", 0.050, 0.0015), ("Low", 0.030, 0.0006), ("High", 0.045, 0.0012)];

    let mut treat = Vec::new();
    let mut iv = Vec::new();
    let mut sutw = Vec::new();
    for (regime, intercept, slope) in lines {
        for _ in 0..24 {
            let volume: f64 = rng.gen_range(3.5..47.0);
            let noise: f64 = rng.gen_range(-0.01..0.01);
            treat.push(regime);
            iv.push(volume);
            sutw.push(intercept + slope * volume + noise);
        }
    }

    df! {
        "TREAT" => treat,
        "IV" => iv,
        "SUTW" => sutw,
    }
    .unwrap()
}

/// Fresh temp dir holding `df` as `data.csv`
pub fn create_temp_csv(df: &mut DataFrame) -> (TempDir, PathBuf) {
    let dir = TempDir::new().unwrap();
    let path = write_csv(&dir, "data.csv", df);
    (dir, path)
}

/// Write `df` as CSV under `dir`, returning the file path
pub fn write_csv(dir: &TempDir, name: &str, df: &mut DataFrame) -> PathBuf {
    let path = dir.path().join(name);
    let mut out = std::fs::File::create(&path).unwrap();
    CsvWriter::new(&mut out).include_header(true).finish(df).unwrap();
    path
}

/// Fresh temp dir holding `df` as `data.parquet`
pub fn create_temp_parquet(df: &mut DataFrame) -> (TempDir, PathBuf) {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("data.parquet");
    ParquetWriter::new(std::fs::File::create(&path).unwrap())
        .finish(df)
        .unwrap();
    (dir, path)
}

pub fn assert_shape(df: &DataFrame, rows: usize, cols: usize) {
    assert_eq!(df.shape(), (rows, cols), "Unexpected (rows, cols)");
}

fn column_set(df: &DataFrame) -> Vec<&str> {
    df.get_column_names().into_iter().map(|s| s.as_str()).collect()
}

/// Every name in `wanted` is a column of `df`
pub fn assert_has_columns(df: &DataFrame, wanted: &[&str]) {
    let present = column_set(df);
    let absent: Vec<&&str> = wanted.iter().filter(|c| !present.contains(c)).collect();
    assert!(absent.is_empty(), "Columns {:?} not found in {:?}", absent, present);
}

/// No name in `unwanted` is a column of `df`
pub fn assert_missing_columns(df: &DataFrame, unwanted: &[&str]) {
    let present = column_set(df);
    let leftover: Vec<&&str> = unwanted.iter().filter(|c| present.contains(c)).collect();
    assert!(leftover.is_empty(), "Columns {:?} should have been removed", leftover);
}

/// Column names and dtypes, for schema comparisons
pub fn schema_of(df: &DataFrame) -> Vec<(String, DataType)> {
    df.get_columns()
        .iter()
        .map(|c| (c.name().to_string(), c.dtype().clone()))
        .collect()
}
