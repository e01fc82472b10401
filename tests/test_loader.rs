//! Tests for dataset loading

#[path = "common/mod.rs"]
mod common;

use fitflow::error::{DataError, FitflowError};
use fitflow::pipeline::{load_dataset, load_dataset_with_stats, DataSource};
use polars::prelude::*;
use tempfile::TempDir;

use common::*;

#[test]
fn test_load_csv() {
    let mut df = create_urchin_dataframe(1);
    let (_temp_dir, csv_path) = create_temp_csv(&mut df);

    let loaded = load_dataset(&DataSource::Path(csv_path), 10000).unwrap();

    assert_shape(&loaded, 72, 3);
    assert_has_columns(&loaded, &["TREAT", "IV", "SUTW"]);
    assert_eq!(loaded.column("IV").unwrap().dtype(), &DataType::Float64);
}

#[test]
fn test_load_parquet_preserves_types() {
    let mut df = create_flights_dataframe(50, 2);
    let (_temp_dir, parquet_path) = create_temp_parquet(&mut df);

    let loaded = load_dataset(&DataSource::Path(parquet_path), 10000).unwrap();

    assert_eq!(loaded.shape(), df.shape());
    assert_eq!(schema_of(&loaded), schema_of(&df), "Parquet should keep every dtype");
}

#[test]
fn test_load_csv_parses_datetimes() {
    let mut df = create_flights_dataframe(30, 3);
    let (_temp_dir, csv_path) = create_temp_csv(&mut df);

    let loaded = load_dataset(&DataSource::Path(csv_path), 10000).unwrap();

    assert!(
        matches!(loaded.column("time_hour").unwrap().dtype(), DataType::Datetime(_, _)),
        "time_hour should be parsed as a datetime, got {:?}",
        loaded.column("time_hour").unwrap().dtype()
    );
    assert_eq!(
        loaded.column("arr_delay").unwrap().null_count(),
        df.column("arr_delay").unwrap().null_count(),
        "Missing delays should survive the CSV round trip"
    );
}

#[test]
fn test_load_with_stats() {
    let mut df = create_urchin_dataframe(1);
    let (_temp_dir, csv_path) = create_temp_csv(&mut df);

    let (loaded, rows, cols, memory_mb) =
        load_dataset_with_stats(&DataSource::Path(csv_path), 0).unwrap();

    assert_eq!(rows, loaded.height());
    assert_eq!(cols, 3);
    assert!(memory_mb > 0.0);
}

#[test]
fn test_unsupported_format() {
    let temp_dir = TempDir::new().unwrap();
    let path = temp_dir.path().join("data.xlsx");
    std::fs::write(&path, "not a spreadsheet").unwrap();

    let err = load_dataset(&DataSource::Path(path), 10000).unwrap_err();
    assert!(
        matches!(err, FitflowError::Data(DataError::UnsupportedFormat(ref ext)) if ext == "xlsx"),
        "Expected an unsupported format error, got {:?}",
        err
    );
}

#[test]
fn test_missing_file_is_an_error() {
    let temp_dir = TempDir::new().unwrap();
    let path = temp_dir.path().join("absent.csv");
    assert!(load_dataset(&DataSource::Path(path), 10000).is_err());
}

#[test]
fn test_source_display() {
    let source = DataSource::parse("https://tidymodels.org/start/models/urchins.csv");
    assert_eq!(source.to_string(), "https://tidymodels.org/start/models/urchins.csv");
    assert!(matches!(DataSource::parse("./urchins.csv"), DataSource::Path(_)));
}
