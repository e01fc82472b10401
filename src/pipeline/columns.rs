//! Typed column access helpers shared by the pipeline stages

use chrono::{DateTime, NaiveDate};
use polars::prelude::*;

use crate::error::{DataError, Result};

/// Look up a column, mapping a miss to a data error
pub fn require_column<'a>(df: &'a DataFrame, name: &str) -> Result<&'a Column> {
    df.column(name)
        .map_err(|_| DataError::MissingColumn(name.to_string()).into())
}

/// Whether a dtype is treated as a categorical (nominal) variable
pub fn is_categorical(dtype: &DataType) -> bool {
    matches!(
        dtype,
        DataType::String | DataType::Categorical(_, _) | DataType::Enum(_, _)
    )
}

/// Whether a dtype holds calendar values
pub fn is_temporal(dtype: &DataType) -> bool {
    matches!(dtype, DataType::Date | DataType::Datetime(_, _))
}

/// Whether a dtype can enter a design matrix directly
pub fn is_numeric(dtype: &DataType) -> bool {
    dtype.is_primitive_numeric() || matches!(dtype, DataType::Boolean)
}

/// Read a numeric column as `Option<f64>` values
pub fn numeric_values(df: &DataFrame, name: &str) -> Result<Vec<Option<f64>>> {
    let column = require_column(df, name)?;
    if !is_numeric(column.dtype()) {
        return Err(DataError::NotNumeric(name.to_string()).into());
    }
    let cast = column.cast(&DataType::Float64)?;
    Ok(cast.f64()?.iter().collect())
}

/// Read a numeric column that must be complete
pub fn f64_values(df: &DataFrame, name: &str) -> Result<Vec<f64>> {
    let values = numeric_values(df, name)?;
    let missing = values.iter().filter(|v| v.is_none()).count();
    if missing > 0 {
        return Err(DataError::MissingValues {
            column: name.to_string(),
            count: missing,
        }
        .into());
    }
    Ok(values.into_iter().flatten().collect())
}

/// Read any column as strings (categorical values, keys, labels)
pub fn string_values(df: &DataFrame, name: &str) -> Result<Vec<Option<String>>> {
    let column = require_column(df, name)?;
    let cast = column.cast(&DataType::String)?;
    Ok(cast
        .str()?
        .iter()
        .map(|v| v.map(|s| s.to_string()))
        .collect())
}

/// Read a date, datetime or ISO-formatted string column as calendar dates
pub fn date_values(df: &DataFrame, name: &str) -> Result<Vec<Option<NaiveDate>>> {
    let column = require_column(df, name)?;
    match column.dtype() {
        DataType::Date => {
            let days = column.cast(&DataType::Int32)?;
            Ok(days
                .i32()?
                .iter()
                .map(|d| d.and_then(|d| epoch_seconds_to_date(d as i64 * 86_400)))
                .collect())
        }
        DataType::Datetime(unit, _) => {
            let per_second: i64 = match unit {
                TimeUnit::Nanoseconds => 1_000_000_000,
                TimeUnit::Microseconds => 1_000_000,
                TimeUnit::Milliseconds => 1_000,
            };
            let ticks = column.cast(&DataType::Int64)?;
            Ok(ticks
                .i64()?
                .iter()
                .map(|t| t.and_then(|t| epoch_seconds_to_date(t.div_euclid(per_second))))
                .collect())
        }
        DataType::String => Ok(column
            .str()?
            .iter()
            .map(|v| v.and_then(|s| NaiveDate::parse_from_str(s.get(..10)?, "%Y-%m-%d").ok()))
            .collect()),
        other => Err(DataError::SchemaMismatch {
            column: name.to_string(),
            expected: "date".to_string(),
            found: other.to_string(),
        }
        .into()),
    }
}

fn epoch_seconds_to_date(seconds: i64) -> Option<NaiveDate> {
    DateTime::from_timestamp(seconds, 0).map(|dt| dt.date_naive())
}

/// Sorted distinct non-null values
pub fn distinct_levels(values: &[Option<String>]) -> Vec<String> {
    let mut levels: Vec<String> = values.iter().flatten().cloned().collect();
    levels.sort();
    levels.dedup();
    levels
}

/// Owned column names of a DataFrame
pub fn column_names(df: &DataFrame) -> Vec<String> {
    df.get_column_names().iter().map(|s| s.to_string()).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_numeric_values_rejects_strings() {
        let df = df! { "a" => ["x", "y"] }.unwrap();
        let err = numeric_values(&df, "a").unwrap_err();
        assert!(err.to_string().contains("must be numeric"));
    }

    #[test]
    fn test_f64_values_reports_missing() {
        let df = df! { "a" => [Some(1.0f64), None, Some(3.0)] }.unwrap();
        let err = f64_values(&df, "a").unwrap_err();
        assert!(err.to_string().contains("1 missing value"));
    }

    #[test]
    fn test_date_values_from_strings() {
        let df = df! { "d" => ["2013-01-01", "2013-12-25 07:00:00"] }.unwrap();
        let dates = date_values(&df, "d").unwrap();
        assert_eq!(dates[0], NaiveDate::from_ymd_opt(2013, 1, 1));
        assert_eq!(dates[1], NaiveDate::from_ymd_opt(2013, 12, 25));
    }

    #[test]
    fn test_date_values_from_date_dtype() {
        let df = df! { "d" => ["2013-07-04"] }.unwrap();
        let cast = df.column("d").unwrap().cast(&DataType::Date).unwrap();
        let df = DataFrame::new(vec![cast]).unwrap();
        let dates = date_values(&df, "d").unwrap();
        assert_eq!(dates[0], NaiveDate::from_ymd_opt(2013, 7, 4));
    }

    #[test]
    fn test_distinct_levels_sorted() {
        let values = vec![Some("b".to_string()), None, Some("a".to_string()), Some("b".to_string())];
        assert_eq!(distinct_levels(&values), vec!["a", "b"]);
    }
}
