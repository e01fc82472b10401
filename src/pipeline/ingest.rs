//! Ingestion: key-checked joins, column selection, cleaning and the
//! dataset-specific preparation of the flight and urchin records.

use std::collections::HashSet;

use log::{info, warn};
use polars::prelude::*;
use serde::Serialize;

use super::columns::{column_names, date_values, numeric_values, require_column, string_values};
use crate::error::{DataError, Result};

/// Columns kept for the flight delay model
pub const FLIGHT_COLUMNS: [&str; 10] = [
    "dep_time",
    "flight",
    "origin",
    "dest",
    "air_time",
    "distance",
    "carrier",
    "date",
    "arr_delay",
    "time_hour",
];

/// Composite key joining flights to hourly weather observations
pub const WEATHER_KEYS: [&str; 2] = ["origin", "time_hour"];

/// Food regimes of the urchin experiment, in factor order
pub const FOOD_REGIMES: [&str; 3] = ["Initial", "Low", "High"];

/// How to treat duplicate keys on the right-hand side of a join
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub enum JoinPolicy {
    /// Keep the first right-hand row for each key and warn
    #[default]
    KeepFirst,
    /// Fail on any duplicated right-hand key
    Strict,
}

impl std::str::FromStr for JoinPolicy {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "keep-first" | "keep_first" => Ok(JoinPolicy::KeepFirst),
            "strict" => Ok(JoinPolicy::Strict),
            _ => Err(format!("Unknown join policy: '{}'. Use 'keep-first' or 'strict'.", s)),
        }
    }
}

/// Row accounting for a key-checked join
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct JoinReport {
    pub left_rows: usize,
    pub right_rows: usize,
    /// Right-hand rows discarded because their key was already seen
    pub right_duplicates_removed: usize,
    pub matched_rows: usize,
    /// Left-hand rows with no partner, dropped by the inner join
    pub unmatched_rows: usize,
}

/// Inner-join `right` onto `left` on a composite key.
///
/// Duplicated right-hand keys would fan out left rows, so they are either
/// rejected or reduced to their first occurrence depending on `policy`.
/// The inner join can only drop rows; the report says how many.
pub fn join_checked(
    left: &DataFrame,
    right: &DataFrame,
    keys: &[&str],
    policy: JoinPolicy,
) -> Result<(DataFrame, JoinReport)> {
    for key in keys {
        require_column(left, key)?;
        require_column(right, key)?;
    }

    let right_keys = composite_keys(right, keys)?;
    let mut seen = HashSet::with_capacity(right_keys.len());
    let mut first_rows: Vec<IdxSize> = Vec::with_capacity(right_keys.len());
    for (row, key) in right_keys.into_iter().enumerate() {
        if seen.insert(key) {
            first_rows.push(row as IdxSize);
        }
    }
    let duplicates = right.height() - first_rows.len();

    let right_unique = if duplicates == 0 {
        right.clone()
    } else {
        match policy {
            JoinPolicy::Strict => {
                return Err(DataError::DuplicateJoinKeys {
                    keys: keys.join(", "),
                    duplicates,
                }
                .into())
            }
            JoinPolicy::KeepFirst => {
                warn!(
                    "{} right-hand row(s) share a join key ({}); keeping the first of each",
                    duplicates,
                    keys.join(", ")
                );
                right.take(&IdxCa::from_vec("idx".into(), first_rows))?
            }
        }
    };

    let on: Vec<Expr> = keys.iter().map(|k| col(*k)).collect();
    let joined = left
        .clone()
        .lazy()
        .join(
            right_unique.lazy(),
            on.clone(),
            on,
            JoinArgs {
                maintain_order: MaintainOrderJoin::Left,
                ..JoinArgs::new(JoinType::Inner)
            },
        )
        .collect()?;

    let report = JoinReport {
        left_rows: left.height(),
        right_rows: right.height(),
        right_duplicates_removed: duplicates,
        matched_rows: joined.height(),
        unmatched_rows: left.height().saturating_sub(joined.height()),
    };

    if report.unmatched_rows > 0 {
        info!(
            "Join dropped {} of {} left-hand row(s) without a matching key",
            report.unmatched_rows, report.left_rows
        );
    }

    Ok((joined, report))
}

fn composite_keys(df: &DataFrame, keys: &[&str]) -> Result<Vec<String>> {
    let parts: Vec<Vec<Option<String>>> = keys
        .iter()
        .map(|k| string_values(df, k))
        .collect::<Result<_>>()?;

    Ok((0..df.height())
        .map(|row| {
            parts
                .iter()
                .map(|p| p[row].as_deref().unwrap_or("\u{0}"))
                .collect::<Vec<_>>()
                .join("\u{1f}")
        })
        .collect())
}

/// Keep only the named columns, in the given order
pub fn select_columns(df: &DataFrame, names: &[&str]) -> Result<DataFrame> {
    for name in names {
        require_column(df, name)?;
    }
    Ok(df.select(names.iter().copied())?)
}

/// Drop every row holding a null in any column. Returns the count removed.
pub fn drop_missing(df: &DataFrame) -> Result<(DataFrame, usize)> {
    let cleaned = df.drop_nulls::<String>(None)?;
    let removed = df.height() - cleaned.height();
    Ok((cleaned, removed))
}

/// Cast every string column to a categorical column
pub fn coerce_text_to_categorical(df: &DataFrame) -> Result<DataFrame> {
    let mut out = df.clone();
    let text_columns: Vec<String> = df
        .get_columns()
        .iter()
        .filter(|c| matches!(c.dtype(), DataType::String))
        .map(|c| c.name().to_string())
        .collect();

    for name in text_columns {
        let cast = out
            .column(&name)?
            .cast(&DataType::Categorical(None, CategoricalOrdering::Physical))?;
        out.with_column(cast)?;
    }
    Ok(out)
}

/// Options for turning raw flight and weather tables into model data
#[derive(Debug, Clone, Serialize)]
pub struct FlightPrepOptions {
    /// Arrival delays at or above this many minutes count as late
    pub late_minutes: f64,
    pub join_policy: JoinPolicy,
}

impl Default for FlightPrepOptions {
    fn default() -> Self {
        Self {
            late_minutes: 30.0,
            join_policy: JoinPolicy::KeepFirst,
        }
    }
}

/// What happened while preparing flight data
#[derive(Debug, Clone, Default, Serialize)]
pub struct FlightPrepReport {
    pub join: JoinReport,
    pub rows_with_missing: usize,
    pub final_rows: usize,
}

/// Build the modelling table for the flight delay classifier.
///
/// Recodes `arr_delay` into `late`/`on_time`, derives `date` from
/// `time_hour`, joins weather on origin and hour, keeps the model columns,
/// removes incomplete rows and turns text columns into categoricals.
pub fn prepare_flight_data(
    flights: &DataFrame,
    weather: &DataFrame,
    options: &FlightPrepOptions,
) -> Result<(DataFrame, FlightPrepReport)> {
    let mut recoded = flights.clone();

    let delay_class: Vec<Option<&str>> = numeric_values(flights, "arr_delay")?
        .into_iter()
        .map(|d| d.map(|d| if d >= options.late_minutes { "late" } else { "on_time" }))
        .collect();
    recoded.with_column(Column::new("arr_delay".into(), delay_class))?;

    let dates = date_values(flights, "time_hour")?;
    recoded.with_column(Column::new("date".into(), dates))?;

    let (joined, join_report) = join_checked(&recoded, weather, &WEATHER_KEYS, options.join_policy)?;
    let selected = select_columns(&joined, &FLIGHT_COLUMNS)?;
    let (complete, rows_with_missing) = drop_missing(&selected)?;
    let prepared = coerce_text_to_categorical(&complete)?;

    let report = FlightPrepReport {
        join: join_report,
        rows_with_missing,
        final_rows: prepared.height(),
    };
    info!(
        "Flight data prepared: {} rows ({} removed for missing values)",
        report.final_rows, report.rows_with_missing
    );

    Ok((prepared, report))
}

/// Normalise the urchin table to `food_regime`, `initial_volume`, `width`.
///
/// The published file uses the headers `TREAT`, `IV` and `SUTW`; tables
/// that already carry the descriptive names are accepted unchanged.
pub fn prepare_urchin_data(raw: &DataFrame) -> Result<DataFrame> {
    let mut df = raw.clone();
    let names = column_names(raw);
    for (old, new) in [("TREAT", "food_regime"), ("IV", "initial_volume"), ("SUTW", "width")] {
        if names.iter().any(|n| n == old) {
            df.rename(old, new.into())?;
        }
    }

    let df = select_columns(&df, &["food_regime", "initial_volume", "width"])?;

    let regimes = string_values(&df, "food_regime")?;
    let unknown: Vec<String> = regimes
        .iter()
        .flatten()
        .filter(|r| !FOOD_REGIMES.contains(&r.as_str()))
        .cloned()
        .collect::<HashSet<_>>()
        .into_iter()
        .collect();
    if !unknown.is_empty() {
        return Err(DataError::SchemaMismatch {
            column: "food_regime".to_string(),
            expected: FOOD_REGIMES.join("/"),
            found: unknown.join("/"),
        }
        .into());
    }

    numeric_values(&df, "initial_volume")?;
    numeric_values(&df, "width")?;

    let (df, removed) = drop_missing(&df)?;
    if removed > 0 {
        warn!("Removed {} incomplete urchin record(s)", removed);
    }
    Ok(df)
}

/// Row count and column means per group, sorted by the group column
pub fn summarize_by_group(df: &DataFrame, group: &str, columns: &[&str]) -> Result<DataFrame> {
    require_column(df, group)?;
    let mut aggregations = vec![len().alias("n")];
    for name in columns {
        numeric_values(df, name)?;
        aggregations.push(col(*name).cast(DataType::Float64).mean().alias(format!("mean_{}", name)));
    }
    Ok(df
        .clone()
        .lazy()
        .with_column(col(group).cast(DataType::String))
        .group_by([col(group)])
        .agg(aggregations)
        .sort([group], SortMultipleOptions::default())
        .collect()?)
}
