//! Fitting and application of individual recipe steps

use std::collections::{BTreeMap, BTreeSet};

use log::{debug, warn};
use polars::prelude::*;
use serde::{Deserialize, Serialize};
use statrs::statistics::Statistics;

use super::{DeclaredLevels, PreparedStep, Roles, Step, UnseenLevelHandling};
use crate::error::{DataError, PredictError, Result};
use crate::pipeline::columns::{
    date_values, distinct_levels, f64_values, is_categorical, is_temporal, numeric_values,
    require_column, string_values,
};

/// Learned level set for one dummy-encoded column
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DummyEncoding {
    pub column: String,
    /// All levels, reference level first
    pub levels: Vec<String>,
    pub one_hot: bool,
}

impl DummyEncoding {
    /// Levels that receive an indicator column
    pub fn encoded_levels(&self) -> &[String] {
        if self.one_hot {
            &self.levels
        } else {
            self.levels.get(1..).unwrap_or(&[])
        }
    }

    pub fn indicator_name(&self, level: &str) -> String {
        format!("{}_{}", self.column, sanitize_level(level))
    }

    /// Distinct levels can sanitize to the same indicator name
    fn check_indicator_names(&self) -> Result<()> {
        let mut seen: BTreeMap<String, &str> = BTreeMap::new();
        for level in self.encoded_levels() {
            let name = self.indicator_name(level);
            if let Some(first) = seen.insert(name.clone(), level) {
                return Err(DataError::IndicatorCollision {
                    column: self.column.clone(),
                    name,
                    first: first.to_string(),
                    second: level.clone(),
                }
                .into());
            }
        }
        Ok(())
    }
}

/// Learned centre and scale for one column
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ColumnScale {
    pub column: String,
    pub mean: f64,
    pub sd: f64,
}

fn sanitize_level(level: &str) -> String {
    level
        .chars()
        .map(|c| if c.is_ascii_alphanumeric() || c == '_' { c } else { '.' })
        .collect()
}

/// Date steps accept calendar columns and ISO-formatted text
fn require_date_like(df: &DataFrame, name: &str) -> Result<()> {
    let dtype = require_column(df, name)?.dtype();
    if is_temporal(dtype) || matches!(dtype, DataType::String) {
        Ok(())
    } else {
        Err(DataError::SchemaMismatch {
            column: name.to_string(),
            expected: "date".to_string(),
            found: dtype.to_string(),
        }
        .into())
    }
}

impl Step {
    /// Learn this step's parameters from `df`
    pub(crate) fn fit(
        &self,
        df: &DataFrame,
        roles: &Roles,
        declared: &DeclaredLevels,
    ) -> Result<PreparedStep> {
        match self {
            Step::Date {
                column,
                features,
                keep_original_cols,
            } => {
                require_date_like(df, column)?;
                Ok(PreparedStep::Date {
                    column: column.clone(),
                    features: features.clone(),
                    keep_original_cols: *keep_original_cols,
                })
            }
            Step::Holiday {
                column,
                holidays,
                keep_original_cols,
            } => {
                require_date_like(df, column)?;
                Ok(PreparedStep::Holiday {
                    column: column.clone(),
                    holidays: holidays.clone(),
                    keep_original_cols: *keep_original_cols,
                })
            }
            Step::Dummy { selector, one_hot } => {
                let mut encodings = Vec::new();
                for column in selector.resolve(df, roles)? {
                    let values = string_values(df, &column)?;
                    let missing = values.iter().filter(|v| v.is_none()).count();
                    if missing > 0 {
                        return Err(DataError::MissingValues {
                            column,
                            count: missing,
                        }
                        .into());
                    }
                    let levels = match declared.get(&column) {
                        Some(levels) => levels.clone(),
                        None => distinct_levels(&values),
                    };
                    let encoding = DummyEncoding {
                        column,
                        levels,
                        one_hot: *one_hot,
                    };
                    encoding.check_indicator_names()?;
                    encodings.push(encoding);
                }
                Ok(PreparedStep::Dummy { encodings })
            }
            Step::ZeroVariance { selector } => {
                let mut removed = Vec::new();
                for column in selector.resolve(df, roles)? {
                    let series = require_column(df, &column)?
                        .as_materialized_series()
                        .drop_nulls();
                    if series.n_unique()? < 2 {
                        removed.push(column);
                    }
                }
                Ok(PreparedStep::ZeroVariance { removed })
            }
            Step::Normalize { selector } => {
                let mut scales = Vec::new();
                for column in selector.resolve(df, roles)? {
                    let values = f64_values(df, &column)?;
                    let mean = values.iter().mean();
                    let var = values.iter().variance();
                    let sd = if var.is_finite() && var > 0.0 {
                        var.sqrt()
                    } else {
                        warn!("Column '{}' has no spread; centring only", column);
                        1.0
                    };
                    scales.push(ColumnScale { column, mean, sd });
                }
                Ok(PreparedStep::Normalize { scales })
            }
            Step::Remove { columns } => Ok(PreparedStep::Remove {
                columns: columns.clone(),
            }),
        }
    }
}

impl PreparedStep {
    /// Record factor levels this step creates so later encodings use the full set
    pub(crate) fn declare_levels(&self, declared: &mut DeclaredLevels) {
        if let PreparedStep::Date {
            column, features, ..
        } = self
        {
            for feature in features {
                if let Some(levels) = feature.levels() {
                    declared.insert(feature.column_name(column), levels);
                }
            }
        }
    }

    /// Apply the fitted step. Never mutates the input.
    pub(crate) fn apply(&self, df: &DataFrame, unseen: UnseenLevelHandling) -> Result<DataFrame> {
        let mut out = df.clone();
        match self {
            PreparedStep::Date {
                column,
                features,
                keep_original_cols,
            } => {
                let dates = date_values(df, column)?;
                for feature in features {
                    let name = feature.column_name(column);
                    let derived = if feature.is_factor() {
                        let labels: Vec<Option<&str>> =
                            dates.iter().map(|d| d.map(|d| feature.label(d))).collect();
                        Column::new(name.into(), labels)
                    } else {
                        let numbers: Vec<Option<i32>> =
                            dates.iter().map(|d| d.map(|d| feature.number(d))).collect();
                        Column::new(name.into(), numbers)
                    };
                    out.with_column(derived)?;
                }
                if !keep_original_cols {
                    out = out.drop(column)?;
                }
            }
            PreparedStep::Holiday {
                column,
                holidays,
                keep_original_cols,
            } => {
                let dates = date_values(df, column)?;
                for holiday in holidays {
                    let flags: Vec<Option<f64>> = dates
                        .iter()
                        .map(|d| d.map(|d| if holiday.is_on(d) { 1.0 } else { 0.0 }))
                        .collect();
                    let name = format!("{}_{}", column, holiday.name());
                    out.with_column(Column::new(name.into(), flags))?;
                }
                if !keep_original_cols {
                    out = out.drop(column)?;
                }
            }
            PreparedStep::Dummy { encodings } => {
                for encoding in encodings {
                    out = apply_dummy(&out, encoding, unseen)?;
                }
            }
            PreparedStep::ZeroVariance { removed } => {
                for column in removed {
                    if out.column(column).is_ok() {
                        out = out.drop(column)?;
                    }
                }
            }
            PreparedStep::Normalize { scales } => {
                for scale in scales {
                    let values = numeric_values(&out, &scale.column)?;
                    let scaled: Vec<Option<f64>> = values
                        .into_iter()
                        .map(|v| v.map(|v| (v - scale.mean) / scale.sd))
                        .collect();
                    out.with_column(Column::new(scale.column.as_str().into(), scaled))?;
                }
            }
            PreparedStep::Remove { columns } => {
                for column in columns {
                    require_column(&out, column)?;
                    out = out.drop(column)?;
                }
            }
        }
        Ok(out)
    }

    /// Human-readable description of the fitted step
    pub fn describe(&self) -> String {
        match self {
            PreparedStep::Date {
                column, features, ..
            } => {
                let names: Vec<&str> = features.iter().map(|f| f.suffix()).collect();
                format!("Date features from {}: {}", column, names.join(", "))
            }
            PreparedStep::Holiday {
                column, holidays, ..
            } => format!("Holiday indicators from {}: {} holiday(s)", column, holidays.len()),
            PreparedStep::Dummy { encodings } => {
                let indicators: usize = encodings.iter().map(|e| e.encoded_levels().len()).sum();
                let names: Vec<&str> = encodings.iter().map(|e| e.column.as_str()).collect();
                format!(
                    "Dummy variables from {} ({} indicator column(s))",
                    names.join(", "),
                    indicators
                )
            }
            PreparedStep::ZeroVariance { removed } => {
                if removed.is_empty() {
                    "Zero variance filter removed no terms".to_string()
                } else {
                    format!("Zero variance filter removed {}", removed.join(", "))
                }
            }
            PreparedStep::Normalize { scales } => {
                format!("Centering and scaling for {} column(s)", scales.len())
            }
            PreparedStep::Remove { columns } => format!("Variables removed: {}", columns.join(", ")),
        }
    }
}

fn apply_dummy(
    df: &DataFrame,
    encoding: &DummyEncoding,
    unseen: UnseenLevelHandling,
) -> Result<DataFrame> {
    let values = string_values(df, &encoding.column)?;
    let column_dtype = require_column(df, &encoding.column)?.dtype().clone();
    if !is_categorical(&column_dtype) {
        debug!(
            "Dummy encoding non-text column '{}' ({}) by its string values",
            encoding.column, column_dtype
        );
    }

    let known: BTreeSet<&str> = encoding.levels.iter().map(|s| s.as_str()).collect();
    let mut unseen_levels = BTreeSet::new();
    let mut missing = 0;
    for value in &values {
        match value {
            None => missing += 1,
            Some(v) if !known.contains(v.as_str()) => {
                unseen_levels.insert(v.clone());
            }
            _ => {}
        }
    }

    if missing > 0 {
        return Err(DataError::MissingValues {
            column: encoding.column.clone(),
            count: missing,
        }
        .into());
    }
    if !unseen_levels.is_empty() && unseen != UnseenLevelHandling::Zero {
        return Err(PredictError::UnseenLevel {
            column: encoding.column.clone(),
            levels: unseen_levels.into_iter().collect(),
        }
        .into());
    }

    let mut out = df.drop(&encoding.column)?;
    for level in encoding.encoded_levels() {
        let indicator: Vec<f64> = values
            .iter()
            .map(|v| if v.as_deref() == Some(level.as_str()) { 1.0 } else { 0.0 })
            .collect();
        out.with_column(Column::new(encoding.indicator_name(level).into(), indicator))?;
    }
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_reference_level_dropped() {
        let encoding = DummyEncoding {
            column: "dest".into(),
            levels: vec!["ATL".into(), "BOS".into(), "LAX".into()],
            one_hot: false,
        };
        assert_eq!(encoding.encoded_levels(), &["BOS".to_string(), "LAX".to_string()]);
        assert_eq!(encoding.indicator_name("BOS"), "dest_BOS");
    }

    #[test]
    fn test_sanitize_level() {
        assert_eq!(sanitize_level("on time"), "on.time");
        assert_eq!(sanitize_level("9E"), "9E");
    }

    #[test]
    fn test_date_step_rejects_numeric_column() {
        let df = df! { "y" => ["a", "b"], "d" => [1.0f64, 2.0] }.unwrap();
        let step = Step::Date {
            column: "d".into(),
            features: vec![super::super::DateFeature::Dow],
            keep_original_cols: true,
        };
        let roles = Roles {
            outcome: "y".into(),
            ids: Vec::new(),
        };
        let err = step.fit(&df, &roles, &DeclaredLevels::new()).unwrap_err();
        assert!(err.to_string().contains("expected date"));
    }

    #[test]
    fn test_dummy_rejects_colliding_indicator_names() {
        let df = df! { "y" => ["n", "n", "y"], "g" => ["a", "a b", "a.b"] }.unwrap();
        let step = Step::Dummy {
            selector: super::super::Selector::Columns(vec!["g".into()]),
            one_hot: false,
        };
        let roles = Roles {
            outcome: "y".into(),
            ids: Vec::new(),
        };
        let err = step.fit(&df, &roles, &DeclaredLevels::new()).unwrap_err();
        assert!(matches!(
            err,
            crate::error::FitflowError::Data(DataError::IndicatorCollision { ref name, .. })
                if name == "g_a.b"
        ));
    }

    #[test]
    fn test_apply_dummy_unseen_zero() {
        let df = df! { "g" => ["a", "b", "z"] }.unwrap();
        let encoding = DummyEncoding {
            column: "g".into(),
            levels: vec!["a".into(), "b".into()],
            one_hot: false,
        };
        let out = apply_dummy(&df, &encoding, UnseenLevelHandling::Zero).unwrap();
        let values = f64_values(&out, "g_b").unwrap();
        assert_eq!(values, vec![0.0, 1.0, 0.0]);
        assert!(out.column("g").is_err());
    }

    #[test]
    fn test_apply_dummy_unseen_error() {
        let df = df! { "g" => ["a", "z"] }.unwrap();
        let encoding = DummyEncoding {
            column: "g".into(),
            levels: vec!["a".into(), "b".into()],
            one_hot: true,
        };
        let err = apply_dummy(&df, &encoding, UnseenLevelHandling::Error).unwrap_err();
        assert!(err.to_string().contains("unseen"));
    }
}
