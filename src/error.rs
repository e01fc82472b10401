//! Error types for the fitflow pipelines.
//!
//! Errors fall into three families that mirror the stages of a run:
//! data validation, model fitting, and prediction. External failures
//! (polars, I/O, HTTP) are wrapped so callers can still tell them apart.

use thiserror::Error;

/// Data validation failures raised while loading, joining, splitting or
/// transforming record sets.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum DataError {
    #[error("Column '{0}' not found in dataset")]
    MissingColumn(String),

    #[error("Schema mismatch for column '{column}': expected {expected}, found {found}")]
    SchemaMismatch {
        column: String,
        expected: String,
        found: String,
    },

    #[error("Column '{column}' contains {count} missing value(s)")]
    MissingValues { column: String, count: usize },

    #[error("Join key ({keys}) is duplicated in {duplicates} right-hand row(s)")]
    DuplicateJoinKeys { keys: String, duplicates: usize },

    #[error("Split fraction {0} must lie strictly between 0 and 1")]
    InvalidFraction(f64),

    #[error("Split produced an empty {0} partition")]
    EmptyPartition(&'static str),

    #[error("Column '{0}' must be numeric to enter the design matrix")]
    NotNumeric(String),

    #[error("Outcome column '{column}': {message}")]
    InvalidOutcome { column: String, message: String },

    #[error("Unsupported input format: '{0}'. Supported formats: csv, parquet")]
    UnsupportedFormat(String),

    #[error("Formula error: {0}")]
    InvalidFormula(String),

    #[error("Length mismatch: {truth} truth value(s) against {predicted} prediction(s)")]
    LengthMismatch { truth: usize, predicted: usize },

    #[error("Score in row {row} is not finite ({value})")]
    NonFiniteScore { row: usize, value: f64 },

    #[error("Indicator column '{name}' would be produced by both '{first}' and '{second}' of '{column}'")]
    IndicatorCollision {
        column: String,
        name: String,
        first: String,
        second: String,
    },
}

/// Model fitting failures.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum FitError {
    #[error("Design matrix is rank deficient (column '{column}' is collinear with earlier columns)")]
    RankDeficient { column: String },

    #[error("IRLS failed to converge after {iterations} iterations (deviance change {change:.3e})")]
    NotConverged { iterations: usize, change: f64 },

    #[error("Insufficient data: {rows} rows for {params} parameters")]
    InsufficientData { rows: usize, params: usize },

    #[error("Invalid prior: {0}")]
    InvalidPrior(String),

    #[error("Invalid sampler settings: {0}")]
    InvalidSampler(String),
}

/// Prediction failures.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum PredictError {
    #[error("Column '{column}' has level(s) unseen at fit time: {levels:?}")]
    UnseenLevel { column: String, levels: Vec<String> },

    #[error("New data is missing column '{0}' required by the fitted model")]
    SchemaMismatch(String),
}

/// Broad error family, used by the CLI to pick an exit message.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCategory {
    Data,
    Fit,
    Predict,
    External,
}

/// Top-level library error.
#[derive(Error, Debug)]
pub enum FitflowError {
    #[error(transparent)]
    Data(#[from] DataError),

    #[error(transparent)]
    Fit(#[from] FitError),

    #[error(transparent)]
    Predict(#[from] PredictError),

    #[error("Polars error: {0}")]
    Polars(#[from] polars::prelude::PolarsError),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),
}

impl FitflowError {
    pub fn category(&self) -> ErrorCategory {
        match self {
            FitflowError::Data(_) => ErrorCategory::Data,
            FitflowError::Fit(_) => ErrorCategory::Fit,
            FitflowError::Predict(_) => ErrorCategory::Predict,
            FitflowError::Polars(_) | FitflowError::Io(_) | FitflowError::Http(_) => {
                ErrorCategory::External
            }
        }
    }
}

/// Result type used across the library
pub type Result<T> = std::result::Result<T, FitflowError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_category_mapping() {
        let err: FitflowError = DataError::InvalidFraction(1.5).into();
        assert_eq!(err.category(), ErrorCategory::Data);

        let err: FitflowError = FitError::InsufficientData { rows: 1, params: 3 }.into();
        assert_eq!(err.category(), ErrorCategory::Fit);

        let err: FitflowError = PredictError::SchemaMismatch("x".into()).into();
        assert_eq!(err.category(), ErrorCategory::Predict);

        let err: FitflowError = std::io::Error::new(std::io::ErrorKind::Other, "boom").into();
        assert_eq!(err.category(), ErrorCategory::External);
    }

    #[test]
    fn test_messages_are_transparent() {
        let err: FitflowError = DataError::MissingColumn("dest".into()).into();
        assert_eq!(err.to_string(), "Column 'dest' not found in dataset");
    }
}
