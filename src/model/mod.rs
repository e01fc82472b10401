//! Model fitting and prediction.
//!
//! Every model follows the same shape: an unfitted specification
//! (`LogisticSpec`, `OlsSpec`, `BayesSpec`) is fitted once on training data
//! and produces an immutable fit that can predict on any same-schema frame.

pub mod bayes;
pub mod linalg;
pub mod logistic;
pub mod ols;
pub mod workflow;

use polars::prelude::*;
use serde::Serialize;
use statrs::statistics::{Data, Median};

pub use bayes::{BayesFit, BayesSpec, ParameterSummary, Prior, SigmaPrior};
pub use logistic::{LogisticFit, LogisticSpec};
pub use ols::{OlsFit, OlsSpec};
pub use workflow::{FittedWorkflow, Workflow};

pub const PRED: &str = ".pred";
pub const PRED_LOWER: &str = ".pred_lower";
pub const PRED_UPPER: &str = ".pred_upper";
pub const PRED_CLASS: &str = ".pred_class";

/// One row of a coefficient table
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Coefficient {
    pub term: String,
    pub estimate: f64,
    pub std_error: f64,
    pub statistic: f64,
    pub p_value: f64,
}

/// Interval requested alongside point predictions
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Interval {
    /// Interval for the mean response
    Confidence(f64),
    /// Interval for a new observation
    Prediction(f64),
}

impl Interval {
    pub fn level(&self) -> f64 {
        match self {
            Interval::Confidence(level) | Interval::Prediction(level) => *level,
        }
    }
}

/// Append prediction columns to the frame they were computed from
pub fn augment(df: &DataFrame, predictions: &DataFrame) -> crate::error::Result<DataFrame> {
    Ok(df.hstack(predictions.get_columns())?)
}

/// Linearly interpolated (type-7) quantile; NaN for empty input
pub fn quantile(values: &[f64], p: f64) -> f64 {
    Float64Chunked::from_vec(PlSmallStr::EMPTY, values.to_vec())
        .quantile(p.clamp(0.0, 1.0), QuantileMethod::Linear)
        .ok()
        .flatten()
        .unwrap_or(f64::NAN)
}

/// Median of unsorted values; NaN for empty input
pub fn median(values: &[f64]) -> f64 {
    if values.is_empty() {
        return f64::NAN;
    }
    Data::new(values.to_vec()).median()
}
