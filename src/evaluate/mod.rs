//! Evaluation of scored predictions

pub mod metrics;
pub mod roc;

pub use metrics::{accuracy, ConfusionMatrix};
pub use roc::{auc_trapezoid, roc_auc, roc_curve, RocPoint};

use polars::prelude::*;

use crate::error::Result;
use crate::pipeline::columns::{f64_values, string_values};

/// Pull `(is_event, score)` pairs out of an augmented prediction frame
pub fn truth_and_scores(
    df: &DataFrame,
    truth_column: &str,
    event_level: &str,
    score_column: &str,
) -> Result<(Vec<bool>, Vec<f64>)> {
    let truth = string_values(df, truth_column)?
        .into_iter()
        .map(|v| v.as_deref() == Some(event_level))
        .collect();
    let scores = f64_values(df, score_column)?;
    Ok((truth, scores))
}
