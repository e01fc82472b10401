//! JSON export of pipeline results

use std::path::Path;

use anyhow::{Context, Result};
use chrono::Utc;
use serde::Serialize;

use crate::evaluate::{ConfusionMatrix, RocPoint};
use crate::model::{Coefficient, ParameterSummary};
use crate::pipeline::{FlightPrepReport, PreparedRecipe};

/// Metadata about the run
#[derive(Debug, Serialize)]
pub struct RunMetadata {
    /// Timestamp of the run (ISO 8601 format)
    pub timestamp: String,
    pub fitflow_version: String,
    pub pipeline: String,
    pub inputs: Vec<String>,
    pub seed: u64,
}

impl RunMetadata {
    pub fn new(pipeline: &str, inputs: Vec<String>, seed: u64) -> Self {
        Self {
            timestamp: Utc::now().to_rfc3339(),
            fitflow_version: env!("CARGO_PKG_VERSION").to_string(),
            pipeline: pipeline.to_string(),
            inputs,
            seed,
        }
    }
}

/// Sizes of the two partitions
#[derive(Debug, Serialize)]
pub struct SplitSummary {
    pub prop: f64,
    pub train_rows: usize,
    pub test_rows: usize,
    /// Test rows removed because they carried levels unseen in training
    pub test_rows_dropped: usize,
}

/// Everything the flight delay run produced
#[derive(Debug, Serialize)]
pub struct FlightsExport<'a> {
    pub metadata: RunMetadata,
    pub preparation: &'a FlightPrepReport,
    pub split: SplitSummary,
    pub recipe: &'a PreparedRecipe,
    pub coefficients: Vec<Coefficient>,
    pub deviance: f64,
    pub null_deviance: f64,
    pub aic: f64,
    pub roc_auc: f64,
    pub confusion: ConfusionMatrix,
    pub roc_curve: &'a [RocPoint],
}

/// One synthetic-grid prediction with its interval
#[derive(Debug, Clone, Serialize)]
pub struct IntervalPrediction {
    pub food_regime: String,
    pub initial_volume: f64,
    pub pred: f64,
    pub lower: f64,
    pub upper: f64,
}

/// Least squares results
#[derive(Debug, Serialize)]
pub struct OlsExport {
    pub coefficients: Vec<Coefficient>,
    pub sigma: f64,
    pub r_squared: f64,
    pub adj_r_squared: f64,
    pub predictions: Vec<IntervalPrediction>,
}

/// Posterior results
#[derive(Debug, Serialize)]
pub struct BayesExport {
    pub chains: usize,
    pub iter: usize,
    pub warmup: usize,
    pub priors: Vec<(String, String)>,
    pub summary: Vec<ParameterSummary>,
    pub predictions: Vec<IntervalPrediction>,
}

/// Everything the urchin run produced
#[derive(Debug, Serialize)]
pub struct UrchinsExport {
    pub metadata: RunMetadata,
    pub formula: String,
    pub level: f64,
    pub observations: usize,
    pub ols: OlsExport,
    pub bayes: BayesExport,
}

/// Write any export structure as pretty JSON
pub fn write_json<T: Serialize>(value: &T, output_path: &Path) -> Result<()> {
    let json = serde_json::to_string_pretty(value).context("Failed to serialize results to JSON")?;

    std::fs::write(output_path, json)
        .with_context(|| format!("Failed to write results to {}", output_path.display()))?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_write_json_roundtrips_fields() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("out.json");
        let prediction = IntervalPrediction {
            food_regime: "High".into(),
            initial_volume: 20.0,
            pred: 0.1,
            lower: 0.08,
            upper: 0.12,
        };
        write_json(&vec![prediction], &path).unwrap();

        let text = std::fs::read_to_string(&path).unwrap();
        let value: serde_json::Value = serde_json::from_str(&text).unwrap();
        assert_eq!(value[0]["food_regime"], "High");
        assert_eq!(value[0]["initial_volume"], 20.0);
    }

    #[test]
    fn test_metadata_has_version() {
        let meta = RunMetadata::new("urchins", vec!["urchins.csv".into()], 123);
        assert_eq!(meta.fitflow_version, env!("CARGO_PKG_VERSION"));
        assert!(!meta.timestamp.is_empty());
    }
}
