//! A recipe and a logistic model fitted and applied as one unit

use faer::Mat;
use log::info;
use polars::prelude::*;

use super::logistic::{LogisticFit, LogisticSpec};
use super::{augment, Coefficient, PRED_CLASS};
use crate::error::{DataError, Result};
use crate::pipeline::columns::{distinct_levels, f64_values, string_values};
use crate::pipeline::formula::INTERCEPT;
use crate::pipeline::recipe::{PreparedRecipe, Recipe};

/// Probability above which a row is assigned the event class
pub const CLASS_THRESHOLD: f64 = 0.5;

/// Unfitted preprocessing + model bundle
#[derive(Debug, Clone)]
pub struct Workflow {
    recipe: Recipe,
    model: LogisticSpec,
    event_level: String,
}

/// Fitted bundle: baked with the training recipe, scored with the fitted model
#[derive(Debug, Clone)]
pub struct FittedWorkflow {
    recipe: PreparedRecipe,
    fit: LogisticFit,
    event_level: String,
    other_level: String,
}

impl Workflow {
    pub fn new(recipe: Recipe, model: LogisticSpec, event_level: impl Into<String>) -> Self {
        Self {
            recipe,
            model,
            event_level: event_level.into(),
        }
    }

    pub fn recipe(&self) -> &Recipe {
        &self.recipe
    }

    /// Prep the recipe on `train`, bake it, and fit the model on the result
    pub fn fit(&self, train: &DataFrame) -> Result<FittedWorkflow> {
        let prepared = self.recipe.prep(train)?;
        let baked = prepared.bake(train)?;
        let outcome = &prepared.roles().outcome;

        let (y, other_level) = encode_outcome(&baked, outcome, &self.event_level)?;
        let x = predictor_matrix(&baked, prepared.predictors())?;
        let mut terms = vec![INTERCEPT.to_string()];
        terms.extend(prepared.predictors().iter().cloned());

        info!(
            "Fitting logistic regression: {} rows, {} predictors, event level '{}'",
            x.nrows(),
            prepared.predictors().len(),
            self.event_level
        );
        let fit = self.model.fit_matrix(&x, &y, terms)?;
        info!("IRLS converged in {} iterations", fit.iterations);

        Ok(FittedWorkflow {
            recipe: prepared,
            fit,
            event_level: self.event_level.clone(),
            other_level,
        })
    }
}

impl FittedWorkflow {
    pub fn recipe(&self) -> &PreparedRecipe {
        &self.recipe
    }

    pub fn fit(&self) -> &LogisticFit {
        &self.fit
    }

    pub fn coefficients(&self) -> Vec<Coefficient> {
        self.fit.coefficients()
    }

    pub fn event_level(&self) -> &str {
        &self.event_level
    }

    /// Name of the event probability column, e.g. `.pred_late`
    pub fn event_column(&self) -> String {
        format!(".pred_{}", self.event_level)
    }

    /// Class label plus one probability column per outcome level
    pub fn predict(&self, df: &DataFrame) -> Result<DataFrame> {
        let baked = self.recipe.bake(df)?;
        let x = predictor_matrix(&baked, self.recipe.predictors())?;
        let probs = self.fit.predict_proba(&x);

        let classes: Vec<&str> = probs
            .iter()
            .map(|&p| {
                if p >= CLASS_THRESHOLD {
                    self.event_level.as_str()
                } else {
                    self.other_level.as_str()
                }
            })
            .collect();
        let other: Vec<f64> = probs.iter().map(|p| 1.0 - p).collect();

        Ok(DataFrame::new(vec![
            Column::new(PRED_CLASS.into(), classes),
            Column::new(self.event_column().into(), probs),
            Column::new(format!(".pred_{}", self.other_level).into(), other),
        ])?)
    }

    /// The input rows with the prediction columns appended
    pub fn augment(&self, df: &DataFrame) -> Result<DataFrame> {
        augment(df, &self.predict(df)?)
    }
}

/// 0/1 response for a two-level outcome; returns the non-event level too
fn encode_outcome(df: &DataFrame, outcome: &str, event_level: &str) -> Result<(Vec<f64>, String)> {
    let values = string_values(df, outcome)?;
    if values.iter().any(|v| v.is_none()) {
        return Err(DataError::InvalidOutcome {
            column: outcome.to_string(),
            message: "contains missing values".into(),
        }
        .into());
    }

    let levels = distinct_levels(&values);
    if levels.len() != 2 {
        return Err(DataError::InvalidOutcome {
            column: outcome.to_string(),
            message: format!("expected exactly 2 levels, found {:?}", levels),
        }
        .into());
    }
    if !levels.iter().any(|l| l == event_level) {
        return Err(DataError::InvalidOutcome {
            column: outcome.to_string(),
            message: format!("event level '{}' not among {:?}", event_level, levels),
        }
        .into());
    }
    let other = levels
        .into_iter()
        .find(|l| l != event_level)
        .unwrap_or_default();

    let y = values
        .iter()
        .map(|v| if v.as_deref() == Some(event_level) { 1.0 } else { 0.0 })
        .collect();
    Ok((y, other))
}

/// Intercept column followed by the named numeric predictors
pub fn predictor_matrix(df: &DataFrame, predictors: &[String]) -> Result<Mat<f64>> {
    let columns = predictors
        .iter()
        .map(|name| f64_values(df, name))
        .collect::<Result<Vec<_>>>()?;
    Ok(Mat::from_fn(df.height(), columns.len() + 1, |i, j| {
        if j == 0 {
            1.0
        } else {
            columns[j - 1][i]
        }
    }))
}
