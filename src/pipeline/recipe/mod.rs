//! Feature-derivation recipes.
//!
//! A [`Recipe`] is an ordered list of step specifications plus column roles.
//! It cannot transform data by itself: [`Recipe::prep`] fits every step on
//! training data and returns a [`PreparedRecipe`], whose
//! [`bake`](PreparedRecipe::bake) applies exactly the learned
//! transformations to any frame with the training schema.

mod date;
mod holiday;
mod steps;

use std::collections::BTreeMap;

use log::debug;
use polars::prelude::*;
use serde::{Deserialize, Serialize};

use super::columns::{column_names, is_categorical, is_numeric, require_column};
use crate::error::{PredictError, Result};

pub use date::{DateFeature, DOW_LEVELS, MONTH_LEVELS};
pub use holiday::Holiday;
pub use steps::{ColumnScale, DummyEncoding};

/// How a fitted dummy encoding treats a level it never saw in training
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum UnseenLevelHandling {
    /// Fail with a prediction error
    #[default]
    Error,
    /// Encode the row as all-zero indicators
    Zero,
    /// Remove affected rows before baking (applied by the caller after auditing)
    Drop,
}

impl std::str::FromStr for UnseenLevelHandling {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "error" => Ok(UnseenLevelHandling::Error),
            "zero" => Ok(UnseenLevelHandling::Zero),
            "drop" => Ok(UnseenLevelHandling::Drop),
            _ => Err(format!(
                "Unknown unseen-level handling: '{}'. Use 'drop', 'zero' or 'error'.",
                s
            )),
        }
    }
}

/// Column roles. Every column that is neither the outcome nor an ID is a predictor.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Roles {
    pub outcome: String,
    pub ids: Vec<String>,
}

impl Roles {
    pub fn is_predictor(&self, name: &str) -> bool {
        name != self.outcome && !self.ids.iter().any(|id| id == name)
    }

    /// Predictor columns currently present in `df`
    pub fn predictors(&self, df: &DataFrame) -> Vec<String> {
        column_names(df)
            .into_iter()
            .filter(|n| self.is_predictor(n))
            .collect()
    }
}

/// Which columns a step acts on
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum Selector {
    AllPredictors,
    AllNominalPredictors,
    AllNumericPredictors,
    Columns(Vec<String>),
}

impl Selector {
    pub fn resolve(&self, df: &DataFrame, roles: &Roles) -> Result<Vec<String>> {
        let pick = |keep: fn(&DataType) -> bool| -> Vec<String> {
            df.get_columns()
                .iter()
                .filter(|c| roles.is_predictor(c.name().as_str()) && keep(c.dtype()))
                .map(|c| c.name().to_string())
                .collect()
        };

        Ok(match self {
            Selector::AllPredictors => roles.predictors(df),
            Selector::AllNominalPredictors => pick(is_categorical),
            Selector::AllNumericPredictors => pick(is_numeric),
            Selector::Columns(names) => {
                for name in names {
                    require_column(df, name)?;
                }
                names.clone()
            }
        })
    }
}

/// An unfitted transformation step
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Step {
    /// Derive calendar features from a date column
    Date {
        column: String,
        features: Vec<DateFeature>,
        keep_original_cols: bool,
    },
    /// Add 0/1 indicators for holidays
    Holiday {
        column: String,
        holidays: Vec<Holiday>,
        keep_original_cols: bool,
    },
    /// Replace categorical columns by indicator columns
    Dummy { selector: Selector, one_hot: bool },
    /// Remove columns with a single distinct value
    ZeroVariance { selector: Selector },
    /// Centre and scale numeric columns
    Normalize { selector: Selector },
    /// Drop named columns
    Remove { columns: Vec<String> },
}

/// A step after fitting on training data
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum PreparedStep {
    Date {
        column: String,
        features: Vec<DateFeature>,
        keep_original_cols: bool,
    },
    Holiday {
        column: String,
        holidays: Vec<Holiday>,
        keep_original_cols: bool,
    },
    Dummy { encodings: Vec<DummyEncoding> },
    ZeroVariance { removed: Vec<String> },
    Normalize { scales: Vec<ColumnScale> },
    Remove { columns: Vec<String> },
}

/// Levels declared by earlier steps for the factor columns they create
pub(crate) type DeclaredLevels = BTreeMap<String, Vec<String>>;

/// Recipe specification: roles plus ordered steps
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Recipe {
    roles: Roles,
    steps: Vec<Step>,
    unseen_levels: UnseenLevelHandling,
}

impl Recipe {
    /// Start a recipe predicting `outcome` from every other column
    pub fn new(outcome: impl Into<String>) -> Self {
        Self {
            roles: Roles {
                outcome: outcome.into(),
                ids: Vec::new(),
            },
            steps: Vec::new(),
            unseen_levels: UnseenLevelHandling::Error,
        }
    }

    /// Mark columns as identifiers: carried through but never used as predictors
    pub fn with_ids<I, S>(mut self, ids: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.roles.ids.extend(ids.into_iter().map(Into::into));
        self
    }

    pub fn with_unseen_levels(mut self, handling: UnseenLevelHandling) -> Self {
        self.unseen_levels = handling;
        self
    }

    pub fn step(mut self, step: Step) -> Self {
        self.steps.push(step);
        self
    }

    pub fn step_date(self, column: &str, features: &[DateFeature]) -> Self {
        self.step(Step::Date {
            column: column.to_string(),
            features: features.to_vec(),
            keep_original_cols: true,
        })
    }

    pub fn step_holiday(self, column: &str, holidays: Vec<Holiday>, keep_original_cols: bool) -> Self {
        self.step(Step::Holiday {
            column: column.to_string(),
            holidays,
            keep_original_cols,
        })
    }

    pub fn step_dummy(self, selector: Selector) -> Self {
        self.step(Step::Dummy {
            selector,
            one_hot: false,
        })
    }

    pub fn step_zv(self, selector: Selector) -> Self {
        self.step(Step::ZeroVariance { selector })
    }

    pub fn step_normalize(self, selector: Selector) -> Self {
        self.step(Step::Normalize { selector })
    }

    pub fn step_rm<I, S>(self, columns: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.step(Step::Remove {
            columns: columns.into_iter().map(Into::into).collect(),
        })
    }

    pub fn roles(&self) -> &Roles {
        &self.roles
    }

    pub fn steps(&self) -> &[Step] {
        &self.steps
    }

    /// Fit every step, in order, on the training data
    pub fn prep(&self, training: &DataFrame) -> Result<PreparedRecipe> {
        require_column(training, &self.roles.outcome)?;
        for id in &self.roles.ids {
            require_column(training, id)?;
        }

        let input_columns = self.roles.predictors(training);
        let mut declared = DeclaredLevels::new();
        let mut current = training.clone();
        let mut prepared = Vec::with_capacity(self.steps.len());

        for step in &self.steps {
            let fitted = step.fit(&current, &self.roles, &declared)?;
            fitted.declare_levels(&mut declared);
            current = fitted.apply(&current, self.unseen_levels)?;
            debug!("Prepared step: {}", fitted.describe());
            prepared.push(fitted);
        }

        Ok(PreparedRecipe {
            roles: self.roles.clone(),
            steps: prepared,
            unseen_levels: self.unseen_levels,
            input_columns,
            output_predictors: self.roles.predictors(&current),
        })
    }
}

/// A fitted recipe: an immutable transform for same-schema data
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PreparedRecipe {
    roles: Roles,
    steps: Vec<PreparedStep>,
    unseen_levels: UnseenLevelHandling,
    input_columns: Vec<String>,
    output_predictors: Vec<String>,
}

impl PreparedRecipe {
    /// Apply the fitted steps to new data.
    ///
    /// Every predictor seen at fit time must be present; the outcome and ID
    /// columns are optional and passed through untouched.
    pub fn bake(&self, df: &DataFrame) -> Result<DataFrame> {
        for name in &self.input_columns {
            if df.column(name).is_err() {
                return Err(PredictError::SchemaMismatch(name.clone()).into());
            }
        }

        let mut current = df.clone();
        for step in &self.steps {
            current = step.apply(&current, self.unseen_levels)?;
        }
        Ok(current)
    }

    pub fn roles(&self) -> &Roles {
        &self.roles
    }

    pub fn steps(&self) -> &[PreparedStep] {
        &self.steps
    }

    /// Predictor columns produced by `bake`, in output order
    pub fn predictors(&self) -> &[String] {
        &self.output_predictors
    }

    /// One line per fitted step
    pub fn summary(&self) -> Vec<String> {
        self.steps.iter().map(|s| s.describe()).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn training() -> DataFrame {
        df! {
            "y" => ["a", "b", "a", "b"],
            "id" => [1i64, 2, 3, 4],
            "x" => [1.0f64, 2.0, 3.0, 4.0],
            "g" => ["u", "v", "w", "u"],
        }
        .unwrap()
    }

    #[test]
    fn test_roles_exclude_outcome_and_ids() {
        let recipe = Recipe::new("y").with_ids(["id"]);
        let predictors = recipe.roles().predictors(&training());
        assert_eq!(predictors, vec!["x", "g"]);
    }

    #[test]
    fn test_selector_nominal_skips_outcome() {
        let roles = Roles {
            outcome: "y".into(),
            ids: vec!["id".into()],
        };
        let nominal = Selector::AllNominalPredictors.resolve(&training(), &roles).unwrap();
        assert_eq!(nominal, vec!["g"]);
    }

    #[test]
    fn test_prep_requires_outcome() {
        let err = Recipe::new("missing").prep(&training()).unwrap_err();
        assert!(err.to_string().contains("'missing' not found"));
    }

    #[test]
    fn test_bake_requires_predictors() {
        let prepared = Recipe::new("y").with_ids(["id"]).prep(&training()).unwrap();
        let partial = training().drop("g").unwrap();
        let err = prepared.bake(&partial).unwrap_err();
        assert!(err.to_string().contains("'g'"));
    }

    #[test]
    fn test_unseen_handling_from_str() {
        assert_eq!("zero".parse::<UnseenLevelHandling>().unwrap(), UnseenLevelHandling::Zero);
        assert!("ignore".parse::<UnseenLevelHandling>().is_err());
    }
}
