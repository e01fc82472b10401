//! Model formulas (`response ~ a * b + c`) and the design matrices they
//! describe.
//!
//! A [`FormulaDesign`] learns factor levels from training data and produces
//! a [`PreparedDesign`], which builds model matrices for any frame with the
//! same variables. Categorical variables use treatment coding against their
//! first level.

use std::collections::BTreeMap;
use std::str::FromStr;

use faer::Mat;
use polars::prelude::*;
use serde::Serialize;

use super::columns::{distinct_levels, f64_values, is_categorical, require_column, string_values};
use crate::error::{DataError, PredictError, Result};

pub const INTERCEPT: &str = "(Intercept)";

/// One model term: a main effect (one variable) or an interaction
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Term {
    pub variables: Vec<String>,
}

impl Term {
    pub fn label(&self) -> String {
        self.variables.join(":")
    }
}

/// A parsed formula
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Formula {
    pub response: String,
    pub terms: Vec<Term>,
    pub intercept: bool,
}

impl FromStr for Formula {
    type Err = DataError;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        let (lhs, rhs) = s
            .split_once('~')
            .ok_or_else(|| DataError::InvalidFormula(format!("missing '~' in '{}'", s)))?;
        let response = lhs.trim().to_string();
        if response.is_empty() {
            return Err(DataError::InvalidFormula("missing response".into()));
        }

        let rhs: String = rhs.chars().filter(|c| !c.is_whitespace()).collect();
        let rhs = rhs.replace('-', "+-");

        let mut intercept = true;
        let mut terms: Vec<Term> = Vec::new();
        for item in rhs.split('+').filter(|i| !i.is_empty()) {
            match item {
                "1" => intercept = true,
                "0" | "-1" => intercept = false,
                _ if item.starts_with('-') => {
                    return Err(DataError::InvalidFormula(format!(
                        "term removal '{}' is not supported",
                        item
                    )))
                }
                _ => {
                    for term in expand_item(item)? {
                        if !terms.contains(&term) {
                            terms.push(term);
                        }
                    }
                }
            }
        }

        // Main effects before interactions, otherwise in order of appearance
        terms.sort_by_key(|t| t.variables.len());

        if terms.is_empty() && !intercept {
            return Err(DataError::InvalidFormula("formula has no terms".into()));
        }

        Ok(Formula {
            response,
            terms,
            intercept,
        })
    }
}

/// Expand `a*b` into `a`, `b`, `a:b`; `a:b` stays a single term
fn expand_item(item: &str) -> std::result::Result<Vec<Term>, DataError> {
    let factors: Vec<&str> = item.split('*').collect();
    if factors.iter().any(|f| f.is_empty()) {
        return Err(DataError::InvalidFormula(format!("malformed term '{}'", item)));
    }

    let parts: Vec<Vec<String>> = factors
        .iter()
        .map(|f| f.split(':').map(|v| v.to_string()).collect::<Vec<_>>())
        .collect();
    if parts.iter().flatten().any(|v| v.is_empty()) {
        return Err(DataError::InvalidFormula(format!("malformed term '{}'", item)));
    }

    // Every non-empty subset of the '*' factors, in subset-size order
    let n = parts.len();
    let mut subsets: Vec<Vec<usize>> = (1u32..(1 << n))
        .map(|mask| (0..n).filter(|i| mask & (1 << i) != 0).collect())
        .collect();
    subsets.sort_by_key(|s: &Vec<usize>| s.len());

    Ok(subsets
        .into_iter()
        .map(|subset| Term {
            variables: subset.iter().flat_map(|&i| parts[i].clone()).collect(),
        })
        .collect())
}

/// How a variable enters the design matrix
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub enum VariableKind {
    Numeric,
    /// Categorical with its levels, reference first
    Categorical(Vec<String>),
}

/// Unfitted formula plus optional explicit level orders
#[derive(Debug, Clone)]
pub struct FormulaDesign {
    formula: Formula,
    levels: BTreeMap<String, Vec<String>>,
}

impl FormulaDesign {
    pub fn new(formula: Formula) -> Self {
        Self {
            formula,
            levels: BTreeMap::new(),
        }
    }

    pub fn parse(formula: &str) -> Result<Self> {
        Ok(Self::new(formula.parse::<Formula>()?))
    }

    /// Fix the level order of a categorical variable (first level is the reference)
    pub fn with_levels<I, S>(mut self, variable: &str, levels: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.levels.insert(
            variable.to_string(),
            levels.into_iter().map(Into::into).collect(),
        );
        self
    }

    pub fn formula(&self) -> &Formula {
        &self.formula
    }

    /// Learn variable kinds and levels from training data
    pub fn prep(&self, training: &DataFrame) -> Result<PreparedDesign> {
        let mut variables = BTreeMap::new();
        for term in &self.formula.terms {
            for name in &term.variables {
                if variables.contains_key(name) {
                    continue;
                }
                let column = require_column(training, name)?;
                let kind = if is_categorical(column.dtype()) || self.levels.contains_key(name) {
                    let levels = match self.levels.get(name) {
                        Some(levels) => levels.clone(),
                        None => distinct_levels(&string_values(training, name)?),
                    };
                    VariableKind::Categorical(levels)
                } else {
                    VariableKind::Numeric
                };
                variables.insert(name.clone(), kind);
            }
        }

        let mut prepared = PreparedDesign {
            formula: self.formula.clone(),
            variables,
            column_names: Vec::new(),
        };
        prepared.column_names = prepared.expand(training)?.into_iter().map(|(n, _)| n).collect();
        Ok(prepared)
    }
}

/// A formula with learned levels; builds model matrices
#[derive(Debug, Clone, Serialize)]
pub struct PreparedDesign {
    formula: Formula,
    variables: BTreeMap<String, VariableKind>,
    column_names: Vec<String>,
}

impl PreparedDesign {
    pub fn formula(&self) -> &Formula {
        &self.formula
    }

    /// Design matrix column names, `(Intercept)` first when present
    pub fn column_names(&self) -> &[String] {
        &self.column_names
    }

    pub fn variables(&self) -> &BTreeMap<String, VariableKind> {
        &self.variables
    }

    /// Index of the intercept column, if the formula has one
    pub fn intercept_index(&self) -> Option<usize> {
        self.formula.intercept.then_some(0)
    }

    pub fn response(&self, df: &DataFrame) -> Result<Vec<f64>> {
        f64_values(df, &self.formula.response)
    }

    /// Build the model matrix for `df` (rows aligned with `df`)
    pub fn model_matrix(&self, df: &DataFrame) -> Result<Mat<f64>> {
        let columns = self.expand(df)?;
        let n = df.height();
        Ok(Mat::from_fn(n, columns.len(), |i, j| columns[j].1[i]))
    }

    fn expand(&self, df: &DataFrame) -> Result<Vec<(String, Vec<f64>)>> {
        let n = df.height();
        let mut columns: Vec<(String, Vec<f64>)> = Vec::new();
        if self.formula.intercept {
            columns.push((INTERCEPT.to_string(), vec![1.0; n]));
        }

        let mut components: BTreeMap<&str, Vec<(String, Vec<f64>)>> = BTreeMap::new();
        for (name, kind) in &self.variables {
            if df.column(name).is_err() {
                return Err(PredictError::SchemaMismatch(name.clone()).into());
            }
            components.insert(name.as_str(), variable_columns(df, name, kind)?);
        }

        for term in &self.formula.terms {
            let mut term_columns: Vec<(String, Vec<f64>)> = vec![(String::new(), vec![1.0; n])];
            for variable in &term.variables {
                let parts = &components[variable.as_str()];
                let mut next = Vec::with_capacity(term_columns.len() * parts.len());
                for (prefix, left) in &term_columns {
                    for (label, right) in parts {
                        let name = if prefix.is_empty() {
                            label.clone()
                        } else {
                            format!("{}:{}", prefix, label)
                        };
                        let values = left.iter().zip(right).map(|(a, b)| a * b).collect();
                        next.push((name, values));
                    }
                }
                term_columns = next;
            }
            columns.extend(term_columns);
        }
        Ok(columns)
    }
}

fn variable_columns(
    df: &DataFrame,
    name: &str,
    kind: &VariableKind,
) -> Result<Vec<(String, Vec<f64>)>> {
    match kind {
        VariableKind::Numeric => Ok(vec![(name.to_string(), f64_values(df, name)?)]),
        VariableKind::Categorical(levels) => {
            let values = string_values(df, name)?;
            let mut unseen: Vec<String> = Vec::new();
            let mut missing = 0;
            for value in &values {
                match value {
                    None => missing += 1,
                    Some(v) if !levels.contains(v) && !unseen.contains(v) => unseen.push(v.clone()),
                    _ => {}
                }
            }
            if missing > 0 {
                return Err(DataError::MissingValues {
                    column: name.to_string(),
                    count: missing,
                }
                .into());
            }
            if !unseen.is_empty() {
                unseen.sort();
                return Err(PredictError::UnseenLevel {
                    column: name.to_string(),
                    levels: unseen,
                }
                .into());
            }

            Ok(levels
                .iter()
                .skip(1)
                .map(|level| {
                    let indicator = values
                        .iter()
                        .map(|v| if v.as_deref() == Some(level.as_str()) { 1.0 } else { 0.0 })
                        .collect();
                    (format!("{}{}", name, level), indicator)
                })
                .collect())
        }
    }
}
