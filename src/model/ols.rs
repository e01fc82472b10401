//! Ordinary least squares on a formula design

use faer::Mat;
use log::debug;
use polars::prelude::*;
use statrs::distribution::{ContinuousCDF, StudentsT};
use statrs::statistics::Statistics;

use super::linalg::{cholesky, crossprod, mat_vec, quad_form, xt_vec};
use super::{Coefficient, Interval, PRED, PRED_LOWER, PRED_UPPER};
use crate::error::{FitError, Result};
use crate::pipeline::formula::{FormulaDesign, PreparedDesign};

/// Linear regression specification
#[derive(Debug, Clone)]
pub struct OlsSpec {
    design: FormulaDesign,
}

/// A fitted linear regression
#[derive(Debug, Clone)]
pub struct OlsFit {
    design: PreparedDesign,
    beta: Vec<f64>,
    xtx_inv: Mat<f64>,
    /// Residual standard error
    pub sigma: f64,
    pub df_residual: usize,
    pub r_squared: f64,
    pub adj_r_squared: f64,
    pub n_observations: usize,
}

impl OlsSpec {
    pub fn new(design: FormulaDesign) -> Self {
        Self { design }
    }

    pub fn fit(&self, df: &DataFrame) -> Result<OlsFit> {
        let design = self.design.prep(df)?;
        let x = design.model_matrix(df)?;
        let y = design.response(df)?;
        let n = x.nrows();
        let p = x.ncols();
        if n <= p {
            return Err(FitError::InsufficientData { rows: n, params: p }.into());
        }

        let factor = cholesky(&crossprod(&x), design.column_names())?;
        let beta = factor.solve(&xt_vec(&x, &y));
        let xtx_inv = factor.inverse();

        let fitted = mat_vec(&x, &beta);
        let rss: f64 = y.iter().zip(&fitted).map(|(a, b)| (a - b).powi(2)).sum();
        let df_residual = n - p;
        let sigma = (rss / df_residual as f64).sqrt();

        let has_intercept = design.intercept_index().is_some();
        let y_mean = y.iter().mean();
        let tss: f64 = if has_intercept {
            y.iter().map(|v| (v - y_mean).powi(2)).sum()
        } else {
            y.iter().map(|v| v * v).sum()
        };
        let r_squared = if tss > 0.0 { 1.0 - rss / tss } else { 0.0 };
        let df_model = if has_intercept { n - 1 } else { n };
        let adj_r_squared = 1.0 - (1.0 - r_squared) * df_model as f64 / df_residual as f64;

        debug!(
            "OLS fit: {} rows, {} columns, sigma {:.5}, R² {:.4}",
            n, p, sigma, r_squared
        );

        Ok(OlsFit {
            design,
            beta,
            xtx_inv,
            sigma,
            df_residual,
            r_squared,
            adj_r_squared,
            n_observations: n,
        })
    }
}

impl OlsFit {
    pub fn design(&self) -> &PreparedDesign {
        &self.design
    }

    pub fn beta(&self) -> &[f64] {
        &self.beta
    }

    /// Coefficient table with t statistics
    pub fn coefficients(&self) -> Vec<Coefficient> {
        let t = StudentsT::new(0.0, 1.0, self.df_residual as f64).ok();
        self.design
            .column_names()
            .iter()
            .zip(&self.beta)
            .enumerate()
            .map(|(j, (term, &estimate))| {
                let std_error = self.sigma * self.xtx_inv[(j, j)].max(0.0).sqrt();
                let statistic = estimate / std_error;
                let p_value = t
                    .as_ref()
                    .map(|d| 2.0 * (1.0 - d.cdf(statistic.abs())))
                    .unwrap_or(f64::NAN);
                Coefficient {
                    term: term.clone(),
                    estimate,
                    std_error,
                    statistic,
                    p_value,
                }
            })
            .collect()
    }

    /// Predict for new rows. Returns `.pred` plus `.pred_lower`/`.pred_upper`
    /// when an interval is requested; rows align with `df`.
    pub fn predict(&self, df: &DataFrame, interval: Option<Interval>) -> Result<DataFrame> {
        let x = self.design.model_matrix(df)?;
        let pred = mat_vec(&x, &self.beta);
        let mut columns = vec![Column::new(PRED.into(), pred.clone())];

        if let Some(interval) = interval {
            let q = t_quantile(0.5 + interval.level() / 2.0, self.df_residual as f64);
            let mut lower = Vec::with_capacity(pred.len());
            let mut upper = Vec::with_capacity(pred.len());
            for (i, &fit) in pred.iter().enumerate() {
                let row: Vec<f64> = (0..x.ncols()).map(|j| x[(i, j)]).collect();
                let leverage = quad_form(&self.xtx_inv, &row);
                let variance = match interval {
                    Interval::Confidence(_) => leverage,
                    Interval::Prediction(_) => 1.0 + leverage,
                };
                let half_width = q * self.sigma * variance.sqrt();
                lower.push(fit - half_width);
                upper.push(fit + half_width);
            }
            columns.push(Column::new(PRED_LOWER.into(), lower));
            columns.push(Column::new(PRED_UPPER.into(), upper));
        }

        Ok(DataFrame::new(columns)?)
    }
}

/// Quantile of the standard Student-t distribution
pub fn t_quantile(p: f64, df: f64) -> f64 {
    StudentsT::new(0.0, 1.0, df)
        .map(|d| d.inverse_cdf(p))
        .unwrap_or(f64::NAN)
}
