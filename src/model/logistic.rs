//! Logistic regression (binomial GLM, logit link) fitted by iteratively
//! reweighted least squares.

use faer::Mat;
use log::debug;
use serde::Serialize;
use statrs::distribution::{ContinuousCDF, Normal};
use statrs::statistics::Statistics;

use super::linalg::{cholesky, mat_vec, weighted_crossprod, xt_vec};
use super::Coefficient;
use crate::error::{FitError, Result};

/// Bounds keeping fitted probabilities away from 0 and 1
const MU_EPS: f64 = 1e-12;

/// Model specification for a binary outcome
#[derive(Debug, Clone, Serialize)]
pub struct LogisticSpec {
    pub max_iterations: usize,
    /// Relative deviance change that counts as converged
    pub tolerance: f64,
}

impl Default for LogisticSpec {
    fn default() -> Self {
        Self {
            max_iterations: 25,
            tolerance: 1e-8,
        }
    }
}

/// A fitted logistic regression
#[derive(Debug, Clone)]
pub struct LogisticFit {
    terms: Vec<String>,
    beta: Vec<f64>,
    covariance: Mat<f64>,
    pub iterations: usize,
    pub deviance: f64,
    pub null_deviance: f64,
    pub aic: f64,
    pub n_observations: usize,
}

impl LogisticSpec {
    /// Fit on a design matrix `x` (intercept column included by the caller)
    /// and a 0/1 response `y`.
    pub fn fit_matrix(&self, x: &Mat<f64>, y: &[f64], terms: Vec<String>) -> Result<LogisticFit> {
        let n = x.nrows();
        let p = x.ncols();
        if n <= p {
            return Err(FitError::InsufficientData { rows: n, params: p }.into());
        }

        // Start from the observed proportions shrunk towards 1/2
        let mut mu: Vec<f64> = y.iter().map(|&yi| (yi + 0.5) / 2.0).collect();
        let mut eta: Vec<f64> = mu.iter().map(|&m| (m / (1.0 - m)).ln()).collect();
        let mut dev_old = binomial_deviance(y, &mu);
        let mut beta = vec![0.0; p];
        let mut converged = false;
        let mut change = f64::INFINITY;
        let mut iterations = 0;

        while iterations < self.max_iterations {
            iterations += 1;

            let w: Vec<f64> = mu.iter().map(|&m| (m * (1.0 - m)).max(MU_EPS)).collect();
            let z: Vec<f64> = (0..n).map(|i| eta[i] + (y[i] - mu[i]) / w[i]).collect();
            let wz: Vec<f64> = (0..n).map(|i| w[i] * z[i]).collect();

            let factor = cholesky(&weighted_crossprod(x, &w), &terms)?;
            beta = factor.solve(&xt_vec(x, &wz));

            eta = mat_vec(x, &beta);
            mu = eta.iter().map(|&e| inv_logit(e)).collect();
            let dev = binomial_deviance(y, &mu);

            change = (dev - dev_old).abs() / (dev.abs() + 0.1);
            debug!("IRLS iteration {}: deviance {:.6} (change {:.3e})", iterations, dev, change);
            dev_old = dev;
            if change < self.tolerance {
                converged = true;
                break;
            }
        }

        if !converged {
            return Err(FitError::NotConverged { iterations, change }.into());
        }

        let w: Vec<f64> = mu.iter().map(|&m| (m * (1.0 - m)).max(MU_EPS)).collect();
        let covariance = cholesky(&weighted_crossprod(x, &w), &terms)?.inverse();

        let y_bar = y.iter().mean();
        let null_deviance = binomial_deviance(y, &vec![y_bar; n]);

        Ok(LogisticFit {
            terms,
            beta,
            covariance,
            iterations,
            deviance: dev_old,
            null_deviance,
            aic: dev_old + 2.0 * p as f64,
            n_observations: n,
        })
    }
}

impl LogisticFit {
    pub fn terms(&self) -> &[String] {
        &self.terms
    }

    pub fn beta(&self) -> &[f64] {
        &self.beta
    }

    /// Coefficient table with Wald z statistics
    pub fn coefficients(&self) -> Vec<Coefficient> {
        let normal = Normal::new(0.0, 1.0).ok();
        self.terms
            .iter()
            .zip(&self.beta)
            .enumerate()
            .map(|(j, (term, &estimate))| {
                let std_error = self.covariance[(j, j)].max(0.0).sqrt();
                let statistic = estimate / std_error;
                let p_value = normal
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

    /// Event probabilities for the rows of `x`
    pub fn predict_proba(&self, x: &Mat<f64>) -> Vec<f64> {
        mat_vec(x, &self.beta).into_iter().map(inv_logit).collect()
    }
}

pub fn inv_logit(eta: f64) -> f64 {
    if eta >= 0.0 {
        1.0 / (1.0 + (-eta).exp())
    } else {
        let e = eta.exp();
        e / (1.0 + e)
    }
}

/// Binomial deviance `-2 Σ [y ln μ + (1-y) ln(1-μ)]`
pub fn binomial_deviance(y: &[f64], mu: &[f64]) -> f64 {
    -2.0 * y
        .iter()
        .zip(mu)
        .map(|(&yi, &m)| {
            let m = m.clamp(MU_EPS, 1.0 - MU_EPS);
            yi * m.ln() + (1.0 - yi) * (1.0 - m).ln()
        })
        .sum::<f64>()
}
