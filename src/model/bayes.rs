//! Bayesian linear regression by Gibbs sampling.
//!
//! Student-t priors are expanded as scale mixtures of normals:
//! `θ | λ ~ N(m, λ s²)` with `λ ~ InvGamma(ν/2, ν/2)`. Every full
//! conditional is then conjugate, so each sweep draws the coefficient vector
//! from a multivariate normal, the residual variance from an inverse gamma,
//! and one mixing variance per Student-t parameter.
//!
//! Predictors are centred before sampling, so the intercept prior applies to
//! the expected response at the predictor means. Draws are reported on the
//! original (uncentred) scale.

use faer::Mat;
use indicatif::ProgressBar;
use log::{debug, info};
use polars::prelude::*;
use rand::distributions::Distribution;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use rayon::prelude::*;
use serde::Serialize;
use statrs::distribution::{Gamma, Normal};
use statrs::statistics::Statistics;

use super::linalg::{cholesky, crossprod, mat_vec, xt_vec};
use super::{median, quantile, PRED, PRED_LOWER, PRED_UPPER};
use crate::error::{FitError, Result};
use crate::pipeline::formula::{FormulaDesign, PreparedDesign};

/// MAD to standard deviation under normality
const MAD_SCALE: f64 = 1.4826;

/// Prior distribution for one regression parameter
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub enum Prior {
    StudentT { df: f64, location: f64, scale: f64 },
    Normal { location: f64, scale: f64 },
    /// Improper uniform prior
    Flat,
}

impl Prior {
    /// Cauchy-like default: `student_t(df = 1, location = 0, scale = 2.5)`
    pub fn student_t(df: f64) -> Self {
        Prior::StudentT {
            df,
            location: 0.0,
            scale: 2.5,
        }
    }

    fn validate(&self) -> std::result::Result<(), FitError> {
        match *self {
            Prior::StudentT { df, location, scale } => {
                if !(df > 0.0 && df.is_finite()) {
                    return Err(FitError::InvalidPrior(format!(
                        "Student-t degrees of freedom must be positive, got {}",
                        df
                    )));
                }
                check_location_scale(location, scale)
            }
            Prior::Normal { location, scale } => check_location_scale(location, scale),
            Prior::Flat => Ok(()),
        }
    }

    fn location(&self) -> f64 {
        match *self {
            Prior::StudentT { location, .. } | Prior::Normal { location, .. } => location,
            Prior::Flat => 0.0,
        }
    }

    /// The same prior with its scale multiplied by `factor`
    fn rescaled(&self, factor: f64) -> Self {
        match *self {
            Prior::StudentT { df, location, scale } => Prior::StudentT {
                df,
                location,
                scale: scale * factor,
            },
            Prior::Normal { location, scale } => Prior::Normal {
                location,
                scale: scale * factor,
            },
            Prior::Flat => Prior::Flat,
        }
    }

    /// Conditional prior precision given the current mixing variance
    fn precision(&self, lambda: f64) -> f64 {
        match *self {
            Prior::StudentT { scale, .. } => 1.0 / (lambda * scale * scale),
            Prior::Normal { scale, .. } => 1.0 / (scale * scale),
            Prior::Flat => 0.0,
        }
    }
}

impl std::fmt::Display for Prior {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Prior::StudentT { df, location, scale } => {
                write!(f, "student_t(df = {}, location = {}, scale = {:.4})", df, location, scale)
            }
            Prior::Normal { location, scale } => {
                write!(f, "normal(location = {}, scale = {:.4})", location, scale)
            }
            Prior::Flat => write!(f, "flat"),
        }
    }
}

fn check_location_scale(location: f64, scale: f64) -> std::result::Result<(), FitError> {
    if !location.is_finite() {
        return Err(FitError::InvalidPrior(format!("location must be finite, got {}", location)));
    }
    if !(scale > 0.0 && scale.is_finite()) {
        return Err(FitError::InvalidPrior(format!("scale must be positive, got {}", scale)));
    }
    Ok(())
}

/// `InvGamma(shape, scale)` prior on the residual variance.
///
/// With autoscaling the scale is multiplied by the sample variance of the
/// response.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct SigmaPrior {
    pub shape: f64,
    pub scale: f64,
}

impl Default for SigmaPrior {
    fn default() -> Self {
        Self {
            shape: 0.001,
            scale: 0.001,
        }
    }
}

/// Bayesian linear regression specification
#[derive(Debug, Clone)]
pub struct BayesSpec {
    design: FormulaDesign,
    pub prior: Prior,
    pub prior_intercept: Prior,
    pub sigma_prior: SigmaPrior,
    /// Scale priors by the spread of the response and predictors
    pub autoscale: bool,
    pub chains: usize,
    /// Iterations per chain, warm-up included
    pub iter: usize,
    pub warmup: usize,
    pub seed: u64,
}

/// Posterior summary for one parameter
#[derive(Debug, Clone, Serialize)]
pub struct ParameterSummary {
    pub term: String,
    pub median: f64,
    pub mad_sd: f64,
    pub rhat: f64,
}

#[derive(Debug, Clone)]
struct ChainDraws {
    beta: Vec<Vec<f64>>,
    sigma: Vec<f64>,
}

/// Posterior draws from a fitted Bayesian regression
#[derive(Debug, Clone)]
pub struct BayesFit {
    design: PreparedDesign,
    chains: Vec<ChainDraws>,
    priors: Vec<Prior>,
    pub seed: u64,
    pub warmup: usize,
    pub iter: usize,
}

/// Everything the sampler needs, shared read-only across chains
struct Problem {
    z: Mat<f64>,
    y: Vec<f64>,
    ztz: Mat<f64>,
    zty: Vec<f64>,
    names: Vec<String>,
    priors: Vec<Prior>,
    means: Vec<f64>,
    intercept: Option<usize>,
    sigma_shape: f64,
    sigma_scale: f64,
    var_y: f64,
}

impl BayesSpec {
    pub fn new(design: FormulaDesign) -> Self {
        Self {
            design,
            prior: Prior::student_t(1.0),
            prior_intercept: Prior::student_t(1.0),
            sigma_prior: SigmaPrior::default(),
            autoscale: true,
            chains: 4,
            iter: 2000,
            warmup: 1000,
            seed: 123,
        }
    }

    pub fn with_prior(mut self, prior: Prior) -> Self {
        self.prior = prior;
        self
    }

    pub fn with_prior_intercept(mut self, prior: Prior) -> Self {
        self.prior_intercept = prior;
        self
    }

    pub fn with_sigma_prior(mut self, prior: SigmaPrior) -> Self {
        self.sigma_prior = prior;
        self
    }

    pub fn with_autoscale(mut self, autoscale: bool) -> Self {
        self.autoscale = autoscale;
        self
    }

    pub fn with_chains(mut self, chains: usize) -> Self {
        self.chains = chains;
        self
    }

    pub fn with_iterations(mut self, iter: usize, warmup: usize) -> Self {
        self.iter = iter;
        self.warmup = warmup;
        self
    }

    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = seed;
        self
    }

    /// Total sweeps across all chains
    pub fn total_iterations(&self) -> u64 {
        (self.chains * self.iter) as u64
    }

    pub fn fit(&self, df: &DataFrame) -> Result<BayesFit> {
        self.fit_with_progress(df, &ProgressBar::hidden())
    }

    /// Fit, advancing `progress` once per sweep of every chain
    pub fn fit_with_progress(&self, df: &DataFrame, progress: &ProgressBar) -> Result<BayesFit> {
        self.validate()?;
        let design = self.design.prep(df)?;
        let problem = self.build_problem(&design, df)?;

        info!(
            "Sampling {} chain(s) of {} iterations ({} warm-up), seed {}",
            self.chains, self.iter, self.warmup, self.seed
        );

        let chains = (0..self.chains)
            .into_par_iter()
            .map(|chain| {
                let seed = self.seed.wrapping_add(chain as u64);
                run_chain(&problem, self.iter, self.warmup, seed, progress)
            })
            .collect::<Result<Vec<_>>>()?;

        Ok(BayesFit {
            design,
            chains,
            priors: problem.priors,
            seed: self.seed,
            warmup: self.warmup,
            iter: self.iter,
        })
    }

    fn validate(&self) -> std::result::Result<(), FitError> {
        self.prior.validate()?;
        self.prior_intercept.validate()?;
        if !(self.sigma_prior.shape > 0.0 && self.sigma_prior.scale > 0.0) {
            return Err(FitError::InvalidPrior(format!(
                "residual variance prior needs positive shape and scale, got ({}, {})",
                self.sigma_prior.shape, self.sigma_prior.scale
            )));
        }
        if self.chains == 0 {
            return Err(FitError::InvalidSampler("at least one chain is required".into()));
        }
        if self.warmup >= self.iter {
            return Err(FitError::InvalidSampler(format!(
                "warm-up ({}) must be smaller than the iteration count ({})",
                self.warmup, self.iter
            )));
        }
        Ok(())
    }

    fn build_problem(&self, design: &PreparedDesign, df: &DataFrame) -> Result<Problem> {
        let x = design.model_matrix(df)?;
        let y = design.response(df)?;
        let n = x.nrows();
        let p = x.ncols();
        if n <= p {
            return Err(FitError::InsufficientData { rows: n, params: p }.into());
        }

        let intercept = design.intercept_index();
        let means: Vec<f64> = (0..p)
            .map(|j| {
                if Some(j) == intercept {
                    0.0
                } else {
                    (0..n).map(|i| x[(i, j)]).mean()
                }
            })
            .collect();
        let z = Mat::from_fn(n, p, |i, j| x[(i, j)] - means[j]);

        let sd_y = sample_sd(&y);
        let var_y = sd_y * sd_y;
        let priors: Vec<Prior> = (0..p)
            .map(|j| {
                let base = if Some(j) == intercept {
                    self.prior_intercept
                } else {
                    self.prior
                };
                if !self.autoscale {
                    return base;
                }
                if Some(j) == intercept {
                    base.rescaled(sd_y)
                } else {
                    let column: Vec<f64> = (0..n).map(|i| x[(i, j)]).collect();
                    let sd_x = sample_sd(&column);
                    if sd_x > 0.0 {
                        base.rescaled(sd_y / sd_x)
                    } else {
                        base.rescaled(sd_y)
                    }
                }
            })
            .collect();

        for (name, prior) in design.column_names().iter().zip(&priors) {
            debug!("Prior for {}: {}", name, prior);
            prior.validate()?;
        }

        let sigma_scale = if self.autoscale && var_y > 0.0 {
            self.sigma_prior.scale * var_y
        } else {
            self.sigma_prior.scale
        };

        Ok(Problem {
            ztz: crossprod(&z),
            zty: xt_vec(&z, &y),
            z,
            y,
            names: design.column_names().to_vec(),
            priors,
            means,
            intercept,
            sigma_shape: self.sigma_prior.shape,
            sigma_scale,
            var_y: if var_y > 0.0 { var_y } else { 1.0 },
        })
    }
}

fn run_chain(
    problem: &Problem,
    iter: usize,
    warmup: usize,
    seed: u64,
    progress: &ProgressBar,
) -> Result<ChainDraws> {
    let mut rng = StdRng::seed_from_u64(seed);
    let std_normal = Normal::new(0.0, 1.0).map_err(|e| FitError::InvalidPrior(e.to_string()))?;
    let p = problem.names.len();
    let n = problem.y.len();

    let mut lambda = vec![1.0; p];
    let mut sigma2 = problem.var_y * rng.gen_range(0.5..2.0);
    let mut draws = ChainDraws {
        beta: Vec::with_capacity(iter - warmup),
        sigma: Vec::with_capacity(iter - warmup),
    };

    for sweep in 0..iter {
        // coefficients | sigma², λ
        let mut q = Mat::from_fn(p, p, |i, j| problem.ztz[(i, j)] / sigma2);
        let mut b: Vec<f64> = problem.zty.iter().map(|v| v / sigma2).collect();
        for j in 0..p {
            let precision = problem.priors[j].precision(lambda[j]);
            q[(j, j)] += precision;
            b[j] += precision * problem.priors[j].location();
        }
        let factor = cholesky(&q, &problem.names)?;
        let mean = factor.solve(&b);
        let noise: Vec<f64> = (0..p).map(|_| std_normal.sample(&mut rng)).collect();
        let offset = factor.solve_lt(&noise);
        let theta: Vec<f64> = mean.iter().zip(&offset).map(|(m, o)| m + o).collect();

        // sigma² | coefficients
        let fitted = mat_vec(&problem.z, &theta);
        let rss: f64 = problem.y.iter().zip(&fitted).map(|(y, f)| (y - f).powi(2)).sum();
        sigma2 = inv_gamma(
            &mut rng,
            problem.sigma_shape + n as f64 / 2.0,
            problem.sigma_scale + rss / 2.0,
        )?;

        // λ | coefficients
        for j in 0..p {
            if let Prior::StudentT { df, location, scale } = problem.priors[j] {
                let standardized = (theta[j] - location) / scale;
                lambda[j] = inv_gamma(
                    &mut rng,
                    (df + 1.0) / 2.0,
                    (df + standardized * standardized) / 2.0,
                )?;
            }
        }

        if sweep >= warmup {
            draws.beta.push(uncentre(&theta, &problem.means, problem.intercept));
            draws.sigma.push(sigma2.sqrt());
        }
        progress.inc(1);
    }

    debug!("Chain with seed {} finished", seed);
    Ok(draws)
}

/// Map centred-scale coefficients back to the original predictors
fn uncentre(theta: &[f64], means: &[f64], intercept: Option<usize>) -> Vec<f64> {
    let mut beta = theta.to_vec();
    if let Some(k) = intercept {
        let shift: f64 = theta
            .iter()
            .zip(means)
            .enumerate()
            .filter(|(j, _)| *j != k)
            .map(|(_, (b, m))| b * m)
            .sum();
        beta[k] -= shift;
    }
    beta
}

fn inv_gamma(rng: &mut StdRng, shape: f64, scale: f64) -> Result<f64> {
    let gamma = Gamma::new(shape, scale).map_err(|e| {
        FitError::InvalidPrior(format!("inverse gamma ({}, {}): {}", shape, scale, e))
    })?;
    Ok(1.0 / gamma.sample(rng))
}

fn sample_sd(values: &[f64]) -> f64 {
    if values.len() < 2 {
        return 0.0;
    }
    values.iter().std_dev()
}

impl BayesFit {
    pub fn design(&self) -> &PreparedDesign {
        &self.design
    }

    pub fn terms(&self) -> &[String] {
        self.design.column_names()
    }

    pub fn n_chains(&self) -> usize {
        self.chains.len()
    }

    /// Priors actually used, after autoscaling, one per coefficient
    pub fn prior_summary(&self) -> Vec<(String, Prior)> {
        self.terms().iter().cloned().zip(self.priors.iter().copied()).collect()
    }

    /// Post-warm-up coefficient draws of all chains, in chain order
    pub fn draws(&self) -> Vec<&[f64]> {
        self.chains
            .iter()
            .flat_map(|c| c.beta.iter().map(|d| d.as_slice()))
            .collect()
    }

    pub fn sigma_draws(&self) -> Vec<f64> {
        self.chains.iter().flat_map(|c| c.sigma.iter().copied()).collect()
    }

    /// Median, MAD-SD and split R̂ for every coefficient plus `sigma`
    pub fn summary(&self) -> Vec<ParameterSummary> {
        let mut rows: Vec<ParameterSummary> = self
            .terms()
            .iter()
            .enumerate()
            .map(|(j, term)| {
                let per_chain: Vec<Vec<f64>> = self
                    .chains
                    .iter()
                    .map(|c| c.beta.iter().map(|d| d[j]).collect())
                    .collect();
                summarize(term, &per_chain)
            })
            .collect();
        let sigma: Vec<Vec<f64>> = self.chains.iter().map(|c| c.sigma.clone()).collect();
        rows.push(summarize("sigma", &sigma));
        rows
    }

    /// Posterior median of the linear predictor, with an equal-tailed
    /// credible interval when `level` is given
    pub fn predict(&self, df: &DataFrame, level: Option<f64>) -> Result<DataFrame> {
        let x = self.design.model_matrix(df)?;
        let draws = self.draws();
        let mut pred = Vec::with_capacity(x.nrows());
        let mut lower = Vec::with_capacity(x.nrows());
        let mut upper = Vec::with_capacity(x.nrows());

        for i in 0..x.nrows() {
            let mu: Vec<f64> = draws
                .iter()
                .map(|beta| (0..x.ncols()).map(|j| x[(i, j)] * beta[j]).sum())
                .collect();
            pred.push(median(&mu));
            if let Some(level) = level {
                let tail = (1.0 - level) / 2.0;
                lower.push(quantile(&mu, tail));
                upper.push(quantile(&mu, 1.0 - tail));
            }
        }

        let mut columns = vec![Column::new(PRED.into(), pred)];
        if level.is_some() {
            columns.push(Column::new(PRED_LOWER.into(), lower));
            columns.push(Column::new(PRED_UPPER.into(), upper));
        }
        Ok(DataFrame::new(columns)?)
    }
}

fn summarize(term: &str, per_chain: &[Vec<f64>]) -> ParameterSummary {
    let pooled: Vec<f64> = per_chain.iter().flatten().copied().collect();
    let center = median(&pooled);
    let deviations: Vec<f64> = pooled.iter().map(|v| (v - center).abs()).collect();
    ParameterSummary {
        term: term.to_string(),
        median: center,
        mad_sd: MAD_SCALE * median(&deviations),
        rhat: split_rhat(per_chain),
    }
}

/// Potential scale reduction factor computed on chains split in half
pub fn split_rhat(chains: &[Vec<f64>]) -> f64 {
    let half = chains.iter().map(|c| c.len() / 2).min().unwrap_or(0);
    if half < 2 {
        return f64::NAN;
    }
    let halves: Vec<&[f64]> = chains
        .iter()
        .flat_map(|c| [&c[..half], &c[c.len() - half..]])
        .collect();

    let n = half as f64;
    let means: Vec<f64> = halves.iter().map(|h| h.iter().mean()).collect();
    let between = n * means.iter().variance();
    let within = halves.iter().map(|h| h.iter().variance()).mean();

    if within <= 0.0 {
        return if between <= 0.0 { 1.0 } else { f64::INFINITY };
    }
    let var_plus = (n - 1.0) / n * within + between / n;
    (var_plus / within).sqrt()
}
