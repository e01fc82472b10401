//! Dense linear algebra on `faer::Mat`: cross products, Cholesky
//! factorisation with rank checking, and triangular solves.

use faer::col;
use faer::linalg::solvers::{Cholesky, SolverCore, SpSolver};
use faer::linalg::triangular_solve::solve_upper_triangular_in_place;
use faer::{Mat, Parallelism, Side};

use crate::error::FitError;

/// Relative pivot tolerance below which a column counts as collinear
const PIVOT_TOLERANCE: f64 = 1e-10;

/// Cholesky factorisation of a symmetric positive definite matrix
pub struct CholeskyFactor {
    llt: Cholesky<f64>,
    l: Mat<f64>,
}

impl CholeskyFactor {
    /// Lower factor `L` with `A = L Lᵀ`
    pub fn l(&self) -> &Mat<f64> {
        &self.l
    }

    /// Solve `A x = b`
    pub fn solve(&self, b: &[f64]) -> Vec<f64> {
        self.llt.solve(col::from_slice(b)).as_slice().to_vec()
    }

    /// `A⁻¹`
    pub fn inverse(&self) -> Mat<f64> {
        self.llt.inverse()
    }

    /// Solve `Lᵀ x = z`.
    ///
    /// With `z` standard normal, `x` is a draw from `N(0, A⁻¹)`.
    pub fn solve_lt(&self, z: &[f64]) -> Vec<f64> {
        let mut rhs = Mat::from_fn(z.len(), 1, |i, _| z[i]);
        solve_upper_triangular_in_place(self.l.transpose(), rhs.as_mut(), Parallelism::None);
        (0..rhs.nrows()).map(|i| rhs[(i, 0)]).collect()
    }
}

/// `Xᵀ X`
pub fn crossprod(x: &Mat<f64>) -> Mat<f64> {
    x.transpose() * x.as_ref()
}

/// `Xᵀ diag(w) X`
pub fn weighted_crossprod(x: &Mat<f64>, w: &[f64]) -> Mat<f64> {
    let scaled = Mat::from_fn(x.nrows(), x.ncols(), |i, j| x[(i, j)] * w[i].sqrt());
    crossprod(&scaled)
}

/// `Xᵀ v`
pub fn xt_vec(x: &Mat<f64>, v: &[f64]) -> Vec<f64> {
    let v = col::from_slice(v);
    (x.transpose() * &v).as_slice().to_vec()
}

/// `X b`
pub fn mat_vec(x: &Mat<f64>, b: &[f64]) -> Vec<f64> {
    let b = col::from_slice(b);
    (x * &b).as_slice().to_vec()
}

/// Quadratic form `vᵀ A v`
pub fn quad_form(a: &Mat<f64>, v: &[f64]) -> f64 {
    let v = col::from_slice(v);
    let av = a * &v;
    v.transpose() * &av
}

/// Factor `A = L Lᵀ`.
///
/// A pivot that collapses relative to the largest diagonal entry means the
/// columns of the underlying design are linearly dependent; the offending
/// column is named in the error.
pub fn cholesky(a: &Mat<f64>, names: &[String]) -> Result<CholeskyFactor, FitError> {
    let column = |j: usize| FitError::RankDeficient {
        column: names.get(j).cloned().unwrap_or_else(|| format!("#{}", j)),
    };

    let llt = a
        .cholesky(Side::Lower)
        .map_err(|e| column(e.non_positive_definite_minor.saturating_sub(1)))?;
    let l = llt.compute_l();

    let n = a.nrows();
    let scale = (0..n).map(|i| a[(i, i)].abs()).fold(0.0, f64::max).max(f64::MIN_POSITIVE);
    for j in 0..n {
        let pivot = l[(j, j)] * l[(j, j)];
        if !pivot.is_finite() || pivot <= PIVOT_TOLERANCE * scale {
            return Err(column(j));
        }
    }

    Ok(CholeskyFactor { llt, l })
}
