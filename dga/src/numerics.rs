// SPDX-License-Identifier: AGPL-3.0-only

//! Small numerical building blocks shared by the solvers: quadrature,
//! root finding, least squares and nonlinear curve fitting.
//!
//! # Provenance
//!
//! The secant search reproduces the derivative-free branch of
//! `scipy.optimize.newton` (same first step, absolute tolerance only).
//! The Levenberg–Marquardt loop follows Numerical Recipes §15.5 with
//! multiplicative damping updates.

use nalgebra::{DMatrix, DVector};
use num_complex::Complex64;

use crate::error::{DgaError, Result};
use crate::tolerances::{LM_FTOL, LM_MAX_ITER, PINV_CUTOFF};

/// Trapezoidal integral of `y` sampled at `x`.
#[must_use]
pub fn trapz(y: &[f64], x: &[f64]) -> f64 {
    x.windows(2)
        .zip(y.windows(2))
        .map(|(xw, yw)| 0.5 * (xw[1] - xw[0]) * (yw[0] + yw[1]))
        .sum()
}

/// Trapezoidal integration weights: Σ_i w_i y_i equals [`trapz`].
#[must_use]
pub fn trapz_weights(x: &[f64]) -> Vec<f64> {
    let n = x.len();
    let mut w = vec![0.0; n];
    for i in 0..n.saturating_sub(1) {
        let h = 0.5 * (x[i + 1] - x[i]);
        w[i] += h;
        w[i + 1] += h;
    }
    w
}

/// Derivative-free secant root search starting at `x0`.
///
/// # Errors
///
/// [`DgaError::NoConvergence`] when `max_iter` steps do not reach `tol`, or
/// the secant slope degenerates before convergence.
pub fn secant<F>(f: F, x0: f64, tol: f64, max_iter: usize) -> Result<f64>
where
    F: Fn(f64) -> f64,
{
    let eps = 1e-4;
    let mut p0 = x0;
    let mut p1 = x0 * (1.0 + eps) + if x0 >= 0.0 { eps } else { -eps };
    let mut q0 = f(p0);
    let mut q1 = f(p1);
    if q1.abs() < q0.abs() {
        std::mem::swap(&mut p0, &mut p1);
        std::mem::swap(&mut q0, &mut q1);
    }
    for _ in 0..max_iter {
        if q1 == q0 {
            if (p1 - p0).abs() > tol {
                return Err(DgaError::NoConvergence {
                    solver: "secant (flat slope)",
                    iterations: max_iter,
                });
            }
            return Ok(0.5 * (p1 + p0));
        }
        let p = if q1.abs() > q0.abs() {
            (-q0 / q1 * p1 + p0) / (1.0 - q0 / q1)
        } else {
            (-q1 / q0 * p0 + p1) / (1.0 - q1 / q0)
        };
        if !p.is_finite() {
            return Err(DgaError::NotANumber("secant iterate".into()));
        }
        if (p - p1).abs() < tol {
            return Ok(p);
        }
        p0 = p1;
        q0 = q1;
        p1 = p;
        q1 = f(p1);
    }
    Err(DgaError::NoConvergence {
        solver: "secant",
        iterations: max_iter,
    })
}

/// Invert a square complex matrix.
///
/// # Errors
///
/// [`DgaError::SingularMatrix`] when the LU factorisation is singular.
pub fn invert(m: DMatrix<Complex64>, context: &str) -> Result<DMatrix<Complex64>> {
    m.try_inverse()
        .ok_or_else(|| DgaError::SingularMatrix(context.to_string()))
}

/// Moore–Penrose pseudo-inverse of a real matrix.
///
/// # Errors
///
/// [`DgaError::SingularMatrix`] if the SVD fails to converge.
pub fn pinv(m: &DMatrix<f64>) -> Result<DMatrix<f64>> {
    m.clone()
        .pseudo_inverse(PINV_CUTOFF)
        .map_err(|e| DgaError::SingularMatrix(format!("pseudo-inverse: {e}")))
}

/// Least-squares solution of `a x = b` through the SVD.
///
/// # Errors
///
/// [`DgaError::SingularMatrix`] when the system has no least-squares solution.
pub fn lstsq(a: &DMatrix<f64>, b: &DVector<f64>) -> Result<DVector<f64>> {
    a.clone()
        .svd(true, true)
        .solve(b, PINV_CUTOFF)
        .map_err(|e| DgaError::SingularMatrix(format!("least squares: {e}")))
}

/// Polynomial least-squares fit; coefficients in increasing order c₀ + c₁x + …
///
/// # Errors
///
/// [`DgaError::InvalidArgument`] when there are fewer points than
/// coefficients, or [`DgaError::SingularMatrix`] from the solve.
pub fn polyfit(x: &[f64], y: &[f64], order: usize) -> Result<Vec<f64>> {
    if x.len() != y.len() || x.len() < order + 1 {
        return Err(DgaError::InvalidArgument(format!(
            "polyfit of order {order} needs at least {} points, got {}",
            order + 1,
            x.len()
        )));
    }
    let a = DMatrix::from_fn(x.len(), order + 1, |i, j| x[i].powi(j as i32));
    let b = DVector::from_column_slice(y);
    Ok(lstsq(&a, &b)?.iter().copied().collect())
}

/// Evaluate a polynomial with increasing-order coefficients.
#[must_use]
pub fn polyval(coeffs: &[f64], x: f64) -> f64 {
    coeffs.iter().rev().fold(0.0, |acc, c| acc * x + c)
}

/// Result of a Levenberg–Marquardt minimisation.
#[derive(Clone, Debug)]
pub struct LmSolution {
    /// Optimal parameters.
    pub params: Vec<f64>,
    /// Final ½|r|².
    pub cost: f64,
    /// Iterations performed.
    pub iterations: usize,
}

/// Minimise ½|r(p)|² with Levenberg–Marquardt and an analytic Jacobian
/// (`jac(p)[i][j] = ∂r_i/∂p_j`).
///
/// # Errors
///
/// [`DgaError::NotANumber`] if the residual becomes non-finite.
pub fn levenberg_marquardt_with_jacobian<R, J>(residual: R, jacobian: J, p0: &[f64]) -> Result<LmSolution>
where
    R: Fn(&[f64]) -> Vec<f64>,
    J: Fn(&[f64]) -> DMatrix<f64>,
{
    let mut p = p0.to_vec();
    let mut r = DVector::from_vec(residual(&p));
    let mut cost = 0.5 * r.norm_squared();
    if !cost.is_finite() {
        return Err(DgaError::NotANumber("Levenberg-Marquardt start".into()));
    }
    let mut damping = 1e-3;
    let n = p.len();
    for iter in 0..LM_MAX_ITER {
        let jm = jacobian(&p);
        let jt = jm.transpose();
        let jtj = &jt * &jm;
        let g = &jt * &r;
        let mut improved = false;
        while damping < 1e16 {
            let mut a = jtj.clone();
            for i in 0..n {
                a[(i, i)] += damping * jtj[(i, i)].max(1e-12);
            }
            let rhs = -g.clone();
            let Some(step) = a.lu().solve(&rhs) else {
                damping *= 10.0;
                continue;
            };
            let trial: Vec<f64> = p.iter().zip(step.iter()).map(|(a, b)| a + b).collect();
            let r_trial = DVector::from_vec(residual(&trial));
            let cost_trial = 0.5 * r_trial.norm_squared();
            if cost_trial.is_finite() && cost_trial <= cost {
                let rel = (cost - cost_trial) / cost.max(f64::MIN_POSITIVE);
                p = trial;
                r = r_trial;
                cost = cost_trial;
                damping = (damping / 10.0).max(1e-12);
                improved = true;
                if rel < LM_FTOL || cost < 1e-30 {
                    return Ok(LmSolution {
                        params: p,
                        cost,
                        iterations: iter + 1,
                    });
                }
                break;
            }
            damping *= 10.0;
        }
        if !improved {
            return Ok(LmSolution {
                params: p,
                cost,
                iterations: iter + 1,
            });
        }
    }
    Ok(LmSolution {
        params: p,
        cost,
        iterations: LM_MAX_ITER,
    })
}

/// Levenberg–Marquardt with a forward-difference Jacobian.
///
/// # Errors
///
/// See [`levenberg_marquardt_with_jacobian`].
pub fn levenberg_marquardt<R>(residual: R, p0: &[f64]) -> Result<LmSolution>
where
    R: Fn(&[f64]) -> Vec<f64>,
{
    let jac = |p: &[f64]| {
        let r0 = residual(p);
        let mut jm = DMatrix::zeros(r0.len(), p.len());
        for j in 0..p.len() {
            let h = 1e-7 * p[j].abs().max(1.0);
            let mut pp = p.to_vec();
            pp[j] += h;
            let r1 = residual(&pp);
            for i in 0..r0.len() {
                jm[(i, j)] = (r1[i] - r0[i]) / h;
            }
        }
        jm
    };
    levenberg_marquardt_with_jacobian(&residual, jac, p0)
}

/// Fit `model(x, params)` to `(x, y)` by least squares (like `curve_fit`).
///
/// # Errors
///
/// See [`levenberg_marquardt_with_jacobian`].
pub fn curve_fit<M>(model: M, x: &[f64], y: &[f64], p0: &[f64]) -> Result<Vec<f64>>
where
    M: Fn(f64, &[f64]) -> f64,
{
    let residual = |p: &[f64]| -> Vec<f64> {
        x.iter().zip(y).map(|(&xi, &yi)| model(xi, p) - yi).collect()
    };
    Ok(levenberg_marquardt(residual, p0)?.params)
}

/// Element-wise reciprocal of a complex slice.
#[must_use]
pub fn reciprocal(v: &[Complex64]) -> Vec<Complex64> {
    v.iter().map(Complex64::inv).collect()
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn trapz_integrates_linear_exactly() {
        let x: Vec<f64> = (0..11).map(|i| f64::from(i) * 0.1).collect();
        let y: Vec<f64> = x.iter().map(|v| 2.0 * v + 1.0).collect();
        assert!((trapz(&y, &x) - 2.0).abs() < 1e-12);
        let w = trapz_weights(&x);
        let s: f64 = w.iter().zip(&y).map(|(a, b)| a * b).sum();
        assert!((s - 2.0).abs() < 1e-12);
    }

    #[test]
    fn secant_finds_sqrt_two() {
        let root = secant(|x| x * x - 2.0, 1.0, 1e-12, 50).unwrap();
        assert!((root - 2f64.sqrt()).abs() < 1e-10);
    }

    #[test]
    fn secant_reports_flat_function() {
        assert!(secant(|_| 1.0, 0.3, 1e-12, 30).is_err());
    }

    #[test]
    fn polyfit_recovers_quadratic() {
        let x: Vec<f64> = (0..6).map(f64::from).collect();
        let y: Vec<f64> = x.iter().map(|v| 1.0 - 2.0 * v + 0.5 * v * v).collect();
        let c = polyfit(&x, &y, 2).unwrap();
        assert!((c[0] - 1.0).abs() < 1e-9);
        assert!((c[1] + 2.0).abs() < 1e-9);
        assert!((c[2] - 0.5).abs() < 1e-9);
        assert!((polyval(&c, 3.0) - (1.0 - 6.0 + 4.5)).abs() < 1e-9);
    }

    #[test]
    fn curve_fit_recovers_logistic() {
        let model = |x: f64, p: &[f64]| p[0] + p[1] / (1.0 + (-p[3] * (x - p[2])).exp());
        let truth = [0.5, 4.0, 1.0, 2.0];
        let x: Vec<f64> = (0..40).map(|i| -3.0 + 0.15 * f64::from(i)).collect();
        let y: Vec<f64> = x.iter().map(|&v| model(v, &truth)).collect();
        let p = curve_fit(model, &x, &y, &[0.0, 5.0, 2.0, 1.0]).unwrap();
        for (a, b) in p.iter().zip(truth.iter()) {
            assert!((a - b).abs() < 1e-3, "fit {a} vs {b}");
        }
    }

    #[test]
    fn pinv_of_rank_deficient_matrix() {
        let m = DMatrix::from_row_slice(2, 2, &[1.0, 1.0, 1.0, 1.0]);
        let p = pinv(&m).unwrap();
        assert!((p[(0, 0)] - 0.25).abs() < 1e-12);
    }

    #[test]
    fn invert_detects_singular() {
        let m = DMatrix::from_element(2, 2, Complex64::new(1.0, 0.0));
        assert!(invert(m, "test").is_err());
    }
}
