// SPDX-License-Identifier: AGPL-3.0-only

//! Damped Newton root search with linear mixing.
//!
//! Each step proposes u + s·δ with δ = −J⁺ f. The step is shortened so that
//! no significant component changes by more than its own magnitude, and the
//! next proposal mixes the previous proposal with the step result.

use nalgebra::{DMatrix, DVector};
use tracing::warn;

use crate::error::{DgaError, Result};
use crate::numerics::pinv;
use crate::tolerances::{NEWTON_MIXING, NEWTON_OPT_CONVERGENCE, NEWTON_OPT_MAX_ITER, NEWTON_SIGNIFICANCE_LIMIT};

/// Converged root and iteration count.
#[derive(Clone, Debug)]
pub struct NewtonResult {
    /// Root estimate.
    pub x: DVector<f64>,
    /// Function evaluations after the first.
    pub nfev: usize,
}

fn iteration_function(proposal: &DVector<f64>, f: &DVector<f64>, jac: &DMatrix<f64>) -> DVector<f64> {
    let increment = match pinv(jac) {
        Ok(inv) => -(inv * f),
        Err(e) => {
            warn!(%e, "Newton step failed, using zero increment");
            DVector::zeros(proposal.len())
        }
    };
    let max_ratio = proposal
        .iter()
        .zip(increment.iter())
        .filter(|(p, _)| p.abs() > NEWTON_SIGNIFICANCE_LIMIT)
        .map(|(p, d)| (d / p).abs())
        .fold(0.0_f64, f64::max);
    let reduction = if max_ratio > 1.0 { 1.0 / max_ratio } else { 1.0 };
    proposal + increment * reduction
}

/// Find a root of `function_and_jacobian` starting at `initial`.
///
/// # Errors
///
/// [`DgaError::NotANumber`] when an iterate turns NaN and
/// [`DgaError::NoConvergence`] after the iteration cap.
pub fn newton_root<F>(mut function_and_jacobian: F, initial: DVector<f64>) -> Result<NewtonResult>
where
    F: FnMut(&DVector<f64>) -> (DVector<f64>, DMatrix<f64>),
{
    let (f, j) = function_and_jacobian(&initial);
    let mut result = iteration_function(&initial, &f, &j);
    let mut proposal = initial;
    let mut counter = 0;
    loop {
        let next_proposal = &proposal + (&result - &proposal) * NEWTON_MIXING;
        let (f, j) = function_and_jacobian(&next_proposal);
        let next_result = iteration_function(&next_proposal, &f, &j);
        if next_result.iter().any(|v| v.is_nan()) {
            return Err(DgaError::NotANumber("Newton optimiser iterate".into()));
        }
        let change = (&next_result - &next_proposal).amax();
        proposal = next_proposal;
        result = next_result;
        counter += 1;
        if change < NEWTON_OPT_CONVERGENCE {
            return Ok(NewtonResult { x: result, nfev: counter });
        }
        if counter > NEWTON_OPT_MAX_ITER {
            return Err(DgaError::NoConvergence {
                solver: "maxent Newton optimiser",
                iterations: NEWTON_OPT_MAX_ITER,
            });
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn solves_linear_system() {
        let a = DMatrix::from_row_slice(2, 2, &[3.0, 1.0, 1.0, 2.0]);
        let b = DVector::from_vec(vec![1.0, -1.0]);
        let res = newton_root(|u| (&a * u - &b, a.clone()), DVector::zeros(2)).unwrap();
        let exact = a.clone().lu().solve(&b).unwrap();
        assert!((res.x - exact).amax() < 1e-3);
    }

    #[test]
    fn solves_exponential_equation() {
        // u + e^u = 2 has the root u = 0.4428544...
        let res = newton_root(
            |u| {
                let f = DVector::from_vec(vec![u[0] + u[0].exp() - 2.0]);
                let j = DMatrix::from_element(1, 1, 1.0 + u[0].exp());
                (f, j)
            },
            DVector::zeros(1),
        )
        .unwrap();
        assert!((res.x[0] - 0.442_854_401).abs() < 1e-4);
    }

    #[test]
    fn nan_is_reported() {
        let res = newton_root(
            |_| (DVector::from_element(1, f64::NAN), DMatrix::identity(1, 1)),
            DVector::zeros(1),
        );
        assert!(res.is_err());
    }
}
