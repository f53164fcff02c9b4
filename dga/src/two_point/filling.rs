// SPDX-License-Identifier: AGPL-3.0-only

//! Filling from Matsubara sums and the chemical-potential search.
//!
//! The bare Matsubara sum of G converges like 1/ν, so the sum is taken
//! relative to a model propagator G_m = 1/(iν + μ − h_loc − s₀) whose
//! occupation is known in closed form:
//! n = 2·[f_m + (1/β) Σ_ν Re(G_loc − G_m)].

use num_complex::Complex64;
use tracing::warn;

use crate::numerics::secant;
use crate::tolerances::{FERMI_EXP_CUTOFF, MU_ROOT_TOL, SECANT_MAX_ITER};

/// Occupation of a single level at energy x relative to μ, 1/(1 + e^{βx}),
/// evaluated without overflow.
#[must_use]
pub fn model_occupation(beta: f64, x: f64) -> f64 {
    let bx = beta * x;
    if bx > FERMI_EXP_CUTOFF {
        (-bx).exp()
    } else if bx < -FERMI_EXP_CUTOFF {
        1.0 - bx.exp()
    } else {
        1.0 / (1.0 + bx.exp())
    }
}

/// Total filling (both spins) of a full-range local Green's function.
///
/// `iv` are the matching Matsubara frequencies, `hloc` the mean band energy
/// and `smom0` the constant part of the self-energy.
#[must_use]
pub fn get_fill(g_loc: &[Complex64], iv: &[Complex64], beta: f64, hloc: f64, smom0: f64, mu: f64) -> f64 {
    let x = hloc + smom0 - mu;
    let correction: f64 = g_loc
        .iter()
        .zip(iv)
        .map(|(g, &z)| (g - 1.0 / (z - x)).re)
        .sum();
    2.0 * (model_occupation(beta, x) + correction / beta)
}

/// Solve n(μ) = n_target starting from μ₀.
///
/// A failed search keeps μ₀ and logs a warning, matching how a production
/// run should continue with the DMFT chemical potential.
pub fn update_mu<F>(n_of_mu: F, n_target: f64, mu0: f64) -> f64
where
    F: Fn(f64) -> f64,
{
    match secant(|mu| n_of_mu(mu) - n_target, mu0, MU_ROOT_TOL, SECANT_MAX_ITER) {
        Ok(mu) => mu,
        Err(e) => {
            warn!(mu0, n_target, error = %e, "chemical potential search failed; keeping mu0");
            mu0
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::matsubara;

    #[test]
    fn occupation_limits_and_continuity() {
        let beta = 10.0;
        assert!((model_occupation(beta, 0.0) - 0.5).abs() < 1e-15);
        assert!(model_occupation(beta, 100.0) < 1e-100);
        assert!((model_occupation(beta, -100.0) - 1.0).abs() < 1e-15);
        let c = FERMI_EXP_CUTOFF / beta;
        let lo = model_occupation(beta, c - 1e-12);
        let hi = model_occupation(beta, c + 1e-12);
        assert!((lo - hi).abs() < 1e-10);
    }

    #[test]
    fn atomic_level_filling_is_exact() {
        // G = 1/(iν + μ − ε): the model propagator itself, correction vanishes.
        let beta = 8.0;
        let (eps, mu) = (0.3, 0.1);
        let iv = matsubara::iv(beta, 500);
        let g: Vec<Complex64> = iv.iter().map(|&z| 1.0 / (z + mu - eps)).collect();
        let n = get_fill(&g, &iv, beta, eps, 0.0, mu);
        let exact = 2.0 / (1.0 + (beta * (eps - mu)).exp());
        assert!((n - exact).abs() < 1e-12);
    }

    #[test]
    fn two_level_filling_converges() {
        // Two levels ±a averaged: model uses the mean 0.
        let beta = 5.0;
        let a = 0.7;
        let mu = 0.2;
        let iv = matsubara::iv(beta, 2000);
        let g: Vec<Complex64> = iv
            .iter()
            .map(|&z| 0.5 * (1.0 / (z + mu - a) + 1.0 / (z + mu + a)))
            .collect();
        let n = get_fill(&g, &iv, beta, 0.0, 0.0, mu);
        let exact = 1.0 / (1.0 + (beta * (a - mu)).exp()) + 1.0 / (1.0 + (beta * (-a - mu)).exp());
        assert!((n - exact).abs() < 1e-4, "n = {n}, exact = {exact}");
    }

    #[test]
    fn mu_search_hits_target() {
        let beta = 10.0;
        let eps = 0.0;
        let n_of_mu = |mu: f64| 2.0 * model_occupation(beta, eps - mu);
        let mu = update_mu(n_of_mu, 1.2, 0.0);
        assert!((n_of_mu(mu) - 1.2).abs() < 1e-5);
    }
}
