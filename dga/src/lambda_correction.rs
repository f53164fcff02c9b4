// SPDX-License-Identifier: AGPL-3.0-only

//! λ-correction of ladder susceptibilities and the Ornstein–Zernike fit.
//!
//! The ladder violates the local sum rule: the q-average of χ_r differs from
//! the local χ_r of the impurity. A Moriya-type shift χ_λ = 1/(1/χ + λ)
//! restores (1/βN_q) Σ_{q,ω} χ_λ = (1/β) Σ_ω χ_loc. The sum is convex and
//! decreasing in λ above the pole λ_min = −min_q 1/χ(q, 0), so Newton from
//! the left converges monotonically.

use num_complex::Complex64;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::error::{DgaError, Result};
use crate::four_point::LadderSusceptibility;
use crate::lattice::KGrid;
use crate::numerics::polyfit;
use crate::tolerances::{LAMBDA_MAX_ITER, LAMBDA_NEWTON_TOL, LAMBDA_START_OFFSET};

/// Which channels are corrected.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LambdaCorrectionType {
    /// Both channels, each to its own local sum rule.
    #[default]
    Spch,
    /// Magnetic channel only; λ_m fixes the sum of both channels.
    Sp,
    /// No correction.
    None,
}

impl LambdaCorrectionType {
    /// Short label used in output directory names.
    #[must_use]
    pub const fn label(self) -> &'static str {
        match self {
            Self::Spch => "spch",
            Self::Sp => "sp",
            Self::None => "none",
        }
    }
}

/// Shifts applied to both channels.
#[derive(Clone, Copy, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct LambdaShifts {
    /// λ of the density channel.
    pub dens: f64,
    /// λ of the magnetic channel.
    pub magn: f64,
}

/// (1/βN_q) Σ_{q,ω} Re χ_λ.
#[must_use]
pub fn chi_sum(chi: &LadderSusceptibility, lambda: f64) -> f64 {
    let s: f64 = chi.chi().iter().map(|c| (1.0 / (1.0 / c + lambda)).re).sum();
    s / (chi.beta * chi.nq() as f64)
}

fn chi_sum_derivative(chi: &LadderSusceptibility, lambda: f64) -> f64 {
    let s: f64 = chi
        .chi()
        .iter()
        .map(|c| {
            let cl = 1.0 / (1.0 / c + lambda);
            -(cl * cl).re
        })
        .sum();
    s / (chi.beta * chi.nq() as f64)
}

/// (1/β) Σ_ω Re χ_loc(ω).
#[must_use]
pub fn local_sum(chi_loc: &[Complex64], beta: f64) -> f64 {
    chi_loc.iter().map(|c| c.re).sum::<f64>() / beta
}

/// Pole position λ_min = −min_q Re 1/χ(q, ω=0).
#[must_use]
pub fn lambda_min(chi: &LadderSusceptibility) -> f64 {
    let w0 = chi.w0();
    -(0..chi.nq())
        .map(|iq| (1.0 / chi.chi_row(iq)[w0]).re)
        .fold(f64::INFINITY, f64::min)
}

/// Solve (1/βN_q) Σ χ_λ = `target` for λ.
///
/// # Errors
///
/// [`DgaError::NoConvergence`] when Newton does not converge and
/// [`DgaError::InvalidArgument`] for a non-positive target.
pub fn find_lambda(chi: &LadderSusceptibility, target: f64) -> Result<f64> {
    if target <= 0.0 {
        return Err(DgaError::InvalidArgument(format!(
            "λ sum rule target must be positive, got {target}"
        )));
    }
    let lmin = lambda_min(chi);
    let mut offset = LAMBDA_START_OFFSET * lmin.abs().max(1.0);
    let mut lambda = lmin + offset;
    // Start left of the root, where the sum exceeds the target.
    let mut guard = 0;
    while chi_sum(chi, lambda) < target && guard < 60 {
        offset *= 0.5;
        lambda = lmin + offset;
        guard += 1;
    }
    for iter in 0..LAMBDA_MAX_ITER {
        let f = chi_sum(chi, lambda) - target;
        let df = chi_sum_derivative(chi, lambda);
        if df == 0.0 || !f.is_finite() {
            return Err(DgaError::NotANumber(format!("λ Newton step at λ={lambda}")));
        }
        let step = f / df;
        let mut next = lambda - step;
        if next <= lmin {
            next = 0.5 * (lambda + lmin);
        }
        debug!(iter, lambda = next, residual = f, "lambda Newton");
        if (next - lambda).abs() < LAMBDA_NEWTON_TOL {
            return Ok(next);
        }
        lambda = next;
    }
    Err(DgaError::NoConvergence {
        solver: "lambda Newton",
        iterations: LAMBDA_MAX_ITER,
    })
}

/// Determine and apply the λ shifts to full-grid ladder susceptibilities.
///
/// # Errors
///
/// See [`find_lambda`].
pub fn lambda_correction(chi_dens: &mut LadderSusceptibility, chi_magn: &mut LadderSusceptibility, chi_loc_dens: &[Complex64], chi_loc_magn: &[Complex64], kind: LambdaCorrectionType) -> Result<LambdaShifts> {
    let target_d = local_sum(chi_loc_dens, chi_dens.beta);
    let target_m = local_sum(chi_loc_magn, chi_magn.beta);
    let shifts = match kind {
        LambdaCorrectionType::Spch => LambdaShifts {
            dens: find_lambda(chi_dens, target_d)?,
            magn: find_lambda(chi_magn, target_m)?,
        },
        LambdaCorrectionType::Sp => {
            let target = target_m + target_d - chi_sum(chi_dens, 0.0);
            LambdaShifts {
                dens: 0.0,
                magn: find_lambda(chi_magn, target)?,
            }
        }
        LambdaCorrectionType::None => LambdaShifts::default(),
    };
    chi_dens.apply_lambda(shifts.dens);
    chi_magn.apply_lambda(shifts.magn);
    info!(
        lambda_dens = shifts.dens,
        lambda_magn = shifts.magn,
        kind = kind.label(),
        "lambda correction"
    );
    Ok(shifts)
}

/// Ornstein–Zernike form χ(q) ≈ A/(ξ⁻² + |q − Q|²) around the maximum.
#[derive(Clone, Copy, Debug, Serialize, Deserialize)]
pub struct OrnsteinZernike {
    /// Ordering vector Q (position of the maximum).
    pub q_max: [f64; 3],
    /// Intercept of 1/χ.
    pub a: f64,
    /// Slope of 1/χ in |q − Q|².
    pub b: f64,
    /// Amplitude A = 1/b.
    pub amplitude: f64,
    /// Correlation length ξ = √(b/a) (infinite when a ≤ 0).
    pub xi: f64,
}

/// Fit 1/χ(q) = a + b|q − Q|² over the points within `radius` of the
/// maximum (periodic distances).
///
/// # Errors
///
/// [`DgaError::InvalidArgument`] when fewer than two distinct distances fall
/// inside the radius.
pub fn ornstein_zernike_fit(chi_w0: &[f64], grid: &KGrid, radius: f64) -> Result<OrnsteinZernike> {
    crate::error::ensure_len("OZ fit data", grid.nk_tot(), chi_w0.len())?;
    let (imax, _) = chi_w0
        .iter()
        .enumerate()
        .fold((0, f64::NEG_INFINITY), |acc, (i, &v)| if v > acc.1 { (i, v) } else { acc });
    let qm = grid.k_point(imax);
    let two_pi = 2.0 * std::f64::consts::PI;
    let (mut d2, mut inv) = (Vec::new(), Vec::new());
    for (iq, &c) in chi_w0.iter().enumerate() {
        let q = grid.k_point(iq);
        let dist2: f64 = (0..3)
            .map(|d| {
                let mut dq = (q[d] - qm[d]).abs() % two_pi;
                if dq > std::f64::consts::PI {
                    dq = two_pi - dq;
                }
                dq * dq
            })
            .sum();
        if dist2 <= radius * radius && c.abs() > 0.0 {
            d2.push(dist2);
            inv.push(1.0 / c);
        }
    }
    let distinct = d2.iter().filter(|&&x| x > 0.0).count();
    if distinct == 0 {
        return Err(DgaError::InvalidArgument(format!(
            "OZ fit radius {radius} contains no neighbours of the maximum"
        )));
    }
    let c = polyfit(&d2, &inv, 1)?;
    let (a, b) = (c[0], c[1]);
    Ok(OrnsteinZernike {
        q_max: qm,
        a,
        b,
        amplitude: 1.0 / b,
        xi: if a > 0.0 { (b / a).sqrt() } else { f64::INFINITY },
    })
}
