// SPDX-License-Identifier: AGPL-3.0-only

//! Particle–hole bubbles and their high-frequency tails.
//!
//! The bubble is summed on a finite box n ∈ [−N, N). Outside the box G is
//! replaced by 1/(iν), for which the remaining sum is analytic:
//! Σ_{all n} 1/((2n+1)(2n+1−2m)) = π²/4 δ_{m0}, so the tail is
//! β/π² · (π²/4 δ_{m0} − Σ_{n=−N}^{N−1} 1/((2n+1)(2n+1−2m))).

use num_complex::Complex64;

use crate::error::{DgaError, Result};
use crate::lattice::{KGrid, QGrid};
use crate::matsubara;
use crate::two_point::GreensFunction;

/// Tail correction of χ0(ω_m) outside n ∈ [−niv, niv) for every m in `wn`.
#[must_use]
pub fn chi0_asympt_correction(beta: f64, niv: usize, wn: &[i64]) -> Vec<Complex64> {
    let pi2 = std::f64::consts::PI * std::f64::consts::PI;
    wn.iter()
        .map(|&m| {
            let inner: f64 = matsubara::vn(niv)
                .into_iter()
                .map(|n| 1.0 / (((2 * n + 1) * (2 * n + 1 - 2 * m)) as f64))
                .sum();
            let full = if m == 0 { pi2 / 4.0 } else { 0.0 };
            Complex64::new(beta / pi2 * (full - inner), 0.0)
        })
        .collect()
}

fn box_check(niv: usize, wn: &[i64], niv_g: usize, what: &str) -> Result<()> {
    let max_w = wn.iter().map(|m| m.unsigned_abs() as usize).max().unwrap_or(0);
    if niv + max_w > niv_g {
        return Err(DgaError::FrequencyBox(format!(
            "{what}: niv={niv} with |ω|≤{max_w} needs G on niv≥{}, have {niv_g}",
            niv + max_w
        )));
    }
    Ok(())
}

/// Local bubble generator from a full-range local Green's function.
#[derive(Clone, Debug)]
pub struct LocalBubble {
    beta: f64,
    wn: Vec<i64>,
    g_loc: Vec<Complex64>,
}

impl LocalBubble {
    /// Bubble over the bosonic indices `wn`.
    #[must_use]
    pub fn new(wn: Vec<i64>, g_loc: Vec<Complex64>, beta: f64) -> Self {
        Self { beta, wn, g_loc }
    }

    /// Bosonic indices.
    #[must_use]
    pub fn wn(&self) -> &[i64] {
        &self.wn
    }

    /// Inverse temperature.
    #[must_use]
    pub const fn beta(&self) -> f64 {
        self.beta
    }

    /// −β G(ν) G(ν−ω) on n ∈ [−niv, niv), one row per ω.
    ///
    /// # Errors
    ///
    /// [`DgaError::FrequencyBox`] when G does not reach ν − ω.
    pub fn gchi0(&self, niv: usize) -> Result<Vec<Vec<Complex64>>> {
        let niv_g = self.g_loc.len() / 2;
        box_check(niv, &self.wn, niv_g, "local bubble")?;
        let g = |n: i64| self.g_loc[(n + niv_g as i64) as usize];
        Ok(self
            .wn
            .iter()
            .map(|&m| {
                matsubara::vn(niv)
                    .into_iter()
                    .map(|n| -self.beta * g(n) * g(n - m))
                    .collect()
            })
            .collect())
    }

    /// χ0(ω) = (1/β²) Σ_ν gchi0 on the box.
    ///
    /// # Errors
    ///
    /// See [`Self::gchi0`].
    pub fn chi0(&self, niv: usize) -> Result<Vec<Complex64>> {
        let norm = 1.0 / (self.beta * self.beta);
        Ok(self
            .gchi0(niv)?
            .iter()
            .map(|r| r.iter().sum::<Complex64>() * norm)
            .collect())
    }

    /// Tail correction for a box of size `niv`.
    #[must_use]
    pub fn chi0_asympt_correction(&self, niv: usize) -> Vec<Complex64> {
        chi0_asympt_correction(self.beta, niv, &self.wn)
    }

    /// χ0 on the box plus its analytic tail.
    ///
    /// # Errors
    ///
    /// See [`Self::gchi0`].
    pub fn chi0_asympt(&self, niv: usize) -> Result<Vec<Complex64>> {
        Ok(self
            .chi0(niv)?
            .into_iter()
            .zip(self.chi0_asympt_correction(niv))
            .map(|(a, b)| a + b)
            .collect())
    }
}

/// Lattice bubble −β ⟨G(k, ν) G(k−q, ν−ω)⟩_k for one q and every ω in `wn`.
///
/// `q` is in k-grid units (see [`QGrid::shift`]).
///
/// # Errors
///
/// [`DgaError::FrequencyBox`] when G does not reach ν − ω.
pub fn gchi0_q(
    gk: &GreensFunction,
    kgrid: &KGrid,
    q: [usize; 3],
    wn: &[i64],
    niv: usize,
) -> Result<Vec<Vec<Complex64>>> {
    let niv_g = gk.niv_full();
    box_check(niv, wn, niv_g, "lattice bubble")?;
    let g = gk.field();
    let nk_tot = g.nk_tot();
    let beta = gk.beta();
    let vn = matsubara::vn(niv);
    let mut out = vec![vec![Complex64::new(0.0, 0.0); 2 * niv]; wn.len()];
    for ik in 0..nk_tot {
        let ikq = kgrid.k_minus_q(ik, q);
        let gk_row = g.row(ik);
        let gkq_row = g.row(ikq);
        for (iw, &m) in wn.iter().enumerate() {
            let row = &mut out[iw];
            for (iv, &n) in vn.iter().enumerate() {
                let a = gk_row[(n + niv_g as i64) as usize];
                let b = gkq_row[(n - m + niv_g as i64) as usize];
                row[iv] += a * b;
            }
        }
    }
    let norm = -beta / nk_tot as f64;
    for row in &mut out {
        row.iter_mut().for_each(|z| *z *= norm);
    }
    Ok(out)
}

/// Lattice bubble at grid point `iq` of a q-grid.
///
/// # Errors
///
/// See [`gchi0_q`].
pub fn gchi0_at(
    gk: &GreensFunction,
    kgrid: &KGrid,
    qgrid: &QGrid,
    iq: usize,
    wn: &[i64],
    niv: usize,
) -> Result<Vec<Vec<Complex64>>> {
    gchi0_q(gk, kgrid, qgrid.shift(iq), wn, niv)
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::matsubara::iv;

    #[test]
    fn tail_plus_box_gives_atomic_value() {
        // G = 1/(iν): χ0(ω=0) = β/4 exactly, χ0(ω≠0) = 0.
        let beta = 3.0;
        let g: Vec<Complex64> = iv(beta, 400).into_iter().map(|z| 1.0 / z).collect();
        let b = LocalBubble::new(vec![-2, -1, 0, 1, 2], g, beta);
        let chi = b.chi0_asympt(50).unwrap();
        assert!((chi[2].re - beta / 4.0).abs() < 1e-12);
        for i in [0, 1, 3, 4] {
            assert!(chi[i].norm() < 1e-12, "chi0({}) = {}", i, chi[i]);
        }
    }

    #[test]
    fn tail_uses_the_full_sum_normalisation() {
        // niv = 1 keeps n ∈ {−1, 0}: the m = 0 sum is 2, the m = 1 sum is 1/3 − 1.
        let beta = 5.0;
        let pi2 = std::f64::consts::PI.powi(2);
        let tail = chi0_asympt_correction(beta, 1, &[0, 1]);
        assert!((tail[0].re - beta / pi2 * (pi2 / 4.0 - 2.0)).abs() < 1e-14);
        assert!((tail[1].re - beta / pi2 * (2.0 / 3.0)).abs() < 1e-14);
        assert!(tail.iter().all(|t| t.im == 0.0));
    }

    #[test]
    fn box_must_contain_shifted_frequencies() {
        // G stored on n ∈ [−10, 10).
        let g = vec![Complex64::new(0.0, -1.0); 20];
        let b = LocalBubble::new(vec![0, 5], g, 1.0);
        assert!(b.gchi0(5).is_ok());
        assert!(b.gchi0(6).is_err());
    }

    #[test]
    fn bubble_is_conjugate_in_omega() {
        let beta = 2.0;
        let g: Vec<Complex64> = iv(beta, 60).into_iter().map(|z| 1.0 / (z + 0.3)).collect();
        let b = LocalBubble::new(vec![-2, -1, 0, 1, 2], g, beta);
        let chi = b.chi0(20).unwrap();
        assert!((chi[0] - chi[4].conj()).norm() < 1e-12);
        assert!((chi[1] - chi[3].conj()).norm() < 1e-12);
    }
}
