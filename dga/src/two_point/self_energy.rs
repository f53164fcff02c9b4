// SPDX-License-Identifier: AGPL-3.0-only

//! Self-energy on positive Matsubara frequencies plus its asymptotic tail
//! Σ(iν) ≈ s₀ − s₁/(iν).
//!
//! Only the low-frequency "core" of the input is trusted; beyond it the tail
//! replaces the data. The core size is where the momentum average first
//! agrees with the tail within `err`.

use num_complex::Complex64;
use tracing::debug;

use crate::error::{DgaError, Result};
use crate::field::KField;
use crate::matsubara;
use crate::tolerances::{MOMENT_FIT_FRACTION, MOMENT_FIT_MIN_POINTS, SIGMA_NIV_CORE_MIN};

/// Zeroth moment (Hartree term) U·n/2.
#[must_use]
pub fn hartree(u: f64, n: f64) -> f64 {
    u * n / 2.0
}

/// First moment −U²·n/2·(1 − n/2) in the convention Σ ≈ s₀ − s₁/(iν).
#[must_use]
pub fn smom1(u: f64, n: f64) -> f64 {
    -u * u * n / 2.0 * (1.0 - n / 2.0)
}

/// Fit (s₀, s₁) from the last frequencies of a positive-frequency local
/// self-energy: s₀ = ⟨Re Σ⟩, s₁ = ⟨Im Σ · ν⟩.
///
/// # Errors
///
/// [`DgaError::InvalidArgument`] for an empty input.
pub fn fit_smom(sigma_loc: &[Complex64], beta: f64) -> Result<(f64, f64)> {
    let niv = sigma_loc.len();
    if niv == 0 {
        return Err(DgaError::InvalidArgument("cannot fit moments of an empty self-energy".into()));
    }
    let n_fit = ((MOMENT_FIT_FRACTION * niv as f64) as usize).max(MOMENT_FIT_MIN_POINTS).min(niv);
    let start = niv - n_fit;
    let mut m0 = 0.0;
    let mut m1 = 0.0;
    for (i, s) in sigma_loc.iter().enumerate().skip(start) {
        m0 += s.re;
        m1 += s.im * matsubara::fermionic(beta, i as i64);
    }
    Ok((m0 / n_fit as f64, m1 / n_fit as f64))
}

/// Self-energy Σ(k, iν_n) for n ≥ 0 with its tail.
#[derive(Clone, Debug)]
pub struct SelfEnergy {
    beta: f64,
    sigma: KField,
    smom0: f64,
    smom1: f64,
    niv_core: usize,
}

impl SelfEnergy {
    /// Wrap positive-frequency data. Moments are fitted when not given; the
    /// core box is estimated with tolerance `err`.
    ///
    /// # Errors
    ///
    /// [`DgaError::InvalidArgument`] for an empty frequency axis.
    pub fn new(sigma: KField, beta: f64, moments: Option<(f64, f64)>, err: f64) -> Result<Self> {
        let (smom0, smom1) = match moments {
            Some(m) => m,
            None => fit_smom(&sigma.k_mean(), beta)?,
        };
        let mut s = Self {
            beta,
            sigma,
            smom0,
            smom1,
            niv_core: 0,
        };
        s.niv_core = s.estimate_niv_core(err);
        debug!(smom0, smom1, niv_core = s.niv_core, "self-energy tail");
        Ok(s)
    }

    /// Local (k-independent) self-energy broadcast to a grid.
    ///
    /// # Errors
    ///
    /// See [`Self::new`].
    pub fn from_local(sigma_pos: &[Complex64], nk: [usize; 3], beta: f64, moments: Option<(f64, f64)>, err: f64) -> Result<Self> {
        Self::new(KField::broadcast(nk, sigma_pos), beta, moments, err)
    }

    /// Inverse temperature.
    #[must_use]
    pub const fn beta(&self) -> f64 {
        self.beta
    }

    /// Tail moments (s₀, s₁).
    #[must_use]
    pub const fn smom(&self) -> (f64, f64) {
        (self.smom0, self.smom1)
    }

    /// Number of stored positive frequencies.
    #[must_use]
    pub const fn niv(&self) -> usize {
        self.sigma.nfreq()
    }

    /// Positive frequencies trusted as data.
    #[must_use]
    pub const fn niv_core(&self) -> usize {
        self.niv_core
    }

    /// Momentum grid.
    #[must_use]
    pub const fn nk(&self) -> [usize; 3] {
        self.sigma.nk()
    }

    /// Stored positive-frequency data.
    #[must_use]
    pub const fn data(&self) -> &KField {
        &self.sigma
    }

    /// s₀ − s₁/(iν) on the given frequencies.
    #[must_use]
    pub fn asympt(&self, iv: &[Complex64]) -> Vec<Complex64> {
        iv.iter().map(|&z| self.smom0 - self.smom1 / z).collect()
    }

    /// Core size where the momentum mean first matches the tail within `err`,
    /// the later of the real and imaginary part. A part that never matches
    /// counts as zero; the result is never below the minimum core size.
    #[must_use]
    pub fn estimate_niv_core(&self, err: f64) -> usize {
        let niv = self.niv();
        let mean = self.sigma.k_mean();
        let tail = self.asympt(&matsubara::iv_plus(self.beta, niv, 0));
        let first = |part: fn(Complex64) -> f64| {
            mean.iter()
                .zip(&tail)
                .position(|(s, a)| (part(*s) - part(*a)).abs() < err)
        };
        let (re, im) = (first(|z| z.re), first(|z| z.im));
        if re.is_none() || im.is_none() {
            debug!(re = ?re, im = ?im, "self-energy part never reaches its tail");
        }
        re.unwrap_or(0).max(im.unwrap_or(0)).max(SIGMA_NIV_CORE_MIN).min(niv)
    }

    /// Full-range Σ(k, iν_n), n ∈ [−niv_full, niv_full): data inside the
    /// core, tail outside.
    #[must_use]
    pub fn get_siw(&self, niv_full: usize) -> KField {
        let nfreq = 2 * niv_full;
        let mut out = KField::zeros(self.nk(), nfreq);
        let tail = self.asympt(&matsubara::iv(self.beta, niv_full));
        let core = self.niv_core as i64;
        for ik in 0..self.sigma.nk_tot() {
            let data = self.sigma.row(ik);
            let row = out.row_mut(ik);
            for (pos, n) in matsubara::vn(niv_full).into_iter().enumerate() {
                row[pos] = if n >= 0 && n < core {
                    data[n as usize]
                } else if n < 0 && -n - 1 < core {
                    data[(-n - 1) as usize].conj()
                } else {
                    tail[pos]
                };
            }
        }
        out
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn second_order_like(beta: f64, niv: usize, s0: f64, s1: f64) -> Vec<Complex64> {
        matsubara::iv_plus(beta, niv, 0)
            .into_iter()
            .map(|z| s0 - s1 / z)
            .collect()
    }

    #[test]
    fn moments_of_pure_tail_are_recovered() {
        let beta = 5.0;
        let sig = second_order_like(beta, 200, 0.9, -0.4);
        let (m0, m1) = fit_smom(&sig, beta).unwrap();
        assert!((m0 - 0.9).abs() < 1e-12);
        assert!((m1 + 0.4).abs() < 1e-12);
    }

    #[test]
    fn analytic_moments() {
        assert!((hartree(2.0, 1.0) - 1.0).abs() < 1e-15);
        assert!((smom1(2.0, 1.0) + 1.0).abs() < 1e-15);
    }

    #[test]
    fn pure_tail_has_minimal_core() {
        let beta = 5.0;
        let sig = second_order_like(beta, 100, 0.5, -0.2);
        let s = SelfEnergy::from_local(&sig, [2, 2, 1], beta, Some((0.5, -0.2)), 1e-6).unwrap();
        assert_eq!(s.niv_core(), SIGMA_NIV_CORE_MIN);
    }

    #[test]
    fn never_reaching_tail_falls_back_to_minimal_core() {
        let beta = 5.0;
        let sig = vec![Complex64::new(3.0, -1.0); 30];
        let s = SelfEnergy::from_local(&sig, [1, 1, 1], beta, Some((0.0, 0.0)), 1e-6).unwrap();
        assert_eq!(s.niv_core(), SIGMA_NIV_CORE_MIN);
    }

    #[test]
    fn parts_reach_the_tail_independently() {
        // Re Σ matches the zero tail from n = 25 on, Im Σ never does.
        let beta = 5.0;
        let sig: Vec<Complex64> = (0..30)
            .map(|n| Complex64::new(if n < 25 { 3.0 } else { 0.0 }, -1.0))
            .collect();
        let s = SelfEnergy::from_local(&sig, [1, 1, 1], beta, Some((0.0, 0.0)), 1e-6).unwrap();
        assert_eq!(s.niv_core(), 25);
    }

    #[test]
    fn full_range_is_conjugate_symmetric_with_tail() {
        let beta = 4.0;
        let mut sig = second_order_like(beta, 40, 0.5, -0.2);
        sig[0] += Complex64::new(0.1, -0.3);
        let s = SelfEnergy::from_local(&sig, [1, 1, 1], beta, Some((0.5, -0.2)), 1e-8).unwrap();
        let full = s.get_siw(60);
        let row = full.row(0);
        assert_eq!(row.len(), 120);
        for i in 0..60 {
            assert!((row[60 + i] - row[59 - i].conj()).norm() < 1e-14);
        }
        assert!((row[60] - sig[0]).norm() < 1e-14);
        let iv = matsubara::iv(beta, 60);
        assert!((row[119] - (0.5 + 0.2 / iv[119])).norm() < 1e-14);
    }
}
