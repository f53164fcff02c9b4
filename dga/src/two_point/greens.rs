// SPDX-License-Identifier: AGPL-3.0-only

//! Lattice Green's function G(k, iν) = 1/(iν + μ − ε_k − Σ(k, iν)).
//!
//! Built on a full-range box n ∈ [−N, N) with N = niv_core + niv_asympt: the
//! self-energy core supplies the data, its tail the asymptotic frequencies.
//! Ladder sums need G(ν − ω) well outside the vertex box, hence the extra
//! asymptotic frequencies.

use num_complex::Complex64;
use rayon::prelude::*;
use tracing::{debug, info};

use super::filling::{get_fill, update_mu};
use super::self_energy::SelfEnergy;
use crate::error::{ensure_len, Result};
use crate::field::KField;
use crate::matsubara;

/// Lattice Green's function on a full-range frequency box.
#[derive(Clone, Debug)]
pub struct GreensFunction {
    beta: f64,
    mu: f64,
    n: f64,
    niv_core: usize,
    g: KField,
}

fn build(sigma_full: &KField, ek: &[f64], iv: &[Complex64], mu: f64) -> Result<KField> {
    let nfreq = iv.len();
    let mut data = vec![Complex64::new(0.0, 0.0); ek.len() * nfreq];
    data.par_chunks_mut(nfreq)
        .enumerate()
        .for_each(|(ik, row)| {
            let s = sigma_full.row(ik);
            for (i, g) in row.iter_mut().enumerate() {
                *g = 1.0 / (iv[i] + mu - ek[ik] - s[i]);
            }
        });
    KField::from_vec(sigma_full.nk(), nfreq, data)
}

fn local_green(sigma_full: &KField, ek: &[f64], iv: &[Complex64], mu: f64) -> Vec<Complex64> {
    let nk = ek.len().max(1) as f64;
    iv.par_iter()
        .enumerate()
        .map(|(i, &z)| {
            ek.iter()
                .enumerate()
                .map(|(ik, &e)| 1.0 / (z + mu - e - sigma_full.get(ik, i)))
                .sum::<Complex64>()
                / nk
        })
        .collect()
}

impl GreensFunction {
    /// Green's function at fixed chemical potential.
    ///
    /// # Errors
    ///
    /// [`crate::error::DgaError::Shape`] when `ek` does not cover the grid.
    pub fn with_mu(sigma: &SelfEnergy, ek: &[f64], mu: f64, niv_asympt: usize) -> Result<Self> {
        let nk = sigma.nk();
        ensure_len("dispersion", nk.iter().product(), ek.len())?;
        let niv_full = sigma.niv_core() + niv_asympt;
        let iv = matsubara::iv(sigma.beta(), niv_full);
        let sigma_full = sigma.get_siw(niv_full);
        let g = build(&sigma_full, ek, &iv, mu)?;
        let hloc = ek.iter().sum::<f64>() / ek.len() as f64;
        let n = get_fill(&g.k_mean(), &iv, sigma.beta(), hloc, sigma.smom().0, mu);
        debug!(mu, n, niv_full, "Green's function at fixed mu");
        Ok(Self {
            beta: sigma.beta(),
            mu,
            n,
            niv_core: sigma.niv_core(),
            g,
        })
    }

    /// Green's function at fixed filling; μ is searched starting at `mu0`.
    ///
    /// # Errors
    ///
    /// See [`Self::with_mu`].
    pub fn with_filling(sigma: &SelfEnergy, ek: &[f64], n: f64, niv_asympt: usize, mu0: f64) -> Result<Self> {
        let nk = sigma.nk();
        ensure_len("dispersion", nk.iter().product(), ek.len())?;
        let niv_full = sigma.niv_core() + niv_asympt;
        let beta = sigma.beta();
        let iv = matsubara::iv(beta, niv_full);
        let sigma_full = sigma.get_siw(niv_full);
        let hloc = ek.iter().sum::<f64>() / ek.len() as f64;
        let smom0 = sigma.smom().0;
        let n_of_mu = |mu: f64| get_fill(&local_green(&sigma_full, ek, &iv, mu), &iv, beta, hloc, smom0, mu);
        let mu = update_mu(n_of_mu, n, mu0);
        info!(mu, n_target = n, "chemical potential");
        Self::with_mu(sigma, ek, mu, niv_asympt)
    }

    /// Inverse temperature.
    #[must_use]
    pub const fn beta(&self) -> f64 {
        self.beta
    }

    /// Chemical potential.
    #[must_use]
    pub const fn mu(&self) -> f64 {
        self.mu
    }

    /// Filling computed from this Green's function.
    #[must_use]
    pub const fn n(&self) -> f64 {
        self.n
    }

    /// Core box of the underlying self-energy.
    #[must_use]
    pub const fn niv_core(&self) -> usize {
        self.niv_core
    }

    /// Half-size of the stored box.
    #[must_use]
    pub const fn niv_full(&self) -> usize {
        self.g.nfreq() / 2
    }

    /// Momentum grid.
    #[must_use]
    pub const fn nk(&self) -> [usize; 3] {
        self.g.nk()
    }

    /// Full-range G(k, iν).
    #[must_use]
    pub const fn field(&self) -> &KField {
        &self.g
    }

    /// G(k, iν_n) by fermionic index, `None` outside the box.
    #[must_use]
    pub fn get(&self, ik: usize, n: i64) -> Option<Complex64> {
        matsubara::fermionic_position(n, self.niv_full()).map(|pos| self.g.get(ik, pos))
    }

    /// Full-range local Green's function.
    #[must_use]
    pub fn g_loc(&self) -> Vec<Complex64> {
        self.g.k_mean()
    }

    /// Local Green's function cut to n ∈ [−niv, niv) (clamped to the box).
    #[must_use]
    pub fn g_loc_cut(&self, niv: usize) -> Vec<Complex64> {
        let full = self.g_loc();
        let niv = niv.min(self.niv_full());
        matsubara::cut_v(&full, niv).map(<[Complex64]>::to_vec).unwrap_or(full)
    }

    /// G(k, iν) cut to n ∈ [−niv, niv) (clamped to the box).
    #[must_use]
    pub fn cut(&self, niv: usize) -> KField {
        let niv = niv.min(self.niv_full());
        self.g.slice_freq(self.niv_full() - niv, 2 * niv)
    }

    /// Storage footprint in megabytes.
    #[must_use]
    pub fn memory_mb(&self) -> f64 {
        (self.g.as_slice().len() * std::mem::size_of::<Complex64>()) as f64 / 1e6
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::lattice::{KGrid, RealSpaceHopping};

    fn half_filled(beta: f64) -> (SelfEnergy, Vec<f64>) {
        let grid = KGrid::new([8, 8, 1], vec![]).unwrap();
        let ek = RealSpaceHopping::one_band_2d_t_tp_tpp(1.0, 0.0, 0.0).ek_grid(&grid);
        let sig = vec![Complex64::new(0.0, 0.0); 60];
        let s = SelfEnergy::from_local(&sig, grid.nk(), beta, Some((0.0, 0.0)), 1e-8).unwrap();
        (s, ek)
    }

    #[test]
    fn particle_hole_symmetric_band_is_half_filled() {
        let (s, ek) = half_filled(5.0);
        let g = GreensFunction::with_mu(&s, &ek, 0.0, 200).unwrap();
        assert!((g.n() - 1.0).abs() < 1e-6, "n = {}", g.n());
        let gl = g.g_loc();
        // Re G_loc vanishes at half filling.
        assert!(gl.iter().all(|z| z.re.abs() < 1e-10));
    }

    #[test]
    fn filling_search_recovers_mu() {
        let (s, ek) = half_filled(5.0);
        let g0 = GreensFunction::with_mu(&s, &ek, 0.4, 200).unwrap();
        let g1 = GreensFunction::with_filling(&s, &ek, g0.n(), 200, 0.0).unwrap();
        assert!((g1.mu() - 0.4).abs() < 1e-4, "mu = {}", g1.mu());
    }

    #[test]
    fn index_access_matches_cut() {
        let (s, ek) = half_filled(2.0);
        let g = GreensFunction::with_mu(&s, &ek, 0.1, 20).unwrap();
        let cut = g.cut(3);
        assert_eq!(cut.nfreq(), 6);
        assert_eq!(cut.get(5, 0), g.get(5, -3).unwrap());
        assert!(g.get(0, g.niv_full() as i64).is_none());
    }
}
