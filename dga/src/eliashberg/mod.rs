// SPDX-License-Identifier: AGPL-3.0-only

//! Linearised Eliashberg equation.
//!
//! λ Δ(k, ν) = −1/(β N) Σ_{k', ν'} Γ(k − k'; ν − ν') |G(k', ν')|² Δ(k', ν')
//!
//! The momentum sum is a cyclic convolution and is evaluated with FFTs on the
//! transfer-momentum grid. The leading eigenvalue comes from a plain power
//! iteration; the eigenvalue of the symmetry-seeded gap comes from a shifted
//! power iteration on A − λ_s, which suppresses the leading mode.

pub mod fft;
mod gap;
mod pairing;

pub use gap::{gap_start, FrequencyParity, GapSymmetry};
pub use pairing::{PairingChannel, PairingVertex};

use num_complex::Complex64;
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use self::fft::Fft3;
use crate::error::{ensure_len, DgaError, Result};
use crate::field::{KField, StoredKField};
use crate::lattice::{KGrid, QGrid};
use crate::two_point::GreensFunction;
use crate::{matsubara, tolerances};

/// Stopping rule of the power iteration.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct PowerIteration {
    /// |λ_new − λ_old| below which the iteration stops.
    pub eps: f64,
    /// Number of operator applications after which an unconverged
    /// iteration stops.
    pub max_count: usize,
}

impl Default for PowerIteration {
    fn default() -> Self {
        Self {
            eps: tolerances::ELIASHBERG_EPS,
            max_count: tolerances::ELIASHBERG_MAX_COUNT,
        }
    }
}

/// Eigenvalue and eigenvector of one power iteration.
#[derive(Clone, Debug)]
pub struct EigenPair {
    /// Rayleigh quotient (real part).
    pub lambda: f64,
    /// Eigenvector, normalised by the last eigenvalue.
    pub gap: KField,
    /// Iterations performed.
    pub iterations: usize,
    /// Whether the eigenvalue change fell below `eps`.
    pub converged: bool,
}

/// Result of both phases.
#[derive(Clone, Debug)]
pub struct EliashbergSolution {
    /// Pair spin structure.
    pub channel: PairingChannel,
    /// Leading eigenvalue λ_s with its gap.
    pub leading: EigenPair,
    /// Eigenvalue λ_d + λ_s reached from the symmetry-seeded start.
    pub seeded: EigenPair,
}

impl EliashbergSolution {
    /// Both phases converged.
    #[must_use]
    pub const fn converged(&self) -> bool {
        self.leading.converged && self.seeded.converged
    }

    /// Serialisable summary including the gap functions.
    #[must_use]
    pub fn to_stored(&self) -> StoredEliashberg {
        StoredEliashberg {
            channel: self.channel,
            lambda: [self.leading.lambda, self.seeded.lambda],
            iterations: [self.leading.iterations, self.seeded.iterations],
            converged: self.converged(),
            gap_leading: self.leading.gap.to_stored(),
            gap_seeded: self.seeded.gap.to_stored(),
        }
    }
}

/// On-disk form of an [`EliashbergSolution`].
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct StoredEliashberg {
    /// Pair spin structure.
    pub channel: PairingChannel,
    /// `[λ_s, λ_d + λ_s]`.
    pub lambda: [f64; 2],
    /// Iterations of both phases.
    pub iterations: [usize; 2],
    /// Both phases converged.
    pub converged: bool,
    /// Leading gap.
    pub gap_leading: StoredKField,
    /// Symmetry-seeded gap.
    pub gap_seeded: StoredKField,
}

/// G(k, ν) on the points of `qgrid` (a sub-lattice of `kgrid`) for
/// n ∈ [−niv, niv).
///
/// # Errors
///
/// [`DgaError::FrequencyBox`] when `gk` does not cover the box.
pub fn green_on_qgrid(gk: &GreensFunction, kgrid: &KGrid, qgrid: &QGrid, niv: usize) -> Result<KField> {
    if niv > gk.niv_full() {
        return Err(DgaError::FrequencyBox(format!(
            "gap equation box niv={niv} exceeds Green's function box {}",
            gk.niv_full()
        )));
    }
    let vn = matsubara::vn(niv);
    KField::from_rows(qgrid.grid().nk(), 2 * niv, |iq| {
        let ik = kgrid.ravel(qgrid.shift(iq));
        vn.iter()
            .map(|&n| gk.get(ik, n).unwrap_or_default())
            .collect()
    })
}

/// The linear gap operator on one grid.
#[derive(Debug)]
pub struct GapEquation {
    fft: Fft3,
    niv: usize,
    gamma_hat: KField,
    g_abs2: Vec<f64>,
    prefactor: f64,
}

impl GapEquation {
    /// Set up the operator from a pairing vertex and G on the same grid.
    ///
    /// # Errors
    ///
    /// Shape errors for mismatched grids or frequency boxes.
    pub fn new(vertex: &PairingVertex, g: &KField, beta: f64) -> Result<Self> {
        let nk = vertex.gamma.nk();
        ensure_len("gap equation k-points", vertex.gamma.nk_tot(), g.nk_tot())?;
        ensure_len("gap equation frequencies", 2 * vertex.niv, g.nfreq())?;
        let fft = Fft3::new(nk);
        let mut gamma_hat = vertex.gamma.clone();
        fft.forward(&mut gamma_hat);
        Ok(Self {
            fft,
            niv: vertex.niv,
            gamma_hat,
            g_abs2: g.as_slice().iter().map(|z| z.norm_sqr()).collect(),
            prefactor: -1.0 / (beta * g.nk_tot() as f64),
        })
    }

    /// Apply the operator to a gap function.
    #[must_use]
    pub fn apply(&self, delta: &KField) -> KField {
        let nv = 2 * self.niv;
        let mut f = delta.clone();
        for (z, w) in f.as_mut_slice().iter_mut().zip(&self.g_abs2) {
            *z *= w;
        }
        self.fft.forward(&mut f);
        let mut out = KField::zeros(delta.nk(), nv);
        out.as_mut_slice()
            .par_chunks_mut(nv)
            .enumerate()
            .for_each(|(ir, row)| {
                let fr = f.row(ir);
                let gr = self.gamma_hat.row(ir);
                for (iv, o) in row.iter_mut().enumerate() {
                    let mut acc = Complex64::new(0.0, 0.0);
                    for (ivp, fv) in fr.iter().enumerate() {
                        acc += gr[iv + nv - 1 - ivp] * fv;
                    }
                    *o = acc;
                }
            });
        self.fft.inverse(&mut out);
        out.as_mut_slice().iter_mut().for_each(|z| *z *= self.prefactor);
        out
    }

    /// Power iteration on A − `shift`, starting from `start`.
    ///
    /// # Errors
    ///
    /// [`DgaError::NotANumber`] when the Rayleigh quotient vanishes or is
    /// not finite.
    pub fn power_iteration(&self, start: KField, shift: f64, settings: PowerIteration) -> Result<EigenPair> {
        let mut delta = start;
        let mut lambda_old = Complex64::new(10.0, 0.0);
        let mut count = 0;
        loop {
            count += 1;
            let mut next = self.apply(&delta);
            if shift != 0.0 {
                for (n, d) in next.as_mut_slice().iter_mut().zip(delta.as_slice()) {
                    *n -= shift * d;
                }
            }
            let num: Complex64 = delta
                .as_slice()
                .iter()
                .zip(next.as_slice())
                .map(|(d, n)| d.conj() * n)
                .sum();
            let den: f64 = delta.as_slice().iter().map(|d| d.norm_sqr()).sum();
            let image: f64 = next.as_slice().iter().map(|d| d.norm_sqr()).sum();
            let lambda = num / den;
            // A start vector in the null space has no eigenvalue to find.
            if !lambda.is_finite() || image <= tolerances::NEAR_ZERO_EXPECTED * den {
                return Err(DgaError::NotANumber(format!(
                    "Eliashberg Rayleigh quotient {lambda} at iteration {count}"
                )));
            }
            next.as_mut_slice().iter_mut().for_each(|z| *z /= lambda);
            let change = (lambda - lambda_old).norm();
            debug!(count, lambda = lambda.re, change, "Eliashberg power iteration");
            delta = next;
            lambda_old = lambda;
            let converged = change < settings.eps;
            if converged || count >= settings.max_count {
                if !converged {
                    warn!(count, change, "Eliashberg power iteration hit the iteration cap");
                }
                return Ok(EigenPair {
                    lambda: lambda.re,
                    gap: delta,
                    iterations: count,
                    converged,
                });
            }
        }
    }

    /// Leading eigenvalue from `random_start`, then the seeded eigenvalue
    /// λ_d + λ_s from `seeded_start`.
    ///
    /// # Errors
    ///
    /// See [`Self::power_iteration`].
    pub fn solve(&self, channel: PairingChannel, random_start: KField, seeded_start: KField, settings: PowerIteration) -> Result<EliashbergSolution> {
        let leading = self.power_iteration(random_start, 0.0, settings)?;
        let mut seeded = self.power_iteration(seeded_start, leading.lambda, settings)?;
        seeded.lambda += leading.lambda;
        info!(
            ?channel,
            lambda_leading = leading.lambda,
            lambda_seeded = seeded.lambda,
            converged = leading.converged && seeded.converged,
            "Eliashberg equation solved"
        );
        Ok(EliashbergSolution {
            channel,
            leading,
            seeded,
        })
    }
}
