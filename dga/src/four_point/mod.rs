// SPDX-License-Identifier: AGPL-3.0-only

//! Two-particle quantities in the particle–hole channels.
//!
//! Units follow the "generalized susceptibility" convention: the bubble is
//! `gchi0(ν) = −β G(ν) G(ν−ω)`, physical susceptibilities are
//! `χ(ω) = (1/β²) Σ_{νν'} gchi(ν, ν')`, and the bare vertex enters as U_r/β²
//! with U_dens = U, U_magn = −U. Three-leg vertices are stored as γ/β.
//!
//! | Module | Purpose |
//! |--------|---------|
//! | `bubble` | local and q-resolved bubbles with their tails |
//! | `vertex` | G2 → χ → Γ, auxiliary χ, Fermi–Bose vertex |
//! | `ladder` | q-resolved ladder susceptibilities |
//! | `sde` | local and lattice Schwinger–Dyson equations |

pub mod bubble;
pub mod ladder;
pub mod sde;
pub mod vertex;

use nalgebra::DMatrix;
use num_complex::Complex64;
use serde::{Deserialize, Serialize};

use crate::error::{ensure_len, DgaError, Result};
use crate::io::{ComplexArray, LocalG2File};

pub use bubble::{chi0_asympt_correction, LocalBubble};
pub use ladder::{ladder_susceptibility, LadderSusceptibility, StoredSusceptibility};
pub use sde::{local_sde, nonlocal_sde};
pub use vertex::{gammar_from_gchir, gchir_from_g2, local_vrg_and_chi_tilde};

/// Spin combination of a particle–hole channel.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Channel {
    /// Density (charge) channel, ↑↑ + ↑↓.
    #[serde(rename = "dens")]
    Density,
    /// Magnetic (spin) channel, ↑↑ − ↑↓.
    #[serde(rename = "magn")]
    Magnetic,
}

impl Channel {
    /// Bare interaction of the channel.
    #[must_use]
    pub fn u_r(self, u: f64) -> f64 {
        match self {
            Self::Density => u,
            Self::Magnetic => -u,
        }
    }

    /// Short label used in file names.
    #[must_use]
    pub const fn label(self) -> &'static str {
        match self {
            Self::Density => "dens",
            Self::Magnetic => "magn",
        }
    }
}

impl std::fmt::Display for Channel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.label())
    }
}

/// Local four-point object: one `2niv × 2niv` matrix per bosonic frequency.
#[derive(Clone, Debug)]
pub struct LocalFourPoint {
    /// Spin channel.
    pub channel: Channel,
    /// Inverse temperature.
    pub beta: f64,
    /// Bosonic indices.
    pub wn: Vec<i64>,
    /// Matrices indexed like `wn`, rows ν and columns ν'.
    pub mat: Vec<DMatrix<Complex64>>,
}

impl LocalFourPoint {
    /// Half-size of the fermionic box.
    #[must_use]
    pub fn niv(&self) -> usize {
        self.mat.first().map_or(0, |m| m.nrows() / 2)
    }

    /// Number of bosonic frequencies.
    #[must_use]
    pub fn niw(&self) -> usize {
        self.wn.len()
    }

    /// Position of ω = 0 in `wn`, if present.
    #[must_use]
    pub fn w0_position(&self) -> Option<usize> {
        self.wn.iter().position(|&m| m == 0)
    }

    /// (1/β²) Σ_{νν'} for every ω.
    #[must_use]
    pub fn contract_legs(&self) -> Vec<Complex64> {
        let norm = 1.0 / (self.beta * self.beta);
        self.mat.iter().map(|m| m.sum() * norm).collect()
    }

    /// Central `2niv_cut × 2niv_cut` block.
    ///
    /// # Errors
    ///
    /// [`DgaError::FrequencyBox`] when `niv_cut` exceeds the stored box.
    pub fn cut_iv(&self, niv_cut: usize) -> Result<Self> {
        let niv = self.niv();
        if niv_cut > niv {
            return Err(DgaError::FrequencyBox(format!(
                "cannot cut {} four-point object of niv={niv} to niv={niv_cut}",
                self.channel
            )));
        }
        let start = niv - niv_cut;
        Ok(Self {
            channel: self.channel,
            beta: self.beta,
            wn: self.wn.clone(),
            mat: self
                .mat
                .iter()
                .map(|m| m.view((start, start), (2 * niv_cut, 2 * niv_cut)).into_owned())
                .collect(),
        })
    }

    /// Keep the bosonic frequencies |m| ≤ `niw_cut`.
    ///
    /// # Errors
    ///
    /// [`DgaError::FrequencyBox`] when a frequency of the window is missing.
    pub fn cut_iw(&self, niw_cut: usize) -> Result<Self> {
        let mut wn = Vec::with_capacity(2 * niw_cut + 1);
        let mut mat = Vec::with_capacity(2 * niw_cut + 1);
        for m in -(niw_cut as i64)..=niw_cut as i64 {
            let pos = self.wn.iter().position(|&w| w == m).ok_or_else(|| {
                DgaError::FrequencyBox(format!("{} four-point object lacks ω index {m}", self.channel))
            })?;
            wn.push(m);
            mat.push(self.mat[pos].clone());
        }
        Ok(Self {
            channel: self.channel,
            beta: self.beta,
            wn,
            mat,
        })
    }

    /// Build from a stored G2 file.
    ///
    /// # Errors
    ///
    /// [`DgaError::Shape`] when the data length does not match `wn` and `niv`.
    pub fn from_stored(file: &LocalG2File) -> Result<Self> {
        let n = 2 * file.niv;
        let values = file.data.to_vec()?;
        ensure_len("local G2 data", file.wn.len() * n * n, values.len())?;
        let mat = values
            .chunks_exact(n * n)
            .map(|c| DMatrix::from_row_slice(n, n, c))
            .collect();
        Ok(Self {
            channel: file.channel,
            beta: file.beta,
            wn: file.wn.clone(),
            mat,
        })
    }

    /// Stored form (row-major `[ω][ν][ν']`).
    #[must_use]
    pub fn to_stored(&self) -> LocalG2File {
        let n = 2 * self.niv();
        let mut values = Vec::with_capacity(self.mat.len() * n * n);
        for m in &self.mat {
            for i in 0..n {
                for j in 0..n {
                    values.push(m[(i, j)]);
                }
            }
        }
        LocalG2File {
            channel: self.channel,
            beta: self.beta,
            wn: self.wn.clone(),
            niv: self.niv(),
            data: ComplexArray::from_slice(&values),
        }
    }
}

/// Local three-point object (Fermi–Bose vertex): one fermionic row per ω.
#[derive(Clone, Debug)]
pub struct LocalThreePoint {
    /// Spin channel.
    pub channel: Channel,
    /// Inverse temperature.
    pub beta: f64,
    /// Bosonic indices.
    pub wn: Vec<i64>,
    /// Rows indexed like `wn`, each of length `2niv`.
    pub mat: Vec<Vec<Complex64>>,
}

impl LocalThreePoint {
    /// Half-size of the fermionic box.
    #[must_use]
    pub fn niv(&self) -> usize {
        self.mat.first().map_or(0, |r| r.len() / 2)
    }

    /// (1/β) Σ_ν for every ω.
    #[must_use]
    pub fn contract_legs(&self) -> Vec<Complex64> {
        self.mat
            .iter()
            .map(|r| r.iter().sum::<Complex64>() / self.beta)
            .collect()
    }
}

/// RPA form χ0/(1 + U_r χ0).
#[must_use]
pub fn chi_rpa(chi0: Complex64, u_r: f64) -> Complex64 {
    chi0 / (1.0 + u_r * chi0)
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn sample(niv: usize) -> LocalFourPoint {
        let n = 2 * niv;
        LocalFourPoint {
            channel: Channel::Magnetic,
            beta: 2.0,
            wn: vec![-1, 0, 1],
            mat: (0..3)
                .map(|w| DMatrix::from_fn(n, n, |i, j| Complex64::new((i + j + w) as f64, (i * j) as f64)))
                .collect(),
        }
    }

    #[test]
    fn channel_interactions() {
        assert_eq!(Channel::Density.u_r(2.0), 2.0);
        assert_eq!(Channel::Magnetic.u_r(2.0), -2.0);
        assert_eq!(Channel::Magnetic.to_string(), "magn");
        let json = serde_json::to_string(&Channel::Density).unwrap();
        assert_eq!(json, "\"dens\"");
    }

    #[test]
    fn contraction_of_ones() {
        let f = LocalFourPoint {
            channel: Channel::Density,
            beta: 2.0,
            wn: vec![0],
            mat: vec![DMatrix::from_element(4, 4, Complex64::new(1.0, 0.0))],
        };
        assert!((f.contract_legs()[0].re - 4.0).abs() < 1e-15);
        assert_eq!(f.w0_position(), Some(0));
    }

    #[test]
    fn bosonic_cut_keeps_window() {
        let f = sample(2);
        let c = f.cut_iw(0).unwrap();
        assert_eq!(c.wn, vec![0]);
        assert_eq!(c.mat[0], f.mat[1]);
        assert!(matches!(f.cut_iw(2), Err(DgaError::FrequencyBox(_))));
    }

    #[test]
    fn cut_takes_central_block() {
        let f = sample(3);
        let c = f.cut_iv(1).unwrap();
        assert_eq!(c.niv(), 1);
        assert_eq!(c.mat[1][(0, 0)], f.mat[1][(2, 2)]);
        assert!(f.cut_iv(4).is_err());
    }

    #[test]
    fn stored_form_roundtrip() {
        let f = sample(2);
        let back = LocalFourPoint::from_stored(&f.to_stored()).unwrap();
        assert_eq!(back.mat, f.mat);
        assert_eq!(back.channel, Channel::Magnetic);
    }

    #[test]
    fn rpa_enhances_magnetic_channel() {
        let chi0 = Complex64::new(0.2, 0.0);
        assert!(chi_rpa(chi0, -2.0).re > chi0.re);
        assert!(chi_rpa(chi0, 2.0).re < chi0.re);
    }
}
