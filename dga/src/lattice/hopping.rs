// SPDX-License-Identifier: AGPL-3.0-only

//! Real-space hopping lists and the resulting band dispersion.
//!
//! ε(k) = Σ_R h_R cos(k·R) for a hopping list that contains R and −R with the
//! same amplitude (time-reversal symmetric single band).

use serde::{Deserialize, Serialize};

use super::brillouin::KGrid;

/// One hopping amplitude h_R to the lattice vector R.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct HoppingTerm {
    /// Lattice vector in units of the lattice constant.
    pub r: [i32; 3],
    /// Amplitude h_R.
    pub h: f64,
}

/// Single-band tight-binding model.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct RealSpaceHopping {
    /// All hopping terms, both R and −R.
    pub terms: Vec<HoppingTerm>,
}

impl RealSpaceHopping {
    /// Square lattice with nearest (t), next-nearest (t') and
    /// third-nearest (t'') neighbour hopping:
    /// ε = −2t(cos kx + cos ky) − 4t' cos kx cos ky − 2t''(cos 2kx + cos 2ky).
    #[must_use]
    pub fn one_band_2d_t_tp_tpp(t: f64, tp: f64, tpp: f64) -> Self {
        let mut terms = Vec::with_capacity(12);
        for r in [[1, 0, 0], [-1, 0, 0], [0, 1, 0], [0, -1, 0]] {
            terms.push(HoppingTerm { r, h: -t });
        }
        for r in [[1, 1, 0], [-1, -1, 0], [1, -1, 0], [-1, 1, 0]] {
            terms.push(HoppingTerm { r, h: -tp });
        }
        for r in [[2, 0, 0], [-2, 0, 0], [0, 2, 0], [0, -2, 0]] {
            terms.push(HoppingTerm { r, h: -tpp });
        }
        Self { terms }
    }

    /// ε(k) at a single momentum.
    #[must_use]
    pub fn ek(&self, k: [f64; 3]) -> f64 {
        self.terms
            .iter()
            .map(|t| {
                let phase = k[0] * f64::from(t.r[0]) + k[1] * f64::from(t.r[1]) + k[2] * f64::from(t.r[2]);
                t.h * phase.cos()
            })
            .sum()
    }

    /// ε(k) on every point of a grid.
    #[must_use]
    pub fn ek_grid(&self, grid: &KGrid) -> Vec<f64> {
        (0..grid.nk_tot()).map(|ik| self.ek(grid.k_point(ik))).collect()
    }

    /// Band width max ε − min ε on a grid.
    #[must_use]
    pub fn band_width(&self, grid: &KGrid) -> f64 {
        let ek = self.ek_grid(grid);
        let max = ek.iter().copied().fold(f64::NEG_INFINITY, f64::max);
        let min = ek.iter().copied().fold(f64::INFINITY, f64::min);
        max - min
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use std::f64::consts::PI;

    #[test]
    fn t_tp_tpp_matches_closed_form() {
        let (t, tp, tpp) = (1.0, -0.25, 0.12);
        let hr = RealSpaceHopping::one_band_2d_t_tp_tpp(t, tp, tpp);
        for &(kx, ky) in &[(0.3, 1.1), (PI, 0.0), (2.0, -0.7)] {
            let expected = -2.0 * t * (f64::cos(kx) + f64::cos(ky))
                - 4.0 * tp * f64::cos(kx) * f64::cos(ky)
                - 2.0 * tpp * (f64::cos(2.0 * kx) + f64::cos(2.0 * ky));
            assert!((hr.ek([kx, ky, 0.0]) - expected).abs() < 1e-12);
        }
    }

    #[test]
    fn nearest_neighbour_band_is_traceless() {
        let grid = KGrid::new([8, 8, 1], vec![]).unwrap();
        let hr = RealSpaceHopping::one_band_2d_t_tp_tpp(1.0, 0.0, 0.0);
        let ek = hr.ek_grid(&grid);
        assert!(ek.iter().sum::<f64>().abs() < 1e-10);
        assert!((hr.band_width(&grid) - 8.0).abs() < 1e-12);
    }
}
