// SPDX-License-Identifier: AGPL-3.0-only

//! Starting gap functions for the power iteration.

use num_complex::Complex64;
use serde::{Deserialize, Serialize};

use crate::field::KField;
use crate::lattice::{KGrid, LcgRng};

/// Momentum structure of the starting gap.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum GapSymmetry {
    /// −cos kx + cos ky.
    #[default]
    DWave,
    /// sin ky.
    PWaveY,
    /// Uniform random values.
    Random,
}

/// Frequency parity of the starting gap.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FrequencyParity {
    /// Δ(−ν) = Δ(ν).
    #[default]
    Even,
    /// Δ(−ν) = −Δ(ν).
    Odd,
    /// Uniform random values.
    Random,
}

fn random_gap(nk: [usize; 3], nfreq: usize, rng: &mut LcgRng) -> KField {
    let mut gap = KField::zeros(nk, nfreq);
    gap.as_mut_slice()
        .iter_mut()
        .for_each(|z| *z = Complex64::new(rng.uniform(), 0.0));
    gap
}

/// Starting gap on `grid` with `2 niv` fermionic frequencies.
///
/// The momentum form is placed on ν > 0 and mirrored to ν < 0 with the
/// requested parity. A random choice for either axis gives a fully random
/// start.
#[must_use]
pub fn gap_start(grid: &KGrid, niv: usize, symmetry: GapSymmetry, parity: FrequencyParity, seed: u64) -> KField {
    let nk = grid.nk();
    let mut rng = LcgRng::new(seed);
    if symmetry == GapSymmetry::Random || parity == FrequencyParity::Random {
        return random_gap(nk, 2 * niv, &mut rng);
    }
    let sign = if parity == FrequencyParity::Even { 1.0 } else { -1.0 };
    let mut gap = KField::zeros(nk, 2 * niv);
    for ik in 0..grid.nk_tot() {
        let [kx, ky, _] = grid.k_point(ik);
        let value = match symmetry {
            GapSymmetry::DWave => -kx.cos() + ky.cos(),
            GapSymmetry::PWaveY => ky.sin(),
            GapSymmetry::Random => 0.0,
        };
        let row = gap.row_mut(ik);
        for iv in 0..niv {
            row[niv + iv] = Complex64::new(value, 0.0);
            row[niv - 1 - iv] = Complex64::new(sign * value, 0.0);
        }
    }
    gap
}
