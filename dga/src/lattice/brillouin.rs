// SPDX-License-Identifier: AGPL-3.0-only

//! Momentum grids on [0, 2π)³ and their irreducible wedge.
//!
//! A k-point is addressed by `ik = (ix·ny + iy)·nz + iz`. Lattice symmetries
//! act on grid indices directly, so orbits are exact and no floating-point
//! comparison of momenta is needed. The ladder only has to be solved on one
//! representative per orbit; [`KGrid::map_irrk_to_fbz`] unfolds the result.

use std::collections::VecDeque;
use std::f64::consts::PI;

use serde::{Deserialize, Serialize};

use crate::error::{DgaError, Result};

/// Point-group operation acting on grid indices.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum KSymmetry {
    /// kx → −kx
    XInv,
    /// ky → −ky
    YInv,
    /// kz → −kz
    ZInv,
    /// kx ↔ ky
    XySwap,
}

impl KSymmetry {
    /// Generators of the square-lattice point group (C4v).
    #[must_use]
    pub fn two_dimensional_square() -> Vec<Self> {
        vec![Self::XInv, Self::YInv, Self::XySwap]
    }

    /// Reflections only, for rectangular or nematic systems.
    #[must_use]
    pub fn quasi_one_dimensional_square() -> Vec<Self> {
        vec![Self::XInv, Self::YInv]
    }

    fn apply(self, idx: [usize; 3], nk: [usize; 3]) -> [usize; 3] {
        let [ix, iy, iz] = idx;
        match self {
            Self::XInv => [(nk[0] - ix) % nk[0], iy, iz],
            Self::YInv => [ix, (nk[1] - iy) % nk[1], iz],
            Self::ZInv => [ix, iy, (nk[2] - iz) % nk[2]],
            Self::XySwap => [iy, ix, iz],
        }
    }
}

/// Regular momentum grid with its symmetry reduction.
#[derive(Clone, Debug)]
pub struct KGrid {
    nk: [usize; 3],
    symmetries: Vec<KSymmetry>,
    irrk: Vec<usize>,
    fbz2irrk: Vec<usize>,
    weights: Vec<usize>,
}

impl KGrid {
    /// Build the grid and its irreducible wedge.
    ///
    /// # Errors
    ///
    /// [`DgaError::InvalidArgument`] for an empty grid, or for `XySwap` on a
    /// non-square grid.
    pub fn new(nk: [usize; 3], symmetries: Vec<KSymmetry>) -> Result<Self> {
        if nk.iter().any(|&n| n == 0) {
            return Err(DgaError::InvalidArgument(format!("empty k-grid {nk:?}")));
        }
        if symmetries.contains(&KSymmetry::XySwap) && nk[0] != nk[1] {
            return Err(DgaError::InvalidArgument(format!(
                "x-y swap symmetry needs nkx == nky, got {nk:?}"
            )));
        }
        let mut grid = Self {
            nk,
            symmetries,
            irrk: Vec::new(),
            fbz2irrk: Vec::new(),
            weights: Vec::new(),
        };
        grid.reduce();
        Ok(grid)
    }

    fn reduce(&mut self) {
        let nk_tot = self.nk_tot();
        let mut fbz2irrk = vec![usize::MAX; nk_tot];
        let mut irrk = Vec::new();
        let mut weights = Vec::new();
        for ik in 0..nk_tot {
            if fbz2irrk[ik] != usize::MAX {
                continue;
            }
            let label = irrk.len();
            irrk.push(ik);
            let mut count = 0;
            let mut queue = VecDeque::from([ik]);
            fbz2irrk[ik] = label;
            while let Some(cur) = queue.pop_front() {
                count += 1;
                let idx = self.unravel(cur);
                for sym in &self.symmetries {
                    let next = self.ravel(sym.apply(idx, self.nk));
                    if fbz2irrk[next] == usize::MAX {
                        fbz2irrk[next] = label;
                        queue.push_back(next);
                    }
                }
            }
            weights.push(count);
        }
        self.irrk = irrk;
        self.fbz2irrk = fbz2irrk;
        self.weights = weights;
    }

    /// Grid dimensions.
    #[must_use]
    pub const fn nk(&self) -> [usize; 3] {
        self.nk
    }

    /// Total number of points.
    #[must_use]
    pub fn nk_tot(&self) -> usize {
        self.nk.iter().product()
    }

    /// Symmetry generators in use.
    #[must_use]
    pub fn symmetries(&self) -> &[KSymmetry] {
        &self.symmetries
    }

    /// Flat index of a grid coordinate.
    #[must_use]
    pub const fn ravel(&self, idx: [usize; 3]) -> usize {
        (idx[0] * self.nk[1] + idx[1]) * self.nk[2] + idx[2]
    }

    /// Grid coordinate of a flat index.
    #[must_use]
    pub const fn unravel(&self, ik: usize) -> [usize; 3] {
        let iz = ik % self.nk[2];
        let iy = (ik / self.nk[2]) % self.nk[1];
        let ix = ik / (self.nk[1] * self.nk[2]);
        [ix, iy, iz]
    }

    fn axis(n: usize) -> Vec<f64> {
        (0..n).map(|i| 2.0 * PI * i as f64 / n as f64).collect()
    }

    /// kx values.
    #[must_use]
    pub fn kx(&self) -> Vec<f64> {
        Self::axis(self.nk[0])
    }

    /// ky values.
    #[must_use]
    pub fn ky(&self) -> Vec<f64> {
        Self::axis(self.nk[1])
    }

    /// kz values.
    #[must_use]
    pub fn kz(&self) -> Vec<f64> {
        Self::axis(self.nk[2])
    }

    /// Momentum of a flat index.
    #[must_use]
    pub fn k_point(&self, ik: usize) -> [f64; 3] {
        let idx = self.unravel(ik);
        [0, 1, 2].map(|d| 2.0 * PI * idx[d] as f64 / self.nk[d] as f64)
    }

    /// Index of k − q where q is given in grid units.
    #[must_use]
    pub fn k_minus_q(&self, ik: usize, q: [usize; 3]) -> usize {
        let k = self.unravel(ik);
        self.ravel([0, 1, 2].map(|d| (k[d] + self.nk[d] - q[d] % self.nk[d]) % self.nk[d]))
    }

    /// Index of k + q where q is given in grid units.
    #[must_use]
    pub fn k_plus_q(&self, ik: usize, q: [usize; 3]) -> usize {
        let k = self.unravel(ik);
        self.ravel([0, 1, 2].map(|d| (k[d] + q[d]) % self.nk[d]))
    }

    /// Flat indices of the orbit representatives.
    #[must_use]
    pub fn irrk_ind(&self) -> &[usize] {
        &self.irrk
    }

    /// For every full-BZ point, the position of its representative in
    /// [`Self::irrk_ind`].
    #[must_use]
    pub fn fbz2irrk(&self) -> &[usize] {
        &self.fbz2irrk
    }

    /// Orbit sizes of the representatives.
    #[must_use]
    pub fn weights(&self) -> &[usize] {
        &self.weights
    }

    /// Number of irreducible points.
    #[must_use]
    pub fn nk_irr(&self) -> usize {
        self.irrk.len()
    }

    /// Unfold per-representative values onto the full grid.
    ///
    /// # Errors
    ///
    /// [`DgaError::Shape`] if `values` does not have one entry per
    /// representative.
    pub fn map_irrk_to_fbz<T: Clone>(&self, values: &[T]) -> Result<Vec<T>> {
        crate::error::ensure_len("irreducible k values", self.nk_irr(), values.len())?;
        Ok(self.fbz2irrk.iter().map(|&i| values[i].clone()).collect())
    }

    /// Momentum of every representative (for output).
    #[must_use]
    pub fn irrk_points(&self) -> Vec<[f64; 3]> {
        self.irrk.iter().map(|&ik| self.k_point(ik)).collect()
    }
}

/// Bosonic transfer-momentum grid commensurate with a k-grid.
#[derive(Clone, Debug)]
pub struct QGrid {
    grid: KGrid,
    stride: [usize; 3],
}

impl QGrid {
    /// q-grid of size `nq`, using the symmetries of `kgrid`.
    ///
    /// # Errors
    ///
    /// [`DgaError::InvalidArgument`] unless every `nk_i` is a multiple of `nq_i`.
    pub fn new(kgrid: &KGrid, nq: [usize; 3]) -> Result<Self> {
        let nk = kgrid.nk();
        if (0..3).any(|d| nq[d] == 0 || nk[d] % nq[d] != 0) {
            return Err(DgaError::InvalidArgument(format!(
                "q-grid {nq:?} is not commensurate with k-grid {nk:?}"
            )));
        }
        let symmetries = if nq[0] == nq[1] {
            kgrid.symmetries().to_vec()
        } else {
            kgrid
                .symmetries()
                .iter()
                .copied()
                .filter(|s| *s != KSymmetry::XySwap)
                .collect()
        };
        Ok(Self {
            grid: KGrid::new(nq, symmetries)?,
            stride: [0, 1, 2].map(|d| nk[d] / nq[d]),
        })
    }

    /// Underlying grid with its irreducible wedge.
    #[must_use]
    pub const fn grid(&self) -> &KGrid {
        &self.grid
    }

    /// q in units of the k-grid spacing.
    #[must_use]
    pub fn shift(&self, iq: usize) -> [usize; 3] {
        let idx = self.grid.unravel(iq);
        [0, 1, 2].map(|d| idx[d] * self.stride[d])
    }
}

/// Grid points where `values` (a 2D `nx × ny` slice, row-major) changes
/// sign towards its +x or +y neighbour.
#[must_use]
pub fn find_zeros(values: &[f64], nx: usize, ny: usize) -> Vec<[usize; 2]> {
    let mut zeros = Vec::new();
    if values.len() != nx * ny {
        return zeros;
    }
    for ix in 0..nx {
        for iy in 0..ny {
            let v = values[ix * ny + iy];
            let right = values[((ix + 1) % nx) * ny + iy];
            let up = values[ix * ny + (iy + 1) % ny];
            if v * right <= 0.0 || v * up <= 0.0 {
                zeros.push([ix, iy]);
            }
        }
    }
    zeros
}
