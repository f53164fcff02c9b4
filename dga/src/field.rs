// SPDX-License-Identifier: AGPL-3.0-only

//! Dense momentum–frequency container.
//!
//! `KField` stores a complex quantity on a `[nkx, nky, nkz]` momentum grid
//! times a trailing frequency axis, flattened row-major with the frequency
//! index running fastest. Self-energies, Green's functions, ladder
//! susceptibilities and gap functions all live in this layout.

use num_complex::Complex64;
use serde::{Deserialize, Serialize};

use crate::error::{ensure_len, Result};
use crate::io::ComplexArray;

/// Complex field on a 3D momentum grid with a trailing frequency axis.
#[derive(Clone, Debug, PartialEq)]
pub struct KField {
    nk: [usize; 3],
    nfreq: usize,
    data: Vec<Complex64>,
}

impl KField {
    /// Zero-initialised field.
    #[must_use]
    pub fn zeros(nk: [usize; 3], nfreq: usize) -> Self {
        Self {
            nk,
            nfreq,
            data: vec![Complex64::new(0.0, 0.0); nk.iter().product::<usize>() * nfreq],
        }
    }

    /// Wrap existing data.
    ///
    /// # Errors
    ///
    /// [`crate::error::DgaError::Shape`] when `data` does not match the shape.
    pub fn from_vec(nk: [usize; 3], nfreq: usize, data: Vec<Complex64>) -> Result<Self> {
        ensure_len("KField", nk.iter().product::<usize>() * nfreq, data.len())?;
        Ok(Self { nk, nfreq, data })
    }

    /// Build from a per-k closure returning one frequency row.
    ///
    /// # Errors
    ///
    /// [`crate::error::DgaError::Shape`] if a row has the wrong length.
    pub fn from_rows<F>(nk: [usize; 3], nfreq: usize, mut row: F) -> Result<Self>
    where
        F: FnMut(usize) -> Vec<Complex64>,
    {
        let nk_tot: usize = nk.iter().product();
        let mut data = Vec::with_capacity(nk_tot * nfreq);
        for ik in 0..nk_tot {
            let r = row(ik);
            ensure_len("KField row", nfreq, r.len())?;
            data.extend(r);
        }
        Ok(Self { nk, nfreq, data })
    }

    /// Same value on every k-point (a local quantity broadcast to the grid).
    #[must_use]
    pub fn broadcast(nk: [usize; 3], row: &[Complex64]) -> Self {
        let nk_tot: usize = nk.iter().product();
        let mut data = Vec::with_capacity(nk_tot * row.len());
        for _ in 0..nk_tot {
            data.extend_from_slice(row);
        }
        Self {
            nk,
            nfreq: row.len(),
            data,
        }
    }

    /// Momentum grid dimensions.
    #[must_use]
    pub const fn nk(&self) -> [usize; 3] {
        self.nk
    }

    /// Total number of k-points.
    #[must_use]
    pub fn nk_tot(&self) -> usize {
        self.nk.iter().product()
    }

    /// Length of the frequency axis.
    #[must_use]
    pub const fn nfreq(&self) -> usize {
        self.nfreq
    }

    /// Raw row-major data.
    #[must_use]
    pub fn as_slice(&self) -> &[Complex64] {
        &self.data
    }

    /// Mutable raw data.
    pub fn as_mut_slice(&mut self) -> &mut [Complex64] {
        &mut self.data
    }

    /// Consume into the raw data.
    #[must_use]
    pub fn into_vec(self) -> Vec<Complex64> {
        self.data
    }

    /// Frequency row of k-point `ik`.
    #[must_use]
    pub fn row(&self, ik: usize) -> &[Complex64] {
        &self.data[ik * self.nfreq..(ik + 1) * self.nfreq]
    }

    /// Mutable frequency row of k-point `ik`.
    pub fn row_mut(&mut self, ik: usize) -> &mut [Complex64] {
        &mut self.data[ik * self.nfreq..(ik + 1) * self.nfreq]
    }

    /// Single value.
    #[must_use]
    pub fn get(&self, ik: usize, ifreq: usize) -> Complex64 {
        self.data[ik * self.nfreq + ifreq]
    }

    /// Momentum average for each frequency.
    #[must_use]
    pub fn k_mean(&self) -> Vec<Complex64> {
        let mut mean = vec![Complex64::new(0.0, 0.0); self.nfreq];
        for chunk in self.data.chunks_exact(self.nfreq.max(1)) {
            for (m, v) in mean.iter_mut().zip(chunk) {
                *m += v;
            }
        }
        let norm = self.nk_tot().max(1) as f64;
        mean.iter_mut().for_each(|m| *m /= norm);
        mean
    }

    /// Element-wise map.
    #[must_use]
    pub fn map<F>(&self, f: F) -> Self
    where
        F: Fn(Complex64) -> Complex64,
    {
        Self {
            nk: self.nk,
            nfreq: self.nfreq,
            data: self.data.iter().map(|&z| f(z)).collect(),
        }
    }

    /// Restrict the frequency axis to `[start, start + len)`.
    #[must_use]
    pub fn slice_freq(&self, start: usize, len: usize) -> Self {
        let mut data = Vec::with_capacity(self.nk_tot() * len);
        for ik in 0..self.nk_tot() {
            data.extend_from_slice(&self.row(ik)[start..start + len]);
        }
        Self {
            nk: self.nk,
            nfreq: len,
            data,
        }
    }

    /// Shift the grid by half a reciprocal lattice vector in x and y so that
    /// k = (π, π) sits at the centre (useful for Fermi-surface maps).
    #[must_use]
    pub fn pi_shift(&self) -> Self {
        let [nx, ny, nz] = self.nk;
        let mut out = Self::zeros(self.nk, self.nfreq);
        for ix in 0..nx {
            for iy in 0..ny {
                for iz in 0..nz {
                    let src = (ix * ny + iy) * nz + iz;
                    let dst = (((ix + nx / 2) % nx) * ny + (iy + ny / 2) % ny) * nz + iz;
                    out.row_mut(dst).copy_from_slice(self.row(src));
                }
            }
        }
        out
    }

    /// Serialisable form.
    #[must_use]
    pub fn to_stored(&self) -> StoredKField {
        StoredKField {
            nk: self.nk,
            nfreq: self.nfreq,
            values: ComplexArray::from_slice(&self.data),
        }
    }
}

/// On-disk form of a [`KField`].
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct StoredKField {
    /// Momentum grid dimensions.
    pub nk: [usize; 3],
    /// Frequency axis length.
    pub nfreq: usize,
    /// Row-major values.
    pub values: ComplexArray,
}

impl StoredKField {
    /// Rebuild the in-memory field.
    ///
    /// # Errors
    ///
    /// Shape errors when the stored arrays are inconsistent.
    pub fn into_field(self) -> Result<KField> {
        KField::from_vec(self.nk, self.nfreq, self.values.to_vec()?)
    }
}
