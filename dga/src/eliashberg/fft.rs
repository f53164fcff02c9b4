// SPDX-License-Identifier: AGPL-3.0-only

//! Three-dimensional FFT over the momentum axes of a [`KField`].
//!
//! Each axis is transformed line by line with a planned 1D transform; the
//! frequency axis is left untouched. The inverse transform carries the 1/N
//! normalisation, so `inverse(forward(f)) == f`.

use std::sync::Arc;

use num_complex::Complex64;
use rayon::prelude::*;
use rustfft::{Fft, FftPlanner};

use crate::field::KField;

/// Planned forward and inverse transforms for one momentum grid.
pub struct Fft3 {
    nk: [usize; 3],
    forward: [Arc<dyn Fft<f64>>; 3],
    inverse: [Arc<dyn Fft<f64>>; 3],
}

impl std::fmt::Debug for Fft3 {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Fft3").field("nk", &self.nk).finish()
    }
}

impl Fft3 {
    /// Plan transforms for a grid of `nk` points.
    #[must_use]
    pub fn new(nk: [usize; 3]) -> Self {
        let mut planner = FftPlanner::<f64>::new();
        let forward = nk.map(|n| planner.plan_fft_forward(n));
        let inverse = nk.map(|n| planner.plan_fft_inverse(n));
        Self { nk, forward, inverse }
    }

    /// Unnormalised forward transform, in place.
    pub fn forward(&self, field: &mut KField) {
        self.transform(field, &self.forward, 1.0);
    }

    /// Inverse transform with 1/N normalisation, in place.
    pub fn inverse(&self, field: &mut KField) {
        let n = self.nk.iter().product::<usize>() as f64;
        self.transform(field, &self.inverse, 1.0 / n);
    }

    fn transform(&self, field: &mut KField, plans: &[Arc<dyn Fft<f64>>; 3], scale: f64) {
        let nfreq = field.nfreq();
        let [_, ny, nz] = self.nk;
        let strides = [ny * nz * nfreq, nz * nfreq, nfreq];
        let data = field.as_mut_slice();
        for axis in 0..3 {
            let n = self.nk[axis];
            if n == 1 {
                continue;
            }
            let stride = strides[axis];
            let plan = &plans[axis];
            // A block of n·stride values holds `stride` interleaved lines.
            data.par_chunks_mut(n * stride).for_each(|block| {
                let mut buf = vec![Complex64::new(0.0, 0.0); n];
                for offset in 0..stride {
                    for (j, b) in buf.iter_mut().enumerate() {
                        *b = block[offset + j * stride];
                    }
                    plan.process(&mut buf);
                    for (j, b) in buf.iter().enumerate() {
                        block[offset + j * stride] = *b;
                    }
                }
            });
        }
        if scale != 1.0 {
            data.par_iter_mut().for_each(|z| *z *= scale);
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::lattice::LcgRng;

    /// h(k) = Σ_{k'} g(k − k') f(k'), frequency by frequency.
    fn convolve(fft: &Fft3, g: &KField, f: &KField) -> KField {
        let mut gh = g.clone();
        let mut fh = f.clone();
        fft.forward(&mut gh);
        fft.forward(&mut fh);
        for (a, b) in fh.as_mut_slice().iter_mut().zip(gh.as_slice()) {
            *a *= b;
        }
        fft.inverse(&mut fh);
        fh
    }

    fn random_field(nk: [usize; 3], nfreq: usize, seed: u64) -> KField {
        let mut rng = LcgRng::new(seed);
        let n = nk.iter().product::<usize>() * nfreq;
        let data = (0..n)
            .map(|_| Complex64::new(rng.uniform_in(-1.0, 1.0), rng.uniform_in(-1.0, 1.0)))
            .collect();
        KField::from_vec(nk, nfreq, data).unwrap()
    }

    #[test]
    fn inverse_undoes_forward() {
        let fft = Fft3::new([4, 6, 2]);
        let f = random_field([4, 6, 2], 3, 7);
        let mut g = f.clone();
        fft.forward(&mut g);
        fft.inverse(&mut g);
        for (a, b) in f.as_slice().iter().zip(g.as_slice()) {
            assert!((a - b).norm() < 1e-12);
        }
    }

    #[test]
    fn forward_matches_direct_dft_on_every_axis() {
        let nk = [3, 2, 4];
        let nfreq = 2;
        let fft = Fft3::new(nk);
        let f = random_field(nk, nfreq, 5);
        let mut h = f.clone();
        fft.forward(&mut h);
        let ravel = |x: usize, y: usize, z: usize| (x * nk[1] + y) * nk[2] + z;
        let tau = 2.0 * std::f64::consts::PI;
        for (kx, ky, kz) in (0..nk[0]).flat_map(|x| (0..nk[1]).flat_map(move |y| (0..nk[2]).map(move |z| (x, y, z)))) {
            for iw in 0..nfreq {
                let mut direct = Complex64::new(0.0, 0.0);
                for (x, y, z) in (0..nk[0]).flat_map(|x| (0..nk[1]).flat_map(move |y| (0..nk[2]).map(move |z| (x, y, z)))) {
                    let phase = -tau
                        * ((kx * x) as f64 / nk[0] as f64
                            + (ky * y) as f64 / nk[1] as f64
                            + (kz * z) as f64 / nk[2] as f64);
                    direct += f.get(ravel(x, y, z), iw) * Complex64::from_polar(1.0, phase);
                }
                assert!((h.get(ravel(kx, ky, kz), iw) - direct).norm() < 1e-12);
            }
        }
    }

    #[test]
    fn convolution_matches_direct_sum() {
        let nk = [4, 3, 1];
        let fft = Fft3::new(nk);
        let g = random_field(nk, 2, 11);
        let f = random_field(nk, 2, 13);
        let h = convolve(&fft, &g, &f);
        let ravel = |x: usize, y: usize| x * nk[1] + y;
        for kx in 0..nk[0] {
            for ky in 0..nk[1] {
                for iw in 0..2 {
                    let mut direct = Complex64::new(0.0, 0.0);
                    for px in 0..nk[0] {
                        for py in 0..nk[1] {
                            let dx = (kx + nk[0] - px) % nk[0];
                            let dy = (ky + nk[1] - py) % nk[1];
                            direct += g.get(ravel(dx, dy), iw) * f.get(ravel(px, py), iw);
                        }
                    }
                    assert!((h.get(ravel(kx, ky), iw) - direct).norm() < 1e-12);
                }
            }
        }
    }
}
