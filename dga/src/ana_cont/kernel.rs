// SPDX-License-Identifier: AGPL-3.0-only

//! Continuation kernels G(x) = ∫ dω K(x, ω) A(ω).
//!
//! Complex fermionic data is fitted as the real and imaginary parts stacked
//! into one real vector, so `real_matrix` doubles the row count for that
//! kernel.

use nalgebra::DMatrix;
use num_complex::Complex64;
use serde::{Deserialize, Serialize};

use crate::numerics::trapz_weights;

/// Points of the Gaussian used for preblur.
const BLUR_POINTS: usize = 201;
/// Half-width of the blur window in units of the blur width.
const BLUR_RANGE: f64 = 5.0;

/// Kernel family.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum KernelKind {
    /// 1/(iν − ω) on fermionic Matsubara frequencies.
    FreqFermionic,
    /// ω²/(ω² + ω_n²) on bosonic Matsubara frequencies.
    FreqBosonic,
    /// e^{−τω}/(1 + e^{−βω}) on imaginary time.
    TimeFermionic {
        /// Inverse temperature.
        beta: f64,
    },
}

impl KernelKind {
    /// Whether data and kernel are complex.
    #[must_use]
    pub const fn is_complex(self) -> bool {
        matches!(self, Self::FreqFermionic)
    }

    fn evaluate(self, x: f64, w: f64) -> Complex64 {
        match self {
            Self::FreqFermionic => 1.0 / Complex64::new(-w, x),
            Self::FreqBosonic => {
                if w == 0.0 && x == 0.0 {
                    Complex64::new(1.0, 0.0)
                } else {
                    Complex64::new(w * w / (w * w + x * x), 0.0)
                }
            }
            Self::TimeFermionic { beta } => {
                let v = if w >= 0.0 {
                    (-x * w).exp() / (1.0 + (-beta * w).exp())
                } else {
                    ((beta - x) * w).exp() / ((beta * w).exp() + 1.0)
                };
                Complex64::new(v, 0.0)
            }
        }
    }
}

fn gaussian_window(width: f64) -> (Vec<f64>, Vec<f64>) {
    let x: Vec<f64> = (0..BLUR_POINTS)
        .map(|i| -BLUR_RANGE * width + 2.0 * BLUR_RANGE * width * i as f64 / (BLUR_POINTS - 1) as f64)
        .collect();
    let norm = 1.0 / ((2.0 * std::f64::consts::PI).sqrt() * width);
    let weights = trapz_weights(&x)
        .into_iter()
        .zip(&x)
        .map(|(t, xi)| t * norm * (-(xi * xi) / (2.0 * width * width)).exp())
        .collect();
    (x, weights)
}

fn interp(x: f64, xs: &[f64], ys: &[f64]) -> f64 {
    let n = xs.len();
    if n == 0 || x < xs[0] || x > xs[n - 1] {
        return 0.0;
    }
    let j = xs.partition_point(|&v| v <= x).clamp(1, n - 1);
    let t = (x - xs[j - 1]) / (xs[j] - xs[j - 1]);
    ys[j - 1] + t * (ys[j] - ys[j - 1])
}

/// Kernel matrix on an imaginary and a real axis.
#[derive(Clone, Debug)]
pub struct Kernel {
    kind: KernelKind,
    im_axis: Vec<f64>,
    re_axis: Vec<f64>,
    matrix: DMatrix<Complex64>,
    blur_width: f64,
}

impl Kernel {
    /// Evaluate K(x_i, ω_j).
    #[must_use]
    pub fn new(kind: KernelKind, im_axis: &[f64], re_axis: &[f64]) -> Self {
        let matrix = DMatrix::from_fn(im_axis.len(), re_axis.len(), |i, j| kind.evaluate(im_axis[i], re_axis[j]));
        Self {
            kind,
            im_axis: im_axis.to_vec(),
            re_axis: re_axis.to_vec(),
            matrix,
            blur_width: 0.0,
        }
    }

    /// Kernel family.
    #[must_use]
    pub const fn kind(&self) -> KernelKind {
        self.kind
    }

    /// Complex kernel matrix (rows: imaginary axis).
    #[must_use]
    pub const fn matrix(&self) -> &DMatrix<Complex64> {
        &self.matrix
    }

    /// Width of the preblur Gaussian (0 when unblurred).
    #[must_use]
    pub const fn blur_width(&self) -> f64 {
        self.blur_width
    }

    /// Replace K by its convolution with a normalised Gaussian of `width`.
    pub fn preblur(&mut self, width: f64) {
        if width <= 0.0 {
            return;
        }
        let (x, wt) = gaussian_window(width);
        let kind = self.kind;
        let (im, re) = (&self.im_axis, &self.re_axis);
        self.matrix = DMatrix::from_fn(im.len(), re.len(), |i, j| {
            x.iter()
                .zip(&wt)
                .map(|(xk, wk)| *wk * kind.evaluate(im[i], re[j] + xk))
                .sum()
        });
        self.blur_width = width;
    }

    /// Blur a spectrum with the preblur Gaussian (identity when unblurred).
    #[must_use]
    pub fn blur(&self, a: &[f64]) -> Vec<f64> {
        if self.blur_width <= 0.0 {
            return a.to_vec();
        }
        let (x, wt) = gaussian_window(self.blur_width);
        self.re_axis
            .iter()
            .map(|w| {
                x.iter()
                    .zip(&wt)
                    .map(|(xk, wk)| wk * interp(w + xk, &self.re_axis, a))
                    .sum()
            })
            .collect()
    }

    /// Rotate the rows into the eigenbasis of the covariance: K ← Uᵀ K.
    pub fn rotate(&mut self, ucov: &DMatrix<f64>) {
        let u = ucov.map(|v| Complex64::new(v, 0.0));
        self.matrix = u.transpose() * &self.matrix;
    }

    /// Real matrix used by the solver; complex kernels stack Re over Im.
    #[must_use]
    pub fn real_matrix(&self) -> DMatrix<f64> {
        let (n, m) = self.matrix.shape();
        if self.kind.is_complex() {
            DMatrix::from_fn(2 * n, m, |i, j| {
                if i < n {
                    self.matrix[(i, j)].re
                } else {
                    self.matrix[(i - n, j)].im
                }
            })
        } else {
            self.matrix.map(|z| z.re)
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn bosonic_kernel_limits() {
        let k = Kernel::new(KernelKind::FreqBosonic, &[0.0, 1.0], &[0.0, 1.0, 3.0]);
        assert_eq!(k.matrix()[(0, 0)].re, 1.0);
        assert_eq!(k.matrix()[(0, 2)].re, 1.0);
        assert_eq!(k.matrix()[(1, 0)].re, 0.0);
        assert!((k.matrix()[(1, 1)].re - 0.5).abs() < 1e-15);
    }

    #[test]
    fn time_kernel_is_stable_for_large_beta_omega() {
        let beta = 200.0;
        let k = Kernel::new(KernelKind::TimeFermionic { beta }, &[0.0, beta], &[-50.0, 50.0]);
        assert!(k.matrix().iter().all(|z| z.re.is_finite()));
        // K(0, ω) = 1 − n_F(ω) and K(β, ω) = n_F(ω).
        assert!((k.matrix()[(0, 1)].re - 1.0).abs() < 1e-12);
        assert!((k.matrix()[(1, 0)].re - 1.0).abs() < 1e-12);
    }

    #[test]
    fn fermionic_real_matrix_stacks_parts() {
        let k = Kernel::new(KernelKind::FreqFermionic, &[1.0], &[0.5]);
        let r = k.real_matrix();
        assert_eq!(r.shape(), (2, 1));
        let z = 1.0 / Complex64::new(-0.5, 1.0);
        assert!((r[(0, 0)] - z.re).abs() < 1e-15);
        assert!((r[(1, 0)] - z.im).abs() < 1e-15);
    }

    #[test]
    fn blur_preserves_norm_of_wide_spectrum() {
        let w: Vec<f64> = (0..401).map(|i| -10.0 + 0.05 * i as f64).collect();
        let a: Vec<f64> = w.iter().map(|x| (-x * x / 2.0).exp()).collect();
        let mut k = Kernel::new(KernelKind::FreqFermionic, &[1.0], &w);
        k.preblur(0.3);
        let b = k.blur(&a);
        let s0 = crate::numerics::trapz(&a, &w);
        let s1 = crate::numerics::trapz(&b, &w);
        assert!((s0 - s1).abs() < 1e-4);
    }
}
