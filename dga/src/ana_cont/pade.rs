// SPDX-License-Identifier: AGPL-3.0-only

//! Padé continuation with the Vidberg–Serene continued fraction.
//!
//! C(z) = a₀ / (1 + a₁(z − z₀) / (1 + a₂(z − z₁) / …)) interpolates the input
//! points exactly and is evaluated with the three-term recursion
//! A_{n+1} = A_n + (z − z_n) a_{n+1} A_{n−1} (same for B), C = A_N / B_N.

use num_complex::Complex64;

use crate::error::{ensure_len, DgaError, Result};

/// Spectrum and retarded function on the real axis.
#[derive(Clone, Debug)]
pub struct PadeSolution {
    /// Numerator A_N(ω + iη).
    pub numerator: Vec<Complex64>,
    /// Denominator B_N(ω + iη).
    pub denominator: Vec<Complex64>,
    /// Retarded function A_N / B_N.
    pub g_ret: Vec<Complex64>,
    /// −Im g_ret / π.
    pub a_opt: Vec<f64>,
}

/// Continued-fraction interpolant through (iν_i, G(iν_i)).
#[derive(Clone, Debug)]
pub struct PadeSolver {
    points: Vec<Complex64>,
    coefficients: Vec<Complex64>,
    re_axis: Vec<f64>,
}

impl PadeSolver {
    /// Compute the coefficients from data on the positive imaginary axis.
    ///
    /// # Errors
    ///
    /// Shape errors, empty input, or a vanishing intermediate value that
    /// breaks the recursion (duplicate points or exactly interpolated data).
    pub fn new(im_axis: &[f64], re_axis: &[f64], im_data: &[Complex64]) -> Result<Self> {
        ensure_len("pade data", im_axis.len(), im_data.len())?;
        if im_axis.is_empty() {
            return Err(DgaError::InvalidArgument("pade needs at least one point".into()));
        }
        let points: Vec<Complex64> = im_axis.iter().map(|&x| Complex64::new(0.0, x)).collect();
        let coefficients = compute_coefficients(&points, im_data)?;
        Ok(Self {
            points,
            coefficients,
            re_axis: re_axis.to_vec(),
        })
    }

    /// Continued-fraction coefficients a_i.
    #[must_use]
    pub fn coefficients(&self) -> &[Complex64] {
        &self.coefficients
    }

    /// Numerator and denominator at `z`.
    #[must_use]
    pub fn evaluate_parts(&self, z: Complex64) -> (Complex64, Complex64) {
        let one = Complex64::new(1.0, 0.0);
        let (mut a_prev, mut a) = (Complex64::new(0.0, 0.0), self.coefficients[0]);
        let (mut b_prev, mut b) = (one, one);
        for n in 0..self.coefficients.len() - 1 {
            let factor = (z - self.points[n]) * self.coefficients[n + 1];
            let a_next = a + factor * a_prev;
            let b_next = b + factor * b_prev;
            a_prev = a;
            b_prev = b;
            a = a_next;
            b = b_next;
        }
        (a, b)
    }

    /// Interpolant at `z`.
    #[must_use]
    pub fn evaluate(&self, z: Complex64) -> Complex64 {
        let (a, b) = self.evaluate_parts(z);
        a / b
    }

    /// Interpolant on the imaginary axis, for checking that it passes
    /// smoothly through the input. Defaults to 500 points on [0, 2 max iν].
    #[must_use]
    pub fn check(&self, im_axis_fine: Option<&[f64]>) -> (Vec<f64>, Vec<Complex64>) {
        let grid: Vec<f64> = im_axis_fine.map_or_else(
            || {
                let top = 2.0 * self.points.iter().map(|z| z.im).fold(0.0, f64::max);
                (0..500).map(|i| top * i as f64 / 499.0).collect()
            },
            <[f64]>::to_vec,
        );
        let values = grid.iter().map(|&x| self.evaluate(Complex64::new(0.0, x))).collect();
        (grid, values)
    }

    /// Evaluate on ω + iη along the real axis.
    #[must_use]
    pub fn solve(&self, eta: f64) -> PadeSolution {
        let (numerator, denominator): (Vec<_>, Vec<_>) = self
            .re_axis
            .iter()
            .map(|&w| self.evaluate_parts(Complex64::new(w, eta)))
            .unzip();
        let g_ret: Vec<Complex64> = numerator.iter().zip(&denominator).map(|(a, b)| a / b).collect();
        let a_opt = g_ret.iter().map(|g| -g.im / std::f64::consts::PI).collect();
        PadeSolution {
            numerator,
            denominator,
            g_ret,
            a_opt,
        }
    }
}

fn compute_coefficients(z: &[Complex64], u: &[Complex64]) -> Result<Vec<Complex64>> {
    let n = z.len();
    let mut g = u.to_vec();
    let mut a = Vec::with_capacity(n);
    a.push(g[0]);
    for p in 1..n {
        let (zp, gp) = (z[p - 1], g[p - 1]);
        for i in p..n {
            let denom = (z[i] - zp) * g[i];
            if denom.norm() == 0.0 {
                return Err(DgaError::SingularMatrix(format!("pade recursion at order {p}")));
            }
            g[i] = (gp - g[i]) / denom;
        }
        a.push(g[p]);
    }
    Ok(a)
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::tolerances::PADE_INTERPOLATION;

    #[test]
    fn interpolates_input_points() {
        let iw: Vec<f64> = (0..4).map(|n| (2 * n + 1) as f64 * std::f64::consts::PI / 10.0).collect();
        let data: Vec<Complex64> = iw
            .iter()
            .map(|&v| 0.5 / Complex64::new(-0.3, v) + 0.5 / Complex64::new(0.7, v))
            .collect();
        let pade = PadeSolver::new(&iw, &[0.0], &data).unwrap();
        for (&v, d) in iw.iter().zip(&data) {
            assert!((pade.evaluate(Complex64::new(0.0, v)) - d).norm() < PADE_INTERPOLATION);
        }
    }

    #[test]
    fn recovers_lorentzian_on_real_axis() {
        // G(z) = 1/(z − ε + iΓ) is rational, so the continuation is exact.
        let (eps, gamma) = (0.4, 0.2);
        let iw: Vec<f64> = (0..2).map(|n| (2 * n + 1) as f64 * std::f64::consts::PI / 20.0).collect();
        let data: Vec<Complex64> = iw.iter().map(|&v| 1.0 / Complex64::new(-eps, v + gamma)).collect();
        let w = vec![-1.0, 0.0, 0.4, 1.0];
        let sol = PadeSolver::new(&iw, &w, &data).unwrap().solve(0.0);
        for (&x, a) in w.iter().zip(&sol.a_opt) {
            let exact = gamma / std::f64::consts::PI / ((x - eps).powi(2) + gamma * gamma);
            assert!((a - exact).abs() < 1e-6, "{x}: {a} vs {exact}");
        }
    }

    #[test]
    fn default_check_grid() {
        let pade = PadeSolver::new(&[1.0, 2.0], &[], &[Complex64::new(0.0, -1.0), Complex64::new(0.0, -0.5)]).unwrap();
        let (grid, values) = pade.check(None);
        assert_eq!(grid.len(), 500);
        assert!((grid[499] - 4.0).abs() < 1e-12);
        assert_eq!(values.len(), 500);
    }
}
