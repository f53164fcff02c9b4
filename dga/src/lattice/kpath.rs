// SPDX-License-Identifier: AGPL-3.0-only

//! High-symmetry paths through a momentum grid.
//!
//! A path is written as dash-separated point names, e.g. `Gamma-X-M2-Gamma`.
//! Points are given in fractions of a reciprocal lattice vector and snapped
//! to the nearest grid index, so every path point is an actual grid point.

use super::brillouin::KGrid;
use crate::error::{DgaError, Result};

fn named_point(name: &str) -> Option<[f64; 3]> {
    Some(match name {
        "Gamma" | "G" => [0.0, 0.0, 0.0],
        "X" => [0.5, 0.0, 0.0],
        "Y" => [0.0, 0.5, 0.0],
        "M" => [0.5, 0.5, 0.0],
        "M2" => [0.25, 0.25, 0.0],
        "Z" => [0.0, 0.0, 0.5],
        "R" => [0.5, 0.0, 0.5],
        "A" => [0.5, 0.5, 0.5],
        _ => return None,
    })
}

/// Grid path through named high-symmetry points.
#[derive(Clone, Debug)]
pub struct KPath {
    /// Original path string.
    pub path: String,
    /// Flat grid index of each path point.
    pub ik: Vec<usize>,
    /// Cumulative path length (in units of 2π) at each point.
    pub k_axis: Vec<f64>,
    /// Positions in `ik` of the named corner points.
    pub corners: Vec<usize>,
    /// Corner labels.
    pub labels: Vec<String>,
}

impl KPath {
    /// Trace `path` on `grid`.
    ///
    /// # Errors
    ///
    /// [`DgaError::InvalidArgument`] for unknown point names or paths with
    /// fewer than two points.
    pub fn new(path: &str, grid: &KGrid) -> Result<Self> {
        let labels: Vec<String> = path.split('-').map(str::to_string).collect();
        if labels.len() < 2 {
            return Err(DgaError::InvalidArgument(format!(
                "k-path '{path}' needs at least two points"
            )));
        }
        let points = labels
            .iter()
            .map(|l| named_point(l).ok_or_else(|| DgaError::InvalidArgument(format!("unknown k-point '{l}'"))))
            .collect::<Result<Vec<_>>>()?;
        let nk = grid.nk();
        let mut ik = Vec::new();
        let mut frac_path: Vec<[f64; 3]> = Vec::new();
        let mut corners = Vec::new();
        for (seg, pair) in points.windows(2).enumerate() {
            let (start, end) = (pair[0], pair[1]);
            let steps = (0..3)
                .map(|d| ((end[d] - start[d]) * nk[d] as f64).abs().round() as usize)
                .max()
                .unwrap_or(0)
                .max(1);
            corners.push(ik.len());
            let last = seg + 2 == points.len();
            let n_points = if last { steps + 1 } else { steps };
            for s in 0..n_points {
                let t = s as f64 / steps as f64;
                let frac: [f64; 3] = [0, 1, 2].map(|d| start[d] + t * (end[d] - start[d]));
                let idx = [0, 1, 2].map(|d| {
                    let i = (frac[d] * nk[d] as f64).round() as i64;
                    i.rem_euclid(nk[d] as i64) as usize
                });
                ik.push(grid.ravel(idx));
                frac_path.push(frac);
            }
        }
        corners.push(ik.len() - 1);
        let mut k_axis = Vec::with_capacity(frac_path.len());
        let mut acc = 0.0;
        for (i, f) in frac_path.iter().enumerate() {
            if i > 0 {
                let p = frac_path[i - 1];
                acc += ((f[0] - p[0]).powi(2) + (f[1] - p[1]).powi(2) + (f[2] - p[2]).powi(2)).sqrt();
            }
            k_axis.push(acc);
        }
        Ok(Self {
            path: path.to_string(),
            ik,
            k_axis,
            corners,
            labels,
        })
    }

    /// Number of points on the path.
    #[must_use]
    pub fn len(&self) -> usize {
        self.ik.len()
    }

    /// Whether the path is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.ik.is_empty()
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn gamma_x_m_gamma_on_8x8() {
        let grid = KGrid::new([8, 8, 1], vec![]).unwrap();
        let path = KPath::new("Gamma-X-M-Gamma", &grid).unwrap();
        // 4 + 4 + 4 steps plus the closing point
        assert_eq!(path.len(), 13);
        assert_eq!(path.ik[0], 0);
        assert_eq!(grid.unravel(path.ik[4]), [4, 0, 0]);
        assert_eq!(grid.unravel(path.ik[8]), [4, 4, 0]);
        assert_eq!(*path.ik.last().unwrap(), 0);
        assert_eq!(path.corners, vec![0, 4, 8, 12]);
        assert!(path.k_axis.windows(2).all(|w| w[1] > w[0]));
    }

    #[test]
    fn unknown_point_is_rejected() {
        let grid = KGrid::new([4, 4, 1], vec![]).unwrap();
        assert!(KPath::new("Gamma-Q", &grid).is_err());
        assert!(KPath::new("Gamma", &grid).is_err());
    }
}
