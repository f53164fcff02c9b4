// SPDX-License-Identifier: AGPL-3.0-only

//! Real-frequency meshes and default models.

use serde::{Deserialize, Serialize};

use crate::error::{DgaError, Result};
use crate::numerics::trapz;

/// Angle at which the tan mesh is truncated.
const TAN_MESH_EDGE: f64 = std::f64::consts::PI / 2.1;

/// Real-frequency mesh layout.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MeshType {
    /// Equidistant on [−w_max, w_max].
    Linear,
    /// tan-compressed around ω = 0 on [−w_max, w_max].
    #[default]
    Tan,
    /// tan-compressed on [0, w_max] (bosonic spectra).
    TanPositive,
}

fn linspace(a: f64, b: f64, n: usize) -> Vec<f64> {
    if n == 1 {
        return vec![a];
    }
    (0..n)
        .map(|i| a + (b - a) * i as f64 / (n - 1) as f64)
        .collect()
}

/// Build a mesh of `nw` points.
///
/// # Errors
///
/// [`DgaError::InvalidArgument`] for fewer than two points or non-positive
/// `w_max`.
pub fn real_mesh(kind: MeshType, w_max: f64, nw: usize) -> Result<Vec<f64>> {
    if nw < 2 || w_max <= 0.0 {
        return Err(DgaError::InvalidArgument(format!(
            "real-frequency mesh needs nw ≥ 2 and w_max > 0, got nw={nw}, w_max={w_max}"
        )));
    }
    let norm = TAN_MESH_EDGE.tan();
    Ok(match kind {
        MeshType::Linear => linspace(-w_max, w_max, nw),
        MeshType::Tan => linspace(-TAN_MESH_EDGE, TAN_MESH_EDGE, nw)
            .into_iter()
            .map(|x| w_max * x.tan() / norm)
            .collect(),
        MeshType::TanPositive => linspace(0.0, TAN_MESH_EDGE, nw)
            .into_iter()
            .map(|x| w_max * x.tan() / norm)
            .collect(),
    })
}

/// Flat model with unit norm.
#[must_use]
pub fn flat_model(w: &[f64]) -> Vec<f64> {
    normalise(vec![1.0; w.len()], w, 1.0)
}

/// Gaussian model exp(−ω²/σ²) with integral `norm`.
#[must_use]
pub fn gaussian_model(w: &[f64], sigma: f64, norm: f64) -> Vec<f64> {
    let m = w.iter().map(|x| (-(x * x) / (sigma * sigma)).exp()).collect();
    normalise(m, w, norm)
}

fn normalise(mut model: Vec<f64>, w: &[f64], norm: f64) -> Vec<f64> {
    let integral = trapz(&model, w);
    if integral > 0.0 {
        model.iter_mut().for_each(|m| *m *= norm / integral);
    }
    model
}
