// SPDX-License-Identifier: AGPL-3.0-only

//! Post-processing of converged DΓA quantities.
//!
//! - Low-frequency polynomial extrapolation of Σ(k, iν) or G(k, iν)
//! - MaxEnt continuation of χ(q, iω) along a high-symmetry path

use num_complex::Complex64;
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::ana_cont::{
    gaussian_model, real_mesh, AlphaDetermination, Chi2KinkScan, KernelKind, MaxentOptions,
    MaxentSolverSvd, MeshType, Noise,
};
use crate::error::{ensure_len, DgaError, Result};
use crate::field::KField;
use crate::four_point::StoredSusceptibility;
use crate::lattice::{KGrid, KPath};
use crate::matsubara::fermionic_frequencies;
use crate::numerics::{polyfit, polyval};

/// Number of frequencies and polynomial order of the low-frequency fit.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PolyFitSettings {
    /// Positive Matsubara frequencies entering the fit.
    pub n_fit: usize,
    /// Polynomial order.
    pub o_fit: usize,
}

impl Default for PolyFitSettings {
    fn default() -> Self {
        Self { n_fit: 4, o_fit: 3 }
    }
}

/// Extrapolation ν → 0 of a momentum-resolved Matsubara function.
///
/// `z` and `scattering_rate` are only meaningful for a self-energy:
/// Z = 1/(1 − ∂Im Σ/∂ν) and Γ = −Im Σ(ν → 0).
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct PolyFitResult {
    /// Momentum grid.
    pub nk: [usize; 3],
    /// Extrapolated real part per k.
    pub re: Vec<f64>,
    /// Extrapolated imaginary part per k.
    pub im: Vec<f64>,
    /// Quasiparticle weight per k.
    pub z: Vec<f64>,
    /// Scattering rate per k.
    pub scattering_rate: Vec<f64>,
}

impl PolyFitResult {
    /// Extrapolated values as complex numbers.
    #[must_use]
    pub fn extrapolated(&self) -> Vec<Complex64> {
        self.re
            .iter()
            .zip(&self.im)
            .map(|(&re, &im)| Complex64::new(re, im))
            .collect()
    }
}

/// Fit real and imaginary parts over the first `n_fit` positive frequencies
/// of a full-range field and evaluate at ν = 0.
///
/// # Errors
///
/// [`DgaError::InvalidArgument`] when `n_fit` cannot determine a polynomial
/// of order `o_fit`, [`DgaError::FrequencyBox`] when the field holds fewer
/// than `n_fit` positive frequencies.
pub fn poly_fit(field: &KField, beta: f64, settings: PolyFitSettings) -> Result<PolyFitResult> {
    let PolyFitSettings { n_fit, o_fit } = settings;
    if n_fit <= o_fit {
        return Err(DgaError::InvalidArgument(format!(
            "poly fit with order {o_fit} needs more than {n_fit} points"
        )));
    }
    let niv = field.nfreq() / 2;
    if niv < n_fit {
        return Err(DgaError::FrequencyBox(format!(
            "poly fit over {n_fit} frequencies but only {niv} are available"
        )));
    }
    let x: Vec<f64> = fermionic_frequencies(beta, niv)[niv..niv + n_fit].to_vec();
    let fits = (0..field.nk_tot())
        .map(|ik| {
            let row = &field.row(ik)[niv..niv + n_fit];
            let re: Vec<f64> = row.iter().map(|z| z.re).collect();
            let im: Vec<f64> = row.iter().map(|z| z.im).collect();
            let c_re = polyfit(&x, &re, o_fit)?;
            let c_im = polyfit(&x, &im, o_fit)?;
            Ok((polyval(&c_re, 0.0), c_im))
        })
        .collect::<Result<Vec<_>>>()?;
    let mut out = PolyFitResult {
        nk: field.nk(),
        re: Vec::with_capacity(fits.len()),
        im: Vec::with_capacity(fits.len()),
        z: Vec::with_capacity(fits.len()),
        scattering_rate: Vec::with_capacity(fits.len()),
    };
    for (re0, c_im) in fits {
        let im0 = c_im[0];
        let slope = c_im.get(1).copied().unwrap_or(0.0);
        out.re.push(re0);
        out.im.push(im0);
        out.z.push(1.0 / (1.0 - slope));
        out.scattering_rate.push(-im0);
    }
    Ok(out)
}

/// Parameters of the k-path susceptibility continuation.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SusceptibilityContinuation {
    /// Largest real frequency.
    pub w_max: f64,
    /// Real-frequency points.
    pub nw: usize,
    /// Constant error of the Matsubara data.
    pub err: f64,
    /// Width of the Gaussian default model.
    pub sigma: f64,
    /// Positive bosonic frequencies used; `None` takes all.
    pub ncut: Option<usize>,
    /// Extra λ applied before continuation.
    pub lambda_add: f64,
    /// High-symmetry path.
    pub path: String,
    /// Preblur width (0 disables it).
    pub blur_width: f64,
    /// α strategy.
    pub alpha_determination: AlphaDetermination,
    /// chi2kink scan.
    pub chi2kink: Chi2KinkScan,
}

impl Default for SusceptibilityContinuation {
    fn default() -> Self {
        Self {
            w_max: 15.0,
            nw: 501,
            err: 0.01,
            sigma: 4.0,
            ncut: Some(10),
            lambda_add: 0.0,
            path: "Gamma-X-M2-Gamma".to_string(),
            blur_width: 0.0,
            alpha_determination: AlphaDetermination::Chi2kink,
            chi2kink: Chi2KinkScan {
                alpha_start: 1e12,
                alpha_end: 1e-3,
                alpha_div: 10.0,
                fit_position: 2.0,
            },
        }
    }
}

impl SusceptibilityContinuation {
    /// Output folder name encoding the main parameters.
    #[must_use]
    pub fn folder_name(&self) -> String {
        format!(
            "ChiCont_nw_{}_err_{}_sigma_{}_lambda_{}",
            self.nw, self.err, self.sigma, self.lambda_add
        )
    }
}

/// Spectra along the path.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ContinuedSusceptibility {
    /// Path string.
    pub path: String,
    /// Cumulative path coordinate.
    pub k_axis: Vec<f64>,
    /// Positions of the corner points on the path.
    pub corners: Vec<usize>,
    /// Corner labels.
    pub labels: Vec<String>,
    /// Real frequencies.
    pub w: Vec<f64>,
    /// Positive Matsubara frequencies used.
    pub iw: Vec<f64>,
    /// Re χ(q, iω) along the path (input data).
    pub chi_matsubara: Vec<Vec<f64>>,
    /// Spectrum per path point.
    pub spectra: Vec<Vec<f64>>,
    /// Backtransformed data per path point.
    pub backtransform: Vec<Vec<f64>>,
    /// Chosen α per path point.
    pub alpha_opt: Vec<f64>,
}

/// Continue χ(q, iω ≥ 0) to the real axis at every point of a k-path.
///
/// # Errors
///
/// Path errors, a non-positive static susceptibility or MaxEnt failures.
pub fn continue_susceptibility(chi: &StoredSusceptibility, settings: &SusceptibilityContinuation) -> Result<ContinuedSusceptibility> {
    let values = chi.chi.to_vec()?;
    let nq_tot: usize = chi.nq.iter().product();
    let nw_b = chi.wn.len();
    ensure_len("susceptibility values", nq_tot * nw_b, values.len())?;
    let niw = nw_b / 2;
    let ncut = settings.ncut.unwrap_or(niw + 1).min(niw + 1);
    let iw: Vec<f64> = (0..ncut)
        .map(|m| 2.0 * m as f64 * std::f64::consts::PI / chi.beta)
        .collect();

    let grid = KGrid::new(chi.nq, vec![])?;
    let path = KPath::new(&settings.path, &grid)?;
    let w = real_mesh(MeshType::TanPositive, settings.w_max, settings.nw)?;
    let options = MaxentOptions {
        alpha_determination: settings.alpha_determination,
        blur_width: settings.blur_width,
        chi2kink: settings.chi2kink,
        ..MaxentOptions::default()
    };
    info!(path = %settings.path, n_points = path.len(), ncut, "continuing susceptibility");

    let data: Vec<Vec<Complex64>> = path
        .ik
        .iter()
        .map(|&iq| {
            values[iq * nw_b + niw..iq * nw_b + niw + ncut]
                .iter()
                .map(|&c| {
                    if settings.lambda_add == 0.0 {
                        c
                    } else {
                        1.0 / (1.0 / c + settings.lambda_add)
                    }
                })
                .collect()
        })
        .collect();

    let results = data
        .par_iter()
        .map(|d| {
            let static_chi = d[0].re;
            if static_chi <= 0.0 {
                return Err(DgaError::InvalidArgument(format!(
                    "static susceptibility {static_chi} is not positive"
                )));
            }
            let model = gaussian_model(&w, settings.sigma, static_chi);
            let noise = Noise::Stdev(vec![settings.err; d.len()]);
            let solver = MaxentSolverSvd::new(KernelKind::FreqBosonic, &iw, &w, d, &noise, &model, options)?;
            solver.solve()
        })
        .collect::<Result<Vec<_>>>()?;

    Ok(ContinuedSusceptibility {
        path: path.path.clone(),
        k_axis: path.k_axis.clone(),
        corners: path.corners.clone(),
        labels: path.labels.clone(),
        w,
        iw,
        chi_matsubara: data.iter().map(|d| d.iter().map(|c| c.re).collect()).collect(),
        alpha_opt: results.iter().map(|s| s.alpha_opt).collect(),
        backtransform: results
            .iter()
            .map(|s| s.backtransform.iter().map(|c| c.re).collect())
            .collect(),
        spectra: results.into_iter().map(|s| s.a_opt).collect(),
    })
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::io::ComplexArray;

    #[test]
    fn linear_self_energy_gives_exact_z() {
        // Σ(iν) = a + i(−γ − s ν) on every k.
        let (beta, a, gamma, s) = (20.0, 0.3, 0.05, 0.4);
        let niv = 6;
        let row: Vec<Complex64> = fermionic_frequencies(beta, niv)
            .iter()
            .map(|&v| Complex64::new(a, -gamma * v.signum() - s * v))
            .collect();
        let field = KField::broadcast([2, 2, 1], &row);
        let fit = poly_fit(&field, beta, PolyFitSettings { n_fit: 4, o_fit: 1 }).unwrap();
        assert!((fit.re[3] - a).abs() < 1e-12);
        assert!((fit.scattering_rate[0] - gamma).abs() < 1e-10);
        assert!((fit.z[1] - 1.0 / (1.0 + s)).abs() < 1e-10);
        assert_eq!(fit.extrapolated().len(), 4);
    }

    #[test]
    fn poly_fit_rejects_underdetermined_fit() {
        let field = KField::zeros([1, 1, 1], 8);
        assert!(poly_fit(&field, 10.0, PolyFitSettings { n_fit: 3, o_fit: 3 }).is_err());
        assert!(poly_fit(&field, 10.0, PolyFitSettings { n_fit: 5, o_fit: 2 }).is_err());
    }

    fn single_mode_chi(nq: [usize; 3], beta: f64, niw: usize, omega0: f64) -> StoredSusceptibility {
        // χ(iω) = 2ω₀/(ω² + ω₀²): a single undamped mode at ω₀ with χ(0) = 2/ω₀.
        let wn: Vec<i64> = (-(niw as i64)..=niw as i64).collect();
        let row: Vec<Complex64> = wn
            .iter()
            .map(|&m| {
                let w = 2.0 * m as f64 * std::f64::consts::PI / beta;
                Complex64::new(2.0 * omega0 / (w * w + omega0 * omega0), 0.0)
            })
            .collect();
        let nq_tot: usize = nq.iter().product();
        let values: Vec<Complex64> = (0..nq_tot).flat_map(|_| row.clone()).collect();
        StoredSusceptibility {
            channel: crate::four_point::Channel::Magnetic,
            beta,
            nq,
            wn,
            chi: ComplexArray::from_slice(&values),
        }
    }

    #[test]
    fn continuation_along_path_has_expected_shape() {
        let chi = single_mode_chi([4, 4, 1], 5.0, 12, 1.0);
        let settings = SusceptibilityContinuation {
            nw: 81,
            w_max: 8.0,
            err: 1e-3,
            ncut: Some(8),
            path: "Gamma-X".to_string(),
            ..SusceptibilityContinuation::default()
        };
        let out = continue_susceptibility(&chi, &settings).unwrap();
        assert_eq!(out.spectra.len(), 3);
        assert_eq!(out.iw.len(), 8);
        assert_eq!(out.spectra[0].len(), 81);
        assert!(out.spectra[0].iter().all(|a| *a >= 0.0));
        assert!(settings.folder_name().starts_with("ChiCont_nw_81"));
    }

    #[test]
    fn negative_static_susceptibility_is_rejected() {
        let mut chi = single_mode_chi([2, 2, 1], 5.0, 4, 1.0);
        chi.chi.re.iter_mut().for_each(|x| *x = -*x);
        let settings = SusceptibilityContinuation {
            path: "Gamma-X".to_string(),
            ..SusceptibilityContinuation::default()
        };
        assert!(continue_susceptibility(&chi, &settings).is_err());
    }
}
