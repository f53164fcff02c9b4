// SPDX-License-Identifier: AGPL-3.0-only

//! Maximum-entropy continuation in the singular space of the kernel.
//!
//! The kernel is decomposed K = U Ξ Vᵀ and only singular values above
//! [`SVD_CUTOFF`] are kept. The spectrum is parametrised as
//! A = D e^{V u} (positive spectra) or A = D e^{V u} − D e^{−V u}
//! (off-diagonal spectra with zero norm), which keeps A positive by
//! construction and reduces the stationarity condition of
//! Q = α S − χ²/2 to a root search in the n_sv-dimensional vector u.

use std::cell::RefCell;

use nalgebra::{DMatrix, DVector};
use num_complex::Complex64;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use super::kernel::{Kernel, KernelKind};
use super::newton::newton_root;
use crate::error::{DgaError, Result};
use crate::numerics::{curve_fit, levenberg_marquardt_with_jacobian, secant, trapz_weights};
use crate::tolerances::{ALPHA_ROOT_TOL, BRYAN_PROBABILITY_CUTOFF, SECANT_MAX_ITER, SVD_CUTOFF};

/// Noise model of the input data.
#[derive(Clone, Debug)]
pub enum Noise {
    /// Independent errors per data point.
    Stdev(Vec<f64>),
    /// Full covariance matrix.
    Covariance(DMatrix<f64>),
}

/// Root finder for the stationarity condition at fixed α.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Optimizer {
    /// Damped Newton with linear mixing.
    #[default]
    Newton,
    /// Levenberg–Marquardt on |f(u)|².
    Lm,
}

/// Strategy for choosing the regularisation weight α.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AlphaDetermination {
    /// χ² ≈ number of data points.
    Historic,
    /// Maximum of the Bayesian posterior (convergence criterion = 1).
    Classic,
    /// Posterior-weighted average over α.
    Bryan,
    /// Kink of log χ² versus log α.
    #[default]
    Chi2kink,
}

/// α scan used by [`AlphaDetermination::Chi2kink`].
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Chi2KinkScan {
    /// First (largest) α.
    pub alpha_start: f64,
    /// Scan stops below this α.
    pub alpha_end: f64,
    /// Ratio between consecutive α.
    pub alpha_div: f64,
    /// Distance from the inflection point in units of the logistic width;
    /// smaller values underfit.
    pub fit_position: f64,
}

impl Default for Chi2KinkScan {
    fn default() -> Self {
        Self {
            alpha_start: 1e9,
            alpha_end: 1e-3,
            alpha_div: 10.0,
            fit_position: 2.5,
        }
    }
}

/// α scan used by [`AlphaDetermination::Bryan`].
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BryanScan {
    /// First α.
    pub alpha_start: f64,
    /// Ratio between consecutive α.
    pub alpha_div: f64,
}

impl Default for BryanScan {
    fn default() -> Self {
        Self {
            alpha_start: 500.0,
            alpha_div: 1.1,
        }
    }
}

/// Solver options.
#[derive(Clone, Copy, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MaxentOptions {
    /// Root finder.
    pub optimizer: Optimizer,
    /// α strategy.
    pub alpha_determination: AlphaDetermination,
    /// Spectrum has zero norm and both signs.
    pub offdiag: bool,
    /// Width of the preblur Gaussian; 0 disables it.
    pub blur_width: f64,
    /// chi2kink scan.
    pub chi2kink: Chi2KinkScan,
    /// Bryan scan.
    pub bryan: BryanScan,
}

/// Bayesian diagnostics of one optimisation.
#[derive(Clone, Copy, Debug, Serialize, Deserialize)]
pub struct BayesQuantities {
    /// −2αS.
    pub n_good: f64,
    /// Σ λ/(α + λ).
    pub trace: f64,
    /// trace / n_good; equals 1 at the classic optimum.
    pub convergence: f64,
    /// log of the posterior probability of α (positive spectra only).
    pub log_probability: Option<f64>,
}

/// Outcome of one optimisation at fixed α.
#[derive(Clone, Debug)]
pub struct OptimizationResult {
    /// Regularisation weight.
    pub alpha: f64,
    /// Singular-space solution.
    pub u_opt: DVector<f64>,
    /// Spectrum (blurred when preblur is active).
    pub a_opt: Vec<f64>,
    /// Entropy S.
    pub entropy: f64,
    /// Misfit χ².
    pub chi2: f64,
    /// ∫ A dω.
    pub norm: f64,
    /// α S − χ²/2.
    pub q: f64,
    /// Data reconstructed from the spectrum.
    pub backtransform: Vec<Complex64>,
    /// Preblur width in use.
    pub blur_width: f64,
    /// Optimiser iterations.
    pub nfev: usize,
    /// Present when requested.
    pub bayes: Option<BayesQuantities>,
}

/// Final spectrum and the α history that led to it.
#[derive(Clone, Debug)]
pub struct MaxentSolution {
    /// Chosen α (NaN for Bryan averages).
    pub alpha_opt: f64,
    /// Optimal spectrum.
    pub a_opt: Vec<f64>,
    /// Data reconstructed from `a_opt`.
    pub backtransform: Vec<Complex64>,
    /// Result at `alpha_opt` (absent for Bryan averages).
    pub optimum: Option<OptimizationResult>,
    /// Every optimisation performed.
    pub history: Vec<OptimizationResult>,
}

/// Singular-space MaxEnt solver for one data set.
#[derive(Clone, Debug)]
pub struct MaxentSolverSvd {
    options: MaxentOptions,
    re_axis: Vec<f64>,
    dw: DVector<f64>,
    model: DVector<f64>,
    kernel: Kernel,
    ucov: DMatrix<f64>,
    k_real: DMatrix<f64>,
    data: DVector<f64>,
    e: DVector<f64>,
    v_svd: DMatrix<f64>,
    m2: DMatrix<f64>,
    evi: DVector<f64>,
    d2chi2: DMatrix<f64>,
}

impl MaxentSolverSvd {
    /// Prepare the singular-space problem.
    ///
    /// `model` must already be normalised.
    ///
    /// # Errors
    ///
    /// Shape errors, a failed SVD or a kernel without significant singular
    /// values.
    pub fn new(kind: KernelKind, im_axis: &[f64], re_axis: &[f64], im_data: &[Complex64], noise: &Noise, model: &[f64], options: MaxentOptions) -> Result<Self> {
        let niw = im_axis.len();
        let nw = re_axis.len();
        crate::error::ensure_len("maxent data", niw, im_data.len())?;
        crate::error::ensure_len("maxent model", nw, model.len())?;

        let (var, ucov) = match noise {
            Noise::Stdev(s) => {
                crate::error::ensure_len("maxent stdev", niw, s.len())?;
                (s.iter().map(|x| x * x).collect::<Vec<_>>(), DMatrix::identity(niw, niw))
            }
            Noise::Covariance(c) => {
                crate::error::ensure_len("maxent covariance", niw, c.nrows())?;
                let eig = c.clone().symmetric_eigen();
                (eig.eigenvalues.iter().map(|v| v.abs()).collect(), eig.eigenvectors)
            }
        };
        let rotated: Vec<Complex64> = {
            let uc = ucov.map(|v| Complex64::new(v, 0.0));
            (uc.transpose() * DVector::from_column_slice(im_data)).iter().copied().collect()
        };

        let mut kernel = Kernel::new(kind, im_axis, re_axis);
        kernel.preblur(options.blur_width);
        kernel.rotate(&ucov);

        let (data, var) = if kind.is_complex() {
            let mut d: Vec<f64> = rotated.iter().map(|z| z.re).collect();
            d.extend(rotated.iter().map(|z| z.im));
            let mut v = var.clone();
            v.extend(var);
            (d, v)
        } else {
            (rotated.iter().map(|z| z.re).collect(), var)
        };
        if var.iter().any(|&v| v <= 0.0) {
            return Err(DgaError::InvalidArgument("maxent noise must be positive".into()));
        }
        let e = DVector::from_iterator(var.len(), var.iter().map(|v| 1.0 / v));
        let data = DVector::from_vec(data);
        let k_real = kernel.real_matrix();
        let dw = DVector::from_vec(trapz_weights(re_axis));

        let svd = k_real.clone().svd(true, true);
        let (Some(u_full), Some(vt_full)) = (svd.u.as_ref(), svd.v_t.as_ref()) else {
            return Err(DgaError::SingularMatrix("maxent kernel SVD".into()));
        };
        let mut order: Vec<usize> = (0..svd.singular_values.len()).collect();
        order.sort_by(|&a, &b| svd.singular_values[b].total_cmp(&svd.singular_values[a]));
        let keep: Vec<usize> = order
            .into_iter()
            .filter(|&i| svd.singular_values[i] > SVD_CUTOFF)
            .collect();
        if keep.is_empty() {
            return Err(DgaError::SingularMatrix("maxent kernel has no significant singular values".into()));
        }
        let n_sv = keep.len();
        let u_svd = DMatrix::from_fn(k_real.nrows(), n_sv, |i, j| u_full[(i, keep[j])]);
        let v_svd = DMatrix::from_fn(nw, n_sv, |l, j| vt_full[(keep[j], l)]);
        let xi = DVector::from_iterator(n_sv, keep.iter().map(|&i| svd.singular_values[i]));

        // M = Ξ Uᵀ E U Ξ, M2 = M Vᵀ diag(dw).
        let xu = DMatrix::from_fn(n_sv, k_real.nrows(), |m, k| xi[m] * u_svd[(k, m)]);
        let xue = DMatrix::from_fn(n_sv, k_real.nrows(), |m, k| xu[(m, k)] * e[k]);
        let mm = &xue * xu.transpose();
        let vt_dw = DMatrix::from_fn(n_sv, nw, |m, l| v_svd[(l, m)] * dw[l]);
        let m2 = mm * vt_dw;
        let evi = &xue * &data;

        let kd = DMatrix::from_fn(k_real.nrows(), nw, |k, l| k_real[(k, l)] * dw[l]);
        let ked = DMatrix::from_fn(k_real.nrows(), nw, |k, l| kd[(k, l)] * e[k]);
        let d2chi2 = kd.transpose() * ked;

        info!(nw, niw = k_real.nrows(), n_sv, "maxent singular-space solver ready");
        Ok(Self {
            options,
            re_axis: re_axis.to_vec(),
            dw,
            model: DVector::from_column_slice(model),
            kernel,
            ucov,
            k_real,
            data,
            e,
            v_svd,
            m2,
            evi,
            d2chi2,
        })
    }

    /// Number of retained singular values.
    #[must_use]
    pub fn n_sv(&self) -> usize {
        self.v_svd.ncols()
    }

    /// Number of real data points (doubled for complex kernels).
    #[must_use]
    pub fn n_data(&self) -> usize {
        self.data.len()
    }

    /// Real-frequency axis.
    #[must_use]
    pub fn re_axis(&self) -> &[f64] {
        &self.re_axis
    }

    fn weights(&self, u: &DVector<f64>) -> (DVector<f64>, DVector<f64>) {
        let w = (&self.v_svd * u).map(f64::exp);
        if self.options.offdiag {
            let plus = self.model.component_mul(&w);
            let minus = self.model.component_div(&w);
            (&plus - &minus, plus + minus)
        } else {
            let a = self.model.component_mul(&w);
            (a.clone(), a)
        }
    }

    /// Stationarity condition f(u) and its Jacobian at fixed α.
    #[must_use]
    pub fn compute_f_j(&self, u: &DVector<f64>, alpha: f64) -> (DVector<f64>, DMatrix<f64>) {
        let (a1, a2) = self.weights(u);
        let f = u * alpha + &self.m2 * a1 - &self.evi;
        let scaled_v = DMatrix::from_fn(self.v_svd.nrows(), self.v_svd.ncols(), |l, i| a2[l] * self.v_svd[(l, i)]);
        let n = self.n_sv();
        let j = DMatrix::identity(n, n) * alpha + &self.m2 * scaled_v;
        (f, j)
    }

    /// Spectrum of a singular-space vector.
    #[must_use]
    pub fn singular_to_realspace(&self, u: &DVector<f64>) -> DVector<f64> {
        self.weights(u).0
    }

    /// χ² of a spectrum.
    #[must_use]
    pub fn chi2(&self, a: &DVector<f64>) -> f64 {
        let bt = &self.k_real * a.component_mul(&self.dw);
        (&self.data - bt)
            .iter()
            .zip(self.e.iter())
            .map(|(r, e)| e * r * r)
            .sum()
    }

    /// Entropy of a spectrum relative to the model.
    #[must_use]
    pub fn entropy(&self, a: &DVector<f64>, u: &DVector<f64>) -> f64 {
        if self.options.offdiag {
            a.iter()
                .zip(self.model.iter())
                .zip(self.dw.iter())
                .map(|((&ai, &m), &d)| {
                    let root = (ai * ai + 4.0 * m * m).sqrt();
                    d * (root - 2.0 * m - ai * ((root + ai) / (2.0 * m)).ln())
                })
                .sum()
        } else {
            let vu = &self.v_svd * u;
            a.iter()
                .zip(self.model.iter())
                .zip(self.dw.iter().zip(vu.iter()))
                .map(|((&ai, &m), (&d, &x))| d * (ai - m - ai * x))
                .sum()
        }
    }

    /// Reconstruct the (unrotated) input data from a spectrum.
    #[must_use]
    pub fn backtransform(&self, a: &[f64]) -> Vec<Complex64> {
        let adw = DVector::from_iterator(a.len(), a.iter().zip(self.dw.iter()).map(|(x, d)| Complex64::new(x * d, 0.0)));
        let uc = self.ucov.map(|v| Complex64::new(v, 0.0));
        (uc * (self.kernel.matrix() * adw)).iter().copied().collect()
    }

    fn lambda_eigenvalues(&self, a: &DVector<f64>) -> DVector<f64> {
        let scale: Vec<f64> = if self.options.offdiag {
            a.iter()
                .zip(self.model.iter())
                .zip(self.dw.iter())
                .map(|((&ai, &m), &d)| ((ai * ai + 4.0 * m * m) / (d * d)).powf(0.25))
                .collect()
        } else {
            a.iter()
                .zip(self.dw.iter())
                .map(|(&ai, &d)| if d > 0.0 { (ai / d).abs().sqrt() } else { 0.0 })
                .collect()
        };
        let n = scale.len();
        let lambda = DMatrix::from_fn(n, n, |i, j| scale[i] * self.d2chi2[(i, j)] * scale[j]);
        lambda.symmetric_eigenvalues().map(|l| l.max(0.0))
    }

    fn bayes(&self, a: &DVector<f64>, entropy: f64, chi2: f64, alpha: f64) -> BayesQuantities {
        let lam = self.lambda_eigenvalues(a);
        let n_good = -2.0 * alpha * entropy;
        let trace: f64 = lam.iter().map(|l| l / (alpha + l)).sum();
        let log_probability = (!self.options.offdiag).then(|| {
            let eig_sum: f64 = lam.iter().map(|l| (alpha / (alpha + l)).ln()).sum();
            alpha * entropy - 0.5 * chi2 + alpha.ln() + 0.5 * eig_sum
        });
        BayesQuantities {
            n_good,
            trace,
            convergence: trace / n_good,
            log_probability,
        }
    }

    /// Maximise Q at fixed α starting from `u_start`.
    ///
    /// # Errors
    ///
    /// Optimiser failures (NaN or iteration cap).
    pub fn maxent_optimization(&self, alpha: f64, u_start: &DVector<f64>, use_bayes: bool) -> Result<OptimizationResult> {
        let (u_opt, nfev) = match self.options.optimizer {
            Optimizer::Newton => {
                let r = newton_root(|u| self.compute_f_j(u, alpha), u_start.clone())?;
                (r.x, r.nfev)
            }
            Optimizer::Lm => {
                let residual = |p: &[f64]| -> Vec<f64> {
                    self.compute_f_j(&DVector::from_column_slice(p), alpha).0.iter().copied().collect()
                };
                let jacobian = |p: &[f64]| self.compute_f_j(&DVector::from_column_slice(p), alpha).1;
                let sol = levenberg_marquardt_with_jacobian(residual, jacobian, u_start.as_slice())?;
                (DVector::from_vec(sol.params), sol.iterations)
            }
        };
        let a = self.singular_to_realspace(&u_opt);
        if a.iter().any(|v| !v.is_finite()) {
            return Err(DgaError::NotANumber(format!("maxent spectrum at alpha={alpha}")));
        }
        let entropy = self.entropy(&a, &u_opt);
        let chi2 = self.chi2(&a);
        let norm = a.dot(&self.dw);
        debug!(log10_alpha = alpha.log10(), chi2, entropy, nfev, norm, "maxent optimisation");
        let bayes = use_bayes.then(|| self.bayes(&a, entropy, chi2, alpha));
        let a_raw: Vec<f64> = a.iter().copied().collect();
        Ok(OptimizationResult {
            alpha,
            backtransform: self.backtransform(&a_raw),
            a_opt: self.kernel.blur(&a_raw),
            u_opt,
            entropy,
            chi2,
            norm,
            q: alpha * entropy - 0.5 * chi2,
            blur_width: self.kernel.blur_width(),
            nfev,
            bayes,
        })
    }

    /// Run the configured α determination.
    ///
    /// # Errors
    ///
    /// See the individual strategies.
    pub fn solve(&self) -> Result<MaxentSolution> {
        match self.options.alpha_determination {
            AlphaDetermination::Historic => self.solve_historic(),
            AlphaDetermination::Classic => self.solve_classic(),
            AlphaDetermination::Bryan => self.solve_bryan(),
            AlphaDetermination::Chi2kink => self.solve_chi2kink(),
        }
    }

    fn finish(alpha_opt: f64, optimum: OptimizationResult, history: Vec<OptimizationResult>) -> MaxentSolution {
        info!(alpha_opt, chi2 = optimum.chi2, norm = optimum.norm, "maxent solution");
        MaxentSolution {
            alpha_opt,
            a_opt: optimum.a_opt.clone(),
            backtransform: optimum.backtransform.clone(),
            optimum: Some(optimum),
            history,
        }
    }

    /// Decrease α from 1e6 by decades until `stop` holds, then refine the
    /// root of `target` in log10 α with the secant method.
    fn scan_and_refine<S, T>(&self, use_bayes: bool, stop: S, target: T, predict: Option<fn(&[OptimizationResult]) -> f64>) -> Result<MaxentSolution>
    where
        S: Fn(&OptimizationResult) -> bool,
        T: Fn(&OptimizationResult) -> f64,
    {
        let mut history = Vec::new();
        let mut alpha = 1e6;
        let mut u = DVector::zeros(self.n_sv());
        loop {
            let o = self.maxent_optimization(alpha, &u, use_bayes)?;
            u = o.u_opt.clone();
            let done = stop(&o);
            history.push(o);
            alpha /= 10.0;
            if done {
                break;
            }
            if alpha < 1e-12 {
                return Err(DgaError::NoConvergence {
                    solver: "maxent alpha scan",
                    iterations: history.len(),
                });
            }
        }
        if history.len() <= 1 {
            return Err(DgaError::InvalidArgument(
                "no prediction for the optimal alpha; decrease the error or increase the starting alpha".into(),
            ));
        }
        let start = predict.map_or_else(|| history[history.len() - 1].alpha.log10(), |p| p(&history));
        let warm = RefCell::new(history[history.len() - 2].u_opt.clone());
        let failure = RefCell::new(None);
        let extra = RefCell::new(Vec::new());
        let root = secant(
            |x| {
                let u0 = warm.borrow().clone();
                match self.maxent_optimization(10f64.powf(x), &u0, use_bayes) {
                    Ok(o) => {
                        *warm.borrow_mut() = o.u_opt.clone();
                        let t = target(&o);
                        extra.borrow_mut().push(o);
                        t
                    }
                    Err(e) => {
                        *failure.borrow_mut() = Some(e);
                        f64::NAN
                    }
                }
            },
            start,
            ALPHA_ROOT_TOL,
            SECANT_MAX_ITER,
        );
        if let Some(e) = failure.into_inner() {
            return Err(e);
        }
        let log_alpha = root?;
        history.extend(extra.into_inner());
        let alpha_opt = 10f64.powf(log_alpha);
        let optimum = self.maxent_optimization(alpha_opt, &warm.into_inner(), use_bayes)?;
        Ok(Self::finish(alpha_opt, optimum, history))
    }

    /// Historic MaxEnt: χ² equals the number of data points.
    ///
    /// # Errors
    ///
    /// Optimiser failures or a scan that never reaches χ² ≤ N.
    pub fn solve_historic(&self) -> Result<MaxentSolution> {
        let n = self.n_data() as f64;
        self.scan_and_refine(false, |o| n / o.chi2 >= 1.0, |o| n / o.chi2 - 1.0, None)
    }

    /// Classic MaxEnt: Bayesian convergence criterion equals one.
    ///
    /// # Errors
    ///
    /// Optimiser failures or a scan that never converges.
    pub fn solve_classic(&self) -> Result<MaxentSolution> {
        let conv = |o: &OptimizationResult| o.bayes.map_or(0.0, |b| b.convergence);
        self.scan_and_refine(
            true,
            move |o| conv(o) >= 1.0,
            move |o| conv(o) - 1.0,
            Some(|h: &[OptimizationResult]| {
                // log(conv) is close to linear in log(α).
                let (o1, o2) = (&h[h.len() - 2], &h[h.len() - 1]);
                let c = |o: &OptimizationResult| o.bayes.map_or(1.0, |b| b.convergence).log10();
                let (a1, a2) = (o1.alpha.log10(), o2.alpha.log10());
                a1 - c(o1) * (a2 - a1) / (c(o2) - c(o1))
            }),
        )
    }

    /// Bryan's method: spectra averaged with their posterior probability.
    ///
    /// # Errors
    ///
    /// Optimiser failures or a probability that never decays.
    /// [`DgaError::NotANumber`] for off-diagonal spectra, which carry no
    /// posterior probability.
    pub fn solve_bryan(&self) -> Result<MaxentSolution> {
        if self.options.offdiag {
            return Err(DgaError::NotANumber("Bryan posterior of an off-diagonal spectrum".into()));
        }
        let scan = self.options.bryan;
        let mut history: Vec<OptimizationResult> = Vec::new();
        let mut alpha = scan.alpha_start;
        let mut u = DVector::zeros(self.n_sv());
        let mut max_log = f64::NEG_INFINITY;
        let cutoff = BRYAN_PROBABILITY_CUTOFF.ln();
        loop {
            let o = self.maxent_optimization(alpha, &u, true)?;
            u = o.u_opt.clone();
            let logp = o.bayes.and_then(|b| b.log_probability).unwrap_or(f64::NEG_INFINITY);
            history.push(o);
            alpha /= scan.alpha_div;
            if logp > max_log {
                max_log = logp;
            } else if logp < max_log + cutoff {
                break;
            }
            if alpha < 1e-12 {
                return Err(DgaError::NoConvergence {
                    solver: "Bryan alpha scan",
                    iterations: history.len(),
                });
            }
        }
        let alphas: Vec<f64> = history.iter().map(|o| o.alpha).collect();
        let probs: Vec<f64> = history
            .iter()
            .map(|o| o.bayes.and_then(|b| b.log_probability).map_or(0.0, |l| (l - max_log).exp()))
            .collect();
        // α decreases along the scan, hence the sign.
        let weights: Vec<f64> = trapz_weights(&alphas).into_iter().map(|w| -w).collect();
        let norm: f64 = weights.iter().zip(&probs).map(|(w, p)| w * p).sum();
        if norm <= 0.0 || !norm.is_finite() {
            return Err(DgaError::NotANumber("Bryan probability normalisation".into()));
        }
        let nw = self.re_axis.len();
        let mut a_opt = vec![0.0; nw];
        for ((o, w), p) in history.iter().zip(&weights).zip(&probs) {
            for (a, x) in a_opt.iter_mut().zip(&o.a_opt) {
                *a += w * p / norm * x;
            }
        }
        let backtransform = self.backtransform(&a_opt);
        info!(n_alpha = history.len(), "Bryan average");
        Ok(MaxentSolution {
            alpha_opt: f64::NAN,
            a_opt,
            backtransform,
            optimum: None,
            history,
        })
    }

    /// Fit log χ²(log α) with a logistic function and take
    /// log α_opt = c − fit_position/d.
    ///
    /// # Errors
    ///
    /// [`DgaError::InvalidArgument`] for a negative logistic width and
    /// optimiser failures of the final optimisation.
    pub fn solve_chi2kink(&self) -> Result<MaxentSolution> {
        let scan = self.options.chi2kink;
        let mut history = Vec::new();
        let mut alpha = scan.alpha_start;
        let mut u = DVector::zeros(self.n_sv());
        while alpha >= scan.alpha_end {
            match self.maxent_optimization(alpha, &u, false) {
                Ok(o) => {
                    u = o.u_opt.clone();
                    history.push(o);
                }
                Err(e) => warn!(alpha, %e, "maxent optimisation failed, skipping alpha"),
            }
            alpha /= scan.alpha_div;
        }
        let (x, y): (Vec<f64>, Vec<f64>) = history
            .iter()
            .filter(|o| o.chi2.is_finite() && o.chi2 > 0.0)
            .map(|o| (o.alpha.log10(), o.chi2.log10()))
            .unzip();
        let logistic = |x: f64, p: &[f64]| p[0] + p[1] / (1.0 + (-p[3] * (x - p[2])).exp());
        let fit = if x.len() >= 4 {
            curve_fit(logistic, &x, &y, &[0.0, 5.0, 2.0, 0.0])
        } else {
            Err(DgaError::InvalidArgument("too few alpha points for the chi2 kink fit".into()))
        };
        let params = match fit {
            Ok(p) => p,
            Err(e) => {
                warn!(%e, "chi2 kink fit failed, returning the smallest alpha");
                let Some(last) = history.last().cloned() else {
                    return Err(DgaError::NoConvergence {
                        solver: "chi2kink alpha scan",
                        iterations: 0,
                    });
                };
                return Ok(Self::finish(last.alpha, last, history));
            }
        };
        let d = params[3];
        if d < 0.0 {
            return Err(DgaError::InvalidArgument(format!(
                "chi2 kink fit has negative width parameter d={d}"
            )));
        }
        let log_alpha = params[2] - scan.fit_position / d;
        let closest = history
            .iter()
            .min_by(|a, b| {
                (a.alpha.log10() - log_alpha)
                    .abs()
                    .total_cmp(&(b.alpha.log10() - log_alpha).abs())
            })
            .map_or_else(|| DVector::zeros(self.n_sv()), |o| o.u_opt.clone());
        let alpha_opt = 10f64.powf(log_alpha);
        debug!(?params, log_alpha, "chi2 kink fit");
        let optimum = self.maxent_optimization(alpha_opt, &closest, false)?;
        Ok(Self::finish(alpha_opt, optimum, history))
    }

    /// Variance of ∫ O(ω) A(ω) dω from the curvature of Q at the optimum.
    ///
    /// # Errors
    ///
    /// [`DgaError::SingularMatrix`] if the curvature is not invertible.
    pub fn error_propagation(&self, observable: &[f64], alpha_opt: f64, a_opt: &[f64]) -> Result<f64> {
        let nw = self.re_axis.len();
        crate::error::ensure_len("observable", nw, observable.len())?;
        crate::error::ensure_len("spectrum", nw, a_opt.len())?;
        let mut hess = self.d2chi2.clone();
        for i in 0..nw {
            hess[(i, i)] += alpha_opt * self.dw[i] / a_opt[i].abs().max(f64::MIN_POSITIVE);
        }
        let var = hess
            .try_inverse()
            .ok_or_else(|| DgaError::SingularMatrix("maxent error propagation".into()))?;
        let mut dev = 0.0;
        for i in 0..nw {
            for j in 0..nw {
                dev += observable[i] * observable[j] * var[(i, j)] * self.dw[i] * self.dw[j];
            }
        }
        Ok(dev)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::ana_cont::mesh::{flat_model, real_mesh, MeshType};
    use crate::matsubara::fermionic_frequencies;

    fn semicircle(w: &[f64]) -> Vec<f64> {
        w.iter()
            .map(|x| {
                let r = 1.0 - x * x / 4.0;
                if r > 0.0 {
                    r.sqrt() / std::f64::consts::PI
                } else {
                    0.0
                }
            })
            .collect()
    }

    fn problem(options: MaxentOptions) -> (MaxentSolverSvd, Vec<f64>) {
        let beta = 10.0;
        let iw: Vec<f64> = fermionic_frequencies(beta, 20)[20..].to_vec();
        let w = real_mesh(MeshType::Linear, 5.0, 201).unwrap();
        let a = semicircle(&w);
        let dw = trapz_weights(&w);
        let data: Vec<Complex64> = iw
            .iter()
            .map(|&v| {
                w.iter()
                    .zip(&a)
                    .zip(&dw)
                    .map(|((&x, &ai), &d)| d * ai / Complex64::new(-x, v))
                    .sum()
            })
            .collect();
        let noise = Noise::Stdev(vec![1e-4; iw.len()]);
        let solver = MaxentSolverSvd::new(KernelKind::FreqFermionic, &iw, &w, &data, &noise, &flat_model(&w), options).unwrap();
        (solver, a)
    }

    #[test]
    fn large_alpha_returns_model() {
        let (solver, _) = problem(MaxentOptions::default());
        let o = solver.maxent_optimization(1e12, &DVector::zeros(solver.n_sv()), true).unwrap();
        let w = solver.re_axis().to_vec();
        let model = flat_model(&w);
        for (a, m) in o.a_opt.iter().zip(&model) {
            assert!((a - m).abs() < 1e-3);
        }
        assert!(o.entropy <= 0.0);
    }

    #[test]
    fn chi2kink_recovers_normalised_spectrum() {
        let (solver, exact) = problem(MaxentOptions::default());
        let sol = solver.solve().unwrap();
        let w = solver.re_axis();
        let norm = crate::numerics::trapz(&sol.a_opt, w);
        assert!((norm - 1.0).abs() < 0.02, "norm {norm}");
        // Spectral weight at ω = 0 close to the semicircle value 1/π.
        let mid = w.len() / 2;
        assert!((sol.a_opt[mid] - exact[mid]).abs() < 0.1);
        assert!(sol.alpha_opt.is_finite());
    }

    #[test]
    fn gradient_vanishes_at_optimum() {
        let (solver, _) = problem(MaxentOptions::default());
        let o = solver.maxent_optimization(10.0, &DVector::zeros(solver.n_sv()), false).unwrap();
        let (f, _) = solver.compute_f_j(&o.u_opt, 10.0);
        assert!(f.amax() < 1e-2);
    }

    #[test]
    fn lm_and_newton_agree() {
        let (newton, _) = problem(MaxentOptions::default());
        let (lm, _) = problem(MaxentOptions {
            optimizer: Optimizer::Lm,
            ..MaxentOptions::default()
        });
        let u0 = DVector::zeros(newton.n_sv());
        let a = newton.maxent_optimization(100.0, &u0, false).unwrap();
        let b = lm.maxent_optimization(100.0, &u0, false).unwrap();
        for (x, y) in a.a_opt.iter().zip(&b.a_opt) {
            assert!((x - y).abs() < 1e-2);
        }
    }

    #[test]
    fn bryan_rejects_offdiagonal_spectra() {
        let (solver, _) = problem(MaxentOptions {
            offdiag: true,
            ..MaxentOptions::default()
        });
        let err = solver.solve_bryan().unwrap_err();
        assert!(matches!(err, DgaError::NotANumber(_)), "got {err}");
    }

    #[test]
    fn error_propagation_is_positive() {
        let (solver, _) = problem(MaxentOptions::default());
        let o = solver.maxent_optimization(1.0, &DVector::zeros(solver.n_sv()), false).unwrap();
        let ones = vec![1.0; solver.re_axis().len()];
        let var = solver.error_propagation(&ones, 1.0, &o.a_opt).unwrap();
        assert!(var > 0.0);
    }
}
