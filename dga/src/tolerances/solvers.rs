// SPDX-License-Identifier: AGPL-3.0-only

//! Convergence thresholds and iteration caps of the iterative solvers.

// ═══════════════════════════════════════════════════════════════════
// One-particle quantities
// ═══════════════════════════════════════════════════════════════════

/// Chemical potential root search: absolute tolerance on μ.
///
/// Filling errors of 1e-6 are well below the statistical error of any
/// QMC-based DMFT input.
pub const MU_ROOT_TOL: f64 = 1e-6;

/// Maximum number of secant steps in root searches.
pub const SECANT_MAX_ITER: usize = 50;

/// Allowed deviation of Σ(iν) from its high-frequency tail before the tail
/// replaces the data.
pub const SIGMA_ASYMPT_ERR: f64 = 5e-4;

/// Smallest core box (positive fermionic frequencies) for the self-energy.
pub const SIGMA_NIV_CORE_MIN: usize = 20;

/// Fraction of the positive frequencies used to fit the Σ tail moments.
pub const MOMENT_FIT_FRACTION: f64 = 0.2;

/// Minimum number of frequencies used to fit the Σ tail moments.
pub const MOMENT_FIT_MIN_POINTS: usize = 4;

/// β·x above which the model Fermi function switches to the exponential
/// branch to avoid overflow in e^{βx}.
pub const FERMI_EXP_CUTOFF: f64 = 20.0;

// ═══════════════════════════════════════════════════════════════════
// λ-correction
// ═══════════════════════════════════════════════════════════════════

/// Newton iteration tolerance on λ.
pub const LAMBDA_NEWTON_TOL: f64 = 1e-8;

/// Iteration cap of the λ Newton search.
pub const LAMBDA_MAX_ITER: usize = 200;

/// Offset above the pole λ_min = −min 1/χ(q, ω=0) where the search starts.
pub const LAMBDA_START_OFFSET: f64 = 1e-3;

// ═══════════════════════════════════════════════════════════════════
// Eliashberg power iteration
// ═══════════════════════════════════════════════════════════════════

/// Convergence threshold |λ_new − λ_old|.
pub const ELIASHBERG_EPS: f64 = 1e-6;

/// Iteration cap of each power-iteration phase.
pub const ELIASHBERG_MAX_COUNT: usize = 10_000;

// ═══════════════════════════════════════════════════════════════════
// Maximum-entropy continuation
// ═══════════════════════════════════════════════════════════════════

/// Newton optimizer: convergence on max |u_{n+1} − u_n|.
pub const NEWTON_OPT_CONVERGENCE: f64 = 1e-4;

/// Newton optimizer: iteration cap.
pub const NEWTON_OPT_MAX_ITER: usize = 20_000;

/// Components with |u| below this are ignored in the relative step check.
pub const NEWTON_SIGNIFICANCE_LIMIT: f64 = 1e-4;

/// Linear mixing between proposed and accepted Newton iterates.
pub const NEWTON_MIXING: f64 = 0.5;

/// Relative tolerance of the α root searches (historic, classic).
pub const ALPHA_ROOT_TOL: f64 = 1e-6;

/// Bryan's method: stop scanning α when the posterior drops below this
/// fraction of its maximum.
pub const BRYAN_PROBABILITY_CUTOFF: f64 = 0.01;

/// Levenberg–Marquardt: convergence on the relative change of the residual.
pub const LM_FTOL: f64 = 1e-10;

/// Levenberg–Marquardt: iteration cap.
pub const LM_MAX_ITER: usize = 500;
