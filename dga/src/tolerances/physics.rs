// SPDX-License-Identifier: AGPL-3.0-only

//! Validation thresholds for physical identities checked by the
//! validation binaries and integration tests.

// ═══════════════════════════════════════════════════════════════════
// Vertex and ladder identities
// ═══════════════════════════════════════════════════════════════════

/// Γ extracted from an RPA-generated G2 must equal U_r/β² to this precision.
///
/// Two complex inversions of well-conditioned matrices of dimension ≤ 200.
pub const RPA_GAMMA_PARITY: f64 = 1e-8;

/// Ladder χ(q, ω) against the closed RPA formula, relative.
pub const RPA_CHI_PARITY: f64 = 1e-8;

/// Conjugation symmetry χ(−ω) = χ(ω)* of the ladder output.
pub const BOSONIC_SYMMETRY_ABS: f64 = 1e-10;

/// λ-corrected sum rule residual.
///
/// The Newton search stops at 1e-8 in λ; the sum is smooth in λ so the
/// residual is of the same order.
pub const LAMBDA_SUM_RULE_ABS: f64 = 1e-6;

// ═══════════════════════════════════════════════════════════════════
// Analytic continuation checks
// ═══════════════════════════════════════════════════════════════════

/// Spectral weight ∫A(ω)dω of a continued Green's function, absolute.
///
/// MaxEnt at noise level 1e-4 reproduces the norm to well under a percent.
pub const MAXENT_NORM_ABS: f64 = 0.02;

/// Peak position of a continued spectrum, in units of the band width.
pub const MAXENT_PEAK_POSITION: f64 = 0.25;

/// Padé reproduces its input points to this precision.
pub const PADE_INTERPOLATION: f64 = 1e-8;

// ═══════════════════════════════════════════════════════════════════
// Eliashberg checks
// ═══════════════════════════════════════════════════════════════════

/// Power iteration eigenvalue against the exact separable-kernel result.
pub const ELIASHBERG_EIGENVALUE_ABS: f64 = 1e-5;
