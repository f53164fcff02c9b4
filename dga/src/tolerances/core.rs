// SPDX-License-Identifier: AGPL-3.0-only

//! Core numerical tolerances: machine precision and dense linear algebra.

// ═══════════════════════════════════════════════════════════════════
// Machine-precision tolerances (IEEE 754 f64)
// ═══════════════════════════════════════════════════════════════════

/// Operations that should be exact in f64 arithmetic.
///
/// A complex LU solve of a 2·niv × 2·niv vertex matrix accumulates a few
/// digits of rounding; 1e-10 leaves five digits of headroom.
pub const EXACT_F64: f64 = 1e-10;

/// f64 operations with moderate accumulation (SVD, eigen-decompositions,
/// sums over a full Brillouin zone).
pub const ITERATIVE_F64: f64 = 1e-8;

/// Threshold below which an expected value is treated as zero and relative
/// comparisons fall back to absolute ones.
pub const NEAR_ZERO_EXPECTED: f64 = 1e-14;

// ═══════════════════════════════════════════════════════════════════
// Linear algebra cutoffs
// ═══════════════════════════════════════════════════════════════════

/// Singular values below this are discarded by the pseudo-inverse.
///
/// Matches the `rcond` default regime of LAPACK `gelsd` for matrices of
/// dimension up to a few hundred.
pub const PINV_CUTOFF: f64 = 1e-12;

/// Kernel singular values kept by the MaxEnt singular-space solver.
///
/// Singular values below 1e-10 carry no information above f64 noise for the
/// Matsubara kernels (they decay exponentially in the index).
pub const SVD_CUTOFF: f64 = 1e-10;
