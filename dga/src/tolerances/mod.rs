// SPDX-License-Identifier: AGPL-3.0-only

//! Centralized tolerances and solver thresholds with justification.
//!
//! Every convergence criterion, cutoff and validation threshold used by the
//! solvers and the validation binaries is defined here with its origin. No
//! ad-hoc magic numbers in the numerics.
//!
//! # Categories
//!
//! | Category | Basis | Example |
//! |----------|-------|---------|
//! | Machine precision | IEEE 754 f64 | 1e-10 for exact linear algebra |
//! | Solver thresholds | Algorithm convergence | 1e-4 Newton step in MaxEnt |
//! | Physics checks | Sum rules, asymptotics | RPA parity of the ladder |

/// Machine-precision and linear-algebra tolerances.
pub mod core;
/// Validation thresholds for physical identities.
pub mod physics;
/// Convergence thresholds and iteration caps of the iterative solvers.
pub mod solvers;

pub use self::core::*;
pub use physics::*;
pub use solvers::*;
