// SPDX-License-Identifier: AGPL-3.0-only

//! Analytic continuation from the imaginary to the real frequency axis.
//!
//! | Module | Contents |
//! |--------|----------|
//! | `mesh` | real-frequency meshes and default models |
//! | `kernel` | continuation kernels, preblur, covariance rotation |
//! | `newton` | damped Newton root finder |
//! | `maxent` | singular-space maximum entropy with four α strategies |
//! | `pade` | Vidberg–Serene Padé interpolant |

pub mod kernel;
pub mod maxent;
pub mod mesh;
pub mod newton;
pub mod pade;

pub use kernel::{Kernel, KernelKind};
pub use maxent::{
    AlphaDetermination, BayesQuantities, BryanScan, Chi2KinkScan, MaxentOptions, MaxentSolution,
    MaxentSolverSvd, Noise, OptimizationResult, Optimizer,
};
pub use mesh::{flat_model, gaussian_model, real_mesh, MeshType};
pub use pade::{PadeSolution, PadeSolver};
