// SPDX-License-Identifier: AGPL-3.0-only

//! Lattice geometry: momentum grids, symmetry reduction, k-paths,
//! tight-binding dispersions and the deterministic PRNG used for seeds.
//!
//! | Module | Purpose |
//! |--------|---------|
//! | `brillouin` | k/q grids, irreducible wedge, Fermi-surface zeros |
//! | `hopping` | real-space hopping lists and ε(k) |
//! | `kpath` | high-symmetry paths through the grid |
//! | `rng` | LCG random numbers |

pub mod brillouin;
pub mod hopping;
pub mod kpath;
pub mod rng;

pub use brillouin::{find_zeros, KGrid, KSymmetry, QGrid};
pub use hopping::{HoppingTerm, RealSpaceHopping};
pub use kpath::KPath;
pub use rng::LcgRng;
