// SPDX-License-Identifier: AGPL-3.0-only

//! One-particle quantities: self-energy with its high-frequency tail,
//! lattice Green's function, filling and chemical potential.

pub mod filling;
pub mod greens;
pub mod self_energy;

pub use filling::{get_fill, model_occupation, update_mu};
pub use greens::GreensFunction;
pub use self_energy::{fit_smom, hartree, smom1, SelfEnergy};
