// SPDX-License-Identifier: AGPL-3.0-only

//! lambda-dga: ladder dynamical vertex approximation on top of DMFT
//!
//! Takes the local one- and two-particle Green's functions of a converged
//! DMFT calculation and builds momentum-dependent susceptibilities, the
//! DΓA self-energy, superconducting eigenvalues and real-frequency spectra.
//!
//! ## Core modules
//!   - `matsubara` — fermionic/bosonic index grids and box cuts
//!   - `field` — momentum × frequency container
//!   - `lattice` — k/q grids with symmetry reduction, hopping, k-paths
//!   - `two_point` — self-energy with tail, lattice G, μ search
//!   - `four_point` — local vertices, bubbles, ladder, Schwinger–Dyson
//!   - `lambda_correction` — Moriya λ shifts, Ornstein–Zernike fit
//!   - `eliashberg` — linearised gap equation with FFT convolutions
//!   - `ana_cont` — MaxEnt (four α strategies) and Padé continuation
//!   - `postproc` — polynomial extrapolation, χ continuation along k-paths
//!   - `symmetrize` — worm-sampling G2 symmetrisation
//!
//! ## Run support
//!   - `config` — YAML run configuration
//!   - `pipeline` — the staged DΓA run
//!   - `io` — JSON data files
//!   - `logging` — subscriber setup and stage timer
//!   - `synthetic` — RPA-limit input with a known answer
//!   - `validation` — pass/fail harness of the `validate_*` binaries
//!   - `tolerances` — numerical thresholds with their justification
//!
//! ## Binaries
//!   - `dga_ladder` — full run from a YAML config
//!   - `continue_susceptibility` — MaxEnt of χ(q, iω) along a k-path
//!   - `symmetrize_vertex` — worm data → per-channel G2 files
//!   - `validate_rpa_ladder` — ladder against the exact RPA limit
//!   - `validate_maxent` — MaxEnt and Padé on known spectra
//!   - `validate_eliashberg` — gap equation against closed forms

pub mod ana_cont;
pub mod config;
pub mod eliashberg;
pub mod error;
pub mod field;
pub mod four_point;
pub mod io;
pub mod lambda_correction;
pub mod lattice;
pub mod logging;
pub mod matsubara;
pub mod numerics;
pub mod pipeline;
pub mod postproc;
pub mod symmetrize;
pub mod synthetic;
pub mod tolerances;
pub mod two_point;
pub mod validation;
