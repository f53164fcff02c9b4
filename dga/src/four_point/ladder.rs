// SPDX-License-Identifier: AGPL-3.0-only

//! Lattice ladder: q-resolved susceptibilities and Fermi–Bose vertices.
//!
//! The local irreducible vertex is combined with the lattice bubble of
//! every irreducible transfer momentum q. Each q is independent, so the
//! q-points are distributed over the rayon pool.

use num_complex::Complex64;
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use super::bubble::{chi0_asympt_correction, gchi0_at};
use super::vertex::solve_bse_aux;
use super::{Channel, LocalFourPoint};
use crate::error::{ensure_len, Result};
use crate::io::ComplexArray;
use crate::lattice::{KGrid, QGrid};
use crate::two_point::GreensFunction;

/// Ladder susceptibility χ_r(q, ω) and vertex γ_r(q, ω; ν)/β for a set of
/// q-points (irreducible wedge or full grid).
#[derive(Clone, Debug)]
pub struct LadderSusceptibility {
    /// Spin channel.
    pub channel: Channel,
    /// Inverse temperature.
    pub beta: f64,
    /// Bosonic indices.
    pub wn: Vec<i64>,
    /// Half-size of the fermionic box of the vertex.
    pub niv_vrg: usize,
    nq: usize,
    chi: Vec<Complex64>,
    vrg: Vec<Complex64>,
}

impl LadderSusceptibility {
    /// Assemble from per-q rows.
    ///
    /// # Errors
    ///
    /// Shape errors for inconsistent rows.
    pub fn from_rows(channel: Channel, beta: f64, wn: Vec<i64>, niv_vrg: usize, chi_rows: Vec<Vec<Complex64>>, vrg_rows: Vec<Vec<Complex64>>) -> Result<Self> {
        let nq = chi_rows.len();
        let nw = wn.len();
        ensure_len("ladder vertex rows", nq, vrg_rows.len())?;
        let mut chi = Vec::with_capacity(nq * nw);
        let mut vrg = Vec::with_capacity(nq * nw * 2 * niv_vrg);
        for (c, v) in chi_rows.into_iter().zip(vrg_rows) {
            ensure_len("ladder chi row", nw, c.len())?;
            ensure_len("ladder vertex row", nw * 2 * niv_vrg, v.len())?;
            chi.extend(c);
            vrg.extend(v);
        }
        Ok(Self {
            channel,
            beta,
            wn,
            niv_vrg,
            nq,
            chi,
            vrg,
        })
    }

    /// Number of q-points.
    #[must_use]
    pub const fn nq(&self) -> usize {
        self.nq
    }

    /// Number of bosonic frequencies.
    #[must_use]
    pub fn nw(&self) -> usize {
        self.wn.len()
    }

    /// Position of ω = 0.
    #[must_use]
    pub fn w0(&self) -> usize {
        self.wn.len() / 2
    }

    /// χ(q, ·) for q-point `iq`.
    #[must_use]
    pub fn chi_row(&self, iq: usize) -> &[Complex64] {
        let nw = self.nw();
        &self.chi[iq * nw..(iq + 1) * nw]
    }

    /// All χ values, row-major `[q][ω]`.
    #[must_use]
    pub fn chi(&self) -> &[Complex64] {
        &self.chi
    }

    /// γ(q, ω; ·)/β.
    #[must_use]
    pub fn vrg(&self, iq: usize, iw: usize) -> &[Complex64] {
        let n = 2 * self.niv_vrg;
        let start = (iq * self.nw() + iw) * n;
        &self.vrg[start..start + n]
    }

    /// q-average of χ for every ω (only meaningful on the full grid).
    #[must_use]
    pub fn chi_loc(&self) -> Vec<Complex64> {
        let nw = self.nw();
        let mut out = vec![Complex64::new(0.0, 0.0); nw];
        for row in self.chi.chunks_exact(nw) {
            for (o, c) in out.iter_mut().zip(row) {
                *o += c;
            }
        }
        out.iter_mut().for_each(|o| *o /= self.nq as f64);
        out
    }

    /// Replace χ by 1/(1/χ + λ).
    pub fn apply_lambda(&mut self, lambda: f64) {
        self.chi.iter_mut().for_each(|c| *c = 1.0 / (1.0 / *c + lambda));
    }

    /// Unfold irreducible-wedge data onto the full grid.
    ///
    /// # Errors
    ///
    /// [`crate::error::DgaError::Shape`] if `self` is not on the wedge of `grid`.
    pub fn unfold(&self, grid: &KGrid) -> Result<Self> {
        ensure_len("irreducible q-points", grid.nk_irr(), self.nq)?;
        let nw = self.nw();
        let n = nw * 2 * self.niv_vrg;
        let mut chi = Vec::with_capacity(grid.nk_tot() * nw);
        let mut vrg = Vec::with_capacity(grid.nk_tot() * n);
        for &irr in grid.fbz2irrk() {
            chi.extend_from_slice(self.chi_row(irr));
            vrg.extend_from_slice(&self.vrg[irr * n..(irr + 1) * n]);
        }
        Ok(Self {
            channel: self.channel,
            beta: self.beta,
            wn: self.wn.clone(),
            niv_vrg: self.niv_vrg,
            nq: grid.nk_tot(),
            chi,
            vrg,
        })
    }

    /// Serialisable χ(q, ω).
    #[must_use]
    pub fn to_stored(&self, nq: [usize; 3]) -> StoredSusceptibility {
        StoredSusceptibility {
            channel: self.channel,
            beta: self.beta,
            nq,
            wn: self.wn.clone(),
            chi: ComplexArray::from_slice(&self.chi),
        }
    }
}

/// On-disk form of a full-grid χ(q, ω).
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct StoredSusceptibility {
    /// Spin channel.
    pub channel: Channel,
    /// Inverse temperature.
    pub beta: f64,
    /// q-grid dimensions.
    pub nq: [usize; 3],
    /// Bosonic indices.
    pub wn: Vec<i64>,
    /// Row-major `[q][ω]` values.
    pub chi: ComplexArray,
}

/// Solve the ladder on the irreducible q-points of `qgrid`.
///
/// `gammar` is the local irreducible vertex on the core box; the lattice
/// bubble is evaluated on the core box plus `niv_shell`.
///
/// # Errors
///
/// Box errors when G does not reach ν − ω, inversion errors.
pub fn ladder_susceptibility(gk: &GreensFunction, kgrid: &KGrid, qgrid: &QGrid, gammar: &LocalFourPoint, u: f64, niv_shell: usize) -> Result<LadderSusceptibility> {
    let niv_u = gammar.niv() + niv_shell;
    let beta = gammar.beta;
    let u_r = gammar.channel.u_r(u);
    let wn = gammar.wn.clone();
    let tail = chi0_asympt_correction(beta, niv_u, &wn);
    let irrq = qgrid.grid().irrk_ind().to_vec();
    info!(
        channel = %gammar.channel,
        n_irrq = irrq.len(),
        niv_u,
        "solving ladder"
    );
    let rows = irrq
        .par_iter()
        .map(|&iq| -> Result<(Vec<Complex64>, Vec<Complex64>)> {
            let gchi0 = gchi0_at(gk, kgrid, qgrid, iq, &wn, niv_u)?;
            let mut chi_row = Vec::with_capacity(wn.len());
            let mut vrg_row = Vec::with_capacity(wn.len() * 2 * niv_u);
            for ((gamma, g0), t) in gammar.mat.iter().zip(&gchi0).zip(&tail) {
                let sol = solve_bse_aux(gamma, g0, beta, u_r, *t)?;
                chi_row.push(sol.chi_asympt);
                vrg_row.extend(sol.vrg);
            }
            debug!(iq, "ladder q-point done");
            Ok((chi_row, vrg_row))
        })
        .collect::<Result<Vec<_>>>()?;
    let (chi_rows, vrg_rows): (Vec<_>, Vec<_>) = rows.into_iter().unzip();
    LadderSusceptibility::from_rows(gammar.channel, beta, wn, niv_u, chi_rows, vrg_rows)
}
