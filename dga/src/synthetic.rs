// SPDX-License-Identifier: AGPL-3.0-only

//! Reference inputs with a known answer.
//!
//! A Hartree self-energy on a tight-binding lattice together with the local
//! G2 of the exact local BSE with a constant vertex U_r/β² is the RPA limit
//! of the ladder: the extracted Γ is exactly U_r/β² and the lattice ladder
//! must return χ_RPA(q, ω) = χ0/(1 + U_r χ0) with the bubble tail added.

use num_complex::Complex64;
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::error::Result;
use crate::four_point::bubble::{chi0_asympt_correction, gchi0_at};
use crate::four_point::vertex::{g2_from_gchir, rpa_gchir};
use crate::four_point::{chi_rpa, Channel, LocalBubble};
use crate::io::{ComplexArray, DmftInput, LocalG2File};
use crate::lattice::{KGrid, QGrid, RealSpaceHopping};
use crate::matsubara;
use crate::two_point::{hartree, GreensFunction, SelfEnergy};

/// Parameters of the RPA reference problem.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RpaReference {
    /// Inverse temperature.
    pub beta: f64,
    /// Hubbard interaction.
    pub u: f64,
    /// Filling.
    pub n: f64,
    /// Nearest-neighbour hopping.
    pub t: f64,
    /// Next-nearest-neighbour hopping.
    pub tp: f64,
    /// Third-neighbour hopping.
    pub tpp: f64,
    /// Momentum grid of the lattice G_loc.
    pub nk: [usize; 3],
    /// Positive frequencies of the one-particle input.
    pub niv_input: usize,
    /// Fermionic core box of the G2.
    pub niv_core: usize,
    /// Shell used when generating the G2; must match the ladder shell.
    pub niv_shell: usize,
    /// Bosonic half-box.
    pub niw: usize,
}

impl Default for RpaReference {
    fn default() -> Self {
        Self {
            beta: 4.0,
            u: 1.0,
            n: 0.9,
            t: 1.0,
            tp: -0.2,
            tpp: 0.1,
            nk: [8, 8, 1],
            niv_input: 60,
            niv_core: 6,
            niv_shell: 10,
            niw: 4,
        }
    }
}

/// Generated one- and two-particle input.
#[derive(Clone, Debug)]
pub struct ReferenceInput {
    /// One-particle data.
    pub dmft: DmftInput,
    /// Density-channel G2.
    pub g2_dens: LocalG2File,
    /// Magnetic-channel G2.
    pub g2_magn: LocalG2File,
}

impl RpaReference {
    /// Hopping of the reference lattice.
    #[must_use]
    pub fn hopping(&self) -> RealSpaceHopping {
        RealSpaceHopping::one_band_2d_t_tp_tpp(self.t, self.tp, self.tpp)
    }

    /// Build the input files.
    ///
    /// # Errors
    ///
    /// Propagates grid, box and inversion errors.
    pub fn generate(&self) -> Result<ReferenceInput> {
        let grid = KGrid::new(self.nk, vec![])?;
        let ek = self.hopping().ek_grid(&grid);
        let s0 = hartree(self.u, self.n);
        let sigma_pos = vec![Complex64::new(s0, 0.0); self.niv_input];
        let sigma = SelfEnergy::from_local(&sigma_pos, self.nk, self.beta, Some((s0, 0.0)), 1e-10)?;
        let g = GreensFunction::with_filling(&sigma, &ek, self.n, self.niv_input, s0)?;
        let g_loc = g.g_loc_cut(self.niv_input);
        info!(mu = g.mu(), n = g.n(), "RPA reference one-particle input");

        let bubble = LocalBubble::new(matsubara::wn(self.niw), g_loc.clone(), self.beta);
        let g2 = |channel: Channel| -> Result<LocalG2File> {
            let gchi = rpa_gchir(&bubble, channel, self.u, self.niv_core, self.niv_shell)?;
            Ok(g2_from_gchir(&gchi, &g_loc)?.to_stored())
        };
        Ok(ReferenceInput {
            dmft: DmftInput {
                beta: self.beta,
                u: self.u,
                n: self.n,
                mu_dmft: g.mu(),
                siw: ComplexArray::from_slice(&matsubara::fermionic_full_nu_range(&sigma_pos)),
                giw: ComplexArray::from_slice(&g_loc),
            },
            g2_dens: g2(Channel::Density)?,
            g2_magn: g2(Channel::Magnetic)?,
        })
    }
}

/// χ_RPA(q, ω) on the irreducible q-points, built from the lattice bubble
/// on the box `niv_u` plus its analytic tail.
///
/// # Errors
///
/// Box errors when G does not reach ν − ω.
pub fn rpa_susceptibility(gk: &GreensFunction, kgrid: &KGrid, qgrid: &QGrid, channel: Channel, u: f64, wn: &[i64], niv_u: usize) -> Result<Vec<Vec<Complex64>>> {
    let beta = gk.beta();
    let tail = chi0_asympt_correction(beta, niv_u, wn);
    let u_r = channel.u_r(u);
    qgrid
        .grid()
        .irrk_ind()
        .par_iter()
        .map(|&iq| -> Result<Vec<Complex64>> {
            let gchi0 = gchi0_at(gk, kgrid, qgrid, iq, wn, niv_u)?;
            Ok(gchi0
                .iter()
                .zip(&tail)
                .map(|(row, t)| {
                    let chi0 = row.iter().sum::<Complex64>() / (beta * beta);
                    chi_rpa(chi0, u_r) + t
                })
                .collect())
        })
        .collect()
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::four_point::{gammar_from_gchir, gchir_from_g2, LocalFourPoint};

    #[test]
    fn generated_input_has_consistent_shapes() {
        let reference = RpaReference {
            niv_input: 30,
            ..RpaReference::default()
        };
        let input = reference.generate().unwrap();
        assert_eq!(input.dmft.siw.len(), 60);
        assert_eq!(input.dmft.giw.len(), 60);
        assert_eq!(input.g2_magn.wn.len(), 2 * reference.niw + 1);
        assert_eq!(input.g2_dens.niv, reference.niv_core);
        // Hartree self-energy is constant.
        assert!(input.dmft.siw.re.iter().all(|&s| (s - reference.u * reference.n / 2.0).abs() < 1e-14));
    }

    #[test]
    fn extracted_vertex_is_bare_interaction() {
        let reference = RpaReference {
            niv_input: 40,
            ..RpaReference::default()
        };
        let input = reference.generate().unwrap();
        let g_loc = input.dmft.giw.to_vec().unwrap();
        let bubble = LocalBubble::new(matsubara::wn(reference.niw), g_loc.clone(), reference.beta);
        let g2 = LocalFourPoint::from_stored(&input.g2_dens).unwrap();
        let gchi = gchir_from_g2(&g2, &g_loc).unwrap();
        let gamma = gammar_from_gchir(&gchi, &bubble, reference.u, reference.niv_shell).unwrap();
        let expected = reference.u / (reference.beta * reference.beta);
        for m in &gamma.mat {
            assert!(m.iter().all(|z| (z - expected).norm() < 1e-8));
        }
    }
}
