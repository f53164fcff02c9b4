// SPDX-License-Identifier: AGPL-3.0-only

//! Particle–particle pairing vertex from ladder susceptibilities.
//!
//! Spin-fluctuation form with the transfer q = k − k' and ω = ν − ν':
//!
//! singlet Γ_s = U + (3/2) U² χ_m(q, ω) − (1/2) U² χ_d(q, ω)
//! triplet Γ_t =   − (1/2) U² χ_m(q, ω) − (1/2) U² χ_d(q, ω)
//!
//! Transfers outside the computed bosonic box keep only the bare part.

use num_complex::Complex64;
use serde::{Deserialize, Serialize};

use crate::error::{ensure_len, Result};
use crate::field::KField;
use crate::four_point::LadderSusceptibility;

/// Spin structure of the Cooper pair.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PairingChannel {
    /// Even-spin (singlet) pairing.
    #[default]
    Singlet,
    /// Odd-spin (triplet) pairing.
    Triplet,
}

/// Γ(q, ν − ν') on the q-grid for every fermionic difference of a box
/// n ∈ [−niv, niv).
#[derive(Clone, Debug)]
pub struct PairingVertex {
    /// Pair spin structure.
    pub channel: PairingChannel,
    /// Half-size of the fermionic box.
    pub niv: usize,
    /// Γ(q, m) with m ∈ [−(2niv−1), 2niv−1] stored at m + 2niv − 1.
    pub gamma: KField,
}

impl PairingVertex {
    /// Build from λ-corrected full-grid susceptibilities on a grid of `nq`.
    ///
    /// # Errors
    ///
    /// Shape errors when the two channels do not share the q-grid.
    pub fn from_ladder(chi_dens: &LadderSusceptibility, chi_magn: &LadderSusceptibility, nq: [usize; 3], u: f64, niv: usize, channel: PairingChannel) -> Result<Self> {
        let nq_tot: usize = nq.iter().product();
        ensure_len("pairing vertex density q-points", nq_tot, chi_dens.nq())?;
        ensure_len("pairing vertex magnetic q-points", nq_tot, chi_magn.nq())?;
        ensure_len("pairing vertex bosonic box", chi_dens.nw(), chi_magn.nw())?;
        let niw = (chi_dens.nw() / 2) as i64;
        let (bare, cm, cd) = match channel {
            PairingChannel::Singlet => (u, 1.5 * u * u, -0.5 * u * u),
            PairingChannel::Triplet => (0.0, -0.5 * u * u, -0.5 * u * u),
        };
        let nd = 4 * niv - 1;
        let offset = 2 * niv as i64 - 1;
        let gamma = KField::from_rows(nq, nd, |iq| {
            let (rd, rm) = (chi_dens.chi_row(iq), chi_magn.chi_row(iq));
            (0..nd as i64)
                .map(|i| {
                    let m = i - offset;
                    if m.abs() <= niw {
                        let iw = (m + niw) as usize;
                        bare + cm * rm[iw] + cd * rd[iw]
                    } else {
                        Complex64::new(bare, 0.0)
                    }
                })
                .collect()
        })?;
        Ok(Self { channel, niv, gamma })
    }

    /// Constant vertex Γ = `value` (bare interaction, used for checks).
    #[must_use]
    pub fn constant(nq: [usize; 3], niv: usize, value: f64) -> Self {
        let gamma = KField::broadcast(nq, &vec![Complex64::new(value, 0.0); 4 * niv - 1]);
        Self {
            channel: PairingChannel::Singlet,
            niv,
            gamma,
        }
    }

    /// Position of the difference n − n' in the stored frequency axis.
    #[must_use]
    pub const fn diff_index(&self, iv: usize, ivp: usize) -> usize {
        iv + 2 * self.niv - 1 - ivp
    }
}
