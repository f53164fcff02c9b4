// SPDX-License-Identifier: AGPL-3.0-only

//! Local vertex extraction and the auxiliary-susceptibility construction.
//!
//! Chain for each channel r and bosonic frequency ω:
//!   1. G2 → generalized susceptibility gchi_r (disconnected part removed)
//!   2. gchi_r → irreducible vertex Γ_r, inverting the local Bethe–Salpeter
//!      equation on the core box with the bubble extended over a shell
//!   3. Γ_r → auxiliary susceptibility gchi_aux = [gchi0⁻¹ + Γ_r − U_r/β²]⁻¹
//!   4. gchi_aux → Fermi–Bose vertex γ_r/β and physical χ_r, both corrected
//!      for the frequencies outside the core box
//!
//! Step 4 is shared with the lattice ladder, where gchi0 becomes q-dependent.

use nalgebra::DMatrix;
use num_complex::Complex64;

use super::bubble::LocalBubble;
use super::{Channel, LocalFourPoint, LocalThreePoint};
use crate::error::{ensure_len, DgaError, Result};
use crate::matsubara;
use crate::numerics::invert;

fn g_on_box(g_loc: &[Complex64], niv: usize) -> Result<&[Complex64]> {
    matsubara::cut_v(g_loc, niv).ok_or_else(|| {
        DgaError::FrequencyBox(format!(
            "local G has niv={}, vertex box needs niv={niv}",
            g_loc.len() / 2
        ))
    })
}

/// gchi_r = β·G2, minus the disconnected 2β·G(ν)G(ν') in the density
/// channel at ω = 0.
///
/// # Errors
///
/// [`DgaError::FrequencyBox`] when G does not cover the vertex box.
pub fn gchir_from_g2(g2: &LocalFourPoint, g_loc: &[Complex64]) -> Result<LocalFourPoint> {
    let niv = g2.niv();
    let g = g_on_box(g_loc, niv)?;
    let beta = g2.beta;
    let mat = g2
        .wn
        .iter()
        .zip(&g2.mat)
        .map(|(&m, g2w)| {
            let mut out = g2w * Complex64::new(beta, 0.0);
            if g2.channel == Channel::Density && m == 0 {
                for i in 0..2 * niv {
                    for j in 0..2 * niv {
                        out[(i, j)] -= 2.0 * beta * g[i] * g[j];
                    }
                }
            }
            out
        })
        .collect();
    Ok(LocalFourPoint {
        channel: g2.channel,
        beta,
        wn: g2.wn.clone(),
        mat,
    })
}

/// Inverse of [`gchir_from_g2`].
///
/// # Errors
///
/// [`DgaError::FrequencyBox`] when G does not cover the vertex box.
pub fn g2_from_gchir(gchir: &LocalFourPoint, g_loc: &[Complex64]) -> Result<LocalFourPoint> {
    let niv = gchir.niv();
    let g = g_on_box(g_loc, niv)?;
    let beta = gchir.beta;
    let mat = gchir
        .wn
        .iter()
        .zip(&gchir.mat)
        .map(|(&m, chi)| {
            let mut out = chi / Complex64::new(beta, 0.0);
            if gchir.channel == Channel::Density && m == 0 {
                for i in 0..2 * niv {
                    for j in 0..2 * niv {
                        out[(i, j)] += 2.0 * g[i] * g[j];
                    }
                }
            }
            out
        })
        .collect();
    Ok(LocalFourPoint {
        channel: gchir.channel,
        beta,
        wn: gchir.wn.clone(),
        mat,
    })
}

fn diag_inverse(gchi0: &[Complex64]) -> DMatrix<Complex64> {
    DMatrix::from_diagonal(&nalgebra::DVector::from_iterator(
        gchi0.len(),
        gchi0.iter().map(Complex64::inv),
    ))
}

fn add_scalar(m: &mut DMatrix<Complex64>, s: f64) {
    m.iter_mut().for_each(|z| *z += s);
}

/// Irreducible vertex Γ_r on the core box of `gchir`.
///
/// The bubble is taken on the enlarged box niv_core + niv_shell:
/// Γ = gchi⁻¹ − [cut(χ_u)]⁻¹ + U_r/β² with χ_u = [gchi0_u⁻¹ + U_r/β²]⁻¹,
/// which reduces to U_r/β² when gchi itself is cut(χ_u).
///
/// # Errors
///
/// Box errors from the bubble, [`DgaError::SingularMatrix`] from inversions.
pub fn gammar_from_gchir(gchir: &LocalFourPoint, bubble: &LocalBubble, u: f64, niv_shell: usize) -> Result<LocalFourPoint> {
    let niv_core = gchir.niv();
    let niv_u = niv_core + niv_shell;
    let beta = gchir.beta;
    let u_r = gchir.channel.u_r(u);
    ensure_len("bubble frequencies", gchir.wn.len(), bubble.wn().len())?;
    let gchi0_u = bubble.gchi0(niv_u)?;
    let ub = u_r / (beta * beta);
    let mat = gchir
        .mat
        .iter()
        .zip(&gchi0_u)
        .map(|(chi, g0)| {
            let mut full = diag_inverse(g0);
            add_scalar(&mut full, ub);
            let inv_full = invert(full, "urange BSE kernel")?;
            let cut = inv_full
                .view((niv_shell, niv_shell), (2 * niv_core, 2 * niv_core))
                .into_owned();
            let inv_cut = invert(cut, "cut urange susceptibility")?;
            let inv_chi = invert(chi.clone(), "generalized susceptibility")?;
            let mut gamma = -(inv_cut - inv_chi);
            add_scalar(&mut gamma, ub);
            Ok(gamma)
        })
        .collect::<Result<Vec<_>>>()?;
    Ok(LocalFourPoint {
        channel: gchir.channel,
        beta,
        wn: gchir.wn.clone(),
        mat,
    })
}

/// Physical χ and Fermi–Bose vertex from Γ and an urange bubble.
#[derive(Clone, Debug)]
pub struct BseSolution {
    /// χ on the urange box.
    pub chi_tilde: Complex64,
    /// χ including the bubble tail beyond the urange box.
    pub chi_asympt: Complex64,
    /// γ/β on the urange box, tail corrected.
    pub vrg: Vec<Complex64>,
}

/// Solve the ladder for one bosonic frequency given Γ on the core box, the
/// bubble `gchi0_u` on the urange box and the bubble tail `chi0_tail`
/// beyond it.
///
/// # Errors
///
/// [`DgaError::SingularMatrix`] or [`DgaError::FrequencyBox`] for a core
/// box larger than the urange box.
pub fn solve_bse_aux(gamma: &DMatrix<Complex64>, gchi0_u: &[Complex64], beta: f64, u_r: f64, chi0_tail: Complex64) -> Result<BseSolution> {
    let niv_core = gamma.nrows() / 2;
    let niv_u = gchi0_u.len() / 2;
    let gchi0_core = matsubara::cut_v(gchi0_u, niv_core).ok_or_else(|| {
        DgaError::FrequencyBox(format!("core box niv={niv_core} exceeds urange niv={niv_u}"))
    })?;
    let norm = 1.0 / (beta * beta);
    let chi0_u = gchi0_u.iter().sum::<Complex64>() * norm;
    let chi0_core = gchi0_core.iter().sum::<Complex64>() * norm;

    let mut kernel = diag_inverse(gchi0_core) + gamma;
    add_scalar(&mut kernel, -u_r * norm);
    let gchi_aux = invert(kernel, "auxiliary susceptibility kernel")?;
    let chi_aux = gchi_aux.sum() * norm;

    let chi_tilde = 1.0 / (1.0 / (chi_aux + chi0_u - chi0_core) + u_r);
    let chi_asympt = chi_tilde + chi0_tail;

    let row_sums = gchi_aux.column_sum();
    let shift = niv_u - niv_core;
    let factor = (1.0 - u_r * chi_tilde) / (1.0 - u_r * chi_asympt);
    let vrg = (0..2 * niv_u)
        .map(|i| {
            let core = if i >= shift && i < shift + 2 * niv_core {
                let j = i - shift;
                row_sums[j] / (gchi0_core[j] * beta)
            } else {
                Complex64::new(1.0 / beta, 0.0)
            };
            core * factor
        })
        .collect();
    Ok(BseSolution {
        chi_tilde,
        chi_asympt,
        vrg,
    })
}

/// Local Fermi–Bose vertex and susceptibility from Γ_r.
///
/// Returns (γ_r/β on the urange box, χ_r including the bubble tail).
///
/// # Errors
///
/// See [`solve_bse_aux`].
pub fn local_vrg_and_chi_tilde(gammar: &LocalFourPoint, bubble: &LocalBubble, u: f64, niv_shell: usize) -> Result<(LocalThreePoint, Vec<Complex64>)> {
    let niv_u = gammar.niv() + niv_shell;
    let u_r = gammar.channel.u_r(u);
    let gchi0_u = bubble.gchi0(niv_u)?;
    let tail = bubble.chi0_asympt_correction(niv_u);
    let mut rows = Vec::with_capacity(gammar.wn.len());
    let mut chi = Vec::with_capacity(gammar.wn.len());
    for ((gamma, g0), t) in gammar.mat.iter().zip(&gchi0_u).zip(&tail) {
        let sol = solve_bse_aux(gamma, g0, gammar.beta, u_r, *t)?;
        rows.push(sol.vrg);
        chi.push(sol.chi_asympt);
    }
    Ok((
        LocalThreePoint {
            channel: gammar.channel,
            beta: gammar.beta,
            wn: gammar.wn.clone(),
            mat: rows,
        },
        chi,
    ))
}

/// Generalized susceptibility on the core box for a frequency-independent
/// vertex U_r/β² over the urange box (the RPA local problem).
///
/// # Errors
///
/// Box or inversion errors.
pub fn rpa_gchir(bubble: &LocalBubble, channel: Channel, u: f64, niv_core: usize, niv_shell: usize) -> Result<LocalFourPoint> {
    let beta = bubble.beta();
    let ub = channel.u_r(u) / (beta * beta);
    let gchi0_u = bubble.gchi0(niv_core + niv_shell)?;
    let mat = gchi0_u
        .iter()
        .map(|g0| {
            let mut k = diag_inverse(g0);
            add_scalar(&mut k, ub);
            let full = invert(k, "RPA kernel")?;
            Ok(full
                .view((niv_shell, niv_shell), (2 * niv_core, 2 * niv_core))
                .into_owned())
        })
        .collect::<Result<Vec<_>>>()?;
    Ok(LocalFourPoint {
        channel,
        beta,
        wn: bubble.wn().to_vec(),
        mat,
    })
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::four_point::chi_rpa;
    use crate::matsubara::{iv, wn};

    fn bubble(beta: f64, niw: usize) -> LocalBubble {
        // Atomic-like G with a finite width so the bubble is smooth.
        let g: Vec<Complex64> = iv(beta, 200)
            .into_iter()
            .map(|z| 1.0 / (z + 0.2 + Complex64::new(0.0, 0.5) * z.im.signum()))
            .collect();
        LocalBubble::new(wn(niw), g, beta)
    }

    #[test]
    fn rpa_input_returns_bare_vertex() {
        let (beta, u) = (2.0, 1.0);
        let b = bubble(beta, 3);
        for channel in [Channel::Density, Channel::Magnetic] {
            let gchi = rpa_gchir(&b, channel, u, 6, 10).unwrap();
            let gamma = gammar_from_gchir(&gchi, &b, u, 10).unwrap();
            let expected = channel.u_r(u) / (beta * beta);
            for m in &gamma.mat {
                for z in m.iter() {
                    assert!((z - expected).norm() < 1e-8, "{channel}: {z} vs {expected}");
                }
            }
        }
    }

    #[test]
    fn rpa_vertex_gives_rpa_susceptibility_and_unit_vrg() {
        let (beta, u) = (2.0, 1.0);
        let b = bubble(beta, 2);
        let gchi = rpa_gchir(&b, Channel::Magnetic, u, 5, 8).unwrap();
        let gamma = gammar_from_gchir(&gchi, &b, u, 8).unwrap();
        let (vrg, chi) = local_vrg_and_chi_tilde(&gamma, &b, u, 8).unwrap();
        let chi0_u = b.chi0(13).unwrap();
        let tail = b.chi0_asympt_correction(13);
        for i in 0..chi.len() {
            let expected = chi_rpa(chi0_u[i], -u) + tail[i];
            assert!((chi[i] - expected).norm() < 1e-8);
        }
        // Without a tail correction factor the core vertex is exactly 1/β.
        let factor = |i: usize| {
            let chi_t = chi_rpa(chi0_u[i], -u);
            (1.0 + u * chi_t) / (1.0 + u * (chi_t + tail[i]))
        };
        for (i, row) in vrg.mat.iter().enumerate() {
            for z in row {
                assert!((z - factor(i) / beta).norm() < 1e-8);
            }
        }
    }

    #[test]
    fn g2_conversion_roundtrip() {
        let beta = 2.0;
        let b = bubble(beta, 1);
        let g: Vec<Complex64> = iv(beta, 200)
            .into_iter()
            .map(|z| 1.0 / (z + 0.2 + Complex64::new(0.0, 0.5) * z.im.signum()))
            .collect();
        let gchi = rpa_gchir(&b, Channel::Density, 1.0, 4, 4).unwrap();
        let g2 = g2_from_gchir(&gchi, &g).unwrap();
        let back = gchir_from_g2(&g2, &g).unwrap();
        for (a, c) in back.mat.iter().zip(&gchi.mat) {
            assert!((a - c).norm() < 1e-12);
        }
    }
}
