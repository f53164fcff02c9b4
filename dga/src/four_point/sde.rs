// SPDX-License-Identifier: AGPL-3.0-only

//! Schwinger–Dyson equation: self-energy from the Fermi–Bose vertices and
//! susceptibilities of both channels.
//!
//! Σ(k, ν) = U n/2 − U/(2β N_q) Σ_{q,ω} K(q, ω; ν) G(k − q, ν − ω),
//! K = γ_d (1 − U_d χ_d) − γ_m (1 − U_m χ_m), γ = β · vrg.
//!
//! To second order in U (γ = 1, χ = χ0) this reduces to
//! Σ⁽²⁾ = (U²/β N_q) Σ χ0 G, the exact second-order self-energy.

use num_complex::Complex64;
use rayon::prelude::*;
use tracing::info;

use super::ladder::LadderSusceptibility;
use super::{Channel, LocalThreePoint};
use crate::error::{ensure_len, DgaError, Result};
use crate::field::KField;
use crate::lattice::{KGrid, QGrid};
use crate::matsubara;
use crate::two_point::{hartree, GreensFunction};

fn kernel_weight(channel: Channel, u: f64, chi: Complex64) -> Complex64 {
    1.0 - channel.u_r(u) * chi
}

fn check_g_box(niv: usize, wn: &[i64], niv_g: usize) -> Result<()> {
    let max_w = wn.iter().map(|m| m.unsigned_abs() as usize).max().unwrap_or(0);
    if niv + max_w > niv_g {
        return Err(DgaError::FrequencyBox(format!(
            "Schwinger-Dyson needs G on niv≥{}, have {niv_g}",
            niv + max_w
        )));
    }
    Ok(())
}

/// Local Schwinger–Dyson equation, Hartree term included.
///
/// Returns Σ on the full-range box of the vertices.
///
/// # Errors
///
/// [`DgaError::FrequencyBox`] when G does not reach ν − ω; shape errors
/// for mismatched channels.
pub fn local_sde(vrg_dens: &LocalThreePoint, vrg_magn: &LocalThreePoint, chi_dens: &[Complex64], chi_magn: &[Complex64], g_loc: &[Complex64], u: f64, n: f64) -> Result<Vec<Complex64>> {
    let niv = vrg_dens.niv();
    let beta = vrg_dens.beta;
    ensure_len("local SDE magnetic vertex", niv, vrg_magn.niv())?;
    ensure_len("local SDE density chi", vrg_dens.wn.len(), chi_dens.len())?;
    ensure_len("local SDE magnetic chi", vrg_magn.wn.len(), chi_magn.len())?;
    let niv_g = g_loc.len() / 2;
    check_g_box(niv, &vrg_dens.wn, niv_g)?;
    let mut sigma = vec![Complex64::new(0.0, 0.0); 2 * niv];
    for (iw, &m) in vrg_dens.wn.iter().enumerate() {
        let wd = kernel_weight(Channel::Density, u, chi_dens[iw]);
        let wm = kernel_weight(Channel::Magnetic, u, chi_magn[iw]);
        let (rd, rm) = (&vrg_dens.mat[iw], &vrg_magn.mat[iw]);
        for (iv, nv) in matsubara::vn(niv).into_iter().enumerate() {
            let g = g_loc[(nv - m + niv_g as i64) as usize];
            sigma[iv] += beta * (rd[iv] * wd - rm[iv] * wm) * g;
        }
    }
    let h = hartree(u, n);
    Ok(sigma
        .into_iter()
        .map(|s| h - u / (2.0 * beta) * s)
        .collect())
}

/// Lattice Schwinger–Dyson equation on n ∈ [−niv, niv), without the
/// Hartree term.
///
/// `chi_dens`/`chi_magn` must live on the full q-grid of `qgrid`.
///
/// # Errors
///
/// Box and shape errors.
pub fn nonlocal_sde(gk: &GreensFunction, kgrid: &KGrid, qgrid: &QGrid, chi_dens: &LadderSusceptibility, chi_magn: &LadderSusceptibility, u: f64, niv: usize) -> Result<KField> {
    let nq_tot = qgrid.grid().nk_tot();
    ensure_len("density ladder q-points", nq_tot, chi_dens.nq())?;
    ensure_len("magnetic ladder q-points", nq_tot, chi_magn.nq())?;
    if niv > chi_dens.niv_vrg || niv > chi_magn.niv_vrg {
        return Err(DgaError::FrequencyBox(format!(
            "self-energy box niv={niv} exceeds vertex box niv={}",
            chi_dens.niv_vrg.min(chi_magn.niv_vrg)
        )));
    }
    let wn = chi_dens.wn.clone();
    let niv_g = gk.niv_full();
    check_g_box(niv, &wn, niv_g)?;
    let beta = gk.beta();
    let nw = wn.len();

    // K(q, ω; ν) on the requested box.
    let mut kernel = vec![Complex64::new(0.0, 0.0); nq_tot * nw * 2 * niv];
    kernel
        .par_chunks_mut(nw * 2 * niv)
        .enumerate()
        .for_each(|(iq, block)| {
            for iw in 0..nw {
                let wd = kernel_weight(Channel::Density, u, chi_dens.chi_row(iq)[iw]);
                let wm = kernel_weight(Channel::Magnetic, u, chi_magn.chi_row(iq)[iw]);
                let od = chi_dens.niv_vrg - niv;
                let om = chi_magn.niv_vrg - niv;
                let (rd, rm) = (chi_dens.vrg(iq, iw), chi_magn.vrg(iq, iw));
                for iv in 0..2 * niv {
                    block[iw * 2 * niv + iv] = beta * (rd[od + iv] * wd - rm[om + iv] * wm);
                }
            }
        });

    let shifts: Vec<[usize; 3]> = (0..nq_tot).map(|iq| qgrid.shift(iq)).collect();
    let g = gk.field();
    let vn = matsubara::vn(niv);
    let prefactor = -u / (2.0 * beta * nq_tot as f64);
    info!(nk = kgrid.nk_tot(), nq = nq_tot, niv, "lattice Schwinger-Dyson equation");
    let mut out = KField::zeros(kgrid.nk(), 2 * niv);
    out.as_mut_slice()
        .par_chunks_mut(2 * niv)
        .enumerate()
        .for_each(|(ik, row)| {
            for (iq, q) in shifts.iter().enumerate() {
                let gkq = g.row(kgrid.k_minus_q(ik, *q));
                for (iw, &m) in wn.iter().enumerate() {
                    let kq = &kernel[(iq * nw + iw) * 2 * niv..(iq * nw + iw + 1) * 2 * niv];
                    for (iv, &nv) in vn.iter().enumerate() {
                        row[iv] += kq[iv] * gkq[(nv - m + niv_g as i64) as usize];
                    }
                }
            }
            row.iter_mut().for_each(|s| *s *= prefactor);
        });
    Ok(out)
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::four_point::LocalBubble;
    use crate::matsubara::{iv, wn};

    fn g_atomic(beta: f64, niv: usize) -> Vec<Complex64> {
        iv(beta, niv)
            .into_iter()
            .map(|z| 1.0 / (z + Complex64::new(0.0, 0.3) * z.im.signum()))
            .collect()
    }

    #[test]
    fn second_order_limit() {
        // γ = 1 and χ = χ0 reproduce U²/β Σ_ω χ0(ω) G(ν − ω) + Hartree.
        let (beta, u, n) = (2.0, 0.5, 1.0);
        let niw = 4;
        let niv = 6;
        let g = g_atomic(beta, 100);
        let bubble = LocalBubble::new(wn(niw), g.clone(), beta);
        let chi0 = bubble.chi0(60).unwrap();
        let unit = |ch| LocalThreePoint {
            channel: ch,
            beta,
            wn: wn(niw),
            mat: vec![vec![Complex64::new(1.0 / beta, 0.0); 2 * niv]; 2 * niw + 1],
        };
        let (vd, vm) = (unit(Channel::Density), unit(Channel::Magnetic));
        let sigma = local_sde(&vd, &vm, &chi0, &chi0, &g, u, n).unwrap();
        let niv_g = 100i64;
        for (iv, nv) in matsubara::vn(niv).into_iter().enumerate() {
            let mut expected = Complex64::new(hartree(u, n), 0.0);
            for (iw, m) in wn(niw).into_iter().enumerate() {
                expected += u * u / beta * chi0[iw] * g[(nv - m + niv_g) as usize];
            }
            assert!((sigma[iv] - expected).norm() < 1e-12);
        }
    }

    #[test]
    fn local_sde_checks_green_box() {
        let beta = 2.0;
        let g = g_atomic(beta, 5);
        let unit = |ch| LocalThreePoint {
            channel: ch,
            beta,
            wn: wn(2),
            mat: vec![vec![Complex64::new(0.5, 0.0); 8]; 5],
        };
        let chi = vec![Complex64::new(0.1, 0.0); 5];
        let err = local_sde(&unit(Channel::Density), &unit(Channel::Magnetic), &chi, &chi, &g, 1.0, 1.0);
        assert!(matches!(err, Err(DgaError::FrequencyBox(_))));
    }
}
