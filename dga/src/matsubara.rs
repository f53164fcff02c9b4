// SPDX-License-Identifier: AGPL-3.0-only

//! Matsubara frequency grids and index conventions.
//!
//! Fermionic arrays cover n ∈ [−N, N) and are stored at position n + N, with
//! ν_n = (2n + 1)π/β. Bosonic arrays cover m ∈ [−M, M] stored at m + M, with
//! ω_m = 2mπ/β. Full-range fermionic arrays of real-time quantities obey
//! f(−ν) = f(ν)*, which is what [`fermionic_full_nu_range`] uses to rebuild
//! them from the positive half.

use num_complex::Complex64;
use std::f64::consts::PI;

/// Fermionic indices n ∈ [−niv, niv).
#[must_use]
pub fn vn(niv: usize) -> Vec<i64> {
    let n = niv as i64;
    (-n..n).collect()
}

/// Bosonic indices m ∈ [−niw, niw].
#[must_use]
pub fn wn(niw: usize) -> Vec<i64> {
    let n = niw as i64;
    (-n..=n).collect()
}

/// Fermionic Matsubara frequency ν_n.
#[must_use]
pub fn fermionic(beta: f64, n: i64) -> f64 {
    (2 * n + 1) as f64 * PI / beta
}

/// Bosonic Matsubara frequency ω_m.
#[must_use]
pub fn bosonic(beta: f64, m: i64) -> f64 {
    (2 * m) as f64 * PI / beta
}

/// ν_n for n ∈ [−niv, niv).
#[must_use]
pub fn fermionic_frequencies(beta: f64, niv: usize) -> Vec<f64> {
    vn(niv).into_iter().map(|n| fermionic(beta, n)).collect()
}

/// ω_m for m ∈ [−niw, niw].
#[must_use]
pub fn bosonic_frequencies(beta: f64, niw: usize) -> Vec<f64> {
    wn(niw).into_iter().map(|m| bosonic(beta, m)).collect()
}

/// iν_n for n ∈ [−niv, niv).
#[must_use]
pub fn iv(beta: f64, niv: usize) -> Vec<Complex64> {
    vn(niv)
        .into_iter()
        .map(|n| Complex64::new(0.0, fermionic(beta, n)))
        .collect()
}

/// iν_n for n ∈ [n_min, n_max).
#[must_use]
pub fn iv_plus(beta: f64, n_max: usize, n_min: usize) -> Vec<Complex64> {
    (n_min as i64..n_max as i64)
        .map(|n| Complex64::new(0.0, fermionic(beta, n)))
        .collect()
}

/// Rebuild a full-range array from its positive-frequency half using
/// f(−ν) = f(ν)*.
#[must_use]
pub fn fermionic_full_nu_range(pos: &[Complex64]) -> Vec<Complex64> {
    let mut full = Vec::with_capacity(2 * pos.len());
    full.extend(pos.iter().rev().map(Complex64::conj));
    full.extend_from_slice(pos);
    full
}

/// Rebuild a full bosonic array m ∈ [−M, M] from m ∈ [0, M] using
/// χ(−ω) = χ(ω)*.
#[must_use]
pub fn wplus_to_wfull(pos: &[Complex64]) -> Vec<Complex64> {
    let mut full = Vec::with_capacity(2 * pos.len().saturating_sub(1) + 1);
    full.extend(pos.iter().skip(1).rev().map(Complex64::conj));
    full.extend_from_slice(pos);
    full
}

/// Central window n ∈ [−niv_cut, niv_cut) of a full-range fermionic array.
///
/// Returns `None` when the array is smaller than the requested window.
#[must_use]
pub fn cut_v(full: &[Complex64], niv_cut: usize) -> Option<&[Complex64]> {
    let niv = full.len() / 2;
    if niv_cut > niv {
        return None;
    }
    Some(&full[niv - niv_cut..niv + niv_cut])
}

/// Insert a core array into the centre of an asymptotic array of the same
/// kind: the result keeps the asymptotic values outside the core window.
///
/// Both arrays are full range; `core.len() <= asympt.len()`.
#[must_use]
pub fn concatenate_core_asympt(core: &[Complex64], asympt: &[Complex64]) -> Vec<Complex64> {
    let niv_core = core.len() / 2;
    let niv_full = asympt.len() / 2;
    let mut out = asympt.to_vec();
    if niv_core <= niv_full {
        out[niv_full - niv_core..niv_full + niv_core].copy_from_slice(core);
    }
    out
}

/// Linear storage position of a centred index.
#[must_use]
pub fn cen2lin(m: i64, start: i64) -> usize {
    (m - start) as usize
}

/// Position of ν_n in a full-range array of half-size `niv`, if contained.
#[must_use]
pub fn fermionic_position(n: i64, niv: usize) -> Option<usize> {
    let idx = n + niv as i64;
    if idx >= 0 && idx < 2 * niv as i64 {
        Some(idx as usize)
    } else {
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn grids_have_expected_extent() {
        assert_eq!(vn(3), vec![-3, -2, -1, 0, 1, 2]);
        assert_eq!(wn(2), vec![-2, -1, 0, 1, 2]);
        let beta = 10.0;
        let v = fermionic_frequencies(beta, 2);
        assert!((v[2] - PI / beta).abs() < 1e-15);
        assert!((v[1] + PI / beta).abs() < 1e-15);
        let w = bosonic_frequencies(beta, 1);
        assert!(w[1].abs() < 1e-15);
        assert!((w[2] - 2.0 * PI / beta).abs() < 1e-15);
    }

    #[test]
    fn iv_plus_starts_at_nmin() {
        let z = iv_plus(1.0, 3, 1);
        assert_eq!(z.len(), 2);
        assert!((z[0].im - 3.0 * PI).abs() < 1e-12);
    }

    #[test]
    fn full_range_is_conjugate_symmetric() {
        let pos = vec![Complex64::new(1.0, -2.0), Complex64::new(0.5, -1.0)];
        let full = fermionic_full_nu_range(&pos);
        assert_eq!(full.len(), 4);
        assert_eq!(full[0], Complex64::new(0.5, 1.0));
        assert_eq!(full[1], Complex64::new(1.0, 2.0));
        assert_eq!(full[2], pos[0]);
    }

    #[test]
    fn bosonic_full_range_keeps_zero_once() {
        let pos = vec![Complex64::new(1.0, 0.0), Complex64::new(0.3, 0.1)];
        let full = wplus_to_wfull(&pos);
        assert_eq!(full.len(), 3);
        assert_eq!(full[0], Complex64::new(0.3, -0.1));
        assert_eq!(full[1], Complex64::new(1.0, 0.0));
    }

    #[test]
    fn cut_and_concatenate_are_consistent() {
        let full: Vec<Complex64> = (0..8).map(|i| Complex64::new(f64::from(i), 0.0)).collect();
        let core = cut_v(&full, 2).map(<[Complex64]>::to_vec);
        assert_eq!(core.as_deref().map(<[Complex64]>::len), Some(4));
        assert!(cut_v(&full, 5).is_none());
        let zeros = vec![Complex64::new(0.0, 0.0); 8];
        let merged = concatenate_core_asympt(core.as_deref().unwrap_or(&[]), &zeros);
        assert_eq!(merged[2].re, 2.0);
        assert_eq!(merged[5].re, 5.0);
        assert_eq!(merged[1].re, 0.0);
        assert_eq!(merged[6].re, 0.0);
    }

    #[test]
    fn positions_respect_box() {
        assert_eq!(fermionic_position(-2, 2), Some(0));
        assert_eq!(fermionic_position(1, 2), Some(3));
        assert_eq!(fermionic_position(2, 2), None);
        assert_eq!(cen2lin(-3, -3), 0);
    }
}
