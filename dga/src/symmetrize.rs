// SPDX-License-Identifier: AGPL-3.0-only

//! Symmetrisation of worm-sampled impurity data into density and magnetic
//! channels.
//!
//! Each worm component carries a band–spin compound index of four legs.
//! Its spin pattern decides whether it enters a channel with `+`, `−` or
//! not at all; equivalent band combinations (from the user supplied orbital
//! symmetry) share the data. Dividing by 2 (density) or 4 (magnetic) and by
//! the number of equivalent groups yields the channel-resolved G2.

use std::collections::BTreeMap;

use num_complex::Complex64;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::error::{ensure_len, DgaError, Result};
use crate::four_point::Channel;
use crate::io::{ComplexArray, LocalG2File};

/// Which worm quantity is symmetrised.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum SymTarget {
    /// Two-leg bosonic quantity `[ω]`.
    #[serde(rename = "1freq_b")]
    OneFreqBosonic,
    /// Three-leg quantity `[ν][ω]`.
    #[serde(rename = "2freq")]
    TwoFreq,
    /// Full vertex `[ν][ν'][ω]`.
    #[default]
    #[serde(rename = "3freq")]
    ThreeFreq,
}

/// Symmetrisation settings for one inequivalent atom.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct SymmetrizeConfig {
    /// Quantity to symmetrise.
    #[serde(default)]
    pub target: SymTarget,
    /// Correlated bands.
    pub n_bands: usize,
    /// For every band the 1-based list of bands equivalent to it.
    pub sym: Vec<Vec<usize>>,
}

impl SymmetrizeConfig {
    /// Single band, SU(2) only.
    #[must_use]
    pub fn one_band() -> Self {
        Self {
            target: SymTarget::ThreeFreq,
            n_bands: 1,
            sym: vec![vec![1]],
        }
    }
}

/// One worm component as written by the impurity solver.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct WormComponent {
    /// Array shape, bosonic axis last.
    pub shape: Vec<usize>,
    /// Row-major values.
    pub value: ComplexArray,
}

/// Worm components of one inequivalent atom keyed by compound index.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct WormData {
    /// Inverse temperature.
    pub beta: f64,
    /// Components keyed by their 1-based band–spin compound index.
    pub groups: BTreeMap<usize, WormComponent>,
}

/// Channel-resolved output: per band group, one array per bosonic frequency
/// (a single array for [`SymTarget::OneFreqBosonic`]).
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct SymmetrizedData {
    /// Quantity.
    pub target: SymTarget,
    /// Inverse temperature.
    pub beta: f64,
    /// Fermionic half-box (0 for one-frequency data).
    pub niv: usize,
    /// Bosonic half-box.
    pub niw: usize,
    /// Density channel.
    pub dens: BTreeMap<usize, Vec<ComplexArray>>,
    /// Magnetic channel.
    pub magn: BTreeMap<usize, Vec<ComplexArray>>,
}

/// Band and spin of every leg of a compound index.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Components {
    /// Combined band–spin index per leg.
    pub band_spin: Vec<usize>,
    /// Band per leg (0-based).
    pub bands: Vec<usize>,
    /// Spin per leg (0 up, 1 down).
    pub spins: Vec<usize>,
}

/// Decode a 1-based band–spin compound index of `n` legs.
#[must_use]
pub fn index2component_general(n_bands: usize, n: usize, ind: usize) -> Components {
    let mut rest = ind.saturating_sub(1);
    let base = 2 * n_bands;
    let mut out = Components {
        band_spin: Vec::with_capacity(n),
        bands: Vec::with_capacity(n),
        spins: Vec::with_capacity(n),
    };
    for i in 0..n {
        let place = base.pow((n - i - 1) as u32);
        let bs = rest / place;
        rest -= place * bs;
        out.band_spin.push(bs);
        out.spins.push(bs % 2);
        out.bands.push(bs / 2);
    }
    out
}

/// 1-based compound index built from band indices only.
#[must_use]
pub fn component2index_band(n_bands: usize, bands: &[usize]) -> usize {
    let n = bands.len();
    1 + bands
        .iter()
        .enumerate()
        .map(|(i, b)| n_bands.pow((n - i - 1) as u32) * b)
        .sum::<usize>()
}

/// Inverse of [`component2index_band`].
#[must_use]
pub fn index2component_band(n_bands: usize, n: usize, ind: usize) -> Vec<usize> {
    let mut rest = ind.saturating_sub(1);
    (0..n)
        .map(|i| {
            let place = n_bands.pow((n - i - 1) as u32);
            let b = rest / place;
            rest -= b * place;
            b
        })
        .collect()
}

/// Every band must list the same equivalence class as the bands it names.
///
/// # Errors
///
/// [`DgaError::Config`] for inconsistent or out-of-range entries.
pub fn check_sym(n_bands: usize, sym: &[Vec<usize>]) -> Result<()> {
    ensure_len("orbital symmetry bands", n_bands, sym.len())?;
    for class in sym {
        let mut sorted = class.clone();
        sorted.sort_unstable();
        for &j in class {
            if j == 0 || j > n_bands {
                return Err(DgaError::Config(format!("band {j} outside 1..={n_bands}")));
            }
            let mut other = sym[j - 1].clone();
            other.sort_unstable();
            if other != sorted {
                return Err(DgaError::Config("orbital symmetry not consistent".into()));
            }
        }
    }
    Ok(())
}

/// Contribution of a spin pattern to a channel.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SpinAction {
    /// Added.
    Add,
    /// Subtracted.
    Subtract,
    /// Not part of the channel.
    Skip,
}

fn spin_action(channel: Channel, spins: &[usize]) -> Result<SpinAction> {
    let pattern = [spins[0], spins[1], spins[2], spins[3]];
    let action = match (channel, pattern) {
        (Channel::Density, [0, 0, 0, 0] | [0, 0, 1, 1] | [1, 1, 0, 0] | [1, 1, 1, 1]) => SpinAction::Add,
        (Channel::Density, [0, 1, 1, 0] | [1, 0, 0, 1]) => SpinAction::Skip,
        (Channel::Magnetic, [0, 0, 0, 0] | [0, 1, 1, 0] | [1, 0, 0, 1] | [1, 1, 1, 1]) => SpinAction::Add,
        (Channel::Magnetic, [0, 0, 1, 1] | [1, 1, 0, 0]) => SpinAction::Subtract,
        _ => {
            return Err(DgaError::InvalidArgument(format!(
                "unknown spin combination {pattern:?}"
            )))
        }
    };
    Ok(action)
}

/// Channel action and the equivalent band groups of one component.
///
/// # Errors
///
/// Unknown spin combinations.
pub fn symgroups(channel: Channel, comp: &Components, sym: &[Vec<usize>], n_bands: usize) -> Result<(SpinAction, Vec<usize>)> {
    let action = spin_action(channel, &comp.spins)?;
    let [b1, b2, b3, b4] = [comp.bands[0], comp.bands[1], comp.bands[2], comp.bands[3]];
    let class = |b: usize| sym[b].iter().map(|i| i - 1);
    let mut groups = Vec::new();
    if [b1, b2, b3, b4].iter().all(|&b| sym[b].len() == 1) {
        groups.push(component2index_band(n_bands, &comp.bands));
    } else if b1 == b2 && b1 == b3 && b1 == b4 {
        groups.extend(class(b1).map(|i| component2index_band(n_bands, &[i, i, i, i])));
    } else {
        // Kanamori pairs (i i j j), (i j i j), (i j j i) with i ≠ j; the
        // layout picks the first or second band for every leg.
        let (x, y, layout) = if b1 == b2 && b3 == b4 && b2 != b3 {
            (b1, b3, [0, 0, 1, 1])
        } else if b1 == b3 && b2 == b4 && b1 != b2 {
            (b1, b2, [0, 1, 0, 1])
        } else if b1 == b4 && b2 == b3 && b1 != b2 {
            (b1, b2, [0, 1, 1, 0])
        } else {
            return Ok((action, groups));
        };
        for i in class(x) {
            for j in class(y).filter(|&j| j != i) {
                let pair = [i, j];
                groups.push(component2index_band(n_bands, &layout.map(|s: usize| pair[s])));
            }
        }
    }
    Ok((action, groups))
}

fn bosonic_slices(target: SymTarget, comp: &WormComponent) -> Result<(usize, Vec<Vec<Complex64>>)> {
    let mut values = comp.value.to_vec()?;
    let n_nan = values.iter().filter(|z| z.re.is_nan() || z.im.is_nan()).count();
    if n_nan > 0 {
        warn!(n_nan, "NaN in worm data, setting to zero");
        values
            .iter_mut()
            .filter(|z| z.re.is_nan() || z.im.is_nan())
            .for_each(|z| *z = Complex64::new(0.0, 0.0));
    }
    let expected: usize = comp.shape.iter().product();
    ensure_len("worm component values", expected, values.len())?;
    match (target, comp.shape.as_slice()) {
        (SymTarget::OneFreqBosonic, [_]) => Ok((0, vec![values])),
        (SymTarget::TwoFreq, &[nf, nb]) => Ok((
            nf / 2,
            (0..nb)
                .map(|iw| (0..nf).map(|i| values[i * nb + iw]).collect())
                .collect(),
        )),
        (SymTarget::ThreeFreq, &[nf, nf2, nb]) if nf == nf2 => Ok((
            nf / 2,
            (0..nb)
                .map(|iw| {
                    // Transpose of x[:, :, ω].
                    (0..nf)
                        .flat_map(|a| (0..nf).map(move |b| (a, b)))
                        .map(|(a, b)| values[(b * nf + a) * nb + iw])
                        .collect()
                })
                .collect(),
        )),
        (_, shape) => Err(DgaError::InvalidArgument(format!(
            "worm shape {shape:?} does not match target {target:?}"
        ))),
    }
}

/// Symmetrise all worm components into density and magnetic band groups.
///
/// # Errors
///
/// Inconsistent symmetry input, unknown spin patterns, shape errors.
pub fn symmetrize(data: &WormData, config: &SymmetrizeConfig) -> Result<SymmetrizedData> {
    check_sym(config.n_bands, &config.sym)?;
    let nb = config.n_bands;
    let expected_groups = 6 * (3 * nb * nb - 2 * nb);
    if data.groups.len() != expected_groups {
        warn!(
            found = data.groups.len(),
            expected = expected_groups,
            "number of worm groups is not consistent with a Kanamori interaction"
        );
    }
    let mut out = SymmetrizedData {
        target: config.target,
        beta: data.beta,
        ..SymmetrizedData::default()
    };
    let mut accum: [BTreeMap<usize, Vec<Vec<Complex64>>>; 2] = [BTreeMap::new(), BTreeMap::new()];
    for (&index, comp) in &data.groups {
        let components = index2component_general(nb, 4, index);
        let (niv, slices) = bosonic_slices(config.target, comp)?;
        out.niv = niv;
        out.niw = match config.target {
            SymTarget::OneFreqBosonic => slices[0].len() / 2,
            _ => slices.len() / 2,
        };
        for (slot, channel) in [Channel::Density, Channel::Magnetic].into_iter().enumerate() {
            let (action, groups) = symgroups(channel, &components, &config.sym, nb)?;
            debug!(index, %channel, ?action, ?groups, "worm group");
            let sign = match action {
                SpinAction::Add => 1.0,
                SpinAction::Subtract => -1.0,
                SpinAction::Skip => continue,
            };
            let prefactor = match channel {
                Channel::Density => 2.0,
                Channel::Magnetic => 4.0,
            };
            let scale = sign / (prefactor * groups.len() as f64);
            for g in groups {
                let target = accum[slot].entry(g).or_insert_with(|| {
                    slices
                        .iter()
                        .map(|s| vec![Complex64::new(0.0, 0.0); s.len()])
                        .collect()
                });
                for (t, s) in target.iter_mut().zip(&slices) {
                    for (a, b) in t.iter_mut().zip(s) {
                        *a += b * scale;
                    }
                }
            }
        }
    }
    let [dens, magn] = accum;
    let store = |m: BTreeMap<usize, Vec<Vec<Complex64>>>| {
        m.into_iter()
            .map(|(k, v)| (k, v.iter().map(|s| ComplexArray::from_slice(s)).collect()))
            .collect()
    };
    out.dens = store(dens);
    out.magn = store(magn);
    info!(
        n_groups = data.groups.len(),
        n_dens = out.dens.len(),
        n_magn = out.magn.len(),
        "worm data symmetrised"
    );
    Ok(out)
}

impl SymmetrizedData {
    /// Local G2 of one band group in the channel, ready for the ladder.
    ///
    /// # Errors
    ///
    /// [`DgaError::InvalidArgument`] for non-vertex targets or a missing
    /// band group.
    pub fn to_local_g2(&self, channel: Channel, band_group: usize) -> Result<LocalG2File> {
        if self.target != SymTarget::ThreeFreq {
            return Err(DgaError::InvalidArgument("only full vertices convert to G2".into()));
        }
        let map = match channel {
            Channel::Density => &self.dens,
            Channel::Magnetic => &self.magn,
        };
        let slices = map
            .get(&band_group)
            .ok_or_else(|| DgaError::InvalidArgument(format!("band group {band_group} not present")))?;
        let mut re = Vec::new();
        let mut im = Vec::new();
        for s in slices {
            re.extend_from_slice(&s.re);
            im.extend_from_slice(&s.im);
        }
        let niw = self.niw as i64;
        Ok(LocalG2File {
            channel,
            beta: self.beta,
            wn: (-niw..=niw).collect(),
            niv: self.niv,
            data: ComplexArray { re, im },
        })
    }
}

/// Average one-particle data `[band][spin][ν]` over spins and equivalent
/// bands.
///
/// # Errors
///
/// Inconsistent symmetry input.
pub fn symmetrize_one_particle(values: &[Vec<Vec<Complex64>>], sym: &[Vec<usize>]) -> Result<Vec<Vec<Vec<Complex64>>>> {
    check_sym(values.len(), sym)?;
    values
        .iter()
        .enumerate()
        .map(|(band, spins)| {
            let nfreq = spins.first().map_or(0, Vec::len);
            let mut mean = vec![Complex64::new(0.0, 0.0); nfreq];
            let class = &sym[band];
            for &b in class {
                let src = &values[b - 1];
                for spin in src {
                    ensure_len("one-particle frequencies", nfreq, spin.len())?;
                    for (m, v) in mean.iter_mut().zip(spin) {
                        *m += v / (class.len() * src.len()) as f64;
                    }
                }
            }
            Ok(vec![mean; spins.len()])
        })
        .collect()
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn compound_index_roundtrip() {
        // Two bands, four legs: index 1 is all band 0 spin up.
        let c = index2component_general(2, 4, 1);
        assert_eq!(c.bands, vec![0, 0, 0, 0]);
        assert_eq!(c.spins, vec![0, 0, 0, 0]);
        let c = index2component_general(2, 4, 1 + 64 + 8);
        assert_eq!(c.band_spin, vec![1, 0, 2, 0]);
        assert_eq!(c.spins, vec![1, 0, 0, 0]);
        assert_eq!(c.bands, vec![0, 0, 1, 0]);
        let ind = component2index_band(3, &[2, 0, 1, 1]);
        assert_eq!(index2component_band(3, 4, ind), vec![2, 0, 1, 1]);
    }

    #[test]
    fn inconsistent_symmetry_is_rejected() {
        assert!(check_sym(2, &[vec![1, 2], vec![2]]).is_err());
        assert!(check_sym(2, &[vec![1, 2], vec![2, 1]]).is_ok());
        assert!(check_sym(1, &[vec![2]]).is_err());
    }

    #[test]
    fn kanamori_groups_for_equivalent_bands() {
        let sym = vec![vec![1, 2], vec![1, 2]];
        let comp = Components {
            band_spin: vec![0, 0, 2, 2],
            bands: vec![0, 0, 1, 1],
            spins: vec![0, 0, 0, 0],
        };
        let (action, groups) = symgroups(Channel::Magnetic, &comp, &sym, 2).unwrap();
        assert_eq!(action, SpinAction::Add);
        assert_eq!(
            groups,
            vec![component2index_band(2, &[0, 0, 1, 1]), component2index_band(2, &[1, 1, 0, 0])]
        );
    }

    fn one_band_vertex(nf: usize, nb: usize, value: f64) -> WormComponent {
        let n = nf * nf * nb;
        WormComponent {
            shape: vec![nf, nf, nb],
            value: ComplexArray {
                re: (0..n).map(|i| value + i as f64).collect(),
                im: vec![0.0; n],
            },
        }
    }

    #[test]
    fn one_band_channels() {
        // Spin patterns of one band: index = 1 + Σ bs_i 2^(3-i).
        let uuuu = 1;
        let uudd = 1 + 2 + 1;
        let uddu = 1 + 4 + 2;
        let mut groups = BTreeMap::new();
        groups.insert(uuuu, one_band_vertex(2, 3, 1.0));
        groups.insert(uudd, one_band_vertex(2, 3, 10.0));
        groups.insert(uddu, one_band_vertex(2, 3, 100.0));
        let data = WormData { beta: 5.0, groups };
        let out = symmetrize(&data, &SymmetrizeConfig::one_band()).unwrap();
        assert_eq!(out.niv, 1);
        assert_eq!(out.niw, 1);
        // Element (ν=0, ν'=0, ω=0) is the flat index 0.
        let d = out.dens[&1][0].re[0];
        let m = out.magn[&1][0].re[0];
        assert!((d - (1.0 + 10.0) / 2.0).abs() < 1e-12);
        assert!((m - (1.0 - 10.0 + 100.0) / 4.0).abs() < 1e-12);
        // Transposed storage: out[0][1] at ω = 0 holds x[1][0][0], flat index 6.
        let d01 = out.dens[&1][0].re[1];
        assert!((d01 - ((1.0 + 6.0) + (10.0 + 6.0)) / 2.0).abs() < 1e-12);
        let g2 = out.to_local_g2(Channel::Density, 1).unwrap();
        assert_eq!(g2.wn, vec![-1, 0, 1]);
        assert_eq!(g2.data.len(), 3 * 4);
    }

    #[test]
    fn nan_entries_become_zero() {
        let mut comp = one_band_vertex(2, 1, 1.0);
        comp.value.re[0] = f64::NAN;
        let (_, slices) = bosonic_slices(SymTarget::ThreeFreq, &comp).unwrap();
        assert_eq!(slices[0][0], Complex64::new(0.0, 0.0));
    }

    #[test]
    fn one_particle_average() {
        let c = |x: f64| Complex64::new(x, 0.0);
        let values = vec![vec![vec![c(1.0)], vec![c(3.0)]], vec![vec![c(5.0)], vec![c(7.0)]]];
        let out = symmetrize_one_particle(&values, &[vec![1, 2], vec![1, 2]]).unwrap();
        assert_eq!(out[0][1], c(4.0));
        assert_eq!(out[1][0], c(4.0));
    }
}
