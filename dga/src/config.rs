// SPDX-License-Identifier: AGPL-3.0-only

//! Run configuration read from YAML.
//!
//! Every section is optional; missing keys take the defaults below. Box
//! sizes left unset are taken from the two-particle input, so a minimal
//! config only names the input directory and the momentum grid.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::ana_cont::{MaxentOptions, MeshType};
use crate::eliashberg::{FrequencyParity, GapSymmetry, PairingChannel, PowerIteration};
use crate::error::{DgaError, Result};
use crate::io::uniquify_path;
use crate::lambda_correction::LambdaCorrectionType;
use crate::lattice::{KGrid, KSymmetry, QGrid, RealSpaceHopping};
use crate::postproc::PolyFitSettings;
use crate::tolerances;

/// Input file locations.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct InputConfig {
    /// Directory holding the input files.
    pub path: PathBuf,
    /// One-particle DMFT data.
    pub fname_1p: String,
    /// Density-channel G2.
    pub fname_g2_dens: String,
    /// Magnetic-channel G2.
    pub fname_g2_magn: String,
}

impl Default for InputConfig {
    fn default() -> Self {
        Self {
            path: PathBuf::from("."),
            fname_1p: "dmft_input.json".into(),
            fname_g2_dens: "g2_dens.json".into(),
            fname_g2_magn: "g2_magn.json".into(),
        }
    }
}

impl InputConfig {
    /// Path of the one-particle file.
    #[must_use]
    pub fn one_particle(&self) -> PathBuf {
        self.path.join(&self.fname_1p)
    }

    /// Paths of the density and magnetic G2 files.
    #[must_use]
    pub fn two_particle(&self) -> (PathBuf, PathBuf) {
        (self.path.join(&self.fname_g2_dens), self.path.join(&self.fname_g2_magn))
    }
}

/// Frequency boxes as requested. `None` means "everything the input has".
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct BoxSizes {
    /// Bosonic half-box of the vertex.
    pub niw_core: Option<usize>,
    /// Fermionic half-box of the vertex.
    pub niv_core: Option<usize>,
    /// Shell frequencies treated with the bare-U asymptotics.
    pub niv_shell: usize,
    /// Frequencies of G beyond the self-energy core.
    pub niv_asympt: usize,
}

impl Default for BoxSizes {
    fn default() -> Self {
        Self {
            niw_core: None,
            niv_core: None,
            niv_shell: 0,
            niv_asympt: 500,
        }
    }
}

/// Frequency boxes after checking them against the input.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResolvedBoxes {
    /// Bosonic half-box.
    pub niw_core: usize,
    /// Fermionic half-box of the vertex core.
    pub niv_core: usize,
    /// Shell width.
    pub niv_shell: usize,
    /// `niv_core + niv_shell`.
    pub niv_full: usize,
    /// Asymptotic range of G.
    pub niv_asympt: usize,
}

impl BoxSizes {
    /// Fill unset boxes from the G2 input and reject boxes larger than it.
    ///
    /// # Errors
    ///
    /// [`DgaError::FrequencyBox`] when a requested box exceeds the input.
    pub fn resolve(&self, input_niw: usize, input_niv: usize) -> Result<ResolvedBoxes> {
        let niw_core = self.niw_core.unwrap_or(input_niw);
        let niv_core = self.niv_core.unwrap_or(input_niv);
        if niw_core > input_niw || niv_core > input_niv {
            return Err(DgaError::FrequencyBox(format!(
                "requested vertex box (niw={niw_core}, niv={niv_core}) exceeds input (niw={input_niw}, niv={input_niv})"
            )));
        }
        if niv_core == 0 {
            return Err(DgaError::FrequencyBox("empty fermionic vertex box".into()));
        }
        Ok(ResolvedBoxes {
            niw_core,
            niv_core,
            niv_shell: self.niv_shell,
            niv_full: niv_core + self.niv_shell,
            niv_asympt: self.niv_asympt,
        })
    }
}

/// Named symmetry sets of the momentum grid.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SymmetrySet {
    /// Square lattice (C4v).
    #[default]
    TwoDimensionalSquare,
    /// Reflections only.
    QuasiOneDimensionalSquare,
    /// No reduction.
    None,
}

impl SymmetrySet {
    /// Generators of the set.
    #[must_use]
    pub fn generators(self) -> Vec<KSymmetry> {
        match self {
            Self::TwoDimensionalSquare => KSymmetry::two_dimensional_square(),
            Self::QuasiOneDimensionalSquare => KSymmetry::quasi_one_dimensional_square(),
            Self::None => Vec::new(),
        }
    }
}

/// Lattice, band structure and momentum grids.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LatticeConfig {
    /// Nearest-neighbour hopping.
    pub t: f64,
    /// Next-nearest-neighbour hopping.
    pub tp: f64,
    /// Third-neighbour hopping.
    pub tpp: f64,
    /// Explicit hopping table; overrides `t`, `tp`, `tpp`.
    pub hopping: Option<RealSpaceHopping>,
    /// k-grid.
    pub nk: [usize; 3],
    /// q-grid; defaults to the k-grid.
    pub nq: Option<[usize; 3]>,
    /// Symmetries used for the irreducible wedge.
    pub symmetries: SymmetrySet,
}

impl Default for LatticeConfig {
    fn default() -> Self {
        Self {
            t: 1.0,
            tp: 0.0,
            tpp: 0.0,
            hopping: None,
            nk: [16, 16, 1],
            nq: None,
            symmetries: SymmetrySet::default(),
        }
    }
}

impl LatticeConfig {
    /// Hopping table of the run.
    #[must_use]
    pub fn hopping(&self) -> RealSpaceHopping {
        self.hopping
            .clone()
            .unwrap_or_else(|| RealSpaceHopping::one_band_2d_t_tp_tpp(self.t, self.tp, self.tpp))
    }

    /// q-grid dimensions.
    #[must_use]
    pub fn nq(&self) -> [usize; 3] {
        self.nq.unwrap_or(self.nk)
    }

    /// Build the k- and q-grids.
    ///
    /// # Errors
    ///
    /// Propagates grid construction errors (zero sizes, q-grid not a
    /// sub-lattice of the k-grid).
    pub fn grids(&self) -> Result<(KGrid, QGrid)> {
        let kgrid = KGrid::new(self.nk, self.symmetries.generators())?;
        let qgrid = QGrid::new(&kgrid, self.nq())?;
        Ok((kgrid, qgrid))
    }
}

/// Ladder and λ-correction settings.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DgaSettings {
    /// λ-correction variant.
    pub lambda_corr: LambdaCorrectionType,
    /// Radius around the maximum used by the Ornstein–Zernike fit.
    pub oz_radius: f64,
}

impl Default for DgaSettings {
    fn default() -> Self {
        Self {
            lambda_corr: LambdaCorrectionType::Spch,
            oz_radius: 1.0,
        }
    }
}

/// Linearised gap equation.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EliashbergConfig {
    /// Solve the gap equation.
    #[serde(rename = "do")]
    pub enabled: bool,
    /// Pair spin structure.
    pub channel: PairingChannel,
    /// Momentum form of the seeded start.
    pub symmetry: GapSymmetry,
    /// Frequency parity of the seeded start.
    pub parity: FrequencyParity,
    /// Fermionic half-box of the gap; defaults to half the vertex core.
    pub niv_pp: Option<usize>,
    /// Eigenvalue convergence threshold.
    pub eps: f64,
    /// Iteration cap.
    pub max_count: usize,
    /// Seed of the random start.
    pub seed: u64,
}

impl Default for EliashbergConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            channel: PairingChannel::Singlet,
            symmetry: GapSymmetry::DWave,
            parity: FrequencyParity::Even,
            niv_pp: None,
            eps: tolerances::ELIASHBERG_EPS,
            max_count: tolerances::ELIASHBERG_MAX_COUNT,
            seed: 42,
        }
    }
}

impl EliashbergConfig {
    /// Stopping rule of both power iterations.
    #[must_use]
    pub const fn power_iteration(&self) -> PowerIteration {
        PowerIteration {
            eps: self.eps,
            max_count: self.max_count,
        }
    }
}

/// Low-frequency polynomial extrapolation.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PolyFitConfig {
    /// Run the fits.
    #[serde(rename = "do")]
    pub enabled: bool,
    /// Points and order.
    #[serde(flatten)]
    pub settings: PolyFitSettings,
}

/// MaxEnt continuation of the local DΓA Green's function.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MaxEntConfig {
    /// Run the continuation.
    #[serde(rename = "do")]
    pub enabled: bool,
    /// Real-frequency mesh.
    pub mesh: MeshType,
    /// Mesh edge.
    pub w_max: f64,
    /// Mesh points.
    pub nw: usize,
    /// Positive Matsubara frequencies used.
    pub n_fit: usize,
    /// Constant error bar of the data.
    pub err: f64,
    /// Solver options.
    #[serde(flatten)]
    pub options: MaxentOptions,
}

impl Default for MaxEntConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            mesh: MeshType::Tan,
            w_max: 15.0,
            nw: 501,
            n_fit: 60,
            err: 1e-3,
            options: MaxentOptions::default(),
        }
    }
}

/// Output location.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct OutputConfig {
    /// Parent directory of the run directory.
    pub path: PathBuf,
    /// Write momentum-resolved fields (Σ, G, χ) next to the summaries.
    pub write_fields: bool,
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            path: PathBuf::from("."),
            write_fields: true,
        }
    }
}

/// Complete run configuration.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DgaConfig {
    /// Input files.
    pub input: InputConfig,
    /// Frequency boxes.
    pub box_sizes: BoxSizes,
    /// Lattice and grids.
    pub lattice: LatticeConfig,
    /// Ladder settings.
    pub dga: DgaSettings,
    /// Gap equation.
    pub eliashberg: EliashbergConfig,
    /// Polynomial fits.
    pub poly_fit: PolyFitConfig,
    /// Analytic continuation.
    pub max_ent: MaxEntConfig,
    /// Output.
    pub output: OutputConfig,
}

impl DgaConfig {
    /// Parse a YAML document.
    ///
    /// # Errors
    ///
    /// [`DgaError::Config`] for malformed YAML or inconsistent settings.
    pub fn from_yaml_str(text: &str) -> Result<Self> {
        let config: Self = serde_yaml::from_str(text)?;
        config.validate()?;
        Ok(config)
    }

    /// Read and parse a YAML file.
    ///
    /// # Errors
    ///
    /// [`DgaError::DataLoad`] when the file cannot be read, otherwise see
    /// [`Self::from_yaml_str`].
    pub fn load(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path)
            .map_err(|e| DgaError::DataLoad(format!("{}: {e}", path.display())))?;
        debug!(path = %path.display(), "reading configuration");
        Self::from_yaml_str(&text)
    }

    /// Reject settings that cannot run.
    ///
    /// # Errors
    ///
    /// [`DgaError::Config`] naming the offending key.
    pub fn validate(&self) -> Result<()> {
        if self.lattice.nk.iter().any(|&n| n == 0) {
            return Err(DgaError::Config(format!("lattice.nk has a zero entry: {:?}", self.lattice.nk)));
        }
        let nq = self.lattice.nq();
        if nq.iter().zip(&self.lattice.nk).any(|(&q, &k)| q == 0 || k % q != 0) {
            return Err(DgaError::Config(format!(
                "lattice.nq {nq:?} must divide lattice.nk {:?}",
                self.lattice.nk
            )));
        }
        if self.poly_fit.enabled && self.poly_fit.settings.n_fit <= self.poly_fit.settings.o_fit {
            return Err(DgaError::Config(format!(
                "poly_fit.n_fit={} must exceed poly_fit.o_fit={}",
                self.poly_fit.settings.n_fit, self.poly_fit.settings.o_fit
            )));
        }
        if self.max_ent.enabled && (self.max_ent.err <= 0.0 || self.max_ent.n_fit == 0) {
            return Err(DgaError::Config("max_ent needs err > 0 and n_fit > 0".into()));
        }
        if self.eliashberg.enabled && self.eliashberg.niv_pp == Some(0) {
            return Err(DgaError::Config("eliashberg.niv_pp must be positive".into()));
        }
        Ok(())
    }

    /// Run directory name: `LambdaDga_lc_{lc}_Nk{nk}_Nq{nq}_wcore{niw}_vcore{niv}_vshell{shell}`.
    #[must_use]
    pub fn run_name(&self, boxes: &ResolvedBoxes) -> String {
        let nk: usize = self.lattice.nk.iter().product();
        let nq: usize = self.lattice.nq().iter().product();
        format!(
            "LambdaDga_lc_{}_Nk{nk}_Nq{nq}_wcore{}_vcore{}_vshell{}",
            self.dga.lambda_corr.label(),
            boxes.niw_core,
            boxes.niv_core,
            boxes.niv_shell
        )
    }

    /// Fresh run directory below `output.path` (not created).
    #[must_use]
    pub fn run_dir(&self, boxes: &ResolvedBoxes) -> PathBuf {
        uniquify_path(&self.output.path.join(self.run_name(boxes)))
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::ana_cont::AlphaDetermination;

    const EXAMPLE: &str = "
input:
  path: /data/run1
  fname_1p: one.json
box_sizes:
  niw_core: 20
  niv_core: 20
  niv_shell: 10
lattice:
  t: 1.0
  tp: -0.25
  tpp: 0.12
  nk: [32, 32, 1]
  nq: [16, 16, 1]
dga:
  lambda_corr: sp
eliashberg:
  do: true
  symmetry: p-wave-y
  parity: odd
max_ent:
  do: true
  alpha_determination: bryan
poly_fit:
  do: true
  n_fit: 5
  o_fit: 2
";

    #[test]
    fn parses_sections_and_defaults() {
        let c = DgaConfig::from_yaml_str(EXAMPLE).unwrap();
        assert_eq!(c.input.one_particle(), PathBuf::from("/data/run1/one.json"));
        assert_eq!(c.input.fname_g2_magn, "g2_magn.json");
        assert_eq!(c.box_sizes.niv_shell, 10);
        assert_eq!(c.box_sizes.niv_asympt, 500);
        assert_eq!(c.lattice.nq(), [16, 16, 1]);
        assert_eq!(c.dga.lambda_corr, LambdaCorrectionType::Sp);
        assert!(c.eliashberg.enabled);
        assert_eq!(c.eliashberg.symmetry, GapSymmetry::PWaveY);
        assert_eq!(c.eliashberg.parity, FrequencyParity::Odd);
        assert!(c.max_ent.enabled);
        assert_eq!(c.max_ent.options.alpha_determination, AlphaDetermination::Bryan);
        assert_eq!(c.poly_fit.settings, PolyFitSettings { n_fit: 5, o_fit: 2 });
    }

    #[test]
    fn empty_document_is_default() {
        let c = DgaConfig::from_yaml_str("{}").unwrap();
        assert_eq!(c, DgaConfig::default());
        assert_eq!(c.lattice.nq(), c.lattice.nk);
    }

    #[test]
    fn rejects_incommensurate_q_grid() {
        let err = DgaConfig::from_yaml_str("lattice:\n  nk: [10, 10, 1]\n  nq: [4, 4, 1]\n").unwrap_err();
        assert!(matches!(err, DgaError::Config(_)));
    }

    #[test]
    fn rejects_unknown_lambda_variant() {
        assert!(DgaConfig::from_yaml_str("dga:\n  lambda_corr: full\n").is_err());
    }

    #[test]
    fn boxes_resolve_against_input() {
        let boxes = BoxSizes {
            niv_shell: 4,
            ..BoxSizes::default()
        }
        .resolve(10, 12)
        .unwrap();
        assert_eq!((boxes.niw_core, boxes.niv_core, boxes.niv_full), (10, 12, 16));
        let too_big = BoxSizes {
            niv_core: Some(13),
            ..BoxSizes::default()
        };
        assert!(matches!(too_big.resolve(10, 12), Err(DgaError::FrequencyBox(_))));
    }

    #[test]
    fn run_directory_is_uniquified() {
        let dir = tempfile::tempdir().unwrap();
        let mut c = DgaConfig::default();
        c.output.path = dir.path().to_path_buf();
        let boxes = c.box_sizes.resolve(5, 6).unwrap();
        let name = c.run_name(&boxes);
        assert_eq!(name, "LambdaDga_lc_spch_Nk256_Nq256_wcore5_vcore6_vshell0");
        let first = c.run_dir(&boxes);
        std::fs::create_dir(&first).unwrap();
        let second = c.run_dir(&boxes);
        assert_eq!(second.file_name().unwrap().to_string_lossy(), format!("{name}_1"));
    }
}
