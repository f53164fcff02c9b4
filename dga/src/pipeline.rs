// SPDX-License-Identifier: AGPL-3.0-only

//! The ladder DΓA run.
//!
//! Stages, each closed by a [`CpuTimer`] entry:
//!
//! 1. DMFT Σ and G on the lattice at μ_DMFT.
//! 2. Local vertices: gchi, Γ_r, γ_r, χ_r and the local SDE.
//! 3. Ladder on the irreducible q-points, λ-correction, Ornstein–Zernike fit.
//! 4. Lattice SDE, DΓA Σ with the DMFT tail, G at fixed filling.
//! 5. Fermi surface, polynomial fits, Eliashberg and MaxEnt (each optional).
//!
//! Results are written as JSON when an output directory is given; the
//! returned [`DgaOutput`] holds everything in memory.

use std::path::{Path, PathBuf};

use num_complex::Complex64;
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::ana_cont::{flat_model, real_mesh, KernelKind, MaxentSolverSvd, Noise};
use crate::config::{DgaConfig, InputConfig, ResolvedBoxes};
use crate::eliashberg::{gap_start, green_on_qgrid, EliashbergSolution, FrequencyParity, GapEquation, GapSymmetry, PairingVertex};
use crate::error::{DgaError, Result};
use crate::field::KField;
use crate::four_point::{
    gammar_from_gchir, gchir_from_g2, ladder_susceptibility, local_sde, local_vrg_and_chi_tilde, nonlocal_sde, Channel,
    LadderSusceptibility, LocalBubble, LocalFourPoint, LocalThreePoint,
};
use crate::io::{read_json, write_json, ComplexArray, DmftInput, LocalG2File};
use crate::lambda_correction::{lambda_correction, ornstein_zernike_fit, LambdaShifts, OrnsteinZernike};
use crate::lattice::{find_zeros, KGrid, QGrid};
use crate::logging::CpuTimer;
use crate::matsubara;
use crate::postproc::{poly_fit, PolyFitResult};
use crate::tolerances::SIGMA_ASYMPT_ERR;
use crate::two_point::{hartree, GreensFunction, SelfEnergy};

/// One- and two-particle input of a run.
#[derive(Clone, Debug)]
pub struct DgaInput {
    /// DMFT one-particle data.
    pub dmft: DmftInput,
    /// Density-channel G2.
    pub g2_dens: LocalG2File,
    /// Magnetic-channel G2.
    pub g2_magn: LocalG2File,
}

impl DgaInput {
    /// Read the three input files.
    ///
    /// # Errors
    ///
    /// [`DgaError::DataLoad`] for missing or malformed files.
    pub fn load(input: &InputConfig) -> Result<Self> {
        let (dens, magn) = input.two_particle();
        Ok(Self {
            dmft: read_json(&input.one_particle())?,
            g2_dens: read_json(&dens)?,
            g2_magn: read_json(&magn)?,
        })
    }

    /// Bosonic and fermionic half-boxes available in both channels.
    #[must_use]
    pub fn available_boxes(&self) -> (usize, usize) {
        let niw = |g2: &LocalG2File| g2.wn.iter().map(|m| m.unsigned_abs() as usize).max().unwrap_or(0);
        (
            niw(&self.g2_dens).min(niw(&self.g2_magn)),
            self.g2_dens.niv.min(self.g2_magn.niv),
        )
    }
}

/// Local quantities of stage 2.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct LocalSummary {
    /// Bosonic indices.
    pub wn: Vec<i64>,
    /// Local χ_d(ω).
    pub chi_dens: ComplexArray,
    /// Local χ_m(ω).
    pub chi_magn: ComplexArray,
    /// Σ from the local SDE on the vertex box.
    pub siw_sde: ComplexArray,
    /// Input Σ on the same box.
    pub siw_dmft: ComplexArray,
}

/// MaxEnt spectrum of the local DΓA Green's function.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct LocalSpectrum {
    /// Real frequencies.
    pub w: Vec<f64>,
    /// A(ω).
    pub a: Vec<f64>,
    /// Selected α (NaN for Bryan averaging).
    pub alpha: f64,
    /// Matsubara data used.
    pub giw: ComplexArray,
    /// Back-transformed spectrum.
    pub backtransform: ComplexArray,
}

/// Polynomial fits of stage 5.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct PolyFits {
    /// DΓA self-energy.
    pub sigma_dga: PolyFitResult,
    /// DΓA Green's function.
    pub g_dga: PolyFitResult,
    /// DMFT Green's function.
    pub g_dmft: PolyFitResult,
}

#[derive(Serialize)]
struct ChemicalPotential {
    mu_dga: f64,
    mu_dmft: f64,
}

/// Everything a run produces.
#[derive(Clone, Debug)]
pub struct DgaOutput {
    /// Run directory, when results were written.
    pub run_dir: Option<PathBuf>,
    /// Boxes used.
    pub boxes: ResolvedBoxes,
    /// Local quantities.
    pub local: LocalSummary,
    /// Momentum average of the ladder χ before the λ shift, per channel.
    pub chi_ladder_loc: [Vec<Complex64>; 2],
    /// λ shifts.
    pub lambda: LambdaShifts,
    /// Ornstein–Zernike fit of χ_m(q, 0), if it succeeded.
    pub oz: Option<OrnsteinZernike>,
    /// λ-corrected density susceptibility on the full q-grid.
    pub chi_dens: LadderSusceptibility,
    /// λ-corrected magnetic susceptibility on the full q-grid.
    pub chi_magn: LadderSusceptibility,
    /// DΓA self-energy.
    pub sigma_dga: SelfEnergy,
    /// DΓA Green's function at the input filling.
    pub g_dga: GreensFunction,
    /// DMFT chemical potential.
    pub mu_dmft: f64,
    /// (kx, ky) indices of the kz = 0 Fermi surface.
    pub fermi_surface: Vec<[usize; 2]>,
    /// Polynomial fits.
    pub poly_fits: Option<PolyFits>,
    /// Gap equation.
    pub eliashberg: Option<EliashbergSolution>,
    /// Local spectrum.
    pub spectrum: Option<LocalSpectrum>,
}

struct OutputWriter {
    dir: Option<PathBuf>,
    write_fields: bool,
}

impl OutputWriter {
    fn new(dir: Option<&Path>, write_fields: bool) -> Result<Self> {
        if let Some(d) = dir {
            std::fs::create_dir_all(d)?;
            info!(dir = %d.display(), "output directory");
        }
        Ok(Self {
            dir: dir.map(Path::to_path_buf),
            write_fields,
        })
    }

    fn write<T: Serialize + ?Sized>(&self, name: &str, value: &T) -> Result<()> {
        match &self.dir {
            Some(d) => write_json(&d.join(name), value),
            None => Ok(()),
        }
    }

    fn write_field(&self, name: &str, field: &KField) -> Result<()> {
        if self.write_fields {
            self.write(name, &field.to_stored())?;
        }
        Ok(())
    }

    fn subdir(&self, name: &str) -> Result<Self> {
        let dir = match &self.dir {
            Some(d) => {
                let sub = d.join(name);
                std::fs::create_dir_all(&sub)?;
                Some(sub)
            }
            None => None,
        };
        Ok(Self {
            dir,
            write_fields: self.write_fields,
        })
    }
}

/// Load the input, create a fresh run directory and run.
///
/// # Errors
///
/// Any error of loading, box resolution or the run itself.
pub fn run(config: &DgaConfig) -> Result<DgaOutput> {
    let input = DgaInput::load(&config.input)?;
    let (niw, niv) = input.available_boxes();
    let boxes = config.box_sizes.resolve(niw, niv)?;
    let dir = config.run_dir(&boxes);
    let out = run_with_input(config, &input, Some(&dir))?;
    write_json(&dir.join("config.json"), config)?;
    Ok(out)
}

fn checked_g2(file: &LocalG2File, expected: Channel, boxes: &ResolvedBoxes) -> Result<LocalFourPoint> {
    if file.channel != expected {
        return Err(DgaError::Config(format!(
            "G2 file for the {expected} channel holds {} data",
            file.channel
        )));
    }
    LocalFourPoint::from_stored(file)?
        .cut_iw(boxes.niw_core)?
        .cut_iv(boxes.niv_core)
}

fn cut_full(values: &[Complex64], niv: usize, what: &str) -> Result<Vec<Complex64>> {
    matsubara::cut_v(values, niv)
        .map(<[Complex64]>::to_vec)
        .ok_or_else(|| DgaError::FrequencyBox(format!("{what} has fewer than {niv} positive frequencies")))
}

struct LocalChannel {
    gamma: LocalFourPoint,
    vrg: LocalThreePoint,
    chi: Vec<Complex64>,
}

fn local_channel(g2: &LocalFourPoint, g_loc: &[Complex64], bubble: &LocalBubble, u: f64, niv_shell: usize) -> Result<LocalChannel> {
    let gchi = gchir_from_g2(g2, g_loc)?;
    let gamma = gammar_from_gchir(&gchi, bubble, u, niv_shell)?;
    let (vrg, chi) = local_vrg_and_chi_tilde(&gamma, bubble, u, niv_shell)?;
    Ok(LocalChannel { gamma, vrg, chi })
}

/// Positive-frequency DΓA self-energy: the ladder core continued by the
/// DMFT data beyond it.
fn extend_with_dmft(core: &KField, dmft_pos: &[Complex64]) -> Result<KField> {
    let niv_core = core.nfreq() / 2;
    if dmft_pos.len() < niv_core {
        return Err(DgaError::FrequencyBox(format!(
            "DMFT self-energy ({} frequencies) shorter than the DΓA core ({niv_core})",
            dmft_pos.len()
        )));
    }
    KField::from_rows(core.nk(), dmft_pos.len(), |ik| {
        let mut row = core.row(ik)[niv_core..].to_vec();
        row.extend_from_slice(&dmft_pos[niv_core..]);
        row
    })
}

fn fermi_surface(g: &GreensFunction, kgrid: &KGrid) -> Vec<[usize; 2]> {
    let [nx, ny, nz] = kgrid.nk();
    let values: Vec<f64> = (0..nx * ny)
        .map(|i| g.get(i * nz, 0).map_or(0.0, |z| z.re))
        .collect();
    find_zeros(&values, nx, ny)
}

fn local_spectrum(config: &DgaConfig, g: &GreensFunction) -> Result<LocalSpectrum> {
    let me = &config.max_ent;
    let g_loc = g.g_loc();
    let niv = g_loc.len() / 2;
    let n = me.n_fit.min(niv);
    let giw = g_loc[niv..niv + n].to_vec();
    let im_axis: Vec<f64> = (0..n as i64).map(|k| matsubara::fermionic(g.beta(), k)).collect();
    let w = real_mesh(me.mesh, me.w_max, me.nw)?;
    let model = flat_model(&w);
    let solver = MaxentSolverSvd::new(
        KernelKind::FreqFermionic,
        &im_axis,
        &w,
        &giw,
        &Noise::Stdev(vec![me.err; n]),
        &model,
        me.options,
    )?;
    let sol = solver.solve()?;
    Ok(LocalSpectrum {
        w,
        a: sol.a_opt,
        alpha: sol.alpha_opt,
        giw: ComplexArray::from_slice(&giw),
        backtransform: ComplexArray::from_slice(&sol.backtransform),
    })
}

#[allow(clippy::too_many_arguments)]
fn solve_eliashberg(config: &DgaConfig, boxes: &ResolvedBoxes, g: &GreensFunction, kgrid: &KGrid, qgrid: &QGrid, chi_dens: &LadderSusceptibility, chi_magn: &LadderSusceptibility, u: f64) -> Result<EliashbergSolution> {
    let el = &config.eliashberg;
    let niv_pp = el
        .niv_pp
        .unwrap_or_else(|| (boxes.niw_core / 2).min(boxes.niv_core / 2).max(1));
    let nq = qgrid.grid().nk();
    let vertex = PairingVertex::from_ladder(chi_dens, chi_magn, nq, u, niv_pp, el.channel)?;
    let g_q = green_on_qgrid(g, kgrid, qgrid, niv_pp)?;
    let equation = GapEquation::new(&vertex, &g_q, g.beta())?;
    let random = gap_start(qgrid.grid(), niv_pp, GapSymmetry::Random, FrequencyParity::Random, el.seed);
    let seeded = gap_start(qgrid.grid(), niv_pp, el.symmetry, el.parity, el.seed);
    equation.solve(el.channel, random, seeded, el.power_iteration())
}

/// Run the pipeline on in-memory input. Results are written below
/// `out_dir` when given.
///
/// # Errors
///
/// Box, shape, inversion and root-search errors of every stage. Failures
/// of the Ornstein–Zernike fit and of MaxEnt are logged and skipped.
#[allow(clippy::too_many_lines)]
pub fn run_with_input(config: &DgaConfig, input: &DgaInput, out_dir: Option<&Path>) -> Result<DgaOutput> {
    config.validate()?;
    let mut timer = CpuTimer::new();
    let writer = OutputWriter::new(out_dir, config.output.write_fields)?;
    let dmft = &input.dmft;
    let (beta, u, n) = (dmft.beta, dmft.u, dmft.n);

    // Stage 1: DMFT on the lattice.
    let (niw_in, niv_in) = input.available_boxes();
    let boxes = config.box_sizes.resolve(niw_in, niv_in)?;
    info!(?boxes, beta, u, n, "starting ladder DΓA");
    let g2_dens = checked_g2(&input.g2_dens, Channel::Density, &boxes)?;
    let g2_magn = checked_g2(&input.g2_magn, Channel::Magnetic, &boxes)?;
    let (kgrid, qgrid) = config.lattice.grids()?;
    let ek = config.lattice.hopping().ek_grid(&kgrid);
    let siw_full = dmft.siw.to_vec()?;
    let siw_pos = dmft.siw_positive()?;
    let sigma_dmft = SelfEnergy::from_local(&siw_pos, kgrid.nk(), beta, None, SIGMA_ASYMPT_ERR)?;
    let g_dmft = GreensFunction::with_mu(&sigma_dmft, &ek, dmft.mu_dmft, boxes.niv_asympt)?;
    info!(
        n_dmft = g_dmft.n(),
        n_target = n,
        memory_mb = g_dmft.memory_mb(),
        "lattice Green's function at mu_DMFT"
    );
    timer.log_stage("data loading");

    // Stage 2: local vertices.
    let g_loc = g_dmft.g_loc();
    let bubble = LocalBubble::new(g2_dens.wn.clone(), g_loc.clone(), beta);
    let dens = local_channel(&g2_dens, &g_loc, &bubble, u, boxes.niv_shell)?;
    let magn = local_channel(&g2_magn, &g_loc, &bubble, u, boxes.niv_shell)?;
    let siw_sde = local_sde(&dens.vrg, &magn.vrg, &dens.chi, &magn.chi, &g_loc, u, n)?;
    let local = LocalSummary {
        wn: g2_dens.wn.clone(),
        chi_dens: ComplexArray::from_slice(&dens.chi),
        chi_magn: ComplexArray::from_slice(&magn.chi),
        siw_sde: ComplexArray::from_slice(&siw_sde),
        siw_dmft: ComplexArray::from_slice(&cut_full(&siw_full, boxes.niv_full, "input self-energy")?),
    };
    writer.write("local.json", &local)?;
    timer.log_stage("local vertices and SDE");

    // Stage 3: ladder and λ-correction.
    let chi_dens_irr = ladder_susceptibility(&g_dmft, &kgrid, &qgrid, &dens.gamma, u, boxes.niv_shell)?;
    let chi_magn_irr = ladder_susceptibility(&g_dmft, &kgrid, &qgrid, &magn.gamma, u, boxes.niv_shell)?;
    let mut chi_dens = chi_dens_irr.unfold(qgrid.grid())?;
    let mut chi_magn = chi_magn_irr.unfold(qgrid.grid())?;
    let chi_ladder_loc = [chi_dens.chi_loc(), chi_magn.chi_loc()];
    timer.log_stage("ladder susceptibilities");

    let lambda = lambda_correction(&mut chi_dens, &mut chi_magn, &dens.chi, &magn.chi, config.dga.lambda_corr)?;
    let nq = qgrid.grid().nk();
    writer.write("lambda.json", &lambda)?;
    writer.write("chi_dens_lam.json", &chi_dens.to_stored(nq))?;
    writer.write("chi_magn_lam.json", &chi_magn.to_stored(nq))?;
    let w0 = chi_magn.w0();
    let chi_w0: Vec<f64> = (0..chi_magn.nq()).map(|iq| chi_magn.chi_row(iq)[w0].re).collect();
    let oz = match ornstein_zernike_fit(&chi_w0, qgrid.grid(), config.dga.oz_radius) {
        Ok(fit) => {
            info!(xi = fit.xi, amplitude = fit.amplitude, q_max = ?fit.q_max, "Ornstein-Zernike fit");
            writer.write("oz_fit.json", &fit)?;
            Some(fit)
        }
        Err(e) => {
            warn!(error = %e, "Ornstein-Zernike fit skipped");
            None
        }
    };
    timer.log_stage("lambda correction");

    // Stage 4: lattice self-energy.
    let mut sigma_core = nonlocal_sde(&g_dmft, &kgrid, &qgrid, &chi_dens, &chi_magn, u, boxes.niv_core)?;
    let dmft_core = cut_full(&siw_full, boxes.niv_core, "input self-energy")?;
    let sde_core = cut_full(&siw_sde, boxes.niv_core, "local SDE self-energy")?;
    let h = hartree(u, n);
    for ik in 0..sigma_core.nk_tot() {
        for ((s, d), l) in sigma_core.row_mut(ik).iter_mut().zip(&dmft_core).zip(&sde_core) {
            *s += d - l + h;
        }
    }
    writer.write_field("siwk_dga_core.json", &sigma_core)?;
    let sigma_dga = SelfEnergy::new(extend_with_dmft(&sigma_core, &siw_pos)?, beta, None, SIGMA_ASYMPT_ERR)?;
    let g_dga = GreensFunction::with_filling(&sigma_dga, &ek, n, 2 * boxes.niv_full, g_dmft.mu())?;
    writer.write("mu.json", &ChemicalPotential {
        mu_dga: g_dga.mu(),
        mu_dmft: dmft.mu_dmft,
    })?;
    writer.write_field("giwk_dga.json", &g_dga.cut(boxes.niv_full.min(g_dga.niv_full())))?;
    timer.log_stage("non-local SDE and DΓA Green's function");

    // Stage 5: post-processing.
    let fs = fermi_surface(&g_dga, &kgrid);
    info!(points = fs.len(), "Fermi surface");
    writer.write("fermi_surface.json", &fs)?;

    let poly_fits = if config.poly_fit.enabled {
        let settings = config.poly_fit.settings;
        let fits = PolyFits {
            sigma_dga: poly_fit(&sigma_dga.get_siw(boxes.niv_full.max(settings.n_fit)), beta, settings)?,
            g_dga: poly_fit(g_dga.field(), beta, settings)?,
            g_dmft: poly_fit(g_dmft.field(), beta, settings)?,
        };
        let sub = writer.subdir("PolyFits")?;
        sub.write("siwk_dga.json", &fits.sigma_dga)?;
        sub.write("giwk_dga.json", &fits.g_dga)?;
        sub.write("giwk_dmft.json", &fits.g_dmft)?;
        timer.log_stage("polynomial fits");
        Some(fits)
    } else {
        None
    };

    let eliashberg = if config.eliashberg.enabled {
        let sol = solve_eliashberg(config, &boxes, &g_dga, &kgrid, &qgrid, &chi_dens, &chi_magn, u)?;
        writer.write("eliashberg.json", &sol.to_stored())?;
        timer.log_stage("Eliashberg equation");
        Some(sol)
    } else {
        None
    };

    let spectrum = if config.max_ent.enabled {
        let result = local_spectrum(config, &g_dga);
        timer.log_stage("MaxEnt of the local Green's function");
        match result {
            Ok(s) => {
                writer.write("maxent_gloc.json", &s)?;
                Some(s)
            }
            Err(e) => {
                warn!(error = %e, "local MaxEnt failed");
                None
            }
        }
    } else {
        None
    };

    info!(total_s = timer.total().as_secs_f64(), mu_dga = g_dga.mu(), "ladder DΓA finished");
    Ok(DgaOutput {
        run_dir: out_dir.map(Path::to_path_buf),
        boxes,
        local,
        chi_ladder_loc,
        lambda,
        oz,
        chi_dens,
        chi_magn,
        sigma_dga,
        g_dga,
        mu_dmft: dmft.mu_dmft,
        fermi_surface: fs,
        poly_fits,
        eliashberg,
        spectrum,
    })
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::synthetic::RpaReference;

    fn small_reference() -> RpaReference {
        RpaReference {
            nk: [4, 4, 1],
            niv_input: 40,
            niv_core: 4,
            niv_shell: 4,
            niw: 2,
            ..RpaReference::default()
        }
    }

    fn config_for(reference: &RpaReference) -> DgaConfig {
        let mut c = DgaConfig::default();
        c.lattice.t = reference.t;
        c.lattice.tp = reference.tp;
        c.lattice.tpp = reference.tpp;
        c.lattice.nk = reference.nk;
        c.box_sizes.niv_shell = reference.niv_shell;
        c.box_sizes.niv_asympt = 40;
        c
    }

    #[test]
    fn extension_keeps_core_and_appends_tail() {
        let core = KField::broadcast([1, 1, 1], &[Complex64::new(-1.0, 0.0), Complex64::new(1.0, 0.0)]);
        let tail = [Complex64::new(9.0, 0.0), Complex64::new(2.0, 0.0), Complex64::new(3.0, 0.0)];
        let ext = extend_with_dmft(&core, &tail).unwrap();
        assert_eq!(ext.row(0), &[Complex64::new(1.0, 0.0), Complex64::new(2.0, 0.0), Complex64::new(3.0, 0.0)]);
        assert!(extend_with_dmft(&core, &[]).is_err());
    }

    #[test]
    fn swapped_channels_are_rejected() {
        let reference = small_reference();
        let mut input = {
            let r = reference.generate().unwrap();
            DgaInput {
                dmft: r.dmft,
                g2_dens: r.g2_dens,
                g2_magn: r.g2_magn,
            }
        };
        std::mem::swap(&mut input.g2_dens, &mut input.g2_magn);
        let err = run_with_input(&config_for(&reference), &input, None).unwrap_err();
        assert!(matches!(err, DgaError::Config(_)));
    }

    #[test]
    fn rpa_input_runs_and_keeps_filling() {
        let reference = small_reference();
        let r = reference.generate().unwrap();
        let input = DgaInput {
            dmft: r.dmft,
            g2_dens: r.g2_dens,
            g2_magn: r.g2_magn,
        };
        let config = config_for(&reference);
        let out = run_with_input(&config, &input, None).unwrap();
        assert_eq!(out.boxes.niv_core, reference.niv_core);
        assert_eq!(out.chi_magn.nq(), 16);
        assert!((out.g_dga.n() - reference.n).abs() < 1e-4);
        // λ-corrected local sum equals the local sum of the impurity.
        let beta = reference.beta;
        let target: f64 = out.local.chi_magn.re.iter().sum::<f64>() / beta;
        let lam = crate::lambda_correction::chi_sum(&out.chi_magn, 0.0);
        assert!((lam - target).abs() < 1e-6, "{lam} vs {target}");
        assert!(out.eliashberg.is_none() && out.spectrum.is_none() && out.poly_fits.is_none());
    }
}
