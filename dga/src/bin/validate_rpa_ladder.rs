// SPDX-License-Identifier: AGPL-3.0-only

//! Ladder DΓA against the exact RPA limit.
//!
//! The synthetic input has a frequency-independent irreducible vertex
//! U_r/β², for which the ladder is the RPA series in closed form. Exit code
//! 0 when every check passes, 1 otherwise.
//!
//! # Validation targets
//!
//! | Check | Metric | Tolerance |
//! |-------|--------|-----------|
//! | Extracted Γ_r | max \|Γ − U_r/β²\| | `RPA_GAMMA_PARITY` |
//! | Ladder χ_r(q, ω) | max \|χ − χ_RPA\| | `RPA_CHI_PARITY` |
//! | Bosonic symmetry | max \|χ(q, −ω) − χ(q, ω)*\| | `BOSONIC_SYMMETRY_ABS` |
//! | λ sum rule | \|Σ χ_λ − Σ χ_loc\| | `LAMBDA_SUM_RULE_ABS` |
//! | DΓA filling | \|n − n_target\| | 100 × `MU_ROOT_TOL` |

use lambda_dga::config::DgaConfig;
use lambda_dga::error::Result;
use lambda_dga::four_point::{gammar_from_gchir, gchir_from_g2, Channel, LadderSusceptibility, LocalBubble, LocalFourPoint};
use lambda_dga::lambda_correction::{chi_sum, local_sum, LambdaCorrectionType};
use lambda_dga::logging::init_logging;
use lambda_dga::pipeline::{run_with_input, DgaInput};
use lambda_dga::synthetic::{rpa_susceptibility, RpaReference};
use lambda_dga::tolerances;
use lambda_dga::two_point::{GreensFunction, SelfEnergy};
use lambda_dga::validation::ValidationHarness;
use num_complex::Complex64;

fn config_for(reference: &RpaReference, lambda_corr: LambdaCorrectionType) -> DgaConfig {
    let mut c = DgaConfig::default();
    c.lattice.t = reference.t;
    c.lattice.tp = reference.tp;
    c.lattice.tpp = reference.tpp;
    c.lattice.nk = reference.nk;
    c.box_sizes.niv_shell = reference.niv_shell;
    c.box_sizes.niv_asympt = reference.niv_input;
    c.dga.lambda_corr = lambda_corr;
    c
}

/// DMFT lattice Green's function exactly as the pipeline builds it.
fn dmft_green(config: &DgaConfig, input: &DgaInput) -> Result<GreensFunction> {
    let (kgrid, _) = config.lattice.grids()?;
    let siw = input.dmft.siw_positive()?;
    let sigma = SelfEnergy::from_local(&siw, kgrid.nk(), input.dmft.beta, None, tolerances::SIGMA_ASYMPT_ERR)?;
    let ek = config.lattice.hopping().ek_grid(&kgrid);
    GreensFunction::with_mu(&sigma, &ek, input.dmft.mu_dmft, config.box_sizes.niv_asympt)
}

fn bosonic_asymmetry(chi: &LadderSusceptibility) -> f64 {
    let nw = chi.nw();
    (0..chi.nq())
        .flat_map(|iq| {
            let row = chi.chi_row(iq);
            (0..nw).map(move |iw| (row[iw] - row[nw - 1 - iw].conj()).norm())
        })
        .fold(0.0, f64::max)
}

fn check_local_vertex(reference: &RpaReference, input: &DgaInput, harness: &mut ValidationHarness) -> Result<()> {
    let config = config_for(reference, LambdaCorrectionType::None);
    let g_loc = dmft_green(&config, input)?.g_loc();
    let bubble = LocalBubble::new(input.g2_dens.wn.clone(), g_loc.clone(), reference.beta);
    for file in [&input.g2_dens, &input.g2_magn] {
        let g2 = LocalFourPoint::from_stored(file)?;
        let gchi = gchir_from_g2(&g2, &g_loc)?;
        let gamma = gammar_from_gchir(&gchi, &bubble, reference.u, reference.niv_shell)?;
        let expected = Complex64::new(gamma.channel.u_r(reference.u) / reference.beta.powi(2), 0.0);
        let dev = gamma
            .mat
            .iter()
            .flat_map(|m| m.iter().map(|z| (z - expected).norm()))
            .fold(0.0, f64::max);
        println!("  Γ_{}: max deviation {dev:.3e}", gamma.channel);
        harness.check_upper(&format!("Γ_{} = U_r/β²", gamma.channel), dev, tolerances::RPA_GAMMA_PARITY);
    }
    Ok(())
}

fn check_ladder(reference: &RpaReference, input: &DgaInput, harness: &mut ValidationHarness) -> Result<()> {
    let config = config_for(reference, LambdaCorrectionType::None);
    let out = run_with_input(&config, input, None)?;
    let (kgrid, qgrid) = config.lattice.grids()?;
    let gk = dmft_green(&config, input)?;
    let niv_u = reference.niv_core + reference.niv_shell;
    for (chi, channel) in [(&out.chi_dens, Channel::Density), (&out.chi_magn, Channel::Magnetic)] {
        let rpa_irr = rpa_susceptibility(&gk, &kgrid, &qgrid, channel, reference.u, &chi.wn, niv_u)?;
        let rpa = qgrid.grid().map_irrk_to_fbz(&rpa_irr)?;
        let dev = (0..chi.nq())
            .flat_map(|iq| chi.chi_row(iq).iter().zip(&rpa[iq]).map(|(a, b)| (a - b).norm()))
            .fold(0.0, f64::max);
        println!("  χ_{channel}: max |χ − χ_RPA| = {dev:.3e}");
        harness.check_upper(&format!("χ_{channel} ladder = RPA"), dev, tolerances::RPA_CHI_PARITY);
        harness.check_upper(
            &format!("χ_{channel}(−ω) = χ_{channel}(ω)*"),
            bosonic_asymmetry(chi),
            tolerances::BOSONIC_SYMMETRY_ABS,
        );
    }
    Ok(())
}

fn check_lambda(reference: &RpaReference, input: &DgaInput, harness: &mut ValidationHarness) -> Result<()> {
    let out = run_with_input(&config_for(reference, LambdaCorrectionType::Spch), input, None)?;
    let beta = reference.beta;
    let target_d = local_sum(&out.local.chi_dens.to_vec()?, beta);
    let target_m = local_sum(&out.local.chi_magn.to_vec()?, beta);
    println!("  λ_dens = {:.6}, λ_magn = {:.6}", out.lambda.dens, out.lambda.magn);
    harness.check_abs("density sum rule", chi_sum(&out.chi_dens, 0.0), target_d, tolerances::LAMBDA_SUM_RULE_ABS);
    harness.check_abs("magnetic sum rule", chi_sum(&out.chi_magn, 0.0), target_m, tolerances::LAMBDA_SUM_RULE_ABS);
    println!(
        "  μ_DMFT = {:.6}, μ_DΓA = {:.6}, n = {:.6}",
        out.mu_dmft,
        out.g_dga.mu(),
        out.g_dga.n()
    );
    harness.check_abs("DΓA filling", out.g_dga.n(), reference.n, 100.0 * tolerances::MU_ROOT_TOL);
    Ok(())
}

fn main() {
    init_logging();
    println!("╔══════════════════════════════════════════════════════════════╗");
    println!("║  Ladder DΓA — RPA limit validation                           ║");
    println!("║  Γ_r = U_r/β² ⇒ χ_ladder = χ0/(1 + U_r χ0)                   ║");
    println!("╚══════════════════════════════════════════════════════════════╝");
    println!();

    let reference = RpaReference::default();
    println!(
        "  β={} U={} n={} t={} t'={} t''={} nk={:?}",
        reference.beta, reference.u, reference.n, reference.t, reference.tp, reference.tpp, reference.nk
    );
    println!(
        "  niv_core={} niv_shell={} niw={}",
        reference.niv_core, reference.niv_shell, reference.niw
    );
    println!();

    let mut harness = ValidationHarness::new("rpa_ladder");
    let input = match reference.generate() {
        Ok(g) => DgaInput {
            dmft: g.dmft,
            g2_dens: g.g2_dens,
            g2_magn: g.g2_magn,
        },
        Err(e) => {
            eprintln!("  FAILED to generate input: {e}");
            std::process::exit(1);
        }
    };

    type Stage = fn(&RpaReference, &DgaInput, &mut ValidationHarness) -> Result<()>;
    let stages: [(&str, Stage); 3] = [
        ("local vertex", check_local_vertex),
        ("ladder against RPA", check_ladder),
        ("λ-correction and DΓA Green's function", check_lambda),
    ];
    for (title, stage) in stages {
        harness.section(title);
        if let Err(e) = stage(&reference, &input, &mut harness) {
            eprintln!("  {title} failed: {e}");
            harness.check_bool(title, false);
        }
    }

    println!();
    harness.finish();
}
