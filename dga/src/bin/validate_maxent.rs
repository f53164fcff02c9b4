// SPDX-License-Identifier: AGPL-3.0-only

//! Analytic continuation on spectra with a known answer.
//!
//! Exit code 0 when every check passes, 1 otherwise.
//!
//! # Validation targets
//!
//! | Check | Metric | Tolerance |
//! |-------|--------|-----------|
//! | Semicircle norm (all α strategies) | \|∫A − 1\| | `MAXENT_NORM_ABS` |
//! | Semicircle peak | \|ω_peak\| / bandwidth | `MAXENT_PEAK_POSITION` |
//! | Bosonic Lorentzian | \|∫A − χ(0)\| / χ(0) | `MAXENT_NORM_ABS` |
//! | Padé two-pole function | max \|G_pade − G\| on ω + iη | `PADE_INTERPOLATION` × 100 |
//! | Error propagation | σ² of ∫A | finite, > 0 |

use lambda_dga::ana_cont::{
    flat_model, gaussian_model, real_mesh, AlphaDetermination, KernelKind, MaxentOptions, MaxentSolverSvd, MeshType,
    Noise, PadeSolver,
};
use lambda_dga::error::Result;
use lambda_dga::logging::init_logging;
use lambda_dga::matsubara;
use lambda_dga::numerics::{trapz, trapz_weights};
use lambda_dga::tolerances;
use lambda_dga::validation::ValidationHarness;
use num_complex::Complex64;

const BETA: f64 = 10.0;
const NOISE: f64 = 1e-4;

fn semicircle(w: &[f64]) -> Vec<f64> {
    w.iter()
        .map(|x| (1.0 - x * x / 4.0).max(0.0).sqrt() / std::f64::consts::PI)
        .collect()
}

fn fermionic_data(iw: &[f64], w: &[f64], a: &[f64]) -> Vec<Complex64> {
    let dw = trapz_weights(w);
    iw.iter()
        .map(|&v| {
            w.iter()
                .zip(a)
                .zip(&dw)
                .map(|((&x, &ai), &d)| d * ai / Complex64::new(-x, v))
                .sum()
        })
        .collect()
}

fn check_semicircle(harness: &mut ValidationHarness) -> Result<()> {
    let iw: Vec<f64> = (0..20).map(|n| matsubara::fermionic(BETA, n)).collect();
    let w = real_mesh(MeshType::Linear, 5.0, 201)?;
    let data = fermionic_data(&iw, &w, &semicircle(&w));
    let noise = Noise::Stdev(vec![NOISE; iw.len()]);
    let model = flat_model(&w);
    for strategy in [
        AlphaDetermination::Historic,
        AlphaDetermination::Classic,
        AlphaDetermination::Bryan,
        AlphaDetermination::Chi2kink,
    ] {
        let options = MaxentOptions {
            alpha_determination: strategy,
            ..MaxentOptions::default()
        };
        let solver = MaxentSolverSvd::new(KernelKind::FreqFermionic, &iw, &w, &data, &noise, &model, options)?;
        let sol = solver.solve()?;
        let norm = trapz(&sol.a_opt, &w);
        let (ipeak, _) = sol
            .a_opt
            .iter()
            .enumerate()
            .fold((0, f64::NEG_INFINITY), |acc, (i, &v)| if v > acc.1 { (i, v) } else { acc });
        println!(
            "  {strategy:?}: α={:.3e} norm={norm:.4} peak at ω={:.3}",
            sol.alpha_opt, w[ipeak]
        );
        harness.check_abs(&format!("{strategy:?} norm"), norm, 1.0, tolerances::MAXENT_NORM_ABS);
        harness.check_upper(
            &format!("{strategy:?} peak position"),
            w[ipeak].abs() / 4.0,
            tolerances::MAXENT_PEAK_POSITION,
        );
        if strategy == AlphaDetermination::Chi2kink {
            let ones = vec![1.0; w.len()];
            let var = solver.error_propagation(&ones, sol.alpha_opt, &sol.a_opt)?;
            println!("  σ²(∫A) = {var:.3e}");
            harness.check_bool("error propagation finite and positive", var.is_finite() && var > 0.0);
        }
    }
    Ok(())
}

fn check_bosonic(harness: &mut ValidationHarness) -> Result<()> {
    let gamma = 0.8;
    let w = real_mesh(MeshType::TanPositive, 15.0, 301)?;
    let a: Vec<f64> = w
        .iter()
        .map(|&x| 2.0 / std::f64::consts::PI * gamma / (x * x + gamma * gamma))
        .collect();
    let dw = trapz_weights(&w);
    let iw: Vec<f64> = (0..10).map(|m| matsubara::bosonic(BETA, m)).collect();
    let data: Vec<Complex64> = iw
        .iter()
        .map(|&v| {
            let s: f64 = w
                .iter()
                .zip(&a)
                .zip(&dw)
                .map(|((&x, &ai), &d)| if x == 0.0 && v == 0.0 { d * ai } else { d * ai * x * x / (x * x + v * v) })
                .sum();
            Complex64::new(s, 0.0)
        })
        .collect();
    let chi0 = data[0].re;
    let model = gaussian_model(&w, 4.0, chi0);
    let solver = MaxentSolverSvd::new(
        KernelKind::FreqBosonic,
        &iw,
        &w,
        &data,
        &Noise::Stdev(vec![NOISE; iw.len()]),
        &model,
        MaxentOptions::default(),
    )?;
    let sol = solver.solve()?;
    let norm = trapz(&sol.a_opt, &w);
    println!("  χ(0)={chi0:.4} ∫A={norm:.4} α={:.3e}", sol.alpha_opt);
    harness.check_abs("bosonic norm / χ(0)", norm / chi0, 1.0, tolerances::MAXENT_NORM_ABS);
    Ok(())
}

fn check_pade(harness: &mut ValidationHarness) -> Result<()> {
    let poles = [(0.4, -0.5), (0.6, 0.8)];
    let g = |z: Complex64| -> Complex64 { poles.iter().map(|&(wt, e)| wt / (z - e)).sum() };
    let iw: Vec<f64> = (0..4).map(|n| matsubara::fermionic(BETA, n)).collect();
    let data: Vec<Complex64> = iw.iter().map(|&v| g(Complex64::new(0.0, v))).collect();
    let w = real_mesh(MeshType::Linear, 3.0, 61)?;
    let eta = 0.05;
    let sol = PadeSolver::new(&iw, &w, &data)?.solve(eta);
    let dev = w
        .iter()
        .zip(&sol.g_ret)
        .map(|(&x, gr)| (gr - g(Complex64::new(x, eta))).norm())
        .fold(0.0, f64::max);
    println!("  two-pole Padé: max deviation {dev:.3e}");
    harness.check_upper("Padé two-pole continuation", dev, 100.0 * tolerances::PADE_INTERPOLATION);
    Ok(())
}

fn main() {
    init_logging();
    println!("╔══════════════════════════════════════════════════════════════╗");
    println!("║  Analytic continuation validation — MaxEnt and Padé          ║");
    println!("╚══════════════════════════════════════════════════════════════╝");
    println!();
    println!("  β={BETA} noise={NOISE:.0e}");
    println!();

    let mut harness = ValidationHarness::new("maxent");
    type Stage = fn(&mut ValidationHarness) -> Result<()>;
    let stages: [(&str, Stage); 3] = [
        ("semicircle, fermionic kernel", check_semicircle),
        ("Lorentzian, bosonic kernel", check_bosonic),
        ("Padé", check_pade),
    ];
    for (title, stage) in stages {
        harness.section(title);
        if let Err(e) = stage(&mut harness) {
            eprintln!("  {title} failed: {e}");
            harness.check_bool(title, false);
        }
    }

    println!();
    harness.finish();
}
