// SPDX-License-Identifier: AGPL-3.0-only

//! Integration tests: analytic continuation through the public API.

use lambda_dga::ana_cont::{
    flat_model, real_mesh, AlphaDetermination, KernelKind, MaxentOptions, MaxentSolverSvd, MeshType, Noise,
    PadeSolver,
};
use lambda_dga::matsubara;
use lambda_dga::numerics::{trapz, trapz_weights};
use lambda_dga::tolerances;
use num_complex::Complex64;

const BETA: f64 = 10.0;

/// Two Lorentzian peaks at ±1 with unit total weight.
fn two_peaks(w: &[f64]) -> Vec<f64> {
    let g = 0.3;
    w.iter()
        .map(|&x| {
            let l = |c: f64| g / std::f64::consts::PI / ((x - c).powi(2) + g * g);
            0.5 * (l(1.0) + l(-1.0))
        })
        .collect()
}

fn matsubara_data(iw: &[f64], w: &[f64], a: &[f64]) -> Vec<Complex64> {
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

#[test]
fn chi2kink_recovers_a_normalised_positive_spectrum() {
    let iw: Vec<f64> = (0..30).map(|n| matsubara::fermionic(BETA, n)).collect();
    let w = real_mesh(MeshType::Linear, 8.0, 241).expect("mesh");
    let data = matsubara_data(&iw, &w, &two_peaks(&w));
    let solver = MaxentSolverSvd::new(
        KernelKind::FreqFermionic,
        &iw,
        &w,
        &data,
        &Noise::Stdev(vec![1e-4; iw.len()]),
        &flat_model(&w),
        MaxentOptions::default(),
    )
    .expect("solver");
    assert!(solver.n_sv() > 0 && solver.n_sv() <= iw.len() * 2);
    let sol = solver.solve().expect("MaxEnt");
    assert!(sol.a_opt.iter().all(|&a| a >= 0.0), "entropic spectra are positive");
    let norm = trapz(&sol.a_opt, &w);
    assert!((norm - 1.0).abs() < tolerances::MAXENT_NORM_ABS, "norm {norm}");
    // Particle-hole symmetric data gives a symmetric spectrum.
    let n = w.len();
    let asym = (0..n).map(|i| (sol.a_opt[i] - sol.a_opt[n - 1 - i]).abs()).fold(0.0, f64::max);
    let peak = sol.a_opt.iter().copied().fold(0.0, f64::max);
    assert!(asym < 0.05 * peak, "asymmetry {asym} vs peak {peak}");
    let misfit = sol
        .backtransform
        .iter()
        .zip(&data)
        .map(|(b, d)| (b - d).norm())
        .fold(0.0, f64::max);
    assert!(misfit < 1e-2, "backtransform misfit {misfit}");
}

#[test]
fn classic_and_historic_agree_on_the_norm() {
    let iw: Vec<f64> = (0..20).map(|n| matsubara::fermionic(BETA, n)).collect();
    let w = real_mesh(MeshType::Linear, 8.0, 161).expect("mesh");
    let data = matsubara_data(&iw, &w, &two_peaks(&w));
    let noise = Noise::Stdev(vec![1e-4; iw.len()]);
    let model = flat_model(&w);
    let norms: Vec<f64> = [AlphaDetermination::Historic, AlphaDetermination::Classic]
        .into_iter()
        .map(|alpha_determination| {
            let options = MaxentOptions {
                alpha_determination,
                ..MaxentOptions::default()
            };
            let solver = MaxentSolverSvd::new(KernelKind::FreqFermionic, &iw, &w, &data, &noise, &model, options)
                .expect("solver");
            let sol = solver.solve().expect("MaxEnt");
            assert!(sol.alpha_opt > 0.0);
            trapz(&sol.a_opt, &w)
        })
        .collect();
    for norm in &norms {
        assert!((norm - 1.0).abs() < tolerances::MAXENT_NORM_ABS, "norm {norm}");
    }
}

#[test]
fn mismatched_noise_is_rejected() {
    let iw: Vec<f64> = (0..5).map(|n| matsubara::fermionic(BETA, n)).collect();
    let w = real_mesh(MeshType::Linear, 4.0, 41).expect("mesh");
    let data = vec![Complex64::new(0.0, -0.1); iw.len()];
    let result = MaxentSolverSvd::new(
        KernelKind::FreqFermionic,
        &iw,
        &w,
        &data,
        &Noise::Stdev(vec![1e-3; iw.len() - 1]),
        &flat_model(&w),
        MaxentOptions::default(),
    );
    assert!(result.is_err());
}

#[test]
fn pade_continues_a_single_pole_exactly() {
    let (weight, pole) = (1.0, 0.7);
    let g = |z: Complex64| weight / (z - pole);
    let iw: Vec<f64> = (0..2).map(|n| matsubara::fermionic(BETA, n)).collect();
    let data: Vec<Complex64> = iw.iter().map(|&v| g(Complex64::new(0.0, v))).collect();
    let w = real_mesh(MeshType::Linear, 2.0, 41).expect("mesh");
    let solver = PadeSolver::new(&iw, &w, &data).expect("Padé");
    let eta = 0.1;
    let sol = solver.solve(eta);
    for (&x, gr) in w.iter().zip(&sol.g_ret) {
        let exact = g(Complex64::new(x, eta));
        assert!((gr - exact).norm() < tolerances::PADE_INTERPOLATION, "ω={x}: {gr} vs {exact}");
    }
    let (grid, values) = solver.check(None);
    assert_eq!(grid.len(), values.len());
}
