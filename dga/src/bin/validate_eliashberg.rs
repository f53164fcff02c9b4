// SPDX-License-Identifier: AGPL-3.0-only

//! Linearised Eliashberg equation on pairing vertices with a closed-form
//! spectrum.
//!
//! With a local G every vertex below is separable in momentum, so the
//! eigenvalues of the gap operator reduce to S = Σ_ν |G(ν)|² times a
//! Fourier coefficient of Γ. Exit code 0 when every check passes, 1
//! otherwise.
//!
//! # Validation targets
//!
//! | Check | Metric | Tolerance |
//! |-------|--------|-----------|
//! | Constant vertex | \|λ − (−U S/β)\| | `ELIASHBERG_EIGENVALUE_ABS` |
//! | Separable vertex, s-wave | \|λ_s − \|U₀\| S/β\| | `ELIASHBERG_EIGENVALUE_ABS` |
//! | Separable vertex, d-wave | \|λ_d − V S/β\| | `ELIASHBERG_EIGENVALUE_ABS` |
//! | Vertex from χ = 0 ladder | \|λ − (−U S/β)\| | `ELIASHBERG_EIGENVALUE_ABS` |

use lambda_dga::eliashberg::{
    gap_start, FrequencyParity, GapEquation, GapSymmetry, PairingChannel, PairingVertex, PowerIteration,
};
use lambda_dga::error::Result;
use lambda_dga::field::KField;
use lambda_dga::four_point::{Channel, LadderSusceptibility};
use lambda_dga::lattice::{KGrid, KSymmetry};
use lambda_dga::logging::init_logging;
use lambda_dga::matsubara;
use lambda_dga::tolerances;
use lambda_dga::validation::ValidationHarness;
use num_complex::Complex64;

const BETA: f64 = 5.0;
const NIV: usize = 4;
const NK: [usize; 3] = [8, 8, 1];
const DAMPING: f64 = 0.4;

/// G(ν) = 1/(iν + iΓ sgn ν), identical at every k.
fn local_g() -> KField {
    let row: Vec<Complex64> = matsubara::iv(BETA, NIV)
        .into_iter()
        .map(|z| 1.0 / (z + Complex64::new(0.0, DAMPING) * z.im.signum()))
        .collect();
    KField::broadcast(NK, &row)
}

fn weight_sum(g: &KField) -> f64 {
    g.row(0).iter().map(|z| z.norm_sqr()).sum()
}

fn grid() -> Result<KGrid> {
    KGrid::new(NK, KSymmetry::two_dimensional_square())
}

fn check_constant(harness: &mut ValidationHarness) -> Result<()> {
    let u = 1.5;
    let grid = grid()?;
    let g = local_g();
    let expected = -u * weight_sum(&g) / BETA;
    let eq = GapEquation::new(&PairingVertex::constant(NK, NIV, u), &g, BETA)?;
    let random = gap_start(&grid, NIV, GapSymmetry::Random, FrequencyParity::Even, 7);
    let pair = eq.power_iteration(random, 0.0, PowerIteration::default())?;
    println!("  λ = {:.8} (exact {expected:.8}) after {} iterations", pair.lambda, pair.iterations);
    harness.check_abs("constant vertex eigenvalue", pair.lambda, expected, tolerances::ELIASHBERG_EIGENVALUE_ABS);
    harness.check_bool("constant vertex converged", pair.converged);
    Ok(())
}

/// Γ(q) = U₀ − 2V (cos qx + cos qy): the uniform gap sees U₀, every
/// nearest-neighbour form (d-wave included) sees V.
fn check_separable(harness: &mut ValidationHarness) -> Result<()> {
    let (u0, v) = (-2.0, 0.5);
    let grid = grid()?;
    let nd = 4 * NIV - 1;
    let mut vertex = PairingVertex::constant(NK, NIV, 0.0);
    vertex.gamma = KField::from_rows(NK, nd, |iq| {
        let [qx, qy, _] = grid.k_point(iq);
        vec![Complex64::new(u0 - 2.0 * v * (qx.cos() + qy.cos()), 0.0); nd]
    })?;
    let g = local_g();
    let s = weight_sum(&g);
    let (lambda_s, lambda_d) = (-u0 * s / BETA, v * s / BETA);

    let eq = GapEquation::new(&vertex, &g, BETA)?;
    let random = gap_start(&grid, NIV, GapSymmetry::Random, FrequencyParity::Even, 11);
    let d_wave = gap_start(&grid, NIV, GapSymmetry::DWave, FrequencyParity::Even, 0);
    let sol = eq.solve(PairingChannel::Singlet, random, d_wave, PowerIteration::default())?;
    println!(
        "  λ_s = {:.8} (exact {lambda_s:.8}), λ_d = {:.8} (exact {lambda_d:.8})",
        sol.leading.lambda, sol.seeded.lambda
    );
    harness.check_abs("s-wave eigenvalue", sol.leading.lambda, lambda_s, tolerances::ELIASHBERG_EIGENVALUE_ABS);
    harness.check_abs("d-wave eigenvalue", sol.seeded.lambda, lambda_d, tolerances::ELIASHBERG_EIGENVALUE_ABS);
    harness.check_bool("separable vertex converged", sol.converged());
    Ok(())
}

/// With χ ≡ 0 the singlet spin-fluctuation vertex is the bare U.
fn check_bare_ladder(harness: &mut ValidationHarness) -> Result<()> {
    let u = 2.0;
    let grid = grid()?;
    let nq = grid.nk_tot();
    let wn: Vec<i64> = (-2..=2).collect();
    let zeros = |len: usize| (0..nq).map(|_| vec![Complex64::new(0.0, 0.0); len]).collect::<Vec<_>>();
    let chi_d = LadderSusceptibility::from_rows(Channel::Density, BETA, wn.clone(), 1, zeros(wn.len()), zeros(2 * wn.len()))?;
    let chi_m = LadderSusceptibility::from_rows(Channel::Magnetic, BETA, wn.clone(), 1, zeros(wn.len()), zeros(2 * wn.len()))?;
    let vertex = PairingVertex::from_ladder(&chi_d, &chi_m, NK, u, NIV, PairingChannel::Singlet)?;
    let g = local_g();
    let expected = -u * weight_sum(&g) / BETA;
    let eq = GapEquation::new(&vertex, &g, BETA)?;
    let random = gap_start(&grid, NIV, GapSymmetry::Random, FrequencyParity::Even, 5);
    let pair = eq.power_iteration(random, 0.0, PowerIteration::default())?;
    println!("  λ = {:.8} (exact {expected:.8})", pair.lambda);
    harness.check_abs("bare ladder vertex eigenvalue", pair.lambda, expected, tolerances::ELIASHBERG_EIGENVALUE_ABS);
    Ok(())
}

fn main() {
    init_logging();
    println!("╔══════════════════════════════════════════════════════════════╗");
    println!("║  Eliashberg validation — separable pairing vertices          ║");
    println!("╚══════════════════════════════════════════════════════════════╝");
    println!();
    println!("  β={BETA} niv={NIV} nk={NK:?} Γ_G={DAMPING}");
    println!();

    let mut harness = ValidationHarness::new("eliashberg");
    type Stage = fn(&mut ValidationHarness) -> Result<()>;
    let stages: [(&str, Stage); 3] = [
        ("constant vertex", check_constant),
        ("separable vertex", check_separable),
        ("vertex from a bare ladder", check_bare_ladder),
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
