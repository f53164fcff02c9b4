// SPDX-License-Identifier: AGPL-3.0-only

//! Integration tests: the full ladder run from files on disk.
//!
//! Synthetic RPA input is written as JSON, the run is driven by a YAML
//! configuration, and the stage outputs are read back from the run
//! directory.

use std::path::Path;

use lambda_dga::config::DgaConfig;
use lambda_dga::eliashberg::StoredEliashberg;
use lambda_dga::four_point::StoredSusceptibility;
use lambda_dga::io::{read_json, write_json};
use lambda_dga::lambda_correction::LambdaShifts;
use lambda_dga::pipeline;
use lambda_dga::postproc::{continue_susceptibility, PolyFitResult, SusceptibilityContinuation};
use lambda_dga::synthetic::RpaReference;

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

fn write_input(reference: &RpaReference, dir: &Path) {
    let input = reference.generate().expect("synthetic input");
    write_json(&dir.join("dmft_input.json"), &input.dmft).expect("write 1P");
    write_json(&dir.join("g2_dens.json"), &input.g2_dens).expect("write G2 dens");
    write_json(&dir.join("g2_magn.json"), &input.g2_magn).expect("write G2 magn");
}

fn yaml_config(reference: &RpaReference, input: &Path, output: &Path, extra: &str) -> String {
    format!(
        "
input:
  path: {}
box_sizes:
  niv_shell: {}
  niv_asympt: 40
lattice:
  t: {}
  tp: {}
  tpp: {}
  nk: [{}, {}, {}]
output:
  path: {}
{extra}",
        input.display(),
        reference.niv_shell,
        reference.t,
        reference.tp,
        reference.tpp,
        reference.nk[0],
        reference.nk[1],
        reference.nk[2],
        output.display()
    )
}

#[test]
fn run_writes_every_stage() {
    let reference = small_reference();
    let input_dir = tempfile::tempdir().expect("tempdir");
    let output_dir = tempfile::tempdir().expect("tempdir");
    write_input(&reference, input_dir.path());
    let extra = "
eliashberg:
  do: true
  max_count: 200
poly_fit:
  do: true
";
    let config = DgaConfig::from_yaml_str(&yaml_config(&reference, input_dir.path(), output_dir.path(), extra))
        .expect("valid config");
    let out = pipeline::run(&config).expect("pipeline run");

    let dir = out.run_dir.clone().expect("run directory");
    assert_eq!(
        dir.file_name().expect("name").to_string_lossy(),
        "LambdaDga_lc_spch_Nk16_Nq16_wcore2_vcore4_vshell4"
    );
    for name in [
        "config.json",
        "local.json",
        "lambda.json",
        "chi_dens_lam.json",
        "chi_magn_lam.json",
        "siwk_dga_core.json",
        "mu.json",
        "giwk_dga.json",
        "fermi_surface.json",
        "eliashberg.json",
        "PolyFits/siwk_dga.json",
        "PolyFits/giwk_dga.json",
        "PolyFits/giwk_dmft.json",
    ] {
        assert!(dir.join(name).is_file(), "{name} missing in {}", dir.display());
    }
    assert!(!dir.join("maxent_gloc.json").exists(), "MaxEnt was not requested");

    let lambda: LambdaShifts = read_json(&dir.join("lambda.json")).expect("lambda.json");
    assert!((lambda.dens - out.lambda.dens).abs() < 1e-14);
    assert!((lambda.magn - out.lambda.magn).abs() < 1e-14);

    let chi: StoredSusceptibility = read_json(&dir.join("chi_magn_lam.json")).expect("chi_magn_lam.json");
    assert_eq!(chi.nq, reference.nk);
    assert_eq!(chi.wn, vec![-2, -1, 0, 1, 2]);
    assert_eq!(chi.chi.len(), 16 * 5);

    let fit: PolyFitResult = read_json(&dir.join("PolyFits/siwk_dga.json")).expect("poly fit");
    assert_eq!(fit.nk, reference.nk);
    assert!(fit.z.iter().all(|z| z.is_finite()), "quasiparticle weights must be finite");

    let el: StoredEliashberg = read_json(&dir.join("eliashberg.json")).expect("eliashberg.json");
    assert!(el.lambda.iter().all(|l| l.is_finite()));

    let saved: DgaConfig = read_json(&dir.join("config.json")).expect("config.json");
    assert_eq!(saved.lattice.nk, config.lattice.nk);
    assert_eq!(saved.input.path, config.input.path);
    assert!(saved.eliashberg.enabled && saved.poly_fit.enabled);
}

#[test]
fn second_run_gets_a_fresh_directory() {
    let reference = small_reference();
    let input_dir = tempfile::tempdir().expect("tempdir");
    let output_dir = tempfile::tempdir().expect("tempdir");
    write_input(&reference, input_dir.path());
    let mut config = DgaConfig::from_yaml_str(&yaml_config(&reference, input_dir.path(), output_dir.path(), ""))
        .expect("valid config");
    config.output.write_fields = false;

    let first = pipeline::run(&config).expect("first run").run_dir.expect("dir");
    let second = pipeline::run(&config).expect("second run").run_dir.expect("dir");
    assert_ne!(first, second);
    assert!(second.to_string_lossy().ends_with("_1"));
    assert!(!first.join("siwk_dga_core.json").exists(), "fields are disabled");
    assert!(first.join("lambda.json").is_file());
}

#[test]
fn missing_input_is_a_load_error() {
    let dir = tempfile::tempdir().expect("tempdir");
    let mut config = DgaConfig::default();
    config.input.path = dir.path().join("absent");
    config.output.path = dir.path().to_path_buf();
    assert!(pipeline::run(&config).is_err());
}

#[test]
fn stored_susceptibility_continues_along_a_path() {
    let reference = small_reference();
    let input_dir = tempfile::tempdir().expect("tempdir");
    let output_dir = tempfile::tempdir().expect("tempdir");
    write_input(&reference, input_dir.path());
    let config = DgaConfig::from_yaml_str(&yaml_config(&reference, input_dir.path(), output_dir.path(), ""))
        .expect("valid config");
    let out = pipeline::run(&config).expect("pipeline run");
    let dir = out.run_dir.expect("run directory");
    let chi: StoredSusceptibility = read_json(&dir.join("chi_magn_lam.json")).expect("chi_magn_lam.json");

    let settings = SusceptibilityContinuation {
        nw: 101,
        ncut: None,
        path: "Gamma-X-M-Gamma".into(),
        ..SusceptibilityContinuation::default()
    };
    let cont = continue_susceptibility(&chi, &settings).expect("continuation");
    assert_eq!(cont.spectra.len(), cont.k_axis.len());
    assert_eq!(cont.corners.len(), 3);
    assert!(cont.spectra.iter().flatten().all(|a| a.is_finite() && *a >= 0.0));
}
