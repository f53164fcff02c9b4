// SPDX-License-Identifier: AGPL-3.0-only

//! Integration tests: configuration files and the JSON data layer.

use std::path::PathBuf;

use lambda_dga::config::{DgaConfig, SymmetrySet};
use lambda_dga::error::DgaError;
use lambda_dga::field::{KField, StoredKField};
use lambda_dga::io::{read_json, uniquify_path, write_json, DmftInput};
use lambda_dga::lambda_correction::LambdaCorrectionType;
use lambda_dga::pipeline::DgaInput;
use lambda_dga::synthetic::RpaReference;
use num_complex::Complex64;

#[test]
fn yaml_file_loads_with_defaults_for_missing_sections() {
    let dir = tempfile::tempdir().expect("tempdir");
    let path = dir.path().join("dga_config.yaml");
    std::fs::write(
        &path,
        "lattice:\n  nk: [8, 8, 1]\n  symmetries: quasi_one_dimensional_square\ndga:\n  lambda_corr: none\n",
    )
    .expect("write yaml");
    let config = DgaConfig::load(&path).expect("load");
    assert_eq!(config.lattice.nk, [8, 8, 1]);
    assert_eq!(config.lattice.symmetries, SymmetrySet::QuasiOneDimensionalSquare);
    assert_eq!(config.dga.lambda_corr, LambdaCorrectionType::None);
    assert_eq!(config.input.one_particle(), PathBuf::from("./dmft_input.json"));
    assert!(!config.eliashberg.enabled && !config.max_ent.enabled && !config.poly_fit.enabled);
}

#[test]
fn missing_yaml_file_is_a_load_error() {
    let dir = tempfile::tempdir().expect("tempdir");
    let err = DgaConfig::load(&dir.path().join("absent.yaml")).expect_err("missing file");
    assert!(matches!(err, DgaError::DataLoad(_)), "got {err}");
}

#[test]
fn malformed_yaml_is_a_config_error() {
    let err = DgaConfig::from_yaml_str("lattice: [1, 2").expect_err("malformed");
    assert!(matches!(err, DgaError::Config(_)), "got {err}");
}

#[test]
fn invalid_poly_fit_order_is_rejected() {
    let err = DgaConfig::from_yaml_str("poly_fit:\n  do: true\n  n_fit: 3\n  o_fit: 3\n").expect_err("order");
    assert!(matches!(err, DgaError::Config(_)));
}

#[test]
fn input_files_roundtrip_and_report_boxes() {
    let reference = RpaReference {
        nk: [4, 4, 1],
        niv_input: 20,
        niv_core: 3,
        niv_shell: 2,
        niw: 2,
        ..RpaReference::default()
    };
    let generated = reference.generate().expect("synthetic input");
    let dir = tempfile::tempdir().expect("tempdir");
    write_json(&dir.path().join("dmft_input.json"), &generated.dmft).expect("write 1P");
    write_json(&dir.path().join("g2_dens.json"), &generated.g2_dens).expect("write dens");
    write_json(&dir.path().join("g2_magn.json"), &generated.g2_magn).expect("write magn");

    let mut config = DgaConfig::default();
    config.input.path = dir.path().to_path_buf();
    let input = DgaInput::load(&config.input).expect("load input");
    assert_eq!(input.available_boxes(), (reference.niw, reference.niv_core));
    assert_eq!(input.dmft.siw.len(), 2 * reference.niv_input);
    assert_eq!(input.dmft.siw_positive().expect("Σ").len(), reference.niv_input);
    let stored = input.dmft.siw.to_vec().expect("Σ");
    let original = generated.dmft.siw.to_vec().expect("Σ");
    assert!(stored.iter().zip(&original).all(|(a, b)| (a - b).norm() < 1e-14));

    let one: DmftInput = read_json(&config.input.one_particle()).expect("read 1P");
    assert!((one.beta - reference.beta).abs() < 1e-12);
}

#[test]
fn missing_two_particle_file_is_a_load_error() {
    let reference = RpaReference {
        nk: [4, 4, 1],
        niv_input: 20,
        niv_core: 2,
        niv_shell: 0,
        niw: 1,
        ..RpaReference::default()
    };
    let generated = reference.generate().expect("synthetic input");
    let dir = tempfile::tempdir().expect("tempdir");
    write_json(&dir.path().join("dmft_input.json"), &generated.dmft).expect("write 1P");
    let mut config = DgaConfig::default();
    config.input.path = dir.path().to_path_buf();
    let err = DgaInput::load(&config.input).expect_err("G2 missing");
    assert!(matches!(err, DgaError::DataLoad(msg) if msg.contains("g2_dens.json")));
}

#[test]
fn stored_fields_rebuild_the_same_values() {
    let dir = tempfile::tempdir().expect("tempdir");
    let field = KField::from_rows([2, 2, 1], 3, |ik| {
        (0..3).map(|i| Complex64::new(ik as f64, -(i as f64))).collect()
    })
    .expect("field");
    let path = dir.path().join("field.json");
    write_json(&path, &field.to_stored()).expect("write");
    let back = read_json::<StoredKField>(&path).expect("read").into_field().expect("rebuild");
    assert_eq!(back.nk(), [2, 2, 1]);
    assert_eq!(back.as_slice(), field.as_slice());
}

#[test]
fn uniquify_counts_up() {
    let dir = tempfile::tempdir().expect("tempdir");
    let base = dir.path().join("run");
    assert_eq!(uniquify_path(&base), base);
    std::fs::create_dir(&base).expect("mkdir");
    let first = uniquify_path(&base);
    assert!(first.to_string_lossy().ends_with("run_1"));
    std::fs::create_dir(&first).expect("mkdir");
    assert!(uniquify_path(&base).to_string_lossy().ends_with("run_2"));
}
