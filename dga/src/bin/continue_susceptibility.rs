// SPDX-License-Identifier: AGPL-3.0-only

//! MaxEnt continuation of a λ-corrected χ(q, iω) along a k-path.
//!
//! ```text
//! continue_susceptibility --input chi_magn_lam.json [--settings cont.yaml] [--output DIR]
//! ```
//!
//! The result lands in `ChiCont_nw_{nw}_err_{err}_sigma_{sigma}_lambda_{λ}`
//! below the output directory (uniquified).

use std::path::PathBuf;
use std::process;

use clap::Parser;
use lambda_dga::error::Result;
use lambda_dga::four_point::StoredSusceptibility;
use lambda_dga::io::{read_json, uniquify_path, write_json};
use lambda_dga::logging::{init_logging, CpuTimer};
use lambda_dga::postproc::{continue_susceptibility, SusceptibilityContinuation};

#[derive(Parser, Debug)]
#[command(name = "continue_susceptibility", version, about = "k-path MaxEnt of χ(q, iω)")]
struct Args {
    /// Stored susceptibility (JSON).
    #[arg(short, long)]
    input: PathBuf,

    /// YAML continuation settings; defaults when omitted.
    #[arg(short, long)]
    settings: Option<PathBuf>,

    /// Parent directory of the result folder (default: next to the input).
    #[arg(short, long)]
    output: Option<PathBuf>,

    /// Override the k-path, e.g. `Gamma-X-M-Gamma`.
    #[arg(long)]
    path: Option<String>,
}

fn run(args: &Args) -> Result<()> {
    let mut timer = CpuTimer::new();
    let mut settings: SusceptibilityContinuation = match &args.settings {
        Some(p) => serde_yaml::from_str(&std::fs::read_to_string(p)?)?,
        None => SusceptibilityContinuation::default(),
    };
    if let Some(path) = &args.path {
        settings.path.clone_from(path);
    }
    let chi: StoredSusceptibility = read_json(&args.input)?;
    println!("  input:   {} ({} channel, nq={:?})", args.input.display(), chi.channel, chi.nq);
    println!("  path:    {}", settings.path);
    println!("  mesh:    nw={} w_max={}", settings.nw, settings.w_max);
    timer.log_stage("load");

    let result = continue_susceptibility(&chi, &settings)?;
    timer.log_stage("continuation");

    let parent = args
        .output
        .clone()
        .or_else(|| args.input.parent().map(PathBuf::from))
        .unwrap_or_else(|| PathBuf::from("."));
    let dir = uniquify_path(&parent.join(settings.folder_name()));
    std::fs::create_dir_all(&dir)?;
    write_json(&dir.join(format!("chi_{}_cont.json", chi.channel)), &result)?;
    write_json(&dir.join("settings.json"), &settings)?;

    println!();
    println!("  points:  {}", result.k_axis.len());
    let alpha_min = result.alpha_opt.iter().copied().fold(f64::INFINITY, f64::min);
    let alpha_max = result.alpha_opt.iter().copied().fold(f64::NEG_INFINITY, f64::max);
    println!("  α range: [{alpha_min:.3e}, {alpha_max:.3e}]");
    println!("  output:  {}", dir.display());
    Ok(())
}

fn main() {
    init_logging();
    let args = Args::parse();

    println!("╔══════════════════════════════════════════════════════════════╗");
    println!("║  Susceptibility continuation — MaxEnt along a k-path         ║");
    println!("╚══════════════════════════════════════════════════════════════╝");
    println!();

    if let Err(e) = run(&args) {
        eprintln!("  FAILED: {e}");
        process::exit(1);
    }
}
