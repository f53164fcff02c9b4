// SPDX-License-Identifier: AGPL-3.0-only

//! Ladder DΓA run from a YAML configuration.
//!
//! ```text
//! dga_ladder --config dga_config.yaml [--output DIR] [--threads N]
//! ```
//!
//! Writes every stage result as JSON into
//! `LambdaDga_lc_{lc}_Nk{nk}_Nq{nq}_wcore{niw}_vcore{niv}_vshell{shell}`
//! below the output directory. Exit code 0 on success, 1 on any error.

use std::path::PathBuf;
use std::process;

use clap::Parser;
use lambda_dga::config::DgaConfig;
use lambda_dga::logging::init_logging;
use lambda_dga::pipeline;

#[derive(Parser, Debug)]
#[command(name = "dga_ladder", version, about = "Ladder DΓA on top of DMFT")]
struct Args {
    /// YAML run configuration.
    #[arg(short, long)]
    config: PathBuf,

    /// Parent directory of the run directory (overrides `output.path`).
    #[arg(short, long)]
    output: Option<PathBuf>,

    /// Worker threads of the rayon pool (default: all cores).
    #[arg(short, long)]
    threads: Option<usize>,
}

fn run(args: &Args) -> lambda_dga::error::Result<()> {
    let mut config = DgaConfig::load(&args.config)?;
    if let Some(out) = &args.output {
        config.output.path.clone_from(out);
    }
    if let Some(n) = args.threads {
        rayon::ThreadPoolBuilder::new()
            .num_threads(n)
            .build_global()
            .map_err(|e| lambda_dga::error::DgaError::Config(format!("thread pool: {e}")))?;
    }
    println!("  config:  {}", args.config.display());
    println!("  input:   {}", config.input.path.display());
    println!("  lattice: nk={:?} nq={:?}", config.lattice.nk, config.lattice.nq());
    println!("  threads: {}", rayon::current_num_threads());
    println!();

    let out = pipeline::run(&config)?;

    println!();
    println!("═══ Summary ═══════════════════════════════════════════════════");
    if let Some(dir) = &out.run_dir {
        println!("  output:      {}", dir.display());
    }
    println!(
        "  boxes:       niw={} niv={} shell={}",
        out.boxes.niw_core, out.boxes.niv_core, out.boxes.niv_shell
    );
    println!("  λ_dens:      {:.6}", out.lambda.dens);
    println!("  λ_magn:      {:.6}", out.lambda.magn);
    println!("  μ_DMFT:      {:.6}", out.mu_dmft);
    println!("  μ_DΓA:       {:.6}", out.g_dga.mu());
    if let Some(oz) = &out.oz {
        println!("  ξ (OZ):      {:.4}", oz.xi);
    }
    println!("  FS points:   {}", out.fermi_surface.len());
    if let Some(el) = &out.eliashberg {
        println!(
            "  Eliashberg:  λ_s={:.6} λ_seeded={:.6} converged={}",
            el.leading.lambda,
            el.seeded.lambda,
            el.converged()
        );
    }
    if let Some(s) = &out.spectrum {
        println!("  MaxEnt α:    {:.4e}", s.alpha);
    }
    Ok(())
}

fn main() {
    init_logging();
    let args = Args::parse();

    println!("╔══════════════════════════════════════════════════════════════╗");
    println!("║  Ladder DΓA — λ-corrected susceptibilities and self-energy   ║");
    println!("╚══════════════════════════════════════════════════════════════╝");
    println!();

    if let Err(e) = run(&args) {
        eprintln!("  FAILED: {e}");
        process::exit(1);
    }
}
