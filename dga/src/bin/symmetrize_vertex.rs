// SPDX-License-Identifier: AGPL-3.0-only

//! Symmetrise worm-sampled impurity data into density/magnetic channels.
//!
//! ```text
//! symmetrize_vertex --input worm.json [--sym sym.yaml] [--output DIR]
//! ```
//!
//! The symmetrised data is written to `symmetrized.json`. For a full vertex
//! with a single band group, `g2_dens.json` and `g2_magn.json` are written
//! as well, in the format `dga_ladder` reads.

use std::path::PathBuf;
use std::process;

use clap::Parser;
use lambda_dga::error::{DgaError, Result};
use lambda_dga::four_point::Channel;
use lambda_dga::io::{read_json, write_json};
use lambda_dga::logging::init_logging;
use lambda_dga::symmetrize::{symmetrize, SymTarget, SymmetrizeConfig, WormData};

#[derive(Parser, Debug)]
#[command(name = "symmetrize_vertex", version, about = "Worm data symmetrisation")]
struct Args {
    /// Worm data (JSON).
    #[arg(short, long)]
    input: PathBuf,

    /// YAML symmetry settings (`target`, `n_bands`, `sym`); one band when omitted.
    #[arg(short, long)]
    sym: Option<PathBuf>,

    /// Output directory (default: current directory).
    #[arg(short, long, default_value = ".")]
    output: PathBuf,

    /// Band group exported as G2 files when several are present.
    #[arg(long)]
    band_group: Option<usize>,
}

fn run(args: &Args) -> Result<()> {
    let config: SymmetrizeConfig = match &args.sym {
        Some(p) => serde_yaml::from_str(&std::fs::read_to_string(p)?)?,
        None => SymmetrizeConfig::one_band(),
    };
    let data: WormData = read_json(&args.input)?;
    println!("  input:   {} ({} groups, β={})", args.input.display(), data.groups.len(), data.beta);
    println!("  bands:   {}  sym: {:?}", config.n_bands, config.sym);

    let sym = symmetrize(&data, &config)?;
    std::fs::create_dir_all(&args.output)?;
    write_json(&args.output.join("symmetrized.json"), &sym)?;
    println!("  dens groups: {:?}", sym.dens.keys().collect::<Vec<_>>());
    println!("  magn groups: {:?}", sym.magn.keys().collect::<Vec<_>>());

    if config.target == SymTarget::ThreeFreq {
        let group = match args.band_group {
            Some(g) => Some(g),
            None if sym.dens.len() == 1 => sym.dens.keys().next().copied(),
            None => None,
        };
        match group {
            Some(g) => {
                for channel in [Channel::Density, Channel::Magnetic] {
                    let g2 = sym.to_local_g2(channel, g)?;
                    write_json(&args.output.join(format!("g2_{channel}.json")), &g2)?;
                }
                println!("  G2 files written for band group {g}");
            }
            None => {
                return Err(DgaError::InvalidArgument(
                    "several band groups present; choose one with --band-group".into(),
                ))
            }
        }
    }
    println!("  output:  {}", args.output.display());
    Ok(())
}

fn main() {
    init_logging();
    let args = Args::parse();

    println!("╔══════════════════════════════════════════════════════════════╗");
    println!("║  Vertex symmetrisation — density and magnetic channels       ║");
    println!("╚══════════════════════════════════════════════════════════════╝");
    println!();

    if let Err(e) = run(&args) {
        eprintln!("  FAILED: {e}");
        process::exit(1);
    }
}
