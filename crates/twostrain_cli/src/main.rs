//! Scenario runner for the two-strain cross-immunity model.
//!
//! Integrates the reference scenario (strain A reaching its endemic state,
//! then a strain B invasion), refines the coexistence equilibrium, runs the
//! cross-immunity sweep, and renders SVG figures.

mod figures;

use anyhow::{Context, Result};
use clap::Parser;
use std::fs::{self, File};
use std::path::PathBuf;
use twostrain_core::equilibrium::{
    endemic_pair, invasion_frequency, refine, single_strain_prevalence, NewtonSettings,
};
use twostrain_core::model::{StrainParams, TwoStrain, I_A, I_B};
use twostrain_core::sweep::{self, SweepConfig};
use twostrain_core::trajectory::{linspace, solve, SolveSettings};

const VERSION: &str = env!("CARGO_PKG_VERSION");

#[derive(Parser, Debug)]
#[command(name = "twostrain")]
#[command(version = VERSION)]
#[command(about = "Two-strain cross-immunity scenarios and figures", long_about = None)]
struct Args {
    /// Output directory for figures and sweep data
    #[arg(short, long, default_value = "out")]
    out_dir: PathBuf,

    /// Grid resolution of the cross-immunity sweep
    #[arg(long, default_value_t = 31)]
    resolution: usize,

    /// Integration horizon for each sweep cell
    #[arg(long, default_value_t = 1000.0)]
    sweep_horizon: f64,

    /// Skip the sweep and render only the trajectory figures
    #[arg(long)]
    skip_sweep: bool,

    /// Enable verbose logging
    #[arg(short, long)]
    verbose: bool,
}

fn main() -> Result<()> {
    let args = Args::parse();

    if args.verbose {
        env_logger::Builder::from_default_env()
            .filter_level(log::LevelFilter::Debug)
            .init();
    } else {
        env_logger::Builder::from_default_env()
            .filter_level(log::LevelFilter::Info)
            .init();
    }

    log::info!("twostrain {} - starting", VERSION);
    fs::create_dir_all(&args.out_dir)
        .with_context(|| format!("Failed to create output directory {:?}", args.out_dir))?;

    let params = StrainParams {
        alpha: 3.0,
        gamma: 0.05,
        delta: 1.0,
        kab: 0.8,
        kba: 0.65,
    };
    let model = TwoStrain::new(params)?;
    let settings = SolveSettings::default();
    let times = linspace(0.0, 100.0, 300);
    let herd_level = 1.0 - params.delta / params.alpha;

    // Strain A alone, from a low-prevalence start.
    let x0 = [1e-2, 0.0, 0.05, 0.0, 0.5];
    log::info!("integrating single-strain burn-in over t in [0, 100]");
    let burn_in = solve(&model, &x0, &times, settings)?;
    log::debug!(
        "burn-in endpoint: Ia = {:.6} (endemic formula {:.6})",
        burn_in.last_state()[I_A],
        single_strain_prevalence(&params)
    );

    figures::prevalence_chart(&args.out_dir.join("burn_in_prevalence.svg"), &burn_in, &[])?;
    figures::immunity_chart(
        &args.out_dir.join("burn_in_immunity.svg"),
        &burn_in,
        herd_level,
    )?;

    // Invade with strain B. Copy the endpoint before seeding so the burn-in
    // trajectory keeps its own final state.
    let mut seeded = burn_in.last_state().to_vec();
    seeded[I_B] = 1e-6;
    log::info!("integrating strain-B invasion over t in [0, 100]");
    let invasion = solve(&model, &seeded, &times, settings)?;

    let pair = endemic_pair(&params)?;
    figures::prevalence_chart(
        &args.out_dir.join("invasion_prevalence.svg"),
        &invasion,
        &[(pair[0], "Ieq A"), (pair[1], "Ieq B")],
    )?;
    figures::immunity_chart(
        &args.out_dir.join("invasion_immunity.svg"),
        &invasion,
        herd_level,
    )?;
    figures::frequency_chart(
        &args.out_dir.join("invasion_frequency.svg"),
        &invasion,
        invasion_frequency(params.kab, params.kba),
    )?;

    let report = refine(&model, invasion.last_state(), NewtonSettings::default())?;
    log::info!(
        "coexistence equilibrium: Ia = {:.6}, Ib = {:.6} ({} Newton steps, stable: {})",
        report.state[I_A],
        report.state[I_B],
        report.iterations,
        report.stable
    );

    if args.skip_sweep {
        log::info!("sweep skipped");
        return Ok(());
    }

    log::info!(
        "sweeping {}x{} cross-immunity grid to t = {}",
        args.resolution,
        args.resolution,
        args.sweep_horizon
    );
    let grid = sweep::run(
        params,
        &seeded,
        SweepConfig {
            resolution: args.resolution,
            t_end: args.sweep_horizon,
            samples: 300,
            settings,
        },
    )?;

    let json_path = args.out_dir.join("sweep.json");
    let file = File::create(&json_path)
        .with_context(|| format!("Failed to create {:?}", json_path))?;
    serde_json::to_writer_pretty(file, &grid)?;
    log::info!("sweep data written to {:?}", json_path);

    figures::sweep_chart(&args.out_dir.join("sweep_frequency.svg"), &grid)?;
    log::info!("figures written to {:?}", args.out_dir);

    Ok(())
}
