mod config;
mod controller;
mod decode;
mod figure;
mod manager;
mod overlay;
mod stats;

use crate::manager::Manager;
use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use std::path::PathBuf;

#[derive(Debug, Parser)]
#[command(version, about)]
struct CLI {
    /// Directory holding `config.toml` and the `chart-*.json` documents.
    #[arg(long)]
    chart_dir: PathBuf,

    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Draw the full-range average of every series.
    Baseline,

    /// Average every series over the view range and refresh the zoom overlays.
    Zoom {
        #[arg(long, requires = "x_max", allow_negative_numbers = true)]
        x_min: Option<f64>,

        #[arg(long, requires = "x_min", allow_negative_numbers = true)]
        x_max: Option<f64>,
    },

    /// Remove the zoom overlays.
    Clean,
}

fn main() {
    env_logger::Builder::new()
        .format_timestamp_millis()
        .filter_level(log::LevelFilter::Info)
        .parse_default_env()
        .init();

    if let Err(error) = run_cli() {
        log::error!("{error:#?}");
        std::process::exit(1);
    }
}

fn run_cli() -> Result<()> {
    let args = CLI::parse();
    log::info!("{args:#?}");

    let mgr = Manager::new(args.chart_dir).context("failed to construct mgr")?;

    match args.command {
        Command::Baseline => mgr.render_baselines()?,
        Command::Zoom { x_min, x_max } => mgr.compute_zoom(x_min.zip(x_max))?,
        Command::Clean => mgr.clean_zoom()?,
    }

    Ok(())
}
