use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Parser;
use tracing::info;

use pv_analytics::config::{load_config, AnalysisConfig};
use pv_analytics::pipeline::{self, PipelineInputs};

#[derive(Parser, Debug)]
#[command(name = "pv_analytics")]
#[command(about = "Threshold, scaling, and deviation analytics for PV generation curves", long_about = None)]
struct Args {
    /// Reference generation curve CSV (long or wide layout)
    #[arg(long, env = "PV_REFERENCE")]
    reference: PathBuf,

    /// Oriented-system comparison CSV (wide layout with Orientation/Tilt)
    #[arg(long)]
    comparison: Option<PathBuf>,

    /// Modeled per-device curves CSV (wide layout with ID)
    #[arg(long)]
    modeled: Option<PathBuf>,

    /// Timestamped measured device readings CSV
    #[arg(long)]
    measured: Option<PathBuf>,

    /// Fleet metadata CSV (semicolon-delimited)
    #[arg(long)]
    metadata: Option<PathBuf>,

    /// Directory the result tables are written to
    #[arg(long, default_value = ".")]
    output_dir: PathBuf,

    /// JSON settings file (threshold levels, epsilon)
    #[arg(long)]
    settings: Option<PathBuf>,

    /// Comma-separated threshold levels overriding the settings,
    /// e.g. "0.5,0.65,0.8"
    #[arg(long)]
    levels: Option<String>,

    /// Deviation negligibility gate overriding the settings
    #[arg(long)]
    epsilon: Option<f64>,

    /// Comma-separated orientations the comparison dataset is
    /// restricted to, e.g. "East,West"
    #[arg(long, default_value = "East,West")]
    orientations: String,
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("pv_analytics=info".parse()?),
        )
        .init();

    let args = Args::parse();

    let mut config = match &args.settings {
        Some(path) => load_config(path)?,
        None => AnalysisConfig::default(),
    };
    if let Some(levels) = &args.levels {
        config.threshold_levels = parse_levels(levels)?;
    }
    if let Some(epsilon) = args.epsilon {
        config.epsilon = epsilon;
    }
    config.validate()?;
    info!(
        levels = ?config.threshold_levels,
        epsilon = config.epsilon,
        "analysis settings resolved"
    );

    let orientations: Vec<String> = args
        .orientations
        .split(',')
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
        .collect();

    let inputs = PipelineInputs {
        reference: args.reference,
        comparison: args.comparison,
        modeled: args.modeled,
        measured: args.measured,
        metadata: args.metadata,
        orientations: (!orientations.is_empty()).then_some(orientations),
        output_dir: args.output_dir,
    };

    pipeline::run(&config, &inputs)
}

fn parse_levels(raw: &str) -> Result<Vec<f64>> {
    raw.split(',')
        .map(|s| {
            s.trim()
                .parse::<f64>()
                .with_context(|| format!("invalid threshold level {s:?}"))
        })
        .collect()
}
