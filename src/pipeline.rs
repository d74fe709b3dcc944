//! Run orchestration: ingest, scale, analyze, export.
//!
//! Every stage operates on fully-materialized in-memory tables; all
//! file I/O happens here at the edges, never inside the analytics. A
//! run is deterministic: identical inputs and settings produce
//! byte-identical output files.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use tracing::info;

use crate::config::AnalysisConfig;
use crate::deviation::{compute_hour_deviation, monthly_profile_deviation, HourlyObservations};
use crate::grid::{MonthlyHourlyGrid, MonthlyPeaks};
use crate::ingest::{mean_hourly_by_month, read_generation_csv, read_measured_csv, GroupingMode};
use crate::metadata::{read_metadata_csv, summarize_fleet};
use crate::models::{GroupKey, HourlySeries, Month};
use crate::report;
use crate::scaling::{apply_scale, compute_scale_factor};
use crate::thresholds::compute_threshold_table;

/// Input files for one analysis run. Only the reference dataset is
/// required; every other analysis is skipped when its inputs are
/// absent.
#[derive(Debug, Clone)]
pub struct PipelineInputs {
    /// Reference generation curve (long or wide layout, ungrouped).
    pub reference: PathBuf,
    /// Oriented-system curves (wide layout with Orientation/Tilt).
    pub comparison: Option<PathBuf>,
    /// Modeled per-device curves (wide layout with ID).
    pub modeled: Option<PathBuf>,
    /// Timestamped measured device readings.
    pub measured: Option<PathBuf>,
    /// Fleet metadata export.
    pub metadata: Option<PathBuf>,
    /// Restrict comparison rows to these orientations (canonical
    /// English names). `None` keeps every row.
    pub orientations: Option<Vec<String>>,
    pub output_dir: PathBuf,
}

pub fn run(config: &AnalysisConfig, inputs: &PipelineInputs) -> Result<()> {
    config.validate()?;
    std::fs::create_dir_all(&inputs.output_dir)
        .with_context(|| format!("creating {}", inputs.output_dir.display()))?;

    // Reference curve and the monthly peaks every threshold derives from.
    let reference = read_generation_csv(&inputs.reference, &GroupingMode::Ungrouped)
        .with_context(|| format!("reading reference {}", inputs.reference.display()))?;
    info!(records = reference.len(), "loaded reference dataset");
    let peaks = MonthlyPeaks::from_records(&reference);
    let reference_grid = MonthlyHourlyGrid::from_records(&reference);
    info!(
        months = peaks.iter().count(),
        annual_total = reference_grid.annual_total(),
        "reference monthly peaks computed"
    );

    let reference_table =
        compute_threshold_table(&reference, &peaks, &config.threshold_levels)?;
    report::write_threshold_csv(
        &inputs.output_dir.join("reference_hours_above_thresholds.csv"),
        &reference_table,
        "Group",
    )?;
    report::log_threshold_totals("reference", &reference_table, &config.threshold_levels);

    if let Some(comparison_path) = &inputs.comparison {
        run_comparison(config, inputs, comparison_path, &peaks, &reference_grid)?;
    }

    if let (Some(modeled_path), Some(measured_path)) = (&inputs.modeled, &inputs.measured) {
        run_deviation(config, inputs, modeled_path, measured_path)?;
    }

    if let Some(metadata_path) = &inputs.metadata {
        let systems = read_metadata_csv(metadata_path)
            .with_context(|| format!("reading metadata {}", metadata_path.display()))?;
        let distribution = summarize_fleet(&systems);
        if let Some(mean_capacity) = distribution.mean_dc_capacity_w {
            info!(systems = systems.len(), mean_dc_capacity_w = mean_capacity, "fleet summarized");
        }
        report::write_fleet_distribution_csv(
            &inputs.output_dir.join("fleet_distribution.csv"),
            &distribution,
        )?;
    }

    Ok(())
}

/// Scales the comparison dataset onto the reference magnitude (once,
/// globally), then runs the threshold engine and the per-month profile
/// deviation on the scaled data.
fn run_comparison(
    config: &AnalysisConfig,
    inputs: &PipelineInputs,
    comparison_path: &Path,
    peaks: &MonthlyPeaks,
    reference_grid: &MonthlyHourlyGrid,
) -> Result<()> {
    let grouping = GroupingMode::ByTilt {
        orientations: inputs.orientations.clone(),
    };
    let mut comparison = read_generation_csv(comparison_path, &grouping)
        .with_context(|| format!("reading comparison {}", comparison_path.display()))?;
    info!(records = comparison.len(), "loaded comparison dataset");

    let scaling = compute_scale_factor(peaks, &comparison);
    apply_scale(&mut comparison, scaling.factor);

    let table = compute_threshold_table(&comparison, peaks, &config.threshold_levels)?;
    report::write_threshold_csv(
        &inputs.output_dir.join("combined_hours_above_thresholds.csv"),
        &table,
        "Tilt",
    )?;
    report::log_threshold_totals("comparison", &table, &config.threshold_levels);

    let comparison_grid = MonthlyHourlyGrid::from_records(&comparison);
    info!(
        annual_total = comparison_grid.annual_total(),
        "scaled comparison totals"
    );
    let curves = monthly_profile_deviation(reference_grid, &comparison_grid);
    report::write_monthly_deviation_csv(
        &inputs.output_dir.join("monthly_profile_deviation.csv"),
        &curves,
    )?;
    Ok(())
}

/// Compares measured device readings against the modeled per-device
/// curves, hour by hour.
fn run_deviation(
    config: &AnalysisConfig,
    inputs: &PipelineInputs,
    modeled_path: &Path,
    measured_path: &Path,
) -> Result<()> {
    let modeled_records = read_generation_csv(modeled_path, &GroupingMode::ById)
        .with_context(|| format!("reading modeled {}", modeled_path.display()))?;
    let modeled_grid = MonthlyHourlyGrid::from_records(&modeled_records);
    let mut modeled_by_device: BTreeMap<(GroupKey, Month), HourlySeries> = BTreeMap::new();
    for ((group, month), series) in modeled_grid.iter() {
        if let Some(device) = group {
            modeled_by_device.insert((device.clone(), *month), *series);
        }
    }

    let readings = read_measured_csv(measured_path)
        .with_context(|| format!("reading measured {}", measured_path.display()))?;
    info!(readings = readings.len(), "loaded measured readings");
    let measured_by_device = mean_hourly_by_month(&readings);

    let measured_obs = device_month_observations(&measured_by_device);
    let modeled_obs = device_month_observations(&modeled_by_device);

    let (samples, stats) =
        compute_hour_deviation(&measured_obs, &modeled_obs, config.epsilon)?;
    info!(
        retained = samples.len(),
        no_data_hours = stats.iter().filter(|s| !s.has_data()).count(),
        "hourly deviation computed"
    );

    report::write_deviation_csv(
        &inputs.output_dir.join("hourly_deviation_samples.csv"),
        &samples,
    )?;
    report::write_hour_stats_csv(
        &inputs.output_dir.join("hourly_deviation_stats.csv"),
        &stats,
    )?;
    Ok(())
}

/// Flattens per-(device, month) series into the analyzer's observation
/// map. The month stays part of the key, so one device contributes up
/// to twelve samples per hour and months missing on one side drop out
/// pairwise.
fn device_month_observations(
    grids: &BTreeMap<(GroupKey, Month), HourlySeries>,
) -> HourlyObservations {
    let mut observations = HourlyObservations::new();
    for ((device, month), series) in grids {
        for (hour, sample) in series.iter() {
            if let Some(value) = sample {
                let key = GroupKey::new(format!("{}/{}", device, month));
                observations.insert((hour, key), value);
            }
        }
    }
    observations
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn observations_keep_month_resolution() {
        let mut june = HourlySeries::empty();
        june.accumulate(12, 5.0);
        let mut july = HourlySeries::empty();
        july.accumulate(12, 7.0);

        let mut grids = BTreeMap::new();
        grids.insert((GroupKey::from("A1"), Month::June), june);
        grids.insert((GroupKey::from("A1"), Month::July), july);

        let observations = device_month_observations(&grids);
        assert_eq!(observations.len(), 2);
        assert_eq!(
            observations.get(&(12, GroupKey::from("A1/June"))),
            Some(&5.0)
        );
        assert_eq!(
            observations.get(&(12, GroupKey::from("A1/July"))),
            Some(&7.0)
        );
    }
}
