//! Result-table export and summary diagnostics.
//!
//! Writers emit the same column schemas the downstream charting expects;
//! the analytics rows pass through untouched. No-data hours export with
//! empty Mean/Median fields so they stay distinguishable from a real
//! zero in the files as well.

use std::collections::BTreeMap;
use std::path::Path;

use anyhow::{Context, Result};
use tracing::info;

use crate::metadata::FleetDistribution;
use crate::models::{DeviationSample, HourStats, HourlySeries, Month};
use crate::thresholds::ThresholdTable;

/// Writes threshold rows. The group column (named by `group_header`,
/// e.g. "Tilt" or "ID") is emitted only when the table is grouped.
pub fn write_threshold_csv(
    path: &Path,
    table: &ThresholdTable,
    group_header: &str,
) -> Result<()> {
    let grouped = table.rows.iter().any(|row| row.group.is_some());
    let mut writer = csv::Writer::from_path(path)
        .with_context(|| format!("creating {}", path.display()))?;

    let mut header = Vec::new();
    if grouped {
        header.push(group_header);
    }
    header.extend([
        "Month",
        "Threshold_Level",
        "Threshold_Value",
        "Hours_Above_Threshold",
        "Percentage_Above_Threshold",
    ]);
    writer.write_record(&header)?;

    for row in &table.rows {
        let mut fields = Vec::new();
        if grouped {
            fields.push(
                row.group
                    .as_ref()
                    .map(|g| g.as_str().to_string())
                    .unwrap_or_default(),
            );
        }
        fields.extend([
            row.month.name().to_string(),
            row.level_label(),
            row.threshold_value.to_string(),
            row.hours_above.to_string(),
            row.percent_above.to_string(),
        ]);
        writer.write_record(&fields)?;
    }
    writer
        .flush()
        .with_context(|| format!("writing {}", path.display()))?;
    Ok(())
}

/// Writes per-hour deviation statistics. Hours without retained samples
/// get empty Mean/Median fields.
pub fn write_hour_stats_csv(path: &Path, stats: &[HourStats]) -> Result<()> {
    let mut writer = csv::Writer::from_path(path)
        .with_context(|| format!("creating {}", path.display()))?;
    writer.write_record(["Hour", "Samples", "Mean", "Median"])?;
    for row in stats {
        writer.write_record([
            row.hour.to_string(),
            row.samples.to_string(),
            row.mean.map(|v| v.to_string()).unwrap_or_default(),
            row.median.map(|v| v.to_string()).unwrap_or_default(),
        ])?;
    }
    writer
        .flush()
        .with_context(|| format!("writing {}", path.display()))?;
    Ok(())
}

/// Writes the full retained deviation-sample pool for distribution
/// plots.
pub fn write_deviation_csv(path: &Path, samples: &[DeviationSample]) -> Result<()> {
    let mut writer = csv::Writer::from_path(path)
        .with_context(|| format!("creating {}", path.display()))?;
    writer.write_record(["Hour", "Group", "Difference"])?;
    for sample in samples {
        writer.write_record([
            sample.hour.to_string(),
            sample.group.as_str().to_string(),
            sample.difference.to_string(),
        ])?;
    }
    writer
        .flush()
        .with_context(|| format!("writing {}", path.display()))?;
    Ok(())
}

/// Writes per-month hourly deviation curves in long format.
pub fn write_monthly_deviation_csv(
    path: &Path,
    curves: &BTreeMap<Month, HourlySeries>,
) -> Result<()> {
    let mut writer = csv::Writer::from_path(path)
        .with_context(|| format!("creating {}", path.display()))?;
    writer.write_record(["Month", "Hour", "Difference"])?;
    for (month, series) in curves {
        for (hour, sample) in series.iter() {
            if let Some(difference) = sample {
                writer.write_record([
                    month.name().to_string(),
                    hour.to_string(),
                    difference.to_string(),
                ])?;
            }
        }
    }
    writer
        .flush()
        .with_context(|| format!("writing {}", path.display()))?;
    Ok(())
}

/// Writes the fleet distribution: orientation counts, then tilt-band
/// counts, with the banding kind in the first column.
pub fn write_fleet_distribution_csv(
    path: &Path,
    distribution: &FleetDistribution,
) -> Result<()> {
    let mut writer = csv::Writer::from_path(path)
        .with_context(|| format!("creating {}", path.display()))?;
    writer.write_record(["Banding", "Group", "Count"])?;
    for (orientation, count) in &distribution.orientation_counts {
        writer.write_record([
            "Orientation".to_string(),
            orientation.name().to_string(),
            count.to_string(),
        ])?;
    }
    for (band, count) in &distribution.tilt_counts {
        writer.write_record([
            "Tilt".to_string(),
            band.name().to_string(),
            count.to_string(),
        ])?;
    }
    writer
        .flush()
        .with_context(|| format!("writing {}", path.display()))?;
    Ok(())
}

/// Logs total hours above threshold per level across all rows of a
/// table.
pub fn log_threshold_totals(label: &str, table: &ThresholdTable, levels: &[f64]) {
    for (level, total) in table.totals_per_level(levels) {
        info!(
            dataset = label,
            level = %format!("{}%", (level * 100.0).round() as u32),
            total_hours_above = total,
            "hours above threshold"
        );
    }
    if !table.skipped.is_empty() {
        info!(
            dataset = label,
            skipped_groups = table.skipped.len(),
            "groups skipped for missing reference months"
        );
    }
}
